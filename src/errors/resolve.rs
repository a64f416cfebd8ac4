use core::fmt::{self, Display, Formatter};

use crate::any::Key;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Dependency cycle:\n{path}")]
    Cycle { path: CyclePath },
    #[error("{key} is not bound, so can't inject {target}")]
    Missing { key: Key, target: String },
    #[error("Incorrect instance type. Actual: {actual}, expected: {expected}")]
    IncorrectType { expected: Key, actual: Key },
    #[error("Injector was dropped before {key} could be resolved")]
    InjectorDropped { key: Key },
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

/// Creation stack at the moment a cycle was found, the repeated key last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath(pub Vec<Key>);

impl CyclePath {
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.0
    }
}

impl Display for CyclePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = self.0.iter();
        if let Some(first) = keys.next() {
            write!(f, "  {first}")?;
        }
        for key in keys {
            write!(f, "\n  -> {key}")?;
        }
        Ok(())
    }
}
