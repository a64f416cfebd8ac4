use core::{
    fmt::{self, Display, Formatter},
    time::Duration,
};

use super::{bind::BindErrorKind, resolve::ResolveErrorKind};
use crate::any::Key;

#[derive(thiserror::Error, Debug)]
pub enum BuildErrorKind {
    #[error("Module {name} is not registered")]
    ModuleNotFound { name: String },
    #[error("Injector construction timed out after {timeout:?}: {report}")]
    Timeout { timeout: Duration, report: TimeoutReport },
    #[error(transparent)]
    Bind(#[from] BindErrorKind),
    #[error(transparent)]
    Resolve(#[from] ResolveErrorKind),
}

/// What the resolution engine was doing when the construction deadline passed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeoutReport {
    /// Innermost type whose provider was still running.
    pub in_flight: Option<Key>,
    pub last_requested: Option<Key>,
    pub last_created: Option<Key>,
    pub slowest: Option<(Key, Duration)>,
}

impl Display for TimeoutReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fn name(key: Option<&Key>) -> &'static str {
            key.map_or("<none>", |key| key.name)
        }

        write!(
            f,
            "creating {}, last requested {}, last created {}",
            name(self.in_flight.as_ref()),
            name(self.last_requested.as_ref()),
            name(self.last_created.as_ref()),
        )?;
        if let Some((key, elapsed)) = &self.slowest {
            write!(f, ", slowest {key} ({elapsed:?})")?;
        }
        Ok(())
    }
}
