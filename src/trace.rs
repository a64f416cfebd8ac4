use core::{
    fmt::{self, Display, Formatter},
    time::Duration,
};
use std::sync::Arc;

use crate::any::{Instance, Key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    InstanceRequest,
    InstanceWillBeCreated,
    InstanceCreated,
    InstanceReturned,
}

impl Display for TraceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InstanceRequest => "Request Instance",
            Self::InstanceWillBeCreated => "Creating Instance",
            Self::InstanceCreated => "Create Instance",
            Self::InstanceReturned => "Instance Returned",
        })
    }
}

/// Event passed to the trace observer of an injector.
///
/// `referer` is the key whose resolution caused this one, if any.
/// `returned` is only set for [`TraceKind::InstanceReturned`],
/// `created_now` and `elapsed` only for [`TraceKind::InstanceCreated`].
#[derive(Debug, Clone)]
pub struct TraceInfo {
    pub kind: TraceKind,
    pub requested: Key,
    pub referer: Option<Key>,
    pub returned: Option<Instance>,
    pub created_now: bool,
    pub elapsed: Option<Duration>,
    pub is_singleton: bool,
    pub is_bound: bool,
    pub is_eager: bool,
}

impl TraceInfo {
    #[inline]
    #[must_use]
    pub(crate) const fn new(kind: TraceKind, requested: Key, referer: Option<Key>) -> Self {
        Self {
            kind,
            requested,
            referer,
            returned: None,
            created_now: false,
            elapsed: None,
            is_singleton: false,
            is_bound: false,
            is_eager: false,
        }
    }
}

impl Display for TraceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.kind == TraceKind::InstanceCreated {
            let elapsed = self.elapsed.unwrap_or_default();
            return match self.referer {
                Some(referer) => write!(f, "Complete Instance : {referer} -> {} , ElapsedTime : {elapsed:?}", self.requested),
                None => write!(f, "Complete Instance : {} , ElapsedTime : {elapsed:?}", self.requested),
            };
        }

        match self.referer {
            Some(referer) => write!(f, "{} : {referer} -> {}", self.kind, self.requested),
            None => write!(f, "{} : {}", self.kind, self.requested),
        }
    }
}

pub type TraceCallback = Arc<dyn Fn(&TraceInfo) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::{TraceInfo, TraceKind};
    use crate::any::Key;

    use core::time::Duration;

    struct Db;
    struct Repo;

    #[test]
    fn test_display() {
        let request = TraceInfo::new(TraceKind::InstanceRequest, Key::of::<Repo>(), Some(Key::of::<Db>()));
        let line = request.to_string();
        assert!(line.starts_with("Request Instance : "));
        assert!(line.contains("Db -> "));

        let created = TraceInfo {
            elapsed: Some(Duration::from_millis(3)),
            created_now: true,
            ..TraceInfo::new(TraceKind::InstanceCreated, Key::of::<Db>(), None)
        };
        let line = created.to_string();
        assert!(line.starts_with("Complete Instance : "));
        assert!(line.ends_with("ElapsedTime : 3ms"));
    }
}
