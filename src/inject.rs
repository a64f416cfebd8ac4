use core::{
    fmt::{self, Debug, Formatter},
    ops::Deref,
};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock, Weak};
use tracing::error;

use crate::{
    any::Key,
    context::{Context, ResolveState},
    errors::ResolveErrorKind,
    injector::{Injector, InjectorInner},
};

/// Deferred dependency: `K` is resolved on the first [`Lazy::get`], not when the handle is created.
///
/// The handle doesn't keep the injector alive. [`Lazy::get`] resolves on a copy of the creation stack
/// of the originating call taken when it runs: empty once that call has returned,
/// so keys it was creating at the time the handle was made don't count as a cycle.
pub struct Lazy<K: ?Sized> {
    injector: Weak<InjectorInner>,
    origin: Arc<Mutex<ResolveState>>,
    value: OnceLock<Arc<K>>,
}

impl<K> Lazy<K>
where
    K: ?Sized + Send + Sync + 'static,
{
    pub(crate) fn new(cx: &Context) -> Self {
        Self {
            injector: cx.injector().downgrade(),
            origin: cx.shared_state(),
            value: OnceLock::new(),
        }
    }

    /// Resolves `K` once, the next calls return the same value.
    ///
    /// # Errors
    /// `Missing` if the binding produced nothing, `InjectorDropped` if the injector is gone.
    pub fn get(&self) -> Result<Arc<K>, ResolveErrorKind> {
        match self.try_get()? {
            Some(value) => Ok(value),
            None => {
                let err = ResolveErrorKind::Missing {
                    key: Key::of::<K>(),
                    target: "lazy value".to_owned(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    pub fn try_get(&self) -> Result<Option<Arc<K>>, ResolveErrorKind> {
        if let Some(value) = self.value.get() {
            return Ok(Some(value.clone()));
        }

        let Some(inner) = self.injector.upgrade() else {
            let err = ResolveErrorKind::InjectorDropped { key: Key::of::<K>() };
            error!("{}", err);
            return Err(err);
        };

        let state = self.origin.lock().clone();
        let cx = Context::forked(Injector::from_inner(inner), state);
        let Some(value) = cx.get_instance::<K>()? else {
            return Ok(None);
        };
        // Another thread may have won the race, its value is the one kept
        Ok(Some(self.value.get_or_init(|| value).clone()))
    }
}

impl<K: ?Sized + 'static> Debug for Lazy<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("key", &Key::of::<K>())
            .field("resolved", &self.value.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Argument resolved from its binding, or built just-in-time from `T::default()`
/// with its fields injected when `T` is not bound.
pub struct Autowired<T>(pub Arc<T>);

impl<T> Deref for Autowired<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> Debug for Autowired<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Autowired").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{errors::ResolveErrorKind, Binder, BindErrorKind, Injector, Lazy};

    use std::sync::Arc;
    use tracing_test::traced_test;

    struct Clock(u64);

    fn module(binder: &mut Binder) -> Result<(), BindErrorKind> {
        binder.bind_provider(|_| Ok(Arc::new(Clock(42))))?;
        Ok(())
    }

    #[test]
    #[traced_test]
    fn test_memoized() {
        let injector = Injector::create(modules![module]).unwrap();
        let lazy = injector.inject_and_call(&|clock: Lazy<Clock>| clock).unwrap();

        let first = lazy.get().unwrap();
        let second = lazy.get().unwrap();
        assert_eq!(first.0, 42);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    #[traced_test]
    fn test_injector_dropped() {
        let injector = Injector::create(modules![module]).unwrap();
        let lazy = injector.inject_and_call(&|clock: Lazy<Clock>| clock).unwrap();
        drop(injector);

        assert!(matches!(lazy.get(), Err(ResolveErrorKind::InjectorDropped { .. })));
    }

    struct Report(Lazy<Summary>);
    struct Summary(Arc<Report>);

    #[test]
    #[traced_test]
    fn test_get_after_creating_call_returned() {
        let injector = Injector::create(modules![|binder: &mut Binder| -> Result<(), BindErrorKind> {
            binder.bind::<Report>().to_constructor(Report)?.as_non_singleton()?;
            binder.bind_provider(|cx| Ok(Arc::new(Summary(cx.require::<Report>()?))))?;
            Ok(())
        }])
        .unwrap();

        let report = injector.require::<Report>().unwrap();
        let summary = report.0.get().unwrap();

        assert!(!Arc::ptr_eq(&report, &summary.0));
        assert!(Arc::ptr_eq(&summary, &report.0.get().unwrap()));
    }

    #[test]
    #[traced_test]
    fn test_get_during_creation_reports_cycle() {
        struct Node;

        let injector = Injector::create(modules![|binder: &mut Binder| -> Result<(), BindErrorKind> {
            binder.bind::<Node>().to_constructor(|node: Lazy<Node>| {
                assert!(matches!(node.get(), Err(ResolveErrorKind::Cycle { .. })));
                Node
            })?;
            Ok(())
        }])
        .unwrap();

        assert!(injector.require::<Node>().is_ok());
    }
}
