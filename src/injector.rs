use core::{
    fmt::{self, Debug, Formatter},
    time::Duration,
};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};
use tracing::{debug, debug_span};

use crate::{
    any::{Instance, Key},
    binder::Binder,
    config::Config,
    context::Context,
    dependency_resolver::DependencyResolver,
    errors::{BuildErrorKind, ResolveErrorKind},
    instantiator::Constructor,
    members::Injectable,
    module::Module,
    trace::{TraceCallback, TraceInfo},
    watchdog,
};

pub(crate) struct InjectorInner {
    binder: Binder,
    properties: RwLock<HashMap<String, String>>,
    trace: Option<TraceCallback>,
}

/// Resolves instances from the bindings of the modules it was assembled from.
///
/// Cheap to clone, every clone shares the same bindings, singletons and properties.
/// Each operation runs on a fresh [`Context`].
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

impl Injector {
    /// Assembles an injector from `modules`, configured in order into one binder.
    /// A key bound by two modules is a [`crate::BindErrorKind::Duplicate`] error.
    #[inline]
    pub fn create(modules: Vec<Arc<dyn Module>>) -> Result<Self, BuildErrorKind> {
        Self::builder().modules(modules).build()
    }

    #[inline]
    #[must_use]
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::default()
    }

    /// Seals `binder`, runs the decorators of the injector itself, then creates the eager singletons
    pub(crate) fn build(mut binder: Binder, trace: Option<TraceCallback>) -> Result<Self, BuildErrorKind> {
        binder
            .bind::<Injector>()
            .to_provider_with_config(|cx| Ok(Arc::new(cx.injector().clone())), Config::non_singleton())?;
        binder.seal();

        let injector = Self {
            inner: Arc::new(InjectorInner {
                binder,
                properties: RwLock::new(HashMap::new()),
                trace,
            }),
        };

        Context::new(injector.clone()).decorate(Key::of::<Injector>())?;

        for binding in injector.binder().bindings().filter(|binding| binding.config.eager) {
            let span = debug_span!("eager", dependency = binding.key.name);
            let _guard = span.enter();

            Context::new(injector.clone()).resolve_binding(binding)?;
            debug!("Eager singleton created");
        }

        Ok(injector)
    }

    #[inline]
    #[must_use]
    pub(crate) fn from_inner(inner: Arc<InjectorInner>) -> Self {
        Self { inner }
    }

    #[inline]
    #[must_use]
    pub(crate) fn downgrade(&self) -> Weak<InjectorInner> {
        Arc::downgrade(&self.inner)
    }

    #[inline]
    #[must_use]
    pub(crate) fn binder(&self) -> &Binder {
        &self.inner.binder
    }

    #[inline]
    #[must_use]
    pub(crate) fn trace_callback(&self) -> Option<&TraceCallback> {
        self.inner.trace.as_ref()
    }

    /// Context for a sequence of resolutions that share cycle detection
    #[inline]
    #[must_use]
    pub fn context(&self) -> Context {
        Context::new(self.clone())
    }

    #[inline]
    #[must_use]
    pub fn is_bound(&self, key: Key) -> bool {
        self.binder().is_bound(key)
    }

    #[inline]
    pub fn get_instance<K>(&self) -> Result<Option<Arc<K>>, ResolveErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        self.context().get_instance()
    }

    #[inline]
    pub fn get_instance_by_key(&self, key: Key) -> Result<Option<Instance>, ResolveErrorKind> {
        self.context().get_instance_by_key(key)
    }

    #[inline]
    pub fn require<K>(&self) -> Result<Arc<K>, ResolveErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        self.context().require()
    }

    #[inline]
    #[must_use]
    pub fn get_instances_of<K>(&self) -> Vec<Arc<K>>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        self.context().get_instances_of()
    }

    #[inline]
    #[must_use]
    pub fn get_instances_of_key(&self, key: Key) -> Vec<Instance> {
        self.binder().get_instances_of(key)
    }

    #[inline]
    pub fn inject_members<T>(&self, target: &mut T) -> Result<(), ResolveErrorKind>
    where
        T: Injectable + ?Sized,
    {
        self.context().inject_members(target)
    }

    #[inline]
    pub fn inject_and_call<F, Args>(&self, function: &F) -> Result<F::Output, ResolveErrorKind>
    where
        F: Constructor<Args>,
        Args: DependencyResolver,
    {
        self.context().inject_and_call(function)
    }

    #[inline]
    pub fn inject_value<K>(&self, slot: &mut Option<Arc<K>>) -> Result<(), ResolveErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        self.context().inject_value(slot)
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<String> {
        self.inner.properties.read().get(name).cloned()
    }

    pub fn set_property(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.properties.write().insert(name.into(), value.into());
    }
}

impl Debug for Injector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("bindings", &self.binder().bindings().count())
            .field("traced", &self.inner.trace.is_some())
            .finish_non_exhaustive()
    }
}

/// Collects what an injector is assembled from
#[derive(Default)]
#[must_use]
pub struct InjectorBuilder {
    pub(crate) modules: Vec<Arc<dyn Module>>,
    pub(crate) merged: Vec<Arc<dyn Module>>,
    pub(crate) trace: Option<TraceCallback>,
    pub(crate) timeout: Option<Duration>,
}

impl InjectorBuilder {
    /// Modules configured in order into one binder, a key bound twice is an error
    pub fn modules(mut self, modules: Vec<Arc<dyn Module>>) -> Self {
        self.modules.extend(modules);
        self
    }

    pub fn module(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    /// Modules configured on their own after [`Self::modules`] and merged in order.
    /// A key that is already bound keeps its binding.
    pub fn merged_modules(mut self, modules: Vec<Arc<dyn Module>>) -> Self {
        self.merged.extend(modules);
        self
    }

    /// Observer receiving every resolution event
    pub fn trace(mut self, callback: impl Fn(&TraceInfo) + Send + Sync + 'static) -> Self {
        self.trace = Some(Arc::new(callback));
        self
    }

    /// Assembles on a worker thread and gives up after `timeout`.
    /// The worker is abandoned, not cancelled.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<Injector, BuildErrorKind> {
        match self.timeout {
            Some(timeout) => watchdog::assemble(self, timeout),
            None => self.assemble(),
        }
    }

    pub(crate) fn assemble(self) -> Result<Injector, BuildErrorKind> {
        let mut binder = Binder::new();
        for module in &self.modules {
            module.configure(&mut binder)?;
        }
        for module in &self.merged {
            let mut scratch = Binder::new();
            module.configure(&mut scratch)?;
            binder.merge(scratch);
        }

        Injector::build(binder, self.trace)
    }
}

#[cfg(test)]
mod tests {
    use super::Injector;
    use crate::{errors::BuildErrorKind, Binder, BindErrorKind, Key};

    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };
    use tracing_test::traced_test;

    struct Settings(String);

    #[test]
    #[traced_test]
    fn test_properties() {
        let injector = Injector::create(modules![|binder: &mut Binder| -> Result<(), BindErrorKind> {
            binder
                .bind::<Settings>()
                .to_provider(|cx| Ok(Arc::new(Settings(cx.property("env").unwrap_or_default()))))?
                .as_non_singleton()?;
            Ok(())
        }])
        .unwrap();

        assert_eq!(injector.property("env"), None);
        assert_eq!(injector.require::<Settings>().unwrap().0, "");

        injector.clone().set_property("env", "prod");
        assert_eq!(injector.require::<Settings>().unwrap().0, "prod");
    }

    #[test]
    #[traced_test]
    fn test_injector_decorators_before_eager() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let injector = Injector::create(modules![{
            let order = order.clone();
            move |binder: &mut Binder| -> Result<(), BindErrorKind> {
                let decorated = order.clone();
                binder.add_decorator_of::<Injector>(move |cx| {
                    cx.set_property("mode", "test");
                    decorated.lock().push("injector");
                    Ok(())
                });

                let created = order.clone();
                binder
                    .bind::<Settings>()
                    .to_provider(move |cx| {
                        created.lock().push("settings");
                        Ok(Arc::new(Settings(cx.property("mode").unwrap_or_default())))
                    })?
                    .as_eager_singleton()?;
                Ok(())
            }
        }])
        .unwrap();

        assert_eq!(*order.lock(), ["injector", "settings"]);
        assert_eq!(injector.require::<Settings>().unwrap().0, "test");
    }

    #[test]
    #[traced_test]
    fn test_eager_failure() {
        let calls = Arc::new(AtomicU8::new(0));
        let result = Injector::create(modules![{
            let calls = calls.clone();
            move |binder: &mut Binder| -> Result<(), BindErrorKind> {
                let calls = calls.clone();
                binder
                    .bind::<Settings>()
                    .to_provider(move |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(anyhow::anyhow!("no settings").into())
                    })?
                    .as_eager_singleton()?;
                Ok(())
            }
        }]);

        assert!(matches!(result, Err(BuildErrorKind::Resolve(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_self_binding() {
        let injector = Injector::create(Vec::new()).unwrap();

        assert!(injector.is_bound(Key::of::<Injector>()));
        let resolved = injector.require::<Injector>().unwrap();
        resolved.set_property("shared", "yes");
        assert_eq!(injector.property("shared").as_deref(), Some("yes"));
    }
}
