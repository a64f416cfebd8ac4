use core::any::type_name;
use parking_lot::Mutex;
use std::{
    collections::HashSet,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};
use tracing::{debug, debug_span, error, warn};

use crate::{
    any::{Instance, Key},
    binder::Binder,
    binding::Binding,
    dependency_resolver::{DependencyResolver, Site},
    errors::{CyclePath, ResolveErrorKind},
    injector::Injector,
    instantiator::Constructor,
    members::{self, Injectable},
    trace::{TraceInfo, TraceKind},
};

/// Keys being created and requested by one top-level call
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolveState {
    creating: HashSet<Key>,
    stack: Vec<Key>,
    referers: Vec<Key>,
}

/// Resolution engine of a single top-level call on an [`Injector`].
///
/// Providers, decorators and interceptors receive the context of the call that triggered them,
/// so dependency cycles are detected across nested resolutions.
pub struct Context {
    injector: Injector,
    state: Arc<Mutex<ResolveState>>,
}

impl Context {
    #[inline]
    #[must_use]
    pub(crate) fn new(injector: Injector) -> Self {
        Self::forked(injector, ResolveState::default())
    }

    #[inline]
    #[must_use]
    pub(crate) fn forked(injector: Injector, state: ResolveState) -> Self {
        Self {
            injector,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Live resolution state, shared with the lazy handles created on this context
    #[inline]
    #[must_use]
    pub(crate) fn shared_state(&self) -> Arc<Mutex<ResolveState>> {
        self.state.clone()
    }

    #[inline]
    #[must_use]
    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    #[inline]
    #[must_use]
    pub fn property(&self, name: &str) -> Option<String> {
        self.injector.property(name)
    }

    #[inline]
    pub fn set_property(&self, name: impl Into<String>, value: impl Into<String>) {
        self.injector.set_property(name, value);
    }

    #[inline]
    #[must_use]
    pub fn is_bound(&self, key: Key) -> bool {
        self.binder().is_bound(key)
    }

    /// Resolves `key`, `None` if it's not bound or its provider produced nothing
    pub fn get_instance_by_key(&self, key: Key) -> Result<Option<Instance>, ResolveErrorKind> {
        if let Some(binding) = self.binder().binding(key) {
            return self.resolve_binding(binding);
        }

        debug!(key = key.name, "Not bound");
        let referer = self.state.lock().referers.last().copied();
        self.trace(|| TraceInfo::new(TraceKind::InstanceRequest, key, referer));
        self.trace(|| TraceInfo::new(TraceKind::InstanceReturned, key, referer));
        Ok(None)
    }

    pub fn get_instance<K>(&self) -> Result<Option<Arc<K>>, ResolveErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        self.get_instance_by_key(Key::of::<K>())?
            .map(|instance| downcast::<K>(&instance))
            .transpose()
    }

    /// Like [`Self::get_instance`], with nothing resolved reported as `Missing`
    pub fn require<K>(&self) -> Result<Arc<K>, ResolveErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        match self.get_instance::<K>()? {
            Some(value) => Ok(value),
            None => {
                let err = ResolveErrorKind::Missing {
                    key: Key::of::<K>(),
                    target: "instance".to_owned(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Already created singletons that are `K`, see [`Binder::get_instances_of`]
    #[must_use]
    pub fn get_instances_of<K>(&self) -> Vec<Arc<K>>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        self.get_instances_of_key(Key::of::<K>())
            .iter()
            .filter_map(Instance::downcast::<K>)
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn get_instances_of_key(&self, key: Key) -> Vec<Instance> {
        self.binder().get_instances_of(key)
    }

    /// Fills the fields of `target` listed by [`Injectable::visit_fields`]
    #[inline]
    pub fn inject_members<T>(&self, target: &mut T) -> Result<(), ResolveErrorKind>
    where
        T: Injectable + ?Sized,
    {
        members::inject(self, target)
    }

    /// Resolves the arguments of `function` and calls it
    pub fn inject_and_call<F, Args>(&self, function: &F) -> Result<F::Output, ResolveErrorKind>
    where
        F: Constructor<Args>,
        Args: DependencyResolver,
    {
        let span = debug_span!("inject_and_call", function = type_name::<F>());
        let _guard = span.enter();

        let args = Args::resolve(self, Site::of(type_name::<F>()))?;
        debug!("Arguments resolved");
        Ok(function.construct(args))
    }

    /// Writes the instance of `K` into `slot`
    pub fn inject_value<K>(&self, slot: &mut Option<Arc<K>>) -> Result<(), ResolveErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        match self.get_instance::<K>()? {
            Some(value) => {
                *slot = Some(value);
                Ok(())
            }
            None => {
                let err = ResolveErrorKind::Missing {
                    key: Key::of::<K>(),
                    target: "value".to_owned(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    pub(crate) fn resolve_binding(&self, binding: &Binding) -> Result<Option<Instance>, ResolveErrorKind> {
        let key = binding.key;
        let referer = {
            let mut state = self.state.lock();
            let referer = state.referers.last().copied();
            state.referers.push(key);
            referer
        };
        let _referer = Referer { cx: self };

        let span = debug_span!("resolve", dependency = key.name);
        let _guard = span.enter();

        let traced = referer != Some(key);
        let event = |kind| TraceInfo {
            is_bound: true,
            is_singleton: binding.config.singleton,
            is_eager: binding.config.eager,
            ..TraceInfo::new(kind, key, referer)
        };

        if traced {
            self.trace(|| event(TraceKind::InstanceRequest));
        }

        let instance = if binding.config.singleton {
            self.resolve_singleton(binding)?
        } else {
            self.create_intercepted(binding)?
        };

        if traced {
            self.trace(|| TraceInfo {
                returned: instance.clone(),
                ..event(TraceKind::InstanceReturned)
            });
        }
        Ok(instance)
    }

    fn resolve_singleton(&self, binding: &Binding) -> Result<Option<Instance>, ResolveErrorKind> {
        if let Some(instance) = binding.cell.get() {
            debug!("Found in singleton cell");
            return Ok(instance);
        }

        self.check_cycle(binding.key)?;

        let (instance, created) = binding.cell.get_or_try_init(|| self.create_intercepted(binding))?;
        if created && instance.is_some() {
            self.decorate(binding.key)?;
        }
        Ok(instance)
    }

    fn create_intercepted(&self, binding: &Binding) -> Result<Option<Instance>, ResolveErrorKind> {
        match self.create(binding)? {
            Some(instance) => self.intercept(binding.key, instance).map(Some),
            None => Ok(None),
        }
    }

    fn create(&self, binding: &Binding) -> Result<Option<Instance>, ResolveErrorKind> {
        let key = binding.key;
        let referer = self.enter(key)?;
        let _creating = Creating { cx: self, key };

        for predecessor in self.binder().predecessors_of(key) {
            debug!(predecessor = predecessor.name, "Resolve predecessor");
            self.get_instance_by_key(*predecessor)?;
        }

        self.trace(|| TraceInfo::new(TraceKind::InstanceWillBeCreated, key, referer));

        let started = Instant::now();
        let instance = (binding.provider)(self)?;
        let elapsed = started.elapsed();
        debug!(?elapsed, "Created");

        self.trace(|| TraceInfo {
            created_now: true,
            elapsed: Some(elapsed),
            ..TraceInfo::new(TraceKind::InstanceCreated, key, referer)
        });

        match instance {
            Some(instance) if instance.key() != key => Err(incorrect_type(key, instance.key())),
            instance => Ok(instance),
        }
    }

    fn intercept(&self, key: Key, mut instance: Instance) -> Result<Instance, ResolveErrorKind> {
        for interceptor in self.binder().interceptors_of(key) {
            instance = interceptor(self, instance)?;
            if instance.key() != key {
                return Err(incorrect_type(key, instance.key()));
            }
        }
        Ok(instance)
    }

    pub(crate) fn decorate(&self, key: Key) -> Result<(), ResolveErrorKind> {
        let decorators = self.binder().decorators_of(key);
        if !decorators.is_empty() {
            debug!(count = decorators.len(), "Call decorators");
        }
        for decorator in decorators {
            decorator(self)?;
        }
        Ok(())
    }

    /// Checks for a cycle and pushes `key` onto the creation stack in one lock region.
    /// Returns the key that was being created before.
    fn enter(&self, key: Key) -> Result<Option<Key>, ResolveErrorKind> {
        let mut state = self.state.lock();
        if state.creating.contains(&key) {
            let path = cycle_path(&state.stack, key);
            drop(state);
            return Err(cycle(path));
        }

        let referer = state.stack.last().copied();
        state.creating.insert(key);
        state.stack.push(key);
        Ok(referer)
    }

    fn check_cycle(&self, key: Key) -> Result<(), ResolveErrorKind> {
        let path = {
            let state = self.state.lock();
            if !state.creating.contains(&key) {
                return Ok(());
            }
            cycle_path(&state.stack, key)
        };
        Err(cycle(path))
    }

    /// Passes an event to the trace observer, if any. A panicking observer is logged and ignored.
    pub(crate) fn trace(&self, info: impl FnOnce() -> TraceInfo) {
        let Some(callback) = self.injector.trace_callback() else {
            return;
        };

        let info = info();
        if catch_unwind(AssertUnwindSafe(|| callback(&info))).is_err() {
            warn!(kind = %info.kind, requested = info.requested.name, "Trace observer panicked");
        }
    }

    #[inline]
    fn binder(&self) -> &Binder {
        self.injector.binder()
    }
}

struct Referer<'a> {
    cx: &'a Context,
}

impl Drop for Referer<'_> {
    fn drop(&mut self) {
        self.cx.state.lock().referers.pop();
    }
}

struct Creating<'a> {
    cx: &'a Context,
    key: Key,
}

impl Drop for Creating<'_> {
    fn drop(&mut self) {
        let mut state = self.cx.state.lock();
        state.stack.pop();
        state.creating.remove(&self.key);
    }
}

fn cycle_path(stack: &[Key], key: Key) -> CyclePath {
    let mut path = stack.to_vec();
    path.push(key);
    CyclePath(path)
}

fn cycle(path: CyclePath) -> ResolveErrorKind {
    let err = ResolveErrorKind::Cycle { path };
    error!("{}", err);
    err
}

fn incorrect_type(expected: Key, actual: Key) -> ResolveErrorKind {
    let err = ResolveErrorKind::IncorrectType { expected, actual };
    error!("{}", err);
    err
}

pub(crate) fn downcast<K>(instance: &Instance) -> Result<Arc<K>, ResolveErrorKind>
where
    K: ?Sized + 'static,
{
    instance
        .downcast::<K>()
        .ok_or_else(|| incorrect_type(Key::of::<K>(), instance.key()))
}
