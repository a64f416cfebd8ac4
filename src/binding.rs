use std::sync::Arc;

use crate::{
    any::{Instance, Key},
    config::Config,
    context::Context,
    errors::ResolveErrorKind,
    members::Injectable,
    once::SingletonCell,
};

pub(crate) type ErasedProvider = Arc<dyn Fn(&Context) -> Result<Option<Instance>, ResolveErrorKind> + Send + Sync>;
pub(crate) type ErasedDecorator = Arc<dyn Fn(&Context) -> Result<(), ResolveErrorKind> + Send + Sync>;
pub(crate) type ErasedInterceptor = Arc<dyn Fn(&Context, Instance) -> Result<Instance, ResolveErrorKind> + Send + Sync>;
pub(crate) type ErasedCaster = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

/// Where the value of a binding comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    /// Precomputed value, there is no provider to call a second time
    Instance,
    Provider,
}

pub(crate) struct Binding {
    pub(crate) key: Key,
    pub(crate) provider: ErasedProvider,
    pub(crate) source: Source,
    pub(crate) config: Config,
    pub(crate) fallback: bool,
    /// Keys whose every creation must first resolve this one
    pub(crate) create_before: Vec<Key>,
    /// Extra keys this binding satisfies in [`crate::Binder::get_instances_of`]
    pub(crate) capabilities: Vec<(Key, ErasedCaster)>,
    pub(crate) cell: SingletonCell,
}

impl Binding {
    #[must_use]
    pub(crate) fn new(key: Key, provider: ErasedProvider, source: Source, config: Config, fallback: bool) -> Self {
        Self {
            key,
            provider,
            source,
            config,
            fallback,
            create_before: Vec::new(),
            capabilities: Vec::new(),
            cell: SingletonCell::new(),
        }
    }

    /// Just-in-time binding used for an unbound [`crate::Autowired`] argument:
    /// a fresh `T::default()` with its fields injected on every resolution.
    #[must_use]
    pub(crate) fn autowired<T>() -> Self
    where
        T: Injectable + Default,
    {
        let provider: ErasedProvider = Arc::new(|cx: &Context| -> Result<Option<Instance>, ResolveErrorKind> {
            let mut value = T::default();
            cx.inject_members(&mut value)?;
            Ok(Some(Instance::new(Arc::new(value))))
        });
        Self::new(Key::of::<T>(), provider, Source::Provider, Config::non_singleton(), false)
    }

    /// Materialized singleton value, if any
    #[must_use]
    pub(crate) fn materialized(&self) -> Option<Instance> {
        if !self.config.singleton {
            return None;
        }
        self.cell.get().flatten()
    }

    /// Instance of this binding viewed as `key`, if the binding satisfies it
    #[must_use]
    pub(crate) fn view_as(&self, key: Key, instance: &Instance) -> Option<Instance> {
        if self.key == key {
            return Some(instance.clone());
        }
        self.capabilities
            .iter()
            .filter(|(capability, _)| *capability == key)
            .find_map(|(_, caster)| caster(instance))
    }
}
