use core::marker::PhantomData;
use indexmap::IndexMap;
use std::{
    collections::{HashMap, HashSet},
    mem,
    sync::Arc,
};
use tracing::{debug, error};

use crate::{
    any::{Instance, Key},
    binding::{Binding, ErasedCaster, ErasedDecorator, ErasedInterceptor, ErasedProvider, Source},
    config::Config,
    context::Context,
    dependency_resolver::DependencyResolver,
    errors::{BindErrorKind, ResolveErrorKind},
    instantiator::Constructor,
    members::Injectable,
};

/// Table a registration landed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Primary,
    Fallback,
    /// Dropped duplicate, mutators on it are no-ops
    Discarded,
}

/// Registry of bindings, decorators and interceptors, filled by modules while an injector is assembled.
///
/// Append-only until the injector seals it, read-only afterwards.
#[derive(Default)]
pub struct Binder {
    providers: IndexMap<Key, Binding>,
    fallbacks: IndexMap<Key, Binding>,
    decorators: IndexMap<Key, Vec<ErasedDecorator>>,
    interceptors: IndexMap<Key, Vec<ErasedInterceptor>>,
    predecessors: HashMap<Key, Vec<Key>>,
    tolerated: HashSet<Key>,
}

impl Binder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a binding of `K`. Nothing is registered until a terminal (`to_*`) call.
    #[inline]
    pub fn bind<K>(&mut self) -> BindingBuilder<'_, K>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        BindingBuilder::new(self.bind_key(Key::of::<K>()))
    }

    /// Starts a binding of `K` that is only used when no module binds `K` otherwise
    #[inline]
    pub fn if_not_bound<K>(&mut self) -> BindingBuilder<'_, K>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        BindingBuilder::new(RawBindingBuilder {
            binder: self,
            key: Key::of::<K>(),
            fallback: true,
        })
    }

    #[inline]
    pub fn bind_key(&mut self, key: Key) -> RawBindingBuilder<'_> {
        RawBindingBuilder {
            binder: self,
            key,
            fallback: false,
        }
    }

    /// Shorthand for `bind::<K>().to_provider(provider)`
    pub fn bind_provider<K>(
        &mut self,
        provider: impl Fn(&Context) -> Result<Arc<K>, ResolveErrorKind> + Send + Sync + 'static,
    ) -> Result<BindingRef<'_, K>, BindErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        self.bind::<K>().to_provider(provider)
    }

    /// Shorthand for `bind::<K>().to_instance(value)`
    pub fn bind_instance<K>(&mut self, value: Arc<K>) -> Result<BindingRef<'_, K>, BindErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        self.bind::<K>().to_instance(value)
    }

    /// Binds the return type of `constructor` to it, see [`BindingBuilder::to_constructor`]
    pub fn bind_constructor<C, Args>(&mut self, constructor: C) -> Result<BindingRef<'_, C::Output>, BindErrorKind>
    where
        C: Constructor<Args>,
        C::Output: Send + Sync + 'static,
        Args: DependencyResolver + 'static,
    {
        self.bind::<C::Output>().to_constructor(constructor)
    }

    /// Adds a hook that runs once, right after the singleton of `K` is first created.
    /// It never runs for non-singleton bindings.
    pub fn add_decorator_of<K>(&mut self, decorator: impl Fn(&Context) -> Result<(), ResolveErrorKind> + Send + Sync + 'static)
    where
        K: ?Sized + 'static,
    {
        let decorator: ErasedDecorator = Arc::new(decorator);
        safe_append(self.decorators.entry(Key::of::<K>()).or_default(), decorator);
    }

    /// Adds a transform applied to every created instance of `K`, after the interceptors registered before it.
    /// Return the received value to pass it through.
    pub fn bind_interceptor<K>(
        &mut self,
        interceptor: impl Fn(&Context, Arc<K>) -> Result<Arc<K>, ResolveErrorKind> + Send + Sync + 'static,
    ) where
        K: ?Sized + Send + Sync + 'static,
    {
        let interceptor: ErasedInterceptor = Arc::new(move |cx: &Context, instance: Instance| -> Result<Instance, ResolveErrorKind> {
            let value = instance.downcast::<K>().ok_or_else(|| incorrect_type(Key::of::<K>(), instance.key()))?;
            interceptor(cx, value).map(Instance::new)
        });
        safe_append(self.interceptors.entry(Key::of::<K>()).or_default(), interceptor);
    }

    /// Materialized singleton instances that satisfy `key`, either because they are bound to it
    /// or because their binding exposes it. Instances reachable through several bindings are returned once.
    #[must_use]
    pub fn get_instances_of(&self, key: Key) -> Vec<Instance> {
        let mut seen = HashSet::new();
        self.providers
            .values()
            .filter_map(|binding| binding.materialized().and_then(|instance| binding.view_as(key, &instance)))
            .filter(|instance| seen.insert(instance.addr()))
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn is_bound(&self, key: Key) -> bool {
        self.providers.contains_key(&key)
    }

    #[inline]
    #[must_use]
    pub(crate) fn binding(&self, key: Key) -> Option<&Binding> {
        self.providers.get(&key)
    }

    #[inline]
    pub(crate) fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.providers.values()
    }

    #[inline]
    #[must_use]
    pub(crate) fn predecessors_of(&self, key: Key) -> &[Key] {
        self.predecessors.get(&key).map_or(&[], Vec::as_slice)
    }

    #[inline]
    #[must_use]
    pub(crate) fn decorators_of(&self, key: Key) -> &[ErasedDecorator] {
        self.decorators.get(&key).map_or(&[], Vec::as_slice)
    }

    #[inline]
    #[must_use]
    pub(crate) fn interceptors_of(&self, key: Key) -> &[ErasedInterceptor] {
        self.interceptors.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Keys of primary bindings, in registration order
    #[inline]
    #[must_use]
    pub(crate) fn primary_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.providers.keys().copied()
    }

    /// Runs `configure` with duplicate primary bindings of `keys` dropped instead of rejected
    pub(crate) fn tolerate<F>(&mut self, keys: impl IntoIterator<Item = Key>, configure: F) -> Result<(), BindErrorKind>
    where
        F: FnOnce(&mut Self) -> Result<(), BindErrorKind>,
    {
        let added: Vec<_> = keys.into_iter().filter(|key| self.tolerated.insert(*key)).collect();
        let result = configure(self);
        for key in &added {
            self.tolerated.remove(key);
        }
        result
    }

    pub(crate) fn register(&mut self, binding: Binding) -> Result<Slot, BindErrorKind> {
        let key = binding.key;

        if binding.fallback {
            if self.fallbacks.contains_key(&key) {
                debug!(key = key.name, "Fallback binding already registered, discarded");
                return Ok(Slot::Discarded);
            }
            self.fallbacks.insert(key, binding);
            return Ok(Slot::Fallback);
        }

        if self.providers.contains_key(&key) {
            if self.tolerated.contains(&key) {
                debug!(key = key.name, "Overridden binding discarded");
                return Ok(Slot::Discarded);
            }
            let err = BindErrorKind::Duplicate { key };
            error!("{}", err);
            return Err(err);
        }

        self.providers.insert(key, binding);
        Ok(Slot::Primary)
    }

    /// Merges the bindings of `other`, keeping the existing binding of a key bound twice
    pub(crate) fn merge(&mut self, other: Binder) {
        for (key, binding) in other.providers {
            if self.providers.contains_key(&key) {
                debug!(key = key.name, "Duplicated binding of merged module discarded");
                continue;
            }
            self.providers.insert(key, binding);
        }
        for (key, binding) in other.fallbacks {
            self.fallbacks.entry(key).or_insert(binding);
        }
        for (key, decorators) in other.decorators {
            let list = self.decorators.entry(key).or_default();
            for decorator in decorators {
                safe_append(list, decorator);
            }
        }
        for (key, interceptors) in other.interceptors {
            let list = self.interceptors.entry(key).or_default();
            for interceptor in interceptors {
                safe_append(list, interceptor);
            }
        }
    }

    /// Merges fallbacks of unbound keys and indexes creation-order hints
    pub(crate) fn seal(&mut self) {
        for (key, binding) in mem::take(&mut self.fallbacks) {
            if self.providers.contains_key(&key) {
                continue;
            }
            debug!(key = key.name, "Fallback binding used");
            self.providers.insert(key, binding);
        }

        self.predecessors.clear();
        for binding in self.providers.values() {
            for successor in &binding.create_before {
                self.predecessors.entry(*successor).or_default().push(binding.key);
            }
        }
    }

    fn binding_mut(&mut self, key: Key, slot: Slot) -> Option<&mut Binding> {
        match slot {
            Slot::Primary => self.providers.get_mut(&key),
            Slot::Fallback => self.fallbacks.get_mut(&key),
            Slot::Discarded => None,
        }
    }
}

fn safe_append<T: ?Sized>(list: &mut Vec<Arc<T>>, item: Arc<T>) {
    if !list.iter().any(|existing| Arc::ptr_eq(existing, &item)) {
        list.push(item);
    }
}

fn incorrect_type(expected: Key, actual: Key) -> ResolveErrorKind {
    let err = ResolveErrorKind::IncorrectType { expected, actual };
    error!("{}", err);
    err
}

fn invalid_configuration(key: Key, reason: &'static str) -> BindErrorKind {
    let err = BindErrorKind::InvalidConfiguration { key, reason };
    error!("{}", err);
    err
}

/// Untyped binding builder, the values it registers must be produced for its key
#[must_use]
pub struct RawBindingBuilder<'a> {
    binder: &'a mut Binder,
    key: Key,
    fallback: bool,
}

impl<'a> RawBindingBuilder<'a> {
    #[inline]
    pub fn to_provider<F>(self, provider: F) -> Result<RawBindingRef<'a>, BindErrorKind>
    where
        F: Fn(&Context) -> Result<Option<Instance>, ResolveErrorKind> + Send + Sync + 'static,
    {
        self.to_provider_with_config(provider, Config::default())
    }

    #[inline]
    pub fn to_provider_with_config<F>(self, provider: F, config: Config) -> Result<RawBindingRef<'a>, BindErrorKind>
    where
        F: Fn(&Context) -> Result<Option<Instance>, ResolveErrorKind> + Send + Sync + 'static,
    {
        self.register(Arc::new(provider), Source::Provider, config)
    }

    /// Binds the key to a precomputed value as an eager singleton
    pub fn to_instance(self, instance: Instance) -> Result<RawBindingRef<'a>, BindErrorKind> {
        if instance.key() != self.key {
            return Err(invalid_configuration(self.key, "the instance was produced for another key"));
        }
        self.register(
            Arc::new(move |_: &Context| -> Result<Option<Instance>, ResolveErrorKind> { Ok(Some(instance.clone())) }),
            Source::Instance,
            Config::eager_singleton(),
        )
    }

    fn register(self, provider: ErasedProvider, source: Source, config: Config) -> Result<RawBindingRef<'a>, BindErrorKind> {
        let config = config.validate(self.key).inspect_err(|err| error!("{}", err))?;
        let slot = self
            .binder
            .register(Binding::new(self.key, provider, source, config, self.fallback))?;

        Ok(RawBindingRef {
            binder: self.binder,
            key: self.key,
            slot,
        })
    }
}

/// Registered binding of a [`RawBindingBuilder`], used to adjust its configuration
pub struct RawBindingRef<'a> {
    binder: &'a mut Binder,
    key: Key,
    slot: Slot,
}

impl RawBindingRef<'_> {
    #[inline]
    #[must_use]
    pub fn key(&self) -> Key {
        self.key
    }

    /// `false` if the binding was dropped as a duplicate
    #[inline]
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.slot != Slot::Discarded
    }

    pub fn as_eager_singleton(mut self) -> Result<Self, BindErrorKind> {
        let key = self.key;
        if let Some(binding) = self.binding_mut() {
            if !binding.config.singleton {
                return Err(invalid_configuration(key, "a non-singleton binding can't be eager"));
            }
            binding.config = Config::eager_singleton();
        }
        Ok(self)
    }

    pub fn as_non_singleton(mut self) -> Result<Self, BindErrorKind> {
        let key = self.key;
        if let Some(binding) = self.binding_mut() {
            if binding.source == Source::Instance {
                return Err(invalid_configuration(key, "an instance binding has no provider to call again"));
            }
            if binding.config.eager {
                return Err(invalid_configuration(key, "an eager binding must be a singleton"));
            }
            binding.config = Config::non_singleton();
        }
        Ok(self)
    }

    /// Every creation of `successor` first resolves this binding
    pub fn should_create_before_key(mut self, successor: Key) -> Self {
        if let Some(binding) = self.binding_mut() {
            if !binding.create_before.contains(&successor) {
                binding.create_before.push(successor);
            }
        }
        self
    }

    pub(crate) fn expose(mut self, capability: Key, caster: ErasedCaster) -> Self {
        if let Some(binding) = self.binding_mut() {
            binding.capabilities.push((capability, caster));
        }
        self
    }

    fn binding_mut(&mut self) -> Option<&mut Binding> {
        self.binder.binding_mut(self.key, self.slot)
    }
}

#[must_use]
pub struct BindingBuilder<'a, K: ?Sized> {
    raw: RawBindingBuilder<'a>,
    _marker: PhantomData<fn() -> Arc<K>>,
}

impl<'a, K> BindingBuilder<'a, K>
where
    K: ?Sized + Send + Sync + 'static,
{
    #[inline]
    const fn new(raw: RawBindingBuilder<'a>) -> Self {
        Self { raw, _marker: PhantomData }
    }

    /// Binds `K` to a precomputed value, created eagerly as a singleton
    #[inline]
    pub fn to_instance(self, value: Arc<K>) -> Result<BindingRef<'a, K>, BindErrorKind> {
        self.raw.to_instance(Instance::new(value)).map(BindingRef::new)
    }

    /// Like [`Self::to_instance`], with the fields of `value` injected before it is published
    pub fn to_injected_instance(self, value: K) -> Result<BindingRef<'a, K>, BindErrorKind>
    where
        K: Injectable + Clone + Sized,
    {
        let provider = move |cx: &Context| -> Result<Option<Instance>, ResolveErrorKind> {
            let mut value = value.clone();
            cx.inject_members(&mut value)?;
            Ok(Some(Instance::new(Arc::new(value))))
        };
        self.raw
            .register(Arc::new(provider), Source::Instance, Config::eager_singleton())
            .map(BindingRef::new)
    }

    /// Binds `K` to a provider, called once as the binding is a singleton by default
    #[inline]
    pub fn to_provider<F>(self, provider: F) -> Result<BindingRef<'a, K>, BindErrorKind>
    where
        F: Fn(&Context) -> Result<Arc<K>, ResolveErrorKind> + Send + Sync + 'static,
    {
        self.to_provider_with_config(provider, Config::default())
    }

    pub fn to_provider_with_config<F>(self, provider: F, config: Config) -> Result<BindingRef<'a, K>, BindErrorKind>
    where
        F: Fn(&Context) -> Result<Arc<K>, ResolveErrorKind> + Send + Sync + 'static,
    {
        self.raw
            .to_provider_with_config(move |cx| provider(cx).map(|value| Some(Instance::new(value))), config)
            .map(BindingRef::new)
    }

    /// Binds `K` to a provider that may produce nothing. Typed lookups then report `K` as unbound.
    pub fn to_optional_provider<F>(self, provider: F) -> Result<BindingRef<'a, K>, BindErrorKind>
    where
        F: Fn(&Context) -> Result<Option<Arc<K>>, ResolveErrorKind> + Send + Sync + 'static,
    {
        self.raw
            .to_provider(move |cx| provider(cx).map(|value| value.map(Instance::new)))
            .map(BindingRef::new)
    }

    /// Binds `K` to a function whose arguments are resolved from the injector on each call
    pub fn to_constructor<C, Args>(self, constructor: C) -> Result<BindingRef<'a, K>, BindErrorKind>
    where
        C: Constructor<Args>,
        C::Output: Into<Arc<K>>,
        Args: DependencyResolver + 'static,
    {
        self.raw
            .to_provider(move |cx| {
                let value: Arc<K> = cx.inject_and_call(&constructor)?.into();
                Ok(Some(Instance::new(value)))
            })
            .map(BindingRef::new)
    }
}

/// Registered binding of `K`, used to adjust its configuration
pub struct BindingRef<'a, K: ?Sized> {
    raw: RawBindingRef<'a>,
    _marker: PhantomData<fn() -> Arc<K>>,
}

impl<'a, K> BindingRef<'a, K>
where
    K: ?Sized + Send + Sync + 'static,
{
    #[inline]
    const fn new(raw: RawBindingRef<'a>) -> Self {
        Self { raw, _marker: PhantomData }
    }

    #[inline]
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.raw.is_registered()
    }

    #[inline]
    pub fn as_eager_singleton(self) -> Result<Self, BindErrorKind> {
        self.raw.as_eager_singleton().map(Self::new)
    }

    #[inline]
    pub fn as_non_singleton(self) -> Result<Self, BindErrorKind> {
        self.raw.as_non_singleton().map(Self::new)
    }

    #[inline]
    pub fn should_create_before<X>(self) -> Self
    where
        X: ?Sized + 'static,
    {
        Self::new(self.raw.should_create_before_key(Key::of::<X>()))
    }

    /// Makes materialized instances of this binding visible to `get_instances_of::<C>()`
    pub fn exposes<C>(self, cast: impl Fn(Arc<K>) -> Arc<C> + Send + Sync + 'static) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let caster: ErasedCaster = Arc::new(move |instance: &Instance| instance.downcast::<K>().map(|value| Instance::new(cast(value))));
        Self::new(self.raw.expose(Key::of::<C>(), caster))
    }

    #[inline]
    #[must_use]
    pub fn into_raw(self) -> RawBindingRef<'a> {
        self.raw
    }
}
