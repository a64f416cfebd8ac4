use core::time::Duration;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error};

use crate::{
    binder::Binder,
    errors::{BindErrorKind, BuildErrorKind},
    injector::{Injector, InjectorBuilder},
    module::Module,
    trace::TraceInfo,
};

/// Registry of named and anonymous modules that injectors are assembled from.
///
/// Cloning is shallow: module objects are shared, the registries are independent.
#[derive(Default, Clone)]
pub struct Implements {
    named: BTreeMap<String, Arc<dyn Module>>,
    anonymous: Vec<Arc<dyn Module>>,
}

impl Implements {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module` under `name`, replacing a module registered under the same name
    pub fn add_implement(&mut self, name: impl Into<String>, module: impl Module + 'static) {
        self.named.insert(name.into(), Arc::new(module));
    }

    #[inline]
    #[must_use]
    pub fn has_implement(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    /// Adds the named modules of `other`, a name registered here keeps its module
    pub fn add_implements(&mut self, other: &Implements) {
        for (name, module) in &other.named {
            self.named.entry(name.clone()).or_insert_with(|| module.clone());
        }
    }

    /// Registers an anonymous module, installed by every injector of this registry
    #[inline]
    pub fn add_bind(&mut self, configure: impl Fn(&mut Binder) -> Result<(), BindErrorKind> + Send + Sync + 'static) {
        self.add_module(configure);
    }

    #[inline]
    pub fn add_module(&mut self, module: impl Module + 'static) {
        self.anonymous.push(Arc::new(module));
    }

    /// Assembles an injector from the modules registered under `names`, in that order, and the anonymous modules
    #[inline]
    pub fn new_injector(&self, names: &[&str]) -> Result<Injector, BuildErrorKind> {
        self.builder(names)?.build()
    }

    #[inline]
    pub fn new_injector_with_trace(
        &self,
        names: &[&str],
        trace: impl Fn(&TraceInfo) + Send + Sync + 'static,
    ) -> Result<Injector, BuildErrorKind> {
        self.builder(names)?.trace(trace).build()
    }

    /// Like [`Self::new_injector`], failing with [`BuildErrorKind::Timeout`] if assembly takes longer than `timeout`
    #[inline]
    pub fn new_injector_with_timeout(&self, names: &[&str], timeout: Duration) -> Result<Injector, BuildErrorKind> {
        self.builder(names)?.timeout(timeout).build()
    }

    fn builder(&self, names: &[&str]) -> Result<InjectorBuilder, BuildErrorKind> {
        let modules = names
            .iter()
            .map(|name| match self.named.get(*name) {
                Some(module) => Ok(module.clone()),
                None => {
                    let err = BuildErrorKind::ModuleNotFound { name: (*name).to_owned() };
                    error!("{}", err);
                    Err(err)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(named = modules.len(), anonymous = self.anonymous.len(), "Modules collected");

        Ok(Injector::builder().modules(modules).merged_modules(self.anonymous.clone()))
    }
}
