use std::sync::Arc;
use tracing::debug;

use crate::{binder::Binder, errors::BindErrorKind};

/// Group of bindings registered into a [`Binder`] while an injector is assembled.
///
/// Implemented for every `Fn(&mut Binder) -> Result<(), BindErrorKind>`.
pub trait Module: Send + Sync {
    fn configure(&self, binder: &mut Binder) -> Result<(), BindErrorKind>;
}

impl<F> Module for F
where
    F: Fn(&mut Binder) -> Result<(), BindErrorKind> + Send + Sync,
{
    #[inline]
    fn configure(&self, binder: &mut Binder) -> Result<(), BindErrorKind> {
        self(binder)
    }
}

/// Module installing several modules in order
pub struct CombinedModule {
    modules: Vec<Arc<dyn Module>>,
}

impl Module for CombinedModule {
    fn configure(&self, binder: &mut Binder) -> Result<(), BindErrorKind> {
        for module in &self.modules {
            module.configure(binder)?;
        }
        Ok(())
    }
}

#[inline]
#[must_use]
pub fn combine_modules(modules: Vec<Arc<dyn Module>>) -> CombinedModule {
    CombinedModule { modules }
}

/// Module whose bindings can be replaced by override modules, see [`OverridableModule::with`]
pub struct OverridableModule {
    modules: Vec<Arc<dyn Module>>,
    overrides: Vec<Arc<dyn Module>>,
}

impl OverridableModule {
    /// Sets the modules installed before the base ones. Keys they bind win over the base bindings of the same keys.
    #[must_use]
    pub fn with(mut self, overrides: Vec<Arc<dyn Module>>) -> Self {
        self.overrides = overrides;
        self
    }
}

impl Module for OverridableModule {
    fn configure(&self, binder: &mut Binder) -> Result<(), BindErrorKind> {
        let before = binder.primary_keys().count();
        for module in &self.overrides {
            module.configure(binder)?;
        }
        let overridden: Vec<_> = binder.primary_keys().skip(before).collect();
        debug!(count = overridden.len(), "Overridden keys");

        binder.tolerate(overridden, |binder| {
            for module in &self.modules {
                module.configure(binder)?;
            }
            Ok(())
        })
    }
}

#[inline]
#[must_use]
pub fn override_module(modules: Vec<Arc<dyn Module>>) -> OverridableModule {
    OverridableModule {
        modules,
        overrides: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{combine_modules, override_module, Module as _};
    use crate::{any::Key, errors::BindErrorKind, Binder};

    use std::sync::Arc;
    use tracing_test::traced_test;

    struct Port(u16);
    struct Host(&'static str);

    fn base(binder: &mut Binder) -> Result<(), BindErrorKind> {
        binder.bind_instance(Arc::new(Port(80)))?;
        binder.bind_instance(Arc::new(Host("localhost")))?;
        Ok(())
    }

    fn port_override(binder: &mut Binder) -> Result<(), BindErrorKind> {
        binder.bind_instance(Arc::new(Port(8080)))?;
        Ok(())
    }

    #[test]
    #[traced_test]
    fn test_combine() {
        let mut binder = Binder::new();
        combine_modules(modules![port_override, |binder: &mut Binder| -> Result<(), BindErrorKind> {
            binder.bind_instance(Arc::new(Host("example.com")))?;
            Ok(())
        }])
        .configure(&mut binder)
        .unwrap();

        assert!(binder.is_bound(Key::of::<Port>()));
        assert!(binder.is_bound(Key::of::<Host>()));
        assert!(combine_modules(modules![base, port_override]).configure(&mut Binder::new()).is_err());
    }

    #[test]
    #[traced_test]
    fn test_override_keeps_other_duplicates() {
        let doubled = |binder: &mut Binder| -> Result<(), BindErrorKind> {
            base(binder)?;
            binder.bind_instance(Arc::new(Host("again")))?;
            Ok(())
        };

        let result = override_module(modules![doubled]).with(modules![port_override]).configure(&mut Binder::new());
        assert!(matches!(result, Err(BindErrorKind::Duplicate { key }) if key == Key::of::<Host>()));
    }

    #[test]
    #[traced_test]
    fn test_override_without_overrides() {
        let mut binder = Binder::new();
        override_module(modules![base]).configure(&mut binder).unwrap();

        assert_eq!(binder.primary_keys().count(), 2);
        assert!(port_override(&mut binder).is_err());
    }
}
