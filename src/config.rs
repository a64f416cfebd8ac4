use crate::{any::Key, errors::BindErrorKind};

/// Config for a binding
/// ## Fields
/// - `singleton`:
///   If `true`, the provider runs at most once and the instance it returns is reused.
///   Otherwise every resolution calls the provider again.
///
/// - `eager`:
///   If `true`, the instance is created while the injector is built instead of on first use.
///   Only singletons can be eager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub singleton: bool,
    pub eager: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            singleton: true,
            eager: false,
        }
    }
}

impl Config {
    #[inline]
    #[must_use]
    pub const fn non_singleton() -> Self {
        Self {
            singleton: false,
            eager: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn eager_singleton() -> Self {
        Self {
            singleton: true,
            eager: true,
        }
    }

    pub(crate) fn validate(self, key: Key) -> Result<Self, BindErrorKind> {
        if self.eager && !self.singleton {
            return Err(BindErrorKind::InvalidConfiguration {
                key,
                reason: "an eager binding must be a singleton",
            });
        }
        Ok(self)
    }
}
