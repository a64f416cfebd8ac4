#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod binder;
pub(crate) mod binding;
pub(crate) mod config;
pub(crate) mod context;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod inject;
pub(crate) mod injector;
pub(crate) mod instantiator;
pub(crate) mod members;
pub(crate) mod module;
pub(crate) mod once;
pub(crate) mod registry;
pub(crate) mod trace;
pub(crate) mod watchdog;

pub use any::{Instance, Key};
pub use binder::{Binder, BindingBuilder, BindingRef, RawBindingBuilder, RawBindingRef};
pub use config::Config;
pub use context::Context;
pub use dependency_resolver::{DependencyResolver, Site};
pub use errors::{BindErrorKind, BuildErrorKind, CyclePath, ResolveErrorKind, TimeoutReport};
pub use inject::{Autowired, Lazy};
pub use injector::{Injector, InjectorBuilder};
pub use instantiator::Constructor;
pub use members::{Fields, Injectable, Marker};
pub use module::{combine_modules, override_module, CombinedModule, Module, OverridableModule};
pub use registry::Implements;
pub use trace::{TraceCallback, TraceInfo, TraceKind};
