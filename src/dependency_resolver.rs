use core::any::type_name;
use std::sync::Arc;
use tracing::{debug, debug_span, error};

use crate::{
    any::Key,
    binding::Binding,
    context::{downcast, Context},
    errors::ResolveErrorKind,
    inject::{Autowired, Lazy},
    members::Injectable,
};

/// Argument of a constructor called through [`Context::inject_and_call`]
#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub function: &'static str,
    pub index: usize,
}

impl Site {
    #[inline]
    #[must_use]
    pub(crate) const fn of(function: &'static str) -> Self {
        Self { function, index: 0 }
    }

    fn missing(self, key: Key) -> ResolveErrorKind {
        let err = ResolveErrorKind::Missing {
            key,
            target: format!("argument {} of {}", self.index, self.function),
        };
        error!("{}", err);
        err
    }
}

/// Value that can be resolved as a constructor argument
pub trait DependencyResolver: Sized {
    fn resolve(cx: &Context, site: Site) -> Result<Self, ResolveErrorKind>;
}

impl<K> DependencyResolver for Arc<K>
where
    K: ?Sized + Send + Sync + 'static,
{
    fn resolve(cx: &Context, site: Site) -> Result<Self, ResolveErrorKind> {
        match cx.get_instance::<K>()? {
            Some(value) => Ok(value),
            None => Err(site.missing(Key::of::<K>())),
        }
    }
}

impl<K> DependencyResolver for Option<Arc<K>>
where
    K: ?Sized + Send + Sync + 'static,
{
    #[inline]
    fn resolve(cx: &Context, _site: Site) -> Result<Self, ResolveErrorKind> {
        cx.get_instance::<K>()
    }
}

impl<K> DependencyResolver for Lazy<K>
where
    K: ?Sized + Send + Sync + 'static,
{
    fn resolve(cx: &Context, site: Site) -> Result<Self, ResolveErrorKind> {
        if !cx.is_bound(Key::of::<K>()) {
            return Err(site.missing(Key::of::<K>()));
        }
        Ok(Lazy::new(cx))
    }
}

impl<T> DependencyResolver for Autowired<T>
where
    T: Injectable + Default,
{
    fn resolve(cx: &Context, site: Site) -> Result<Self, ResolveErrorKind> {
        if cx.is_bound(Key::of::<T>()) {
            return Arc::<T>::resolve(cx, site).map(Autowired);
        }

        let span = debug_span!("autowire", dependency = type_name::<T>());
        let _guard = span.enter();
        debug!("Not bound, creating just-in-time");

        let binding = Binding::autowired::<T>();
        match cx.resolve_binding(&binding)? {
            Some(instance) => downcast::<T>(&instance).map(Autowired),
            None => Err(site.missing(Key::of::<T>())),
        }
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            #[inline]
            #[allow(unused_variables, unused_mut, unused_assignments)]
            fn resolve(cx: &Context, site: Site) -> Result<Self, ResolveErrorKind> {
                let mut site = site;
                $(
                    let $ty = $ty::resolve(cx, site)?;
                    site.index += 1;
                )*
                Ok(($($ty,)*))
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);
