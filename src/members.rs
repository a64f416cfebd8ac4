use core::any::type_name;
use std::sync::Arc;
use tracing::{debug, error};

use crate::{any::Key, context::Context, errors::ResolveErrorKind, inject::Lazy};

/// Injection marker of a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Marker {
    /// Injected only while no field of the struct is marked, left untouched if nothing is bound
    #[default]
    Absent,
    /// Must be injected, resolving to nothing is an error
    Inject,
    /// Injected if bound, left untouched otherwise
    Nilable,
}

/// Struct whose fields can be filled by [`Context::inject_members`].
///
/// `visit_fields` lists every injectable field with its marker. Fields that are not listed are never touched.
/// As soon as one listed field carries a marker, only marked fields are injected.
///
/// ```rust
/// use std::sync::Arc;
/// use bindery::{Fields, Injectable, Marker, ResolveErrorKind};
///
/// struct Db;
///
/// struct Service {
///     db: Option<Arc<Db>>,
///     port: u16,
/// }
///
/// impl Injectable for Service {
///     fn visit_fields(&mut self, fields: &mut Fields<'_>) -> Result<(), ResolveErrorKind> {
///         fields.slot("db", &mut self.db, Marker::Inject)?.value("port", &mut self.port, Marker::Nilable)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Injectable: Send + Sync + 'static {
    fn visit_fields(&mut self, fields: &mut Fields<'_>) -> Result<(), ResolveErrorKind>;
}

#[derive(Debug, Clone, Copy)]
enum Pass {
    /// Only looks for markers
    Scan { explicit: bool },
    Inject { explicit: bool },
}

pub struct Fields<'a> {
    cx: &'a Context,
    owner: &'static str,
    pass: Pass,
}

impl Fields<'_> {
    /// Pointer-like field, injected only while it's `None`
    pub fn slot<K>(&mut self, name: &str, field: &mut Option<Arc<K>>, marker: Marker) -> Result<&mut Self, ResolveErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        if !self.participates(marker, false) || field.is_some() {
            return Ok(self);
        }

        match self.cx.get_instance::<K>()? {
            Some(value) => *field = Some(value),
            None => self.unresolved(name, Key::of::<K>(), marker)?,
        }
        Ok(self)
    }

    /// Embedded struct, its fields are injected with its own marker mode
    pub fn nested<T>(&mut self, name: &str, field: &mut T, marker: Marker) -> Result<&mut Self, ResolveErrorKind>
    where
        T: Injectable,
    {
        if self.participates(marker, false) {
            debug!(owner = self.owner, field = name, "Inject nested members");
            self.cx.inject_members(field)?;
        }
        Ok(self)
    }

    /// Optional field, overwritten with whatever `K` resolves to and never an error when unbound
    pub fn optional<K>(&mut self, _name: &str, field: &mut Option<Arc<K>>, marker: Marker) -> Result<&mut Self, ResolveErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        if self.participates(marker, false) {
            *field = self.cx.get_instance::<K>()?;
        }
        Ok(self)
    }

    /// Deferred field, set to a [`Lazy`] handle while it's `None` and `K` is bound
    pub fn lazy<K>(&mut self, name: &str, field: &mut Option<Lazy<K>>, marker: Marker) -> Result<&mut Self, ResolveErrorKind>
    where
        K: ?Sized + Send + Sync + 'static,
    {
        if !self.participates(marker, false) || field.is_some() {
            return Ok(self);
        }

        if self.cx.is_bound(Key::of::<K>()) {
            *field = Some(Lazy::new(self.cx));
        } else {
            self.unresolved(name, Key::of::<K>(), marker)?;
        }
        Ok(self)
    }

    /// Scalar field, only injected when marked. The bound `K` is cloned into it.
    #[inline]
    pub fn value<K>(&mut self, name: &str, field: &mut K, marker: Marker) -> Result<&mut Self, ResolveErrorKind>
    where
        K: Clone + Send + Sync + 'static,
    {
        self.value_from::<K, K>(name, field, marker)
    }

    /// Scalar field of a type other than the bound `K`, converted with [`Into`]
    pub fn value_from<K, V>(&mut self, name: &str, field: &mut V, marker: Marker) -> Result<&mut Self, ResolveErrorKind>
    where
        K: Clone + Into<V> + Send + Sync + 'static,
    {
        if !self.participates(marker, true) {
            return Ok(self);
        }

        match self.cx.get_instance::<K>()? {
            Some(value) => *field = K::clone(&value).into(),
            None => self.unresolved(name, Key::of::<K>(), marker)?,
        }
        Ok(self)
    }

    /// Whether the current pass injects a field, noting the marker while scanning
    fn participates(&mut self, marker: Marker, scalar: bool) -> bool {
        match &mut self.pass {
            Pass::Scan { explicit } => {
                *explicit |= marker != Marker::Absent;
                false
            }
            Pass::Inject { explicit } => match marker {
                Marker::Absent => !*explicit && !scalar,
                Marker::Inject | Marker::Nilable => true,
            },
        }
    }

    fn unresolved(&self, name: &str, key: Key, marker: Marker) -> Result<(), ResolveErrorKind> {
        if marker != Marker::Inject {
            return Ok(());
        }
        let err = ResolveErrorKind::Missing {
            key,
            target: format!("{}.{name}", self.owner),
        };
        error!("{}", err);
        Err(err)
    }
}

pub(crate) fn inject<T>(cx: &Context, target: &mut T) -> Result<(), ResolveErrorKind>
where
    T: Injectable + ?Sized,
{
    let mut fields = Fields {
        cx,
        owner: type_name::<T>(),
        pass: Pass::Scan { explicit: false },
    };
    target.visit_fields(&mut fields)?;

    let explicit = matches!(fields.pass, Pass::Scan { explicit: true });
    debug!(owner = fields.owner, explicit, "Inject members");

    fields.pass = Pass::Inject { explicit };
    target.visit_fields(&mut fields)
}
