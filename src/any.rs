use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
};
use std::sync::Arc;

/// Runtime identity of a binding target.
///
/// Equality, ordering and hashing only look at the [`TypeId`], the name is kept for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct Key {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Key {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }
}

/// Type-erased value produced for a [`Key`].
///
/// Holds an `Arc<K>` so trait-object keys (`dyn Trait`) are stored without an extra box,
/// and remembers the address of the shared value to compare instances by identity.
#[derive(Clone)]
pub struct Instance {
    key: Key,
    value: Arc<dyn Any + Send + Sync>,
    addr: usize,
}

impl Instance {
    #[must_use]
    pub fn new<K>(value: Arc<K>) -> Self
    where
        K: ?Sized + Send + Sync + 'static,
    {
        let addr = Arc::as_ptr(&value).cast::<()>() as usize;
        Self {
            key: Key::of::<K>(),
            value: Arc::new(value),
            addr,
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> Key {
        self.key
    }

    /// Address of the shared value. Two instances with the same address are the same object,
    /// even when they were produced for different keys.
    #[inline]
    #[must_use]
    pub fn addr(&self) -> usize {
        self.addr
    }

    #[must_use]
    pub fn downcast<K>(&self) -> Option<Arc<K>>
    where
        K: ?Sized + 'static,
    {
        self.value.downcast_ref::<Arc<K>>().cloned()
    }

    #[inline]
    #[must_use]
    pub fn is_same(&self, other: &Instance) -> bool {
        self.addr == other.addr
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("key", &self.key.name)
            .field("addr", &format_args!("{:#x}", self.addr))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Instance, Key};

    use std::{collections::HashSet, sync::Arc};

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Port(u16);

    impl Named for Port {
        fn name(&self) -> &str {
            "port"
        }
    }

    #[test]
    fn test_key_identity() {
        assert_eq!(Key::of::<Port>(), Key::of::<Port>());
        assert_ne!(Key::of::<Port>(), Key::of::<dyn Named>());

        let keys: HashSet<_> = [Key::of::<Port>(), Key::of::<Port>(), Key::of::<u16>()].into_iter().collect();
        assert_eq!(keys.len(), 2);
        assert!(Key::of::<dyn Named>().to_string().contains("Named"));
    }

    #[test]
    fn test_instance_downcast() {
        let instance = Instance::new(Arc::new(Port(8080)));

        assert_eq!(instance.key(), Key::of::<Port>());
        assert_eq!(instance.downcast::<Port>().unwrap().0, 8080);
        assert!(instance.downcast::<dyn Named>().is_none());

        let named: Arc<dyn Named> = Arc::new(Port(1));
        let instance = Instance::new(named);
        assert_eq!(instance.downcast::<dyn Named>().unwrap().name(), "port");
    }

    #[test]
    fn test_instance_identity_across_keys() {
        let port = Arc::new(Port(1));
        let as_port = Instance::new(port.clone());
        let as_named = Instance::new(port as Arc<dyn Named>);
        let other = Instance::new(Arc::new(Port(1)));

        assert!(as_port.is_same(&as_named));
        assert!(!as_port.is_same(&other));
    }
}
