//! Service key types for the resolution engine.

use std::any::TypeId;
use std::fmt;

/// Key for service lookup.
///
/// A key names either a single service or the ordered collection of every
/// registration of a service. Concrete types and trait objects are both
/// identified by their `TypeId`; the type name is carried for diagnostics only.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::Key;
///
/// trait Logger: Send + Sync {}
///
/// let single = Key::of::<dyn Logger>();
/// let all = Key::many::<dyn Logger>();
///
/// assert_ne!(single, all);
/// assert_eq!(all.item(), single);
/// assert!(single.display_name().contains("Logger"));
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Key {
    /// A single service (the last registration wins)
    Service(TypeId, &'static str),
    /// Every registration of a service, in registration order
    Many(TypeId, &'static str),
}

impl Key {
    /// Key of a single service `T`.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Key {
        Key::Service(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Key of the collection of every registration of `T`.
    #[inline(always)]
    pub fn many<T: ?Sized + 'static>() -> Key {
        Key::Many(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Get the type or trait name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Service(_, name) | Key::Many(_, name) => name,
        }
    }

    /// The `TypeId` of the service (the element type for collections).
    pub fn type_id(&self) -> TypeId {
        match self {
            Key::Service(id, _) | Key::Many(id, _) => *id,
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, Key::Many(..))
    }

    /// The single-service key of a collection's elements.
    pub fn item(&self) -> Key {
        match *self {
            Key::Service(id, name) | Key::Many(id, name) => Key::Service(id, name),
        }
    }
}

// TypeId-only comparison; the name is diagnostic
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Service(a, _), Key::Service(b, _)) => a == b,
            (Key::Many(a, _), Key::Many(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Service(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::Many(id, _) => {
                1u8.hash(state);
                id.hash(state);
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Service(_, name) => f.write_str(name),
            Key::Many(_, name) => write!(f, "[{}]", name),
        }
    }
}

/// Identity of a realized instance in a lifetime store.
///
/// `slot` counts registrations of the same service from the end, so the last
/// registration (the one a single resolution picks) always has slot 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub key: Key,
    pub slot: usize,
}

impl CacheKey {
    pub fn new(key: Key, slot: usize) -> Self {
        Self { key, slot }
    }
}

// Helper function for creating type keys
#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> Key {
    Key::of::<T>()
}
