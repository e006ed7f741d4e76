//! Resolver traits for service resolution.

use std::sync::Arc;

use crate::descriptors::{AnyArc, Dependency};
use crate::error::{DiError, DiResult};
use crate::key::Key;

/// Object-safe core of every resolver.
///
/// Implemented by [`ServiceProvider`](crate::ServiceProvider) (root scope) and
/// [`Scope`](crate::Scope). `Ok(None)` means the key has no binding.
pub trait ResolverCore: Send + Sync {
    fn resolve_key(&self, key: Key) -> DiResult<Option<AnyArc>>;
}

/// Typed resolution helpers over [`ResolverCore`].
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{ServiceCollection, Resolver};
///
/// trait Plugin: Send + Sync {
///     fn name(&self) -> &'static str;
/// }
/// struct First;
/// impl Plugin for First { fn name(&self) -> &'static str { "first" } }
/// struct Second;
/// impl Plugin for Second { fn name(&self) -> &'static str { "second" } }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(42u32);
/// services.add_singleton_trait::<dyn Plugin>(std::sync::Arc::new(First));
/// services.add_singleton_trait::<dyn Plugin>(std::sync::Arc::new(Second));
///
/// let provider = services.build();
/// assert_eq!(*provider.get::<u32>().unwrap(), 42);
/// assert!(provider.try_get::<String>().unwrap().is_none());
///
/// // The last registration wins for single resolution
/// assert_eq!(provider.get::<dyn Plugin>().unwrap().name(), "second");
///
/// let names: Vec<_> = provider.get_all::<dyn Plugin>().unwrap()
///     .iter().map(|p| p.name()).collect();
/// assert_eq!(names, vec!["first", "second"]);
/// ```
pub trait Resolver: ResolverCore {
    /// Resolve `T`, or `Ok(None)` when it has no binding.
    fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        match self.resolve_key(Key::of::<T>())? {
            Some(any) => <Arc<T> as Dependency>::extract(any).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve `T`, failing with [`DiError::NotFound`] when it has no binding.
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.try_get::<T>()?
            .ok_or(DiError::NotFound(std::any::type_name::<T>()))
    }

    /// Resolve every registration of `T` in registration order.
    fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        match self.resolve_key(Key::many::<T>())? {
            Some(any) => <Vec<Arc<T>> as Dependency>::extract(any),
            None => Ok(Vec::new()),
        }
    }

    fn get_required<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {:?}", std::any::type_name::<T>(), e))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
