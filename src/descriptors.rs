//! Service descriptors and the capability descriptors that replace reflection.
//!
//! An implementation type describes itself through [`Injectable`]: the list of
//! constructors it offers, each derived from a plain closure whose argument
//! types name the dependencies. The call-site builder inspects these once per
//! requested service and treats the result as immutable data afterwards.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::provider::Scope;
use crate::traits::{Disposable, Dispose};

/// Type-erased realized instance.
///
/// Always wraps an `Arc<S>` for the service type `S`, so sized types and trait
/// objects share one storage shape.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) fn erase<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> AnyArc {
    Arc::new(value)
}

pub(crate) fn downcast<S: ?Sized + Send + Sync + 'static>(value: &AnyArc) -> DiResult<Arc<S>> {
    value
        .downcast_ref::<Arc<S>>()
        .cloned()
        .ok_or(DiError::TypeMismatch(std::any::type_name::<S>()))
}

/// Realized values of an enumerable call-site, in registration order.
pub(crate) struct ServiceList(pub(crate) Vec<AnyArc>);

/// A freshly constructed value together with its disposal capability.
pub(crate) struct Constructed {
    pub(crate) value: AnyArc,
    pub(crate) disposal: Option<Disposable>,
}

impl Constructed {
    pub(crate) fn untracked(value: AnyArc) -> Self {
        Self { value, disposal: None }
    }
}

pub(crate) type ConstructorInvoker = Arc<dyn Fn(Vec<AnyArc>) -> DiResult<Constructed> + Send + Sync>;
pub(crate) type FactoryFn = Arc<dyn Fn(&Scope) -> DiResult<Constructed> + Send + Sync>;

// ===== Dependencies =====

/// A constructor parameter type.
///
/// `Arc<T>` depends on the single service `T`; `Vec<Arc<T>>` depends on every
/// registration of `T` and is always resolvable (possibly empty).
pub trait Dependency: Sized + 'static {
    fn key() -> Key;

    fn extract(value: AnyArc) -> DiResult<Self>;
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Arc<T> {
    fn key() -> Key {
        Key::of::<T>()
    }

    fn extract(value: AnyArc) -> DiResult<Self> {
        downcast::<T>(&value)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Vec<Arc<T>> {
    fn key() -> Key {
        Key::many::<T>()
    }

    fn extract(value: AnyArc) -> DiResult<Self> {
        let list = downcast::<ServiceList>(&value)?;
        list.0.iter().map(downcast::<T>).collect()
    }
}

/// Resolved constructor arguments, consumed positionally.
pub struct Arguments {
    values: std::vec::IntoIter<AnyArc>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<AnyArc>) -> Self {
        Self { values: values.into_iter() }
    }

    /// Take the next argument as `D`.
    pub fn next<D: Dependency>(&mut self) -> DiResult<D> {
        let value = self
            .values
            .next()
            .ok_or(DiError::TypeMismatch(std::any::type_name::<D>()))?;
        D::extract(value)
    }
}

// ===== Constructors =====

/// A closure usable as a constructor: `Fn(A1, ..., An) -> T` where every
/// argument is a [`Dependency`].
pub trait ConstructorFn<Args, T>: Send + Sync + 'static {
    fn params() -> Vec<Key>;

    fn construct(&self, args: Arguments) -> DiResult<T>;
}

macro_rules! impl_constructor_fn {
    ($($arg:ident),*) => {
        impl<F, T, $($arg,)*> ConstructorFn<($($arg,)*), T> for F
        where
            F: Fn($($arg),*) -> T + Send + Sync + 'static,
            $($arg: Dependency,)*
        {
            fn params() -> Vec<Key> {
                vec![$(<$arg as Dependency>::key()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn construct(&self, mut args: Arguments) -> DiResult<T> {
                $(let $arg = args.next::<$arg>()?;)*
                Ok((self)($($arg),*))
            }
        }
    };
}

impl_constructor_fn!();
impl_constructor_fn!(A1);
impl_constructor_fn!(A1, A2);
impl_constructor_fn!(A1, A2, A3);
impl_constructor_fn!(A1, A2, A3, A4);
impl_constructor_fn!(A1, A2, A3, A4, A5);
impl_constructor_fn!(A1, A2, A3, A4, A5, A6);
impl_constructor_fn!(A1, A2, A3, A4, A5, A6, A7);
impl_constructor_fn!(A1, A2, A3, A4, A5, A6, A7, A8);

/// One constructor of an implementation type.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Constructor, Key};
/// use std::sync::Arc;
///
/// struct Config;
/// trait Sink: Send + Sync {}
///
/// struct Pipeline {
///     config: Arc<Config>,
///     sinks: Vec<Arc<dyn Sink>>,
/// }
///
/// let ctor = Constructor::new(|config: Arc<Config>, sinks: Vec<Arc<dyn Sink>>| Pipeline { config, sinks });
/// assert_eq!(ctor.params(), &[Key::of::<Config>(), Key::many::<dyn Sink>()]);
/// ```
pub struct Constructor<T> {
    params: Vec<Key>,
    invoke: Arc<dyn Fn(Arguments) -> DiResult<T> + Send + Sync>,
}

impl<T: Send + Sync + 'static> Constructor<T> {
    pub fn new<Args, F>(f: F) -> Self
    where
        F: ConstructorFn<Args, T>,
    {
        Self {
            params: F::params(),
            invoke: Arc::new(move |args: Arguments| f.construct(args)),
        }
    }

    /// A constructor with explicit parameter keys and a fallible body.
    pub fn from_parts<F>(params: Vec<Key>, f: F) -> Self
    where
        F: Fn(Arguments) -> DiResult<T> + Send + Sync + 'static,
    {
        Self {
            params,
            invoke: Arc::new(f),
        }
    }

    pub fn params(&self) -> &[Key] {
        &self.params
    }
}

/// An implementation type the engine can construct.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Constructor, Disposable, Dispose, DisposeError, Injectable};
/// use std::sync::Arc;
///
/// struct Connection;
///
/// impl Dispose for Connection {
///     fn dispose(&self) -> Result<(), DisposeError> { Ok(()) }
/// }
///
/// impl Injectable for Connection {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(|| Connection)]
///     }
///
///     fn disposal(this: &Arc<Self>) -> Option<Disposable> {
///         Some(Disposable::sync(this))
///     }
/// }
/// ```
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Every constructor the engine may choose from.
    fn constructors() -> Vec<Constructor<Self>>;

    /// Disposal capability of a constructed instance; `None` when not disposable.
    fn disposal(_this: &Arc<Self>) -> Option<Disposable> {
        None
    }
}

pub(crate) struct ErasedConstructor {
    pub(crate) params: Vec<Key>,
    pub(crate) invoke: ConstructorInvoker,
}

/// Erased constructor set of an implementation type.
pub struct ImplementationType {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) constructors: Vec<ErasedConstructor>,
}

impl ImplementationType {
    /// `T` implementing the service `T` itself.
    pub fn of<T: Injectable>() -> Self {
        Self::bound::<T, T>(|value| value)
    }

    /// `T` implementing service `S` through `upcast` (typically `|t| t`).
    pub fn bound<S, T>(upcast: fn(Arc<T>) -> Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        let constructors = T::constructors()
            .into_iter()
            .map(|ctor| {
                let typed = ctor.invoke;
                let invoke: ConstructorInvoker = Arc::new(move |args: Vec<AnyArc>| {
                    let instance = Arc::new(typed(Arguments::new(args))?);
                    let disposal = T::disposal(&instance);
                    Ok(Constructed {
                        value: erase(upcast(instance)),
                        disposal,
                    })
                });
                ErasedConstructor {
                    params: ctor.params,
                    invoke,
                }
            })
            .collect();

        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            constructors,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Parameter keys of every constructor, in declaration order.
    pub fn constructor_params(&self) -> Vec<&[Key]> {
        self.constructors.iter().map(|c| c.params.as_slice()).collect()
    }
}

// ===== Service descriptors =====

#[derive(Clone)]
pub(crate) enum ImplementationSource {
    Type(Arc<ImplementationType>),
    Factory(FactoryFn),
    Instance(AnyArc),
}

/// One registration: service key, lifetime and implementation source.
///
/// Descriptors are immutable once built; their relative order defines
/// enumeration order for collection resolution.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{ServiceCollection, ServiceDescriptor, Lifetime, Key};
///
/// struct Database { url: String }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_scoped_factory::<String, _>(|_| "request".to_string());
///
/// let descriptors = services.get_service_descriptors();
/// assert_eq!(descriptors.len(), 2);
/// assert_eq!(descriptors[0].key(), Key::of::<Database>());
/// assert_eq!(descriptors[0].lifetime(), Lifetime::Singleton);
/// assert_eq!(descriptors[1].lifetime(), Lifetime::Scoped);
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    key: Key,
    lifetime: Lifetime,
    source: ImplementationSource,
}

impl ServiceDescriptor {
    /// `T` constructed through its [`Injectable`] constructors.
    pub fn of_type<T: Injectable>(lifetime: Lifetime) -> Self {
        Self::with_implementation(Key::of::<T>(), lifetime, ImplementationType::of::<T>())
    }

    /// Service `S` implemented by `T`.
    pub fn bind<S, T>(lifetime: Lifetime, upcast: fn(Arc<T>) -> Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        Self::with_implementation(Key::of::<S>(), lifetime, ImplementationType::bound::<S, T>(upcast))
    }

    /// Service `key` implemented by a prepared [`ImplementationType`].
    ///
    /// The implementation must produce values of the service type `key` names.
    pub fn with_implementation(key: Key, lifetime: Lifetime, implementation: ImplementationType) -> Self {
        Self {
            key: key.item(),
            lifetime,
            source: ImplementationSource::Type(Arc::new(implementation)),
        }
    }

    /// Service `S` produced by a factory receiving the current scope.
    pub fn factory<S, F>(lifetime: Lifetime, factory: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Scope) -> Arc<S> + Send + Sync + 'static,
    {
        Self::try_factory::<S, _>(lifetime, move |scope| Ok(factory(scope)))
    }

    /// Fallible variant of [`factory`](Self::factory).
    pub fn try_factory<S, F>(lifetime: Lifetime, factory: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&Scope) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |scope: &Scope| {
            factory(scope).map(|value| Constructed::untracked(erase(value)))
        });
        Self {
            key: Key::of::<S>(),
            lifetime,
            source: ImplementationSource::Factory(factory),
        }
    }

    /// Service `T` produced by a factory; the result is tracked for disposal.
    pub fn disposable_factory<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Dispose,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |scope: &Scope| {
            let instance = Arc::new(factory(scope));
            let disposal = Some(Disposable::sync(&instance));
            Ok(Constructed {
                value: erase(instance),
                disposal,
            })
        });
        Self {
            key: Key::of::<T>(),
            lifetime,
            source: ImplementationSource::Factory(factory),
        }
    }

    /// A pre-built singleton instance. Instances are never disposed by the engine.
    pub fn instance<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Self {
        Self {
            key: Key::of::<S>(),
            lifetime: Lifetime::Singleton,
            source: ImplementationSource::Instance(erase(value)),
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Get the service type/trait name
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    /// Implementation type name, when registered by type
    pub fn implementation_name(&self) -> Option<&'static str> {
        match &self.source {
            ImplementationSource::Type(imp) => Some(imp.name),
            _ => None,
        }
    }

    pub fn is_factory(&self) -> bool {
        matches!(self.source, ImplementationSource::Factory(_))
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.source, ImplementationSource::Instance(_))
    }

    pub(crate) fn source(&self) -> &ImplementationSource {
        &self.source
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            ImplementationSource::Type(imp) => imp.name,
            ImplementationSource::Factory(_) => "<factory>",
            ImplementationSource::Instance(_) => "<instance>",
        };
        f.debug_struct("ServiceDescriptor")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("implementation", &source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf;
    struct Branch {
        leaf: Arc<Leaf>,
        extras: Vec<Arc<Leaf>>,
    }

    #[test]
    fn constructor_params_follow_argument_types() {
        let ctor = Constructor::new(|leaf: Arc<Leaf>, extras: Vec<Arc<Leaf>>| Branch { leaf, extras });
        assert_eq!(ctor.params(), &[Key::of::<Leaf>(), Key::many::<Leaf>()]);
    }

    #[test]
    fn constructor_invokes_with_positional_arguments() {
        let ctor = Constructor::new(|leaf: Arc<Leaf>, extras: Vec<Arc<Leaf>>| Branch { leaf, extras });
        let leaf = Arc::new(Leaf);
        let list: AnyArc = erase(Arc::new(ServiceList(vec![erase(leaf.clone()), erase(leaf.clone())])));

        let branch = (ctor.invoke)(Arguments::new(vec![erase(leaf.clone()), list])).unwrap();
        assert!(Arc::ptr_eq(&branch.leaf, &leaf));
        assert_eq!(branch.extras.len(), 2);
    }

    #[test]
    fn missing_argument_is_a_type_mismatch() {
        let ctor = Constructor::new(|leaf: Arc<Leaf>| Branch { leaf, extras: Vec::new() });
        assert!(matches!(
            (ctor.invoke)(Arguments::new(Vec::new())),
            Err(DiError::TypeMismatch(_))
        ));
    }

    #[test]
    fn downcast_rejects_wrong_type() {
        let value = erase(Arc::new(5u32));
        assert!(downcast::<u32>(&value).is_ok());
        assert!(matches!(downcast::<u64>(&value), Err(DiError::TypeMismatch(_))));
    }
}
