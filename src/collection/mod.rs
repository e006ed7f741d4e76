//! Service collection module for registering services.
//!
//! This module contains the ServiceCollection type: the registration surface
//! that produces the ordered descriptor list and builds a provider from it.

use std::sync::Arc;

use crate::config::ProviderOptions;
use crate::descriptors::{Injectable, ServiceDescriptor};
use crate::error::DiResult;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::observer::{Listeners, ResolutionListener};
use crate::provider::{Scope, ServiceProvider};
use crate::traits::Dispose;

/// Ordered set of service registrations.
///
/// Registration order matters: a single resolution uses the last registration
/// of a service, and collection resolution returns every registration in the
/// order it was added.
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    listeners: Vec<Arc<dyn ResolutionListener>>,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Append a prepared descriptor.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Append `descriptor` only if its service has no registration yet.
    ///
    /// Returns whether the descriptor was added.
    pub fn try_add(&mut self, descriptor: ServiceDescriptor) -> bool {
        if self.contains_key(descriptor.key()) {
            return false;
        }
        self.descriptors.push(descriptor);
        true
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.contains_key(Key::of::<T>())
    }

    fn contains_key(&self, key: Key) -> bool {
        self.descriptors.iter().any(|d| d.key() == key)
    }

    // ----- Instances -----

    /// Registers a singleton instance that will be shared across the entire application.
    ///
    /// Registered instances are owned by the caller's `Arc` graph and are never
    /// disposed by the provider.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_resolve::ServiceCollection;
    /// struct Config {
    ///     database_url: String
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Config {
    ///     database_url: "postgres://localhost".to_string()
    /// });
    /// ```
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.add(ServiceDescriptor::instance(Arc::new(value)))
    }

    /// Registers a singleton trait object instance.
    pub fn add_singleton_trait<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> &mut Self {
        self.add(ServiceDescriptor::instance(value))
    }

    pub fn try_add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> bool {
        self.try_add(ServiceDescriptor::instance(Arc::new(value)))
    }

    // ----- Constructor-based registrations -----

    /// Registers `T`, constructed through its [`Injectable`] constructors, as a singleton.
    pub fn add_singleton_type<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::of_type::<T>(Lifetime::Singleton))
    }

    pub fn add_scoped_type<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::of_type::<T>(Lifetime::Scoped))
    }

    pub fn add_transient_type<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::of_type::<T>(Lifetime::Transient))
    }

    /// Registers service `S` implemented by `T` as a singleton.
    ///
    /// `upcast` converts the constructed `Arc<T>` into the service type,
    /// usually just `|t| t`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_resolve::{Constructor, Injectable, Resolver, ServiceCollection};
    ///
    /// trait Greeter: Send + Sync {
    ///     fn greet(&self) -> String;
    /// }
    ///
    /// struct English;
    /// impl Greeter for English {
    ///     fn greet(&self) -> String { "hello".to_string() }
    /// }
    /// impl Injectable for English {
    ///     fn constructors() -> Vec<Constructor<Self>> {
    ///         vec![Constructor::new(|| English)]
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_as::<dyn Greeter, English>(|english| english);
    ///
    /// let provider = services.build();
    /// assert_eq!(provider.get_required::<dyn Greeter>().greet(), "hello");
    /// ```
    pub fn add_singleton_as<S, T>(&mut self, upcast: fn(Arc<T>) -> Arc<S>) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        self.add(ServiceDescriptor::bind::<S, T>(Lifetime::Singleton, upcast))
    }

    pub fn add_scoped_as<S, T>(&mut self, upcast: fn(Arc<T>) -> Arc<S>) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        self.add(ServiceDescriptor::bind::<S, T>(Lifetime::Scoped, upcast))
    }

    pub fn add_transient_as<S, T>(&mut self, upcast: fn(Arc<T>) -> Arc<S>) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        self.add(ServiceDescriptor::bind::<S, T>(Lifetime::Transient, upcast))
    }

    pub fn try_add_transient_type<T: Injectable>(&mut self) -> bool {
        self.try_add(ServiceDescriptor::of_type::<T>(Lifetime::Transient))
    }

    // ----- Factories -----

    /// Registers a singleton factory.
    ///
    /// The factory runs at most once per provider, receiving the root scope.
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory::<T, _>(Lifetime::Singleton, move |scope| {
            Arc::new(factory(scope))
        }))
    }

    /// Registers a scoped factory, run at most once per scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory::<T, _>(Lifetime::Scoped, move |scope| {
            Arc::new(factory(scope))
        }))
    }

    /// Registers a transient factory, run on every resolution.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory::<T, _>(Lifetime::Transient, move |scope| {
            Arc::new(factory(scope))
        }))
    }

    pub fn try_add_scoped_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::factory::<T, _>(Lifetime::Scoped, move |scope| {
            Arc::new(factory(scope))
        }))
    }

    /// Registers a singleton factory for a trait object.
    pub fn add_singleton_trait_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Scope) -> Arc<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory::<T, _>(Lifetime::Singleton, factory))
    }

    pub fn add_scoped_trait_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Scope) -> Arc<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory::<T, _>(Lifetime::Scoped, factory))
    }

    pub fn add_transient_trait_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Scope) -> Arc<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory::<T, _>(Lifetime::Transient, factory))
    }

    /// Registers a factory whose product is disposed with its owning scope.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_resolve::{Dispose, DisposeError, Lifetime, Resolver, ServiceCollection};
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use std::sync::Arc;
    ///
    /// struct Connection {
    ///     closed: Arc<AtomicBool>,
    /// }
    ///
    /// impl Dispose for Connection {
    ///     fn dispose(&self) -> Result<(), DisposeError> {
    ///         self.closed.store(true, Ordering::SeqCst);
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let closed = Arc::new(AtomicBool::new(false));
    /// let flag = closed.clone();
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_disposable_factory(Lifetime::Scoped, move |_| Connection { closed: flag.clone() });
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope();
    /// scope.get_required::<Connection>();
    ///
    /// scope.dispose().unwrap();
    /// assert!(closed.load(Ordering::SeqCst));
    /// ```
    pub fn add_disposable_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Dispose,
        F: Fn(&Scope) -> T + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::disposable_factory::<T, _>(lifetime, factory))
    }

    // ----- Introspection and diagnostics -----

    /// Registered descriptors in registration order.
    pub fn get_service_descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Registers a listener notified of call-site builds, resolutions and promotions.
    pub fn add_listener(&mut self, listener: Arc<dyn ResolutionListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    // ----- Building -----

    /// Builds the provider with default options.
    ///
    /// Default options never fail the build; graphs are built lazily on first
    /// resolution.
    pub fn build(self) -> ServiceProvider {
        ServiceProvider::new(self.descriptors, Listeners::new(self.listeners), ProviderOptions::default())
    }

    /// Builds the provider with `options`.
    ///
    /// With `validate_on_build` set, every registered service's graph is built
    /// and validated up front and all failures are returned together as
    /// [`DiError::Validation`](crate::DiError::Validation).
    pub fn build_with_options(self, options: ProviderOptions) -> DiResult<ServiceProvider> {
        let provider = ServiceProvider::new(self.descriptors, Listeners::new(self.listeners), options);
        if options.validate_on_build {
            provider.validate()?;
        }
        Ok(provider)
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("descriptors", &self.descriptors)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
