//! # ferrous-resolve
//!
//! A dependency-resolution engine: from an ordered set of service
//! registrations it builds an immutable call-site graph per requested service,
//! executes it with an interpreter, a closure compiler or a flattened
//! specialized program, and promotes hot services from the slow tier to the
//! fast ones as they are used.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped and Transient services, with disposal
//!   tracking and reverse-order teardown per scope
//! - **Constructor selection**: implementation types list their constructors;
//!   the engine picks the one with the most resolvable parameters
//! - **Collections**: every registration of a service resolves as `Vec<Arc<T>>`
//! - **Validation**: circular dependencies, ambiguous constructors, scoped
//!   services leaking into singletons or the root scope
//! - **Tiered execution**: interpreted, compiled and specialized strategies
//!   with adaptive promotion
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_resolve::{Constructor, Injectable, Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(|db: Arc<Database>| UserService { db })]
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! services.add_transient_type::<UserService>();
//!
//! let provider = services.build();
//! let user_service = provider.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: Created once per provider and cached in the root scope
//! - **Scoped**: Created once per scope (ideal for request contexts)
//! - **Transient**: Created fresh on every resolution
//!
//! ## Execution strategies
//!
//! ```rust
//! use ferrous_resolve::{
//!     PromotionPolicy, ProviderOptions, Resolver, ResolverMode, ResolverStrategy, ServiceCollection,
//! };
//!
//! let mut services = ServiceCollection::new();
//! services.add_transient_factory::<String, _>(|_| "fresh".to_string());
//!
//! let options = ProviderOptions::default()
//!     .with_mode(ResolverMode::Adaptive)
//!     .with_promotion(PromotionPolicy { threshold: 2, background: false });
//! let provider = services.build_with_options(options).unwrap();
//!
//! provider.get_required::<String>();
//! assert_eq!(provider.strategy::<String>(), Some(ResolverStrategy::Interpreted));
//!
//! // the second call promotes the accessor
//! provider.get_required::<String>();
//! assert_eq!(provider.strategy::<String>(), Some(ResolverStrategy::Specialized));
//! ```

pub mod call_site;
pub mod collection;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod provider;
pub mod resolver;
pub mod traits;

// Internal modules
mod internal;
mod registration;
mod validation;

pub use call_site::{CallSite, CallSiteKind};
pub use collection::ServiceCollection;
pub use config::{PromotionPolicy, ProviderOptions, ResolverMode};
pub use descriptors::{
    AnyArc, Arguments, Constructor, ConstructorFn, Dependency, ImplementationType, Injectable, ServiceDescriptor,
};
pub use error::{DiError, DiResult, DisposalFailure};
pub use key::{key_of_type, CacheKey, Key};
pub use lifetime::Lifetime;
pub use observer::{ResolutionListener, TracingListener};
pub use provider::{Scope, ScopeFactory, ServiceProvider};
pub use resolver::ResolverStrategy;
pub use traits::{AsyncDispose, Disposable, Dispose, DisposeError, Resolver, ResolverCore};
