//! Error types for the resolution engine.

use std::fmt;

/// A single disposable that failed during scope teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposalFailure {
    /// Type name of the disposable service
    pub service: &'static str,
    /// Error reported by the disposable
    pub message: String,
}

impl fmt::Display for DisposalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.service, self.message)
    }
}

/// Dependency resolution errors
///
/// Represents the error conditions that can occur while building call-site
/// graphs, resolving services, or tearing scopes down.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.get::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use ferrous_resolve::DiError;
///
/// let circular = DiError::Circular(vec!["ServiceA", "ServiceB", "ServiceA"]);
/// assert_eq!(circular.to_string(), "Circular dependency: ServiceA -> ServiceB -> ServiceA");
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// Service not registered
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// A constructor parameter has no binding
    #[error("Unable to resolve {dependency} while attempting to activate {service}")]
    MissingDependency {
        service: &'static str,
        dependency: &'static str,
    },
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Several constructors tie for the greatest resolvable arity
    #[error("Ambiguous constructors on {implementation}: more than one accepts {arity} resolvable parameters")]
    AmbiguousConstructor {
        implementation: &'static str,
        arity: usize,
    },
    /// The implementation type declares no constructor
    #[error("No constructor declared for {0}")]
    NoConstructor(&'static str),
    /// A scoped service is reachable from a root-level resolution
    #[error("{}", scoped_from_root(.service, .scoped))]
    ScopedFromRoot {
        service: &'static str,
        scoped: &'static str,
    },
    /// A singleton captures a scoped dependency
    #[error("Cannot consume scoped service {scoped} from singleton {singleton}")]
    ScopedFromSingleton {
        singleton: &'static str,
        scoped: &'static str,
    },
    /// Resolution or capture against a disposed scope
    #[error("Cannot access a disposed scope")]
    ScopeDisposed,
    /// Synchronous disposal requested for an async-only disposable
    #[error("{0} only supports asynchronous disposal; use dispose_async")]
    AsyncDisposalRequired(&'static str),
    /// One or more disposables failed during teardown
    #[error("Disposal failed: {}", join_failures(.0))]
    Disposal(Vec<DisposalFailure>),
    /// Build-time validation failures
    #[error("Some services are not able to be constructed: {}", join_errors(.0))]
    Validation(Vec<DiError>),
    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Invalid provider configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn scoped_from_root(service: &str, scoped: &str) -> String {
    if service == scoped {
        format!("Cannot resolve scoped service {} from root provider", scoped)
    } else {
        format!(
            "Cannot resolve {} from root provider because it requires scoped service {}",
            service, scoped
        )
    }
}

fn join_failures(failures: &[DisposalFailure]) -> String {
    failures.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; ")
}

fn join_errors(errors: &[DiError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

/// Result type for DI operations
///
/// A convenience type alias for `Result<T, DiError>` used throughout the crate.
pub type DiResult<T> = Result<T, DiError>;
