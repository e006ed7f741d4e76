//! Disposal traits for resource cleanup.

use std::sync::Arc;

use crate::error::{DiError, DisposalFailure};

/// Error returned by a disposable.
pub type DisposeError = Box<dyn std::error::Error + Send + Sync>;

/// Trait for synchronous resource disposal.
///
/// Implement this trait for services that need structured teardown (flushing
/// caches, closing connections). Tracked instances are disposed in reverse
/// construction order when their owning scope is disposed.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{Dispose, DisposeError};
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> Result<(), DisposeError> {
///         println!("Flushing cache: {}", self.name);
///         Ok(())
///     }
/// }
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self) -> Result<(), DisposeError>;
}

/// Trait for asynchronous resource disposal.
///
/// Async disposal is preferred by [`Scope::dispose_async`](crate::Scope::dispose_async);
/// a synchronous `dispose` of an async-only service reports
/// [`DiError::AsyncDisposalRequired`].
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose_async(&self) -> Result<(), DisposeError>;
}

/// The disposal capability of one constructed instance.
///
/// Returned from [`Injectable::disposal`](crate::Injectable::disposal) to opt
/// an implementation type into disposal tracking.
#[derive(Clone)]
pub struct Disposable {
    service: &'static str,
    sync: Option<Arc<dyn Dispose>>,
    asynchronous: Option<Arc<dyn AsyncDispose>>,
}

impl Disposable {
    /// Track `service` for synchronous disposal.
    pub fn sync<T: Dispose>(service: &Arc<T>) -> Self {
        Self {
            service: std::any::type_name::<T>(),
            sync: Some(service.clone() as Arc<dyn Dispose>),
            asynchronous: None,
        }
    }

    /// Track `service` for asynchronous disposal only.
    pub fn asynchronous<T: AsyncDispose>(service: &Arc<T>) -> Self {
        Self {
            service: std::any::type_name::<T>(),
            sync: None,
            asynchronous: Some(service.clone() as Arc<dyn AsyncDispose>),
        }
    }

    /// Track `service` for both; async teardown prefers `dispose_async`.
    pub fn both<T: Dispose + AsyncDispose>(service: &Arc<T>) -> Self {
        Self {
            service: std::any::type_name::<T>(),
            sync: Some(service.clone() as Arc<dyn Dispose>),
            asynchronous: Some(service.clone() as Arc<dyn AsyncDispose>),
        }
    }

    pub fn service_name(&self) -> &'static str {
        self.service
    }

    pub fn supports_sync(&self) -> bool {
        self.sync.is_some()
    }

    pub(crate) fn dispose(&self) -> Result<(), DisposalFailure> {
        match &self.sync {
            Some(d) => d.dispose().map_err(|e| self.failure(e.to_string())),
            None => Err(self.failure(DiError::AsyncDisposalRequired(self.service).to_string())),
        }
    }

    pub(crate) async fn dispose_async(&self) -> Result<(), DisposalFailure> {
        if let Some(d) = &self.asynchronous {
            return d.dispose_async().await.map_err(|e| self.failure(e.to_string()));
        }
        self.dispose()
    }

    fn failure(&self, message: String) -> DisposalFailure {
        DisposalFailure {
            service: self.service,
            message,
        }
    }
}

impl std::fmt::Debug for Disposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposable")
            .field("service", &self.service)
            .field("sync", &self.sync.is_some())
            .field("async", &self.asynchronous.is_some())
            .finish()
    }
}
