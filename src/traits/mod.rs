//! Core traits for the resolution engine.

mod dispose;
mod resolver;

pub use dispose::{AsyncDispose, Disposable, Dispose, DisposeError};
pub use resolver::{Resolver, ResolverCore};
