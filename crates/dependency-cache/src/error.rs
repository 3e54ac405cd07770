//! Error types for the dependency cache

use std::convert::Infallible;
use std::fmt;

/// Errors surfaced by cache operations.
///
/// `E` is the error type of the upstream fetch. Operations that never fetch
/// (`try_get`, `invalidate_dependency`) use the default `Infallible`.
#[derive(Debug)]
pub enum CacheError<E = Infallible> {
    /// Null or empty key, or another caller mistake. Never retried.
    InvalidArgument(String),
    /// The upstream fetch failed. Nothing was cached.
    Fetch(E),
}

impl<E> CacheError<E> {
    pub(crate) fn empty_key(operation: &str) -> Self {
        CacheError::InvalidArgument(format!("{operation}: key must not be empty"))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, CacheError::InvalidArgument(_))
    }
}

impl CacheError {
    /// Lift a fetch-free error into one carrying any fetch error type
    pub fn widen<E>(self) -> CacheError<E> {
        match self {
            CacheError::InvalidArgument(msg) => CacheError::InvalidArgument(msg),
            CacheError::Fetch(never) => match never {},
        }
    }
}

impl<E: fmt::Display> fmt::Display for CacheError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CacheError::Fetch(err) => write!(f, "Fetch failed: {}", err),
        }
    }
}

impl<E> std::error::Error for CacheError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Fetch(err) => Some(err),
            CacheError::InvalidArgument(_) => None,
        }
    }
}

pub type Result<T, E = Infallible> = std::result::Result<T, CacheError<E>>;
