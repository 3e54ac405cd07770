//! Revocation tokens: the liveness flag behind a dependency tag

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared liveness flag for one tag.
///
/// Clones share the same flag. Once revoked a token stays dead; the registry
/// replaces it with a fresh token the next time the tag is referenced.
#[derive(Clone, Default)]
pub struct RevocationToken {
    revoked: Arc<AtomicBool>,
}

impl RevocationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke the token. Returns `true` only for the call that flipped it.
    pub fn revoke(&self) -> bool {
        // Release pairs with the Acquire in `is_revoked`
        !self.revoked.swap(true, Ordering::AcqRel)
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    /// Whether both handles refer to the same underlying token
    pub fn ptr_eq(&self, other: &RevocationToken) -> bool {
        Arc::ptr_eq(&self.revoked, &other.revoked)
    }
}

impl fmt::Debug for RevocationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevocationToken")
            .field("revoked", &self.is_revoked())
            .finish()
    }
}
