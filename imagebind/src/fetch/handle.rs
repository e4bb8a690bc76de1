//! Cancellable handles to fetch operations.

use std::fmt;

/// The cancel side of an in-flight operation.
///
/// A [`ResourceHandle`] calls `release` at most once. Implementations must
/// still tolerate being called after the operation has completed.
pub trait Release: Send {
    fn release(&self);
}

/// Handle to one outstanding fetch or prefetch.
///
/// Releasing is idempotent: only the first [`release`](Self::release) reaches
/// the underlying operation. A handle that is dropped while still open is
/// released on drop, so a handle can never leak past its owner.
pub struct ResourceHandle {
    inner: Option<Box<dyn Release>>,
}

impl ResourceHandle {
    /// Wrap a cancel callback.
    pub fn new(release: impl Release + 'static) -> Self {
        Self {
            inner: Some(Box::new(release)),
        }
    }

    /// Cancel the operation.
    ///
    /// Returns `true` if this call performed the release, `false` if the
    /// handle was already released.
    pub fn release(&mut self) -> bool {
        match self.inner.take() {
            Some(release) => {
                release.release();
                true
            }
            None => false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        if self.release() {
            tracing::trace!("Resource handle released on drop");
        }
    }
}
