//! Single-owner cell for a cancellable handle.

use crate::fetch::ResourceHandle;

/// Holds at most one live [`ResourceHandle`].
///
/// Replacing the handle releases the old one first, and clearing is
/// idempotent, so a slot can neither leak nor double-release. Dropping the
/// slot releases whatever it still holds.
///
/// A slot belongs to exactly one element and is only touched from that
/// element's event sequence; it carries no synchronization of its own.
#[derive(Debug, Default)]
pub struct ResourceSlot {
    current: Option<ResourceHandle>,
}

impl ResourceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handle`, releasing any handle already present.
    ///
    /// Returns `true` if an older handle was released.
    pub fn set(&mut self, handle: ResourceHandle) -> bool {
        let released = self.clear();
        debug_assert!(self.current.is_none());
        self.current = Some(handle);
        released
    }

    /// Release the stored handle, if any, and leave the slot empty.
    ///
    /// Returns `true` if a handle was released by this call.
    pub fn clear(&mut self) -> bool {
        match self.current.take() {
            Some(mut handle) => {
                let released = handle.release();
                tracing::trace!(released, "Slot cleared");
                released
            }
            None => false,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Release;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingRelease(Arc<AtomicUsize>);

    impl Release for CountingRelease {
        fn release(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counted() -> (ResourceHandle, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (ResourceHandle::new(CountingRelease(count.clone())), count)
    }

    #[test]
    fn test_clear_twice_releases_once() {
        let (handle, count) = counted();
        let mut slot = ResourceSlot::new();
        slot.set(handle);

        assert!(slot.clear());
        assert!(!slot.clear());
        assert!(!slot.is_occupied());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_releases_previous_handle() {
        let (first, first_count) = counted();
        let (second, second_count) = counted();
        let mut slot = ResourceSlot::new();

        assert!(!slot.set(first));
        assert!(slot.set(second));

        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 0);
        assert!(slot.is_occupied());
    }

    #[test]
    fn test_set_with_already_released_handle_is_harmless() {
        let (mut first, count) = counted();
        first.release();
        let mut slot = ResourceSlot::new();
        slot.set(first);

        assert!(!slot.clear());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_held_handle() {
        let (handle, count) = counted();
        {
            let mut slot = ResourceSlot::new();
            slot.set(handle);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_on_empty_slot() {
        let mut slot = ResourceSlot::new();
        assert!(!slot.clear());
    }
}
