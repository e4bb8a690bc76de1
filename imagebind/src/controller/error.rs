//! Controller error types.

use thiserror::Error;

use super::lifecycle::{LifecycleEvent, LifecycleState};
use crate::fetch::ElementId;

/// Result type for controller operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Events the host delivered out of order.
///
/// A rejected event leaves the controller untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The event is not valid in the current state.
    #[error("Element {element}: cannot {event} while {from}")]
    InvalidTransition {
        element: ElementId,
        from: LifecycleState,
        event: LifecycleEvent,
    },

    /// The element was already unmounted.
    #[error("Element {element} is unmounted; {event} rejected")]
    Terminated {
        element: ElementId,
        event: LifecycleEvent,
    },
}
