//! Lifecycle states and the transition table.
//!
//! ```text
//! Unprepared --prepare--> Prepared --mount--> Mounted --bind--> Bound
//!      |                     |                   ^  |             |
//!      +-------mount---------+                   |  +---bind------+
//!                                          Unbound <---unbind-----+
//!
//! any non-terminal state --unmount--> Unmounted (terminal)
//! ```
//!
//! Visibility events never change the lifecycle state but are rejected once
//! the element is unmounted.

use std::fmt;

use crate::visibility::VisibilityBand;

/// Where an element is in its attachment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Unprepared,
    Prepared,
    Mounted,
    Bound,
    Unbound,
    Unmounted,
}

impl LifecycleState {
    /// The state after `event`, or `None` if the event is not allowed here.
    pub fn after(self, event: LifecycleEvent) -> Option<LifecycleState> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        match (self, event) {
            (S::Unmounted, _) => None,
            (_, E::Enter(_) | E::Exit(_) | E::Observe | E::UpdateProps | E::BoundsDefined) => {
                Some(self)
            }
            (S::Unprepared, E::Prepare) => Some(S::Prepared),
            (S::Unprepared | S::Prepared, E::Mount) => Some(S::Mounted),
            (S::Mounted | S::Unbound, E::Bind) => Some(S::Bound),
            (S::Bound, E::Unbind) => Some(S::Unbound),
            (_, E::Unmount) => Some(S::Unmounted),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Unmounted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Unprepared => "unprepared",
            LifecycleState::Prepared => "prepared",
            LifecycleState::Mounted => "mounted",
            LifecycleState::Bound => "bound",
            LifecycleState::Unbound => "unbound",
            LifecycleState::Unmounted => "unmounted",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything the host can deliver to a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Prepare,
    Mount,
    Bind,
    Unbind,
    Unmount,
    Enter(VisibilityBand),
    Exit(VisibilityBand),
    Observe,
    UpdateProps,
    BoundsDefined,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Prepare => write!(f, "prepare"),
            LifecycleEvent::Mount => write!(f, "mount"),
            LifecycleEvent::Bind => write!(f, "bind"),
            LifecycleEvent::Unbind => write!(f, "unbind"),
            LifecycleEvent::Unmount => write!(f, "unmount"),
            LifecycleEvent::Enter(band) => write!(f, "enter({})", band),
            LifecycleEvent::Exit(band) => write!(f, "exit({})", band),
            LifecycleEvent::Observe => write!(f, "observe"),
            LifecycleEvent::UpdateProps => write!(f, "update props"),
            LifecycleEvent::BoundsDefined => write!(f, "define bounds"),
        }
    }
}
