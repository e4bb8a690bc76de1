//! Visibility band tracking.
//!
//! An element can be in the prefetch working range and, independently, in
//! exactly one distance band. [`VisibilityRangeTracker`] keeps that
//! membership and turns raw host signals into [`BandTransition`]s:
//!
//! - Entering a band while in another band of the same family first exits the
//!   old band. Entering the band already held exits and re-enters it.
//! - Exiting the working range always yields an exit, so the caller clears
//!   its slot unconditionally.
//! - Exiting a distance band the element is not in yields nothing.
//! - Bands that were not registered yield nothing.
//!
//! The tracker holds no handles and does no I/O; the controller acts on the
//! transitions.

mod range;

use std::fmt;

use serde::Deserialize;

pub use range::RangeGeometry;

use crate::config::PrefetchConfig;
use crate::policy::{decide, PrefetchOverride};

/// Named visibility ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityBand {
    /// Close enough to the viewport to prefetch.
    WorkingRange,
    /// Three or more positions below the viewport.
    Below3,
    /// Two positions below the viewport.
    Below2,
    /// Directly below the viewport.
    Below1,
    /// On screen.
    Visible,
    /// Above the viewport.
    Above,
}

impl VisibilityBand {
    /// Distance bands, farthest first.
    pub const DISTANCE_BANDS: [VisibilityBand; 5] = [
        VisibilityBand::Below3,
        VisibilityBand::Below2,
        VisibilityBand::Below1,
        VisibilityBand::Visible,
        VisibilityBand::Above,
    ];

    /// Distance to the viewport sent with priority hints.
    ///
    /// `None` for the working range, which carries no distance.
    pub fn distance(&self) -> Option<i32> {
        match self {
            VisibilityBand::WorkingRange => None,
            VisibilityBand::Below3 => Some(3),
            VisibilityBand::Below2 => Some(2),
            VisibilityBand::Below1 => Some(1),
            VisibilityBand::Visible => Some(0),
            VisibilityBand::Above => Some(-1),
        }
    }

    pub fn is_working_range(&self) -> bool {
        matches!(self, VisibilityBand::WorkingRange)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityBand::WorkingRange => "working_range",
            VisibilityBand::Below3 => "below3",
            VisibilityBand::Below2 => "below2",
            VisibilityBand::Below1 => "below1",
            VisibilityBand::Visible => "visible",
            VisibilityBand::Above => "above",
        }
    }
}

impl fmt::Display for VisibilityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A membership change the controller must act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandTransition {
    Entered(VisibilityBand),
    Exited(VisibilityBand),
}

/// Band membership for one element.
#[derive(Debug, Clone)]
pub struct VisibilityRangeTracker {
    working_range_registered: bool,
    distance_bands_registered: bool,
    in_working_range: bool,
    current: Option<VisibilityBand>,
}

impl VisibilityRangeTracker {
    pub fn new(working_range_registered: bool, distance_bands_registered: bool) -> Self {
        Self {
            working_range_registered,
            distance_bands_registered,
            in_working_range: false,
            current: None,
        }
    }

    /// Allocate a tracker only if the element needs one.
    ///
    /// The working range is registered when the override resolves to
    /// prefetching with the working range; distance bands when prioritization
    /// is enabled. Returns `None` when neither applies.
    pub fn for_element(prefetch: PrefetchOverride, config: &PrefetchConfig) -> Option<Self> {
        if !config.uses_ranges() {
            return None;
        }

        let working_range = config.prefetch_with_working_range
            && decide(prefetch, config.prefetch_with_working_range);
        let distance_bands = config.prioritize_with_working_range;

        if working_range || distance_bands {
            Some(Self::new(working_range, distance_bands))
        } else {
            None
        }
    }

    pub fn is_registered(&self, band: VisibilityBand) -> bool {
        if band.is_working_range() {
            self.working_range_registered
        } else {
            self.distance_bands_registered
        }
    }

    /// Current distance band.
    pub fn current_band(&self) -> Option<VisibilityBand> {
        self.current
    }

    pub fn in_working_range(&self) -> bool {
        self.in_working_range
    }

    /// Record entry into `band`.
    pub fn enter(&mut self, band: VisibilityBand) -> Vec<BandTransition> {
        if !self.is_registered(band) {
            tracing::trace!(band = %band, "Ignoring enter for unregistered band");
            return Vec::new();
        }

        let mut transitions = Vec::with_capacity(2);
        if band.is_working_range() {
            if self.in_working_range {
                transitions.push(BandTransition::Exited(band));
            }
            self.in_working_range = true;
        } else if let Some(previous) = self.current.replace(band) {
            transitions.push(BandTransition::Exited(previous));
        }
        transitions.push(BandTransition::Entered(band));
        transitions
    }

    /// Record exit from `band`.
    pub fn exit(&mut self, band: VisibilityBand) -> Vec<BandTransition> {
        if !self.is_registered(band) {
            tracing::trace!(band = %band, "Ignoring exit for unregistered band");
            return Vec::new();
        }

        if band.is_working_range() {
            self.in_working_range = false;
            return vec![BandTransition::Exited(band)];
        }

        if self.current == Some(band) {
            self.current = None;
            vec![BandTransition::Exited(band)]
        } else {
            tracing::trace!(
                band = %band,
                current = ?self.current,
                "Ignoring exit for band not currently held"
            );
            Vec::new()
        }
    }

    /// Derive transitions from a list position.
    ///
    /// Only bands whose membership actually changes produce transitions.
    pub fn observe(
        &mut self,
        geometry: RangeGeometry,
        working_range_size: usize,
    ) -> Vec<BandTransition> {
        let mut transitions = Vec::new();

        if self.working_range_registered {
            let inside = geometry.in_working_range(working_range_size);
            if inside && !self.in_working_range {
                transitions.extend(self.enter(VisibilityBand::WorkingRange));
            } else if !inside && self.in_working_range {
                transitions.extend(self.exit(VisibilityBand::WorkingRange));
            }
        }

        if self.distance_bands_registered {
            let band = geometry.distance_band();
            if self.current != Some(band) {
                transitions.extend(self.enter(band));
            }
        }

        transitions
    }
}
