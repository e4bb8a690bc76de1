//! Band geometry for list-style hosts.
//!
//! Hosts that lay elements out in a scrolling list know each element's
//! position and the window of visible positions. [`RangeGeometry`] turns that
//! into band membership:
//!
//! ```text
//!   position < first_visible            -> Above   (-1)
//!   first_visible..=last_visible        -> Visible  (0)
//!   last_visible + 1                    -> Below1   (1)
//!   last_visible + 2                    -> Below2   (2)
//!   last_visible + 3 and beyond         -> Below3   (3)
//! ```
//!
//! The working range is the visible window widened by
//! `prefetch_working_range_size` positions on each side.

use super::VisibilityBand;

/// Position of one element relative to the visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeGeometry {
    pub position: usize,
    pub first_visible: usize,
    pub last_visible: usize,
}

impl RangeGeometry {
    /// Create a geometry; the visible bounds are ordered if given reversed.
    pub fn new(position: usize, first_visible: usize, last_visible: usize) -> Self {
        Self {
            position,
            first_visible: first_visible.min(last_visible),
            last_visible: first_visible.max(last_visible),
        }
    }

    /// The distance band the element falls in.
    pub fn distance_band(&self) -> VisibilityBand {
        if self.position < self.first_visible {
            return VisibilityBand::Above;
        }
        match self.position - self.last_visible.min(self.position) {
            0 => VisibilityBand::Visible,
            1 => VisibilityBand::Below1,
            2 => VisibilityBand::Below2,
            _ => VisibilityBand::Below3,
        }
    }

    /// Whether the element is within `size` positions of the visible window.
    pub fn in_working_range(&self, size: usize) -> bool {
        self.position.saturating_add(size) >= self.first_visible
            && self.position <= self.last_visible.saturating_add(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_bands() {
        let at = |position| RangeGeometry::new(position, 10, 14).distance_band();

        assert_eq!(at(3), VisibilityBand::Above);
        assert_eq!(at(9), VisibilityBand::Above);
        assert_eq!(at(10), VisibilityBand::Visible);
        assert_eq!(at(14), VisibilityBand::Visible);
        assert_eq!(at(15), VisibilityBand::Below1);
        assert_eq!(at(16), VisibilityBand::Below2);
        assert_eq!(at(17), VisibilityBand::Below3);
        assert_eq!(at(500), VisibilityBand::Below3);
    }

    #[test]
    fn test_working_range_bounds() {
        let geometry = |position| RangeGeometry::new(position, 10, 14);

        assert!(!geometry(6).in_working_range(3));
        assert!(geometry(7).in_working_range(3));
        assert!(geometry(12).in_working_range(3));
        assert!(geometry(17).in_working_range(3));
        assert!(!geometry(18).in_working_range(3));
    }

    #[test]
    fn test_working_range_near_origin_does_not_underflow() {
        assert!(RangeGeometry::new(0, 0, 2).in_working_range(5));
        assert!(RangeGeometry::new(0, 4, 6).in_working_range(5));
    }

    #[test]
    fn test_zero_size_working_range_is_visible_window() {
        assert!(!RangeGeometry::new(9, 10, 14).in_working_range(0));
        assert!(RangeGeometry::new(10, 10, 14).in_working_range(0));
        assert!(!RangeGeometry::new(15, 10, 14).in_working_range(0));
    }

    #[test]
    fn test_reversed_bounds_are_normalized() {
        let geometry = RangeGeometry::new(12, 14, 10);
        assert_eq!(geometry.first_visible, 10);
        assert_eq!(geometry.last_visible, 14);
        assert_eq!(geometry.distance_band(), VisibilityBand::Visible);
    }
}
