//! Fetch service abstraction.
//!
//! The controller never fetches anything itself. It talks to a
//! [`FetchService`], which owns the actual pipeline (network, disk, decode)
//! and hands back [`ResourceHandle`]s for prefetches.
//!
//! # Dedup contract
//!
//! Both `mount` and `bind` issue [`FetchService::fetch_primary`] defensively,
//! so implementations must merge a primary fetch for an element whose current
//! attachment has an equal descriptor into the existing operation. Such a
//! merge also cancels a delayed release requested by an earlier
//! [`FetchService::release_primary`] with [`ReleaseMode::Delayed`].
//! [`recording::RecordingFetchService`] implements this contract and counts
//! distinct underlying operations.

mod handle;
pub mod recording;

use std::fmt;
use std::str::FromStr;

pub use handle::{Release, ResourceHandle};

use crate::descriptor::ResourceDescriptor;

/// Identity of one visual element instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque identity of a listener registered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// How far down the pipeline a prefetch should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefetchTarget {
    /// Decode into the bitmap memory cache.
    MemoryDecoded,
    /// Keep the encoded bytes in memory.
    MemoryEncoded,
    /// Only populate the disk cache.
    Disk,
}

impl PrefetchTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefetchTarget::MemoryDecoded => "memory_decoded",
            PrefetchTarget::MemoryEncoded => "memory_encoded",
            PrefetchTarget::Disk => "disk",
        }
    }
}

impl fmt::Display for PrefetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PrefetchTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory_decoded" | "memory" => Ok(PrefetchTarget::MemoryDecoded),
            "memory_encoded" | "encoded" => Ok(PrefetchTarget::MemoryEncoded),
            "disk" => Ok(PrefetchTarget::Disk),
            other => Err(format!(
                "unknown prefetch target '{}' (expected memory_decoded, memory_encoded or disk)",
                other
            )),
        }
    }
}

/// Which lifecycle hook issued a prefetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextTag {
    /// Eager prefetch from `prepare`.
    OnPrepare,
    /// Prefetch from entering the working range.
    OnEnteredRange,
}

impl ContextTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextTag::OnPrepare => "OnPrepare",
            ContextTag::OnEnteredRange => "OnEnteredRange",
        }
    }
}

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the primary resource of an element should be let go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseMode {
    /// Release now.
    Immediate,
    /// Release later unless the element is re-bound first.
    Delayed,
    /// Element is gone; release everything.
    Full,
}

impl fmt::Display for ReleaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReleaseMode::Immediate => "immediate",
            ReleaseMode::Delayed => "delayed",
            ReleaseMode::Full => "full",
        };
        write!(f, "{}", name)
    }
}

/// Content rectangle of the element, padding excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    /// Derive the content rectangle from laid-out size and total padding.
    ///
    /// Saturates at the `i32` bounds instead of overflowing.
    pub fn from_layout(width: i32, height: i32, padding_x: i32, padding_y: i32) -> Self {
        Self {
            width: width.saturating_sub(padding_x),
            height: height.saturating_sub(padding_y),
        }
    }
}

/// Per-element display settings recorded at mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Allow the display layer to mutate shared drawables.
    pub mutate_drawables: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            mutate_drawables: true,
        }
    }
}

/// A prefetch request.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub descriptor: &'a ResourceDescriptor,
    pub target: PrefetchTarget,
    pub tag: ContextTag,
    pub caller_context: Option<&'a str>,
    pub listener: Option<ListenerId>,
}

/// A primary (display) fetch for an element.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryFetch<'a> {
    pub element: ElementId,
    pub descriptor: &'a ResourceDescriptor,
    pub caller_context: Option<&'a str>,
    pub listener: Option<ListenerId>,
    pub viewport: Option<Viewport>,
    pub display: DisplayOptions,
}

/// The image pipeline as seen by the controller.
///
/// All methods are fire-and-forget: they must not block, and fetch failures
/// are reported through the service's own channels, never to the caller.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one service can be shared by
/// every element through `Arc<dyn FetchService>`.
pub trait FetchService: Send + Sync {
    /// Start a prefetch and return a handle that cancels it.
    fn fetch(&self, request: FetchRequest<'_>) -> ResourceHandle;

    /// Start (or merge into) the primary fetch for an element.
    ///
    /// Must be cheap when an equal descriptor is already attached to the
    /// element. See the module docs for the dedup contract.
    fn fetch_primary(&self, request: PrimaryFetch<'_>);

    /// Release the element's primary resource.
    fn release_primary(&self, element: ElementId, mode: ReleaseMode);

    /// Hint how far the image is from the viewport.
    ///
    /// Positive distances are below the viewport, `0` is visible, `-1` is
    /// above. This reprioritizes queued work and never starts a fetch.
    fn set_priority(
        &self,
        descriptor: &ResourceDescriptor,
        distance: i32,
        caller_context: Option<&str>,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefetch_target_parse() {
        assert_eq!(
            "memory_decoded".parse::<PrefetchTarget>().unwrap(),
            PrefetchTarget::MemoryDecoded
        );
        assert_eq!("DISK".parse::<PrefetchTarget>().unwrap(), PrefetchTarget::Disk);
        assert_eq!(
            " encoded ".parse::<PrefetchTarget>().unwrap(),
            PrefetchTarget::MemoryEncoded
        );
        assert!("network".parse::<PrefetchTarget>().is_err());
    }

    #[test]
    fn test_viewport_from_layout_subtracts_padding() {
        let viewport = Viewport::from_layout(200, 100, 20, 10);
        assert_eq!(viewport, Viewport { width: 180, height: 90 });
    }

    #[test]
    fn test_viewport_from_layout_saturates() {
        let viewport = Viewport::from_layout(i32::MIN, i32::MAX, 1, -1);
        assert_eq!(
            viewport,
            Viewport {
                width: i32::MIN,
                height: i32::MAX
            }
        );
    }

    #[test]
    fn test_display_options_default_mutates() {
        assert!(DisplayOptions::default().mutate_drawables);
    }
}
