//! imagebind - lifecycle-driven image attachment
//!
//! This library binds a remote image to a visual element whose lifetime is
//! owned by an external layout host. The host reports lifecycle transitions
//! (prepare, mount, bind, unbind, unmount) and visibility band changes; the
//! [`AttachmentController`] turns them into fetch, prefetch, priority and
//! release calls against a [`FetchService`], releasing every handle it
//! acquired exactly once.
//!
//! # Architecture
//!
//! ```text
//! Host ──► AttachmentController ──► PrefetchPolicy ──► FetchService
//!                │                                       │
//!                ├─ VisibilityRangeTracker               ▼
//!                └─ ResourceSlot (prepare / range) ◄── ResourceHandle
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use imagebind::{
//!     AmbientConfig, AttachmentController, ConfigStore, ElementId, ImageContext,
//!     ImageProps, PrefetchOverride, RecordingFetchService,
//! };
//!
//! let fetcher = Arc::new(RecordingFetchService::new());
//! let context = ImageContext::new(
//!     Arc::new(ConfigStore::new(AmbientConfig::default())),
//!     fetcher.clone(),
//! );
//!
//! let props = ImageProps::for_uri("https://example.com/a.jpg")
//!     .with_prefetch(PrefetchOverride::Yes);
//! let mut controller = AttachmentController::new(ElementId(1), props, context);
//!
//! controller.prepare().unwrap();
//! controller.mount().unwrap();
//! controller.unmount().unwrap();
//!
//! assert_eq!(fetcher.open_handles(), 0);
//! ```

pub mod config;
pub mod context;
pub mod controller;
pub mod descriptor;
pub mod fetch;
pub mod logging;
pub mod policy;
pub mod slot;
pub mod visibility;

pub use config::{AmbientConfig, ConfigError, ConfigResult, PrefetchConfig};
pub use context::{ConfigStore, ImageContext, LifecycleListener};
pub use controller::{
    AttachmentController, ImageProps, LifecycleError, LifecycleEvent, LifecycleResult,
    LifecycleState,
};
pub use descriptor::{DescriptorCache, ImageOptions, ImageSource, ResizeOptions, ResourceDescriptor};
pub use fetch::recording::{FetchEvent, RecordingFetchService};
pub use fetch::{
    ContextTag, DisplayOptions, ElementId, FetchRequest, FetchService, ListenerId, PrefetchTarget,
    PrimaryFetch, ReleaseMode, ResourceHandle, Viewport,
};
pub use policy::{PrefetchOverride, PrefetchPolicy};
pub use slot::ResourceSlot;
pub use visibility::{BandTransition, RangeGeometry, VisibilityBand, VisibilityRangeTracker};
