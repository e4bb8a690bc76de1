//! Capability bundle handed to every controller.
//!
//! Instead of reaching for process-wide singletons, each
//! [`AttachmentController`](crate::AttachmentController) receives an
//! [`ImageContext`] holding the shared configuration store, the fetch
//! service and an optional lifecycle listener.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::AmbientConfig;
use crate::fetch::{ElementId, FetchService};

/// Shared, host-updatable holder of the ambient configuration.
///
/// Readers take a snapshot per call; the controller never writes.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: RwLock<Arc<AmbientConfig>>,
}

impl ConfigStore {
    pub fn new(config: AmbientConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Current configuration snapshot.
    pub fn snapshot(&self) -> Arc<AmbientConfig> {
        Arc::clone(&self.current.read())
    }

    /// Replace the configuration. Controllers see it from their next call.
    pub fn replace(&self, config: AmbientConfig) {
        *self.current.write() = Arc::new(config);
        tracing::info!("Image configuration replaced");
    }
}

/// Observer of an element's display lifecycle.
///
/// All methods default to no-ops.
pub trait LifecycleListener: Send + Sync {
    fn on_image_mount(&self, _element: ElementId) {}
    fn on_image_bind(&self, _element: ElementId) {}
    fn on_image_unbind(&self, _element: ElementId) {}
    fn on_image_unmount(&self, _element: ElementId) {}
}

/// Everything a controller needs from its environment.
#[derive(Clone)]
pub struct ImageContext {
    config: Arc<ConfigStore>,
    fetcher: Arc<dyn FetchService>,
    listener: Option<Arc<dyn LifecycleListener>>,
}

impl fmt::Debug for ImageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageContext")
            .field("config", &self.config)
            .field("has_listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl ImageContext {
    pub fn new(config: Arc<ConfigStore>, fetcher: Arc<dyn FetchService>) -> Self {
        Self {
            config,
            fetcher,
            listener: None,
        }
    }

    /// Attach a lifecycle listener.
    pub fn with_listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn config(&self) -> Arc<AmbientConfig> {
        self.config.snapshot()
    }

    pub fn fetcher(&self) -> &dyn FetchService {
        self.fetcher.as_ref()
    }

    pub fn listener(&self) -> Option<&dyn LifecycleListener> {
        self.listener.as_deref()
    }
}
