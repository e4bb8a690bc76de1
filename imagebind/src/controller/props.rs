//! Element configuration supplied by the host.

use crate::descriptor::{DescriptorInputs, ImageOptions, ImageSource};
use crate::fetch::ListenerId;
use crate::policy::PrefetchOverride;

/// Default width/height ratio.
pub const DEFAULT_ASPECT_RATIO: f32 = 1.0;

/// Per-element configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageProps {
    /// Bare image URI; ignored when `source` is set.
    pub uri: Option<String>,

    /// Richer source description.
    pub source: Option<ImageSource>,

    pub options: ImageOptions,

    /// Width/height ratio used by the host's measure pass.
    pub aspect_ratio: f32,

    /// Listener for display events of the primary fetch.
    pub listener: Option<ListenerId>,

    /// Prefetch override for this element.
    pub prefetch: PrefetchOverride,

    /// Listener for the prepare-time prefetch request.
    pub prefetch_listener: Option<ListenerId>,

    /// Opaque caller tag forwarded with every request.
    pub caller_context: Option<String>,

    /// Allow the display layer to mutate drawables.
    pub mutate_drawables: bool,
}

impl Default for ImageProps {
    fn default() -> Self {
        Self {
            uri: None,
            source: None,
            options: ImageOptions::default(),
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            listener: None,
            prefetch: PrefetchOverride::Auto,
            prefetch_listener: None,
            caller_context: None,
            mutate_drawables: true,
        }
    }
}

impl ImageProps {
    pub fn for_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    pub fn for_source(source: ImageSource) -> Self {
        Self {
            source: Some(source),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: ImageOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: f32) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_listener(mut self, listener: ListenerId) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_prefetch(mut self, prefetch: PrefetchOverride) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn with_prefetch_listener(mut self, listener: ListenerId) -> Self {
        self.prefetch_listener = Some(listener);
        self
    }

    pub fn with_caller_context(mut self, caller_context: impl Into<String>) -> Self {
        self.caller_context = Some(caller_context.into());
        self
    }

    pub fn with_mutate_drawables(mut self, mutate: bool) -> Self {
        self.mutate_drawables = mutate;
        self
    }

    /// The subset of props the descriptor cache is keyed on.
    pub(crate) fn descriptor_inputs(&self) -> DescriptorInputs {
        DescriptorInputs {
            uri: self.uri.clone(),
            source: self.source.clone(),
            options: self.options.clone(),
            aspect_ratio: self.aspect_ratio,
            listener: self.listener,
        }
    }
}
