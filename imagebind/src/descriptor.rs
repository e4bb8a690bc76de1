//! Resource descriptors and the per-element descriptor cache.
//!
//! A [`ResourceDescriptor`] identifies which image to fetch and with which
//! options. It is derived from an element's configured source and options,
//! never mutated, and compared by value to decide whether a re-render must
//! re-fetch.
//!
//! [`DescriptorCache`] memoizes the descriptor per element instance. It only
//! recomputes when one of the cache inputs (uri, source, options, aspect
//! ratio, listener) changes by value.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Deserialize;

use crate::fetch::ListenerId;

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// A single URI.
    Uri(String),

    /// Try each URI in order; the first is the canonical one.
    FirstAvailable(Vec<String>),

    /// Show a low resolution image until the high resolution one arrives.
    Increasing { low_res: String, high_res: String },

    /// Nothing to show.
    Empty,
}

impl ImageSource {
    /// Build a source from an optional bare URI.
    pub fn for_uri(uri: Option<&str>) -> Self {
        match uri {
            Some(uri) => ImageSource::Uri(uri.to_string()),
            None => ImageSource::Empty,
        }
    }

    /// The URI that identifies the final image, if any.
    ///
    /// Priority hints are keyed by this URI.
    pub fn final_uri(&self) -> Option<&str> {
        match self {
            ImageSource::Uri(uri) => Some(uri),
            ImageSource::FirstAvailable(uris) => uris.first().map(String::as_str),
            ImageSource::Increasing { high_res, .. } => Some(high_res),
            ImageSource::Empty => None,
        }
    }
}

/// Requested decode size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResizeOptions {
    pub width: u32,
    pub height: u32,
}

/// Display and decode options that travel with a descriptor.
///
/// The controller treats these as opaque; they only matter for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageOptions {
    /// Decode size hint.
    pub resize: Option<ResizeOptions>,

    /// Clip the image to a circle.
    pub round_as_circle: bool,

    /// Fade-in duration in milliseconds.
    pub fade_duration_ms: u32,

    /// Render progressive JPEG scans as they arrive.
    pub progressive_rendering: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            resize: None,
            round_as_circle: false,
            fade_duration_ms: 300,
            progressive_rendering: false,
        }
    }
}

impl ImageOptions {
    /// Set the decode size hint.
    pub fn with_resize(mut self, width: u32, height: u32) -> Self {
        self.resize = Some(ResizeOptions { width, height });
        self
    }

    /// Enable or disable circular clipping.
    pub fn with_round_as_circle(mut self, round: bool) -> Self {
        self.round_as_circle = round;
        self
    }

    /// Set the fade-in duration.
    pub fn with_fade_duration_ms(mut self, duration_ms: u32) -> Self {
        self.fade_duration_ms = duration_ms;
        self
    }

    pub fn with_progressive_rendering(mut self, enabled: bool) -> Self {
        self.progressive_rendering = enabled;
        self
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct DescriptorInner {
    source: ImageSource,
    options: ImageOptions,
}

/// Immutable description of the image an element displays.
///
/// Cheap to clone; clones share the same allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor(Arc<DescriptorInner>);

impl ResourceDescriptor {
    /// Create a descriptor from a resolved source and options.
    pub fn new(source: ImageSource, options: ImageOptions) -> Self {
        Self(Arc::new(DescriptorInner { source, options }))
    }

    /// Resolve a descriptor from element configuration.
    ///
    /// An explicit `source` takes precedence over a bare `uri`.
    pub fn resolve(uri: Option<&str>, source: Option<&ImageSource>, options: &ImageOptions) -> Self {
        let source = match source {
            Some(source) => source.clone(),
            None => ImageSource::for_uri(uri),
        };
        Self::new(source, options.clone())
    }

    pub fn source(&self) -> &ImageSource {
        &self.0.source
    }

    pub fn options(&self) -> &ImageOptions {
        &self.0.options
    }

    /// The final image URI, if the source has one.
    pub fn uri(&self) -> Option<&str> {
        self.0.source.final_uri()
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.uri() {
            Some(uri) => write!(f, "{}", uri),
            None => write!(f, "<empty>"),
        }
    }
}

/// Values the descriptor (and the should-update decision) depends on.
///
/// Equality compares the aspect ratio by bit pattern, matching
/// [`DescriptorInputs::fingerprint`], so a `NaN` ratio equals itself.
#[derive(Debug, Clone)]
pub struct DescriptorInputs {
    pub uri: Option<String>,
    pub source: Option<ImageSource>,
    pub options: ImageOptions,
    pub aspect_ratio: f32,
    pub listener: Option<ListenerId>,
}

impl PartialEq for DescriptorInputs {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
            && self.source == other.source
            && self.options == other.options
            && self.aspect_ratio.to_bits() == other.aspect_ratio.to_bits()
            && self.listener == other.listener
    }
}

impl DescriptorInputs {
    /// Structural hash of all inputs.
    ///
    /// The aspect ratio is hashed by bit pattern, so `0.0` and `-0.0` differ.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.uri.hash(&mut hasher);
        self.source.hash(&mut hasher);
        self.options.hash(&mut hasher);
        self.aspect_ratio.to_bits().hash(&mut hasher);
        self.listener.hash(&mut hasher);
        hasher.finish()
    }

    fn resolve(&self) -> ResourceDescriptor {
        ResourceDescriptor::resolve(self.uri.as_deref(), self.source.as_ref(), &self.options)
    }
}

/// Per-element memo of the current descriptor.
#[derive(Debug)]
pub struct DescriptorCache {
    fingerprint: u64,
    inputs: DescriptorInputs,
    descriptor: ResourceDescriptor,
}

impl DescriptorCache {
    /// Create a cache primed with the given inputs.
    pub fn new(inputs: DescriptorInputs) -> Self {
        Self {
            fingerprint: inputs.fingerprint(),
            descriptor: inputs.resolve(),
            inputs,
        }
    }

    /// The cached descriptor.
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Replace the inputs, recomputing the descriptor only if they changed.
    ///
    /// Returns `true` when the inputs changed, meaning the element must be
    /// re-rendered. A listener or aspect ratio change counts as a change even
    /// though the recomputed descriptor may compare equal to the old one.
    pub fn update(&mut self, inputs: DescriptorInputs) -> bool {
        let fingerprint = inputs.fingerprint();
        if fingerprint == self.fingerprint && inputs == self.inputs {
            return false;
        }

        self.descriptor = inputs.resolve();
        self.fingerprint = fingerprint;
        self.inputs = inputs;
        true
    }
}
