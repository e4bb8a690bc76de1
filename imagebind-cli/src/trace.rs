//! JSON lifecycle trace format.
//!
//! ```json
//! {
//!   "elements": [
//!     { "id": 1, "uri": "https://cdn.example.com/a.jpg", "prefetch": "yes" },
//!     { "id": 2, "source": { "first_available": ["b-small.jpg", "b.jpg"] }, "prefetch": 2 }
//!   ],
//!   "steps": [
//!     { "element": 1, "event": "prepare" },
//!     { "element": 1, "event": { "enter": "working_range" } },
//!     { "element": 1, "event": { "observe": { "position": 4, "first_visible": 0, "last_visible": 3 } } },
//!     { "element": 1, "event": { "bounds": { "width": 320, "height": 240 } } },
//!     { "element": 1, "event": "mount" },
//!     { "event": "flush" }
//!   ]
//! }
//! ```
//!
//! `prefetch` accepts `auto`, `yes`, `no` or the ordinals `0`, `1`, `2`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use imagebind::{ImageProps, ImageSource, PrefetchOverride, VisibilityBand};
use serde::Deserialize;

use crate::error::CliError;

/// A recorded session of host callbacks.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Trace {
    pub elements: Vec<ElementSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One element and its props.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementSpec {
    pub id: u64,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub source: Option<ImageSource>,
    #[serde(default)]
    pub prefetch: PrefetchOverride,
    #[serde(default)]
    pub caller_context: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<f32>,
}

impl ElementSpec {
    pub fn props(&self) -> ImageProps {
        let mut props = ImageProps {
            uri: self.uri.clone(),
            source: self.source.clone(),
            prefetch: self.prefetch,
            caller_context: self.caller_context.clone(),
            ..Default::default()
        };
        if let Some(ratio) = self.aspect_ratio {
            props.aspect_ratio = ratio;
        }
        props
    }
}

/// One callback delivered to one element (or to the service for `flush`).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    #[serde(default)]
    pub element: Option<u64>,
    pub event: TraceEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEvent {
    Prepare,
    Mount,
    Bind,
    Unbind,
    Unmount,
    /// Perform pending delayed releases in the fetch service.
    Flush,
    Enter(VisibilityBand),
    Exit(VisibilityBand),
    Observe {
        position: usize,
        first_visible: usize,
        last_visible: usize,
    },
    Bounds {
        width: i32,
        height: i32,
        #[serde(default)]
        padding_x: i32,
        #[serde(default)]
        padding_y: i32,
    },
}

impl Trace {
    /// Read and validate a trace file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let trace: Trace =
            serde_json::from_str(&content).map_err(|source| CliError::TraceParse {
                path: path.to_path_buf(),
                source,
            })?;
        trace.validate()?;
        Ok(trace)
    }

    /// Check element ids are unique and every step names a known element.
    pub fn validate(&self) -> Result<(), CliError> {
        let mut ids = HashSet::new();
        for element in &self.elements {
            if !ids.insert(element.id) {
                return Err(CliError::InvalidTrace(format!(
                    "duplicate element id {}",
                    element.id
                )));
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            match (step.element, step.event) {
                (_, TraceEvent::Flush) => {}
                (Some(id), _) if ids.contains(&id) => {}
                (Some(id), _) => {
                    return Err(CliError::InvalidTrace(format!(
                        "step {} refers to unknown element {}",
                        index, id
                    )))
                }
                (None, event) => {
                    return Err(CliError::InvalidTrace(format!(
                        "step {} ({:?}) has no element",
                        index, event
                    )))
                }
            }
        }
        Ok(())
    }
}
