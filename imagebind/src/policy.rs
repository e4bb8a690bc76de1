//! Prefetch decisions.
//!
//! Each element may override the ambient prefetch policy with a tri-state
//! [`PrefetchOverride`]. [`decide`] resolves the override against one ambient
//! flag; [`PrefetchPolicy`] applies it to the two decision points the
//! controller has (prepare time and working-range entry).
//!
//! Everything here is pure: no state, no side effects.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::config::PrefetchConfig;

/// Per-element prefetch override.
///
/// Decoded once where the raw value enters the system. Deserializes from a
/// name (`"auto"`, `"yes"`, `"no"`) or the legacy integer form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "RawOverride")]
pub enum PrefetchOverride {
    /// Follow the ambient policy.
    #[default]
    Auto,
    /// Always prefetch.
    Yes,
    /// Never prefetch.
    No,
}

impl PrefetchOverride {
    /// Decode the legacy integer form (`1` = yes, `2` = no, anything else = auto).
    pub fn from_ordinal(value: i64) -> Self {
        match value {
            1 => PrefetchOverride::Yes,
            2 => PrefetchOverride::No,
            _ => PrefetchOverride::Auto,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrefetchOverride::Auto => "auto",
            PrefetchOverride::Yes => "yes",
            PrefetchOverride::No => "no",
        }
    }
}

impl fmt::Display for PrefetchOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PrefetchOverride {
    type Err = String;

    /// Accepts `auto`, `yes`, `no` (any case) or the legacy ordinal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value.to_lowercase().as_str() {
            "auto" => return Ok(PrefetchOverride::Auto),
            "yes" => return Ok(PrefetchOverride::Yes),
            "no" => return Ok(PrefetchOverride::No),
            _ => {}
        }
        value
            .parse::<i64>()
            .map(PrefetchOverride::from_ordinal)
            .map_err(|_| format!("invalid prefetch override '{}' (expected auto, yes or no)", value))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOverride {
    Ordinal(i64),
    Name(String),
}

impl TryFrom<RawOverride> for PrefetchOverride {
    type Error = String;

    fn try_from(raw: RawOverride) -> Result<Self, Self::Error> {
        match raw {
            RawOverride::Ordinal(value) => Ok(PrefetchOverride::from_ordinal(value)),
            RawOverride::Name(name) => name.parse(),
        }
    }
}

/// Resolve an override against an ambient flag.
pub fn decide(prefetch: PrefetchOverride, ambient: bool) -> bool {
    match prefetch {
        PrefetchOverride::Yes => true,
        PrefetchOverride::No => false,
        PrefetchOverride::Auto => ambient,
    }
}

/// Applies [`decide`] to the ambient prefetch configuration.
#[derive(Debug, Clone, Copy)]
pub struct PrefetchPolicy<'a> {
    config: &'a PrefetchConfig,
}

impl<'a> PrefetchPolicy<'a> {
    pub fn new(config: &'a PrefetchConfig) -> Self {
        Self { config }
    }

    /// Whether `prepare` should start an eager prefetch.
    pub fn on_prepare(&self, prefetch: PrefetchOverride) -> bool {
        decide(prefetch, self.config.prefetch_in_on_prepare)
    }

    /// Whether entering the working range should start a prefetch.
    pub fn with_working_range(&self, prefetch: PrefetchOverride) -> bool {
        decide(prefetch, self.config.prefetch_with_working_range)
    }
}
