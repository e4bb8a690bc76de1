//! Ambient configuration.
//!
//! [`AmbientConfig`] is the process-wide policy every element consults
//! read-only: whether primary fetches only happen at bind time, and the
//! [`PrefetchConfig`] flags driving prepare-time and working-range prefetch.
//!
//! # File Format
//!
//! Configuration can be loaded from an INI file:
//!
//! ```ini
//! [image]
//! use_bind_only = false
//!
//! [prefetch]
//! in_on_prepare = true
//! with_working_range = true
//! prioritize_with_working_range = true
//! cancel_when_fetched = true
//! cancel_on_prepare_when_working_range = true
//! target_on_prepare = memory_decoded
//! target_working_range = disk
//! working_range_size = 3
//! ```
//!
//! Missing keys keep their defaults. Unknown sections or keys are rejected.

use std::io;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::fetch::PrefetchTarget;

// ==================== Defaults ====================

/// Default for skipping the primary fetch at mount.
pub const DEFAULT_USE_BIND_ONLY: bool = false;

/// Default for eager prefetch in `prepare`.
pub const DEFAULT_PREFETCH_IN_ON_PREPARE: bool = true;

/// Default for prefetching when the working range is entered.
pub const DEFAULT_PREFETCH_WITH_WORKING_RANGE: bool = false;

/// Default for sending distance-to-viewport hints.
pub const DEFAULT_PRIORITIZE_WITH_WORKING_RANGE: bool = false;

/// Default for cancelling a working-range prefetch once the primary fetch runs.
pub const DEFAULT_CANCEL_PREFETCH_WHEN_FETCHED: bool = true;

/// Default for cancelling the prepare prefetch when a working-range prefetch starts.
pub const DEFAULT_CANCEL_ON_PREPARE_PREFETCH_WHEN_WORKING_RANGE_PREFETCH: bool = true;

/// Default pipeline depth for prepare-time prefetch.
pub const DEFAULT_PREFETCH_TARGET_ON_PREPARE: PrefetchTarget = PrefetchTarget::MemoryDecoded;

/// Default pipeline depth for working-range prefetch.
pub const DEFAULT_PREFETCH_TARGET_WORKING_RANGE: PrefetchTarget = PrefetchTarget::MemoryDecoded;

/// Default working range size in items around the visible window.
pub const DEFAULT_PREFETCH_WORKING_RANGE_SIZE: usize = 3;

const SECTION_IMAGE: &str = "image";
const SECTION_PREFETCH: &str = "prefetch";

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid INI.
    #[error("Invalid configuration syntax: {0}")]
    Parse(String),

    /// A section or key this crate does not know.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// A known key with a value that cannot be used.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Ambient prefetch policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchConfig {
    /// Start an eager prefetch in `prepare` when the override is AUTO.
    pub prefetch_in_on_prepare: bool,

    /// Prefetch on working-range entry when the override is AUTO.
    ///
    /// Also decides whether elements allocate a working-range slot at all.
    pub prefetch_with_working_range: bool,

    /// Register the distance bands and send priority hints.
    pub prioritize_with_working_range: bool,

    /// Cancel the working-range prefetch once mount/bind issue the primary fetch.
    pub cancel_prefetch_when_fetched: bool,

    /// Release the prepare prefetch when a working-range prefetch supersedes it.
    pub cancel_on_prepare_prefetch_when_working_range_prefetch: bool,

    /// Pipeline depth for prepare-time prefetch.
    pub prefetch_target_on_prepare: PrefetchTarget,

    /// Pipeline depth for working-range prefetch.
    pub prefetch_target_working_range: PrefetchTarget,

    /// Items around the visible window that count as the working range.
    pub prefetch_working_range_size: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            prefetch_in_on_prepare: DEFAULT_PREFETCH_IN_ON_PREPARE,
            prefetch_with_working_range: DEFAULT_PREFETCH_WITH_WORKING_RANGE,
            prioritize_with_working_range: DEFAULT_PRIORITIZE_WITH_WORKING_RANGE,
            cancel_prefetch_when_fetched: DEFAULT_CANCEL_PREFETCH_WHEN_FETCHED,
            cancel_on_prepare_prefetch_when_working_range_prefetch:
                DEFAULT_CANCEL_ON_PREPARE_PREFETCH_WHEN_WORKING_RANGE_PREFETCH,
            prefetch_target_on_prepare: DEFAULT_PREFETCH_TARGET_ON_PREPARE,
            prefetch_target_working_range: DEFAULT_PREFETCH_TARGET_WORKING_RANGE,
            prefetch_working_range_size: DEFAULT_PREFETCH_WORKING_RANGE_SIZE,
        }
    }
}

impl PrefetchConfig {
    pub fn with_prefetch_in_on_prepare(mut self, enabled: bool) -> Self {
        self.prefetch_in_on_prepare = enabled;
        self
    }

    pub fn with_prefetch_with_working_range(mut self, enabled: bool) -> Self {
        self.prefetch_with_working_range = enabled;
        self
    }

    pub fn with_prioritize_with_working_range(mut self, enabled: bool) -> Self {
        self.prioritize_with_working_range = enabled;
        self
    }

    pub fn with_cancel_prefetch_when_fetched(mut self, enabled: bool) -> Self {
        self.cancel_prefetch_when_fetched = enabled;
        self
    }

    pub fn with_cancel_on_prepare_prefetch_when_working_range_prefetch(
        mut self,
        enabled: bool,
    ) -> Self {
        self.cancel_on_prepare_prefetch_when_working_range_prefetch = enabled;
        self
    }

    pub fn with_prefetch_target_on_prepare(mut self, target: PrefetchTarget) -> Self {
        self.prefetch_target_on_prepare = target;
        self
    }

    pub fn with_prefetch_target_working_range(mut self, target: PrefetchTarget) -> Self {
        self.prefetch_target_working_range = target;
        self
    }

    pub fn with_prefetch_working_range_size(mut self, size: usize) -> Self {
        self.prefetch_working_range_size = size;
        self
    }

    /// Whether elements need a visibility tracker at all.
    pub fn uses_ranges(&self) -> bool {
        self.prefetch_with_working_range || self.prioritize_with_working_range
    }
}

/// Process-wide image policy.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbientConfig {
    /// Skip the primary fetch at mount and fetch only at bind.
    pub use_bind_only: bool,

    /// Prefetch policy.
    pub prefetch: PrefetchConfig,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            use_bind_only: DEFAULT_USE_BIND_ONLY,
            prefetch: PrefetchConfig::default(),
        }
    }
}

impl AmbientConfig {
    /// Enable or disable bind-only mode.
    pub fn with_bind_only(mut self, enabled: bool) -> Self {
        self.use_bind_only = enabled;
        self
    }

    /// Replace the prefetch policy.
    pub fn with_prefetch(mut self, prefetch: PrefetchConfig) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Load configuration from an INI file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ini_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded image configuration");
        Ok(config)
    }

    /// Parse configuration from INI text, starting from defaults.
    pub fn from_ini_str(content: &str) -> ConfigResult<Self> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        for (section, properties) in ini.iter() {
            for (key, value) in properties.iter() {
                config.apply(section, key, value)?;
            }
        }

        Ok(config)
    }

    /// Render the configuration as INI text.
    pub fn to_ini_string(&self) -> String {
        let p = &self.prefetch;
        let mut ini = Ini::new();
        ini.with_section(Some(SECTION_IMAGE))
            .set("use_bind_only", self.use_bind_only.to_string());
        ini.with_section(Some(SECTION_PREFETCH))
            .set("in_on_prepare", p.prefetch_in_on_prepare.to_string())
            .set("with_working_range", p.prefetch_with_working_range.to_string())
            .set(
                "prioritize_with_working_range",
                p.prioritize_with_working_range.to_string(),
            )
            .set("cancel_when_fetched", p.cancel_prefetch_when_fetched.to_string())
            .set(
                "cancel_on_prepare_when_working_range",
                p.cancel_on_prepare_prefetch_when_working_range_prefetch
                    .to_string(),
            )
            .set("target_on_prepare", p.prefetch_target_on_prepare.as_str())
            .set("target_working_range", p.prefetch_target_working_range.as_str())
            .set("working_range_size", p.prefetch_working_range_size.to_string());

        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = ini.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn apply(&mut self, section: Option<&str>, key: &str, value: &str) -> ConfigResult<()> {
        let qualified = format!("{}.{}", section.unwrap_or(""), key);
        let p = &mut self.prefetch;

        match (section, key) {
            (Some(SECTION_IMAGE), "use_bind_only") => {
                self.use_bind_only = parse_bool(&qualified, value)?
            }
            (Some(SECTION_PREFETCH), "in_on_prepare") => {
                p.prefetch_in_on_prepare = parse_bool(&qualified, value)?
            }
            (Some(SECTION_PREFETCH), "with_working_range") => {
                p.prefetch_with_working_range = parse_bool(&qualified, value)?
            }
            (Some(SECTION_PREFETCH), "prioritize_with_working_range") => {
                p.prioritize_with_working_range = parse_bool(&qualified, value)?
            }
            (Some(SECTION_PREFETCH), "cancel_when_fetched") => {
                p.cancel_prefetch_when_fetched = parse_bool(&qualified, value)?
            }
            (Some(SECTION_PREFETCH), "cancel_on_prepare_when_working_range") => {
                p.cancel_on_prepare_prefetch_when_working_range_prefetch =
                    parse_bool(&qualified, value)?
            }
            (Some(SECTION_PREFETCH), "target_on_prepare") => {
                p.prefetch_target_on_prepare = parse_target(&qualified, value)?
            }
            (Some(SECTION_PREFETCH), "target_working_range") => {
                p.prefetch_target_working_range = parse_target(&qualified, value)?
            }
            (Some(SECTION_PREFETCH), "working_range_size") => {
                p.prefetch_working_range_size =
                    value
                        .trim()
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue {
                            key: qualified.clone(),
                            value: value.to_string(),
                            reason: "expected a non-negative integer".to_string(),
                        })?
            }
            _ => return Err(ConfigError::UnknownKey(qualified)),
        }

        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_target(key: &str, value: &str) -> ConfigResult<PrefetchTarget> {
    value.parse().map_err(|reason| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AmbientConfig::default();
        assert!(!config.use_bind_only);
        assert!(config.prefetch.prefetch_in_on_prepare);
        assert!(!config.prefetch.prefetch_with_working_range);
        assert!(!config.prefetch.prioritize_with_working_range);
        assert!(config.prefetch.cancel_prefetch_when_fetched);
        assert_eq!(
            config.prefetch.prefetch_working_range_size,
            DEFAULT_PREFETCH_WORKING_RANGE_SIZE
        );
        assert!(!config.prefetch.uses_ranges());
    }

    #[test]
    fn test_builder_pattern() {
        let config = AmbientConfig::default().with_bind_only(true).with_prefetch(
            PrefetchConfig::default()
                .with_prioritize_with_working_range(true)
                .with_prefetch_target_working_range(PrefetchTarget::Disk)
                .with_prefetch_working_range_size(5),
        );

        assert!(config.use_bind_only);
        assert!(config.prefetch.uses_ranges());
        assert_eq!(
            config.prefetch.prefetch_target_working_range,
            PrefetchTarget::Disk
        );
        assert_eq!(config.prefetch.prefetch_working_range_size, 5);
    }

    #[test]
    fn test_parse_ini() {
        let config = AmbientConfig::from_ini_str(
            "[image]\nuse_bind_only = yes\n\n[prefetch]\nwith_working_range = true\ntarget_on_prepare = disk\nworking_range_size = 8\n",
        )
        .unwrap();

        assert!(config.use_bind_only);
        assert!(config.prefetch.prefetch_with_working_range);
        assert_eq!(config.prefetch.prefetch_target_on_prepare, PrefetchTarget::Disk);
        assert_eq!(config.prefetch.prefetch_working_range_size, 8);
        // Untouched keys keep defaults
        assert!(config.prefetch.prefetch_in_on_prepare);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = AmbientConfig::from_ini_str("[prefetch]\nturbo = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(ref key) if key == "prefetch.turbo"));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let err = AmbientConfig::from_ini_str("[network]\ntimeout = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AmbientConfig::from_ini_str("[image]\nuse_bind_only = maybe\n").unwrap_err();
        assert!(err.to_string().contains("image.use_bind_only"));

        let err = AmbientConfig::from_ini_str("[prefetch]\ntarget_on_prepare = cloud\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = AmbientConfig::from_ini_str("[prefetch]\nworking_range_size = -2\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_ini_output_parses_back() {
        let config = AmbientConfig::default().with_bind_only(true).with_prefetch(
            PrefetchConfig::default()
                .with_prefetch_with_working_range(true)
                .with_prefetch_target_on_prepare(PrefetchTarget::MemoryEncoded),
        );

        let text = config.to_ini_string();
        assert!(text.contains("[prefetch]"));
        assert_eq!(AmbientConfig::from_ini_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[prefetch]").unwrap();
        writeln!(file, "prioritize_with_working_range = on").unwrap();

        let config = AmbientConfig::load(file.path()).unwrap();
        assert!(config.prefetch.prioritize_with_working_range);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AmbientConfig::load(&dir.path().join("missing.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("missing.ini"));
    }
}
