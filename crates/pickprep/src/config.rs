//! Run configuration with JSON load/store helpers.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::placement::SortKey;

/// Patterns always excluded from processing, on top of any configured
/// ignore list.
pub const BUILTIN_IGNORED: &[&str] = [
    "TP", "DNP", "DNE", "HDR", "Hole", "Panel", "Edge", "MH", "MOUNTHOLE",
]
.as_slice();

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_fiducial_prefix() -> String {
    "FID".to_owned()
}

fn default_reserved_ceiling() -> usize {
    4
}

fn default_true() -> bool {
    true
}

/// Injected run configuration. Every field has a serde default so partial
/// JSON files load cleanly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Refdes prefix marking fiducial records.
    #[serde(default = "default_fiducial_prefix")]
    pub fiducial_prefix: String,
    /// Extra refdes/footprint/value substrings to exclude before
    /// processing, merged with [`BUILTIN_IGNORED`].
    #[serde(default)]
    pub ignored_features: Vec<String>,
    /// Component-count ceiling for the reserved slot.
    #[serde(default = "default_reserved_ceiling")]
    pub reserved_slot_ceiling: usize,
    /// Fixed board width in the board frame; inferred from the fiducials
    /// when absent.
    #[serde(default)]
    pub board_width: Option<f64>,
    /// Sort keys applied to exported placement lists, in priority order.
    #[serde(default)]
    pub sort_keys: Vec<SortKey>,
    #[serde(default = "default_true")]
    pub sort_ascending: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            fiducial_prefix: default_fiducial_prefix(),
            ignored_features: Vec::new(),
            reserved_slot_ceiling: default_reserved_ceiling(),
            board_width: None,
            sort_keys: Vec::new(),
            sort_ascending: true,
        }
    }
}

impl ProcessConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// The full ignore list: built-in patterns plus configured extras.
    pub fn ignore_patterns(&self) -> Vec<String> {
        BUILTIN_IGNORED
            .iter()
            .map(|p| (*p).to_owned())
            .chain(self.ignored_features.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let cfg: ProcessConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(cfg.fiducial_prefix, "FID");
        assert_eq!(cfg.reserved_slot_ceiling, 4);
        assert!(cfg.board_width.is_none());
        assert!(cfg.sort_ascending);
    }

    #[test]
    fn configured_patterns_extend_the_builtins() {
        let cfg = ProcessConfig {
            ignored_features: vec!["LOGO".to_owned()],
            ..ProcessConfig::default()
        };
        let patterns = cfg.ignore_patterns();
        assert!(patterns.iter().any(|p| p == "TP"));
        assert!(patterns.iter().any(|p| p == "LOGO"));
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let cfg: ProcessConfig =
            serde_json::from_str(r#"{"reserved_slot_ceiling": 2, "board_width": 80.5}"#)
                .expect("parse");
        assert_eq!(cfg.reserved_slot_ceiling, 2);
        assert_eq!(cfg.board_width, Some(80.5));
        assert_eq!(cfg.fiducial_prefix, "FID");
    }
}
