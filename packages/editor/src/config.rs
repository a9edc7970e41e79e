use crate::address::AddressOptions;
use crate::errors::EditorError;
use crate::history::DEFAULT_HISTORY_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "marrow.config.json";

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Undo levels kept (0 = unlimited)
    pub history_depth: usize,

    /// Quiet period before a requested sync runs
    pub sync_debounce_ms: u64,

    /// Leave synthetic nodes out of tag-segment counts
    pub skip_synthetic_in_addresses: bool,

    /// Tag of the root element wrapping fragment documents
    pub root_tag: String,
}

impl EditorConfig {
    /// Load config from a directory, defaults when the file is absent
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, EditorError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            Self::from_path(&config_path)
        } else {
            Ok(EditorConfig::default())
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EditorError> {
        let content = std::fs::read_to_string(path)?;
        let config: EditorConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn address_options(&self) -> AddressOptions {
        AddressOptions {
            skip_synthetic: self.skip_synthetic_in_addresses,
        }
    }

    pub fn sync_debounce(&self) -> Duration {
        Duration::from_millis(self.sync_debounce_ms)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            sync_debounce_ms: 150,
            skip_synthetic_in_addresses: true,
            root_tag: "div".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "historyDepth": 20,
            "syncDebounceMs": 50,
            "skipSyntheticInAddresses": false,
            "rootTag": "article"
        }"#;

        let config: EditorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.history_depth, 20);
        assert_eq!(config.sync_debounce(), Duration::from_millis(50));
        assert!(!config.address_options().skip_synthetic);
        assert_eq!(config.root_tag, "article");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EditorConfig = serde_json::from_str(r#"{ "historyDepth": 5 }"#).unwrap();
        assert_eq!(config.history_depth, 5);
        assert_eq!(config.sync_debounce_ms, 150);
        assert_eq!(config.root_tag, "div");
    }

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.history_depth, 100);
        assert!(config.skip_synthetic_in_addresses);
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let dir = std::env::temp_dir().join(format!("marrow-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(DEFAULT_CONFIG_NAME);
        let _ = std::fs::remove_file(&path);

        assert_eq!(EditorConfig::load(&dir).unwrap(), EditorConfig::default());

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(EditorConfig::load(&dir), Err(EditorError::Config(_))));

        std::fs::write(&path, r#"{ "rootTag": "main" }"#).unwrap();
        assert_eq!(EditorConfig::load(&dir).unwrap().root_tag, "main");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
