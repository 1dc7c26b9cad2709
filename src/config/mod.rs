//! Configuration management for pychat
//!
//! A provider is configured in layers:
//! 1. Provider options file (JSON, YAML or TOML)
//! 2. Per-provider `env` overrides
//! 3. Process environment variables (including `.env`, loaded by the CLI)
//! 4. CLI parameters (highest priority)

pub mod env;

use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use self::env::{EnvOverrides, EnvSource, ProcessEnv};
use crate::error::{PyChatError, Result};

/// User-supplied provider config
///
/// The typed fields are the keys the chat script understands; anything else
/// is kept in `extra` and passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling mass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,

    /// Ask the backend to stream (the script still returns one result)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Directory relative script paths are resolved against
    #[serde(rename = "basePath", default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,

    /// Interpreter command used to run the script
    #[serde(
        rename = "pythonExecutable",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub python_executable: Option<String>,

    /// Per-call timeout for the script process
    #[serde(rename = "timeoutMs", default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Pass-through keys (`stop`, `response_format`, overrides, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdapterConfig {
    /// Flatten the config into ordered key/value entries
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented as JSON
    pub fn to_entries(&self) -> Result<IndexMap<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(PyChatError::Other(format!(
                "config serialized to a non-object value: {other}"
            ))),
        }
    }
}

/// Everything needed to construct a provider, as read from an options file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderOptions {
    /// Identity override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub config: AdapterConfig,

    /// Environment overrides consulted before the process environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvOverrides>,
}

impl ProviderOptions {
    /// Load provider options from a file, picking the format by extension
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unknown extension,
    /// or fails to parse
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| PyChatError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let parsed = match extension.as_deref() {
            Some("json") => serde_json::from_str(&contents).map_err(PyChatError::from),
            Some("yaml" | "yml") => serde_yaml::from_str(&contents).map_err(PyChatError::from),
            Some("toml") => toml::from_str(&contents).map_err(PyChatError::from),
            _ => {
                return Err(PyChatError::ConfigParse {
                    path: path.to_path_buf(),
                    message: "expected a .json, .yaml, .yml or .toml file".to_string(),
                })
            }
        };

        parsed.map_err(|e| PyChatError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_config_known_and_extra_keys() {
        let config: AdapterConfig = serde_json::from_value(json!({
            "temperature": 0.5,
            "max_tokens": 100,
            "basePath": "/scripts",
            "stop": ["\n"],
        }))
        .unwrap();

        assert_eq!(config.temperature, Some(0.5));
        assert_eq!(config.max_tokens, Some(100));
        assert_eq!(config.base_path, Some(PathBuf::from("/scripts")));
        assert_eq!(config.extra.get("stop"), Some(&json!(["\n"])));
    }

    #[test]
    fn test_to_entries_skips_unset_keys() {
        let config = AdapterConfig {
            top_p: Some(0.8),
            ..AdapterConfig::default()
        };
        let entries = config.to_entries().unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries.get("top_p"), Some(&json!(0.8)));
    }

    #[test]
    fn test_load_yaml_options() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("provider.yaml");
        fs::write(
            &path,
            "id: my-provider\nconfig:\n  temperature: 0.2\n  stream: true\nenv:\n  OPENAI_API_KEY: yaml-key\n",
        )
        .unwrap();

        let options = ProviderOptions::load_from_path(&path).unwrap();
        assert_eq!(options.id.as_deref(), Some("my-provider"));
        assert_eq!(options.config.temperature, Some(0.2));
        assert_eq!(options.config.stream, Some(true));
        assert_eq!(
            options.env.unwrap().get(env::OPENAI_API_KEY),
            Some("yaml-key")
        );
    }

    #[test]
    fn test_load_toml_options() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("provider.toml");
        fs::write(&path, "[config]\nmax_tokens = 64\npresence_penalty = 0.1\n").unwrap();

        let options = ProviderOptions::load_from_path(&path).unwrap();
        assert_eq!(options.config.max_tokens, Some(64));
        assert_eq!(options.config.presence_penalty, Some(0.1));
        assert!(options.env.is_none());
    }

    #[test]
    fn test_load_json_options() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("provider.json");
        fs::write(&path, r#"{"config": {"frequency_penalty": 0.2}}"#).unwrap();

        let options = ProviderOptions::load_from_path(&path).unwrap();
        assert_eq!(options.config.frequency_penalty, Some(0.2));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("provider.ini");
        fs::write(&path, "temperature=1").unwrap();

        let err = ProviderOptions::load_from_path(&path).unwrap_err();
        assert!(matches!(err, PyChatError::ConfigParse { .. }));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ProviderOptions::load_from_path(Path::new("/nonexistent/provider.json"))
            .unwrap_err();
        assert!(matches!(err, PyChatError::ConfigParse { .. }));
    }
}
