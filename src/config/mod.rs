//! Configuration loading and management

use crate::cache::CacheConfig;
use crate::core::ConfigError;
use crate::translate::{SqlDialect, SqlTranslator};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of the SQL translator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Placeholder and paging syntax (`generic`, `sqlserver`, `postgres`, `mysql`)
    pub dialect: SqlDialect,
}

impl TranslatorConfig {
    pub fn translator(&self) -> SqlTranslator {
        SqlTranslator::new(self.dialect)
    }
}

/// Complete engine configuration
///
/// Every section and field is optional.
///
/// ```yaml
/// cache:
///   max_cached_entries: 500
///   minimum_hits_for_caching: 3
///   track_result_keys: true
/// translator:
///   dialect: postgres
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub translator: TranslatorConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => ConfigError::IoError {
                message: e.to_string(),
            },
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            file: Some(path.display().to_string()),
            message: e.to_string(),
        })
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError {
            file: None,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = EngineConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.translator.dialect, SqlDialect::Generic);
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
cache:
  max_cached_entries: 50
translator:
  dialect: sqlserver
"#;
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.cache.max_cached_entries, 50);
        assert_eq!(config.cache.minimum_hits_for_caching, 2);
        assert_eq!(config.translator.translator().dialect(), SqlDialect::SqlServer);
    }

    #[test]
    fn test_yaml_serialization() {
        let config = EngineConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = EngineConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unknown_dialect_is_a_parse_error() {
        let err = EngineConfig::from_yaml_str("translator:\n  dialect: oracle\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { file: None, .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_yaml_file("/nonexistent/engine.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
