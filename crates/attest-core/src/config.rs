//! Discovery configuration.
//!
//! Built once per run from three layers, later layers winning:
//! built-in defaults, the JSON config file, then command-line overrides.

use std::path::Path;

use globset::Glob;
use serde::{Deserialize, Serialize};

use crate::error::{read_context, AttestError, AttestResult};

/// Default config file name, resolved against the workspace root.
pub const DEFAULT_CONFIG_FILE: &str = "checksum_config.json";

/// Which files enter a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    pub include_terraform: bool,
    pub include_python: bool,
    pub include_config: bool,
    pub include_scripts: bool,
    pub include_docs: bool,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            include_terraform: true,
            include_python: true,
            include_config: true,
            include_scripts: true,
            include_docs: true,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

/// Command-line layer. `None` leaves the lower layer's value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub include_terraform: Option<bool>,
    pub include_python: Option<bool>,
    pub include_config: Option<bool>,
    pub include_scripts: Option<bool>,
    pub include_docs: Option<bool>,
    /// Appended to the config file's include patterns.
    pub include_patterns: Vec<String>,
    /// Appended to the config file's exclude patterns.
    pub exclude_patterns: Vec<String>,
}

impl DiscoveryConfig {
    /// Load the config file layer.
    ///
    /// A missing file is only an error when the caller named it explicitly;
    /// the default file being absent yields the built-in defaults.
    pub fn load(path: &Path, explicit: bool) -> AttestResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AttestError::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(AttestError::io(read_context("config file", path), e)),
        };

        let config = Self::from_json(&content).map_err(|e| match e {
            AttestError::Config { message } => {
                AttestError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(content: &str) -> AttestResult<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| AttestError::config(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the command-line layer on top of this one.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> AttestResult<Self> {
        let toggles = [
            (&mut self.include_terraform, overrides.include_terraform),
            (&mut self.include_python, overrides.include_python),
            (&mut self.include_config, overrides.include_config),
            (&mut self.include_scripts, overrides.include_scripts),
            (&mut self.include_docs, overrides.include_docs),
        ];
        for (slot, value) in toggles {
            if let Some(v) = value {
                *slot = v;
            }
        }
        self.include_patterns
            .extend(overrides.include_patterns.iter().cloned());
        self.exclude_patterns
            .extend(overrides.exclude_patterns.iter().cloned());
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> AttestResult<()> {
        for pattern in self.include_patterns.iter().chain(&self.exclude_patterns) {
            if pattern.trim().is_empty() {
                return Err(AttestError::config("empty glob pattern"));
            }
            Glob::new(pattern)
                .map_err(|e| AttestError::config(format!("invalid glob '{pattern}': {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_fall_back_to_defaults() {
        let config = DiscoveryConfig::from_json(r#"{"include_docs": false}"#).unwrap();
        assert!(!config.include_docs);
        assert!(config.include_terraform);
        assert!(config.include_patterns.is_empty());
    }

    #[test]
    fn unknown_field_is_config_error() {
        let err = DiscoveryConfig::from_json(r#"{"include_rust": true}"#).unwrap_err();
        assert!(matches!(err, AttestError::Config { .. }));
    }

    #[test]
    fn invalid_glob_is_config_error() {
        let err = DiscoveryConfig::from_json(r#"{"exclude_patterns": ["[unclosed"]}"#).unwrap_err();
        assert!(matches!(err, AttestError::Config { .. }));
    }

    #[test]
    fn missing_default_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiscoveryConfig::load(&dir.path().join(DEFAULT_CONFIG_FILE), false).unwrap();
        assert_eq!(config, DiscoveryConfig::default());
    }

    #[test]
    fn missing_explicit_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DiscoveryConfig::load(&dir.path().join("custom.json"), true).unwrap_err();
        assert!(matches!(err, AttestError::Config { .. }));
    }

    #[test]
    fn cli_layer_wins_over_file_layer() {
        let file_layer = DiscoveryConfig::from_json(
            r#"{"include_python": false, "exclude_patterns": ["build/*"]}"#,
        )
        .unwrap();
        let overrides = ConfigOverrides {
            include_python: Some(true),
            include_scripts: Some(false),
            exclude_patterns: vec!["*.md".into()],
            ..Default::default()
        };

        let config = file_layer.with_overrides(&overrides).unwrap();
        assert!(config.include_python);
        assert!(!config.include_scripts);
        assert!(config.include_terraform);
        assert_eq!(config.exclude_patterns, vec!["build/*", "*.md"]);
    }
}
