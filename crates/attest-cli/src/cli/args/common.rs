//! Argument groups shared by `generate` and `verify`.

use std::path::{Path, PathBuf};

use attest_core::{
    AttestResult, ConfigOverrides, DiscoveryConfig, KeyOptions, DEFAULT_CONFIG_FILE,
    DEFAULT_MANIFEST_FILE,
};

use super::GenerateArgs;

#[derive(clap::Args, Debug, Clone)]
pub struct WorkspaceArgs {
    /// Workspace root that manifest paths are relative to
    #[arg(long, default_value = ".", value_name = "DIR")]
    pub root: PathBuf,
}

impl WorkspaceArgs {
    pub fn manifest_path(&self, custom: Option<&Path>) -> PathBuf {
        custom
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.join(DEFAULT_MANIFEST_FILE))
    }

    /// An explicit `--config` must exist; the default file under the root
    /// is optional.
    pub fn load_config(&self, custom: Option<&Path>) -> AttestResult<DiscoveryConfig> {
        match custom {
            Some(path) => DiscoveryConfig::load(path, true),
            None => DiscoveryConfig::load(&self.root.join(DEFAULT_CONFIG_FILE), false),
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct KeyArgs {
    /// Key file (PKCS#8 PEM for generate, SPKI PEM for verify)
    #[arg(long, short, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Read the PEM key from this environment variable; fails if unset
    #[arg(long, value_name = "VAR")]
    pub key_env: Option<String>,
}

impl KeyArgs {
    pub fn options(&self) -> KeyOptions {
        KeyOptions {
            key_env: self.key_env.clone(),
            key_file: self.key.clone(),
        }
    }
}

/// Per-category toggles. `--include-docs` alone means true.
#[derive(clap::Args, Debug, Clone)]
pub struct CategoryArgs {
    /// Track Terraform files (*.tf, *.tfvars)
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub include_terraform: Option<bool>,

    /// Track Python sources and requirement files
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub include_python: Option<bool>,

    /// Track config formats (*.json, *.yaml, *.toml, ...)
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub include_config: Option<bool>,

    /// Track shell and PowerShell scripts
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub include_scripts: Option<bool>,

    /// Track README, LICENSE, CHANGELOG and similar docs
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub include_docs: Option<bool>,
}

impl GenerateArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            include_terraform: self.categories.include_terraform,
            include_python: self.categories.include_python,
            include_config: self.categories.include_config,
            include_scripts: self.categories.include_scripts,
            include_docs: self.categories.include_docs,
            include_patterns: self.include.clone(),
            exclude_patterns: self.exclude.clone(),
        }
    }
}
