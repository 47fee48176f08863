use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod common;
pub use common::*;

#[derive(Parser, Debug)]
#[command(
    name = "attest",
    version,
    about = "Sign a manifest of project file digests and verify it later"
)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Hash tracked files into a manifest and sign it
    Generate(GenerateArgs),
    /// Check the manifest signature, then every recorded digest
    Verify(VerifyArgs),
    /// Generate an ed25519 keypair for signing
    Keygen(KeygenArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Manifest output path (default: <ROOT>/checksums.json)
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Discovery config file (default: <ROOT>/checksum_config.json if present)
    #[arg(long, short, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub key: KeyArgs,

    #[command(flatten)]
    pub categories: CategoryArgs,

    /// Extra glob to include (repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Glob matched against the relative path to exclude (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Manifest to verify (default: <ROOT>/checksums.json)
    #[arg(long, short, visible_alias = "output", value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Discovery config file, checked before verifying (default: <ROOT>/checksum_config.json if present)
    #[arg(long, short, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub key: KeyArgs,

    /// Only print failures and the summary
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct KeygenArgs {
    /// Output directory for keypair files
    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    /// Force overwrite existing files
    #[arg(long, short)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn category_toggles_take_optional_bool() {
        let cli = Cli::try_parse_from([
            "attest",
            "generate",
            "--include-docs=false",
            "--include-python",
            "--exclude",
            "tests/*",
            "--exclude",
            "*.md",
        ])
        .unwrap();
        let Command::Generate(args) = cli.cmd else {
            panic!("expected generate");
        };
        let overrides = args.overrides();
        assert_eq!(overrides.include_docs, Some(false));
        assert_eq!(overrides.include_python, Some(true));
        assert_eq!(overrides.include_terraform, None);
        assert_eq!(overrides.exclude_patterns, vec!["tests/*", "*.md"]);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["attest", "verify", "--bogus"]).is_err());
    }

    #[test]
    fn key_env_is_parsed() {
        let cli =
            Cli::try_parse_from(["attest", "verify", "--key-env", "CI_PUBKEY", "-v"]).unwrap();
        assert!(cli.verbose);
        let Command::Verify(args) = cli.cmd else {
            panic!("expected verify");
        };
        assert_eq!(args.key.key_env.as_deref(), Some("CI_PUBKEY"));
    }
}
