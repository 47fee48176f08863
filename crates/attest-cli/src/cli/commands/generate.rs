//! `attest generate` - hash tracked files into a signed manifest.

use anyhow::{Context, Result};

use attest_core::{signature_path_for, GenerateOptions};

use crate::cli::args::GenerateArgs;
use crate::exit_codes;

pub fn run(args: GenerateArgs) -> Result<i32> {
    let root = &args.workspace.root;
    let config = args
        .workspace
        .load_config(args.config.as_deref())?
        .with_overrides(&args.overrides())
        .context("invalid command-line patterns")?;
    tracing::debug!(?config, "effective discovery config");

    let manifest_path = args.workspace.manifest_path(args.output.as_deref());
    let options = GenerateOptions {
        root: root.clone(),
        signature_path: signature_path_for(&manifest_path),
        manifest_path,
        config,
        key: args.key.options(),
    };

    let summary = attest_core::generate(&options)?;

    println!("Generated signed manifest:");
    println!("  Files considered: {}", summary.considered);
    println!("  Files hashed:     {}", summary.hashed);
    if !summary.skipped.is_empty() {
        println!("  Skipped:          {}", summary.skipped.len());
        for path in &summary.skipped {
            println!("    - {path} (disappeared before hashing)");
        }
    }
    println!("  Manifest:  {}", summary.manifest_path.display());
    println!("  Signature: {}", summary.signature_path.display());
    println!();
    println!("key_id: {}", summary.key_id);

    Ok(exit_codes::SUCCESS)
}
