//! `attest verify` - check the manifest signature, then every file digest.

use anyhow::Result;

use attest_core::{signature_path_for, FileStatus, VerifyOptions, VerifyReport};

use crate::cli::args::VerifyArgs;
use crate::exit_codes;

pub fn run(args: VerifyArgs) -> Result<i32> {
    // The signed manifest decides what is checked; a broken config is still
    // reported so CI catches it at verify time too.
    let config = args.workspace.load_config(args.config.as_deref())?;
    tracing::debug!(?config, "discovery config is valid");

    let manifest_path = args.workspace.manifest_path(args.manifest.as_deref());
    let options = VerifyOptions {
        root: args.workspace.root.clone(),
        signature_path: signature_path_for(&manifest_path),
        manifest_path,
        key: args.key.options(),
    };

    let report = attest_core::verify(&options)?;
    if !args.quiet {
        println!("Signature valid (key_id: {})", report.key_id);
        println!();
    }
    print_outcomes(&report, args.quiet);
    print_summary(&report);

    if report.is_verified() {
        Ok(exit_codes::SUCCESS)
    } else {
        eprintln!("error: integrity check failed for {} file(s)", report.failed);
        Ok(exit_codes::FAILURE)
    }
}

fn print_outcomes(report: &VerifyReport, quiet: bool) {
    for outcome in &report.outcomes {
        match &outcome.status {
            FileStatus::Verified if quiet => {}
            FileStatus::Verified => println!("  ok    {}", outcome.path),
            FileStatus::HashMismatch { expected, actual } => {
                println!("  FAIL  {} (hash mismatch)", outcome.path);
                println!("          expected: {expected}");
                println!("          actual:   {actual}");
            }
            FileStatus::Unreadable(reason) => {
                println!("  FAIL  {} (unreadable: {reason})", outcome.path);
            }
            status => println!("  FAIL  {} ({})", outcome.path, status.label()),
        }
    }
}

fn print_summary(report: &VerifyReport) {
    println!();
    println!("Summary:");
    println!("  Total:    {}", report.total());
    println!("  Verified: {}", report.verified);
    println!("  Failed:   {}", report.failed);
    if report.skipped > 0 {
        println!("  Skipped:  {} (malformed entries)", report.skipped);
    }
}
