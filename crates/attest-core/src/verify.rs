//! Manifest verification.
//!
//! Two gated stages: the detached signature is checked against the exact
//! on-disk manifest bytes, and only if it holds is every listed file
//! re-hashed and compared. A bad signature yields no per-file outcomes.

use std::path::{Component, Path, PathBuf};

use crate::digest::sha256_file;
use crate::error::{read_context, AttestError, AttestResult};
use crate::keys::{load_verifying_key, resolve_key_source, KeyOptions, KeyRole};
use crate::manifest::parse_manifest;
use crate::signing::{key_id, verify_manifest};

/// Inputs for one verification run.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub signature_path: PathBuf,
    pub key: KeyOptions,
}

/// Outcome for one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Verified,
    Missing,
    HashMismatch { expected: String, actual: String },
    Unreadable(String),
    /// Absolute path or one escaping the workspace root.
    InvalidPath,
}

impl FileStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Verified)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Verified => "ok",
            Self::Missing => "missing",
            Self::HashMismatch { .. } => "hash mismatch",
            Self::Unreadable(_) => "unreadable",
            Self::InvalidPath => "invalid path",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: String,
    pub status: FileStatus,
}

/// Result of the integrity stage.
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub outcomes: Vec<FileOutcome>,
    pub verified: usize,
    pub failed: usize,
    /// Entries with an empty path or digest.
    pub skipped: usize,
    pub key_id: String,
}

impl VerifyReport {
    pub fn total(&self) -> usize {
        self.verified + self.failed
    }

    pub fn is_verified(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_ok())
    }
}

fn is_contained(rel: &str) -> bool {
    Path::new(rel)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Re-hash one entry and compare against the recorded digest.
pub fn check_entry(root: &Path, rel: &str, expected: &str) -> FileStatus {
    if !is_contained(rel) {
        return FileStatus::InvalidPath;
    }
    match sha256_file(&root.join(rel)) {
        Ok(actual) if actual == expected.to_ascii_lowercase() => FileStatus::Verified,
        Ok(actual) => FileStatus::HashMismatch {
            expected: expected.to_string(),
            actual,
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileStatus::Missing,
        Err(e) => FileStatus::Unreadable(e.to_string()),
    }
}

fn read_required(what: &str, path: &Path, hint: &str) -> AttestResult<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AttestError::missing_file(what, path, hint))
        }
        Err(e) => Err(AttestError::io(read_context(what, path), e)),
    }
}

/// Verify with the process environment.
pub fn verify(options: &VerifyOptions) -> AttestResult<VerifyReport> {
    verify_with_env(options, |k| std::env::var(k).ok())
}

/// Verify with an explicit environment lookup.
///
/// `Err` means a precondition, configuration or signature failure. Per-file
/// failures are reported in the returned [`VerifyReport`].
pub fn verify_with_env<F>(options: &VerifyOptions, lookup: F) -> AttestResult<VerifyReport>
where
    F: Fn(&str) -> Option<String>,
{
    let source = resolve_key_source(KeyRole::Public, &options.key, &options.root, lookup)?;
    let manifest_bytes = read_required(
        "manifest",
        &options.manifest_path,
        "run `attest generate` first",
    )?;
    let signature = read_required(
        "signature",
        &options.signature_path,
        "run `attest generate` to sign the manifest",
    )?;
    let verifying_key = load_verifying_key(&source)?;
    tracing::debug!(source = %source.describe(), "resolved public key");

    verify_manifest(&manifest_bytes, &signature, &verifying_key)?;
    tracing::info!(manifest = %options.manifest_path.display(), "signature valid");

    let entries = parse_manifest(&manifest_bytes)?;
    let mut report = VerifyReport {
        key_id: key_id(&verifying_key)?,
        ..Default::default()
    };

    for entry in entries {
        if entry.path.is_empty() || entry.digest.is_empty() {
            tracing::debug!(path = %entry.path, "skipping malformed manifest entry");
            report.skipped += 1;
            continue;
        }
        let status = check_entry(&options.root, &entry.path, &entry.digest);
        if status.is_ok() {
            report.verified += 1;
        } else {
            tracing::warn!(path = %entry.path, status = status.label(), "integrity check failed");
            report.failed += 1;
        }
        report.outcomes.push(FileOutcome {
            path: entry.path,
            status,
        });
    }

    Ok(report)
}
