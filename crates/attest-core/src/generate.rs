//! Manifest generation: discover, hash, serialize, sign, persist.

use std::path::{Path, PathBuf};

use crate::config::DiscoveryConfig;
use crate::digest::sha256_file;
use crate::discovery::{discover_files, relative_slash_path};
use crate::error::{AttestError, AttestResult};
use crate::keys::{load_signing_key, resolve_key_source, KeyOptions, KeyRole};
use crate::manifest::{Manifest, StagedFile};
use crate::signing::{key_id, sign_manifest};

/// Inputs for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub signature_path: PathBuf,
    pub config: DiscoveryConfig,
    pub key: KeyOptions,
}

/// What a generation run produced.
#[derive(Debug, Clone)]
pub struct GenerateSummary {
    /// Files discovered.
    pub considered: usize,
    /// Files hashed into the manifest.
    pub hashed: usize,
    /// Files that vanished between discovery and hashing.
    pub skipped: Vec<String>,
    pub manifest_path: PathBuf,
    pub signature_path: PathBuf,
    pub key_id: String,
}

/// Root-relative form of an output path, if it lies under `root`.
///
/// Both sides are resolved through the filesystem so `..` segments and
/// symlinked directories still match the paths discovery produces. The
/// output file itself may not exist yet, so only its directory is resolved.
fn reserved_path(root: &Path, output: &Path) -> Option<String> {
    let root = std::fs::canonicalize(root).ok()?;
    let name = output.file_name()?;
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let output = std::fs::canonicalize(dir).ok()?.join(name);
    relative_slash_path(&root, &output)
}

/// Hash every listed file. Files that disappeared since discovery are
/// skipped with a warning; any other read failure aborts the run.
pub fn hash_files(root: &Path, files: &[String]) -> AttestResult<(Manifest, Vec<String>)> {
    let mut manifest = Manifest::new();
    let mut skipped = Vec::new();

    for rel in files {
        let path = root.join(rel);
        match sha256_file(&path) {
            Ok(digest) => {
                tracing::debug!(path = %rel, digest = %digest, "hashed");
                manifest.insert(rel.clone(), digest);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %rel, "file disappeared before hashing, skipping");
                skipped.push(rel.clone());
            }
            Err(e) => {
                return Err(AttestError::io(format!("failed to hash {rel}"), e));
            }
        }
    }

    Ok((manifest, skipped))
}

/// Run the full generation pipeline with the process environment.
pub fn generate(options: &GenerateOptions) -> AttestResult<GenerateSummary> {
    generate_with_env(options, |k| std::env::var(k).ok())
}

/// Run the generation pipeline with an explicit environment lookup.
///
/// The key is resolved before any filesystem walk so configuration errors
/// fail fast. Manifest and signature are staged and only renamed into place
/// once signing succeeded, so a failed run never leaves a mismatched pair.
pub fn generate_with_env<F>(options: &GenerateOptions, lookup: F) -> AttestResult<GenerateSummary>
where
    F: Fn(&str) -> Option<String>,
{
    let source = resolve_key_source(KeyRole::Private, &options.key, &options.root, lookup)?;
    tracing::debug!(source = %source.describe(), "resolved private key");
    let signing_key = load_signing_key(&source)?;

    let reserved: Vec<String> = [&options.manifest_path, &options.signature_path]
        .into_iter()
        .filter_map(|p| reserved_path(&options.root, p))
        .collect();

    let files = discover_files(&options.root, &options.config, &reserved)?;
    if files.is_empty() {
        tracing::warn!("no files matched the enabled categories; writing an empty manifest");
    }

    let (manifest, skipped) = hash_files(&options.root, &files)?;
    let bytes = manifest.to_bytes()?;
    let signature = sign_manifest(&bytes, &signing_key);

    let staged_manifest = StagedFile::stage(&options.manifest_path, &bytes)?;
    let staged_signature = StagedFile::stage(&options.signature_path, &signature)?;
    staged_manifest.commit()?;
    if let Err(e) = staged_signature.commit() {
        // The manifest now on disk has no matching signature; drop it.
        if let Err(cleanup) = std::fs::remove_file(&options.manifest_path) {
            tracing::warn!(
                path = %options.manifest_path.display(),
                error = %cleanup,
                "failed to remove unsigned manifest"
            );
        }
        return Err(e);
    }

    tracing::info!(
        files = manifest.len(),
        manifest = %options.manifest_path.display(),
        "manifest signed"
    );

    Ok(GenerateSummary {
        considered: files.len(),
        hashed: manifest.len(),
        skipped,
        manifest_path: options.manifest_path.clone(),
        signature_path: options.signature_path.clone(),
        key_id: key_id(&signing_key.verifying_key())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{parse_manifest, signature_path_for, DEFAULT_MANIFEST_FILE};
    use crate::signing::{generate_signing_key, verify_manifest};
    use pkcs8::{EncodePrivateKey, LineEnding};

    fn options(root: &Path) -> GenerateOptions {
        let manifest_path = root.join(DEFAULT_MANIFEST_FILE);
        GenerateOptions {
            root: root.to_path_buf(),
            signature_path: signature_path_for(&manifest_path),
            manifest_path,
            config: DiscoveryConfig::default(),
            key: KeyOptions::default(),
        }
    }

    fn pem_env(key: &ed25519_dalek::SigningKey) -> impl Fn(&str) -> Option<String> {
        let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        move |k| (k == "ATTEST_PRIVATE_KEY").then(|| pem.clone())
    }

    #[test]
    fn generates_signed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), "terraform {}\n").unwrap();
        std::fs::write(dir.path().join("deploy.sh"), "#!/bin/sh\n").unwrap();
        let key = generate_signing_key();
        let opts = options(dir.path());

        let summary = generate_with_env(&opts, pem_env(&key)).unwrap();
        assert_eq!(summary.considered, 2);
        assert_eq!(summary.hashed, 2);

        let bytes = std::fs::read(&opts.manifest_path).unwrap();
        let sig = std::fs::read(&opts.signature_path).unwrap();
        verify_manifest(&bytes, &sig, &key.verifying_key()).unwrap();

        let paths: Vec<_> = parse_manifest(&bytes)
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec!["deploy.sh", "main.tf"]);
    }

    #[test]
    fn regeneration_is_byte_identical_and_skips_own_outputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.yaml"), "a: 1\n").unwrap();
        let key = generate_signing_key();
        let opts = options(dir.path());

        generate_with_env(&opts, pem_env(&key)).unwrap();
        let first = std::fs::read(&opts.manifest_path).unwrap();
        let summary = generate_with_env(&opts, pem_env(&key)).unwrap();
        let second = std::fs::read(&opts.manifest_path).unwrap();

        assert_eq!(first, second);
        assert_eq!(summary.considered, 1);
    }

    #[test]
    fn empty_discovery_still_signs() {
        let dir = tempfile::tempdir().unwrap();
        let key = generate_signing_key();
        let opts = options(dir.path());

        let summary = generate_with_env(&opts, pem_env(&key)).unwrap();
        assert_eq!(summary.hashed, 0);
        assert_eq!(std::fs::read(&opts.manifest_path).unwrap(), b"{}\n");
        assert!(opts.signature_path.exists());
    }

    #[test]
    fn missing_key_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), "x").unwrap();
        let opts = options(dir.path());

        let err = generate_with_env(&opts, |_| None).unwrap_err();
        assert!(matches!(err, AttestError::Precondition { .. }));
        assert!(!opts.manifest_path.exists());
        assert!(!opts.signature_path.exists());
    }

    #[test]
    fn vanished_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x").unwrap();

        let files = vec!["a.py".to_string(), "b.py".to_string()];
        let (manifest, skipped) = hash_files(dir.path(), &files).unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(skipped, vec!["b.py"]);
    }

    #[test]
    fn reserved_path_is_root_relative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        let inside = dir.path().join("out").join("sums.json");
        assert_eq!(
            reserved_path(dir.path(), &inside).as_deref(),
            Some("out/sums.json")
        );
        assert_eq!(reserved_path(&dir.path().join("sub"), &inside), None);
    }

    #[test]
    fn dotdot_output_path_is_still_reserved() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("main.tf"), "terraform {}\n").unwrap();
        let key = generate_signing_key();

        let manifest_path = dir.path().join("sub").join("..").join(DEFAULT_MANIFEST_FILE);
        let mut opts = options(dir.path());
        opts.signature_path = signature_path_for(&manifest_path);
        opts.manifest_path = manifest_path;

        generate_with_env(&opts, pem_env(&key)).unwrap();
        let first = std::fs::read(&opts.manifest_path).unwrap();
        let summary = generate_with_env(&opts, pem_env(&key)).unwrap();
        let second = std::fs::read(&opts.manifest_path).unwrap();

        assert_eq!(first, second);
        assert_eq!(summary.considered, 1);
        let paths: Vec<_> = parse_manifest(&second)
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec!["main.tf"]);

        let report = crate::verify::verify_with_env(
            &crate::verify::VerifyOptions {
                root: dir.path().to_path_buf(),
                manifest_path: opts.manifest_path.clone(),
                signature_path: opts.signature_path.clone(),
                key: KeyOptions::default(),
            },
            |k| {
                (k == "ATTEST_PUBLIC_KEY").then(|| {
                    use pkcs8::EncodePublicKey;
                    key.verifying_key().to_public_key_pem(LineEnding::LF).unwrap()
                })
            },
        )
        .unwrap();
        assert!(report.is_verified());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_root_still_reserves_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir(&real).unwrap();
        std::fs::write(real.join("settings.json"), "{}").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let key = generate_signing_key();

        let mut opts = options(&link);
        opts.manifest_path = real.join(DEFAULT_MANIFEST_FILE);
        opts.signature_path = signature_path_for(&opts.manifest_path);

        generate_with_env(&opts, pem_env(&key)).unwrap();
        let summary = generate_with_env(&opts, pem_env(&key)).unwrap();
        assert_eq!(summary.considered, 1);
    }

    #[test]
    fn failed_signature_commit_removes_new_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), "terraform {}\n").unwrap();
        let key = generate_signing_key();
        let opts = options(dir.path());
        // A directory at the signature path makes the final rename fail.
        std::fs::create_dir(&opts.signature_path).unwrap();
        std::fs::write(opts.signature_path.join("keep"), "x").unwrap();

        let err = generate_with_env(&opts, pem_env(&key)).unwrap_err();
        assert!(matches!(err, AttestError::Io { .. }));
        assert!(!opts.manifest_path.exists());
        assert!(opts.signature_path.is_dir());
    }
}
