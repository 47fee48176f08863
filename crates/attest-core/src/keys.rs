//! Key source resolution and scoped secret handling.
//!
//! Resolution order, first non-empty source wins:
//!
//! | Order | Private key | Public key |
//! |-------|-------------|------------|
//! | 1 | `--key-env VAR` (hard error if unset) | `--key-env VAR` (hard error if unset) |
//! | 2 | `ATTEST_PRIVATE_KEY` | `ATTEST_PUBLIC_KEY` |
//! | 3 | `SIGNING_PRIVATE_KEY` | `SIGNING_PUBLIC_KEY` |
//! | 4 | `private_key.pem` (or `--key`) | `public_key.pem` (or `--key`) |
//!
//! Environment variables carry PEM content, never paths.

use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::error::{read_context, AttestError, AttestResult};
use crate::manifest::StagedFile;

pub const DEFAULT_PRIVATE_KEY_FILE: &str = "private_key.pem";
pub const DEFAULT_PUBLIC_KEY_FILE: &str = "public_key.pem";

/// Which half of the key pair an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Private,
    Public,
}

impl KeyRole {
    pub fn primary_env(self) -> &'static str {
        match self {
            Self::Private => "ATTEST_PRIVATE_KEY",
            Self::Public => "ATTEST_PUBLIC_KEY",
        }
    }

    pub fn secondary_env(self) -> &'static str {
        match self {
            Self::Private => "SIGNING_PRIVATE_KEY",
            Self::Public => "SIGNING_PUBLIC_KEY",
        }
    }

    pub fn default_file(self) -> &'static str {
        match self {
            Self::Private => DEFAULT_PRIVATE_KEY_FILE,
            Self::Public => DEFAULT_PUBLIC_KEY_FILE,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Self::Private => "private key",
            Self::Public => "public key",
        }
    }
}

/// Key selection requested by the caller.
#[derive(Debug, Clone, Default)]
pub struct KeyOptions {
    /// Custom environment variable name (`--key-env`).
    pub key_env: Option<String>,
    /// Key file overriding the default (`--key`).
    pub key_file: Option<PathBuf>,
}

/// Where the key material comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    Env { var: String, pem: String },
    File(PathBuf),
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env { var, .. } => f
                .debug_struct("Env")
                .field("var", var)
                .finish_non_exhaustive(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl KeySource {
    pub fn describe(&self) -> String {
        match self {
            Self::Env { var, .. } => format!("${var}"),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Resolve the key source for `role`.
///
/// `lookup` reads an environment variable; pass `|k| std::env::var(k).ok()`
/// in production. `root` anchors the default key file.
pub fn resolve_key_source<F>(
    role: KeyRole,
    options: &KeyOptions,
    root: &Path,
    lookup: F,
) -> AttestResult<KeySource>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(var) = &options.key_env {
        return match non_empty(var) {
            Some(pem) => Ok(KeySource::Env {
                var: var.clone(),
                pem,
            }),
            None => Err(AttestError::config(format!(
                "environment variable {var} was requested with --key-env but is unset or empty"
            ))),
        };
    }

    let default_file = options
        .key_file
        .clone()
        .unwrap_or_else(|| root.join(role.default_file()));

    if let Some(pem) = non_empty(role.primary_env()) {
        return Ok(KeySource::Env {
            var: role.primary_env().to_string(),
            pem,
        });
    }

    if let Some(value) = non_empty(role.secondary_env()) {
        let trimmed = value.trim();
        if Path::new(trimmed) == default_file || trimmed == role.default_file() {
            tracing::debug!(
                var = role.secondary_env(),
                "ignoring variable that points at the default key file"
            );
        } else {
            return Ok(KeySource::Env {
                var: role.secondary_env().to_string(),
                pem: value,
            });
        }
    }

    if default_file.is_file() {
        return Ok(KeySource::File(default_file));
    }

    Err(AttestError::missing_file(
        role.noun(),
        &default_file,
        &format!(
            "set {} or {}, pass --key-env, or run `attest keygen`",
            role.primary_env(),
            role.secondary_env()
        ),
    ))
}

/// Environment-sourced key material written to an owner-only temporary
/// file. The file is removed when this value drops, on every exit path.
pub struct SecretFile {
    file: tempfile::NamedTempFile,
}

impl SecretFile {
    pub fn materialize(pem: &str) -> AttestResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".attest-key-").suffix(".pem");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o600));
        }
        let mut file = builder
            .tempfile()
            .map_err(|e| AttestError::io("failed to create key file", e))?;
        file.write_all(pem.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| AttestError::io("failed to write key file", e))?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for SecretFile {
    fn drop(&mut self) {
        // Overwrite before the tempfile guard unlinks it.
        let Ok(len) = self.file.as_file().metadata().map(|m| m.len()) else {
            return;
        };
        let file = self.file.as_file_mut();
        if file.rewind().is_ok() {
            let _ = file.write_all(&vec![0_u8; len as usize]);
            let _ = file.sync_all();
        }
    }
}

fn read_pem(source: &KeySource, role: KeyRole) -> AttestResult<(String, String)> {
    match source {
        KeySource::File(path) => {
            let pem = std::fs::read_to_string(path)
                .map_err(|e| AttestError::io(read_context(role.noun(), path), e))?;
            Ok((pem, path.display().to_string()))
        }
        KeySource::Env { var, pem } => {
            let secret = SecretFile::materialize(pem)?;
            let pem = std::fs::read_to_string(secret.path())
                .map_err(|e| AttestError::io(read_context(role.noun(), secret.path()), e))?;
            Ok((pem, format!("${var}")))
        }
    }
}

/// Load a PKCS#8 PEM signing key.
pub fn load_signing_key(source: &KeySource) -> AttestResult<SigningKey> {
    use pkcs8::DecodePrivateKey;

    let (pem, origin) = read_pem(source, KeyRole::Private)?;
    SigningKey::from_pkcs8_pem(&pem).map_err(|e| {
        AttestError::config(format!("failed to parse private key PEM from {origin}: {e}"))
    })
}

/// Load an SPKI PEM verifying key.
pub fn load_verifying_key(source: &KeySource) -> AttestResult<VerifyingKey> {
    use pkcs8::DecodePublicKey;

    let (pem, origin) = read_pem(source, KeyRole::Public)?;
    VerifyingKey::from_public_key_pem(&pem).map_err(|e| {
        AttestError::config(format!("failed to parse public key PEM from {origin}: {e}"))
    })
}

/// Files written by [`write_key_pair`].
#[derive(Debug, Clone)]
pub struct KeyPairFiles {
    pub private_path: PathBuf,
    pub public_path: PathBuf,
}

/// Write `private_key.pem` (mode 0600) and `public_key.pem` (mode 0644)
/// into `dir`, creating it if needed.
///
/// Both files are staged before either is renamed into place. Without
/// `overwrite`, an existing file of either name is a precondition error and
/// nothing is replaced.
pub fn write_key_pair(dir: &Path, key: &SigningKey, overwrite: bool) -> AttestResult<KeyPairFiles> {
    use pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    std::fs::create_dir_all(dir)
        .map_err(|e| AttestError::io(format!("failed to create {}", dir.display()), e))?;
    let files = KeyPairFiles {
        private_path: dir.join(DEFAULT_PRIVATE_KEY_FILE),
        public_path: dir.join(DEFAULT_PUBLIC_KEY_FILE),
    };
    if !overwrite {
        if let Some(existing) = [&files.private_path, &files.public_path]
            .into_iter()
            .find(|p| p.exists())
        {
            return Err(AttestError::precondition(format!(
                "{} already exists; pass --force to replace the key pair",
                existing.display()
            )));
        }
    }

    let private_pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AttestError::crypto(format!("failed to encode private key: {e}")))?;
    let public_pem = key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AttestError::crypto(format!("failed to encode public key: {e}")))?;

    let private = StagedFile::stage_with_mode(&files.private_path, private_pem.as_bytes(), 0o600)?;
    let public = StagedFile::stage_with_mode(&files.public_path, public_pem.as_bytes(), 0o644)?;
    if overwrite {
        private.commit()?;
        public.commit()?;
    } else {
        private.commit_new()?;
        public.commit_new()?;
    }
    tracing::info!(dir = %dir.display(), "wrote key pair");
    Ok(files)
}
