//! Manifest serialization, strict parsing and atomic persistence.
//!
//! On disk a manifest is a pretty-printed JSON object mapping root-relative
//! paths to lowercase hex SHA-256 digests, keys in byte order, followed by a
//! newline. The signature covers exactly these bytes.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::Write;
use std::path::Path;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AttestError, AttestResult};

/// Default manifest file name, resolved against the workspace root.
pub const DEFAULT_MANIFEST_FILE: &str = "checksums.json";

/// Suffix appended to the manifest path for the detached signature.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Path -> digest mapping, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: String, digest: String) {
        self.entries.insert(path, digest);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Canonical on-disk bytes. Identical entries always give identical bytes.
    pub fn to_bytes(&self) -> AttestResult<Vec<u8>> {
        let mut out = serde_json::to_vec_pretty(&self.entries)
            .map_err(serialize_error)?;
        out.push(b'\n');
        Ok(out)
    }
}

fn serialize_error(e: serde_json::Error) -> AttestError {
    AttestError::io("failed to serialize manifest", e.into())
}

/// One parsed manifest entry. Non-string digests become empty strings so
/// verification skips them as malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: String,
    pub digest: String,
}

struct StrictEntries(Vec<ManifestEntry>);

impl<'de> Deserialize<'de> for StrictEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = StrictEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object mapping paths to digests")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut seen = HashSet::new();
                let mut entries = Vec::new();
                while let Some((path, value)) = map.next_entry::<String, Value>()? {
                    if !seen.insert(path.clone()) {
                        return Err(de::Error::custom(format!("duplicate key '{path}'")));
                    }
                    let digest = match value {
                        Value::String(s) => s,
                        _ => String::new(),
                    };
                    entries.push(ManifestEntry { path, digest });
                }
                Ok(StrictEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Parse manifest bytes, rejecting non-object roots and duplicate keys.
///
/// Entries keep their on-disk order.
pub fn parse_manifest(bytes: &[u8]) -> AttestResult<Vec<ManifestEntry>> {
    let StrictEntries(entries) = serde_json::from_slice(bytes)
        .map_err(|e| AttestError::crypto(format!("manifest is not a valid path map: {e}")))?;
    Ok(entries)
}

/// Signature path for a manifest path: `<manifest>.sig`.
pub fn signature_path_for(manifest: &Path) -> std::path::PathBuf {
    let mut os = manifest.as_os_str().to_owned();
    os.push(SIGNATURE_SUFFIX);
    os.into()
}

/// Bytes staged next to their destination, renamed into place by
/// [`StagedFile::commit`]. Dropped without commit, nothing is left behind.
pub struct StagedFile {
    tmp: tempfile::NamedTempFile,
    dest: std::path::PathBuf,
}

impl StagedFile {
    pub fn stage(dest: &Path, bytes: &[u8]) -> AttestResult<Self> {
        Self::stage_with(dest, bytes, &tempfile::Builder::new())
    }

    /// Stage with the given unix mode set when the temp file is created,
    /// so the content is never readable with wider permissions.
    pub fn stage_with_mode(dest: &Path, bytes: &[u8], mode: u32) -> AttestResult<Self> {
        let mut builder = tempfile::Builder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(mode));
        }
        #[cfg(not(unix))]
        let _ = mode;
        Self::stage_with(dest, bytes, &builder)
    }

    fn stage_with(dest: &Path, bytes: &[u8], builder: &tempfile::Builder<'_, '_>) -> AttestResult<Self> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = builder.tempfile_in(dir).map_err(|e| {
            AttestError::io(format!("failed to stage {}", dest.display()), e)
        })?;
        tmp.write_all(bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| AttestError::io(format!("failed to write {}", dest.display()), e))?;
        Ok(Self {
            tmp,
            dest: dest.to_path_buf(),
        })
    }

    pub fn commit(self) -> AttestResult<()> {
        let dest = self.dest;
        self.tmp
            .persist(&dest)
            .map_err(|e| AttestError::io(format!("failed to write {}", dest.display()), e.error))?;
        Ok(())
    }

    /// Like [`StagedFile::commit`], but fails if the destination exists.
    pub fn commit_new(self) -> AttestResult<()> {
        let dest = self.dest;
        self.tmp.persist_noclobber(&dest).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                AttestError::precondition(format!("refusing to replace {}", dest.display()))
            } else {
                AttestError::io(format!("failed to write {}", dest.display()), e.error)
            }
        })?;
        Ok(())
    }
}
