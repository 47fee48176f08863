//! SHA-256 content digests for tracked files.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

const READ_BUF: usize = 64 * 1024;

/// Feed everything `source` yields into `hasher`, returning the byte count.
fn absorb(hasher: &mut Sha256, source: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = vec![0_u8; READ_BUF];
    let mut total = 0_u64;
    loop {
        match source.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => {
                hasher.update(&buf[..n]);
                total += n as u64;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

/// Hash a file's full contents to lowercase hex.
///
/// Errors are returned as-is so callers can tell `NotFound` apart from other
/// read failures.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let len = absorb(&mut hasher, &mut file)?;
    tracing::trace!(path = %path.display(), bytes = len, "digested");
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn write(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn empty_file_has_the_well_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "empty.tfvars", b"");
        assert_eq!(sha256_file(&path).unwrap(), EMPTY);
    }

    #[test]
    fn digest_is_lowercase_hex_of_fixed_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "main.tf", b"resource \"null_resource\" \"x\" {}\n");
        let d = sha256_file(&path).unwrap();
        assert_eq!(d.len(), DIGEST_HEX_LEN);
        assert!(d.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }

    #[test]
    fn files_larger_than_one_read_match_one_shot_digest() {
        let dir = tempfile::tempdir().unwrap();
        let content: Vec<u8> = (0..READ_BUF * 3 + 17).map(|i| (i % 251) as u8).collect();
        let path = write(dir.path(), "bundle.json", &content);

        let expected = hex::encode(Sha256::digest(&content));
        assert_eq!(sha256_file(&path).unwrap(), expected);
    }

    #[test]
    fn one_byte_edit_changes_digest() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.py", b"print('hi')\n");
        let b = write(dir.path(), "b.py", b"print('hj')\n");
        assert_ne!(sha256_file(&a).unwrap(), sha256_file(&b).unwrap());
    }

    #[test]
    fn missing_file_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = sha256_file(&dir.path().join("gone.tf")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn interrupted_reads_are_retried() {
        struct Flaky {
            data: &'static [u8],
            interrupt_next: bool,
        }
        impl Read for Flaky {
            fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
                self.interrupt_next = !self.interrupt_next;
                if self.interrupt_next {
                    return Err(ErrorKind::Interrupted.into());
                }
                let n = self.data.len().min(out.len()).min(5);
                out[..n].copy_from_slice(&self.data[..n]);
                self.data = &self.data[n..];
                Ok(n)
            }
        }

        let data = b"variable \"region\" {}\n";
        let mut hasher = Sha256::new();
        let len = absorb(
            &mut hasher,
            &mut Flaky {
                data,
                interrupt_next: false,
            },
        )
        .unwrap();
        assert_eq!(len, data.len() as u64);
        assert_eq!(hex::encode(hasher.finalize()), hex::encode(Sha256::digest(data)));
    }
}
