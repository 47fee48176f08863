//! File-integrity attestation.
//!
//! Discovers project files, records their SHA-256 digests in a manifest,
//! signs the manifest with a detached ed25519 signature, and later verifies
//! the signature before re-hashing every listed file.
//!
//! # Quick Start
//!
//! ```no_run
//! use attest_core::{generate, verify, DiscoveryConfig, GenerateOptions, KeyOptions, VerifyOptions};
//! use std::path::PathBuf;
//!
//! # fn example() -> anyhow::Result<()> {
//! let root = PathBuf::from(".");
//! let manifest_path = root.join(attest_core::DEFAULT_MANIFEST_FILE);
//! let signature_path = attest_core::signature_path_for(&manifest_path);
//!
//! generate(&GenerateOptions {
//!     root: root.clone(),
//!     manifest_path: manifest_path.clone(),
//!     signature_path: signature_path.clone(),
//!     config: DiscoveryConfig::default(),
//!     key: KeyOptions::default(),
//! })?;
//!
//! let report = verify(&VerifyOptions {
//!     root,
//!     manifest_path,
//!     signature_path,
//!     key: KeyOptions::default(),
//! })?;
//! assert!(report.is_verified());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `ATTEST_PRIVATE_KEY` | PKCS#8 PEM signing key |
//! | `SIGNING_PRIVATE_KEY` | Fallback signing key |
//! | `ATTEST_PUBLIC_KEY` | SPKI PEM verifying key |
//! | `SIGNING_PUBLIC_KEY` | Fallback verifying key |

pub mod config;
pub mod digest;
pub mod discovery;
pub mod error;
pub mod generate;
pub mod keys;
pub mod manifest;
pub mod signing;
pub mod verify;

pub use config::{ConfigOverrides, DiscoveryConfig, DEFAULT_CONFIG_FILE};
pub use discovery::discover_files;
pub use error::{AttestError, AttestResult};
pub use generate::{generate, generate_with_env, GenerateOptions, GenerateSummary};
pub use keys::{KeyOptions, KeyRole, KeySource};
pub use manifest::{signature_path_for, Manifest, DEFAULT_MANIFEST_FILE, SIGNATURE_SUFFIX};
pub use signing::{generate_signing_key, key_id};
pub use verify::{verify, verify_with_env, FileOutcome, FileStatus, VerifyOptions, VerifyReport};
