//! Deterministic file discovery.
//!
//! Category globs match the file basename at any depth. User include globs
//! match the basename when they contain no `/`, the full relative path
//! otherwise. Exclude globs always match the full relative path, anchored,
//! with shell semantics where `*` may cross `/`.

use std::collections::BTreeSet;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

use crate::config::DiscoveryConfig;
use crate::error::{AttestError, AttestResult};

pub const TERRAFORM_PATTERNS: &[&str] = &["*.tf", "*.tfvars", "*.tf.json"];
pub const PYTHON_PATTERNS: &[&str] = &[
    "*.py",
    "*.pyi",
    "requirements*.txt",
    "pyproject.toml",
    "setup.cfg",
];
pub const CONFIG_PATTERNS: &[&str] = &[
    "*.json", "*.yaml", "*.yml", "*.toml", "*.ini", "*.cfg", "*.conf",
];
pub const SCRIPT_PATTERNS: &[&str] = &["*.sh", "*.bash", "*.zsh", "*.ps1"];
pub const DOC_PATTERNS: &[&str] = &[
    "README*",
    "LICENSE*",
    "CHANGELOG*",
    "CONTRIBUTING*",
    "SECURITY*",
];

/// Directories never descended into, besides dot-prefixed ones.
pub const CACHE_DIRS: &[&str] = &["__pycache__", "node_modules"];

/// Compiled matchers for one discovery run.
#[derive(Debug)]
pub struct FileMatcher {
    categories: GlobSet,
    include_basename: GlobSet,
    include_path: GlobSet,
    exclude: GlobSet,
    reserved: BTreeSet<String>,
}

impl FileMatcher {
    /// Compile matchers from a config.
    ///
    /// `reserved` holds root-relative paths (the manifest and its signature)
    /// that must never be listed.
    pub fn new(config: &DiscoveryConfig, reserved: &[String]) -> AttestResult<Self> {
        let mut categories = Vec::new();
        let enabled = [
            (config.include_terraform, TERRAFORM_PATTERNS),
            (config.include_python, PYTHON_PATTERNS),
            (config.include_config, CONFIG_PATTERNS),
            (config.include_scripts, SCRIPT_PATTERNS),
            (config.include_docs, DOC_PATTERNS),
        ];
        for (on, patterns) in enabled {
            if on {
                categories.extend(patterns.iter().map(|p| p.to_string()));
            }
        }

        let (path_includes, basename_includes): (Vec<String>, Vec<String>) = config
            .include_patterns
            .iter()
            .map(|p| strip_dot_slash(p).to_string())
            .partition(|p| p.contains('/'));

        let excludes: Vec<String> = config
            .exclude_patterns
            .iter()
            .map(|p| strip_dot_slash(p).to_string())
            .collect();

        Ok(Self {
            categories: compile_globset(&categories)?,
            include_basename: compile_globset(&basename_includes)?,
            include_path: compile_globset(&path_includes)?,
            exclude: compile_globset(&excludes)?,
            reserved: reserved
                .iter()
                .map(|p| strip_dot_slash(p).to_string())
                .collect(),
        })
    }

    /// Whether a root-relative file path belongs in the manifest.
    pub fn is_tracked(&self, rel_path: &str) -> bool {
        let rel_path = strip_dot_slash(rel_path);
        if self.reserved.contains(rel_path) || self.exclude.is_match(rel_path) {
            return false;
        }
        let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);
        self.categories.is_match(basename)
            || self.include_basename.is_match(basename)
            || self.include_path.is_match(rel_path)
    }
}

fn compile_globset(globs: &[String]) -> AttestResult<GlobSet> {
    let mut b = GlobSetBuilder::new();
    for g in globs {
        let glob =
            Glob::new(g).map_err(|e| AttestError::config(format!("invalid glob '{g}': {e}")))?;
        b.add(glob);
    }
    b.build()
        .map_err(|e| AttestError::config(format!("failed to compile globs: {e}")))
}

fn strip_dot_slash(path: &str) -> &str {
    let mut p = path;
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p
}

fn is_pruned_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || CACHE_DIRS.iter().any(|d| *d == name)
}

/// Root-relative path with `/` separators, or `None` for non-UTF-8 names.
pub(crate) fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        parts.push(component.as_os_str().to_str()?);
    }
    Some(parts.join("/"))
}

/// List tracked files under `root`, sorted and duplicate-free.
///
/// Symlinks, directories and other non-regular files are never listed.
/// A config that matches nothing yields an empty list.
pub fn discover_files(
    root: &Path,
    config: &DiscoveryConfig,
    reserved: &[String],
) -> AttestResult<Vec<String>> {
    if !root.is_dir() {
        return Err(AttestError::precondition(format!(
            "workspace root is not a directory: {}",
            root.display()
        )));
    }
    let matcher = FileMatcher::new(config, reserved)?;

    let mut found = BTreeSet::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_pruned_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry during discovery");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(rel) = relative_slash_path(root, entry.path()) else {
            tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 path");
            continue;
        };
        if matcher.is_tracked(&rel) {
            found.insert(rel);
        }
    }

    tracing::debug!(count = found.len(), root = %root.display(), "discovered files");
    Ok(found.into_iter().collect())
}
