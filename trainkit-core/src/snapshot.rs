//! Source-tree snapshots for reproducibility.
//!
//! A fresh run copies the code that produced it into `<model_dir>/code`, so a
//! checkpoint can later be matched with the exact sources. Only files with a
//! listed extension and directories with a listed name are copied; the same
//! rule applies at every depth.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::Result;

/// Which entries of a source tree end up in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRules {
    /// File extensions to copy, without the leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directory names to descend into.
    #[serde(default = "default_allowed_dirs")]
    pub allowed_dirs: Vec<String>,
}

impl Default for SnapshotRules {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            allowed_dirs: default_allowed_dirs(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["rs".to_string(), "toml".to_string()]
}

fn default_allowed_dirs() -> Vec<String> {
    vec!["src".to_string()]
}

impl SnapshotRules {
    fn keeps_dir(&self, name: &str) -> bool {
        self.allowed_dirs.iter().any(|d| d == name)
    }

    fn keeps_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    fn keeps(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return self.keeps_dir(&name);
        }
        if file_type.is_symlink() {
            // Judge links by what they point at; dangling links are kept.
            return match entry.path().metadata() {
                Ok(meta) if meta.is_dir() => self.keeps_dir(&name),
                Ok(_) => self.keeps_file(entry.path()),
                Err(_) => true,
            };
        }
        self.keeps_file(entry.path())
    }
}

/// What a snapshot copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReport {
    /// Copied files and links, relative to the snapshot root, sorted.
    pub files: Vec<PathBuf>,
    /// SHA-256 over every copied path and its contents (or link target).
    pub digest: String,
}

/// Copy the parts of `src` selected by `rules` into the new directory `dst`.
///
/// Fails if `dst` already exists. Symbolic links are recreated, not followed.
pub fn snapshot_source_tree(src: &Path, dst: &Path, rules: &SnapshotRules) -> Result<SnapshotReport> {
    if dst.symlink_metadata().is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("snapshot destination {} already exists", dst.display()),
        )
        .into());
    }
    if !src.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("snapshot source {} is not a directory", src.display()),
        )
        .into());
    }
    fs::create_dir_all(dst)?;

    let mut hasher = Sha256::new();
    let mut files = Vec::new();
    let walker = WalkDir::new(src)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || rules.keeps(e));

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if entry.depth() == 0 {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?
            .to_path_buf();
        let target = dst.join(&rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir(&target)?;
            continue;
        }

        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            hasher.update(link.to_string_lossy().as_bytes());
            copy_symlink(entry.path(), &link, &target)?;
        } else {
            let contents = fs::read(entry.path())?;
            hasher.update(&contents);
            fs::write(&target, &contents)?;
        }
        hasher.update(b"\n");
        debug!(path = %rel.display(), "Snapshot entry");
        files.push(rel);
    }

    files.sort();
    let report = SnapshotReport {
        files,
        digest: format!("{:x}", hasher.finalize()),
    };
    info!(
        src = %src.display(),
        dst = %dst.display(),
        files = report.files.len(),
        "Snapshotted source tree"
    );
    Ok(report)
}

#[cfg(unix)]
fn copy_symlink(_src: &Path, link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _link: &Path, target: &Path) -> io::Result<()> {
    if src.is_file() {
        fs::copy(src, target)?;
    }
    Ok(())
}
