//! Project scanners: walk an app project and extract a fact document.
//!
//! Scanners are best effort. Unreadable or unparseable files inside the project are skipped;
//! only an unreadable project root is an error.

pub mod android;
pub mod ios;
mod plist;

pub use android::scan_android;
pub use ios::scan_ios;

use crate::error::{PolicyError, PolicyResult};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into (build output, vendored dependencies, VCS metadata).
pub const SKIPPED_DIRS: &[&str] = &[
    ".git",
    ".gradle",
    ".build",
    ".idea",
    "build",
    "node_modules",
    "Pods",
    "Carthage",
    "DerivedData",
];

/// Files larger than this are not read.
pub const MAX_SCANNED_FILE_BYTES: u64 = 4 * 1024 * 1024;

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// All regular files under `root`, sorted, skipping [`SKIPPED_DIRS`].
pub(crate) fn project_files(root: &Path) -> PolicyResult<Vec<PathBuf>> {
    let meta = std::fs::metadata(root).map_err(|e| PolicyError::io(root, e))?;
    if !meta.is_dir() {
        return Err(PolicyError::io(
            root,
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "project path is not a directory",
            ),
        ));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable path");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    // Stable order.
    files.sort();
    Ok(files)
}

/// Read a project file as text. Oversized or unreadable files yield `None`.
pub(crate) fn read_text(path: &Path) -> Option<String> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_SCANNED_FILE_BYTES => {
            tracing::debug!(path = %path.display(), size = meta.len(), "skipping oversized file");
            return None;
        }
        Ok(_) => {}
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "skipping unreadable file");
            return None;
        }
    }
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "skipping unreadable file");
            None
        }
    }
}

pub(crate) fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

pub(crate) fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_sorted_and_skips_build_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("app/src")).unwrap();
        std::fs::create_dir_all(root.join("build/gen")).unwrap();
        std::fs::create_dir_all(root.join("Pods/Firebase")).unwrap();
        std::fs::write(root.join("app/src/b.kt"), "").unwrap();
        std::fs::write(root.join("app/src/a.kt"), "").unwrap();
        std::fs::write(root.join("build/gen/R.java"), "").unwrap();
        std::fs::write(root.join("Pods/Firebase/x.m"), "").unwrap();

        let files = project_files(root).unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, ["app/src/a.kt", "app/src/b.kt"]);
    }

    #[test]
    fn missing_root_is_io_error() {
        let err = project_files(Path::new("/nonexistent/project")).unwrap_err();
        assert_eq!(err.kind(), "IoError");
    }

    #[test]
    fn file_root_is_io_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = project_files(file.path()).unwrap_err();
        assert_eq!(err.kind(), "IoError");
    }
}
