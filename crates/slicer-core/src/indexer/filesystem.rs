//! Filesystem scanning helpers for program loading.

use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::errors::{SlicerError, SlicerResult};

pub const JAVA_EXTENSION: &str = "java";

const IMPLICIT_IGNORED_DIRS: &[&str] = &[".git", ".slicer"];

pub fn is_java_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(JAVA_EXTENSION))
}

/// Java sources under `root`, sorted, honoring `.gitignore` files and the
/// given exclude globs (gitignore syntax, relative to `root`).
pub fn iter_java_files(root: &Path, exclude_patterns: &[String]) -> SlicerResult<Vec<PathBuf>> {
    let mut overrides = OverrideBuilder::new(root);
    for pattern in exclude_patterns {
        let stripped = pattern.trim();
        if stripped.is_empty() {
            continue;
        }
        let stripped = stripped.strip_prefix("./").unwrap_or(stripped);
        overrides
            .add(&format!("!{stripped}"))
            .map_err(|e| SlicerError::Config(format!("Invalid exclude pattern {stripped:?}: {e}")))?;
    }
    let overrides = overrides
        .build()
        .map_err(|e| SlicerError::Config(format!("Invalid exclude patterns: {e}")))?;

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .require_git(false)
        .overrides(overrides)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && IMPLICIT_IGNORED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref()))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                let is_file = entry.file_type().is_some_and(|t| t.is_file());
                if is_file && is_java_file(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(e) => warn!("Skipping unreadable entry under {}: {}", root.display(), e),
        }
    }
    files.sort();
    Ok(files)
}

/// `root`-relative path with forward slashes.
pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "class X {}").unwrap();
    }

    #[test]
    fn test_iter_java_files_respects_ignores() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "src/main/java/App.java");
        touch(root, "src/main/java/util/Strings.java");
        touch(root, "src/main/resources/app.properties");
        touch(root, "generated/Gen.java");
        touch(root, "legacy/Old.java");
        touch(root, ".git/Hook.java");
        fs::write(root.join(".gitignore"), "generated/\n").unwrap();

        let files = iter_java_files(root, &["legacy/**".to_string()]).unwrap();
        let rel: Vec<String> = files.iter().map(|f| relative_path(root, f)).collect();
        assert_eq!(
            rel,
            vec!["src/main/java/App.java", "src/main/java/util/Strings.java"]
        );
    }

    #[test]
    fn test_compute_content_hash() {
        let hash = compute_content_hash("class A {}");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_content_hash("class A {}"));
        assert_ne!(hash, compute_content_hash("class B {}"));
    }

    #[test]
    fn test_is_java_file() {
        assert!(is_java_file(Path::new("a/B.java")));
        assert!(is_java_file(Path::new("a/B.JAVA")));
        assert!(!is_java_file(Path::new("a/B.class")));
        assert!(!is_java_file(Path::new("java")));
    }
}
