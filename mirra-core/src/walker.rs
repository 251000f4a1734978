use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{BuildError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A path under one root together with the same relative path under the
/// other root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPair {
    pub origin: PathBuf,
    pub mirror: PathBuf,
    pub kind: EntryKind,
}

impl PathPair {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Walks `origin` and pairs every file and directory with its counterpart
/// under `mirror`.
///
/// Symlinks are skipped, as is everything at or below a path in `omit`.
/// The walk only reads; nothing is created under `mirror`.
pub struct MirrorWalker {
    origin: PathBuf,
    mirror: PathBuf,
    omit: Vec<PathBuf>,
}

impl MirrorWalker {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(origin: P, mirror: Q) -> Self {
        Self {
            origin: origin.as_ref().to_path_buf(),
            mirror: mirror.as_ref().to_path_buf(),
            omit: Vec::new(),
        }
    }

    pub fn omit<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.omit
            .extend(paths.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    pub fn walk(&self) -> Result<Vec<PathPair>> {
        let mut pairs = Vec::new();

        let entries = WalkDir::new(&self.origin)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_omitted(e.path()));

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                // Removed between listing and reading, nothing to mirror.
                Err(e) if is_not_found(&e) => {
                    log::debug!("Entry vanished during walk: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                continue;
            }

            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            pairs.push(PathPair {
                origin: entry.path().to_path_buf(),
                mirror: self.mirror_of(entry.path())?,
                kind,
            });
        }

        Ok(pairs)
    }

    fn is_omitted(&self, path: &Path) -> bool {
        self.omit.iter().any(|o| o == path)
    }

    fn mirror_of(&self, path: &Path) -> Result<PathBuf> {
        let relative = path
            .strip_prefix(&self.origin)
            .map_err(|_| BuildError::InvalidPath(path.to_path_buf()))?;

        Ok(self.mirror.join(relative))
    }
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|e| e.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("blog/2024")).unwrap();
        fs::create_dir_all(src.join("components")).unwrap();
        fs::write(src.join("index.html"), "home").unwrap();
        fs::write(src.join("blog/2024/post.md"), "# Post").unwrap();
        fs::write(src.join("components/card.html"), "card").unwrap();
        dir
    }

    #[test]
    fn test_pairs_preserve_nested_segments() {
        let dir = tree();
        let src = dir.path().join("src");
        let out = dir.path().join("out");

        let pairs = MirrorWalker::new(&src, &out).walk().unwrap();
        let post = pairs
            .iter()
            .find(|p| p.origin.ends_with("post.md"))
            .unwrap();

        assert_eq!(post.mirror, out.join("blog/2024/post.md"));
        assert_eq!(post.kind, EntryKind::File);
        assert!(
            pairs
                .iter()
                .any(|p| p.mirror == out.join("blog/2024") && p.is_dir())
        );
    }

    #[test]
    fn test_omitted_roots_are_skipped_entirely() {
        let dir = tree();
        let src = dir.path().join("src");

        let pairs = MirrorWalker::new(&src, dir.path().join("out"))
            .omit([src.join("components")])
            .walk()
            .unwrap();

        assert!(
            pairs
                .iter()
                .all(|p| !p.origin.starts_with(src.join("components")))
        );
        assert_eq!(pairs.iter().filter(|p| !p.is_dir()).count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let dir = tree();
        let src = dir.path().join("src");
        std::os::unix::fs::symlink(src.join("index.html"), src.join("alias.html")).unwrap();

        let pairs = MirrorWalker::new(&src, dir.path().join("out"))
            .walk()
            .unwrap();

        assert!(pairs.iter().all(|p| !p.origin.ends_with("alias.html")));
    }

    #[test]
    fn test_missing_origin_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pairs = MirrorWalker::new(dir.path().join("nope"), dir.path().join("out"))
            .walk()
            .unwrap();
        assert!(pairs.is_empty());
    }
}
