//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local
//! filesystem. Objects are files below a configured root directory, and keys
//! are their `/`-separated paths relative to that root.

use crate::backend::{BoxAsyncBufRead, ObjectPageStream};
use crate::error::{ErrorKind, Result};
use crate::{ObjectInfo, StorageBackend, validate_key, validate_prefix};
use async_stream::stream;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs::{self, DirEntry};
use tokio::io::BufReader;

enum WalkEntry {
    File(ObjectInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use logsift_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/var/log/archive")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    /// Root directory holding the objects
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not absolute or is not an existing
    /// directory. This backend is read-only, so it never creates the root.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || !root.is_dir() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for an object key.
    fn absolute_path(&self, key: &str) -> Result<PathBuf> {
        let validated = validate_key(key)?;
        Ok(self.root.join(validated))
    }

    /// Convert an absolute path back to an object key.
    fn relative_key(&self, absolute: &Path) -> Result<String> {
        let relative = absolute.strip_prefix(&self.root).map_err(|_| {
            let (path, root) = (absolute.display(), self.root.display());
            ErrorKind::BackendError(format!("path `{path}` is not within root `{root}`"))
        })?;
        let segments: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        match segments {
            Some(segments) => validate_key(&segments.join("/")),
            None => exn::bail!(ErrorKind::InvalidKey(relative.display().to_string())),
        }
    }

    fn map_io_error(e: std::io::Error, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(key.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Classify one directory entry against the prefix. Kept out of the
    /// stream body so errors can use `?`.
    async fn process_entry(&self, entry: &DirEntry, prefix: &str) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path.display().to_string()))?;
        let key = match self.relative_key(&path) {
            Ok(key) => key,
            // Non-UTF8 names can't be addressed as keys.
            Err(_) => return Ok(WalkEntry::Skip),
        };
        if metadata.is_dir() {
            let dir = format!("{key}/");
            // Only descend where the prefix and the directory overlap.
            return match dir.starts_with(prefix) || prefix.starts_with(&dir) {
                true => Ok(WalkEntry::Descend(path)),
                false => Ok(WalkEntry::Skip),
            };
        }
        if metadata.is_file() && key.starts_with(prefix) {
            let modified = metadata.modified().ok().map(OffsetDateTime::from);
            return Ok(WalkEntry::File(ObjectInfo::new(key, metadata.len(), modified)));
        }
        // Note: silently drop what is most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_pages<'a>(&'a self, prefix: &'a str, page_size: usize) -> ObjectPageStream<'a> {
        let prefix = match validate_prefix(prefix) {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        let page_size = page_size.max(1);
        // Walk from the deepest directory the prefix fully names: "a/b/" starts
        // at "a/b", while "a/b" starts at "a" (it could match "a/bc.txt").
        let start_dir = match prefix.rfind('/') {
            Some(idx) => self.root.join(&prefix[..idx]),
            None => self.root.clone(),
        };
        let mut stack = vec![start_dir];

        Box::pin(stream! {
            let mut page = Vec::with_capacity(page_size);
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // To stay consistent with S3, listing a prefix that
                    // doesn't exist results in an empty list not an error.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue 'dirs,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current.display().to_string())));
                        return;
                    },
                };
                let mut dir_entries = Vec::new();
                loop {
                    match entries.next_entry().await {
                        Ok(Some(entry)) => dir_entries.push(entry),
                        Ok(None) => break,
                        Err(err) => {
                            yield Err(exn::Exn::from(Self::map_io_error(err, &current.display().to_string())));
                            return;
                        },
                    }
                }
                // Keep listings deterministic, like S3's lexicographic order
                // within a directory.
                dir_entries.sort_by_key(|entry| entry.file_name());
                let mut descend = Vec::new();
                for entry in &dir_entries {
                    match self.process_entry(entry, &prefix).await {
                        Ok(WalkEntry::File(info)) => {
                            page.push(info);
                            if page.len() >= page_size {
                                yield Ok(std::mem::replace(&mut page, Vec::with_capacity(page_size)));
                            }
                        },
                        Ok(WalkEntry::Descend(dir)) => descend.push(dir),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => {
                            yield Err(e);
                            return;
                        },
                    }
                }
                // Stack is LIFO: push in reverse to visit directories in order.
                stack.extend(descend.into_iter().rev());
            }
            if !page.is_empty() {
                yield Ok(page);
            }
        })
    }

    async fn reader(&self, key: &str) -> Result<BoxAsyncBufRead> {
        let abs_path = self.absolute_path(key)?;
        let file = fs::File::open(&abs_path).await.map_err(|e| Self::map_io_error(e, key))?;
        Ok(Box::pin(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tokio::io::AsyncReadExt;

    fn write(root: &Path, key: &str, data: &[u8]) {
        let path = root.join(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    #[test]
    fn test_new_requires_absolute_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let expected = temp_dir.path().join("Partner/2024-01-01/a.txt");
        assert_eq!(backend.absolute_path("Partner/2024-01-01/a.txt").unwrap(), expected);
        assert!(backend.absolute_path("../etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_list_with_directory_prefix() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "Partner/2024-01-01/a.txt", b"a");
        write(temp_dir.path(), "Partner/2024-01-02/b.txt", b"bb");
        write(temp_dir.path(), "Other/c.txt", b"c");
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let files = backend.list("Partner/").await.unwrap();
        let keys: Vec<_> = files.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["Partner/2024-01-01/a.txt", "Partner/2024-01-02/b.txt"]);
        assert_eq!(files[1].size, 2);
        assert!(files[0].modified.is_some());
    }

    #[tokio::test]
    async fn test_list_with_string_prefix() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "logs/2024-01.txt", b"a");
        write(temp_dir.path(), "logs/2024/02.txt", b"b");
        write(temp_dir.path(), "logs/2023.txt", b"c");
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let files = backend.list("logs/2024").await.unwrap();
        assert_eq!(files.len(), 2);
        let files = backend.list("logs/2024/").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].key, "logs/2024/02.txt");
    }

    #[tokio::test]
    async fn test_list_pages_respects_page_size() {
        let temp_dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write(temp_dir.path(), &format!("p/{i}.txt"), b"x");
        }
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let pages: Vec<Vec<ObjectInfo>> = backend.list_pages("p/", 2).try_collect().await.unwrap();
        let sizes: Vec<_> = pages.iter().map(Vec::len).collect();
        assert_eq!(sizes, [2, 2, 1]);
    }

    #[tokio::test]
    async fn test_list_nonexistent_prefix() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.list("nonexistent/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_rejects_traversal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.list("../").await.is_err());
    }

    #[tokio::test]
    async fn test_reader() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "a/file.txt", b"line one\nline two\n");
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let mut reader = backend.reader("a/file.txt").await.unwrap();
        let mut buf = String::new();
        reader.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "line one\nline two\n");
    }

    #[tokio::test]
    async fn test_reader_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let err = backend.reader("missing.txt").await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
