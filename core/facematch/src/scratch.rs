use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// Request-scoped storage for uploaded and cropped images.
///
/// Keys are flat file names. Every request derives its own namespace via
/// [`request_namespace`], so implementations never see two requests writing
/// the same key.
pub trait ScratchStore: Send + Sync {
    /// Store `data` under `key`, replacing nothing that belongs to another request.
    fn put(&self, key: &str, data: &[u8]) -> io::Result<()>;

    /// Read back the bytes previously stored under `key`.
    fn get(&self, key: &str) -> io::Result<Vec<u8>>;
}

/// Scratch storage backed by a single directory on disk.
///
/// Artifacts are kept after the request finishes so uploads and crops can be
/// audited; this type never deletes a complete artifact. Pruning the directory
/// (for example by file age) is left to the deployment. A write that fails
/// part-way removes its partial file.
#[derive(Debug, Clone)]
pub struct DirectoryScratch {
    root: PathBuf,
}

impl DirectoryScratch {
    /// Use `root` as the scratch directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the artifacts.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid scratch key: {key:?}"),
            ));
        }
        Ok(self.root.join(key))
    }
}

impl ScratchStore for DirectoryScratch {
    fn put(&self, key: &str, data: &[u8]) -> io::Result<()> {
        let path = self.path_for(key)?;
        write_new(&path, data, |file, data| file.write_all(data))?;
        debug!(path = %path.display(), bytes = data.len(), "Wrote scratch artifact");
        Ok(())
    }

    fn get(&self, key: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path_for(key)?)
    }
}

/// Create `path` (never overwriting) and fill it with `write`.
///
/// On a failed write the partial file is removed before the error is returned.
fn write_new<F>(path: &Path, data: &[u8], write: F) -> io::Result<()>
where
    F: FnOnce(&mut fs::File, &[u8]) -> io::Result<()>,
{
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    if let Err(err) = write(&mut file, data) {
        drop(file);
        if let Err(remove_err) = fs::remove_file(path) {
            warn!(
                path = %path.display(),
                error = %remove_err,
                "Could not remove partial artifact"
            );
        }
        return Err(err);
    }
    Ok(())
}

/// Build the per-request key prefix: `{subject}_{uuid}`.
///
/// The subject id is reduced to `[A-Za-z0-9_-]` so caller input can never
/// escape the scratch directory.
pub fn request_namespace(subject_id: &str) -> String {
    let subject: String = subject_id
        .chars()
        .take(64)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{subject}_{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn put_then_get_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = DirectoryScratch::new(tmp.path()).unwrap();
        store.put("a_document.png", b"bytes").unwrap();
        assert_eq!(store.get("a_document.png").unwrap(), b"bytes");
    }

    #[test]
    fn put_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = DirectoryScratch::new(tmp.path()).unwrap();
        store.put("dup.png", b"first").unwrap();
        let err = store.put("dup.png", b"second").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(store.get("dup.png").unwrap(), b"first");
    }

    #[test]
    fn failed_write_leaves_no_partial_artifact() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("u1_x_document.png");

        let err = write_new(&path, b"0123456789", |file, data| {
            file.write_all(&data[..4])?;
            Err(io::Error::new(io::ErrorKind::WriteZero, "disk full"))
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert!(!path.exists());

        let store = DirectoryScratch::new(tmp.path()).unwrap();
        store.put("u1_x_document.png", b"complete").unwrap();
        assert_eq!(store.get("u1_x_document.png").unwrap(), b"complete");
    }

    #[test]
    fn rejects_path_like_keys() {
        let tmp = TempDir::new().unwrap();
        let store = DirectoryScratch::new(tmp.path()).unwrap();
        assert!(store.put("../escape.png", b"x").is_err());
        assert!(store.put("nested/file.png", b"x").is_err());
        assert!(store.put("", b"x").is_err());
    }

    #[test]
    fn creates_missing_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("uploads");
        let store = DirectoryScratch::new(&root).unwrap();
        assert!(store.root().is_dir());
    }

    #[test]
    fn namespace_is_unique_per_call() {
        let a = request_namespace("u1");
        let b = request_namespace("u1");
        assert_ne!(a, b);
        assert!(a.starts_with("u1_"));
    }

    #[test]
    fn namespace_sanitizes_subject() {
        let ns = request_namespace("../../etc/passwd");
        assert!(ns.starts_with("______etc_passwd_"));
        assert!(!ns.contains('/'));
    }
}
