//! Request-scoped audio files
//!
//! Each pipeline run gets its own scratch directory named after its request
//! id. Artifacts inside it are removed when disposed or dropped, and the
//! directory itself goes away with the [`Scratch`] handle.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::Result;

/// Per-request scratch directory
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    /// Create a scratch directory for `request_id` under `base`
    ///
    /// `base` must already exist; [`crate::daemon::build_pipeline`] creates it
    /// once at startup.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(base: &Path, request_id: Uuid) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("relay-{request_id}-"))
            .tempdir_in(base)?;

        tracing::trace!(%request_id, path = %dir.path().display(), "scratch directory created");
        Ok(Self { dir })
    }

    /// Directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a file named `name` inside the directory
    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `bytes` to `name` and take ownership of the file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub async fn write(
        &self,
        name: &str,
        mime_type: &'static str,
        bytes: &[u8],
    ) -> Result<AudioArtifact> {
        let path = self.file_path(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(AudioArtifact::claim(path, mime_type))
    }
}

/// An owned audio file that is deleted when no longer needed
#[derive(Debug)]
pub struct AudioArtifact {
    path: PathBuf,
    mime_type: &'static str,
    removed: bool,
}

impl AudioArtifact {
    /// Take ownership of an existing file
    #[must_use]
    pub const fn claim(path: PathBuf, mime_type: &'static str) -> Self {
        Self {
            path,
            mime_type,
            removed: false,
        }
    }

    /// File location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// MIME type of the contents
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Final path component, for uploads
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| "audio".to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Read the whole file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }

    /// Delete the file now
    pub fn dispose(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "audio artifact removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove audio artifact");
            }
        }
    }
}

impl Drop for AudioArtifact {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scratch_path_embeds_request_id() {
        let base = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let scratch = Scratch::new(base.path(), id).unwrap();

        let name = scratch.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&format!("relay-{id}-")));
    }

    #[tokio::test]
    async fn dispose_removes_file() {
        let base = tempfile::tempdir().unwrap();
        let scratch = Scratch::new(base.path(), Uuid::new_v4()).unwrap();
        let artifact = scratch.write("a.mp3", "audio/mpeg", b"abc").await.unwrap();
        let path = artifact.path().to_path_buf();

        assert_eq!(artifact.read().await.unwrap(), b"abc");
        artifact.dispose();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_removes_file() {
        let base = tempfile::tempdir().unwrap();
        let scratch = Scratch::new(base.path(), Uuid::new_v4()).unwrap();
        let path = {
            let artifact = scratch.write("b.ogg", "audio/ogg", b"x").await.unwrap();
            artifact.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn dropping_scratch_removes_directory() {
        let base = tempfile::tempdir().unwrap();
        let dir = {
            let scratch = Scratch::new(base.path(), Uuid::new_v4()).unwrap();
            std::fs::write(scratch.file_path("stray.wav"), b"x").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn missing_base_is_an_error() {
        let base = tempfile::tempdir().unwrap();
        let missing = base.path().join("not-created");
        assert!(Scratch::new(&missing, Uuid::new_v4()).is_err());
        assert!(!missing.exists());
    }

    #[test]
    fn concurrent_requests_get_distinct_directories() {
        let base = tempfile::tempdir().unwrap();
        let a = Scratch::new(base.path(), Uuid::new_v4()).unwrap();
        let b = Scratch::new(base.path(), Uuid::new_v4()).unwrap();
        assert_ne!(a.file_path("input.wav"), b.file_path("input.wav"));
    }
}
