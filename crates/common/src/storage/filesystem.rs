//! Local filesystem blob store

use super::{BlobStore, INPUT_DIR, OUTPUT_DIR};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Blob store rooted at a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSystemBlobStore {
    root: PathBuf,
}

impl FileSystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn task_dir(&self, task_id: Uuid) -> PathBuf {
        self.root.join(task_id.to_string())
    }

    fn file_path(&self, task_id: Uuid, folder: &str, file_name: &str) -> PathBuf {
        self.task_dir(task_id).join(folder).join(file_name)
    }
}

/// File names are generated server-side, but never let one escape its folder
fn check_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty()
        || file_name.contains('/')
        || file_name.contains('\\')
        || file_name == "."
        || file_name == ".."
    {
        return Err(AppError::Validation {
            message: format!("invalid file name '{}'", file_name),
            field: Some("file_name".to_string()),
        });
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    async fn create_task_directories(&self, task_id: Uuid) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::storage(&self.root, e))?;

        let task_dir = self.task_dir(task_id);
        fs::create_dir(&task_dir)
            .await
            .map_err(|e| AppError::storage(&task_dir, e))?;

        for folder in [INPUT_DIR, OUTPUT_DIR] {
            let dir = task_dir.join(folder);
            fs::create_dir(&dir)
                .await
                .map_err(|e| AppError::storage(&dir, e))?;
        }

        debug!(task_id = %task_id, path = %task_dir.display(), "Created task directories");
        Ok(())
    }

    async fn store(
        &self,
        task_id: Uuid,
        file_name: &str,
        bytes: &[u8],
        input: bool,
    ) -> Result<PathBuf> {
        check_file_name(file_name)?;
        let folder = if input { INPUT_DIR } else { OUTPUT_DIR };
        let path = self.file_path(task_id, folder, file_name);

        fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::storage(&path, e))?;

        debug!(task_id = %task_id, path = %path.display(), size = bytes.len(), "Stored file");
        Ok(path)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .await
            .map_err(|e| AppError::storage(path, e))?;
        debug!(path = %path.display(), "Deleted file");
        Ok(())
    }

    async fn remove_task_directories(&self, task_id: Uuid) -> Result<()> {
        let task_dir = self.task_dir(task_id);
        match fs::remove_dir_all(&task_dir).await {
            Ok(()) => {
                info!(task_id = %task_id, "Removed task directories");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::storage(task_dir, e)),
        }
    }

    fn input_path(&self, task_id: Uuid, file_name: &str) -> PathBuf {
        self.file_path(task_id, INPUT_DIR, file_name)
    }

    fn output_path(&self, task_id: Uuid, file_name: &str) -> PathBuf {
        self.file_path(task_id, OUTPUT_DIR, file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileSystemBlobStore) {
        let dir = TempDir::new().unwrap();
        let blobs = FileSystemBlobStore::new(dir.path().join("ocr"));
        (dir, blobs)
    }

    #[tokio::test]
    async fn test_create_task_directories_is_not_idempotent() {
        let (_dir, blobs) = store();
        let id = Uuid::new_v4();

        blobs.create_task_directories(id).await.unwrap();
        assert!(blobs.root().join(id.to_string()).join("input").is_dir());
        assert!(blobs.root().join(id.to_string()).join("output").is_dir());

        let err = blobs.create_task_directories(id).await.unwrap_err();
        assert!(matches!(err, AppError::StorageFault { .. }));
    }

    #[tokio::test]
    async fn test_store_overwrites_and_delete_requires_file() {
        let (_dir, blobs) = store();
        let id = Uuid::new_v4();
        blobs.create_task_directories(id).await.unwrap();

        let path = blobs.store(id, "r1", b"first", true).await.unwrap();
        assert_eq!(path, blobs.input_path(id, "r1"));
        blobs.store(id, "r1", b"second", true).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        let out = blobs.store(id, "r1.pdf", b"%PDF", false).await.unwrap();
        assert_eq!(out, blobs.output_path(id, "r1.pdf"));

        blobs.delete(&path).await.unwrap();
        assert!(!path.exists());
        let err = blobs.delete(&path).await.unwrap_err();
        assert!(matches!(err, AppError::StorageFault { .. }));
    }

    #[tokio::test]
    async fn test_store_rejects_path_traversal() {
        let (_dir, blobs) = store();
        let id = Uuid::new_v4();
        blobs.create_task_directories(id).await.unwrap();

        for name in ["../escape", "a/b", "..", ""] {
            let err = blobs.store(id, name, b"x", true).await.unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }), "{name}");
        }
    }

    #[tokio::test]
    async fn test_remove_task_directories_only_touches_one_task() {
        let (_dir, blobs) = store();
        let keep = Uuid::new_v4();
        let gone = Uuid::new_v4();
        blobs.create_task_directories(keep).await.unwrap();
        blobs.create_task_directories(gone).await.unwrap();
        blobs.store(gone, "r1", b"x", true).await.unwrap();

        blobs.remove_task_directories(gone).await.unwrap();
        assert!(!blobs.root().join(gone.to_string()).exists());
        assert!(blobs.root().join(keep.to_string()).join("input").is_dir());

        // Already gone
        blobs.remove_task_directories(gone).await.unwrap();
    }
}
