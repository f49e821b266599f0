//! Task file storage
//!
//! Each task owns a directory `<root>/<task id>/` with an `input/` folder for
//! uploaded documents and an `output/` folder for OCR results.

mod detector;
mod filesystem;

pub use detector::{detector, ContentTypeDetector, OCTET_STREAM, SNIFF_LEN};
pub use filesystem::FileSystemBlobStore;

use crate::errors::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const INPUT_DIR: &str = "input";
pub const OUTPUT_DIR: &str = "output";

/// Blob store for task input and output files
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create `<root>/<id>/input` and `<root>/<id>/output`.
    /// Fails if the task directories already exist.
    async fn create_task_directories(&self, task_id: Uuid) -> Result<()>;

    /// Write `bytes` under the task's input (or output) folder, overwriting
    /// any existing file of the same name
    async fn store(&self, task_id: Uuid, file_name: &str, bytes: &[u8], input: bool)
        -> Result<PathBuf>;

    /// Delete one file. A missing file is a fault.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Recursively remove `<root>/<id>`; a missing directory is not a fault
    async fn remove_task_directories(&self, task_id: Uuid) -> Result<()>;

    fn input_path(&self, task_id: Uuid, file_name: &str) -> PathBuf;

    fn output_path(&self, task_id: Uuid, file_name: &str) -> PathBuf;
}
