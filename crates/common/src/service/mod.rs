//! Task lifecycle service
//!
//! Owns the rules for creating tasks, attaching and removing input
//! documents, and deleting tasks, on top of a `TaskStore` and a `BlobStore`.

mod discovery;
mod locks;
mod task;

pub use discovery::{
    file_formats, ocr_engine_modes, page_segmentation_modes, FileFormatOption, ModeOption,
};
pub use task::{TaskService, UploadFile, DEFAULT_PAGE_SIZE};
