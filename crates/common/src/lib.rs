//! OCR Studio Common Library
//!
//! Shared code for the OCR Studio task service including:
//! - Task domain model and OCR configuration vocabularies
//! - Document store abstraction with Postgres and in-memory backends
//! - Task file storage and content-type detection
//! - The task lifecycle service
//! - Error types, configuration, and metrics

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod service;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{create_task_store, TaskStore};
pub use errors::{AppError, Result};
pub use service::TaskService;
pub use storage::{BlobStore, FileSystemBlobStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
