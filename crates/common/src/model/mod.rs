//! Domain model for OCR tasks

mod ocr_config;
mod task;

pub use ocr_config::{FileFormat, OcrConfig, OcrEngineMode, PageSegmentationMode, DEFAULT_LANGUAGE};
pub use task::{Document, OcrProgress, OutDocument, SchedulerConfig, Status, StatusCount, Task};

use serde::Serialize;

/// A page of results with the metadata the document store reports
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_number: u64,
    pub page_size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, page_number: u64, page_size: u64, total_elements: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_elements.div_ceil(page_size)
        };
        Self {
            content,
            page_number,
            page_size,
            total_elements,
            total_pages,
        }
    }
}
