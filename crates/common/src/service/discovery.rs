//! Listings of the supported OCR settings, for client forms

use crate::model::{FileFormat, OcrEngineMode, PageSegmentationMode};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeOption {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFormatOption {
    pub name: &'static str,
    pub extension: &'static str,
}

pub fn ocr_engine_modes() -> Vec<ModeOption> {
    OcrEngineMode::ALL
        .iter()
        .map(|mode| ModeOption {
            name: mode.name(),
            description: mode.description(),
        })
        .collect()
}

pub fn page_segmentation_modes() -> Vec<ModeOption> {
    PageSegmentationMode::ALL
        .iter()
        .map(|mode| ModeOption {
            name: mode.name(),
            description: mode.description(),
        })
        .collect()
}

pub fn file_formats() -> Vec<FileFormatOption> {
    FileFormat::ALL
        .iter()
        .map(|format| FileFormatOption {
            name: format.name(),
            extension: format.extension(),
        })
        .collect()
}
