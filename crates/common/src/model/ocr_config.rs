//! OCR engine configuration and its fixed vocabularies
//!
//! The three enums below are closed: every variant carries its Tesseract
//! value and description in a lookup table, and `ALL` lists the variants
//! in declaration order for config discovery.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default recognition language (ISO 639-2 code used by Tesseract)
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Per-task OCR settings, embedded in the task record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrConfig {
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub ocr_engine_mode: OcrEngineMode,

    #[serde(default)]
    pub page_segmentation_mode: PageSegmentationMode,

    /// Free-form engine variables passed through to Tesseract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tess_variables: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub pre_processing: bool,

    #[serde(default)]
    pub file_format: FileFormat,

    #[serde(default)]
    pub merge_documents: bool,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            ocr_engine_mode: OcrEngineMode::default(),
            page_segmentation_mode: PageSegmentationMode::default(),
            tess_variables: None,
            pre_processing: false,
            file_format: FileFormat::default(),
            merge_documents: false,
        }
    }
}

/// Tesseract OCR engine mode (`--oem`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OcrEngineMode {
    Legacy,
    Lstm,
    LegacyLstm,
    #[default]
    Default,
}

impl OcrEngineMode {
    pub const ALL: [OcrEngineMode; 4] = [
        OcrEngineMode::Legacy,
        OcrEngineMode::Lstm,
        OcrEngineMode::LegacyLstm,
        OcrEngineMode::Default,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OcrEngineMode::Legacy => "LEGACY",
            OcrEngineMode::Lstm => "LSTM",
            OcrEngineMode::LegacyLstm => "LEGACY_LSTM",
            OcrEngineMode::Default => "DEFAULT",
        }
    }

    pub fn tesseract_value(&self) -> u8 {
        match self {
            OcrEngineMode::Legacy => 0,
            OcrEngineMode::Lstm => 1,
            OcrEngineMode::LegacyLstm => 2,
            OcrEngineMode::Default => 3,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OcrEngineMode::Legacy => "Legacy engine only.",
            OcrEngineMode::Lstm => "Neural nets LSTM engine only.",
            OcrEngineMode::LegacyLstm => "Legacy + LSTM engines.",
            OcrEngineMode::Default => "Default, based on what is available.",
        }
    }
}

/// Tesseract page segmentation mode (`--psm`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PageSegmentationMode {
    #[serde(rename = "MODE_0")]
    Mode0,
    #[serde(rename = "MODE_1")]
    Mode1,
    #[serde(rename = "MODE_2")]
    Mode2,
    #[default]
    #[serde(rename = "MODE_3")]
    Mode3,
    #[serde(rename = "MODE_4")]
    Mode4,
    #[serde(rename = "MODE_5")]
    Mode5,
    #[serde(rename = "MODE_6")]
    Mode6,
    #[serde(rename = "MODE_7")]
    Mode7,
    #[serde(rename = "MODE_8")]
    Mode8,
    #[serde(rename = "MODE_9")]
    Mode9,
    #[serde(rename = "MODE_10")]
    Mode10,
    #[serde(rename = "MODE_11")]
    Mode11,
    #[serde(rename = "MODE_12")]
    Mode12,
    #[serde(rename = "MODE_13")]
    Mode13,
}

impl PageSegmentationMode {
    pub const ALL: [PageSegmentationMode; 14] = [
        PageSegmentationMode::Mode0,
        PageSegmentationMode::Mode1,
        PageSegmentationMode::Mode2,
        PageSegmentationMode::Mode3,
        PageSegmentationMode::Mode4,
        PageSegmentationMode::Mode5,
        PageSegmentationMode::Mode6,
        PageSegmentationMode::Mode7,
        PageSegmentationMode::Mode8,
        PageSegmentationMode::Mode9,
        PageSegmentationMode::Mode10,
        PageSegmentationMode::Mode11,
        PageSegmentationMode::Mode12,
        PageSegmentationMode::Mode13,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PageSegmentationMode::Mode0 => "MODE_0",
            PageSegmentationMode::Mode1 => "MODE_1",
            PageSegmentationMode::Mode2 => "MODE_2",
            PageSegmentationMode::Mode3 => "MODE_3",
            PageSegmentationMode::Mode4 => "MODE_4",
            PageSegmentationMode::Mode5 => "MODE_5",
            PageSegmentationMode::Mode6 => "MODE_6",
            PageSegmentationMode::Mode7 => "MODE_7",
            PageSegmentationMode::Mode8 => "MODE_8",
            PageSegmentationMode::Mode9 => "MODE_9",
            PageSegmentationMode::Mode10 => "MODE_10",
            PageSegmentationMode::Mode11 => "MODE_11",
            PageSegmentationMode::Mode12 => "MODE_12",
            PageSegmentationMode::Mode13 => "MODE_13",
        }
    }

    pub fn tesseract_value(&self) -> u8 {
        match self {
            PageSegmentationMode::Mode0 => 0,
            PageSegmentationMode::Mode1 => 1,
            PageSegmentationMode::Mode2 => 2,
            PageSegmentationMode::Mode3 => 3,
            PageSegmentationMode::Mode4 => 4,
            PageSegmentationMode::Mode5 => 5,
            PageSegmentationMode::Mode6 => 6,
            PageSegmentationMode::Mode7 => 7,
            PageSegmentationMode::Mode8 => 8,
            PageSegmentationMode::Mode9 => 9,
            PageSegmentationMode::Mode10 => 10,
            PageSegmentationMode::Mode11 => 11,
            PageSegmentationMode::Mode12 => 12,
            PageSegmentationMode::Mode13 => 13,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PageSegmentationMode::Mode0 => "Orientation and script detection (OSD) only.",
            PageSegmentationMode::Mode1 => "Automatic page segmentation with OSD.",
            PageSegmentationMode::Mode2 => {
                "Automatic page segmentation, but no OSD, or OCR. (not implemented)"
            }
            PageSegmentationMode::Mode3 => {
                "Fully automatic page segmentation, but no OSD. (Default)"
            }
            PageSegmentationMode::Mode4 => "Assume a single column of text of variable sizes.",
            PageSegmentationMode::Mode5 => {
                "Assume a single uniform block of vertically aligned text."
            }
            PageSegmentationMode::Mode6 => "Assume a single uniform block of text.",
            PageSegmentationMode::Mode7 => "Treat the image as a single text line.",
            PageSegmentationMode::Mode8 => "Treat the image as a single word.",
            PageSegmentationMode::Mode9 => "Treat the image as a single word in a circle.",
            PageSegmentationMode::Mode10 => "Treat the image as a single character.",
            PageSegmentationMode::Mode11 => {
                "Sparse text. Find as much text as possible in no particular order."
            }
            PageSegmentationMode::Mode12 => "Sparse text with OSD.",
            PageSegmentationMode::Mode13 => {
                "Raw line. Treat the image as a single text line, bypassing hacks that are Tesseract-specific."
            }
        }
    }
}

/// Output file format produced by OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileFormat {
    Pdf,
    Hocr,
    #[default]
    Text,
}

impl FileFormat {
    pub const ALL: [FileFormat; 3] = [FileFormat::Pdf, FileFormat::Hocr, FileFormat::Text];

    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::Pdf => "PDF",
            FileFormat::Hocr => "HOCR",
            FileFormat::Text => "TEXT",
        }
    }

    /// File extension of produced output files
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Pdf => "pdf",
            FileFormat::Hocr => "hocr",
            FileFormat::Text => "txt",
        }
    }
}
