//! Task aggregate and its embedded records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ocr_config::{FileFormat, OcrConfig};

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Created,
    Triggered,
    InProgress,
    Success,
    Failed,
    Interrupted,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Created,
        Status::Triggered,
        Status::InProgress,
        Status::Success,
        Status::Failed,
        Status::Interrupted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Created => "CREATED",
            Status::Triggered => "TRIGGERED",
            Status::InProgress => "IN_PROGRESS",
            Status::Success => "SUCCESS",
            Status::Failed => "FAILED",
            Status::Interrupted => "INTERRUPTED",
        }
    }

    /// Parse the stored representation, `None` for unknown values
    pub fn parse(s: &str) -> Option<Self> {
        Status::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedded progress holder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrProgress {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// When and how processing should be triggered. Nothing in this service
/// consumes it; it is stored and returned as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<DateTime<Utc>>,
}

/// Output produced for one input document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutDocument {
    pub randomized_file_name: String,
    pub file_format: FileFormat,
}

/// One uploaded input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Name supplied by the client; identity within a task, not unique
    pub original_file_name: String,

    /// Server-generated blob key under `<task>/input/`
    pub randomized_file_name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_document: Option<OutDocument>,
}

impl Document {
    pub fn new(original_file_name: impl Into<String>, randomized_file_name: impl Into<String>) -> Self {
        Self {
            original_file_name: original_file_name.into(),
            randomized_file_name: randomized_file_name.into(),
            content_type: None,
            out_document: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// The central aggregate: a named request to OCR a set of input documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub ocr_config: OcrConfig,
    #[serde(default)]
    pub scheduler_config: SchedulerConfig,
    #[serde(default)]
    pub ocr_progress: OcrProgress,
    #[serde(default)]
    pub(crate) in_documents: Vec<Document>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Task {
    /// Build a new task in `CREATED` state with a fresh id
    pub fn new(name: impl Into<String>, ocr_config: OcrConfig, scheduler_config: SchedulerConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            ocr_config,
            scheduler_config,
            ocr_progress: OcrProgress::default(),
            in_documents: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn status(&self) -> Status {
        self.ocr_progress.status
    }

    /// File and delete operations are only allowed while `CREATED`
    pub fn is_mutable(&self) -> bool {
        self.ocr_progress.status == Status::Created
    }

    pub fn in_documents(&self) -> &[Document] {
        &self.in_documents
    }

    pub fn add_in_document(&mut self, document: Document) {
        self.in_documents.push(document);
    }

    /// Clear the input collection and refill it with `documents`
    pub fn replace_in_documents(&mut self, documents: Vec<Document>) {
        self.in_documents.clear();
        self.in_documents.extend(documents);
    }

    /// Remove and return the first document with the given original name
    pub fn remove_in_document(&mut self, original_file_name: &str) -> Option<Document> {
        let index = self
            .in_documents
            .iter()
            .position(|d| d.original_file_name == original_file_name)?;
        Some(self.in_documents.remove(index))
    }

    pub fn find_in_document(&self, original_file_name: &str) -> Option<&Document> {
        self.in_documents
            .iter()
            .find(|d| d.original_file_name == original_file_name)
    }

    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

/// Analytics row: how many tasks are in a given status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: Status,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new("invoice-batch", OcrConfig::default(), SchedulerConfig::default())
    }

    #[test]
    fn test_new_task_is_created_and_empty() {
        let task = task();
        assert_eq!(task.status(), Status::Created);
        assert!(task.is_mutable());
        assert!(task.in_documents().is_empty());
        assert_eq!(task.created_at, task.modified_at);
    }

    #[test]
    fn test_remove_in_document_takes_first_match() {
        let mut task = task();
        task.add_in_document(Document::new("scan.png", "r1"));
        task.add_in_document(Document::new("other.png", "r2"));
        task.add_in_document(Document::new("scan.png", "r3"));

        let removed = task.remove_in_document("scan.png").unwrap();
        assert_eq!(removed.randomized_file_name, "r1");
        assert_eq!(task.in_documents().len(), 2);
        assert_eq!(task.find_in_document("scan.png").unwrap().randomized_file_name, "r3");
        assert!(task.remove_in_document("missing.png").is_none());
    }

    #[test]
    fn test_replace_in_documents_clears_then_refills() {
        let mut task = task();
        task.add_in_document(Document::new("a.pdf", "r1"));
        task.replace_in_documents(vec![Document::new("b.pdf", "r2"), Document::new("c.pdf", "r3")]);

        let names: Vec<_> = task.in_documents().iter().map(|d| d.original_file_name.as_str()).collect();
        assert_eq!(names, vec!["b.pdf", "c.pdf"]);

        task.replace_in_documents(Vec::new());
        assert!(task.in_documents().is_empty());
    }

    #[test]
    fn test_only_created_is_mutable() {
        let mut task = task();
        for status in Status::ALL {
            task.ocr_progress.status = status;
            assert_eq!(task.is_mutable(), status == Status::Created);
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in Status::ALL {
            assert_eq!(Status::parse(status.as_str()), Some(status));
        }
        assert_eq!(Status::parse("UNKNOWN"), None);
    }

    #[test]
    fn test_document_serializes_type_field() {
        let doc = Document::new("a.pdf", "r1").with_content_type("application/pdf");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "application/pdf");
        assert_eq!(json["originalFileName"], "a.pdf");
        assert!(json.get("outDocument").is_none());
    }
}
