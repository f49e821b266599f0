use axum::body::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::locks::TaskLocks;
use crate::db::TaskStore;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::model::{Document, OcrConfig, Page, SchedulerConfig, StatusCount, Task};
use crate::storage::{detector, BlobStore};

pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// One uploaded file, fully buffered
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub original_file_name: String,
    /// Type declared by the client, if any
    pub content_type: Option<String>,
    pub content: Bytes,
}

impl UploadFile {
    pub fn new(
        original_file_name: impl Into<String>,
        content_type: Option<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            original_file_name: original_file_name.into(),
            content_type,
            content: content.into(),
        }
    }
}

/// Task lifecycle operations
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    blobs: Arc<dyn BlobStore>,
    locks: TaskLocks,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            blobs,
            locks: TaskLocks::default(),
        }
    }

    /// Check that the backing store is reachable
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Create a task in `CREATED` state with its directories, then attach
    /// `files` if any were given
    #[instrument(skip(self, ocr_config, scheduler_config, files), fields(file_count = files.len()))]
    pub async fn create_task(
        &self,
        name: &str,
        ocr_config: OcrConfig,
        scheduler_config: SchedulerConfig,
        files: Vec<UploadFile>,
    ) -> Result<Task> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation {
                message: "task name must not be empty".to_string(),
                field: Some("name".to_string()),
            });
        }

        let task = self
            .store
            .insert(Task::new(name, ocr_config, scheduler_config))
            .await?;

        if let Err(e) = self.blobs.create_task_directories(task.id).await {
            metrics::record_storage_fault("create_directories");
            // Do not leave a record without directories behind
            if let Err(cleanup) = self.store.delete_by_id(task.id).await {
                error!(task_id = %task.id, error = %cleanup, "Failed to remove task after directory error");
            }
            return Err(e);
        }

        metrics::record_task_created();
        info!(task_id = %task.id, name = %task.name, "Task created");

        if files.is_empty() {
            return Ok(task);
        }

        let _guard = self.locks.acquire(task.id).await;
        let id = task.id;
        match self.upload_locked(task, files).await {
            Ok((task, _)) => Ok(task),
            Err(e) => {
                // Creation is all or nothing: drop the record and its folders
                if let Err(cleanup) = self.store.delete_by_id(id).await {
                    error!(task_id = %id, error = %cleanup, "Failed to remove task after upload error");
                }
                if let Err(cleanup) = self.blobs.remove_task_directories(id).await {
                    error!(task_id = %id, error = %cleanup, "Failed to remove task directories after upload error");
                }
                metrics::record_task_deleted();
                Err(e)
            }
        }
    }

    /// Create a task with default configuration and no files
    pub async fn create_draft(&self, name: &str) -> Result<Task> {
        self.create_task(name, OcrConfig::default(), SchedulerConfig::default(), Vec::new())
            .await
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        self.store.find_by_id(id).await
    }

    /// All tasks ordered by id
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.store.find_all().await
    }

    pub async fn list_tasks_page(&self, page_number: u64, page_size: Option<u64>) -> Result<Page<Task>> {
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(AppError::Validation {
                message: "page size must be greater than zero".to_string(),
                field: Some("pageSize".to_string()),
            });
        }
        self.store.find_page(page_number, page_size).await
    }

    /// Replace the OCR configuration; returns the number of tasks updated
    pub async fn update_ocr_config(&self, id: Uuid, ocr_config: &OcrConfig) -> Result<u64> {
        let _guard = self.locks.acquire(id).await;
        let updated = self.store.update_ocr_config_by_id(id, ocr_config).await?;
        debug!(task_id = %id, updated, "OCR config updated");
        Ok(updated)
    }

    /// Replace the scheduler configuration; returns the number of tasks updated
    pub async fn update_scheduler_config(
        &self,
        id: Uuid,
        scheduler_config: &SchedulerConfig,
    ) -> Result<u64> {
        let _guard = self.locks.acquire(id).await;
        let updated = self
            .store
            .update_scheduler_config_by_id(id, scheduler_config)
            .await?;
        debug!(task_id = %id, updated, "Scheduler config updated");
        Ok(updated)
    }

    /// Replace only the OCR language; returns the number of tasks updated
    pub async fn update_language(&self, id: Uuid, language: &str) -> Result<u64> {
        let language = language.trim();
        if language.is_empty() {
            return Err(AppError::Validation {
                message: "language must not be empty".to_string(),
                field: Some("language".to_string()),
            });
        }
        let _guard = self.locks.acquire(id).await;
        let updated = self.store.update_language_by_id(id, language).await?;
        debug!(task_id = %id, language, updated, "Language updated");
        Ok(updated)
    }

    /// Store `files` as input documents of the task, in order
    #[instrument(skip(self, files), fields(file_count = files.len()))]
    pub async fn upload_documents(&self, id: Uuid, files: Vec<UploadFile>) -> Result<Vec<Document>> {
        let _guard = self.locks.acquire(id).await;
        let task = self.load(id).await?;
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let (_, documents) = self.upload_locked(task, files).await?;
        Ok(documents)
    }

    /// Caller holds the task lock
    async fn upload_locked(&self, mut task: Task, files: Vec<UploadFile>) -> Result<(Task, Vec<Document>)> {
        let start = Instant::now();
        let mut written: Vec<PathBuf> = Vec::with_capacity(files.len());
        let mut documents = Vec::with_capacity(files.len());

        for file in &files {
            let content_type = detector().resolve(
                file.content_type.as_deref(),
                &file.content,
                &file.original_file_name,
            );
            let randomized_file_name = Uuid::new_v4().to_string();

            match self
                .blobs
                .store(task.id, &randomized_file_name, &file.content, true)
                .await
            {
                Ok(path) => written.push(path),
                Err(e) => {
                    metrics::record_storage_fault("store");
                    warn!(
                        task_id = %task.id,
                        file = %file.original_file_name,
                        error = %e,
                        "Upload failed, discarding files written so far"
                    );
                    self.discard(&written).await;
                    return Err(e);
                }
            }

            documents.push(
                Document::new(file.original_file_name.clone(), randomized_file_name)
                    .with_content_type(content_type),
            );
        }

        for document in &documents {
            task.add_in_document(document.clone());
        }

        let task = match self.store.save(task).await {
            Ok(task) => task,
            Err(e) => {
                self.discard(&written).await;
                return Err(e);
            }
        };

        metrics::record_documents_uploaded(documents.len(), start.elapsed().as_secs_f64());
        info!(task_id = %task.id, count = documents.len(), "Documents uploaded");

        Ok((task, documents))
    }

    /// Best-effort removal of files that will not be referenced
    async fn discard(&self, paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = self.blobs.delete(path).await {
                warn!(path = %path.display(), error = %e, "Failed to discard uploaded file");
            }
        }
    }

    /// Remove the first input document named `original_file_name`.
    /// Nothing happens when there is no such document.
    #[instrument(skip(self))]
    pub async fn remove_file(&self, id: Uuid, original_file_name: &str) -> Result<()> {
        let _guard = self.locks.acquire(id).await;
        let mut task = self.load_mutable(id).await?;

        let Some(document) = task.find_in_document(original_file_name) else {
            debug!(task_id = %id, file = %original_file_name, "No such document, nothing to remove");
            return Ok(());
        };

        let path = self.blobs.input_path(id, &document.randomized_file_name);
        if let Err(e) = self.blobs.delete(&path).await {
            metrics::record_storage_fault("delete");
            return Err(e);
        }

        task.remove_in_document(original_file_name);
        self.store.save(task).await?;

        metrics::record_documents_removed(1);
        info!(task_id = %id, file = %original_file_name, "Document removed");
        Ok(())
    }

    /// Remove every input document of the task
    #[instrument(skip(self))]
    pub async fn remove_all_files(&self, id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(id).await;
        let task = self.load_mutable(id).await?;
        self.remove_all_locked(task).await?;
        Ok(())
    }

    /// Caller holds the task lock. Files are removed one at a time; on the
    /// first failure the documents still on disk are persisted so the record
    /// matches the input folder.
    async fn remove_all_locked(&self, mut task: Task) -> Result<Task> {
        let documents = task.in_documents().to_vec();

        for (index, document) in documents.iter().enumerate() {
            let path = self.blobs.input_path(task.id, &document.randomized_file_name);
            if let Err(e) = self.blobs.delete(&path).await {
                metrics::record_storage_fault("delete");
                if index > 0 {
                    task.replace_in_documents(documents[index..].to_vec());
                    if let Err(save) = self.store.save(task.clone()).await {
                        error!(task_id = %task.id, error = %save, "Failed to persist remaining documents");
                    }
                    metrics::record_documents_removed(index);
                }
                warn!(
                    task_id = %task.id,
                    removed = index,
                    remaining = documents.len() - index,
                    "Bulk document removal stopped"
                );
                return Err(e);
            }
        }

        task.replace_in_documents(Vec::new());
        let task = self.store.save(task).await?;

        metrics::record_documents_removed(documents.len());
        info!(task_id = %task.id, count = documents.len(), "All documents removed");
        Ok(task)
    }

    /// Delete the task, its input files, and its directory tree
    #[instrument(skip(self))]
    pub async fn delete_task(&self, id: Uuid) -> Result<()> {
        let guard = self.locks.acquire(id).await;
        let task = self.load_mutable(id).await?;
        self.remove_all_locked(task).await?;

        self.store.delete_by_id(id).await?;
        let removed = self.blobs.remove_task_directories(id).await;

        drop(guard);

        if let Err(e) = removed {
            metrics::record_storage_fault("remove_directories");
            return Err(e);
        }

        metrics::record_task_deleted();
        info!(task_id = %id, "Task deleted");
        Ok(())
    }

    pub async fn count_by_status(&self) -> Result<Vec<StatusCount>> {
        self.store.count_by_status().await
    }

    pub async fn average_in_documents(&self) -> Result<f64> {
        self.store.average_in_documents().await
    }

    async fn load(&self, id: Uuid) -> Result<Task> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AppError::MissingEntity { id })
    }

    /// Load a task that must still be in `CREATED` state
    async fn load_mutable(&self, id: Uuid) -> Result<Task> {
        let task = self.load(id).await?;
        if !task.is_mutable() {
            return Err(AppError::IllegalLifecycleState {
                id,
                status: task.status(),
            });
        }
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryTaskStore;
    use crate::model::Status;
    use crate::storage::FileSystemBlobStore;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        store: Arc<MemoryTaskStore>,
        service: TaskService,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ocr");
        let store = Arc::new(MemoryTaskStore::new());
        let service = TaskService::new(store.clone(), Arc::new(FileSystemBlobStore::new(&root)));
        Fixture {
            _dir: dir,
            root,
            store,
            service,
        }
    }

    fn pdf(name: &str) -> UploadFile {
        UploadFile::new(name, Some("application/pdf".to_string()), &b"%PDF-1.4 test"[..])
    }

    fn input_dir(root: &Path, id: Uuid) -> PathBuf {
        root.join(id.to_string()).join("input")
    }

    fn input_file_count(root: &Path, id: Uuid) -> usize {
        std::fs::read_dir(input_dir(root, id)).unwrap().count()
    }

    async fn set_status(fx: &Fixture, id: Uuid, status: Status) {
        let mut task = fx.store.find_by_id(id).await.unwrap().unwrap();
        task.ocr_progress.status = status;
        fx.store.save(task).await.unwrap();
    }

    #[tokio::test]
    async fn test_draft_invoice_batch() {
        let fx = fixture();
        let task = fx.service.create_draft("invoice-batch").await.unwrap();

        assert_eq!(task.name, "invoice-batch");
        assert_eq!(task.status(), Status::Created);
        assert!(task.in_documents().is_empty());
        assert!(input_dir(&fx.root, task.id).is_dir());
        assert!(fx.root.join(task.id.to_string()).join("output").is_dir());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let fx = fixture();
        let err = fx.service.create_draft("   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(fx.service.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_files_sniffs_generic_type() {
        let fx = fixture();
        let files = vec![
            pdf("a.pdf"),
            UploadFile::new("b.bin", Some("application/octet-stream".to_string()), JPEG),
        ];
        let task = fx
            .service
            .create_task("scans", OcrConfig::default(), SchedulerConfig::default(), files)
            .await
            .unwrap();

        let docs = task.in_documents();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].original_file_name, "a.pdf");
        assert_eq!(docs[0].content_type.as_deref(), Some("application/pdf"));
        assert_eq!(docs[1].original_file_name, "b.bin");
        assert_eq!(docs[1].content_type.as_deref(), Some("image/jpeg"));

        let stored = fx.service.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.in_documents(), docs);
    }

    #[tokio::test]
    async fn test_create_rolls_back_when_directories_fail() {
        let dir = TempDir::new().unwrap();
        // Root is a regular file, so no directory can be created under it
        let root = dir.path().join("not-a-dir");
        std::fs::write(&root, b"x").unwrap();

        let store = Arc::new(MemoryTaskStore::new());
        let service = TaskService::new(store.clone(), Arc::new(FileSystemBlobStore::new(&root)));

        let err = service.create_draft("broken").await.unwrap_err();
        assert!(matches!(err, AppError::StorageFault { .. }));
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_keeps_order_and_distinct_names() {
        let fx = fixture();
        let task = fx.service.create_draft("batch").await.unwrap();

        let files = (0..4).map(|i| pdf(&format!("page-{i}.pdf"))).collect();
        let docs = fx.service.upload_documents(task.id, files).await.unwrap();

        let names: Vec<_> = docs.iter().map(|d| d.original_file_name.as_str()).collect();
        assert_eq!(names, vec!["page-0.pdf", "page-1.pdf", "page-2.pdf", "page-3.pdf"]);

        let mut randomized: Vec<_> = docs.iter().map(|d| d.randomized_file_name.clone()).collect();
        randomized.sort();
        randomized.dedup();
        assert_eq!(randomized.len(), 4);

        assert_eq!(input_file_count(&fx.root, task.id), 4);
        for doc in &docs {
            assert!(input_dir(&fx.root, task.id).join(&doc.randomized_file_name).is_file());
        }
    }

    #[tokio::test]
    async fn test_upload_appends_to_existing_documents() {
        let fx = fixture();
        let task = fx.service.create_draft("batch").await.unwrap();
        fx.service.upload_documents(task.id, vec![pdf("a.pdf")]).await.unwrap();
        fx.service.upload_documents(task.id, vec![pdf("b.pdf")]).await.unwrap();

        let stored = fx.service.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.in_documents().len(), 2);
        assert_eq!(stored.in_documents()[1].original_file_name, "b.pdf");
    }

    #[tokio::test]
    async fn test_upload_to_missing_task() {
        let fx = fixture();
        let err = fx
            .service
            .upload_documents(Uuid::new_v4(), vec![pdf("a.pdf")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingEntity { .. }));
    }

    #[tokio::test]
    async fn test_upload_is_not_status_gated() {
        let fx = fixture();
        let task = fx.service.create_draft("batch").await.unwrap();
        set_status(&fx, task.id, Status::InProgress).await;

        let docs = fx.service.upload_documents(task.id, vec![pdf("late.pdf")]).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    /// Blob store that fails every `store` call after the first `allowed`
    struct FailingBlobStore {
        inner: FileSystemBlobStore,
        allowed: usize,
        stored: AtomicUsize,
    }

    #[async_trait]
    impl BlobStore for FailingBlobStore {
        async fn create_task_directories(&self, task_id: Uuid) -> Result<()> {
            self.inner.create_task_directories(task_id).await
        }

        async fn store(&self, task_id: Uuid, file_name: &str, bytes: &[u8], input: bool) -> Result<PathBuf> {
            if self.stored.fetch_add(1, Ordering::SeqCst) >= self.allowed {
                return Err(AppError::storage(
                    self.inner.input_path(task_id, file_name),
                    std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                ));
            }
            self.inner.store(task_id, file_name, bytes, input).await
        }

        async fn delete(&self, path: &Path) -> Result<()> {
            self.inner.delete(path).await
        }

        async fn remove_task_directories(&self, task_id: Uuid) -> Result<()> {
            self.inner.remove_task_directories(task_id).await
        }

        fn input_path(&self, task_id: Uuid, file_name: &str) -> PathBuf {
            self.inner.input_path(task_id, file_name)
        }

        fn output_path(&self, task_id: Uuid, file_name: &str) -> PathBuf {
            self.inner.output_path(task_id, file_name)
        }
    }

    #[tokio::test]
    async fn test_failed_upload_discards_written_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ocr");
        let store = Arc::new(MemoryTaskStore::new());
        let blobs = Arc::new(FailingBlobStore {
            inner: FileSystemBlobStore::new(&root),
            allowed: 2,
            stored: AtomicUsize::new(0),
        });
        let service = TaskService::new(store, blobs);

        let task = service.create_draft("batch").await.unwrap();
        let files = vec![pdf("1.pdf"), pdf("2.pdf"), pdf("3.pdf")];
        let err = service.upload_documents(task.id, files).await.unwrap_err();
        assert!(matches!(err, AppError::StorageFault { .. }));

        let stored = service.get_task(task.id).await.unwrap().unwrap();
        assert!(stored.in_documents().is_empty());
        assert_eq!(input_file_count(&root, task.id), 0);
    }

    #[tokio::test]
    async fn test_failed_create_with_files_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ocr");
        let store = Arc::new(MemoryTaskStore::new());
        let blobs = Arc::new(FailingBlobStore {
            inner: FileSystemBlobStore::new(&root),
            allowed: 0,
            stored: AtomicUsize::new(0),
        });
        let service = TaskService::new(store.clone(), blobs);

        let err = service
            .create_task("scans", OcrConfig::default(), SchedulerConfig::default(), vec![pdf("a.pdf")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StorageFault { .. }));

        assert!(store.find_all().await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    /// Task store whose `save` always fails; everything else is in memory
    struct FailingSaveStore {
        inner: MemoryTaskStore,
    }

    #[async_trait]
    impl TaskStore for FailingSaveStore {
        async fn insert(&self, task: Task) -> Result<Task> {
            self.inner.insert(task).await
        }

        async fn save(&self, _task: Task) -> Result<Task> {
            Err(AppError::Internal {
                message: "write rejected".to_string(),
            })
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>> {
            self.inner.find_by_id(id).await
        }

        async fn find_all(&self) -> Result<Vec<Task>> {
            self.inner.find_all().await
        }

        async fn find_page(&self, page_number: u64, page_size: u64) -> Result<Page<Task>> {
            self.inner.find_page(page_number, page_size).await
        }

        async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
            self.inner.delete_by_id(id).await
        }

        async fn update_ocr_config_by_id(&self, id: Uuid, ocr_config: &OcrConfig) -> Result<u64> {
            self.inner.update_ocr_config_by_id(id, ocr_config).await
        }

        async fn update_scheduler_config_by_id(
            &self,
            id: Uuid,
            scheduler_config: &SchedulerConfig,
        ) -> Result<u64> {
            self.inner.update_scheduler_config_by_id(id, scheduler_config).await
        }

        async fn update_language_by_id(&self, id: Uuid, language: &str) -> Result<u64> {
            self.inner.update_language_by_id(id, language).await
        }

        async fn count_by_status(&self) -> Result<Vec<StatusCount>> {
            self.inner.count_by_status().await
        }

        async fn average_in_documents(&self) -> Result<f64> {
            self.inner.average_in_documents().await
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_rejected_save_discards_uploaded_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ocr");
        let store = Arc::new(FailingSaveStore {
            inner: MemoryTaskStore::new(),
        });
        let service = TaskService::new(store.clone(), Arc::new(FileSystemBlobStore::new(&root)));

        let task = service.create_draft("batch").await.unwrap();
        let err = service
            .upload_documents(task.id, vec![pdf("1.pdf"), pdf("2.pdf")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));

        let stored = service.get_task(task.id).await.unwrap().unwrap();
        assert!(stored.in_documents().is_empty());
        assert_eq!(input_file_count(&root, task.id), 0);
    }

    #[tokio::test]
    async fn test_remove_file_takes_first_match_only() {
        let fx = fixture();
        let task = fx.service.create_draft("batch").await.unwrap();
        let docs = fx
            .service
            .upload_documents(task.id, vec![pdf("scan.pdf"), pdf("other.pdf"), pdf("scan.pdf")])
            .await
            .unwrap();

        fx.service.remove_file(task.id, "scan.pdf").await.unwrap();

        let stored = fx.service.get_task(task.id).await.unwrap().unwrap();
        let remaining: Vec<_> = stored
            .in_documents()
            .iter()
            .map(|d| d.randomized_file_name.as_str())
            .collect();
        assert_eq!(
            remaining,
            vec![docs[1].randomized_file_name.as_str(), docs[2].randomized_file_name.as_str()]
        );
        assert!(!input_dir(&fx.root, task.id).join(&docs[0].randomized_file_name).exists());
        assert_eq!(input_file_count(&fx.root, task.id), 2);
    }

    #[tokio::test]
    async fn test_remove_file_twice_is_noop() {
        let fx = fixture();
        let task = fx.service.create_draft("batch").await.unwrap();
        fx.service.upload_documents(task.id, vec![pdf("a.pdf")]).await.unwrap();

        fx.service.remove_file(task.id, "a.pdf").await.unwrap();
        let after_first = fx.service.get_task(task.id).await.unwrap().unwrap();

        fx.service.remove_file(task.id, "a.pdf").await.unwrap();
        let after_second = fx.service.get_task(task.id).await.unwrap().unwrap();

        assert!(after_second.in_documents().is_empty());
        assert_eq!(after_first.modified_at, after_second.modified_at);
    }

    #[tokio::test]
    async fn test_remove_file_on_missing_task() {
        let fx = fixture();
        let err = fx.service.remove_file(Uuid::new_v4(), "a.pdf").await.unwrap_err();
        assert!(matches!(err, AppError::MissingEntity { .. }));
    }

    #[tokio::test]
    async fn test_non_created_task_is_locked_for_file_ops() {
        let fx = fixture();
        let task = fx.service.create_draft("batch").await.unwrap();
        fx.service.upload_documents(task.id, vec![pdf("a.pdf")]).await.unwrap();

        for status in [Status::Triggered, Status::InProgress, Status::Success, Status::Failed, Status::Interrupted] {
            set_status(&fx, task.id, status).await;
            let before = fx.service.get_task(task.id).await.unwrap().unwrap();

            let err = fx.service.remove_file(task.id, "a.pdf").await.unwrap_err();
            assert!(matches!(err, AppError::IllegalLifecycleState { status: s, .. } if s == status));
            let err = fx.service.remove_all_files(task.id).await.unwrap_err();
            assert!(matches!(err, AppError::IllegalLifecycleState { .. }));
            let err = fx.service.delete_task(task.id).await.unwrap_err();
            assert!(matches!(err, AppError::IllegalLifecycleState { .. }));

            let after = fx.service.get_task(task.id).await.unwrap().unwrap();
            assert_eq!(before, after);
            assert_eq!(input_file_count(&fx.root, task.id), 1);
        }
    }

    #[tokio::test]
    async fn test_config_updates_are_not_status_gated() {
        let fx = fixture();
        let task = fx.service.create_draft("batch").await.unwrap();
        set_status(&fx, task.id, Status::Success).await;

        let mut config = OcrConfig::default();
        config.merge_documents = true;
        assert_eq!(fx.service.update_ocr_config(task.id, &config).await.unwrap(), 1);

        let scheduler = SchedulerConfig {
            start_date_time: Some(chrono::Utc::now()),
        };
        assert_eq!(fx.service.update_scheduler_config(task.id, &scheduler).await.unwrap(), 1);

        let stored = fx.service.get_task(task.id).await.unwrap().unwrap();
        assert!(stored.ocr_config.merge_documents);
        assert_eq!(stored.scheduler_config, scheduler);
    }

    #[tokio::test]
    async fn test_update_language_changes_only_language() {
        let fx = fixture();
        let mut config = OcrConfig::default();
        config.pre_processing = true;
        let task = fx
            .service
            .create_task("batch", config, SchedulerConfig::default(), vec![pdf("a.pdf")])
            .await
            .unwrap();

        assert_eq!(fx.service.update_language(task.id, "fra").await.unwrap(), 1);

        let stored = fx.service.get_task(task.id).await.unwrap().unwrap();
        let mut expected = task.ocr_config.clone();
        expected.language = "fra".to_string();
        assert_eq!(stored.ocr_config, expected);
        assert_eq!(stored.in_documents(), task.in_documents());
        assert_eq!(stored.name, task.name);

        assert_eq!(fx.service.update_language(Uuid::new_v4(), "fra").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_all_files() {
        let fx = fixture();
        let task = fx.service.create_draft("batch").await.unwrap();
        fx.service
            .upload_documents(task.id, vec![pdf("a.pdf"), pdf("b.pdf"), pdf("c.pdf")])
            .await
            .unwrap();

        fx.service.remove_all_files(task.id).await.unwrap();

        let stored = fx.service.get_task(task.id).await.unwrap().unwrap();
        assert!(stored.in_documents().is_empty());
        assert_eq!(input_file_count(&fx.root, task.id), 0);
    }

    #[tokio::test]
    async fn test_remove_all_files_persists_remainder_on_failure() {
        let fx = fixture();
        let task = fx.service.create_draft("batch").await.unwrap();
        let docs = fx
            .service
            .upload_documents(task.id, vec![pdf("a.pdf"), pdf("b.pdf"), pdf("c.pdf")])
            .await
            .unwrap();

        // Second file vanishes behind the service's back
        std::fs::remove_file(input_dir(&fx.root, task.id).join(&docs[1].randomized_file_name)).unwrap();

        let err = fx.service.remove_all_files(task.id).await.unwrap_err();
        assert!(matches!(err, AppError::StorageFault { .. }));

        let stored = fx.service.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.in_documents(), &docs[1..]);
        assert!(!input_dir(&fx.root, task.id).join(&docs[0].randomized_file_name).exists());
        assert!(input_dir(&fx.root, task.id).join(&docs[2].randomized_file_name).exists());
    }

    #[tokio::test]
    async fn test_delete_task_removes_record_and_directories() {
        let fx = fixture();
        let other = fx.service.create_draft("keep").await.unwrap();
        let task = fx
            .service
            .create_task("gone", OcrConfig::default(), SchedulerConfig::default(), vec![pdf("a.pdf")])
            .await
            .unwrap();

        fx.service.delete_task(task.id).await.unwrap();

        assert!(fx.service.get_task(task.id).await.unwrap().is_none());
        assert!(!fx.root.join(task.id.to_string()).exists());
        assert!(fx.root.join(other.id.to_string()).is_dir());

        let err = fx.service.delete_task(task.id).await.unwrap_err();
        assert!(matches!(err, AppError::MissingEntity { .. }));
    }

    #[tokio::test]
    async fn test_list_tasks_page() {
        let fx = fixture();
        for i in 0..3 {
            fx.service.create_draft(&format!("t{i}")).await.unwrap();
        }

        let page = fx.service.list_tasks_page(0, None).await.unwrap();
        assert_eq!(page.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(page.content.len(), 3);

        let page = fx.service.list_tasks_page(1, Some(2)).await.unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.total_pages, 2);

        let err = fx.service.list_tasks_page(0, Some(0)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_analytics() {
        let fx = fixture();
        let a = fx.service.create_draft("a").await.unwrap();
        fx.service
            .upload_documents(a.id, vec![pdf("1.pdf"), pdf("2.pdf")])
            .await
            .unwrap();
        let b = fx.service.create_draft("b").await.unwrap();
        set_status(&fx, b.id, Status::Failed).await;

        assert_eq!(fx.service.average_in_documents().await.unwrap(), 1.0);
        let counts = fx.service.count_by_status().await.unwrap();
        assert_eq!(
            counts,
            vec![
                StatusCount { status: Status::Created, count: 1 },
                StatusCount { status: Status::Failed, count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_ids_do_not_grow_lock_table() {
        let fx = fixture();
        for _ in 0..1000 {
            let id = Uuid::new_v4();
            assert_eq!(fx.service.update_language(id, "deu").await.unwrap(), 0);
            let err = fx.service.remove_file(id, "a.pdf").await.unwrap_err();
            assert!(matches!(err, AppError::MissingEntity { .. }));
        }
        assert_eq!(fx.service.locks.len(), 0);

        let task = fx.service.create_draft("batch").await.unwrap();
        fx.service.upload_documents(task.id, vec![pdf("a.pdf")]).await.unwrap();
        fx.service.delete_task(task.id).await.unwrap();
        assert_eq!(fx.service.locks.len(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_do_not_lose_documents() {
        let fx = fixture();
        let service = Arc::new(fx.service);
        let task = service.create_draft("batch").await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .upload_documents(task.id, vec![pdf(&format!("{i}.pdf"))])
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = service.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.in_documents().len(), 8);
        assert_eq!(input_file_count(&fx.root, task.id), 8);
    }
}
