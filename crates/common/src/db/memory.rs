//! In-process task store for tests and local development

use crate::db::TaskStore;
use crate::errors::{AppError, Result};
use crate::model::{OcrConfig, Page, SchedulerConfig, Status, StatusCount, Task};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Task store that keeps every record in memory, ordered by id
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<BTreeMap<Uuid, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `f` to the stored record, returning the number of records touched
    async fn update_with(&self, id: Uuid, f: impl FnOnce(&mut Task) + Send) -> u64 {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&id) {
            Some(task) => {
                f(task);
                task.modified_at = Utc::now();
                1
            }
            None => 0,
        }
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, task: Task) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(AppError::Internal {
                message: format!("duplicate task id {}", task.id),
            });
        }
        tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn save(&self, mut task: Task) -> Result<Task> {
        task.touch();
        let mut tasks = self.tasks.write().await;
        if let Some(existing) = tasks.get(&task.id) {
            task.created_at = existing.created_at;
        }
        tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Task>> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }

    async fn find_page(&self, page_number: u64, page_size: u64) -> Result<Page<Task>> {
        let tasks = self.tasks.read().await;
        let total = tasks.len() as u64;
        let content = tasks
            .values()
            .skip(page_number.saturating_mul(page_size) as usize)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(Page::new(content, page_number, page_size, total))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        Ok(self.tasks.write().await.remove(&id).is_some())
    }

    async fn update_ocr_config_by_id(&self, id: Uuid, ocr_config: &OcrConfig) -> Result<u64> {
        let ocr_config = ocr_config.clone();
        Ok(self.update_with(id, |task| task.ocr_config = ocr_config).await)
    }

    async fn update_scheduler_config_by_id(
        &self,
        id: Uuid,
        scheduler_config: &SchedulerConfig,
    ) -> Result<u64> {
        let scheduler_config = scheduler_config.clone();
        Ok(self
            .update_with(id, |task| task.scheduler_config = scheduler_config)
            .await)
    }

    async fn update_language_by_id(&self, id: Uuid, language: &str) -> Result<u64> {
        let language = language.to_string();
        Ok(self
            .update_with(id, |task| task.ocr_config.language = language)
            .await)
    }

    async fn count_by_status(&self) -> Result<Vec<StatusCount>> {
        let tasks = self.tasks.read().await;
        let mut counts: BTreeMap<Status, u64> = BTreeMap::new();
        for task in tasks.values() {
            *counts.entry(task.status()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect())
    }

    async fn average_in_documents(&self) -> Result<f64> {
        let tasks = self.tasks.read().await;
        if tasks.is_empty() {
            return Ok(0.0);
        }
        let total: usize = tasks.values().map(|t| t.in_documents().len()).sum();
        Ok(total as f64 / tasks.len() as f64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;

    fn task(name: &str) -> Task {
        Task::new(name, OcrConfig::default(), SchedulerConfig::default())
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = MemoryTaskStore::new();
        let t = task("a");
        store.insert(t.clone()).await.unwrap();
        assert!(store.insert(t).await.is_err());
    }

    #[tokio::test]
    async fn test_find_page_orders_by_id() {
        let store = MemoryTaskStore::new();
        for i in 0..5 {
            store.insert(task(&format!("t{i}"))).await.unwrap();
        }

        let page = store.find_page(1, 2).await.unwrap();
        assert_eq!(page.content.len(), 2);
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.total_pages, 3);

        let all = store.find_all().await.unwrap();
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(page.content[0].id, all[2].id);
    }

    #[tokio::test]
    async fn test_update_language_leaves_rest_of_config() {
        let store = MemoryTaskStore::new();
        let mut t = task("a");
        t.ocr_config.merge_documents = true;
        let id = store.insert(t).await.unwrap().id;

        assert_eq!(store.update_language_by_id(id, "deu").await.unwrap(), 1);
        assert_eq!(store.update_language_by_id(Uuid::new_v4(), "deu").await.unwrap(), 0);

        let stored = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.ocr_config.language, "deu");
        assert!(stored.ocr_config.merge_documents);
    }

    #[tokio::test]
    async fn test_aggregations() {
        let store = MemoryTaskStore::new();
        assert_eq!(store.average_in_documents().await.unwrap(), 0.0);

        let mut a = task("a");
        a.add_in_document(Document::new("1.pdf", "r1"));
        a.add_in_document(Document::new("2.pdf", "r2"));
        a.add_in_document(Document::new("3.pdf", "r3"));
        let mut b = task("b");
        b.ocr_progress.status = Status::Success;
        b.add_in_document(Document::new("4.pdf", "r4"));
        store.insert(a).await.unwrap();
        store.insert(b).await.unwrap();
        store.insert(task("c")).await.unwrap();

        let avg = store.average_in_documents().await.unwrap();
        assert!((avg - 4.0 / 3.0).abs() < 1e-9);

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(
            counts,
            vec![
                StatusCount { status: Status::Created, count: 2 },
                StatusCount { status: Status::Success, count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_save_keeps_created_at() {
        let store = MemoryTaskStore::new();
        let t = store.insert(task("a")).await.unwrap();
        let created = t.created_at;

        let mut changed = t.clone();
        changed.created_at = Utc::now() + chrono::Duration::days(1);
        let saved = store.save(changed).await.unwrap();
        assert_eq!(saved.created_at, created);
        assert!(saved.modified_at >= created);
        assert!(store.delete_by_id(t.id).await.unwrap());
        assert!(!store.delete_by_id(t.id).await.unwrap());
    }
}
