//! InMemoryTaskStore - 揮発性の TaskStore
//!
//! テストと `--database :memory:` 相当の一時運用向け。プロセスが終われば消えます。

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{NewReportTask, ReportId, ReportTask, StoreError};
use crate::ports::TaskStore;
use crate::ports::task_store::check_update;

struct InMemoryStoreState {
    /// All task records, keyed (and therefore ordered) by id.
    records: BTreeMap<ReportId, ReportTask>,

    /// Next id to assign.
    next_id: u64,
}

/// In-memory task store with sequential ids starting at 1.
pub struct InMemoryTaskStore {
    state: Mutex<InMemoryStoreState>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InMemoryStoreState {
                records: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task: NewReportTask) -> Result<ReportTask, StoreError> {
        let mut state = self.state.lock().await;
        let id = ReportId::new(state.next_id);
        state.next_id += 1;

        let record = task.into_task(id);
        state.records.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: ReportId) -> Result<Option<ReportTask>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.records.get(&id).cloned())
    }

    async fn update(&self, task: &ReportTask) -> Result<ReportTask, StoreError> {
        let mut state = self.state.lock().await;
        let stored = state
            .records
            .get_mut(&task.id)
            .ok_or(StoreError::Missing(task.id))?;

        check_update(stored, task)?;
        stored.status = task.status;
        stored.report_result = task.report_result.clone();
        Ok(stored.clone())
    }

    async fn list_all(&self) -> Result<Vec<ReportTask>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.records.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use chrono::Utc;

    fn new_task(input: &str) -> NewReportTask {
        NewReportTask::new(input, Utc::now())
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = InMemoryTaskStore::new();
        let a = store.create(new_task("a")).await.unwrap();
        let b = store.create(new_task("b")).await.unwrap();

        assert_eq!(a.id, ReportId::new(1));
        assert_eq!(b.id, ReportId::new(2));
        assert_eq!(a.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = InMemoryTaskStore::new();
        assert!(store.get(ReportId::new(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_only_touches_mutable_fields() {
        let store = InMemoryTaskStore::new();
        let created = store.create(new_task("original")).await.unwrap();

        let mut edited = created.clone();
        edited.user_input = "tampered".to_string();
        edited.start_processing().unwrap();
        let saved = store.update(&edited).await.unwrap();

        assert_eq!(saved.status, TaskStatus::Processing);
        assert_eq!(saved.user_input, "original");
        assert_eq!(saved.created_at, created.created_at);
    }

    #[tokio::test]
    async fn update_is_idempotent_and_rejects_regression() {
        let store = InMemoryTaskStore::new();
        let mut task = store.create(new_task("x")).await.unwrap();
        task.start_processing().unwrap();
        store.update(&task).await.unwrap();
        task.complete(r#"{"summary":"ok"}"#.to_string()).unwrap();

        store.update(&task).await.unwrap();
        // 同一内容の再書き込みは冪等
        let again = store.update(&task).await.unwrap();
        assert_eq!(again.report_result, r#"{"summary":"ok"}"#);

        let mut stale = task.clone();
        stale.status = TaskStatus::Processing;
        stale.report_result.clear();
        assert!(matches!(
            store.update(&stale).await,
            Err(StoreError::StaleUpdate { .. })
        ));

        let stored = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn update_cannot_skip_processing() {
        let store = InMemoryTaskStore::new();
        let mut task = store.create(new_task("x")).await.unwrap();
        task.start_processing().unwrap();
        task.complete(r#"{"summary":"ok"}"#.to_string()).unwrap();

        assert!(matches!(
            store.update(&task).await,
            Err(StoreError::StaleUpdate {
                stored: TaskStatus::Pending,
                attempted: TaskStatus::Completed,
                ..
            })
        ));
        let stored = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn update_unknown_id_is_missing() {
        let store = InMemoryTaskStore::new();
        let ghost = new_task("ghost").into_task(ReportId::new(42));
        assert!(matches!(
            store.update(&ghost).await,
            Err(StoreError::Missing(id)) if id == ReportId::new(42)
        ));
    }

    #[tokio::test]
    async fn list_all_is_ordered_by_id() {
        let store = InMemoryTaskStore::new();
        for input in ["a", "b", "c"] {
            store.create(new_task(input)).await.unwrap();
        }
        let ids: Vec<u64> = store
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|t| t.id.get())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
