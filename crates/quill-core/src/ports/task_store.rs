//! TaskStore port - レポートタスクの正本（source of truth）
//!
//! # 設計原則
//! - 永続化されたレコードが唯一の真実。キャッシュはその写しに過ぎない
//! - `update` は status と report_result だけを書き換える（id / user_input / created_at は不変）
//! - `update` は同一内容の再実行に対して冪等、逆行・終端状態からの遷移は拒否する
//!
//! # 実装
//! - `impls::InMemoryTaskStore`（テスト・揮発運用）
//! - `impls::SqliteTaskStore`（プロセス再起動をまたいで保持）

use async_trait::async_trait;

use crate::domain::{NewReportTask, ReportId, ReportTask, StoreError};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new PENDING task and return it with its assigned id.
    async fn create(&self, task: NewReportTask) -> Result<ReportTask, StoreError>;

    async fn get(&self, id: ReportId) -> Result<Option<ReportTask>, StoreError>;

    /// Write the mutable fields of `task`. See module docs for the monotonicity rule.
    async fn update(&self, task: &ReportTask) -> Result<ReportTask, StoreError>;

    /// Every task, ordered by id.
    async fn list_all(&self) -> Result<Vec<ReportTask>, StoreError>;
}

/// Shared admission rule for `TaskStore::update`: same status (idempotent retry) or a
/// legal forward transition.
pub fn check_update(stored: &ReportTask, next: &ReportTask) -> Result<(), StoreError> {
    let allowed = if stored.status == next.status {
        // 終端状態での再書き込みは同一 payload のときだけ許す
        !stored.status.is_terminal() || stored.report_result == next.report_result
    } else {
        stored.status.can_transition_to(next.status)
    };

    if allowed {
        Ok(())
    } else {
        Err(StoreError::StaleUpdate {
            id: stored.id,
            stored: stored.status,
            attempted: next.status,
        })
    }
}
