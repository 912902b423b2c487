//! ReportSnapshot - レスポンス／キャッシュ用の射影
//!
//! ReportTask から常に導出できる値で、単独では正本になりません。
//! `user_input` は含めません（呼び出し側はすでに知っている）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ReportId, ReportTask, TaskStatus};

/// Client-facing view of a report task.
///
/// JSON shape: `{"id":7,"status":"PENDING","reportResult":"","createdAt":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    pub id: ReportId,
    pub status: TaskStatus,
    pub report_result: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ReportTask> for ReportSnapshot {
    fn from(task: &ReportTask) -> Self {
        Self {
            id: task.id,
            status: task.status,
            report_result: task.report_result.clone(),
            created_at: task.created_at,
        }
    }
}

impl From<ReportTask> for ReportSnapshot {
    fn from(task: ReportTask) -> Self {
        Self {
            id: task.id,
            status: task.status,
            report_result: task.report_result,
            created_at: task.created_at,
        }
    }
}
