//! Report task record: the durable unit owned by the task store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::QuillError;
use super::{ReportId, TaskStatus};

/// Input to `TaskStore::create`. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReportTask {
    pub user_input: String,
    pub created_at: DateTime<Utc>,
}

impl NewReportTask {
    pub fn new(user_input: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            user_input: user_input.into(),
            created_at,
        }
    }

    /// Attach the store-assigned id. Every task starts PENDING with an empty result.
    pub fn into_task(self, id: ReportId) -> ReportTask {
        ReportTask {
            id,
            user_input: self.user_input,
            status: TaskStatus::Pending,
            report_result: String::new(),
            created_at: self.created_at,
        }
    }
}

/// Durable report task.
///
/// Design:
/// - The task store is the single source of truth for this record.
/// - `id`, `user_input` and `created_at` never change after creation.
/// - Status changes only go through the mutators below, which enforce the lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTask {
    pub id: ReportId,
    pub user_input: String,
    pub status: TaskStatus,
    pub report_result: String,
    pub created_at: DateTime<Utc>,
}

impl ReportTask {
    fn advance(&mut self, next: TaskStatus) -> Result<(), QuillError> {
        if !self.status.can_transition_to(next) {
            return Err(QuillError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// PENDING -> PROCESSING.
    pub fn start_processing(&mut self) -> Result<(), QuillError> {
        self.advance(TaskStatus::Processing)
    }

    /// PROCESSING -> COMPLETED with a non-empty payload.
    pub fn complete(&mut self, report_result: String) -> Result<(), QuillError> {
        if report_result.trim().is_empty() {
            return Err(QuillError::InvalidInput(format!(
                "report {} cannot complete with an empty result",
                self.id
            )));
        }
        self.advance(TaskStatus::Completed)?;
        self.report_result = report_result;
        Ok(())
    }

    /// PROCESSING -> FAILED. The payload is cleared.
    pub fn fail(&mut self) -> Result<(), QuillError> {
        self.advance(TaskStatus::Failed)?;
        self.report_result.clear();
        Ok(())
    }
}
