//! Errors - エラー型と分類
//!
//! # 分類
//! - **QuillError**: 同期操作（submit / get_status / list_all）の呼び出し側に返るエラー
//! - **StoreError**: 永続化層の失敗。実行中の操作にとって致命的
//! - **GenerationError**: LLM 呼び出しの失敗。TaskProcessor が必ず捕捉し FAILED に落とす

use std::time::Duration;

use thiserror::Error;

use super::{ReportId, TaskStatus};

/// Error raised by a concrete backend (database driver, HTTP client).
/// The impls convert their own error types into it.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum QuillError {
    #[error("report {0} not found")]
    NotFound(ReportId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("report {id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        id: ReportId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend: {0}")]
    Backend(#[source] BackendError),

    #[error("report {0} does not exist")]
    Missing(ReportId),

    /// The update would move the stored status backwards or out of a terminal state.
    #[error("stale update for report {id}: stored {stored}, attempted {attempted}")]
    StaleUpdate {
        id: ReportId,
        stored: TaskStatus,
        attempted: TaskStatus,
    },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("blocking store task failed: {0}")]
    Join(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no API credential configured (set OPENAI_API_KEY)")]
    MissingCredential,

    #[error("transport: {0}")]
    Transport(#[source] BackendError),

    #[error("provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("model returned no text")]
    EmptyOutput,

    #[error("unusable report payload: {0}")]
    Format(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
}
