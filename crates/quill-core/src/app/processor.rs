//! TaskProcessor - 1 タスクを終端状態まで進める
//!
//! # フロー
//! 1. TaskStore から取得（無ければ呼び出し側のバグとして error! を出す）
//! 2. PENDING -> PROCESSING を保存し、キャッシュを更新
//! 3. GenerationGateway を呼ぶ（ロックは一切保持しない）
//! 4. 成功: COMPLETED + report_result を保存し、キャッシュを更新
//! 5. 失敗: FAILED を保存し、キャッシュを更新（エラーはログのみ、呼び出し元へは返さない）
//!
//! 保存に失敗した時点で実行を打ち切り、タスクは最後に保存できた状態のまま残ります。
//! 自動リトライはしません。

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::{
    GenerationError, QuillError, ReportDocument, ReportId, ReportSnapshot, ReportTask, TaskStatus,
};
use crate::ports::{GenerationGateway, ResultCache, TaskStore};

pub struct TaskProcessor {
    store: Arc<dyn TaskStore>,
    cache: Arc<dyn ResultCache>,
    gateway: Arc<dyn GenerationGateway>,
    generation_timeout: Option<Duration>,
}

impl TaskProcessor {
    pub fn new(
        store: Arc<dyn TaskStore>,
        cache: Arc<dyn ResultCache>,
        gateway: Arc<dyn GenerationGateway>,
    ) -> Self {
        Self {
            store,
            cache,
            gateway,
            generation_timeout: None,
        }
    }

    /// Bound the gateway call. A timeout is treated like any other generation failure.
    pub fn with_generation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Drive one task to a terminal state and return that state.
    ///
    /// Generation failures are absorbed (the task ends FAILED and this returns `Ok`).
    /// `Err` means the run could not proceed: unknown id, task not PENDING, or a store
    /// write failed.
    #[tracing::instrument(name = "process_report", skip_all, fields(report_id = %id))]
    pub async fn process(&self, id: ReportId) -> Result<TaskStatus, QuillError> {
        let mut task = match self.store.get(id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                error!("dispatched report has no stored record");
                return Err(QuillError::NotFound(id));
            }
            Err(e) => {
                error!(error = %e, "failed to load report");
                return Err(e.into());
            }
        };

        if let Err(e) = task.start_processing() {
            warn!(status = %task.status, "report is not pending; refusing to process it again");
            return Err(e);
        }
        self.persist(&task).await?;
        info!("report processing started");

        let generated = self
            .generate(&task.user_input)
            .await
            .and_then(|doc| doc.to_payload());
        let completed = match generated {
            Ok(payload) => task.complete(payload),
            Err(e) => Err(QuillError::Generation(e)),
        };
        if let Err(e) = completed {
            error!(error = %e, "report generation failed");
            task.fail()?;
        }

        self.persist(&task).await?;
        info!(status = %task.status, "report processing finished");
        Ok(task.status)
    }

    async fn generate(&self, user_input: &str) -> Result<ReportDocument, GenerationError> {
        match self.generation_timeout {
            Some(limit) => tokio::time::timeout(limit, self.gateway.generate(user_input))
                .await
                .map_err(|_| GenerationError::Timeout(limit))?,
            None => self.gateway.generate(user_input).await,
        }
    }

    /// Store first, then cache: the cache never shows a state the store does not hold.
    async fn persist(&self, task: &ReportTask) -> Result<(), QuillError> {
        let saved = self.store.update(task).await.map_err(|e| {
            error!(
                status = %task.status,
                error = %e,
                "failed to persist transition; report stays at its last saved state"
            );
            e
        })?;
        self.cache.put(saved.id, ReportSnapshot::from(&saved)).await;
        Ok(())
    }
}
