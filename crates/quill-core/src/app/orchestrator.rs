//! Orchestrator - 外部から見える唯一の入口
//!
//! # 操作
//! - **submit**: PENDING で保存 → キャッシュ → バックグラウンド実行を開始 → 即座に返す
//! - **get_status**: キャッシュ優先、ミス時は TaskStore から読んでキャッシュを埋める
//! - **list_all**: TaskStore の全件（キャッシュは使わない）
//!
//! # 追加の運用操作
//! - **counts**: ステータス別件数（/health 用）
//! - **recover**: 前回プロセスが残した PENDING / PROCESSING の後始末
//! - **shutdown**: 新規 dispatch を止め、実行中のものを待つ

use std::sync::Arc;

use tracing::{info, warn};

use crate::app::dispatcher::Dispatcher;
use crate::app::status::{RecoveryReport, StatusCounts};
use crate::domain::{NewReportTask, QuillError, ReportId, ReportSnapshot, TaskStatus};
use crate::ports::{Clock, ResultCache, TaskStore};

pub struct Orchestrator {
    store: Arc<dyn TaskStore>,
    cache: Arc<dyn ResultCache>,
    clock: Arc<dyn Clock>,
    dispatcher: Dispatcher,
}

impl Orchestrator {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        cache: Arc<dyn ResultCache>,
        clock: Arc<dyn Clock>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            dispatcher,
        }
    }

    /// Accept a request and return its PENDING snapshot without waiting for generation.
    pub async fn submit(
        &self,
        user_input: impl Into<String>,
    ) -> Result<ReportSnapshot, QuillError> {
        let user_input = user_input.into();
        if user_input.trim().is_empty() {
            return Err(QuillError::InvalidInput("user input must not be blank".to_string()));
        }

        let task = self
            .store
            .create(NewReportTask::new(user_input, self.clock.now()))
            .await?;
        let snapshot = ReportSnapshot::from(&task);
        self.cache.put(task.id, snapshot.clone()).await;

        info!(report_id = %task.id, "report submitted");
        self.dispatcher.dispatch(task.id);
        Ok(snapshot)
    }

    pub async fn get_status(&self, id: ReportId) -> Result<ReportSnapshot, QuillError> {
        if let Some(snapshot) = self.cache.get(id).await {
            return Ok(snapshot);
        }

        let task = self.store.get(id).await?.ok_or(QuillError::NotFound(id))?;
        let snapshot = ReportSnapshot::from(task);
        self.cache.fill(id, snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Every task in the store, ordered by id.
    pub async fn list_all(&self) -> Result<Vec<ReportSnapshot>, QuillError> {
        let tasks = self.store.list_all().await?;
        Ok(tasks.into_iter().map(ReportSnapshot::from).collect())
    }

    pub async fn counts(&self) -> Result<StatusCounts, QuillError> {
        let tasks = self.store.list_all().await?;
        Ok(StatusCounts::tally(tasks.iter().map(|task| task.status)))
    }

    /// Clean up after a previous process.
    ///
    /// PROCESSING tasks have lost their worker and are marked FAILED. PENDING tasks
    /// never started and are dispatched again. Tasks already running here are skipped.
    pub async fn recover(&self) -> Result<RecoveryReport, QuillError> {
        let mut report = RecoveryReport::default();

        for mut task in self.store.list_all().await? {
            if self.dispatcher.is_in_flight(task.id) {
                continue;
            }
            match task.status {
                TaskStatus::Processing => {
                    task.fail()?;
                    let saved = self.store.update(&task).await?;
                    self.cache.put(saved.id, ReportSnapshot::from(&saved)).await;
                    warn!(report_id = %saved.id, "interrupted report marked failed");
                    report.failed += 1;
                }
                TaskStatus::Pending => {
                    if self.dispatcher.dispatch(task.id) {
                        report.redispatched += 1;
                    }
                }
                TaskStatus::Completed | TaskStatus::Failed => {}
            }
        }

        if report != RecoveryReport::default() {
            info!(failed = report.failed, redispatched = report.redispatched, "recovery finished");
        }
        Ok(report)
    }

    /// Wait until every dispatched report has finished.
    pub async fn wait_idle(&self) {
        self.dispatcher.wait_idle().await;
    }

    pub async fn shutdown(&self) {
        let running = self.dispatcher.in_flight_count();
        if running > 0 {
            info!(running, "waiting for in-flight reports");
        }
        self.dispatcher.shutdown().await;
    }
}
