//! SqliteTaskStore - SQLite による永続 TaskStore
//!
//! # 学習ポイント
//! - rusqlite は同期 API なので `spawn_blocking` で async から呼ぶ
//! - Connection は `Mutex` で 1 本を共有（書き込みは直列化される）
//! - update は「読む→検証→書く」を 1 トランザクション内で行う

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::domain::{NewReportTask, ReportId, ReportTask, StoreError, TaskStatus};
use crate::ports::TaskStore;
use crate::ports::task_store::check_update;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS report_tasks (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_input    TEXT NOT NULL,
    status        TEXT NOT NULL,
    report_result TEXT NOT NULL DEFAULT '',
    created_at    TEXT NOT NULL
);";

const SELECT_COLUMNS: &str =
    "SELECT id, user_input, status, report_result, created_at FROM report_tasks";

type RawRow = (i64, String, String, String, String);

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(Box::new(e))
    }
}

/// SQLite-backed task store. Survives process restarts when opened on a file.
pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_task(
    (id, user_input, status, report_result, created_at): RawRow,
) -> Result<ReportTask, StoreError> {
    let id = u64::try_from(id).map_err(|_| StoreError::Corrupt(format!("negative id {id}")))?;
    let status = status
        .parse::<TaskStatus>()
        .map_err(|e| StoreError::Corrupt(format!("report {id}: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| {
            StoreError::Corrupt(format!("report {id}: bad created_at {created_at:?}: {e}"))
        })?
        .with_timezone(&Utc);

    Ok(ReportTask {
        id: ReportId::new(id),
        user_input,
        status,
        report_result,
        created_at,
    })
}

fn fetch(conn: &Connection, id: ReportId) -> Result<Option<ReportTask>, StoreError> {
    let raw = conn
        .query_row(
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            params![id.get() as i64],
            read_row,
        )
        .optional()?;
    raw.map(into_task).transpose()
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create(&self, task: NewReportTask) -> Result<ReportTask, StoreError> {
        self.with_conn(move |conn| {
            let created_at = task.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true);
            conn.execute(
                "INSERT INTO report_tasks (user_input, status, report_result, created_at)
                 VALUES (?1, ?2, '', ?3)",
                params![task.user_input, TaskStatus::Pending.as_str(), created_at],
            )?;
            let id = u64::try_from(conn.last_insert_rowid())
                .map_err(|_| StoreError::Corrupt("negative rowid".to_string()))?;
            Ok(task.into_task(ReportId::new(id)))
        })
        .await
    }

    async fn get(&self, id: ReportId) -> Result<Option<ReportTask>, StoreError> {
        self.with_conn(move |conn| fetch(conn, id)).await
    }

    async fn update(&self, task: &ReportTask) -> Result<ReportTask, StoreError> {
        let next = task.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut stored = fetch(&tx, next.id)?.ok_or(StoreError::Missing(next.id))?;
            check_update(&stored, &next)?;

            tx.execute(
                "UPDATE report_tasks SET status = ?1, report_result = ?2 WHERE id = ?3",
                params![next.status.as_str(), next.report_result, next.id.get() as i64],
            )?;
            tx.commit()?;

            stored.status = next.status;
            stored.report_result = next.report_result;
            Ok(stored)
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<ReportTask>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))?;
            let rows = stmt
                .query_map([], read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(into_task).collect()
        })
        .await
    }
}
