//! ResultCache port - ステータス照会の高速経路
//!
//! # 設計原則
//! - 純粋なアクセラレータ。miss したら TaskStore を読む
//! - キーは ReportId のみ、1 タスク 1 エントリ
//! - エントリは最終書き込みから TTL で失効する（正本の正しさには影響しない）
//!
//! `put` と `fill` を分けているのは、遷移の書き込み（put）と
//! read-through の再投入（fill）が競合したときに、古いスナップショットで
//! 新しい遷移を上書きしないためです。

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ReportId, ReportSnapshot};

/// Default entry time-to-live.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, id: ReportId) -> Option<ReportSnapshot>;

    /// Last-write-wins. Called after every persisted transition.
    async fn put(&self, id: ReportId, snapshot: ReportSnapshot);

    /// Read-through repopulation: only writes when there is no live entry or the live
    /// entry is not further along the lifecycle than `snapshot`.
    async fn fill(&self, id: ReportId, snapshot: ReportSnapshot);
}
