//! TtlResultCache - TTL 付きのインメモリ ResultCache
//!
//! # 実装詳細
//! - HashMap<ReportId, CacheEntry> を tokio Mutex で保護
//! - 失効判定は読み出し時に行う（失効済みエントリは get から見えない）
//! - 実メモリの回収は `purge_expired` / `spawn_sweeper` で行う

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::{ReportId, ReportSnapshot};
use crate::ports::{DEFAULT_CACHE_TTL, ResultCache};

#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: ReportSnapshot,
    written_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.written_at) < ttl
    }
}

pub struct TtlResultCache {
    entries: Mutex<HashMap<ReportId, CacheEntry>>,
    ttl: Duration,
}

impl TtlResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now, self.ttl));
        before - entries.len()
    }

    /// Periodically purge expired entries until `shutdown` flips to `true`
    /// (or its sender is dropped).
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let purged = self.purge_expired().await;
                        if purged > 0 {
                            debug!(purged, "expired cache entries removed");
                        }
                    }
                }
            }
        })
    }
}

impl Default for TtlResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

#[async_trait]
impl ResultCache for TtlResultCache {
    async fn get(&self, id: ReportId) -> Option<ReportSnapshot> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries
            .get(&id)
            .filter(|entry| entry.is_live(now, self.ttl))
            .map(|entry| entry.snapshot.clone())
    }

    async fn put(&self, id: ReportId, snapshot: ReportSnapshot) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            id,
            CacheEntry {
                snapshot,
                written_at: Instant::now(),
            },
        );
    }

    async fn fill(&self, id: ReportId, snapshot: ReportSnapshot) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(&id)
            && existing.is_live(now, self.ttl)
            && existing.snapshot.status.rank() > snapshot.status.rank()
        {
            // 遷移側の put が先に入っている。古い読み取り結果で潰さない
            debug!(
                report_id = %id,
                cached = %existing.snapshot.status,
                read = %snapshot.status,
                "skip stale cache fill"
            );
            return;
        }
        entries.insert(
            id,
            CacheEntry {
                snapshot,
                written_at: now,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use chrono::Utc;

    fn snapshot(id: u64, status: TaskStatus) -> ReportSnapshot {
        ReportSnapshot {
            id: ReportId::new(id),
            status,
            report_result: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_then_get() {
        let cache = TtlResultCache::default();
        let snap = snapshot(1, TaskStatus::Pending);
        cache.put(snap.id, snap.clone()).await;
        assert_eq!(cache.get(snap.id).await, Some(snap));
    }

    #[tokio::test]
    async fn miss_for_unknown_id() {
        let cache = TtlResultCache::default();
        assert_eq!(cache.get(ReportId::new(9)).await, None);
    }

    #[tokio::test]
    async fn put_is_last_write_wins() {
        let cache = TtlResultCache::default();
        let id = ReportId::new(1);
        cache.put(id, snapshot(1, TaskStatus::Processing)).await;
        cache.put(id, snapshot(1, TaskStatus::Failed)).await;
        assert_eq!(cache.get(id).await.unwrap().status, TaskStatus::Failed);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn fill_does_not_overwrite_newer_transition() {
        let cache = TtlResultCache::default();
        let id = ReportId::new(1);
        cache.put(id, snapshot(1, TaskStatus::Completed)).await;
        cache.fill(id, snapshot(1, TaskStatus::Pending)).await;
        assert_eq!(cache.get(id).await.unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn fill_populates_empty_slot() {
        let cache = TtlResultCache::default();
        let id = ReportId::new(2);
        cache.fill(id, snapshot(2, TaskStatus::Processing)).await;
        assert_eq!(cache.get(id).await.unwrap().status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = TtlResultCache::new(Duration::from_millis(50));
        let id = ReportId::new(1);
        cache.put(id, snapshot(1, TaskStatus::Pending)).await;
        assert!(cache.get(id).await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get(id).await.is_none());
        assert_eq!(cache.len().await, 1);

        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn fill_replaces_expired_newer_entry() {
        let cache = TtlResultCache::new(Duration::from_millis(30));
        let id = ReportId::new(1);
        cache.put(id, snapshot(1, TaskStatus::Completed)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        cache.fill(id, snapshot(1, TaskStatus::Processing)).await;
        assert_eq!(cache.get(id).await.unwrap().status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn sweeper_purges_and_stops_on_shutdown() {
        let cache = Arc::new(TtlResultCache::new(Duration::from_millis(20)));
        cache.put(ReportId::new(1), snapshot(1, TaskStatus::Pending)).await;

        let (tx, rx) = watch::channel(false);
        let sweeper = Arc::clone(&cache).spawn_sweeper(Duration::from_millis(10), rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.is_empty().await);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn sweeper_stops_when_sender_is_dropped() {
        let cache = Arc::new(TtlResultCache::default());
        let (tx, rx) = watch::channel(false);
        let sweeper = Arc::clone(&cache).spawn_sweeper(Duration::from_millis(10), rx);

        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .unwrap()
            .unwrap();
    }
}
