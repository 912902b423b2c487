//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;
use std::time::Duration;

use crate::app::dispatcher::Dispatcher;
use crate::app::orchestrator::Orchestrator;
use crate::app::processor::TaskProcessor;
use crate::impls::TtlResultCache;
use crate::ports::{
    Clock, DEFAULT_CACHE_TTL, GenerationGateway, ResultCache, SystemClock, TaskStore,
};

/// AppBuilder は Orchestrator を組み立てる
///
/// # 使用例
/// ```ignore
/// let orchestrator = AppBuilder::new()
///     .task_store(Arc::new(SqliteTaskStore::open("quill.db")?))
///     .gateway(Arc::new(OpenAiGateway::new(OpenAiConfig::from_env())?))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - TaskStore と GenerationGateway は必須（既定値を持たない）
/// - ResultCache 未指定なら `cache_ttl` の TtlResultCache、Clock 未指定なら SystemClock
/// - ゼロの TTL / タイムアウトは build() 時に BuildError
pub struct AppBuilder {
    store: Option<Arc<dyn TaskStore>>,
    cache: Option<Arc<dyn ResultCache>>,
    gateway: Option<Arc<dyn GenerationGateway>>,
    clock: Option<Arc<dyn Clock>>,
    cache_ttl: Duration,
    generation_timeout: Option<Duration>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing component: {0}. It has no default and must be provided.")]
    Missing(&'static str),

    #[error("invalid setting: {0}")]
    Invalid(&'static str),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            cache: None,
            gateway: None,
            clock: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            generation_timeout: None,
        }
    }

    pub fn task_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this cache instead of the default TTL cache. `cache_ttl` is then ignored.
    pub fn result_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn GenerationGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn generation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// 検証してから Orchestrator を生成
    pub fn build(self) -> Result<Orchestrator, BuildError> {
        let store = self.store.ok_or(BuildError::Missing("task_store"))?;
        let gateway = self.gateway.ok_or(BuildError::Missing("gateway"))?;
        if self.generation_timeout == Some(Duration::ZERO) {
            return Err(BuildError::Invalid("generation_timeout must be greater than zero"));
        }
        let cache: Arc<dyn ResultCache> = match self.cache {
            Some(cache) => cache,
            None if self.cache_ttl.is_zero() => {
                return Err(BuildError::Invalid("cache_ttl must be greater than zero"));
            }
            None => Arc::new(TtlResultCache::new(self.cache_ttl)),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let processor = TaskProcessor::new(Arc::clone(&store), Arc::clone(&cache), gateway)
            .with_generation_timeout(self.generation_timeout);
        let dispatcher = Dispatcher::new(Arc::new(processor));

        Ok(Orchestrator::new(store, cache, clock, dispatcher))
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReportDocument;
    use crate::impls::{InMemoryTaskStore, ScriptedGateway};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn complete() -> AppBuilder {
        AppBuilder::new()
            .task_store(Arc::new(InMemoryTaskStore::new()))
            .gateway(Arc::new(ScriptedGateway::ok(ReportDocument::new("ok"))))
    }

    #[test]
    fn test_build_success() {
        assert!(complete().build().is_ok());
    }

    #[test]
    fn test_build_missing_store() {
        let built = AppBuilder::new()
            .gateway(Arc::new(ScriptedGateway::echo()))
            .build();
        assert!(matches!(built, Err(BuildError::Missing("task_store"))));
    }

    #[test]
    fn test_build_missing_gateway() {
        let built = AppBuilder::new()
            .task_store(Arc::new(InMemoryTaskStore::new()))
            .build();
        assert!(matches!(built, Err(BuildError::Missing("gateway"))));
    }

    #[test]
    fn test_build_rejects_zero_durations() {
        assert!(matches!(
            complete().cache_ttl(Duration::ZERO).build(),
            Err(BuildError::Invalid(_))
        ));
        assert!(matches!(
            complete().generation_timeout(Some(Duration::ZERO)).build(),
            Err(BuildError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_clock_stamps_created_at() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let orch = complete().clock(Arc::new(FixedClock::new(at))).build().unwrap();

        let snapshot = orch.submit("hello").await.unwrap();
        assert_eq!(snapshot.created_at, at);
        orch.wait_idle().await;
    }
}
