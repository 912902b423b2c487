//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（SQLite, キャッシュ, LLM プロバイダ）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - TaskStore が source of truth（正本）
//! - ResultCache は TTL 付きの写し
//! - GenerationGateway は唯一の長時間 await

pub mod clock;
pub mod gateway;
pub mod result_cache;
pub mod task_store;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::gateway::GenerationGateway;
pub use self::result_cache::{DEFAULT_CACHE_TTL, ResultCache};
pub use self::task_store::TaskStore;
