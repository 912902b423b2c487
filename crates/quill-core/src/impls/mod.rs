//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: 揮発性の正本（テスト用）
//! - **SqliteTaskStore**: 永続化された正本
//! - **TtlResultCache**: TTL 付きのインメモリキャッシュ
//! - **OpenAiGateway**: OpenAI Responses API
//! - **ScriptedGateway**: 決定的な応答を返すテスト用ゲートウェイ

pub mod inmem_store;
pub mod openai_gateway;
pub mod scripted_gateway;
pub mod sqlite_store;
pub mod ttl_cache;

// 主要な型を再エクスポート
pub use self::inmem_store::InMemoryTaskStore;
pub use self::openai_gateway::{OpenAiConfig, OpenAiGateway};
pub use self::scripted_gateway::ScriptedGateway;
pub use self::sqlite_store::SqliteTaskStore;
pub use self::ttl_cache::TtlResultCache;
