//! quill-core
//!
//! Core building blocks for the Quill report service.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, task, snapshot, report, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, ResultCache, GenerationGateway, Clock）
//! - **impls**: 実装（SQLite / インメモリのストア、TTL キャッシュ、OpenAI / スクリプトのゲートウェイ）
//! - **app**: アプリケーションロジック（builder, orchestrator, dispatcher, processor）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{AppBuilder, BuildError, Orchestrator, RecoveryReport, StatusCounts};
pub use domain::{QuillError, ReportId, ReportSnapshot, TaskStatus};
