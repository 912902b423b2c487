//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **Orchestrator**: submit / get_status / list_all の入口
//! - **Dispatcher**: バックグラウンド実行と in-flight 管理
//! - **TaskProcessor**: 1 タスクを PENDING から終端状態まで進める
//! - **StatusCounts**: ステータス別件数

pub mod builder;
pub mod dispatcher;
pub mod orchestrator;
pub mod processor;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{AppBuilder, BuildError};
pub use self::dispatcher::Dispatcher;
pub use self::orchestrator::Orchestrator;
pub use self::processor::TaskProcessor;
pub use self::status::{RecoveryReport, StatusCounts};
