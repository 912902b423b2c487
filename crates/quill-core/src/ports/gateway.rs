//! GenerationGateway port - LLM 呼び出しの抽象化
//!
//! TaskProcessor から見ると「遅い 1 回の呼び出し」でしかありません。
//! プロンプト組み立て・HTTP・出力の構造化はすべて実装側の責務です。
//!
//! # 実装
//! - `impls::OpenAiGateway`（本番用）
//! - `impls::ScriptedGateway`（テスト・オフライン用）

use async_trait::async_trait;

use crate::domain::{GenerationError, ReportDocument};

#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate(&self, user_input: &str) -> Result<ReportDocument, GenerationError>;
}
