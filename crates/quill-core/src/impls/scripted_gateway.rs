//! ScriptedGateway - 決定的な GenerationGateway
//!
//! テストと `--offline` 実行用。LLM を呼ばずに、決められた応答（または失敗）を返します。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{GenerationError, ReportDocument};
use crate::ports::GenerationGateway;

#[derive(Debug, Clone)]
enum Script {
    /// Always return this document.
    Document(ReportDocument),
    /// Pretend the model printed this text; goes through the normal output parser.
    Raw(String),
    /// Summarise by echoing the input back.
    Echo,
    /// Always fail with a provider error carrying this message.
    Fail(String),
}

pub struct ScriptedGateway {
    script: Script,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ok(document: ReportDocument) -> Self {
        Self::with_script(Script::Document(document))
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self::with_script(Script::Raw(text.into()))
    }

    pub fn echo() -> Self {
        Self::with_script(Script::Echo)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(Script::Fail(message.into()))
    }

    /// Sleep before answering, to stand in for model latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `generate` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationGateway for ScriptedGateway {
    async fn generate(&self, user_input: &str) -> Result<ReportDocument, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.script {
            Script::Document(doc) => Ok(doc.clone()),
            Script::Raw(text) => ReportDocument::from_llm_output(text),
            Script::Echo => {
                let summary: String = user_input.trim().chars().take(280).collect();
                ReportDocument::from_llm_output(&summary).map(|doc| ReportDocument {
                    confidence_score: Some(0.0),
                    ..doc
                })
            }
            Script::Fail(message) => Err(GenerationError::Provider {
                status: 500,
                body: message.clone(),
            }),
        }
    }
}
