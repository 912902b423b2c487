//! Report payload produced by the generation gateway.
//!
//! LLM の生出力はそのまま信用できないので、ここで構造化します。
//! 方針は「フォールバック優先」：
//! - JSON として読めて `summary` が空でなければそのまま採用
//! - 読めなければ生テキストを `summary` に包んだ文書を返す
//! - テキストが一切無い場合だけ `GenerationError::EmptyOutput`

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::errors::GenerationError;

/// Structured analysis report. `summary` is the only required field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub summary: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_points: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
}

impl ReportDocument {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            key_points: Vec::new(),
            confidence_score: None,
        }
    }

    pub fn with_key_points(mut self, key_points: Vec<String>) -> Self {
        self.key_points = key_points;
        self
    }

    pub fn with_confidence(mut self, score: f64) -> Self {
        self.confidence_score = Some(score);
        self
    }

    /// Turn raw model output into a report, falling back to the raw text as summary.
    pub fn from_llm_output(raw: &str) -> Result<Self, GenerationError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyOutput);
        }

        if let Some(candidate) = extract_json(text) {
            match serde_json::from_str::<ReportDocument>(candidate) {
                Ok(doc) if !doc.summary.trim().is_empty() => return Ok(doc),
                Ok(_) => warn!("model output has an empty summary; using raw text"),
                Err(e) => {
                    warn!(error = %e, "model output is not a report document; using raw text")
                }
            }
        } else {
            warn!("model output contains no JSON object; using raw text");
        }

        Ok(Self::new(text))
    }

    /// Serialize into the opaque `report_result` string stored on the task.
    pub fn to_payload(&self) -> Result<String, GenerationError> {
        serde_json::to_string(self).map_err(|e| GenerationError::Format(e.to_string()))
    }
}

/// Locate the JSON object inside model output that may be wrapped in markdown fences
/// or surrounded by prose.
fn extract_json(text: &str) -> Option<&str> {
    let body = match text.find("```") {
        Some(open) => {
            let after = &text[open + 3..];
            // "```json\n{...}\n```" -> skip the language tag line
            let after = after.find('\n').map_or(after, |nl| &after[nl + 1..]);
            after.find("```").map_or(after, |close| &after[..close])
        }
        None => text,
    };

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_full_document() {
        let raw = r#"{"summary":"fine","key_points":["a","b"],"confidence_score":0.75}"#;
        let doc = ReportDocument::from_llm_output(raw).unwrap();

        assert_eq!(doc.summary, "fine");
        assert_eq!(doc.key_points, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(doc.confidence_score, Some(0.75));
    }

    #[rstest]
    #[case("```json\n{\"summary\":\"fenced\"}\n```")]
    #[case("```\n{\"summary\":\"fenced\"}\n```")]
    #[case("Here is the report: {\"summary\":\"fenced\"} hope it helps")]
    fn extracts_wrapped_json(#[case] raw: &str) {
        let doc = ReportDocument::from_llm_output(raw).unwrap();
        assert_eq!(doc.summary, "fenced");
    }

    #[rstest]
    #[case("just some prose")]
    #[case("{not json at all}")]
    #[case(r#"{"key_points":["no summary"]}"#)]
    #[case(r#"{"summary":"   "}"#)]
    fn falls_back_to_raw_text(#[case] raw: &str) {
        let doc = ReportDocument::from_llm_output(raw).unwrap();
        assert_eq!(doc.summary, raw.trim());
        assert!(doc.key_points.is_empty());
        assert_eq!(doc.confidence_score, None);
    }

    #[rstest]
    #[case("")]
    #[case("   \n\t ")]
    fn empty_output_is_an_error(#[case] raw: &str) {
        assert!(matches!(
            ReportDocument::from_llm_output(raw),
            Err(GenerationError::EmptyOutput)
        ));
    }

    #[test]
    fn payload_omits_absent_optional_fields() {
        let payload = ReportDocument::new("ok").to_payload().unwrap();
        assert_eq!(payload, r#"{"summary":"ok"}"#);
    }

    #[test]
    fn payload_keeps_present_fields() {
        let payload = ReportDocument::new("ok")
            .with_key_points(vec!["one".into()])
            .with_confidence(0.5)
            .to_payload()
            .unwrap();
        assert_eq!(
            payload,
            r#"{"summary":"ok","key_points":["one"],"confidence_score":0.5}"#
        );
    }
}
