//! Hosted LLM tutor client (Groq chat completions)
//!
//! The model is instructed to return a strict JSON object with an
//! `explanation` string and a `confidence` integer. Models drift, so the
//! response goes through a recovery ladder before we give up on JSON:
//! direct parse, then first brace-delimited substring with trailing-comma
//! repair, then the raw text as the explanation at reduced confidence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::AtheneumError;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Confidence assigned when the response is unparseable prose
const FALLBACK_CONFIDENCE: i32 = 50;

/// Parsed tutor answer
#[derive(Debug, Clone, PartialEq)]
pub struct TutorAnswer {
    pub explanation: String,
    /// 0-100
    pub confidence: i32,
}

/// Seam over the hosted LLM, mockable in tests
#[async_trait]
pub trait DoubtTutor: Send + Sync {
    /// Answer a question given assembled context. Failures propagate:
    /// there is no retry or backoff here.
    async fn answer(&self, query: &str, context: &str) -> Result<TutorAnswer, AtheneumError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Groq-backed tutor
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, AtheneumError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AtheneumError::Llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn system_prompt(context: &str) -> String {
        format!(
            "You are a patient tutor answering a student's question about their course material.\n\
             Respond with a single JSON object and nothing else, in this exact shape:\n\
             {{\"explanation\": \"<your full answer in markdown>\", \"confidence\": <integer 0-100>}}\n\
             The confidence is your own estimate of how certain the answer is.\n\
             Do not wrap the JSON in code fences or add any prose around it.\n\n\
             Course material context:\n{}",
            context
        )
    }
}

#[async_trait]
impl DoubtTutor for LlmClient {
    async fn answer(&self, query: &str, context: &str) -> Result<TutorAnswer, AtheneumError> {
        let system = Self::system_prompt(context);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: query,
                },
            ],
            temperature: 0.6,
            max_tokens: 2048,
        };

        let response = self
            .http
            .post(GROQ_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AtheneumError::Llm(format!("LLM call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AtheneumError::Llm(format!("LLM returned {}", status)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AtheneumError::Llm(format!("Invalid LLM response: {}", e)))?;

        let raw = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AtheneumError::Llm("LLM returned no choices".into()))?;

        debug!(bytes = raw.len(), "LLM response received");
        Ok(parse_tutor_response(&raw))
    }
}

/// Shape the model is asked to produce
#[derive(Debug, Deserialize)]
struct RawAnswer {
    explanation: String,
    confidence: serde_json::Value,
}

/// Parse the model output, recovering from common JSON slop.
/// Never fails: the worst case is the raw text at reduced confidence.
pub fn parse_tutor_response(raw: &str) -> TutorAnswer {
    // 1. Direct parse
    if let Ok(answer) = serde_json::from_str::<RawAnswer>(raw.trim()) {
        return TutorAnswer {
            explanation: answer.explanation,
            confidence: normalize_confidence(&answer.confidence),
        };
    }

    // 2. First brace-delimited substring, with trailing commas repaired
    if let Some(candidate) = extract_json_object(raw) {
        let repaired = repair_trailing_commas(&candidate);
        if let Ok(answer) = serde_json::from_str::<RawAnswer>(&repaired) {
            return TutorAnswer {
                explanation: answer.explanation,
                confidence: normalize_confidence(&answer.confidence),
            };
        }
    }

    // 3. Treat the whole response as the explanation
    warn!("LLM response was not valid JSON, degrading to raw text");
    TutorAnswer {
        explanation: raw.trim().to_string(),
        confidence: FALLBACK_CONFIDENCE,
    }
}

/// Extract the first `{...}` substring, spanning to the last closing brace
fn extract_json_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(raw[start..=end].to_string())
}

/// Remove trailing commas before a closing brace or bracket
fn repair_trailing_commas(json: &str) -> String {
    // Good enough for model slop; string contents with ",}" would be
    // mangled, but that case already failed the strict parse above.
    let mut out = String::with_capacity(json.len());
    let chars: Vec<char> = json.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        if ch == ',' {
            let next_meaningful = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next_meaningful, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Normalize a confidence value to an integer in [0, 100].
/// Values on a 0-1 scale are rescaled.
fn normalize_confidence(value: &serde_json::Value) -> i32 {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    let scaled = if number > 0.0 && number <= 1.0 {
        number * 100.0
    } else {
        number
    };

    scaled.round().clamp(0.0, 100.0) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_strict_json() {
        let answer =
            parse_tutor_response(r#"{"explanation": "A stack is LIFO.", "confidence": 92}"#);
        assert_eq!(answer.explanation, "A stack is LIFO.");
        assert_eq!(answer.confidence, 92);
    }

    #[test]
    fn recovers_json_wrapped_in_prose() {
        let raw = "Sure! Here is the answer:\n{\"explanation\": \"Use a queue.\", \"confidence\": 88}\nHope that helps.";
        let answer = parse_tutor_response(raw);
        assert_eq!(answer.explanation, "Use a queue.");
        assert_eq!(answer.confidence, 88);
    }

    #[test]
    fn recovers_trailing_comma() {
        let raw = r#"{"explanation": "Recursion calls itself.", "confidence": 85,}"#;
        let answer = parse_tutor_response(raw);
        assert_eq!(answer.explanation, "Recursion calls itself.");
        assert_eq!(answer.confidence, 85);
    }

    #[test]
    fn degrades_to_raw_text() {
        let raw = "A stack is a LIFO data structure used everywhere.";
        let answer = parse_tutor_response(raw);
        assert_eq!(answer.explanation, raw);
        assert_eq!(answer.confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn missing_closing_brace_degrades_with_bounded_confidence() {
        let raw = r#"{"explanation": "partial answer", "confidence": 90"#;
        let answer = parse_tutor_response(raw);
        assert!(!answer.explanation.is_empty());
        assert!((0..=100).contains(&answer.confidence));
    }

    #[test]
    fn rescales_unit_interval_confidence() {
        assert_eq!(normalize_confidence(&json!(0.87)), 87);
        assert_eq!(normalize_confidence(&json!(1.0)), 100);
    }

    #[test]
    fn clamps_out_of_range_confidence() {
        assert_eq!(normalize_confidence(&json!(140)), 100);
        assert_eq!(normalize_confidence(&json!(-5)), 0);
    }

    #[test]
    fn accepts_string_confidence() {
        assert_eq!(normalize_confidence(&json!("92")), 92);
        assert_eq!(normalize_confidence(&json!("0.5")), 50);
    }

    #[test]
    fn repair_leaves_valid_json_alone() {
        let json = r#"{"a": [1, 2, 3], "b": "x, y"}"#;
        assert_eq!(repair_trailing_commas(json), json);
    }

    #[test]
    fn repair_strips_trailing_commas_in_arrays() {
        let json = r#"{"a": [1, 2, ], "confidence": 80, }"#;
        let repaired = repair_trailing_commas(json);
        assert!(serde_json::from_str::<serde_json::Value>(&repaired).is_ok());
    }
}
