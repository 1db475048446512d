//! Lightweight local extraction for text-like artifacts
//!
//! Code files, plain documents and anything else the ML service does not
//! handle get a cheap in-process pass: fetch the raw text, take a head
//! excerpt as the summary, and surface the most frequent identifiers as
//! keywords. No topics are inferred locally.

use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

use crate::services::ml::MlExtraction;
use crate::types::AtheneumError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Max bytes of fetched text kept as extracted text
const MAX_TEXT_BYTES: usize = 200_000;

/// Length of the head excerpt used as the summary
const SUMMARY_CHARS: usize = 500;

/// Number of keywords reported
const KEYWORD_COUNT: usize = 10;

/// Words too common to be useful keywords
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "from", "are", "was", "were", "have", "has",
    "not", "but", "can", "will", "into", "out", "all", "its", "their", "they", "you", "your",
    "let", "const", "var", "function", "return", "import", "export", "def", "class", "pub",
    "use", "mod", "impl", "self", "true", "false", "null", "none", "void", "int", "string",
];

/// In-process extractor for `Code`/`Document`/`Other` content
#[derive(Clone)]
pub struct LocalExtractor {
    http: reqwest::Client,
}

impl LocalExtractor {
    pub fn new() -> Result<Self, AtheneumError> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AtheneumError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// Fetch the artifact and derive summary/keywords from its text
    pub async fn extract(&self, file_url: &str) -> Result<MlExtraction, AtheneumError> {
        info!(url = file_url, "Running local text extraction");

        let response = self
            .http
            .get(file_url)
            .send()
            .await
            .map_err(|e| AtheneumError::Ml(format!("Failed to fetch file: {}", e)))?;

        if !response.status().is_success() {
            return Err(AtheneumError::Ml(format!(
                "File fetch returned {}",
                response.status()
            )));
        }

        let mut text = response
            .text()
            .await
            .map_err(|e| AtheneumError::Ml(format!("Failed to read file body: {}", e)))?;
        truncate_on_char_boundary(&mut text, MAX_TEXT_BYTES);

        Ok(extract_from_text(&text))
    }
}

/// Derive an extraction result from raw text. Pure, used directly by tests.
pub fn extract_from_text(text: &str) -> MlExtraction {
    MlExtraction {
        summary: head_excerpt(text, SUMMARY_CHARS),
        keywords: top_keywords(text, KEYWORD_COUNT),
        text: text.to_string(),
        ..Default::default()
    }
}

/// First `max_chars` characters, trimmed, collapsed to single spaces
fn head_excerpt(text: &str, max_chars: usize) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}

/// Most frequent words of length >= 4 that are not stopwords
fn top_keywords(text: &str, count: usize) -> Vec<String> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for token in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let word = token.trim_matches('_').to_lowercase();
        if word.len() < 4 || STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        *freq.entry(word).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    // Alphabetical tie-break keeps the output deterministic
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(count).map(|(w, _)| w).collect()
}

fn truncate_on_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_head_excerpt() {
        let text = "First   sentence.\n\nSecond sentence here.";
        let result = extract_from_text(text);
        assert_eq!(result.summary, "First sentence. Second sentence here.");
        assert_eq!(result.text, text);
    }

    #[test]
    fn summary_respects_char_cap() {
        let text = "word ".repeat(500);
        let result = extract_from_text(&text);
        assert!(result.summary.chars().count() <= 500);
    }

    #[test]
    fn keywords_rank_by_frequency() {
        let text = "binary search tree binary search binary heap heap";
        let keywords = top_keywords(text, 3);
        assert_eq!(keywords[0], "binary");
        assert_eq!(keywords[1], "search");
        assert_eq!(keywords[2], "heap");
    }

    #[test]
    fn keywords_skip_stopwords_and_short_words(){
        let text = "the fn and for impl recursion recursion is it";
        let keywords = top_keywords(text, 5);
        assert_eq!(keywords, vec!["recursion"]);
    }

    #[test]
    fn truncation_lands_on_char_boundary() {
        let mut s = "héllo wörld".repeat(100);
        truncate_on_char_boundary(&mut s, 37);
        assert!(s.len() <= 37);
        assert!(s.is_char_boundary(s.len()));
    }

    #[test]
    fn no_topics_from_local_extraction() {
        let result = extract_from_text("some code here");
        assert!(result.topics.is_empty());
    }
}
