//! Doubt resolution workflow
//!
//! Every question first consults the verified knowledge store; only a
//! miss reaches the hosted LLM. The answer's confidence drives the rest:
//! below 80 the doubt stays pending and the client is told to offer
//! escalation, at 85 or above the answer is written back to the
//! knowledge store so the next student asking the same thing never
//! touches the LLM. Faculty answers always enter the store at 100.

use bson::{doc, oid::ObjectId, DateTime};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use crate::db::mongo::MongoCollection;
use crate::db::schemas::{ContentDoc, DoubtDoc, DoubtStatus, VisualContext};
use crate::graph::{lookup_key, KnowledgeStore};
use crate::notify::{DoubtAnswered, DoubtEscalated, NatsClient};
use crate::services::{DoubtTutor, YoutubeClient};
use crate::types::{AtheneumError, Result};

/// Minimum confidence for a doubt to auto-resolve
pub const RESOLVE_THRESHOLD: i32 = 80;

/// Minimum confidence for an LLM answer to enter the knowledge store.
/// Deliberately above the resolve cutoff: only answers with headroom
/// become reusable truth.
pub const KNOWLEDGE_WRITE_THRESHOLD: i32 = 85;

/// Confidence recorded for faculty answers
pub const FACULTY_CONFIDENCE: i32 = 100;

/// General-excerpt cap when no timestamp window applies
const MAX_CONTEXT_CHARS: usize = 10_000;

/// Assumed speech rate used to map a timestamp into the transcript
const WORDS_PER_SECOND: f64 = 2.5;

/// Transcript window half-width in seconds
const WINDOW_SECONDS: f64 = 30.0;

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    KnowledgeBase,
    Llm,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnowledgeBase => "knowledge_base",
            Self::Llm => "llm",
        }
    }
}

/// Outcome of the lookup-then-LLM resolution step
#[derive(Debug, Clone)]
pub struct ResolvedAnswer {
    pub answer: String,
    pub confidence: i32,
    pub source: AnswerSource,
    pub needs_escalation: bool,
}

/// Result of the ask flow: the stored doubt plus where the answer came
/// from
#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub doubt: DoubtDoc,
    pub source: AnswerSource,
}

/// Parameters for asking a doubt
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub student_id: ObjectId,
    pub course_id: ObjectId,
    pub content_id: Option<ObjectId>,
    pub query: String,
    pub selected_text: Option<String>,
    pub visual_context: Option<VisualContext>,
}

/// Core resolution: knowledge lookup, then LLM on a miss, then
/// conditional write-through. Lookup errors downgrade to a miss; LLM
/// errors propagate. Pulled out of [`DoubtService`] so it can run
/// against mocked seams.
pub async fn resolve_answer(
    knowledge: &dyn KnowledgeStore,
    tutor: &dyn DoubtTutor,
    query: &str,
    context: &str,
    content_id: Option<&str>,
) -> Result<ResolvedAnswer> {
    let key = lookup_key(query, context);

    match knowledge.lookup(&key, content_id).await {
        Ok(Some(hit)) => {
            info!(confidence = hit.confidence, "Knowledge store hit");
            return Ok(ResolvedAnswer {
                answer: hit.answer,
                confidence: hit.confidence,
                source: AnswerSource::KnowledgeBase,
                needs_escalation: false,
            });
        }
        Ok(None) => {}
        Err(e) => {
            // A dead graph store must not block answering
            warn!("Knowledge lookup failed, treating as miss: {}", e);
        }
    }

    let answer = tutor.answer(query, context).await?;
    let needs_escalation = answer.confidence < RESOLVE_THRESHOLD;

    if answer.confidence >= KNOWLEDGE_WRITE_THRESHOLD {
        if let Err(e) = knowledge
            .save(
                &key,
                query,
                context,
                &answer.explanation,
                answer.confidence,
                content_id,
            )
            .await
        {
            warn!("Knowledge write-through failed: {}", e);
        }
    }

    Ok(ResolvedAnswer {
        answer: answer.explanation,
        confidence: answer.confidence,
        source: AnswerSource::Llm,
        needs_escalation,
    })
}

/// Store a faculty answer in the knowledge graph at full confidence.
/// Failures are logged and swallowed; the stored doubt record is already
/// authoritative.
pub async fn store_faculty_answer(
    knowledge: &dyn KnowledgeStore,
    query: &str,
    context: &str,
    answer: &str,
    content_id: Option<&str>,
) {
    let key = lookup_key(query, context);
    if let Err(e) = knowledge
        .save(&key, query, context, answer, FACULTY_CONFIDENCE, content_id)
        .await
    {
        warn!("Faculty answer write-through failed: {}", e);
    }
}

/// Doubt operations over the stored collections and external seams
#[derive(Clone)]
pub struct DoubtService {
    doubts: MongoCollection<DoubtDoc>,
    contents: MongoCollection<ContentDoc>,
    knowledge: Arc<dyn KnowledgeStore>,
    tutor: Arc<dyn DoubtTutor>,
    youtube: Option<YoutubeClient>,
    nats: Option<NatsClient>,
}

impl DoubtService {
    pub fn new(
        doubts: MongoCollection<DoubtDoc>,
        contents: MongoCollection<ContentDoc>,
        knowledge: Arc<dyn KnowledgeStore>,
        tutor: Arc<dyn DoubtTutor>,
        youtube: Option<YoutubeClient>,
        nats: Option<NatsClient>,
    ) -> Self {
        Self {
            doubts,
            contents,
            knowledge,
            tutor,
            youtube,
            nats,
        }
    }

    /// Run the full ask flow and persist the resulting doubt
    pub async fn ask(&self, request: AskRequest) -> Result<AskOutcome> {
        let content = match request.content_id {
            Some(id) => self.contents.find_by_id(id).await?,
            None => None,
        };

        let context = build_doubt_context(
            content.as_ref(),
            &request.query,
            request.selected_text.as_deref(),
        );

        let content_id_str = request.content_id.map(|id| id.to_hex());
        let resolved = resolve_answer(
            self.knowledge.as_ref(),
            self.tutor.as_ref(),
            &request.query,
            &context,
            content_id_str.as_deref(),
        )
        .await?;

        let status = if resolved.needs_escalation {
            DoubtStatus::Pending
        } else {
            DoubtStatus::Resolved
        };

        let mut doubt = DoubtDoc::new(
            request.student_id,
            request.course_id,
            request.content_id,
            request.query.clone(),
            request.selected_text.clone(),
            context,
            request.visual_context,
            resolved.answer.clone(),
            resolved.confidence,
            status,
        );
        if status == DoubtStatus::Resolved {
            doubt.resolved_at = Some(DateTime::now());
        }

        // Best-effort explainer suggestion; nothing here may fail the ask
        if let Some(youtube) = &self.youtube {
            let topic = request
                .selected_text
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(&request.query);
            doubt.suggested_video = youtube.suggest(topic).await;
        }

        let doubt_id = self.doubts.insert_one(doubt.clone()).await?;
        doubt._id = Some(doubt_id);

        info!(
            doubt_id = %doubt_id.to_hex(),
            confidence = resolved.confidence,
            source = resolved.source.as_str(),
            "Doubt answered"
        );
        Ok(AskOutcome {
            doubt,
            source: resolved.source,
        })
    }

    /// Escalate a doubt to the course faculty
    pub async fn escalate(&self, doubt_id: ObjectId, student_id: ObjectId) -> Result<DoubtDoc> {
        let mut doubt = self
            .doubts
            .find_by_id(doubt_id)
            .await?
            .ok_or_else(|| AtheneumError::NotFound("Doubt not found".into()))?;

        if doubt.student_id != student_id {
            return Err(AtheneumError::Forbidden(
                "Only the asking student can escalate a doubt".into(),
            ));
        }
        if !matches!(doubt.status, DoubtStatus::Pending | DoubtStatus::Resolved) {
            return Err(AtheneumError::Validation(format!(
                "Doubt cannot be escalated from status {:?}",
                doubt.status
            )));
        }

        self.doubts
            .set_by_id(doubt_id, doc! { "status": "escalated" })
            .await?;
        doubt.status = DoubtStatus::Escalated;

        self.publish_escalated(&doubt, doubt_id).await;
        Ok(doubt)
    }

    /// Record a faculty answer on an escalated doubt
    pub async fn answer(
        &self,
        doubt_id: ObjectId,
        faculty_id: ObjectId,
        answer: &str,
        save_to_graph: bool,
    ) -> Result<DoubtDoc> {
        let mut doubt = self
            .doubts
            .find_by_id(doubt_id)
            .await?
            .ok_or_else(|| AtheneumError::NotFound("Doubt not found".into()))?;

        if doubt.status != DoubtStatus::Escalated {
            return Err(AtheneumError::Validation(
                "Only escalated doubts can be answered".into(),
            ));
        }

        let now = DateTime::now();
        self.doubts
            .set_by_id(
                doubt_id,
                doc! {
                    "status": "answered",
                    "faculty_answer": answer,
                    "answered_by": faculty_id,
                    "resolved_at": now,
                },
            )
            .await?;
        doubt.status = DoubtStatus::Answered;
        doubt.faculty_answer = Some(answer.to_string());
        doubt.answered_by = Some(faculty_id);
        doubt.resolved_at = Some(now);

        if save_to_graph {
            let content_id = doubt.content_id.map(|id| id.to_hex());
            store_faculty_answer(
                self.knowledge.as_ref(),
                &doubt.query,
                &doubt.context,
                answer,
                content_id.as_deref(),
            )
            .await;
        }

        self.publish_answered(&doubt, doubt_id, faculty_id, answer).await;
        Ok(doubt)
    }

    async fn publish_escalated(&self, doubt: &DoubtDoc, doubt_id: ObjectId) {
        let Some(nats) = &self.nats else { return };
        let event = DoubtEscalated::new(
            doubt_id.to_hex(),
            doubt.course_id.to_hex(),
            doubt.student_id.to_hex(),
            doubt.query.clone(),
        );
        match event.to_bytes() {
            Ok(bytes) => {
                if let Err(e) = nats.publish(&event.subject(), bytes).await {
                    warn!("Failed to publish escalation event: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode escalation event: {}", e),
        }
    }

    async fn publish_answered(
        &self,
        doubt: &DoubtDoc,
        doubt_id: ObjectId,
        faculty_id: ObjectId,
        answer: &str,
    ) {
        let Some(nats) = &self.nats else { return };
        let event = DoubtAnswered::new(
            doubt_id.to_hex(),
            doubt.student_id.to_hex(),
            faculty_id.to_hex(),
            answer.to_string(),
        );
        match event.to_bytes() {
            Ok(bytes) => {
                if let Err(e) = nats.publish(&event.subject(), bytes).await {
                    warn!("Failed to publish answer event: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode answer event: {}", e),
        }
    }
}

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[at (\d+):(\d+)\]").unwrap_or_else(|_| unreachable!("static regex"))
    })
}

/// Assemble the context sent to the LLM: selected text first, then
/// either a transcript window around a `[at mm:ss]` marker or a capped
/// excerpt of the extracted text.
pub fn build_doubt_context(
    content: Option<&ContentDoc>,
    query: &str,
    selected_text: Option<&str>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(selected) = selected_text {
        let selected = selected.trim();
        if !selected.is_empty() {
            parts.push(format!("Selected text: {}", selected));
        }
    }

    if let Some(text) = content
        .and_then(|c| c.extracted_data.as_ref())
        .map(|d| d.text.as_str())
        .filter(|t| !t.is_empty())
    {
        let excerpt = match timestamp_seconds(query) {
            Some(seconds) => transcript_window(text, seconds),
            None => general_excerpt(text),
        };
        parts.push(format!("Material: {}", excerpt));
    }

    parts.join("\n\n")
}

/// Parse a `[at mm:ss]` marker into seconds
pub fn timestamp_seconds(query: &str) -> Option<f64> {
    let captures = timestamp_regex().captures(query)?;
    let minutes: f64 = captures.get(1)?.as_str().parse().ok()?;
    let seconds: f64 = captures.get(2)?.as_str().parse().ok()?;
    Some(minutes * 60.0 + seconds)
}

/// Words within +-30 s of the timestamp, assuming 2.5 words per second
/// of speech
pub fn transcript_window(transcript: &str, seconds: f64) -> String {
    let words: Vec<&str> = transcript.split_whitespace().collect();
    if words.is_empty() {
        return String::new();
    }

    let center = (seconds * WORDS_PER_SECOND) as usize;
    let half_width = (WINDOW_SECONDS * WORDS_PER_SECOND) as usize;
    let start = center.saturating_sub(half_width);
    let end = (center + half_width).min(words.len());
    if start >= words.len() {
        // Marker points past the end; fall back to the tail
        return words[words.len().saturating_sub(half_width)..].join(" ");
    }
    words[start..end].join(" ")
}

/// Head of the extracted text, capped
fn general_excerpt(text: &str) -> String {
    if text.len() <= MAX_CONTEXT_CHARS {
        return text.to_string();
    }
    let mut cut = MAX_CONTEXT_CHARS;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text[..cut].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::KnowledgeHit;
    use crate::services::TutorAnswer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockKnowledge {
        hit: Option<KnowledgeHit>,
        fail_lookup: bool,
        lookups: AtomicUsize,
        saves: Mutex<Vec<(String, i32)>>,
    }

    impl MockKnowledge {
        fn empty() -> Self {
            Self {
                hit: None,
                fail_lookup: false,
                lookups: AtomicUsize::new(0),
                saves: Mutex::new(Vec::new()),
            }
        }

        fn with_hit(answer: &str, confidence: i32) -> Self {
            Self {
                hit: Some(KnowledgeHit {
                    answer: answer.into(),
                    confidence,
                }),
                ..Self::empty()
            }
        }

        fn failing() -> Self {
            Self {
                fail_lookup: true,
                ..Self::empty()
            }
        }
    }

    #[async_trait]
    impl KnowledgeStore for MockKnowledge {
        async fn lookup(&self, _key: &str, _content_id: Option<&str>) -> Result<Option<KnowledgeHit>> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            if self.fail_lookup {
                return Err(AtheneumError::Graph("graph down".into()));
            }
            Ok(self.hit.clone())
        }

        async fn save(
            &self,
            key: &str,
            _query: &str,
            _context: &str,
            _answer: &str,
            confidence: i32,
            _content_id: Option<&str>,
        ) -> Result<()> {
            self.saves
                .lock()
                .unwrap()
                .push((key.to_string(), confidence));
            Ok(())
        }
    }

    struct MockTutor {
        confidence: i32,
        calls: AtomicUsize,
    }

    impl MockTutor {
        fn new(confidence: i32) -> Self {
            Self {
                confidence,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DoubtTutor for MockTutor {
        async fn answer(&self, _query: &str, _context: &str) -> Result<TutorAnswer> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(TutorAnswer {
                explanation: "mock explanation".into(),
                confidence: self.confidence,
            })
        }
    }

    #[tokio::test]
    async fn high_confidence_resolves_without_escalation() {
        let knowledge = MockKnowledge::empty();
        let tutor = MockTutor::new(92);

        let resolved = resolve_answer(&knowledge, &tutor, "What is a stack?", "", None)
            .await
            .unwrap();

        assert_eq!(resolved.confidence, 92);
        assert_eq!(resolved.source, AnswerSource::Llm);
        assert!(!resolved.needs_escalation);
        // 92 >= 85: written back for future reuse
        let saves = knowledge.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].1, 92);
    }

    #[tokio::test]
    async fn knowledge_hit_skips_the_llm() {
        let knowledge = MockKnowledge::with_hit("A stack is LIFO.", 90);
        let tutor = MockTutor::new(92);

        let resolved = resolve_answer(&knowledge, &tutor, "What is a stack?", "", None)
            .await
            .unwrap();

        assert_eq!(resolved.source, AnswerSource::KnowledgeBase);
        assert_eq!(resolved.answer, "A stack is LIFO.");
        assert!(!resolved.needs_escalation);
        assert_eq!(tutor.calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn mid_confidence_resolves_but_is_not_stored() {
        let knowledge = MockKnowledge::empty();
        let tutor = MockTutor::new(82);

        let resolved = resolve_answer(&knowledge, &tutor, "q", "ctx", None)
            .await
            .unwrap();

        assert!(!resolved.needs_escalation);
        assert!(knowledge.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn low_confidence_needs_escalation() {
        let knowledge = MockKnowledge::empty();
        let tutor = MockTutor::new(64);

        let resolved = resolve_answer(&knowledge, &tutor, "q", "", None)
            .await
            .unwrap();

        assert!(resolved.needs_escalation);
        assert_eq!(resolved.source, AnswerSource::Llm);
        assert!(knowledge.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_failure_degrades_to_llm() {
        let knowledge = MockKnowledge::failing();
        let tutor = MockTutor::new(88);

        let resolved = resolve_answer(&knowledge, &tutor, "q", "", None)
            .await
            .unwrap();

        assert_eq!(resolved.source, AnswerSource::Llm);
        assert_eq!(tutor.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn faculty_answer_is_stored_at_full_confidence() {
        let knowledge = MockKnowledge::empty();

        store_faculty_answer(&knowledge, "What is a Stack?", "", "A stack is LIFO.", None).await;

        let saves = knowledge.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, "what is a stack?");
        assert_eq!(saves[0].1, FACULTY_CONFIDENCE);
    }

    #[test]
    fn timestamp_parsing() {
        assert_eq!(timestamp_seconds("confused [at 2:30] here"), Some(150.0));
        assert_eq!(timestamp_seconds("[at 0:05]"), Some(5.0));
        assert_eq!(timestamp_seconds("no marker"), None);
    }

    #[test]
    fn transcript_window_centers_on_timestamp() {
        // 1000 numbered words; at 100s the center word index is 250
        let words: Vec<String> = (0..1000).map(|i| format!("w{}", i)).collect();
        let transcript = words.join(" ");

        let window = transcript_window(&transcript, 100.0);
        let window_words: Vec<&str> = window.split_whitespace().collect();

        assert_eq!(window_words.first(), Some(&"w175"));
        assert_eq!(window_words.last(), Some(&"w324"));
    }

    #[test]
    fn transcript_window_past_end_returns_tail() {
        let transcript = "alpha beta gamma";
        let window = transcript_window(transcript, 10_000.0);
        assert!(window.ends_with("gamma"));
    }

    #[test]
    fn context_uses_window_when_marker_present() {
        let mut content = ContentDoc::default();
        content.extracted_data = Some(crate::db::schemas::ExtractedData {
            text: (0..1000)
                .map(|i| format!("w{}", i))
                .collect::<Vec<_>>()
                .join(" "),
            ..Default::default()
        });

        let context = build_doubt_context(Some(&content), "what is this [at 1:40]?", None);
        assert!(context.contains("w250"));
        assert!(!context.contains("w900"));
    }

    #[test]
    fn context_caps_general_excerpt() {
        let mut content = ContentDoc::default();
        content.extracted_data = Some(crate::db::schemas::ExtractedData {
            text: "x".repeat(20_000),
            ..Default::default()
        });

        let context = build_doubt_context(Some(&content), "why?", None);
        assert!(context.len() <= MAX_CONTEXT_CHARS + 32);
    }

    #[test]
    fn context_includes_selected_text() {
        let context = build_doubt_context(None, "why?", Some("  the highlighted bit  "));
        assert_eq!(context, "Selected text: the highlighted bit");
    }

    #[test]
    fn empty_inputs_yield_empty_context() {
        assert_eq!(build_doubt_context(None, "why?", None), "");
        assert_eq!(build_doubt_context(None, "why?", Some("   ")), "");
    }
}
