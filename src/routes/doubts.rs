//! Doubt resolution routes

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use mongodb::options::FindOptions;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::schemas::{DoubtDoc, DoubtStatus, VisualContext};
use crate::doubts::AskRequest;
use crate::routes::{error_to_response, json_response, parse_object_id, RequesterIdentity};
use crate::server::AppState;
use crate::types::{AtheneumError, Result};

#[derive(Debug, Deserialize)]
struct AskBody {
    course_id: String,
    #[serde(default)]
    content_id: Option<String>,
    query: String,
    #[serde(default)]
    selected_text: Option<String>,
    #[serde(default)]
    visual_context: Option<VisualContext>,
}

#[derive(Debug, Deserialize)]
struct AnswerBody {
    answer: String,
    #[serde(default = "default_true")]
    save_to_graph: bool,
}

fn default_true() -> bool {
    true
}

/// Ask response: the stored doubt, where the answer came from, and the
/// escalation hint the client uses to offer "ask a teacher"
#[derive(Debug, Serialize)]
struct AskResponse {
    doubt: DoubtDoc,
    source: &'static str,
    needs_escalation: bool,
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| AtheneumError::Validation(format!("Invalid request body: {}", e)))
}

/// POST /api/doubts/ask
pub async fn ask(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    body: &[u8],
) -> Response<Full<Bytes>> {
    match ask_inner(state, identity, body).await {
        Ok(response) => json_response(StatusCode::CREATED, &response),
        Err(e) => error_to_response(&e),
    }
}

async fn ask_inner(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    body: &[u8],
) -> Result<AskResponse> {
    let body: AskBody = parse_body(body)?;

    if body.query.trim().is_empty() {
        return Err(AtheneumError::Validation("Query is required".into()));
    }
    let course_id = parse_object_id(&body.course_id, "course")?;
    let content_id = body
        .content_id
        .as_deref()
        .map(|id| parse_object_id(id, "content"))
        .transpose()?;

    let outcome = state
        .doubt_service
        .ask(AskRequest {
            student_id: identity.user_id,
            course_id,
            content_id,
            query: body.query.trim().to_string(),
            selected_text: body.selected_text,
            visual_context: body.visual_context,
        })
        .await?;

    let needs_escalation = outcome.doubt.status == DoubtStatus::Pending;
    Ok(AskResponse {
        doubt: outcome.doubt,
        source: outcome.source.as_str(),
        needs_escalation,
    })
}

/// POST /api/doubts/{id}/escalate
pub async fn escalate(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    id: &str,
) -> Response<Full<Bytes>> {
    let result = async {
        let doubt_id = parse_object_id(id, "doubt")?;
        state.doubt_service.escalate(doubt_id, identity.user_id).await
    }
    .await;

    match result {
        Ok(doubt) => json_response(StatusCode::OK, &doubt),
        Err(e) => error_to_response(&e),
    }
}

/// POST /api/doubts/{id}/answer
pub async fn answer(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    id: &str,
    body: &[u8],
) -> Response<Full<Bytes>> {
    let result = async {
        identity.require_faculty()?;
        let doubt_id = parse_object_id(id, "doubt")?;
        let body: AnswerBody = parse_body(body)?;
        if body.answer.trim().is_empty() {
            return Err(AtheneumError::Validation("Answer is required".into()));
        }
        state
            .doubt_service
            .answer(doubt_id, identity.user_id, body.answer.trim(), body.save_to_graph)
            .await
    }
    .await;

    match result {
        Ok(doubt) => json_response(StatusCode::OK, &doubt),
        Err(e) => error_to_response(&e),
    }
}

/// GET /api/doubts/my
pub async fn my_doubts(state: Arc<AppState>, identity: RequesterIdentity) -> Response<Full<Bytes>> {
    let options = FindOptions::builder()
        .sort(doc! { "metadata.created_at": -1 })
        .limit(100)
        .build();

    match state
        .doubts
        .find_many_with_options(doc! { "student_id": identity.user_id }, Some(options))
        .await
    {
        Ok(doubts) => json_response(StatusCode::OK, &doubts),
        Err(e) => error_to_response(&e),
    }
}

/// GET /api/doubts/escalated/{course_id}
pub async fn escalated_for_course(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    course_id: &str,
) -> Response<Full<Bytes>> {
    let result = async {
        identity.require_faculty()?;
        let course_id = parse_object_id(course_id, "course")?;
        let options = FindOptions::builder()
            .sort(doc! { "metadata.created_at": 1 })
            .build();
        state
            .doubts
            .find_many_with_options(
                doc! { "course_id": course_id, "status": "escalated" },
                Some(options),
            )
            .await
    }
    .await;

    match result {
        Ok(doubts) => json_response(StatusCode::OK, &doubts),
        Err(e) => error_to_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_body_parses_minimal() {
        let json = r#"{ "course_id": "64b000000000000000000001", "query": "why?" }"#;
        let body: AskBody = parse_body(json.as_bytes()).unwrap();
        assert_eq!(body.query, "why?");
        assert!(body.content_id.is_none());
        assert!(body.visual_context.is_none());
    }

    #[test]
    fn ask_body_parses_visual_context() {
        let json = r#"{
            "course_id": "64b000000000000000000001",
            "query": "what is this region?",
            "visual_context": { "x": 0.1, "y": 0.2, "width": 0.3, "height": 0.4, "timestamp": 95.0 }
        }"#;
        let body: AskBody = parse_body(json.as_bytes()).unwrap();
        let vc = body.visual_context.unwrap();
        assert_eq!(vc.timestamp, Some(95.0));
    }

    #[test]
    fn answer_body_save_defaults_true() {
        let body: AnswerBody = parse_body(br#"{ "answer": "Because." }"#).unwrap();
        assert!(body.save_to_graph);

        let body: AnswerBody =
            parse_body(br#"{ "answer": "Because.", "save_to_graph": false }"#).unwrap();
        assert!(!body.save_to_graph);
    }
}
