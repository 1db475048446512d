//! Doubt document schema
//!
//! A single student question together with its resolution lifecycle.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for doubts
pub const DOUBT_COLLECTION: &str = "doubts";

/// Resolution lifecycle of a doubt
///
/// Resolved/Pending -> Escalated -> Answered, or Resolved directly from
/// the automated or knowledge-base paths. Escalated doubts require a
/// faculty answer to reach Answered.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoubtStatus {
    Resolved,
    #[default]
    Pending,
    Escalated,
    Answered,
}

/// Spatial/temporal focus descriptor: where on screen (normalized
/// coordinates) and optionally when in the video the student pointed.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct VisualContext {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,

    /// Seconds into the video, when the doubt targets a video frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// Best-effort video suggestion attached to an answer
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SuggestedVideo {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
}

/// Doubt document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DoubtDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub student_id: ObjectId,

    pub course_id: ObjectId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<ObjectId>,

    /// The question as typed by the student
    pub query: String,

    /// Text the student highlighted in the content viewer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,

    /// Enriched context assembled at ask-time
    #[serde(default)]
    pub context: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_context: Option<VisualContext>,

    /// AI-generated answer
    #[serde(default)]
    pub ai_response: String,

    /// Confidence score, 0-100
    #[serde(default)]
    pub confidence: i32,

    #[serde(default)]
    pub status: DoubtStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub faculty_answer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_by: Option<ObjectId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_video: Option<SuggestedVideo>,
}

impl DoubtDoc {
    /// Create a new doubt record with the given answer and status
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        student_id: ObjectId,
        course_id: ObjectId,
        content_id: Option<ObjectId>,
        query: String,
        selected_text: Option<String>,
        context: String,
        visual_context: Option<VisualContext>,
        ai_response: String,
        confidence: i32,
        status: DoubtStatus,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            student_id,
            course_id,
            content_id,
            query,
            selected_text,
            context,
            visual_context,
            ai_response,
            confidence,
            status,
            faculty_answer: None,
            answered_by: None,
            resolved_at: None,
            suggested_video: None,
        }
    }
}

impl IntoIndexes for DoubtDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "student_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("student_id_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "course_id": 1, "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("course_status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for DoubtDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DoubtStatus::Escalated).unwrap(),
            r#""escalated""#
        );
        let back: DoubtStatus = serde_json::from_str(r#""answered""#).unwrap();
        assert_eq!(back, DoubtStatus::Answered);
    }

    #[test]
    fn new_doubt_has_no_faculty_fields() {
        let doubt = DoubtDoc::new(
            ObjectId::new(),
            ObjectId::new(),
            None,
            "What is a stack?".into(),
            None,
            String::new(),
            None,
            "A stack is a LIFO structure.".into(),
            92,
            DoubtStatus::Resolved,
        );
        assert!(doubt.faculty_answer.is_none());
        assert!(doubt.answered_by.is_none());
        assert!(doubt.resolved_at.is_none());
    }
}
