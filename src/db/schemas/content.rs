//! Content document schema
//!
//! A learning artifact (document, video, code sample, or externally linked
//! video) belonging to a course, together with its ingestion state.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for content
pub const CONTENT_COLLECTION: &str = "contents";

/// Kind of learning artifact
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Pdf,
    Video,
    /// Externally hosted video (YouTube and friends); no file upload
    ExternalVideo,
    Code,
    Document,
    #[default]
    Other,
}

impl ContentType {
    /// Whether extraction goes through the external ML service
    /// (documents/videos) or the local lightweight extractor (code, misc).
    pub fn uses_ml_extraction(&self) -> bool {
        matches!(self, Self::Pdf | Self::Video | Self::ExternalVideo)
    }

    /// Tag sent to the ML service
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Video => "video",
            Self::ExternalVideo => "external_video",
            Self::Code => "code",
            Self::Document => "document",
            Self::Other => "other",
        }
    }
}

/// Ingestion pipeline status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Legal transitions: pending -> processing -> completed | failed,
    /// plus a reset to pending from any state. The reset must stay
    /// unconditional: a queue-full upload leaves a record pending and a
    /// restart mid-run leaves one processing, both with no job behind
    /// them, and reprocess is the only way back.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        matches!(
            (self, next),
            (_, Pending) | (Pending, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

/// Thumbnail reference on the object storage provider
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub public_id: String,
}

/// Stored file reference (object storage location or external URL)
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct FileRef {
    /// Object storage URL, or the external video URL
    pub url: String,

    /// Object storage public id (absent for external links)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,

    /// File format ("pdf", "mp4", "youtube", ...)
    pub format: String,

    /// Size in bytes (0 for external links)
    #[serde(default)]
    pub size: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,

    /// Duration in seconds, for videos
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Free-form data produced by the extraction stage
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ExtractedData {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    /// Document structure (headings, sections) as reported by the extractor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<bson::Bson>,

    /// Extractor-specific metadata (page count, language, thumbnail, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Document>,
}

/// Content document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ContentDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning course
    pub course_id: ObjectId,

    /// Branches this content is visible to
    #[serde(default)]
    pub branch_ids: Vec<ObjectId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<ObjectId>,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type")]
    pub content_type: ContentType,

    pub file: FileRef,

    #[serde(default)]
    pub processing_status: ProcessingStatus,

    /// 0-100, client-visible progress indicator
    #[serde(default)]
    pub processing_progress: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<ExtractedData>,

    /// Node id in the knowledge graph, set by the pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_node_id: Option<String>,

    #[serde(default)]
    pub is_published: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime>,

    /// Uploading faculty member
    pub uploaded_by: ObjectId,

    /// Soft-delete flag (content is never hard-deleted from Mongo)
    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub view_count: i64,
}

fn default_true() -> bool {
    true
}

impl ContentDoc {
    /// Create a new pending content record
    pub fn new(
        course_id: ObjectId,
        branch_ids: Vec<ObjectId>,
        institution_id: Option<ObjectId>,
        title: String,
        description: String,
        content_type: ContentType,
        file: FileRef,
        uploaded_by: ObjectId,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            course_id,
            branch_ids,
            institution_id,
            title,
            description,
            content_type,
            file,
            processing_status: ProcessingStatus::Pending,
            processing_progress: 0,
            processing_error: None,
            extracted_data: None,
            graph_node_id: None,
            // Visible to students immediately; the pipeline re-confirms on completion
            is_published: true,
            published_at: Some(DateTime::now()),
            uploaded_by,
            is_active: true,
            view_count: 0,
        }
    }
}

impl IntoIndexes for ContentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "course_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("course_id_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "uploaded_by": 1 },
                Some(
                    IndexOptions::builder()
                        .name("uploaded_by_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "processing_status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("processing_status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ContentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_forward_only() {
        use ProcessingStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Completed));
    }

    #[test]
    fn terminal_status_resets_to_pending() {
        use ProcessingStatus::*;
        assert!(Completed.can_transition_to(Pending));
        assert!(Failed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
    }

    #[test]
    fn stranded_records_can_be_reset() {
        use ProcessingStatus::*;
        // A queue-full upload strands a record pending; a restart strands
        // an in-flight one processing. Both must accept the reset.
        assert!(Pending.can_transition_to(Pending));
        assert!(Processing.can_transition_to(Pending));
    }

    #[test]
    fn ml_extraction_routing() {
        assert!(ContentType::Pdf.uses_ml_extraction());
        assert!(ContentType::Video.uses_ml_extraction());
        assert!(ContentType::ExternalVideo.uses_ml_extraction());
        assert!(!ContentType::Code.uses_ml_extraction());
        assert!(!ContentType::Document.uses_ml_extraction());
    }

    #[test]
    fn content_type_serializes_snake_case() {
        let json = serde_json::to_string(&ContentType::ExternalVideo).unwrap();
        assert_eq!(json, r#""external_video""#);
        let back: ContentType = serde_json::from_str(r#""pdf""#).unwrap();
        assert_eq!(back, ContentType::Pdf);
    }

    #[test]
    fn new_content_starts_pending_and_published() {
        let content = ContentDoc::new(
            ObjectId::new(),
            vec![],
            None,
            "Intro to Stacks".into(),
            String::new(),
            ContentType::Pdf,
            FileRef {
                url: "https://cdn.example.com/stacks.pdf".into(),
                public_id: Some("stacks".into()),
                format: "pdf".into(),
                size: 1024,
                thumbnail: None,
                duration: None,
            },
            ObjectId::new(),
        );
        assert_eq!(content.processing_status, ProcessingStatus::Pending);
        assert_eq!(content.processing_progress, 0);
        assert!(content.is_published);
        assert!(content.is_active);
    }
}
