//! Content management routes

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use mongodb::options::FindOptions;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::db::schemas::{ContentDoc, ContentType, FileRef, Thumbnail};
use crate::notify::ContentUploaded;
use crate::pipeline::PipelineJob;
use crate::routes::{
    error_to_response, json_response, parse_object_id, RequesterIdentity,
};
use crate::server::AppState;
use crate::types::{AtheneumError, Result};

/// Hosts accepted for externally linked videos, with the format tag
/// recorded on the file reference
const ALLOWED_VIDEO_HOSTS: &[(&str, &str)] = &[
    ("youtube.com", "youtube"),
    ("www.youtube.com", "youtube"),
    ("m.youtube.com", "youtube"),
    ("youtu.be", "youtube"),
    ("vimeo.com", "vimeo"),
    ("www.vimeo.com", "vimeo"),
];

#[derive(Debug, Deserialize)]
struct ThumbnailBody {
    url: String,
    #[serde(default)]
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct FileBody {
    url: String,
    #[serde(default)]
    public_id: Option<String>,
    format: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    thumbnail: Option<ThumbnailBody>,
}

#[derive(Debug, Deserialize)]
struct CreateContentBody {
    course_id: String,
    #[serde(default)]
    branch_ids: Vec<String>,
    #[serde(default)]
    institution_id: Option<String>,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "type")]
    content_type: ContentType,
    file: FileBody,
}

#[derive(Debug, Deserialize)]
struct CreateExternalBody {
    course_id: String,
    title: String,
    #[serde(default)]
    description: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct UpdateContentBody {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_published: Option<bool>,
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| AtheneumError::Validation(format!("Invalid request body: {}", e)))
}

/// Validate an external video URL, returning the format tag
pub fn external_video_format(url: &str) -> Result<&'static str> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|_| AtheneumError::Validation("Invalid video URL".into()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AtheneumError::Validation(
            "Video URL must be http or https".into(),
        ));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| AtheneumError::Validation("Video URL has no host".into()))?;

    ALLOWED_VIDEO_HOSTS
        .iter()
        .find(|(allowed, _)| host.eq_ignore_ascii_case(allowed))
        .map(|(_, format)| *format)
        .ok_or_else(|| {
            AtheneumError::Validation(format!("Unsupported video host: {}", host))
        })
}

/// POST /api/content
pub async fn create(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    body: &[u8],
) -> Response<Full<Bytes>> {
    match create_inner(state, identity, body).await {
        Ok(content) => json_response(StatusCode::CREATED, &content),
        Err(e) => error_to_response(&e),
    }
}

async fn create_inner(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    body: &[u8],
) -> Result<ContentDoc> {
    identity.require_faculty()?;
    let body: CreateContentBody = parse_body(body)?;

    if body.title.trim().is_empty() {
        return Err(AtheneumError::Validation("Title is required".into()));
    }
    if body.file.url.trim().is_empty() {
        return Err(AtheneumError::Validation("File URL is required".into()));
    }

    let course_id = parse_object_id(&body.course_id, "course")?;
    let branch_ids = body
        .branch_ids
        .iter()
        .map(|id| parse_object_id(id, "branch"))
        .collect::<Result<Vec<_>>>()?;
    let institution_id = body
        .institution_id
        .as_deref()
        .map(|id| parse_object_id(id, "institution"))
        .transpose()?;

    let file = FileRef {
        url: body.file.url,
        public_id: body.file.public_id,
        format: body.file.format,
        size: body.file.size,
        thumbnail: body.file.thumbnail.map(|t| Thumbnail {
            url: t.url,
            public_id: t.public_id,
        }),
        duration: None,
    };

    let content = ContentDoc::new(
        course_id,
        branch_ids,
        institution_id,
        body.title.trim().to_string(),
        body.description,
        body.content_type,
        file,
        identity.user_id,
    );

    register_and_enqueue(state, content).await
}

/// POST /api/content/external
pub async fn create_external(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    body: &[u8],
) -> Response<Full<Bytes>> {
    match create_external_inner(state, identity, body).await {
        Ok(content) => json_response(StatusCode::CREATED, &content),
        Err(e) => error_to_response(&e),
    }
}

async fn create_external_inner(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    body: &[u8],
) -> Result<ContentDoc> {
    identity.require_faculty()?;
    let body: CreateExternalBody = parse_body(body)?;

    if body.title.trim().is_empty() {
        return Err(AtheneumError::Validation("Title is required".into()));
    }
    let format = external_video_format(&body.url)?;
    let course_id = parse_object_id(&body.course_id, "course")?;

    let file = FileRef {
        url: body.url,
        public_id: None,
        format: format.to_string(),
        size: 0,
        thumbnail: None,
        duration: None,
    };

    let content = ContentDoc::new(
        course_id,
        Vec::new(),
        None,
        body.title.trim().to_string(),
        body.description,
        ContentType::ExternalVideo,
        file,
        identity.user_id,
    );

    register_and_enqueue(state, content).await
}

/// Persist the pending record, announce it, and hand it to the pipeline
async fn register_and_enqueue(state: Arc<AppState>, content: ContentDoc) -> Result<ContentDoc> {
    let mut content = content;
    let content_id = state.contents.insert_one(content.clone()).await?;
    content._id = Some(content_id);

    if let Some(nats) = &state.nats {
        let event = ContentUploaded::new(
            content_id.to_hex(),
            content.course_id.to_hex(),
            content.title.clone(),
            content.content_type.as_str().to_string(),
            content.uploaded_by.to_hex(),
        );
        match event.to_bytes() {
            Ok(bytes) => {
                if let Err(e) = nats.publish(&event.subject(), bytes).await {
                    warn!("Failed to publish upload event: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode upload event: {}", e),
        }
    }

    state.pipeline.enqueue(PipelineJob {
        content_id,
        content_type: content.content_type,
        source_url: content.file.url.clone(),
    })?;

    Ok(content)
}

/// GET /api/content/{id}
pub async fn get(state: Arc<AppState>, id: &str) -> Response<Full<Bytes>> {
    match get_inner(state, id).await {
        Ok(content) => json_response(StatusCode::OK, &content),
        Err(e) => error_to_response(&e),
    }
}

async fn get_inner(state: Arc<AppState>, id: &str) -> Result<ContentDoc> {
    let id = parse_object_id(id, "content")?;
    let mut content = state
        .contents
        .find_by_id(id)
        .await?
        .ok_or_else(|| AtheneumError::NotFound("Content not found".into()))?;

    // View counting is best-effort; a failed bump never fails the read
    match state
        .contents
        .update_one(doc! { "_id": id }, doc! { "$inc": { "view_count": 1 } })
        .await
    {
        Ok(_) => content.view_count += 1,
        Err(e) => warn!(content_id = %id.to_hex(), "View count bump failed: {}", e),
    }

    Ok(content)
}

/// GET /api/content/course/{course_id}?type=&published=
pub async fn list_by_course(
    state: Arc<AppState>,
    course_id: &str,
    params: &std::collections::HashMap<String, String>,
) -> Response<Full<Bytes>> {
    match list_by_course_inner(state, course_id, params).await {
        Ok(contents) => json_response(StatusCode::OK, &contents),
        Err(e) => error_to_response(&e),
    }
}

async fn list_by_course_inner(
    state: Arc<AppState>,
    course_id: &str,
    params: &std::collections::HashMap<String, String>,
) -> Result<Vec<ContentDoc>> {
    let course_id = parse_object_id(course_id, "course")?;
    let mut filter = doc! { "course_id": course_id, "is_active": true };

    if let Some(content_type) = params.get("type") {
        // Reject unknown type filters instead of returning everything
        serde_json::from_value::<ContentType>(serde_json::Value::String(content_type.clone()))
            .map_err(|_| {
                AtheneumError::Validation(format!("Unknown content type: {}", content_type))
            })?;
        filter.insert("type", content_type.as_str());
    }
    if let Some(published) = params.get("published") {
        let published = published.parse::<bool>().map_err(|_| {
            AtheneumError::Validation("published filter must be true or false".into())
        })?;
        filter.insert("is_published", published);
    }

    let options = FindOptions::builder()
        .sort(doc! { "metadata.created_at": -1 })
        .build();
    state.contents.find_many_with_options(filter, Some(options)).await
}

/// PUT /api/content/{id}
pub async fn update(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    id: &str,
    body: &[u8],
) -> Response<Full<Bytes>> {
    match update_inner(state, identity, id, body).await {
        Ok(content) => json_response(StatusCode::OK, &content),
        Err(e) => error_to_response(&e),
    }
}

async fn update_inner(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    id: &str,
    body: &[u8],
) -> Result<ContentDoc> {
    let id = parse_object_id(id, "content")?;
    let body: UpdateContentBody = parse_body(body)?;

    let content = load_owned(&state, id, &identity).await?;

    let mut set = doc! {};
    if let Some(title) = &body.title {
        if title.trim().is_empty() {
            return Err(AtheneumError::Validation("Title cannot be empty".into()));
        }
        set.insert("title", title.trim());
    }
    if let Some(description) = &body.description {
        set.insert("description", description.as_str());
    }
    if let Some(is_published) = body.is_published {
        set.insert("is_published", is_published);
    }
    if set.is_empty() {
        return Ok(content);
    }

    state.contents.set_by_id(id, set).await?;
    state
        .contents
        .find_by_id(id)
        .await?
        .ok_or_else(|| AtheneumError::NotFound("Content not found".into()))
}

/// DELETE /api/content/{id}
pub async fn delete(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    id: &str,
) -> Response<Full<Bytes>> {
    match delete_inner(state, identity, id).await {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({ "deleted": true })),
        Err(e) => error_to_response(&e),
    }
}

async fn delete_inner(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    id: &str,
) -> Result<()> {
    let id = parse_object_id(id, "content")?;
    let content = load_owned(&state, id, &identity).await?;

    // Graph node goes away entirely; the Mongo record is only soft-deleted
    let node_id = content.graph_node_id.unwrap_or_else(|| id.to_hex());
    if let Err(e) = state.graph.delete_node(&node_id).await {
        warn!(content_id = %id.to_hex(), "Graph node delete failed: {}", e);
    }

    // Single update so is_active and the soft-delete flags never disagree
    state
        .contents
        .soft_delete(doc! { "_id": id }, doc! { "is_active": false })
        .await?;
    Ok(())
}

/// POST /api/content/{id}/reprocess
pub async fn reprocess(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    id: &str,
) -> Response<Full<Bytes>> {
    match reprocess_inner(state, identity, id).await {
        Ok(content) => json_response(StatusCode::ACCEPTED, &content),
        Err(e) => error_to_response(&e),
    }
}

async fn reprocess_inner(
    state: Arc<AppState>,
    identity: RequesterIdentity,
    id: &str,
) -> Result<ContentDoc> {
    let id = parse_object_id(id, "content")?;
    let content = load_owned(&state, id, &identity).await?;

    // Reset is unconditional so stranded pending/processing records stay
    // recoverable
    state
        .contents
        .update_one(
            doc! { "_id": id },
            doc! {
                "$set": {
                    "processing_status": "pending",
                    "processing_progress": 0,
                    "metadata.updated_at": bson::DateTime::now(),
                },
                "$unset": { "processing_error": "" },
            },
        )
        .await?;

    state.pipeline.enqueue(PipelineJob {
        content_id: id,
        content_type: content.content_type,
        source_url: content.file.url.clone(),
    })?;

    state
        .contents
        .find_by_id(id)
        .await?
        .ok_or_else(|| AtheneumError::NotFound("Content not found".into()))
}

/// Load a content record and check the requester owns it
async fn load_owned(
    state: &Arc<AppState>,
    id: ObjectId,
    identity: &RequesterIdentity,
) -> Result<ContentDoc> {
    let content = state
        .contents
        .find_by_id(id)
        .await?
        .ok_or_else(|| AtheneumError::NotFound("Content not found".into()))?;

    if content.uploaded_by != identity.user_id {
        return Err(AtheneumError::Forbidden(
            "Only the uploader can modify this content".into(),
        ));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_hosts_validated() {
        assert_eq!(
            external_video_format("https://www.youtube.com/watch?v=abc").unwrap(),
            "youtube"
        );
        assert_eq!(
            external_video_format("https://youtu.be/abc").unwrap(),
            "youtube"
        );
        assert_eq!(
            external_video_format("https://vimeo.com/12345").unwrap(),
            "vimeo"
        );
    }

    #[test]
    fn unknown_hosts_rejected() {
        let err = external_video_format("https://example.com/video.mp4").unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn non_http_schemes_rejected() {
        assert!(external_video_format("ftp://youtube.com/x").is_err());
        assert!(external_video_format("not a url").is_err());
    }

    #[test]
    fn create_body_parses_with_defaults() {
        let json = r#"{
            "course_id": "64b000000000000000000001",
            "title": "Intro",
            "type": "pdf",
            "file": { "url": "https://cdn.example.com/a.pdf", "format": "pdf" }
        }"#;
        let body: CreateContentBody = parse_body(json.as_bytes()).unwrap();
        assert_eq!(body.content_type, ContentType::Pdf);
        assert!(body.branch_ids.is_empty());
        assert_eq!(body.file.size, 0);
    }

    #[test]
    fn malformed_body_is_validation_error() {
        let err = parse_body::<CreateContentBody>(b"{not json").unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
