//! Content ingestion steps
//!
//! One run per job: load, extract, persist, link into the graph, publish.
//! Extraction failures abort the run and leave the record `Failed` with
//! the error recorded. Graph linkage is best-effort; a dead graph store
//! never fails ingestion.
//!
//! Progress milestones written to the record: 10 (processing started),
//! 40 (extraction done), 60 (extracted data stored), 80 (graph node
//! merged), 100 (terminal, for both Completed and Failed).

use bson::{doc, oid::ObjectId, DateTime};
use tracing::{info, warn};

use crate::db::mongo::MongoCollection;
use crate::db::schemas::{ContentDoc, ExtractedData, ProcessingStatus, Thumbnail};
use crate::graph::ContentGraph;
use crate::pipeline::queue::PipelineJob;
use crate::services::{LocalExtractor, MlClient, MlExtraction};
use crate::types::Result;

/// Everything a pipeline run needs
#[derive(Clone)]
pub struct Processor {
    contents: MongoCollection<ContentDoc>,
    ml: MlClient,
    local: LocalExtractor,
    graph: ContentGraph,
}

impl Processor {
    pub fn new(
        contents: MongoCollection<ContentDoc>,
        ml: MlClient,
        local: LocalExtractor,
        graph: ContentGraph,
    ) -> Self {
        Self {
            contents,
            ml,
            local,
            graph,
        }
    }

    /// Run the full ingestion for one content record
    pub async fn process(&self, job: PipelineJob) -> Result<()> {
        let content_id = job.content_id;
        let id_str = content_id.to_hex();

        let Some(content) = self.contents.find_by_id(content_id).await? else {
            warn!(content_id = %id_str, "Pipeline job for missing content, skipping");
            return Ok(());
        };

        if !content
            .processing_status
            .can_transition_to(ProcessingStatus::Processing)
        {
            warn!(
                content_id = %id_str,
                status = ?content.processing_status,
                "Content not in a startable state, skipping"
            );
            return Ok(());
        }

        info!(content_id = %id_str, content_type = job.content_type.as_str(), "Pipeline run starting");
        self.contents
            .set_by_id(
                content_id,
                doc! { "processing_status": "processing", "processing_progress": 10 },
            )
            .await?;

        // Extraction is the only aborting stage
        let extraction = if job.content_type.uses_ml_extraction() {
            self.ml
                .extract(&job.source_url, &id_str, job.content_type.as_str())
                .await
        } else {
            self.local.extract(&job.source_url).await
        };

        let extraction = match extraction {
            Ok(data) => data,
            Err(e) => {
                warn!(content_id = %id_str, "Extraction failed: {}", e);
                self.mark_failed(content_id, &e.to_string()).await;
                return Ok(());
            }
        };

        self.contents
            .set_by_id(content_id, doc! { "processing_progress": 40 })
            .await?;

        let (data, duration, thumbnail) = extraction_to_data(extraction);

        let mut set = doc! { "processing_progress": 60 };
        match bson::to_bson(&data) {
            Ok(value) => {
                set.insert("extracted_data", value);
            }
            Err(e) => {
                warn!(content_id = %id_str, "Extracted data not serializable: {}", e);
            }
        }
        // Video runs backfill duration/thumbnail the upload path didn't have
        if job.content_type.uses_ml_extraction() {
            if let Some(duration) = duration {
                set.insert("file.duration", duration);
            }
            if let Some(thumbnail) = thumbnail {
                if let Ok(value) = bson::to_bson(&thumbnail) {
                    set.insert("file.thumbnail", value);
                }
            }
        }
        self.contents.set_by_id(content_id, set).await?;

        self.link_graph(&content, content_id, &data).await;

        let mut done = doc! {
            "processing_status": "completed",
            "processing_progress": 100,
            "is_published": true,
        };
        if content.published_at.is_none() {
            done.insert("published_at", DateTime::now());
        }
        self.contents.set_by_id(content_id, done).await?;

        info!(content_id = %id_str, "Pipeline run completed");
        Ok(())
    }

    /// Best-effort graph linkage; every failure is logged and swallowed
    async fn link_graph(&self, content: &ContentDoc, content_id: ObjectId, data: &ExtractedData) {
        let id_str = content_id.to_hex();

        let mut linked = content.clone();
        linked._id = Some(content_id);
        linked.extracted_data = Some(data.clone());

        let node_id = match self.graph.merge_content_node(&linked).await {
            Ok(node_id) => node_id,
            Err(e) => {
                warn!(content_id = %id_str, "Graph node merge failed: {}", e);
                return;
            }
        };

        if let Err(e) = self
            .contents
            .set_by_id(
                content_id,
                doc! { "processing_progress": 80, "graph_node_id": node_id.as_str() },
            )
            .await
        {
            warn!(content_id = %id_str, "Failed to store graph node id: {}", e);
        }

        if let Err(e) = self
            .graph
            .link_to_course(&node_id, &content.course_id.to_hex())
            .await
        {
            warn!(content_id = %id_str, "Course linkage failed: {}", e);
        }
        if let Err(e) = self.graph.merge_topics(&node_id, &data.topics).await {
            warn!(content_id = %id_str, "Topic linkage failed: {}", e);
        }
        if let Err(e) = self.graph.link_related(&node_id).await {
            warn!(content_id = %id_str, "Related-content linkage failed: {}", e);
        }
    }

    /// Terminal failure: record the error, force progress to 100 so
    /// clients polling the bar see it settle.
    async fn mark_failed(&self, content_id: ObjectId, error: &str) {
        let result = self.contents.set_by_id(content_id, failure_update(error)).await;

        if let Err(e) = result {
            warn!(content_id = %content_id.to_hex(), "Failed to record pipeline failure: {}", e);
        }
    }
}

/// Fields written when a run fails terminally
pub fn failure_update(error: &str) -> bson::Document {
    doc! {
        "processing_status": "failed",
        "processing_progress": 100,
        "processing_error": error,
    }
}

/// Split an extraction payload into stored data plus file backfills
pub fn extraction_to_data(
    extraction: MlExtraction,
) -> (ExtractedData, Option<f64>, Option<Thumbnail>) {
    let thumbnail = extraction.thumbnail_url.map(|url| Thumbnail {
        url,
        public_id: extraction.thumbnail_public_id.unwrap_or_default(),
    });

    let mut metadata = bson::Document::new();
    if let Some(language) = extraction.language {
        metadata.insert("language", language);
    }
    if let Some(extra) = extraction.metadata {
        if let Ok(bson::Bson::Document(extra)) = bson::to_bson(&extra) {
            metadata.extend(extra);
        }
    }

    let data = ExtractedData {
        text: extraction.text,
        summary: extraction.summary,
        topics: extraction.topics,
        keywords: extraction.keywords,
        structure: extraction.structure.and_then(|s| bson::to_bson(&s).ok()),
        metadata: if metadata.is_empty() {
            None
        } else {
            Some(metadata)
        },
    };

    (data, extraction.duration, thumbnail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extraction_maps_core_fields() {
        let extraction = MlExtraction {
            text: "full transcript".into(),
            summary: "short".into(),
            topics: vec!["stacks".into()],
            keywords: vec!["lifo".into()],
            ..Default::default()
        };
        let (data, duration, thumbnail) = extraction_to_data(extraction);
        assert_eq!(data.text, "full transcript");
        assert_eq!(data.topics, vec!["stacks"]);
        assert!(duration.is_none());
        assert!(thumbnail.is_none());
        assert!(data.metadata.is_none());
    }

    #[test]
    fn extraction_carries_video_backfills() {
        let extraction = MlExtraction {
            duration: Some(312.5),
            thumbnail_url: Some("https://cdn.example.com/t.jpg".into()),
            thumbnail_public_id: Some("t".into()),
            language: Some("en".into()),
            ..Default::default()
        };
        let (data, duration, thumbnail) = extraction_to_data(extraction);
        assert_eq!(duration, Some(312.5));
        let thumbnail = thumbnail.unwrap();
        assert_eq!(thumbnail.url, "https://cdn.example.com/t.jpg");
        assert_eq!(thumbnail.public_id, "t");
        let metadata = data.metadata.unwrap();
        assert_eq!(metadata.get_str("language").unwrap(), "en");
    }

    #[test]
    fn extraction_merges_extra_metadata() {
        let extraction = MlExtraction {
            metadata: Some(json!({ "pages": 12 })),
            ..Default::default()
        };
        let (data, _, _) = extraction_to_data(extraction);
        let metadata = data.metadata.unwrap();
        assert_eq!(metadata.get_i64("pages").unwrap(), 12);
    }

    #[test]
    fn failed_run_settles_the_record() {
        let update = failure_update("ML extraction timed out");
        assert_eq!(update.get_str("processing_status").unwrap(), "failed");
        assert_eq!(update.get_i32("processing_progress").unwrap(), 100);
        assert_eq!(
            update.get_str("processing_error").unwrap(),
            "ML extraction timed out"
        );
    }
}
