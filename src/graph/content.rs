//! Content nodes and relationships in the knowledge graph
//!
//! Content nodes are merged by Mongo id, linked to their course, to the
//! topics the extractor found, and to other content sharing a topic.
//! The Mongo record stays behind on delete; the graph node does not.

use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::db::schemas::ContentDoc;
use crate::graph::GraphClient;
use crate::types::Result;

/// Graph operations for content artifacts
#[derive(Clone)]
pub struct ContentGraph {
    client: Arc<GraphClient>,
}

impl ContentGraph {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }

    /// Merge the content node, returning its graph id (the Mongo id string)
    pub async fn merge_content_node(&self, content: &ContentDoc) -> Result<String> {
        let id = content
            ._id
            .map(|oid| oid.to_hex())
            .unwrap_or_default();

        let (summary, keywords) = match &content.extracted_data {
            Some(data) => (data.summary.clone(), data.keywords.clone()),
            None => (String::new(), Vec::new()),
        };

        self.client
            .run(
                "MERGE (c:Content {id: $id})
                 SET c.title = $title, c.type = $type, c.summary = $summary,
                     c.keywords = $keywords, c.updatedAt = datetime()",
                json!({
                    "id": id,
                    "title": content.title,
                    "type": content.content_type.as_str(),
                    "summary": summary,
                    "keywords": keywords,
                }),
            )
            .await?;

        debug!(content_id = %id, "Merged content node");
        Ok(id)
    }

    /// Link a content node to its owning course
    pub async fn link_to_course(&self, content_id: &str, course_id: &str) -> Result<()> {
        self.client
            .run(
                "MATCH (c:Content {id: $contentId})
                 MERGE (course:Course {id: $courseId})
                 MERGE (c)-[:BELONGS_TO]->(course)",
                json!({ "contentId": content_id, "courseId": course_id }),
            )
            .await?;
        Ok(())
    }

    /// Merge topic nodes and connect the content to each
    pub async fn merge_topics(&self, content_id: &str, topics: &[String]) -> Result<()> {
        if topics.is_empty() {
            return Ok(());
        }

        self.client
            .run(
                "MATCH (c:Content {id: $contentId})
                 UNWIND $topics AS topic
                 MERGE (t:Topic {name: topic})
                 MERGE (c)-[:COVERS]->(t)",
                json!({ "contentId": content_id, "topics": topics }),
            )
            .await?;
        Ok(())
    }

    /// Connect content items that share at least one topic
    pub async fn link_related(&self, content_id: &str) -> Result<()> {
        self.client
            .run(
                "MATCH (c:Content {id: $contentId})-[:COVERS]->(t:Topic)<-[:COVERS]-(other:Content)
                 WHERE other.id <> $contentId
                 MERGE (c)-[:RELATED_TO]-(other)",
                json!({ "contentId": content_id }),
            )
            .await?;
        Ok(())
    }

    /// Remove a content node and all its relationships
    pub async fn delete_node(&self, content_id: &str) -> Result<()> {
        self.client
            .run(
                "MATCH (c:Content {id: $contentId}) DETACH DELETE c",
                json!({ "contentId": content_id }),
            )
            .await?;
        Ok(())
    }
}
