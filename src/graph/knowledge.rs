//! Verified-answer knowledge store
//!
//! Deduplicated question+context keys mapped to answers in the graph,
//! consulted before any LLM call. Entries only exist at high confidence:
//! the automated path writes at >= 85, faculty answers at 100.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::graph::GraphClient;
use crate::types::Result;

/// Minimum stored confidence for a lookup to qualify as a hit
pub const MIN_KNOWLEDGE_CONFIDENCE: i32 = 80;

/// Build the deduplication key from a query and its context
pub fn lookup_key(query: &str, context: &str) -> String {
    let query = query.trim().to_lowercase();
    let context = context.trim().to_lowercase();
    if context.is_empty() {
        query
    } else {
        format!("{}|{}", query, context)
    }
}

/// A verified answer found in the knowledge store
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeHit {
    pub answer: String,
    pub confidence: i32,
}

/// Seam over the graph-backed knowledge store, mockable in tests
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Look up a verified answer: content-scoped partition first, then
    /// global, both gated at [`MIN_KNOWLEDGE_CONFIDENCE`].
    async fn lookup(&self, key: &str, content_id: Option<&str>) -> Result<Option<KnowledgeHit>>;

    /// Write a verified answer under the key, optionally linked to content
    async fn save(
        &self,
        key: &str,
        query: &str,
        context: &str,
        answer: &str,
        confidence: i32,
        content_id: Option<&str>,
    ) -> Result<()>;
}

/// Neo4j-backed knowledge store
#[derive(Clone)]
pub struct GraphKnowledge {
    client: Arc<GraphClient>,
}

impl GraphKnowledge {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }

    fn hit_from_rows(rows: Vec<Vec<serde_json::Value>>) -> Option<KnowledgeHit> {
        let row = rows.into_iter().next()?;
        let answer = row.first()?.as_str()?.to_string();
        let confidence = row.get(1)?.as_i64()? as i32;
        Some(KnowledgeHit { answer, confidence })
    }
}

#[async_trait]
impl KnowledgeStore for GraphKnowledge {
    async fn lookup(&self, key: &str, content_id: Option<&str>) -> Result<Option<KnowledgeHit>> {
        // Content-scoped partition first: an answer verified against this
        // exact artifact beats a global one.
        if let Some(content_id) = content_id {
            let rows = self
                .client
                .run(
                    "MATCH (c:Content {id: $contentId})<-[:RELATES_TO]-(d:Doubt {queryKey: $key})
                     WHERE d.confidence >= $minConfidence
                     RETURN d.answer AS answer, d.confidence AS confidence
                     LIMIT 1",
                    json!({
                        "contentId": content_id,
                        "key": key,
                        "minConfidence": MIN_KNOWLEDGE_CONFIDENCE,
                    }),
                )
                .await?;

            if let Some(hit) = Self::hit_from_rows(rows) {
                return Ok(Some(hit));
            }
        }

        let rows = self
            .client
            .run(
                "MATCH (d:Doubt {queryKey: $key})
                 WHERE d.confidence >= $minConfidence
                 RETURN d.answer AS answer, d.confidence AS confidence
                 LIMIT 1",
                json!({ "key": key, "minConfidence": MIN_KNOWLEDGE_CONFIDENCE }),
            )
            .await?;

        Ok(Self::hit_from_rows(rows))
    }

    async fn save(
        &self,
        key: &str,
        query: &str,
        context: &str,
        answer: &str,
        confidence: i32,
        content_id: Option<&str>,
    ) -> Result<()> {
        self.client
            .run(
                "MERGE (d:Doubt {queryKey: $key})
                 SET d.query = $query, d.context = $context, d.answer = $answer,
                     d.confidence = $confidence, d.updatedAt = datetime()
                 WITH d
                 OPTIONAL MATCH (c:Content {id: $contentId})
                 FOREACH (ignoreMe IN CASE WHEN c IS NOT NULL THEN [1] ELSE [] END |
                     MERGE (d)-[:RELATES_TO]->(c)
                 )",
                json!({
                    "key": key,
                    "query": query.trim(),
                    "context": context.trim(),
                    "answer": answer,
                    "confidence": confidence,
                    "contentId": content_id,
                }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_key_lowercases_and_trims() {
        assert_eq!(lookup_key("  What is a Stack? ", ""), "what is a stack?");
        assert_eq!(
            lookup_key("What is a Stack?", " LIFO structures "),
            "what is a stack?|lifo structures"
        );
    }

    #[test]
    fn identical_pairs_produce_identical_keys() {
        let a = lookup_key("What is a stack?", "chapter 3");
        let b = lookup_key("what is a stack?  ", "Chapter 3");
        assert_eq!(a, b);
    }

    #[test]
    fn hit_from_rows_reads_answer_and_confidence() {
        let rows = vec![vec![json!("A stack is LIFO."), json!(92)]];
        let hit = GraphKnowledge::hit_from_rows(rows).unwrap();
        assert_eq!(hit.answer, "A stack is LIFO.");
        assert_eq!(hit.confidence, 92);
    }

    #[test]
    fn hit_from_rows_empty_is_none() {
        assert!(GraphKnowledge::hit_from_rows(vec![]).is_none());
    }
}
