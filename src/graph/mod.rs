//! Knowledge graph layer (Neo4j over HTTP)

pub mod client;
pub mod content;
pub mod knowledge;

pub use client::GraphClient;
pub use content::ContentGraph;
pub use knowledge::{lookup_key, GraphKnowledge, KnowledgeHit, KnowledgeStore, MIN_KNOWLEDGE_CONFIDENCE};
