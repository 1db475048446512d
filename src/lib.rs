//! Atheneum - education platform content and doubt service
//!
//! HTTP API for course learning content with an asynchronous ingestion
//! pipeline (extraction, knowledge-graph linkage, publication) and an
//! AI doubt resolution workflow (knowledge-base lookup, hosted LLM,
//! threshold-based escalation to faculty).

pub mod config;
pub mod db;
pub mod doubts;
pub mod graph;
pub mod notify;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use types::{AtheneumError, Result};
