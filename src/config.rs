//! Configuration for Atheneum
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Atheneum - education platform content and doubt service
#[derive(Parser, Debug, Clone)]
#[command(name = "atheneum")]
#[command(about = "Content ingestion and AI doubt resolution backend")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "atheneum")]
    pub mongodb_db: String,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// Neo4j HTTP endpoint (transaction API base, e.g. "http://localhost:7474")
    #[arg(long, env = "NEO4J_URI", default_value = "http://localhost:7474")]
    pub neo4j_uri: String,

    /// Neo4j database name
    #[arg(long, env = "NEO4J_DB", default_value = "neo4j")]
    pub neo4j_db: String,

    /// Neo4j username
    #[arg(long, env = "NEO4J_USER", default_value = "neo4j")]
    pub neo4j_user: String,

    /// Neo4j password
    #[arg(long, env = "NEO4J_PASSWORD")]
    pub neo4j_password: Option<String>,

    /// Base URL of the Python ML extraction service
    #[arg(long, env = "ML_SERVICE_URL", default_value = "http://localhost:8000")]
    pub ml_service_url: String,

    /// ML extraction timeout in seconds (transcription can take minutes)
    #[arg(long, env = "ML_TIMEOUT_SECS", default_value = "300")]
    pub ml_timeout_secs: u64,

    /// Groq API key for the LLM doubt tutor (required in production)
    #[arg(long, env = "GROQ_API_KEY")]
    pub groq_api_key: Option<String>,

    /// Groq model identifier
    #[arg(long, env = "GROQ_MODEL", default_value = "llama-3.3-70b-versatile")]
    pub groq_model: String,

    /// Groq request timeout in seconds
    #[arg(long, env = "GROQ_TIMEOUT_SECS", default_value = "30")]
    pub groq_timeout_secs: u64,

    /// Number of ingestion pipeline worker tasks
    #[arg(long, env = "PIPELINE_WORKERS", default_value = "2")]
    pub pipeline_workers: usize,

    /// Maximum queued ingestion jobs before uploads are rejected
    #[arg(long, env = "PIPELINE_QUEUE_SIZE", default_value = "256")]
    pub pipeline_queue_size: usize,

    /// Enable development mode (missing Groq key tolerated, NATS optional)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.dev_mode && self.groq_api_key.is_none() {
            return Err("GROQ_API_KEY is required in production mode".to_string());
        }

        if self.pipeline_workers == 0 {
            return Err("PIPELINE_WORKERS must be at least 1".to_string());
        }

        if self.pipeline_queue_size == 0 {
            return Err("PIPELINE_QUEUE_SIZE must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["atheneum", "--dev-mode"])
    }

    #[test]
    fn dev_mode_tolerates_missing_groq_key() {
        let args = base_args();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn production_requires_groq_key() {
        let args = Args::parse_from(["atheneum"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn rejects_zero_workers() {
        let mut args = base_args();
        args.pipeline_workers = 0;
        assert!(args.validate().is_err());
    }
}
