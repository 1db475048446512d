//! Atheneum service entry point

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atheneum::{
    config::Args,
    db::schemas::{CONTENT_COLLECTION, DOUBT_COLLECTION},
    db::MongoClient,
    doubts::DoubtService,
    graph::{ContentGraph, GraphClient, GraphKnowledge},
    notify::NatsClient,
    pipeline::{PipelineQueue, Processor},
    server::{self, AppState},
    services::{LlmClient, LocalExtractor, MlClient, YoutubeClient},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("atheneum={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Atheneum - content & doubt service");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("MongoDB: {}", args.mongodb_uri);
    info!("NATS: {}", args.nats.nats_url);
    info!("Neo4j: {}", args.neo4j_uri);
    info!("ML service: {}", args.ml_service_url);
    info!("LLM model: {}", args.groq_model);
    info!("Pipeline workers: {}", args.pipeline_workers);
    info!("======================================");

    // MongoDB is the system of record and always required
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };
    let contents = mongo.collection(CONTENT_COLLECTION).await?;
    let doubts = mongo.collection(DOUBT_COLLECTION).await?;

    // NATS carries best-effort notifications; optional in dev mode
    let nats = match NatsClient::new(&args.nats, &format!("atheneum-{}", args.node_id)).await {
        Ok(client) => Some(client),
        Err(e) => {
            if args.dev_mode {
                warn!("NATS connection failed (dev mode, continuing without): {}", e);
                None
            } else {
                error!("NATS connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let graph_client = Arc::new(GraphClient::new(
        &args.neo4j_uri,
        &args.neo4j_db,
        &args.neo4j_user,
        args.neo4j_password.clone(),
    )?);
    let content_graph = ContentGraph::new(Arc::clone(&graph_client));
    let knowledge = Arc::new(GraphKnowledge::new(Arc::clone(&graph_client)));

    let ml = MlClient::new(
        &args.ml_service_url,
        Duration::from_secs(args.ml_timeout_secs),
    )?;
    let local = LocalExtractor::new()?;

    // Without a key every tutor call fails over to 503; validate() only
    // allows that in dev mode
    let groq_key = args.groq_api_key.clone().unwrap_or_default();
    if groq_key.is_empty() {
        warn!("No GROQ_API_KEY set, doubt answering will be unavailable");
    }
    let tutor = Arc::new(LlmClient::new(
        &groq_key,
        &args.groq_model,
        Duration::from_secs(args.groq_timeout_secs),
    )?);

    let youtube = YoutubeClient::new();
    if youtube.is_none() {
        warn!("YouTube suggestion client unavailable, continuing without");
    }

    let processor = Processor::new(
        contents.clone(),
        ml,
        local,
        content_graph.clone(),
    );
    let pipeline = PipelineQueue::start(processor, args.pipeline_workers, args.pipeline_queue_size);

    let doubt_service = DoubtService::new(
        doubts.clone(),
        contents.clone(),
        knowledge,
        tutor,
        youtube,
        nats.clone(),
    );

    let state = Arc::new(AppState {
        args,
        mongo,
        contents,
        doubts,
        nats,
        graph: content_graph,
        pipeline,
        doubt_service,
    });

    server::run(state).await?;
    Ok(())
}
