//! HTTP server
//!
//! hyper http1 with TokioIo, one spawned task per accepted connection,
//! manual match-based routing. Request bodies are read fully before
//! dispatch; nothing here streams.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Args;
use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{ContentDoc, DoubtDoc};
use crate::doubts::DoubtService;
use crate::graph::ContentGraph;
use crate::notify::NatsClient;
use crate::pipeline::PipelineQueue;
use crate::routes::{self, error_response, parse_query_params, RequesterIdentity};
use crate::types::AtheneumError;

/// Maximum accepted request body
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: MongoClient,
    pub contents: MongoCollection<ContentDoc>,
    pub doubts: MongoCollection<DoubtDoc>,
    pub nats: Option<NatsClient>,
    pub graph: ContentGraph,
    pub pipeline: PipelineQueue,
    pub doubt_service: DoubtService,
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), AtheneumError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Atheneum listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    info!("[{}] {} {}", addr, method, path);

    // CORS preflight
    if method == Method::OPTIONS {
        return Ok(preflight_response());
    }

    if path.starts_with("/api/") {
        return Ok(handle_api(state, method, &path, &query, req).await);
    }

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state)).await
        }

        (Method::GET, "/version") => routes::version_info(),

        _ => not_found_response(&path),
    };

    Ok(response)
}

/// Dispatch /api/* routes. Every route here requires identity headers.
async fn handle_api(
    state: Arc<AppState>,
    method: Method,
    path: &str,
    query: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let identity = match identity_from(&req) {
        Ok(identity) => identity,
        Err(e) => return routes::error_to_response(&e),
    };

    let body = match read_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let params = parse_query_params(query);

    match (method, path) {
        (Method::POST, "/api/content") => {
            routes::content::create(state, identity, &body).await
        }
        (Method::POST, "/api/content/external") => {
            routes::content::create_external(state, identity, &body).await
        }
        (Method::GET, p) if p.starts_with("/api/content/course/") => {
            let course_id = &p["/api/content/course/".len()..];
            routes::content::list_by_course(state, course_id, &params).await
        }
        (Method::POST, p)
            if p.starts_with("/api/content/") && p.ends_with("/reprocess") =>
        {
            let id = &p["/api/content/".len()..p.len() - "/reprocess".len()];
            routes::content::reprocess(state, identity, id).await
        }
        (Method::GET, p) if p.starts_with("/api/content/") => {
            routes::content::get(state, &p["/api/content/".len()..]).await
        }
        (Method::PUT, p) if p.starts_with("/api/content/") => {
            let id = &p["/api/content/".len()..];
            routes::content::update(state, identity, id, &body).await
        }
        (Method::DELETE, p) if p.starts_with("/api/content/") => {
            routes::content::delete(state, identity, &p["/api/content/".len()..]).await
        }

        (Method::POST, "/api/doubts/ask") => {
            routes::doubts::ask(state, identity, &body).await
        }
        (Method::POST, p) if p.starts_with("/api/doubts/") && p.ends_with("/escalate") => {
            let id = &p["/api/doubts/".len()..p.len() - "/escalate".len()];
            routes::doubts::escalate(state, identity, id).await
        }
        (Method::POST, p) if p.starts_with("/api/doubts/") && p.ends_with("/answer") => {
            let id = &p["/api/doubts/".len()..p.len() - "/answer".len()];
            routes::doubts::answer(state, identity, id, &body).await
        }
        (Method::GET, "/api/doubts/my") => routes::doubts::my_doubts(state, identity).await,
        (Method::GET, p) if p.starts_with("/api/doubts/escalated/") => {
            let course_id = &p["/api/doubts/escalated/".len()..];
            routes::doubts::escalated_for_course(state, identity, course_id).await
        }

        (_, p) => not_found_response(p),
    }
}

fn identity_from(req: &Request<Incoming>) -> Result<RequesterIdentity, AtheneumError> {
    let user_id = req
        .headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok());
    let role = req
        .headers()
        .get("X-User-Role")
        .and_then(|v| v.to_str().ok());
    RequesterIdentity::parse(user_id, role)
}

/// Collect the full request body, enforcing the size cap
async fn read_body(req: Request<Incoming>) -> Result<Bytes, Response<Full<Bytes>>> {
    let collected = req.into_body().collect().await.map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            &format!("Failed to read request body: {}", e),
            "BODY_READ_ERROR",
        )
    })?;

    let body = collected.to_bytes();
    if body.len() > MAX_BODY_BYTES {
        return Err(error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large",
            "BODY_TOO_LARGE",
        ));
    }
    Ok(body)
}

fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type, X-User-Id, X-User-Role",
        )
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("Not found: {}", path),
        "NOT_FOUND",
    )
}
