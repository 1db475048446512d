//! Health, readiness and version probes

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;
use std::sync::Arc;

use crate::routes::json_response;
use crate::server::AppState;

/// Liveness: the process is up and serving
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &json!({
            "status": "ok",
            "node_id": state.args.node_id,
        }),
    )
}

/// Readiness: dependencies this node needs to do useful work.
/// Mongo must answer a ping and the pipeline workers must be alive.
pub async fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let mongo_ok = state.mongo.ping().await.is_ok();
    let pipeline_ok = state.pipeline.is_healthy();
    let ready = mongo_ok && pipeline_ok;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(
        status,
        &json!({
            "ready": ready,
            "mongo": mongo_ok,
            "pipeline": {
                "healthy": pipeline_ok,
                "workers": state.pipeline.worker_count(),
                "queued": state.pipeline.depth(),
            },
        }),
    )
}

/// Version info for deployment verification
pub fn version_info() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "commit": option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
            "build_time": option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        }),
    )
}
