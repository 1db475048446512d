//! HTTP route handlers
//!
//! Handlers translate between HTTP and the service layer. Identity
//! arrives pre-authenticated as `X-User-Id`/`X-User-Role` headers set by
//! the fronting gateway; this service only checks roles and ownership.

pub mod content;
pub mod doubts;
pub mod health;

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::collections::HashMap;

use crate::types::AtheneumError;

pub use health::{health_check, readiness_check, version_info};

/// API error response body
#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    code: &'static str,
}

/// Role asserted by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Faculty,
}

/// Authenticated requester, parsed from gateway headers
#[derive(Debug, Clone, Copy)]
pub struct RequesterIdentity {
    pub user_id: ObjectId,
    pub role: Role,
}

impl RequesterIdentity {
    /// Parse from `X-User-Id` and `X-User-Role` header values.
    /// A missing or malformed user id is unauthorized; an unknown role
    /// falls back to student (least privilege).
    pub fn parse(
        user_id: Option<&str>,
        role: Option<&str>,
    ) -> Result<Self, AtheneumError> {
        let user_id = user_id
            .ok_or_else(|| AtheneumError::Unauthorized("Missing X-User-Id header".into()))?;
        let user_id = ObjectId::parse_str(user_id)
            .map_err(|_| AtheneumError::Unauthorized("Invalid X-User-Id header".into()))?;

        let role = match role.map(|r| r.trim().to_lowercase()).as_deref() {
            Some("faculty") | Some("admin") => Role::Faculty,
            _ => Role::Student,
        };

        Ok(Self { user_id, role })
    }

    pub fn require_faculty(&self) -> Result<(), AtheneumError> {
        if self.role != Role::Faculty {
            return Err(AtheneumError::Forbidden(
                "Faculty role required".into(),
            ));
        }
        Ok(())
    }
}

/// Build a JSON error response
pub fn error_response(
    status: StatusCode,
    message: &str,
    code: &'static str,
) -> Response<Full<Bytes>> {
    let error = ApiError {
        error: message.to_string(),
        code,
    };
    let body = serde_json::to_vec(&error).unwrap_or_default();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-cache")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(r#"{"error":"Internal error"}"#)))
                .unwrap()
        })
}

/// Build a JSON response with the given status
pub fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let body = match serde_json::to_vec(data) {
        Ok(body) => body,
        Err(_) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode response",
                "INTERNAL_ERROR",
            )
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-cache")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to build response",
                "INTERNAL_ERROR",
            )
        })
}

/// Map a service error to its HTTP response
pub fn error_to_response(err: &AtheneumError) -> Response<Full<Bytes>> {
    let status = match err {
        AtheneumError::Validation(_) => StatusCode::BAD_REQUEST,
        AtheneumError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AtheneumError::Forbidden(_) => StatusCode::FORBIDDEN,
        AtheneumError::NotFound(_) => StatusCode::NOT_FOUND,
        AtheneumError::Overloaded(_) | AtheneumError::Llm(_) => StatusCode::SERVICE_UNAVAILABLE,
        AtheneumError::Ml(_) | AtheneumError::Graph(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    // The raw LLM error is server-side detail; clients get a stable message
    let message = match err {
        AtheneumError::Llm(_) => "AI tutor is currently unavailable".to_string(),
        other => other.to_string(),
    };

    error_response(status, &message, err.code())
}

/// Parse query string into key-value map
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    if query.is_empty() {
        return HashMap::new();
    }

    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Parse an ObjectId path segment
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, AtheneumError> {
    ObjectId::parse_str(raw)
        .map_err(|_| AtheneumError::Validation(format!("Invalid {} id", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_user_id() {
        let err = RequesterIdentity::parse(None, Some("faculty")).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");

        let err = RequesterIdentity::parse(Some("not-an-oid"), None).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn identity_role_defaults_to_student() {
        let oid = ObjectId::new().to_hex();
        let identity = RequesterIdentity::parse(Some(&oid), None).unwrap();
        assert_eq!(identity.role, Role::Student);

        let identity = RequesterIdentity::parse(Some(&oid), Some("mystery")).unwrap();
        assert_eq!(identity.role, Role::Student);
        assert!(identity.require_faculty().is_err());
    }

    #[test]
    fn faculty_and_admin_both_map_to_faculty() {
        let oid = ObjectId::new().to_hex();
        let identity = RequesterIdentity::parse(Some(&oid), Some("Faculty")).unwrap();
        assert_eq!(identity.role, Role::Faculty);
        assert!(identity.require_faculty().is_ok());

        let identity = RequesterIdentity::parse(Some(&oid), Some("admin")).unwrap();
        assert_eq!(identity.role, Role::Faculty);
    }

    #[test]
    fn query_params_parse() {
        let params = parse_query_params("type=pdf&published=true");
        assert_eq!(params.get("type").map(String::as_str), Some("pdf"));
        assert_eq!(params.get("published").map(String::as_str), Some("true"));
        assert!(parse_query_params("").is_empty());
    }

    #[test]
    fn llm_errors_hide_details() {
        let response = error_to_response(&AtheneumError::Llm("groq 500".into()));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn overloaded_maps_to_503() {
        let response = error_to_response(&AtheneumError::Overloaded("queue full".into()));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
