//! Neo4j HTTP client
//!
//! Talks to the Neo4j transaction-commit endpoint with parameterized
//! Cypher statements. Each call is a single implicit transaction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use crate::types::AtheneumError;

/// Default timeout for graph queries
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// A single Cypher statement with parameters
#[derive(Debug, Serialize)]
struct Statement<'a> {
    statement: &'a str,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct TxRequest<'a> {
    statements: Vec<Statement<'a>>,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Neo4j client over the HTTP transaction API
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    /// Fully formed transaction-commit URL
    endpoint: String,
    user: String,
    password: Option<String>,
}

impl GraphClient {
    /// Create a new graph client against `{uri}/db/{db}/tx/commit`
    pub fn new(
        uri: &str,
        db: &str,
        user: &str,
        password: Option<String>,
    ) -> Result<Self, AtheneumError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_QUERY_TIMEOUT)
            .build()
            .map_err(|e| AtheneumError::Graph(format!("Failed to build HTTP client: {}", e)))?;

        let endpoint = format!("{}/db/{}/tx/commit", uri.trim_end_matches('/'), db);
        info!("Graph client configured for {}", endpoint);

        Ok(Self {
            http,
            endpoint,
            user: user.to_string(),
            password,
        })
    }

    /// Run one parameterized Cypher statement, returning result rows
    pub async fn run(&self, statement: &str, parameters: Value) -> Result<Vec<Vec<Value>>, AtheneumError> {
        let body = TxRequest {
            statements: vec![Statement {
                statement,
                parameters,
            }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.user, self.password.as_deref())
            .json(&body)
            .send()
            .await
            .map_err(|e| AtheneumError::Graph(format!("Graph request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AtheneumError::Graph(format!(
                "Graph endpoint returned {}",
                status
            )));
        }

        let parsed: TxResponse = response
            .json()
            .await
            .map_err(|e| AtheneumError::Graph(format!("Invalid graph response: {}", e)))?;

        if let Some(err) = parsed.errors.first() {
            return Err(AtheneumError::Graph(format!(
                "{}: {}",
                err.code, err.message
            )));
        }

        Ok(parsed
            .results
            .into_iter()
            .next()
            .map(|r| r.data.into_iter().map(|d| d.row).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_trailing_slash() {
        let client =
            GraphClient::new("http://localhost:7474/", "neo4j", "neo4j", None).unwrap();
        assert_eq!(client.endpoint, "http://localhost:7474/db/neo4j/tx/commit");
    }

    #[test]
    fn tx_response_parses_rows() {
        let json = r#"{
            "results": [{"columns": ["answer", "confidence"],
                         "data": [{"row": ["A stack is LIFO.", 92]}]}],
            "errors": []
        }"#;
        let parsed: TxResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.results[0].data[0].row[1], 92);
    }

    #[test]
    fn tx_response_surfaces_errors() {
        let json = r#"{
            "results": [],
            "errors": [{"code": "Neo.ClientError.Statement.SyntaxError", "message": "bad"}]
        }"#;
        let parsed: TxResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].code.contains("SyntaxError"));
    }
}
