//! Cypher-over-HTTP client

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use biograph_core::{Error, Result};

/// Connection settings for a Neo4j-compatible database.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jConfig {
    /// Base URI of the HTTP endpoint, e.g. `http://localhost:7474`
    pub uri: String,
    pub username: String,
    pub password: String,
    /// Database name for the transactional endpoint
    pub database: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Rows fetched per read page
    pub page_size: usize,
    /// Records buffered per write batch
    pub batch_size: usize,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:7474".to_string(),
            username: "neo4j".to_string(),
            password: String::new(),
            database: "neo4j".to_string(),
            timeout_secs: 60,
            page_size: 10_000,
            batch_size: 10_000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CypherResponse {
    #[serde(default)]
    results: Vec<CypherResult>,
    #[serde(default)]
    errors: Vec<CypherError>,
}

#[derive(Debug, Deserialize)]
struct CypherResult {
    #[serde(default)]
    data: Vec<CypherRow>,
}

#[derive(Debug, Deserialize)]
struct CypherRow {
    #[serde(default)]
    row: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct CypherError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Blocking client for the transactional commit endpoint.
pub struct CypherClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    username: String,
    password: String,
}

impl CypherClient {
    /// Build a client and verify connectivity with a trivial statement.
    /// Auth failures abort here, at setup time.
    pub fn connect(config: &Neo4jConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::database(format!("client construction failed: {e}")))?;
        let client = Self {
            http,
            endpoint: format!(
                "{}/db/{}/tx/commit",
                config.uri.trim_end_matches('/'),
                config.database
            ),
            username: config.username.clone(),
            password: config.password.clone(),
        };
        client.run("RETURN 1", json!({}))?;
        Ok(client)
    }

    /// Run one statement and return its rows.
    pub fn run(&self, statement: &str, parameters: JsonValue) -> Result<Vec<Vec<JsonValue>>> {
        debug!(statement, "cypher request");
        let body = json!({
            "statements": [{"statement": statement, "parameters": parameters}]
        });
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Error::DatabaseTimeout(statement.to_string())
                } else {
                    Error::database(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::database("authentication failed"));
        }
        if !status.is_success() {
            return Err(Error::database(format!("HTTP {status}")));
        }
        let parsed: CypherResponse = response
            .json()
            .map_err(|e| Error::database(format!("malformed response: {e}")))?;
        if let Some(err) = parsed.errors.first() {
            return Err(Error::database(format!("{}: {}", err.code, err.message)));
        }
        Ok(parsed
            .results
            .into_iter()
            .flat_map(|r| r.data)
            .map(|d| d.row)
            .collect())
    }
}

/// Quote a label or relationship type for safe interpolation.
///
/// Cypher has no parameter slot for labels, so they are backtick-quoted
/// with embedded backticks stripped.
pub fn quote_label(label: &str) -> String {
    format!("`{}`", label.replace('`', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_label() {
        assert_eq!(quote_label("biolink:Gene"), "`biolink:Gene`");
        assert_eq!(quote_label("we`ird"), "`weird`");
    }

    #[test]
    fn test_config_defaults() {
        let config = Neo4jConfig::default();
        assert_eq!(config.page_size, 10_000);
        assert_eq!(config.database, "neo4j");
    }
}
