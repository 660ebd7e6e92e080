//! GitHub GraphQL transport.
//!
//! The [`Transport`] trait is the seam between the executor and the network.
//! [`GithubClient`] implements it over HTTPS; tests substitute scripted
//! transports.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default GitHub GraphQL endpoint.
pub const DEFAULT_GITHUB_URL: &str = "https://api.github.com/graphql";

const USER_AGENT: &str = concat!("repo-rhythm/", env!("CARGO_PKG_VERSION"));

/// Errors returned by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request could not be sent or its body read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The GraphQL response carried errors.
    #[error("GraphQL error: {0}")]
    Graphql(String),

    /// The GraphQL response had neither data nor errors.
    #[error("GraphQL response contained no data")]
    MissingData,

    /// The authentication token cannot be used as a header value.
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),
}

/// Sends one GraphQL document with its variables and returns the `data` object.
///
/// Implementations must be safe to call concurrently from several beats.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes a query document.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response carries errors.
    async fn query(&self, document: &str, variables: Value) -> Result<Value, TransportError>;
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorMessage>,
}

#[derive(Deserialize)]
struct GraphqlErrorMessage {
    message: String,
}

/// GitHub GraphQL v4 client authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    url: String,
}

impl GithubClient {
    /// Creates a client for the given endpoint and token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(url: impl Into<String>, token: &str) -> Result<Self, TransportError> {
        let mut auth = HeaderValue::from_str(&format!("bearer {token}"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Returns the endpoint this client talks to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for GithubClient {
    async fn query(&self, document: &str, variables: Value) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GraphqlRequest {
                query: document,
                variables,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GraphqlResponse = response.json().await?;
        into_data(body)
    }
}

fn into_data(response: GraphqlResponse) -> Result<Value, TransportError> {
    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(TransportError::Graphql(messages.join("; ")));
    }

    response.data.ok_or(TransportError::MissingData)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> GraphqlResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_into_data_returns_data() {
        let data = into_data(parse(json!({"data": {"rateLimit": {"remaining": 10}}}))).unwrap();
        assert_eq!(data["rateLimit"]["remaining"], 10);
    }

    #[test]
    fn test_into_data_joins_errors() {
        let result = into_data(parse(json!({
            "data": null,
            "errors": [
                {"message": "Could not resolve to a Repository"},
                {"message": "Something else"}
            ]
        })));

        match result {
            Err(TransportError::Graphql(message)) => {
                assert_eq!(message, "Could not resolve to a Repository; Something else");
            }
            other => panic!("expected GraphQL error, got {other:?}"),
        }
    }

    #[test]
    fn test_into_data_errors_win_over_partial_data() {
        let result = into_data(parse(json!({
            "data": {"repository": null},
            "errors": [{"message": "NOT_FOUND"}]
        })));
        assert!(matches!(result, Err(TransportError::Graphql(_))));
    }

    #[test]
    fn test_into_data_missing_data() {
        let result = into_data(parse(json!({})));
        assert!(matches!(result, Err(TransportError::MissingData)));
    }

    #[test]
    fn test_client_creation() {
        let client = GithubClient::new(DEFAULT_GITHUB_URL, "token").unwrap();
        assert_eq!(client.url(), DEFAULT_GITHUB_URL);
    }

    #[test]
    fn test_client_rejects_invalid_token() {
        let result = GithubClient::new(DEFAULT_GITHUB_URL, "bad\ntoken");
        assert!(matches!(result, Err(TransportError::InvalidToken(_))));
    }

    #[test]
    fn test_request_serialization() {
        let request = GraphqlRequest {
            query: "query { viewer { login } }",
            variables: json!({"owner": "grafana"}),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["query"], "query { viewer { login } }");
        assert_eq!(value["variables"]["owner"], "grafana");
    }
}
