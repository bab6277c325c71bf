// HTTP client wrapper for the DevPulse REST services
//
// Every endpoint answers with an ApiResponse envelope; `get` unwraps it and turns
// `success: false` into ClientError::Rejected carrying the server's message.
// Paths are given as segments and percent-encoded one by one.

use devpulse_core::ApiResponse;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Rejected(String),

    #[error("Not found")]
    NotFound,

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

pub struct Client {
    base_url: Url,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }

    /// Base URL with `segments` appended, each percent-encoded
    pub fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET the path made of `segments` with `query` and return the envelope's payload
    pub async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = self.url(segments)?;
        let response = self.http.get(url).query(query).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Error bodies are usually envelopes too; prefer their message
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&text)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or(text);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<T> = response.json().await?;
        envelope.into_result().map_err(ClientError::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devpulse_core::{Event, Page};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_unwraps_paged_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/logs"))
            .and(query_param("page", "2"))
            .and(query_param("size", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Logs fetched",
                "data": {
                    "content": [{
                        "id": "l-1",
                        "timestamp": "2026-10-16T08:30:00Z",
                        "level": "WARN",
                        "serviceName": "producer-product",
                        "message": "stock low"
                    }],
                    "totalPages": 3,
                    "totalElements": 21,
                    "number": 2
                }
            })))
            .mount(&server)
            .await;

        let client = Client::new(&format!("{}/", server.uri())).unwrap();
        let page: Page<Event> = client
            .get(
                &["api", "logs"],
                &[("page", "2".to_string()), ("size", "10".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].service_name, "producer-product");
        assert_eq!(page.number, Some(2));
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_rejected_with_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/alerts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "Failed to fetch alerts"
            })))
            .mount(&server)
            .await;

        let client = Client::new(&server.uri()).unwrap();
        let err = client
            .get::<Vec<serde_json::Value>>(&["api", "alerts"], &[])
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Rejected(_)));
        assert_eq!(err.to_string(), "Failed to fetch alerts");
    }

    #[tokio::test]
    async fn test_error_status_prefers_envelope_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/logs/range"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "success": false,
                "message": "Text '2026-13-01' could not be parsed"
            })))
            .mount(&server)
            .await;

        let client = Client::new(&server.uri()).unwrap();
        let err = client
            .get::<Page<Event>>(&["api", "logs", "range"], &[])
            .await
            .unwrap_err();

        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("could not be parsed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_not_found() {
        let server = MockServer::start().await;
        let client = Client::new(&server.uri()).unwrap();
        let err = client
            .get::<Vec<Event>>(&["api", "logs", "recent"], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound));
    }

    #[test]
    fn test_segments_are_percent_encoded() {
        let client = Client::new("http://localhost:8080/gateway/").unwrap();
        let url = client
            .url(&["api", "logs", "service", "orders#eu/west?x"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/gateway/api/logs/service/orders%23eu%2Fwest%3Fx"
        );

        assert!(matches!(
            Client::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
