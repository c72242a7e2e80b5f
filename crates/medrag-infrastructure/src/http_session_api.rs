//! HttpSessionApi - REST client for the session backend.

use crate::config::ClientConfig;
use async_trait::async_trait;
use medrag_core::error::{MedragError, Result};
use medrag_core::session::{AskRequest, SessionApi};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::{Value, json};

/// [`SessionApi`] over HTTP/JSON.
///
/// Authentication is handled outside this client (e.g. by a proxy or a
/// pre-configured [`Client`]); this type only shapes requests and maps
/// failures into [`MedragError`].
#[derive(Clone)]
pub struct HttpSessionApi {
    client: Client,
    base: Url,
    ask_path: String,
}

impl HttpSessionApi {
    /// Builds a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| MedragError::config(format!("Failed to build HTTP client: {e}")))?;
        Self::with_client(client, config)
    }

    /// Uses a caller-provided [`Client`] (custom TLS, cookies, headers).
    pub fn with_client(client: Client, config: &ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.api_base)
            .map_err(|e| MedragError::config(format!("Invalid api_base '{}': {e}", config.api_base)))?;
        if base.cannot_be_a_base() {
            return Err(MedragError::config(format!(
                "api_base '{}' cannot be used as a base URL",
                config.api_base
            )));
        }
        Ok(Self {
            client,
            base,
            ask_path: config.ask_path.clone(),
        })
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    fn sessions_url(&self, session_id: Option<&str>) -> Url {
        match session_id {
            Some(id) => self.url(&["sessions", id]),
            None => self.url(&["sessions"]),
        }
    }

    fn ask_url(&self) -> Url {
        let segments: Vec<&str> = self.ask_path.split('/').filter(|s| !s.is_empty()).collect();
        self.url(&segments)
    }

    /// Sends the request and decodes the JSON body.
    ///
    /// A 404 on a request that names a session becomes `NotFound`; an empty
    /// or non-JSON success body becomes `Value::Null`.
    async fn execute(&self, request: RequestBuilder, session_id: Option<&str>) -> Result<Value> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = session_id {
                return Err(MedragError::session_not_found(id));
            }
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), body = %body, "backend request failed");
            return Err(MedragError::transport(
                Some(status.as_u16()),
                if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body
                },
            ));
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "backend returned a non-JSON body");
            Value::Null
        }))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> MedragError {
    MedragError::transport(err.status().map(|s| s.as_u16()), err.to_string())
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn list_sessions(&self) -> Result<Value> {
        self.execute(self.client.get(self.sessions_url(None)), None).await
    }

    async fn create_session(&self, title: &str) -> Result<Value> {
        let request = self
            .client
            .post(self.sessions_url(None))
            .json(&json!({ "title": title }));
        self.execute(request, None).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Value> {
        let request = self.client.get(self.sessions_url(Some(session_id)));
        self.execute(request, Some(session_id)).await
    }

    async fn rename_session(&self, session_id: &str, title: &str) -> Result<Value> {
        let request = self
            .client
            .patch(self.sessions_url(Some(session_id)))
            .json(&json!({ "title": title }));
        self.execute(request, Some(session_id)).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let request = self.client.delete(self.sessions_url(Some(session_id)));
        self.execute(request, Some(session_id)).await.map(|_| ())
    }

    async fn ask(&self, request: &AskRequest) -> Result<Value> {
        let http_request = self.client.post(self.ask_url()).json(request);
        self.execute(http_request, Some(&request.session_id)).await
    }
}
