use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("HTTP {status} client error: {message}")]
    Http4xx { status: u16, message: String },

    #[error("HTTP {status} server error: {message}")]
    Http5xx { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("request error: {0}")]
    Other(String),
}

/// What the service reports as loaded: the active model plus everything it
/// could switch to, in the service's own order.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub current_model: String,
    pub available_models: Vec<String>,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    input_data: &'a [f64],
}

/// One inference response. The service reports its own processing time;
/// extra fields (predictions etc.) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceResponse {
    pub inference_time: f64,
}

/// Blocking-style HTTP client for the model-serving API. Holds no state
/// beyond the connection pool; the remote "current model" is the only state
/// any call mutates.
#[derive(Debug, Clone)]
pub struct ModelServerClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ModelServerClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /model - the active model and the list of switchable models.
    pub async fn fetch_model_info(&self) -> Result<ModelInfo, ClientError> {
        let url = format!("{}/model", self.base_url);

        let response = self.client.get(&url).send().await;
        let response = self.check_response(response).await?;

        response
            .json::<ModelInfo>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// POST /model/{name} - make `name` the active model. Safe to repeat with
    /// the same name; the service overwrites its current-model state either
    /// way. Success must be checked: there is nothing to roll back locally.
    pub async fn switch_model(&self, name: &str) -> Result<(), ClientError> {
        let url = format!("{}/model/{}", self.base_url, name);

        let response = self.client.post(&url).send().await;
        self.check_response(response).await.map(|_| ())
    }

    /// POST /inference with the payload as JSON. A 2xx response that does not
    /// carry a parseable `inference_time` counts as a failure.
    pub async fn perform_inference(
        &self,
        input_data: &[f64],
    ) -> Result<InferenceResponse, ClientError> {
        let url = format!("{}/inference", self.base_url);
        let request = InferenceRequest { input_data };

        let response = self.client.post(&url).json(&request).send().await;
        let response = self.check_response(response).await?;

        response
            .json::<InferenceResponse>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Classify a transport result: connection/timeout errors and non-2xx
    /// statuses become `ClientError`s, with the response body surfaced for
    /// diagnostics when the server sent one.
    async fn check_response(
        &self,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<reqwest::Response, ClientError> {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                if e.is_timeout() {
                    return Err(ClientError::Timeout(self.timeout));
                } else if e.is_connect() {
                    return Err(ClientError::Connection(e.to_string()));
                } else {
                    return Err(ClientError::Other(e.to_string()));
                }
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read response body".to_string());

        if (400..500).contains(&status_code) {
            Err(ClientError::Http4xx {
                status: status_code,
                message,
            })
        } else if (500..600).contains(&status_code) {
            Err(ClientError::Http5xx {
                status: status_code,
                message,
            })
        } else {
            Err(ClientError::Other(format!("HTTP {}: {}", status_code, message)))
        }
    }
}
