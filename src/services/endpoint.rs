use crate::dom::NodeId;
use crate::model::{GenerateError, GenerationRequest, GenerationResponse};
use crate::services::settings::Settings;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

/// The content generation service.
pub trait GenerationEndpoint: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
        csrf_token: &str,
    ) -> Result<GenerationResponse, GenerateError>;
}

pub struct HttpEndpoint {
    client: Client,
    url: String,
    csrf_header: String,
}

impl HttpEndpoint {
    pub fn new(settings: &Settings) -> Result<Self> {
        // No client timeout: a request runs until the server answers or the transport fails
        let client = Client::builder()
            .timeout(None)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            url: settings.endpoint.clone(),
            csrf_header: settings.csrf_header.clone(),
        })
    }
}

impl GenerationEndpoint for HttpEndpoint {
    fn generate(
        &self,
        request: &GenerationRequest,
        csrf_token: &str,
    ) -> Result<GenerationResponse, GenerateError> {
        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(self.csrf_header.as_str(), csrf_token)
            .json(request)
            .send()
            .map_err(|e| GenerateError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| GenerateError::Transport(format!("reading body: {e}")))?;
        parse_response(status, &body)
    }
}

/// The endpoint answers with a JSON envelope whatever the HTTP status, so the
/// body decides; only a body that is not an envelope counts as a transport failure.
pub fn parse_response(status: u16, body: &str) -> Result<GenerationResponse, GenerateError> {
    serde_json::from_str::<GenerationResponse>(body)
        .map_err(|e| GenerateError::Transport(format!("HTTP {status}: invalid response: {e}")))
}

pub struct GenerateMsg {
    pub trigger: NodeId,
    pub outcome: Result<GenerationResponse, GenerateError>,
}

// Run one generation call off the UI thread and report back on `tx`.
pub fn spawn_generate(
    endpoint: Arc<dyn GenerationEndpoint>,
    trigger: NodeId,
    request: GenerationRequest,
    csrf_token: String,
    tx: Sender<GenerateMsg>,
) {
    thread::spawn(move || {
        let outcome = endpoint.generate(&request, &csrf_token);
        let _ = tx.send(GenerateMsg { trigger, outcome });
    });
}
