//! Minimal client for an OpenAI-compatible `/chat/completions` endpoint.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use chaingraph_shared::{GraphError, LlmConfig, Result};

/// User-Agent string for collaborator requests.
pub(crate) const USER_AGENT: &str = concat!("chaingraph/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion client shared by every model-backed collaborator.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
}

impl ChatClient {
    /// Build a client from `[llm]` config. The API key is read from the env var
    /// named by `api_key_env`; local servers may run without one.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base = config.base_url()?;
        let client = build_client(config.timeout_secs)?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `{base_url}/{path}`, keeping any path prefix such as `/v1`.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| GraphError::config(format!("invalid endpoint '{raw}': {e}")))
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Send one system + user exchange and return the assistant's text.
    #[instrument(skip_all, fields(model = %self.model))]
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let url = self.endpoint("chat/completions")?;
        let body = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .authorize(self.client.post(url.clone()).json(&body))
            .send()
            .await
            .map_err(|e| GraphError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::Network(format!("{url}: HTTP {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GraphError::parse(format!("{url}: invalid completion body: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GraphError::Generation("completion had no content".into()))?;

        debug!(chars = content.chars().count(), "completion received");
        Ok(content)
    }
}

/// Build a reqwest client with the given timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| GraphError::Network(format!("failed to build HTTP client: {e}")))
}
