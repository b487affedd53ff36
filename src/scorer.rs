//! The remote scoring call.
//!
//! [`Scorer`] is the seam the classifier talks through; [`OpenAiScorer`] is the real one,
//! speaking the OpenAI-compatible chat-completions protocol.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::{Error, Result};

/// One remote completion: a system message and a user message in, raw answer text out.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, system: &str, user: &str) -> Result<String>;
}

/// Chat-completions client. Owns its HTTP client and credential.
pub struct OpenAiScorer {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiScorer {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            url: completions_url(&config.endpoint),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request<'a>(&'a self, system: &'a str, user: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl Scorer for OpenAiScorer {
    async fn score(&self, system: &str, user: &str) -> Result<String> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.request(system, user))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { status, body });
        }

        let body: ChatResponse = serde_json::from_str(&resp.text().await?)?;
        let content = first_content(body)?;
        debug!(answer = %content, "model answered");
        Ok(content)
    }
}

fn completions_url(endpoint: &str) -> String {
    format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'))
}

fn first_content(body: ChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .ok_or(Error::EmptyResponse)
}
