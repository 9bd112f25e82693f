//! Minimal OpenAI-compatible chat completions client.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "\
You are a precise text normalization assistant for preparing training data.
TASK: Normalize ONLY the provided main article text. Return ONLY the normalized text with no extra commentary, no markdown, no metadata.
REQUIREMENTS:
1) Fix obvious typos and spelling errors.
2) Normalize punctuation and spacing inconsistencies.
3) Remove excessive whitespace/newlines, but preserve intentional line breaks for poetry and paragraphs. Allow at most three consecutive empty lines.
4) Ensure proper capitalization where appropriate.
5) Fix encoding issues or strange characters.
6) Maintain the original meaning, literary quality, style, and voice.
7) Preserve intentional formatting (e.g., poetry line breaks), but avoid over-spacing.
8) Remove any metadata or non-content text (e.g., headers, footers, navigation, ads).
9) Normalize quote characters to straight ASCII single and double quotes.
CONSTRAINTS: Do not add content. Do not summarize. Do not rephrase stylistically beyond necessary corrections. Output plain text only.";

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [Message<'a>; 2],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl ChatClient {
    /// Build a client against `base_url` (or the OpenAI default).
    pub fn new(api_key: String, base_url: Option<String>, model: String) -> Result<Self> {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            url,
            api_key,
            model,
        })
    }

    /// Send article text for normalization and return the cleaned text.
    pub async fn normalize_text(&self, text: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.1,
            messages: [
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: text,
                },
            ],
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("API error: {status} {body}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("unexpected API response format")?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("API response contained no choices")?;

        Ok(choice.message.content.trim().to_string())
    }
}

/// Source of normalized text.
///
/// The pipelines only need one operation from the API, so the seam is a
/// single-method trait; tests substitute an offline implementation.
#[async_trait]
pub trait TextNormalizer {
    async fn normalize(&self, text: &str) -> Result<String>;
}

#[async_trait]
impl TextNormalizer for ChatClient {
    async fn normalize(&self, text: &str) -> Result<String> {
        self.normalize_text(text).await
    }
}
