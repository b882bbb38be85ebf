use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// --- Provider trait ---

pub trait AIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

/// Environment variable holding the chat completions API key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const KNOWN_MODELS: [&str; 3] = ["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini"];

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub model_id: String,
}

/// Accepts the known chat models, plus `mini` as a shorthand for the default.
pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let name = name.trim();
    let model_id = match name {
        "mini" => DEFAULT_MODEL,
        known if KNOWN_MODELS.contains(&known) => known,
        _ => {
            return Err(anyhow!(
                "Unknown model '{}'. Available: {} (default), {}",
                name,
                DEFAULT_MODEL,
                KNOWN_MODELS[1..].join(", ")
            ));
        }
    };
    Ok(ModelSpec { model_id: model_id.to_string() })
}

pub fn create_provider(spec: &ModelSpec, api_key: &str, temperature: f32) -> Result<Box<dyn AIProvider>> {
    let provider = OpenAIProvider::new(api_key, spec.model_id.clone(), temperature)?;
    Ok(Box::new(provider))
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    temperature: f32,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(api_key: &str, model_id: String, temperature: f32) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(anyhow!("{} is empty", API_KEY_VAR));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key: api_key.to_string(),
            model_id,
            temperature,
            client,
        })
    }
}

impl AIProvider for OpenAIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = ChatRequest {
            model: &self.model_id,
            max_tokens,
            temperature: self.temperature,
            messages: vec![ChatMessage { role: "user", content: prompt }],
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: ChatResponse = response
            .json()
            .context("Failed to parse OpenAI API response")?;
        api_response.into_text()
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
