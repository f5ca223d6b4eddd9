//! Answer generation with a hosted language model.
//!
//! [`build_prompt`] puts the retrieved chunks and the question into a single
//! prompt that restricts the model to the given context. A [`Generator`]
//! turns that prompt into text; its output is passed back verbatim.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::http;
use crate::models::ScoredChunk;

const INSTRUCTIONS: &str = "You are helping a candidate prepare for job interviews. \
Answer the question based only on the provided context. \
If the context does not contain the answer, say that you don't know based on the uploaded documents.";

/// Build the single prompt sent to the model.
pub fn build_prompt(chunks: &[ScoredChunk], question: &str) -> String {
    let context = chunks
        .iter()
        .map(|c| c.chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{}\n\nContext:\n{}\n\nQuestion: {}\nAnswer:",
        INSTRUCTIONS,
        context,
        question.trim()
    )
}

/// Turns a prompt into free text.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Used when `llm.provider = "disabled"`. Every call fails.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Language model provider is disabled. Set [llm] provider in config.")
    }
}

/// A configured provider that could not be constructed. Every call fails
/// with the construction error.
pub struct UnavailableGenerator {
    provider: String,
    reason: String,
}

impl UnavailableGenerator {
    pub fn new(provider: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            provider: provider.into(),
            reason: format!("{:#}", err),
        }
    }
}

#[async_trait]
impl Generator for UnavailableGenerator {
    fn model_name(&self) -> &str {
        &self.provider
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!(
            "{} language model provider unavailable: {}",
            self.provider,
            self.reason
        )
    }
}

/// Calls `POST {base}/v1/chat/completions` with a single user message.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_retries: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .map(|u| http::trim_base_url(&u))
            .unwrap_or_else(|_| "https://api.openai.com".to_string());

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            api_key,
            base_url,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let json = http::post_json(
            &self.client,
            "OpenAI",
            &format!("{}/v1/chat/completions", self.base_url),
            Some(&self.api_key),
            &self.request_body(prompt),
            self.max_retries,
        )
        .await?;
        parse_openai_chat(&json)
    }
}

fn parse_openai_chat(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

/// Calls `POST {url}/api/chat` on a local Ollama instance, non-streaming.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for Ollama provider"))?;
        let url = http::trim_base_url(config.url.as_deref().unwrap_or("http://localhost:11434"));

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut options = serde_json::json!({ "temperature": self.temperature });
        if let Some(max_tokens) = self.max_tokens {
            options["num_predict"] = serde_json::json!(max_tokens);
        }
        serde_json::json!({
            "model": self.model,
            "stream": false,
            "messages": [{ "role": "user", "content": prompt }],
            "options": options,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let json = http::post_json(
            &self.client,
            "Ollama",
            &format!("{}/api/chat", self.url),
            None,
            &self.request_body(prompt),
            self.max_retries,
        )
        .await?;
        parse_ollama_chat(&json)
    }
}

fn parse_ollama_chat(json: &serde_json::Value) -> Result<String> {
    json.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
}

pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAiGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextChunk;
    use serde_json::json;

    fn scored(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: TextChunk {
                id: "c".to_string(),
                index: 0,
                text: text.to_string(),
                start: 0,
                hash: String::new(),
            },
            score,
        }
    }

    #[test]
    fn prompt_contains_context_question_and_instruction() {
        let prompt = build_prompt(
            &[
                scored("The project used a distributed cache with LRU eviction.\n", 0.9),
                scored("Deployed on Kubernetes.", 0.4),
            ],
            "  What eviction policy was used? ",
        );
        assert!(prompt.contains("based only on the provided context"));
        assert!(prompt.contains(
            "Context:\nThe project used a distributed cache with LRU eviction.\n\nDeployed on Kubernetes.\n\n"
        ));
        assert!(prompt.ends_with("Question: What eviction policy was used?\nAnswer:"));
    }

    #[test]
    fn context_keeps_retrieval_order() {
        let prompt = build_prompt(&[scored("second", 0.9), scored("first", 0.1)], "q");
        assert!(prompt.find("second").unwrap() < prompt.find("first").unwrap());
    }

    #[test]
    fn openai_chat_content_extracted() {
        let json = json!({ "choices": [{ "message": { "role": "assistant", "content": "LRU eviction." } }] });
        assert_eq!(parse_openai_chat(&json).unwrap(), "LRU eviction.");
        assert!(parse_openai_chat(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn ollama_chat_content_extracted() {
        let json = json!({ "message": { "role": "assistant", "content": "  verbatim \n" }, "done": true });
        assert_eq!(parse_ollama_chat(&json).unwrap(), "  verbatim \n");
    }

    #[test]
    fn ollama_body_carries_low_temperature() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            model: Some("llama3.2".to_string()),
            max_tokens: Some(200),
            ..LlmConfig::default()
        };
        let generator = OllamaGenerator::new(&config).unwrap();
        let body = generator.request_body("p");
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["options"]["num_predict"], json!(200));
        let temperature = body["options"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.1).abs() < 1e-6);
    }

    #[tokio::test]
    async fn disabled_generator_errors() {
        assert!(DisabledGenerator.generate("p").await.is_err());
    }

    #[tokio::test]
    async fn unavailable_generator_reports_construction_error() {
        let cause = anyhow::anyhow!("OPENAI_API_KEY environment variable not set");
        let err = UnavailableGenerator::new("openai", &cause)
            .generate("p")
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("openai language model provider unavailable"));
        assert!(err.contains("OPENAI_API_KEY"));
    }
}
