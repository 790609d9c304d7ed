//! OpenAI-compatible chat completions client used to phrase the final answer.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{http_client, ReplyGenerator};
use crate::models::{ChatMessage, ChatRole};

#[derive(Debug, Clone)]
pub struct CompletionClient {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionClient {
    pub fn new(api_key: &str, base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.7,
            client: http_client(timeout)?,
        })
    }

    fn request_body(&self, system_prompt: &str, history: &[ChatMessage]) -> serde_json::Value {
        let mut messages = vec![json!({ "role": "system", "content": system_prompt })];
        for message in history {
            let role = match message.role {
                ChatRole::System => "system",
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": message.content }));
        }

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        })
    }
}

#[async_trait]
impl ReplyGenerator for CompletionClient {
    async fn generate_reply(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Requesting completion from {} with {} history messages", self.model, history.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(system_prompt, history))
            .send()
            .await
            .context("Failed to send completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Completion API error: {} - {}", status, error_text);
            return Err(anyhow!("Completion API error: {} - {}", status, error_text));
        }

        let response_data: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        response_data
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("No completion choices returned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_generate_reply_sends_system_prompt_first() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer llm-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "deepseek-chat",
                "messages": [
                    { "role": "system", "content": "You are a token analyst." },
                    { "role": "user", "content": "Is this token safe?" }
                ]
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"ForgeScore is 42."}}]}"#)
            .create_async()
            .await;

        let client =
            CompletionClient::new("llm-key", &server.url(), "deepseek-chat", Duration::from_secs(5)).unwrap();
        let history = vec![ChatMessage::new(ChatRole::User, "Is this token safe?")];
        let reply = client
            .generate_reply("You are a token analyst.", &history)
            .await
            .unwrap();

        assert_eq!(reply, "ForgeScore is 42.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_reply_fails_on_empty_choices() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let client = CompletionClient::new("k", &server.url(), "m", Duration::from_secs(5)).unwrap();
        assert!(client.generate_reply("sys", &[]).await.is_err());
    }
}
