//! Injected critical-thinking capability.
//!
//! The core store and analysis engine never depend on this module: a
//! [`Critic`] is handed to the server, which may ask it for free-text
//! commentary on a freshly recorded thought. [`NoopCritic`] keeps the
//! server fully functional when no generation backend is configured.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CriticConfig;
use crate::error::{CriticError, CriticResult};
use crate::model::ThoughtRecord;

const SYSTEM_PROMPT: &str = "You are a critical thinking assistant. Provide an objective, \
constructive critique of the thought process. Consider logical fallacies, cognitive biases, \
unexamined assumptions, alternative perspectives, and missing context. \
Be concise, specific, and constructive.";

/// A capability that turns a thought record into optional commentary.
#[async_trait]
pub trait Critic: Send + Sync {
    /// Generate a critique for the record, or `None` when the capability
    /// is unavailable.
    async fn critique(&self, record: &ThoughtRecord) -> CriticResult<Option<String>>;
}

/// Critic that never produces commentary.
pub struct NoopCritic;

#[async_trait]
impl Critic for NoopCritic {
    async fn critique(&self, _record: &ThoughtRecord) -> CriticResult<Option<String>> {
        Ok(None)
    }
}

/// Critic backed by a chat-completions style HTTP endpoint.
#[derive(Clone)]
pub struct HttpCritic {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_ms: u64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl HttpCritic {
    /// Build a critic from config, or `None` when no API key is set.
    pub fn from_config(config: &CriticConfig) -> CriticResult<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(CriticError::Http)?;

        Ok(Some(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            timeout_ms: config.timeout_ms,
        }))
    }

    /// The configured base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, record: &ThoughtRecord) -> ChatRequest {
        let user_prompt = format!(
            "Analyze the following thought and provide constructive criticism:\n\n{}\n\n\
             Context: thought {} of {}, stage '{}', tags: [{}]",
            record.content,
            record.number,
            record.total_expected,
            record.stage,
            record.tags.join(", "),
        );

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

#[async_trait]
impl Critic for HttpCritic {
    async fn critique(&self, record: &ThoughtRecord) -> CriticResult<Option<String>> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = self.build_request(record);

        debug!(number = record.number, model = %self.model, "Requesting critique");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CriticError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    CriticError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Critique request rejected");
            return Err(CriticError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| CriticError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ThoughtStage;

    #[test]
    fn test_from_config_without_key_is_none() {
        let config = CriticConfig::default();
        assert!(HttpCritic::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_from_config_with_key() {
        let config = CriticConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "https://api.openai.com/".to_string(),
            ..CriticConfig::default()
        };
        let critic = HttpCritic::from_config(&config).unwrap().unwrap();
        assert_eq!(critic.base_url(), "https://api.openai.com");
    }

    #[tokio::test]
    async fn test_noop_critic_returns_none() {
        let record = ThoughtRecord::new(1, "x", ThoughtStage::Research, 2).unwrap();
        let result = NoopCritic.critique(&record).await.unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_request_includes_thought_context() {
        let config = CriticConfig {
            api_key: Some("sk-test".to_string()),
            ..CriticConfig::default()
        };
        let critic = HttpCritic::from_config(&config).unwrap().unwrap();
        let record = ThoughtRecord::new(2, "Check the index usage", ThoughtStage::Analysis, 5)
            .unwrap()
            .with_tags(vec!["db".to_string()]);

        let request = critic.build_request(&record);
        assert_eq!(request.messages.len(), 2);
        let user = &request.messages[1].content;
        assert!(user.contains("Check the index usage"));
        assert!(user.contains("thought 2 of 5"));
        assert!(user.contains("Analysis"));
        assert!(user.contains("db"));
    }
}
