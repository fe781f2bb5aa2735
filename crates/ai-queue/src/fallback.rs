use serde::{Deserialize, Serialize};

use crate::Error;

pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_FALLBACK_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client used when the primary
/// backend is throttling.
#[derive(Clone)]
pub struct FallbackClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl FallbackClient {
    pub fn builder() -> FallbackClientBuilder {
        FallbackClientBuilder::default()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, Error> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "fallback_request_failed");
            return Err(Error::FallbackApi {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(Error::EmptyResponse)
    }
}

#[derive(Default)]
pub struct FallbackClientBuilder {
    http: Option<reqwest::Client>,
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
}

impl FallbackClientBuilder {
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> FallbackClient {
        FallbackClient {
            http: self.http.unwrap_or_default(),
            api_base: self
                .api_base
                .unwrap_or_else(|| OPENROUTER_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: self.api_key.unwrap_or_default(),
            model: self
                .model
                .unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string()),
        }
    }
}
