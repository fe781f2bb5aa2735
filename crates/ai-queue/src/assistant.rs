use std::sync::Arc;
use std::time::Duration;

use hypr_gemini::{
    Content, GeminiClient, GenerateContentRequest, GenerationConfig, strip_code_fences,
};
use serde::de::DeserializeOwned;

use crate::{Action, ChatMessage, Error, FallbackClient, RequestScheduler, with_timeout};

/// Upper bound on one generation call, primary or fallback. A hung connection
/// would otherwise hold the scheduler's single dispatch slot forever.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Generation entry point: every call goes through the shared scheduler, with
/// the fallback backend attached when one is configured.
#[derive(Clone)]
pub struct Assistant {
    scheduler: RequestScheduler,
    gemini: GeminiClient,
    fallback: Option<FallbackClient>,
    request_timeout: Duration,
}

impl Assistant {
    pub fn new(
        scheduler: RequestScheduler,
        gemini: GeminiClient,
        fallback: Option<FallbackClient>,
    ) -> Self {
        Self {
            scheduler,
            gemini,
            fallback,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn request_timeout(mut self, limit: Duration) -> Self {
        self.request_timeout = limit;
        self
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        &self.scheduler
    }

    pub fn gemini(&self) -> &GeminiClient {
        &self.gemini
    }

    pub async fn generate_text(
        &self,
        system_instruction: Option<&str>,
        prompt: &str,
    ) -> Result<String, Error> {
        self.generate_contents(system_instruction, vec![Content::user(prompt)], None)
            .await
    }

    /// Asks for JSON output and decodes it, tolerating markdown fences.
    pub async fn generate_json<T: DeserializeOwned>(
        &self,
        system_instruction: Option<&str>,
        prompt: &str,
    ) -> Result<T, Error> {
        let raw = self
            .generate_contents(
                system_instruction,
                vec![Content::user(prompt)],
                Some(GenerationConfig::json()),
            )
            .await?;

        Ok(serde_json::from_str(strip_code_fences(&raw))?)
    }

    pub async fn generate_contents(
        &self,
        system_instruction: Option<&str>,
        contents: Vec<Content>,
        config: Option<GenerationConfig>,
    ) -> Result<String, Error> {
        let fallback = self
            .fallback
            .clone()
            .map(|client| {
                fallback_action(client, system_instruction, &contents, self.request_timeout)
            });

        let mut request = GenerateContentRequest::new(contents);
        if let Some(system) = system_instruction {
            request = request.system_instruction(system);
        }
        if let Some(config) = config {
            request = request.generation_config(config);
        }

        let primary = primary_action(self.gemini.clone(), request, self.request_timeout);
        self.scheduler.enqueue(primary, fallback).await
    }
}

fn primary_action(
    gemini: GeminiClient,
    request: GenerateContentRequest,
    limit: Duration,
) -> Action<String> {
    let request = Arc::new(request);
    Action::new(move || {
        let gemini = gemini.clone();
        let request = request.clone();
        with_timeout(
            async move {
                let response = gemini.generate_content(&request).await?;
                Ok::<_, Error>(response.into_text()?)
            },
            limit,
        )
    })
}

fn fallback_action(
    client: FallbackClient,
    system_instruction: Option<&str>,
    contents: &[Content],
    limit: Duration,
) -> Action<String> {
    let messages: Arc<Vec<ChatMessage>> = Arc::new(to_chat_messages(system_instruction, contents));
    Action::new(move || {
        let client = client.clone();
        let messages = messages.clone();
        with_timeout(
            async move {
                tracing::info!(model = client.model(), "fallback_generation_started");
                client.complete(&messages).await
            },
            limit,
        )
    })
}

pub(crate) fn to_chat_messages(
    system_instruction: Option<&str>,
    contents: &[Content],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(contents.len() + 1);
    if let Some(system) = system_instruction {
        messages.push(ChatMessage::system(system));
    }

    for content in contents {
        let text = content.text();
        match content.role.as_deref() {
            Some("model") => messages.push(ChatMessage::assistant(text)),
            _ => messages.push(ChatMessage::user(text)),
        }
    }

    messages
}
