pub mod chat;
pub mod generate;
pub mod transcribe;

use std::sync::Arc;

use hypr_ai_queue::{Assistant, FallbackClient, RequestScheduler, SchedulerConfig};
use hypr_gemini::GeminiClient;

use crate::runtime::CliRuntime;

pub struct Credentials {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
    pub openai_api_key: Option<String>,
    pub assemblyai_api_key: Option<String>,
}

impl Credentials {
    pub fn gemini(&self) -> anyhow::Result<GeminiClient> {
        let Some(api_key) = &self.gemini_api_key else {
            anyhow::bail!("GEMINI_API_KEY is not set");
        };

        Ok(GeminiClient::builder()
            .api_key(api_key)
            .model(&self.gemini_model)
            .build())
    }

    pub fn fallback(&self) -> Option<FallbackClient> {
        self.openrouter_api_key.as_ref().map(|api_key| {
            FallbackClient::builder()
                .api_key(api_key)
                .model(&self.openrouter_model)
                .build()
        })
    }

    pub fn assistant(&self, quiet: bool) -> anyhow::Result<Assistant> {
        let scheduler = RequestScheduler::with_runtime(
            SchedulerConfig::default(),
            Arc::new(CliRuntime::new(quiet)),
        );
        let fallback = self.fallback();

        tracing::info!(
            model = %self.gemini_model,
            fallback = fallback.as_ref().map(|f| f.model()),
            "assistant_configured"
        );

        Ok(Assistant::new(scheduler, self.gemini()?, fallback))
    }
}
