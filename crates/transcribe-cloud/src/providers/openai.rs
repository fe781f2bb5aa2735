use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use hypr_ai_queue::with_timeout;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::Instrument;

use super::{RequestTimeouts, TranscriptionDriver};
use crate::prompt::vocabulary_hint;
use crate::{
    AudioFile, Error, Provider, ProgressReporter, TranscriptionResult, TranscriptionSettings,
};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "whisper-1";

const DEFAULT_NUM_RETRIES: usize = 2;
const DEFAULT_MAX_DELAY_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// Single multipart request; the provider returns plain text only.
pub struct OpenAIDriver {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    num_retries: usize,
    max_delay: Duration,
    timeouts: RequestTimeouts,
}

impl OpenAIDriver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: OPENAI_API_BASE.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            num_retries: DEFAULT_NUM_RETRIES,
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            timeouts: RequestTimeouts::default(),
        }
    }

    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn retries(mut self, num_retries: usize, max_delay: Duration) -> Self {
        self.num_retries = num_retries;
        self.max_delay = max_delay;
        self
    }

    pub fn timeouts(mut self, timeouts: RequestTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn form(&self, file: &AudioFile, settings: &TranscriptionSettings) -> Result<Form, Error> {
        let extension = hypr_audio_mime::content_type_to_extension(&file.mime_type);
        let audio = Part::bytes(file.bytes.to_vec())
            .file_name(format!("audio.{extension}"))
            .mime_str(&file.mime_type)?;

        let mut form = Form::new()
            .part("file", audio)
            .text("model", self.model.clone())
            .text("response_format", "json");

        if let Some(language) = &settings.language {
            form = form.text("language", language.clone());
        }
        if let Some(hint) = vocabulary_hint(&settings.vocabulary) {
            form = form.text("prompt", hint);
        }

        Ok(form)
    }

    async fn request_once(
        &self,
        file: &AudioFile,
        settings: &TranscriptionSettings,
    ) -> Result<TranscriptionResponse, Error> {
        let url = format!("{}/audio/transcriptions", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(self.form(file, settings)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                provider: Provider::OpenAI,
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

impl TranscriptionDriver for OpenAIDriver {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn transcribe(
        &self,
        file: &AudioFile,
        settings: &TranscriptionSettings,
        progress: &ProgressReporter,
    ) -> Result<TranscriptionResult, Error> {
        let span =
            tracing::info_span!("transcribe", provider = %Provider::OpenAI, bytes = file.len());

        async {
            progress.report(10, "Uploading audio");

            let backoff = ExponentialBuilder::default()
                .with_jitter()
                .with_max_delay(self.max_delay)
                .with_max_times(self.num_retries);

            let limit = self.timeouts.upload;
            let response = (|| with_timeout(self.request_once(file, settings), limit))
                .retry(backoff)
                .notify(|err, dur| {
                    tracing::warn!(
                        error = %err,
                        retry_delay_ms = dur.as_millis(),
                        "retrying_transcription"
                    );
                })
                .when(|e| e.is_transient())
                .await?;

            let text = response.text.trim().to_string();
            progress.report(100, "Done");
            tracing::info!(chars = text.len(), "transcription_completed");

            Ok(TranscriptionResult {
                text,
                segments: Vec::new(),
                provider_used: Provider::OpenAI,
                detected_language: response.language.or_else(|| settings.language.clone()),
            })
        }
        .instrument(span)
        .await
    }
}
