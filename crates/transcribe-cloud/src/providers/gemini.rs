use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use hypr_ai_queue::{
    BackoffPolicy, QueueRuntime, TracingRuntime, retry_with_backoff, with_timeout,
};
use hypr_gemini::{
    Blob, Content, File, FileData, FileState, GeminiClient, GenerateContentRequest,
    GenerationConfig, Part,
};
use tracing::Instrument;

use super::{RequestTimeouts, TranscriptionDriver, send_with_retry};
use crate::parsing::interpret_transcript;
use crate::progress::counting_body;
use crate::prompt::transcription_prompt;
use crate::{
    AudioFile, Error, Provider, ProgressReporter, TranscriptionResult, TranscriptionSettings,
};

/// Inputs below this size get one more try as inline base64 when the
/// resumable flow fails.
pub const INLINE_FALLBACK_MAX_BYTES: u64 = 2 * 1024 * 1024;

const UPLOAD_DONE_PERCENT: u8 = 50;
const ACTIVE_PERCENT: u8 = 70;
const GENERATED_PERCENT: u8 = 95;

/// Status polling schedule while an uploaded file is being processed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationPolicy {
    pub initial_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            factor: 1.5,
            max_delay: Duration::from_millis(3000),
            max_attempts: 60,
        }
    }
}

impl ActivationPolicy {
    /// Wait before poll number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        self.initial_delay
            .mul_f64(self.factor.powi(exponent).min(u32::MAX as f64))
            .min(self.max_delay)
    }
}

pub struct GeminiDriver {
    client: GeminiClient,
    activation: ActivationPolicy,
    backoff: BackoffPolicy,
    timeouts: RequestTimeouts,
    runtime: Arc<dyn QueueRuntime>,
    inline_max_bytes: u64,
}

impl GeminiDriver {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            activation: ActivationPolicy::default(),
            backoff: BackoffPolicy::default(),
            timeouts: RequestTimeouts::default(),
            runtime: Arc::new(TracingRuntime),
            inline_max_bytes: INLINE_FALLBACK_MAX_BYTES,
        }
    }

    pub fn activation_policy(mut self, policy: ActivationPolicy) -> Self {
        self.activation = policy;
        self
    }

    pub fn backoff_policy(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    pub fn timeouts(mut self, timeouts: RequestTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn QueueRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn inline_max_bytes(mut self, max: u64) -> Self {
        self.inline_max_bytes = max;
        self
    }

    async fn transcribe_resumable(
        &self,
        file: &AudioFile,
        settings: &TranscriptionSettings,
        progress: &ProgressReporter,
    ) -> Result<String, Error> {
        progress.report(0, "Starting upload");
        let upload_url = send_with_retry(
            &self.backoff,
            self.runtime.as_ref(),
            self.timeouts.request,
            || async {
                let url = self
                    .client
                    .start_resumable_upload(&file.display_name, file.len(), &file.mime_type)
                    .await?;
                Ok::<_, Error>(url)
            },
        )
        .await?;

        let uploaded = send_with_retry(
            &self.backoff,
            self.runtime.as_ref(),
            self.timeouts.upload,
            || async {
                let body = counting_body(
                    file.bytes.clone(),
                    progress.clone(),
                    0,
                    UPLOAD_DONE_PERCENT,
                    "Uploading audio",
                );
                let uploaded = self
                    .client
                    .upload_and_finalize(&upload_url, file.len(), body)
                    .await?;
                Ok::<_, Error>(uploaded)
            },
        )
        .await?;
        tracing::info!(file = %uploaded.name, state = %uploaded.state, "upload_finalized");

        let active = self.wait_until_active(uploaded, progress).await?;
        let file_uri = active.uri.ok_or(Error::MissingFileUri)?;
        let mime_type = active.mime_type.unwrap_or_else(|| file.mime_type.clone());

        progress.report(ACTIVE_PERCENT, "Generating transcript");
        self.generate(vec![
            Part::FileData(FileData {
                mime_type,
                file_uri,
            }),
            Part::Text(transcription_prompt(settings)),
        ])
        .await
    }

    async fn wait_until_active(
        &self,
        uploaded: File,
        progress: &ProgressReporter,
    ) -> Result<File, Error> {
        if uploaded.state == FileState::Active {
            return Ok(uploaded);
        }

        let name = uploaded.name;
        let max_attempts = self.activation.max_attempts;
        let mut last_state = uploaded.state;

        for attempt in 0..max_attempts {
            tokio::time::sleep(self.activation.delay_for(attempt)).await;

            let current = send_with_retry(
                &self.backoff,
                self.runtime.as_ref(),
                self.timeouts.request,
                || async { Ok::<_, Error>(self.client.get_file(&name).await?) },
            )
            .await?;
            tracing::debug!(
                file = %name,
                attempt = attempt + 1,
                state = %current.state,
                "activation_polled"
            );
            progress.report_fraction(
                UPLOAD_DONE_PERCENT,
                ACTIVE_PERCENT,
                attempt as u64 + 1,
                max_attempts as u64,
                "Processing audio",
            );

            match current.state {
                FileState::Active => return Ok(current),
                FileState::Failed => {
                    let message = current
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "no reason given".to_string());
                    return Err(Error::ActivationFailed { name, message });
                }
                state => last_state = state,
            }
        }

        Err(Error::ActivationTimeout {
            name,
            attempts: max_attempts,
            last_state,
        })
    }

    async fn generate_inline(
        &self,
        file: &AudioFile,
        settings: &TranscriptionSettings,
    ) -> Result<String, Error> {
        let data = base64::engine::general_purpose::STANDARD.encode(&file.bytes);
        self.generate(vec![
            Part::InlineData(Blob {
                mime_type: file.mime_type.clone(),
                data,
            }),
            Part::Text(transcription_prompt(settings)),
        ])
        .await
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, Error> {
        let request = GenerateContentRequest::new(vec![Content::with_parts("user", parts)])
            .generation_config(GenerationConfig::json());

        retry_with_backoff(
            || {
                with_timeout(
                    async {
                        let response = self.client.generate_content(&request).await?;
                        Ok::<_, Error>(response.into_text()?)
                    },
                    self.timeouts.generation,
                )
            },
            &self.backoff,
            self.runtime.as_ref(),
        )
        .await
    }
}

impl TranscriptionDriver for GeminiDriver {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn transcribe(
        &self,
        file: &AudioFile,
        settings: &TranscriptionSettings,
        progress: &ProgressReporter,
    ) -> Result<TranscriptionResult, Error> {
        let span =
            tracing::info_span!("transcribe", provider = %Provider::Gemini, bytes = file.len());

        async {
            let raw = match self.transcribe_resumable(file, settings, progress).await {
                Ok(raw) => raw,
                Err(err) if file.len() < self.inline_max_bytes => {
                    tracing::warn!(error = %err, "resumable_upload_failed_trying_inline");
                    progress.report(ACTIVE_PERCENT, "Retrying with inline audio");
                    self.generate_inline(file, settings).await?
                }
                Err(err) => return Err(err),
            };

            progress.report(GENERATED_PERCENT, "Formatting transcript");
            let (text, segments) = interpret_transcript(&raw);
            tracing::info!(segments = segments.len(), "transcription_completed");
            progress.report(100, "Done");

            Ok(TranscriptionResult {
                text,
                segments,
                provider_used: Provider::Gemini,
                // The model does not report a language.
                detected_language: None,
            })
        }
        .instrument(span)
        .await
    }
}
