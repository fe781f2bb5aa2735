mod assemblyai;
mod gemini;
mod openai;

use std::future::Future;
use std::time::Duration;

use hypr_ai_queue::{BackoffPolicy, QueueRuntime, retry_with_backoff_when, with_timeout};

pub use assemblyai::{ASSEMBLYAI_API_BASE, AssemblyAIDriver, JobPollPolicy, JobStatus};
pub use gemini::{ActivationPolicy, GeminiDriver, INLINE_FALLBACK_MAX_BYTES};
pub use openai::{DEFAULT_OPENAI_MODEL, OPENAI_API_BASE, OpenAIDriver};

use crate::{
    AudioFile, Error, Provider, ProgressReporter, TranscriptionResult, TranscriptionSettings,
};

/// One transcription backend. Drivers share this capability and nothing else.
pub trait TranscriptionDriver: Send + Sync {
    fn provider(&self) -> Provider;

    fn transcribe(
        &self,
        file: &AudioFile,
        settings: &TranscriptionSettings,
        progress: &ProgressReporter,
    ) -> impl Future<Output = Result<TranscriptionResult, Error>> + Send;
}

/// Per-call limits for driver requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    /// Session starts, job submissions and status checks.
    pub request: Duration,
    /// Requests that carry the audio bytes.
    pub upload: Duration,
    pub generation: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            upload: Duration::from_secs(600),
            generation: Duration::from_secs(300),
        }
    }
}

/// One network call, bounded by `limit` and retried while the failure is
/// transient. Server-reported terminal states never reach this as errors.
pub(crate) async fn send_with_retry<T, F, Fut>(
    policy: &BackoffPolicy,
    runtime: &dyn QueueRuntime,
    limit: Duration,
    mut call: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    retry_with_backoff_when(
        || with_timeout(call(), limit),
        policy,
        runtime,
        Error::is_transient,
    )
    .await
}
