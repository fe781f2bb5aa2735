use hypr_ai_queue::RateLimitSignal;
use hypr_gemini::FileState;

use crate::Provider;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Gemini(#[from] hypr_gemini::Error),

    #[error(transparent)]
    Queue(#[from] hypr_ai_queue::Error),

    #[error("{provider} API error: {status} - {message}")]
    Api {
        provider: Provider,
        status: u16,
        message: String,
    },

    #[error("no credentials configured for {0}")]
    ProviderNotConfigured(Provider),

    #[error("uploaded file {name} failed processing: {message}")]
    ActivationFailed { name: String, message: String },

    #[error("uploaded file {name} still {last_state} after {attempts} status checks")]
    ActivationTimeout {
        name: String,
        attempts: u32,
        last_state: FileState,
    },

    #[error("uploaded file is missing its URI")]
    MissingFileUri,

    #[error("transcription job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("transcription job {job_id} still {last_status} after {attempts} status checks")]
    JobTimeout {
        job_id: String,
        attempts: u32,
        last_status: String,
    },
}

impl Error {
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            Error::Gemini(e) => e.status(),
            Error::Queue(e) => e.status_code(),
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The provider gave up waiting, as opposed to rejecting the work.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::ActivationTimeout { .. }
                | Error::JobTimeout { .. }
                | Error::Queue(hypr_ai_queue::Error::Timeout(_))
        )
    }

    /// Worth another attempt: transport failures, request timeouts, 5xx and
    /// rate limits.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) | Error::Gemini(hypr_gemini::Error::Http(e)) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            Error::Gemini(hypr_gemini::Error::Api { status, .. }) => {
                *status == 429 || *status >= 500
            }
            Error::Queue(hypr_ai_queue::Error::Timeout(_)) => true,
            _ => hypr_ai_queue::is_rate_limited(self),
        }
    }
}

impl RateLimitSignal for Error {
    fn status_code(&self) -> Option<u16> {
        self.status()
    }

    fn descriptions(&self) -> Vec<String> {
        match self {
            Error::ActivationTimeout { .. } | Error::JobTimeout { .. } | Error::Json(_) => vec![],
            other => vec![other.to_string()],
        }
    }
}
