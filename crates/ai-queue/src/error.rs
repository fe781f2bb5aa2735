use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Gemini(#[from] hypr_gemini::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("fallback API error: {status} - {message}")]
    FallbackApi { status: u16, message: String },

    #[error("upstream error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("model returned no text")]
    EmptyResponse,

    #[error("scheduler dropped the request before it settled")]
    SchedulerClosed,

    #[error("queued action panicked: {0}")]
    ActionPanicked(String),
}

impl Error {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }
}
