use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Gemini API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("upload session response did not include an upload URL")]
    MissingUploadUrl,

    #[error("response had no usable candidate: {0}")]
    EmptyResponse(String),
}

impl Error {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<GoogleErrorResponse>(&body) {
        Ok(parsed) => match parsed.error.status {
            Some(code) => format!("{} ({})", parsed.error.message, code),
            None => parsed.error.message,
        },
        Err(_) => body,
    };

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}
