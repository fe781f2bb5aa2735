use crate::Error;

const SIGNATURES: &[&str] = &["429", "rate limit", "quota", "too many requests"];

/// Something that may describe an upstream rate-limit rejection.
pub trait RateLimitSignal {
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Free-form message or description fields worth scanning.
    fn descriptions(&self) -> Vec<String>;
}

pub fn is_rate_limited<E: RateLimitSignal + ?Sized>(err: &E) -> bool {
    if err.status_code() == Some(429) {
        return true;
    }

    err.descriptions().iter().any(|text| {
        let text = text.to_lowercase();
        SIGNATURES.iter().any(|sig| text.contains(sig))
    })
}

impl RateLimitSignal for str {
    fn descriptions(&self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl RateLimitSignal for String {
    fn descriptions(&self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl RateLimitSignal for reqwest::Error {
    fn status_code(&self) -> Option<u16> {
        self.status().map(|s| s.as_u16())
    }

    fn descriptions(&self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl RateLimitSignal for hypr_gemini::Error {
    fn status_code(&self) -> Option<u16> {
        self.status()
    }

    fn descriptions(&self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl RateLimitSignal for Error {
    fn status_code(&self) -> Option<u16> {
        match self {
            Error::Gemini(e) => e.status(),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            Error::FallbackApi { status, .. } => Some(*status),
            Error::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    fn descriptions(&self) -> Vec<String> {
        match self {
            // Timeouts and parse errors never describe a rejection.
            Error::Timeout(_)
            | Error::Json(_)
            | Error::EmptyResponse
            | Error::SchedulerClosed
            | Error::ActionPanicked(_) => vec![],
            other => vec![other.to_string()],
        }
    }
}
