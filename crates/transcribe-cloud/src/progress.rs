use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;

const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub status: String,
}

type Callback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Caller-supplied progress sink. Cheap to clone.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<Callback>,
}

impl ProgressReporter {
    pub fn new(callback: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    pub fn noop() -> Self {
        Self::default()
    }

    pub fn report(&self, percent: u8, status: impl Into<String>) {
        if let Some(callback) = &self.callback {
            callback(Progress {
                percent: percent.min(100),
                status: status.into(),
            });
        }
    }

    /// Maps `done / total` onto `from..=to`.
    pub fn report_fraction(&self, from: u8, to: u8, done: u64, total: u64, status: &str) {
        let span = to.saturating_sub(from) as u64;
        let scaled = if total == 0 { span } else { span * done.min(total) / total };
        self.report(from.saturating_add(scaled as u8), status);
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}

/// Streams `bytes` in chunks, reporting upload progress onto `from..=to` as
/// the HTTP client pulls each chunk.
pub(crate) fn counting_body(
    bytes: Bytes,
    reporter: ProgressReporter,
    from: u8,
    to: u8,
    status: &'static str,
) -> reqwest::Body {
    let total = bytes.len() as u64;
    let chunks: Vec<Bytes> = (0..bytes.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|offset| bytes.slice(offset..(offset + UPLOAD_CHUNK_SIZE).min(bytes.len())))
        .collect();

    let mut sent = 0u64;
    let stream = futures_util::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        reporter.report_fraction(from, to, sent, total, status);
        Ok::<_, std::io::Error>(chunk)
    });

    reqwest::Body::wrap_stream(stream)
}
