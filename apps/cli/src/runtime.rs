use hypr_ai_queue::{QueueEvent, QueueRuntime, TracingRuntime};
use hypr_transcribe_cloud::ProgressReporter;

/// Logs every scheduler event and echoes the ones a person waiting at the
/// terminal should see.
pub struct CliRuntime {
    quiet: bool,
}

impl CliRuntime {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl QueueRuntime for CliRuntime {
    fn emit(&self, event: QueueEvent) {
        let notice = match &event {
            QueueEvent::RateLimited { cooldown_ms, .. } => Some(format!(
                "Rate limited, waiting {:.1}s before retrying",
                *cooldown_ms as f64 / 1000.0
            )),
            QueueEvent::FallbackUsed { .. } => {
                Some("Primary model is throttled, answering with the fallback model".to_string())
            }
            QueueEvent::RetryScheduled { delay_ms, .. } => Some(format!(
                "Rate limited, retrying in {:.1}s",
                *delay_ms as f64 / 1000.0
            )),
            _ => None,
        };

        if let Some(notice) = notice
            && !self.quiet
        {
            eprintln!("{notice}");
        }

        TracingRuntime.emit(event);
    }
}

pub fn progress_reporter(quiet: bool) -> ProgressReporter {
    if quiet {
        return ProgressReporter::noop();
    }

    ProgressReporter::new(|progress| {
        tracing::info!(
            percent = progress.percent,
            status = %progress.status,
            "transcription_progress"
        );
    })
}
