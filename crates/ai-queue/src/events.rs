#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    #[serde(rename = "dispatched")]
    Dispatched { request_id: u64, interval_ms: u64 },
    #[serde(rename = "rateLimited")]
    RateLimited {
        request_id: u64,
        interval_ms: u64,
        cooldown_ms: u64,
    },
    #[serde(rename = "requeued")]
    Requeued { request_id: u64, requeues: u32 },
    #[serde(rename = "fallbackUsed")]
    FallbackUsed { request_id: u64 },
    #[serde(rename = "gaveUp")]
    GaveUp { request_id: u64, requeues: u32 },
    #[serde(rename = "retryScheduled")]
    RetryScheduled {
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
}

/// Receives user-visible notices from the scheduler and the backoff helper.
pub trait QueueRuntime: Send + Sync + 'static {
    fn emit(&self, event: QueueEvent);
}

/// Default runtime: everything goes to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRuntime;

impl QueueRuntime for TracingRuntime {
    fn emit(&self, event: QueueEvent) {
        match event {
            QueueEvent::Dispatched {
                request_id,
                interval_ms,
            } => tracing::debug!(request_id, interval_ms, "request_dispatched"),
            QueueEvent::RateLimited {
                request_id,
                interval_ms,
                cooldown_ms,
            } => tracing::warn!(request_id, interval_ms, cooldown_ms, "rate_limited_cooldown"),
            QueueEvent::Requeued {
                request_id,
                requeues,
            } => tracing::info!(request_id, requeues, "request_requeued"),
            QueueEvent::FallbackUsed { request_id } => {
                tracing::warn!(request_id, "rate_limited_using_fallback")
            }
            QueueEvent::GaveUp {
                request_id,
                requeues,
            } => tracing::error!(request_id, requeues, "request_gave_up"),
            QueueEvent::RetryScheduled {
                attempt,
                delay_ms,
                error,
            } => tracing::warn!(attempt, delay_ms, %error, "rate_limited_retry_scheduled"),
        }
    }
}
