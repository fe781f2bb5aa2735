mod assistant;
mod backoff;
mod error;
mod events;
mod fallback;
mod rate_limit;
mod scheduler;
mod session;

pub use assistant::{Assistant, DEFAULT_REQUEST_TIMEOUT};
pub use backoff::{
    BackoffPolicy, RATE_LIMIT_JITTER_MS, generic_delay, rate_limit_delay, retry_with_backoff,
    retry_with_backoff_when, with_timeout,
};
pub use error::*;
pub use events::{QueueEvent, QueueRuntime, TracingRuntime};
pub use fallback::{
    ChatMessage, DEFAULT_FALLBACK_MODEL, FallbackClient, FallbackClientBuilder, OPENROUTER_API_BASE,
};
pub use rate_limit::{RateLimitSignal, is_rate_limited};
pub use scheduler::{
    Action, ActionFuture, DEFAULT_BASE_INTERVAL, DEFAULT_COOLDOWN, DEFAULT_MAX_INTERVAL,
    RequestScheduler, SchedulerConfig, SchedulerSnapshot,
};
pub use session::{ChatSession, SessionRegistry};
