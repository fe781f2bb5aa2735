use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::{Error, QueueEvent, QueueRuntime, TracingRuntime, is_rate_limited};

pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_millis(10_000);
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(5000);

const RELAX_FACTOR: f64 = 0.9;
const BACKOFF_FACTOR: u32 = 2;

pub type ActionFuture<T> = BoxFuture<'static, Result<T, Error>>;

/// A re-runnable unit of work. Requeued requests call it again.
pub struct Action<T> {
    f: Box<dyn FnMut() -> ActionFuture<T> + Send>,
}

impl<T: Send + 'static> Action<T> {
    pub fn new<F, Fut>(mut f: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        Self {
            f: Box::new(move || -> ActionFuture<T> { Box::pin(f()) }),
        }
    }

    fn call(&mut self) -> ActionFuture<T> {
        (self.f)()
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub cooldown: Duration,
    /// `None` keeps re-inserting a throttled request until it goes through.
    pub max_requeues: Option<u32>,
    pub fallback_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_interval: DEFAULT_BASE_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
            cooldown: DEFAULT_COOLDOWN,
            max_requeues: None,
            fallback_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub current_interval: Duration,
    pub queue_len: usize,
    pub is_processing: bool,
}

enum Outcome {
    Succeeded,
    Failed,
    RateLimited,
}

trait Job: Send {
    fn id(&self) -> u64;
    fn requeues(&self) -> u32;
    fn has_fallback(&self) -> bool;
    fn mark_requeued(&mut self) -> u32;
    /// Runs the primary action. Anything but a rate limit settles the caller.
    fn dispatch(&mut self) -> BoxFuture<'_, Outcome>;
    fn run_fallback(self: Box<Self>) -> BoxFuture<'static, ()>;
    fn give_up(self: Box<Self>);
}

struct Pending<T> {
    id: u64,
    primary: Action<T>,
    fallback: Option<Action<T>>,
    reply: Option<oneshot::Sender<Result<T, Error>>>,
    last_error: Option<Error>,
    requeues: u32,
}

impl<T> Pending<T> {
    fn settle(&mut self, result: Result<T, Error>) {
        if let Some(reply) = self.reply.take() {
            // The caller may have stopped waiting.
            let _ = reply.send(result);
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message.to_string();
    }
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(_) => "unknown panic".to_string(),
    }
}

/// Calls `action` and awaits it, turning a panic in either step into an error
/// for this request alone.
async fn run_guarded<T: Send + 'static>(
    action: &mut Action<T>,
    request_id: u64,
) -> Result<T, Error> {
    let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| action.call())) {
        Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
        Err(payload) => Err(payload),
    };

    outcome.unwrap_or_else(|payload| {
        let message = panic_message(payload);
        tracing::error!(request_id, panic = %message, "action_panicked");
        Err(Error::ActionPanicked(message))
    })
}

impl<T: Send + 'static> Job for Pending<T> {
    fn id(&self) -> u64 {
        self.id
    }

    fn requeues(&self) -> u32 {
        self.requeues
    }

    fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    fn mark_requeued(&mut self) -> u32 {
        self.requeues += 1;
        self.requeues
    }

    fn dispatch(&mut self) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            match run_guarded(&mut self.primary, self.id).await {
                Ok(value) => {
                    self.settle(Ok(value));
                    Outcome::Succeeded
                }
                Err(err) if is_rate_limited(&err) => {
                    self.last_error = Some(err);
                    Outcome::RateLimited
                }
                Err(err) => {
                    self.settle(Err(err));
                    Outcome::Failed
                }
            }
        })
    }

    fn run_fallback(self: Box<Self>) -> BoxFuture<'static, ()> {
        let Pending {
            id,
            fallback,
            reply,
            last_error,
            ..
        } = *self;

        Box::pin(async move {
            let result = match fallback {
                Some(mut action) => run_guarded(&mut action, id).await,
                None => Err(last_error.unwrap_or(Error::SchedulerClosed)),
            };
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        })
    }

    fn give_up(mut self: Box<Self>) {
        let err = self.last_error.take().unwrap_or(Error::SchedulerClosed);
        self.settle(Err(err));
    }
}

struct State {
    queue: VecDeque<Box<dyn Job>>,
    is_processing: bool,
    last_dispatch: Option<Instant>,
    current_interval: Duration,
}

struct Inner {
    state: Mutex<State>,
    config: SchedulerConfig,
    runtime: Arc<dyn QueueRuntime>,
    next_id: AtomicU64,
}

/// Serializes calls to a rate-limited backend.
///
/// At most one primary action is in flight, and dispatch starts are spaced by
/// an interval that doubles on rate-limit failures and relaxes by 10% on
/// success. Throttled requests without a fallback go back to the head of the
/// queue after a cooldown, so later requests never overtake them.
#[derive(Clone)]
pub struct RequestScheduler {
    inner: Arc<Inner>,
}

impl Default for RequestScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl RequestScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_runtime(config, Arc::new(TracingRuntime))
    }

    pub fn with_runtime(config: SchedulerConfig, runtime: Arc<dyn QueueRuntime>) -> Self {
        let current_interval = config.base_interval;
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    is_processing: false,
                    last_dispatch: None,
                    current_interval,
                }),
                config,
                runtime,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.inner.lock();
        SchedulerSnapshot {
            current_interval: state.current_interval,
            queue_len: state.queue.len(),
            is_processing: state.is_processing,
        }
    }

    /// Queues the request immediately; the returned future resolves once it
    /// settles. Must be called from within a Tokio runtime.
    pub fn enqueue<T: Send + 'static>(
        &self,
        primary: Action<T>,
        fallback: Option<Action<T>>,
    ) -> impl Future<Output = Result<T, Error>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let job = Box::new(Pending {
            id,
            primary,
            fallback,
            reply: Some(tx),
            last_error: None,
            requeues: 0,
        });

        let start_drain = {
            let mut state = self.inner.lock();
            state.queue.push_back(job);
            tracing::debug!(request_id = id, queue_len = state.queue.len(), "request_enqueued");

            if state.is_processing {
                false
            } else {
                state.is_processing = true;
                true
            }
        };

        if start_drain {
            let inner = self.inner.clone();
            tokio::spawn(inner.drain());
        }

        async move { rx.await.map_err(|_| Error::SchedulerClosed)? }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remaining wait before the next dispatch, or `None` once the queue is
    /// empty, in which case the processing flag is cleared under the same lock.
    fn next_wait(&self) -> Option<Duration> {
        let mut state = self.lock();
        if state.queue.is_empty() {
            state.is_processing = false;
            return None;
        }

        let wait = match state.last_dispatch {
            Some(at) => state.current_interval.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        };
        Some(wait)
    }

    fn pop_for_dispatch(&self) -> Option<(Box<dyn Job>, Duration)> {
        let mut state = self.lock();
        let job = state.queue.pop_front()?;
        state.last_dispatch = Some(Instant::now());
        Some((job, state.current_interval))
    }

    fn relax(&self) {
        let mut state = self.lock();
        state.current_interval = state
            .current_interval
            .mul_f64(RELAX_FACTOR)
            .max(self.config.base_interval);
    }

    fn tighten(&self) -> Duration {
        let mut state = self.lock();
        state.current_interval = state
            .current_interval
            .saturating_mul(BACKOFF_FACTOR)
            .min(self.config.max_interval);
        state.current_interval
    }

    fn requeue_front(&self, job: Box<dyn Job>) {
        let mut state = self.lock();
        state.queue.push_front(job);
    }

    async fn drain(self: Arc<Self>) {
        let mut guard = DrainGuard {
            inner: &self,
            finished: false,
        };

        while let Some(wait) = self.next_wait() {
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            let Some((mut job, interval)) = self.pop_for_dispatch() else {
                continue;
            };

            let request_id = job.id();
            self.runtime.emit(QueueEvent::Dispatched {
                request_id,
                interval_ms: interval.as_millis() as u64,
            });

            match job.dispatch().await {
                Outcome::Succeeded => self.relax(),
                Outcome::Failed => {}
                Outcome::RateLimited => {
                    let interval = self.tighten();

                    if self.config.fallback_enabled && job.has_fallback() {
                        self.runtime.emit(QueueEvent::FallbackUsed { request_id });
                        job.run_fallback().await;
                        continue;
                    }

                    if self
                        .config
                        .max_requeues
                        .is_some_and(|cap| job.requeues() >= cap)
                    {
                        self.runtime.emit(QueueEvent::GaveUp {
                            request_id,
                            requeues: job.requeues(),
                        });
                        job.give_up();
                        continue;
                    }

                    self.runtime.emit(QueueEvent::RateLimited {
                        request_id,
                        interval_ms: interval.as_millis() as u64,
                        cooldown_ms: self.config.cooldown.as_millis() as u64,
                    });
                    tokio::time::sleep(self.config.cooldown).await;

                    let requeues = job.mark_requeued();
                    self.runtime.emit(QueueEvent::Requeued {
                        request_id,
                        requeues,
                    });
                    self.requeue_front(job);
                }
            }
        }

        guard.finished = true;
    }
}

/// Clears the processing flag if the drain task stops without emptying the
/// queue, so the next `enqueue` starts a fresh one.
struct DrainGuard<'a> {
    inner: &'a Inner,
    finished: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let mut state = self.inner.lock();
        state.is_processing = false;
        tracing::error!(queue_len = state.queue.len(), "drain_stopped_early");
    }
}
