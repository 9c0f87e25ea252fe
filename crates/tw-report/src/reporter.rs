//! Debounced flush scheduling for the mark log.
//!
//! The scheduler is an explicit state machine (`Idle`, `Pending`, `Stopped`)
//! driven by `report`, `stop_report`, and timer firings. Flush continuations
//! loop inside one call instead of recursing, so the polling chain never
//! grows the stack.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use tw_core::{Mark, MarkLog};

use crate::lock;
use crate::payload::Payload;
use crate::transport::Sink;

/// Default spacing between two flushes absent an immediate trigger.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(200);

/// Shared ownership of the mark log. The log and the scheduler state form
/// one unit behind locks; neither lock is held across an await.
pub type SharedLog = Arc<Mutex<MarkLog>>;

/// Turns the unreported marks into a payload.
///
/// Runs against the set collected at flush time; whatever it filters out is
/// still flagged as reported.
pub type DataHandler = Arc<dyn Fn(&[Mark]) -> Payload + Send + Sync>;

/// The identity handler: every collected mark, serialized as JSON.
pub fn default_handler() -> DataHandler {
    Arc::new(|marks| {
        Payload::Json(serde_json::to_value(marks).unwrap_or(serde_json::Value::Null))
    })
}

/// Knobs recognized by [`Reporter::report_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Overrides the reporter-wide polling interval for this call chain.
    pub polling_interval: Option<Duration>,
    /// Bypasses the debounce window. Honored for external and unload calls;
    /// polling re-entries always debounce.
    pub immediate: bool,
}

/// Who entered the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    External,
    Polling,
    Unload,
}

/// Scheduler phase. At most one timer is outstanding.
enum Phase {
    Idle,
    Pending(JoinHandle<()>),
    Stopped,
}

struct SchedulerState {
    phase: Phase,
    last_send: Instant,
    unload_hooked: bool,
}

#[derive(Clone)]
struct Request {
    destination: String,
    handler: DataHandler,
    options: ReportOptions,
}

enum Decision {
    Flush,
    Wait(Duration),
    Bail,
}

/// Decides when and what to flush to the sink.
///
/// Cloning is cheap and shares all state; the clone handed to timer and
/// unload tasks drives the same machine.
#[derive(Clone)]
pub struct Reporter {
    log: SharedLog,
    sink: Arc<dyn Sink>,
    state: Arc<Mutex<SchedulerState>>,
    interval: Duration,
    unload: Option<Arc<Notify>>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Reporter {
    /// Creates a reporter over the given log and sink. The debounce clock
    /// starts now.
    pub fn new(log: SharedLog, sink: Arc<dyn Sink>) -> Self {
        Self {
            log,
            sink,
            state: Arc::new(Mutex::new(SchedulerState {
                phase: Phase::Idle,
                last_send: Instant::now(),
                unload_hooked: false,
            })),
            interval: DEFAULT_POLLING_INTERVAL,
            unload: None,
        }
    }

    /// Sets the reporter-wide polling interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Registers the host's about-to-unload signal. The listener itself is
    /// installed once, by the first `report` call; when the signal fires, a
    /// final immediate flush runs and the polling loop does not continue.
    #[must_use]
    pub fn with_unload_signal(mut self, signal: Arc<Notify>) -> Self {
        self.unload = Some(signal);
        self
    }

    /// The log this reporter flushes.
    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    /// Reports with the default handler and options.
    pub async fn report(&self, destination: &str) {
        self.report_with(destination, default_handler(), ReportOptions::default())
            .await;
    }

    /// Runs the delivery state machine for an externally-initiated call.
    ///
    /// External calls always re-arm a stopped reporter. Depending on the
    /// debounce window this either flushes now and keeps the polling loop
    /// alive, or schedules the single pending timer.
    pub async fn report_with(&self, destination: &str, handler: DataHandler, options: ReportOptions) {
        let request = Arc::new(Request {
            destination: destination.to_string(),
            handler,
            options,
        });
        self.run(Origin::External, request).await;
    }

    /// Cancels any pending timer and stops delivery. Only an
    /// externally-initiated `report` call re-arms.
    pub fn stop_report(&self) {
        let mut state = lock(&self.state);
        if let Phase::Pending(handle) = std::mem::replace(&mut state.phase, Phase::Stopped) {
            handle.abort();
        }
        tracing::debug!("delivery stopped");
    }

    /// Empties the log and cancels any pending flush timer. A stopped
    /// reporter stays stopped.
    pub fn clear(&self) {
        lock(&self.log).clear();
        let mut state = lock(&self.state);
        match std::mem::replace(&mut state.phase, Phase::Idle) {
            Phase::Pending(handle) => handle.abort(),
            Phase::Stopped => state.phase = Phase::Stopped,
            Phase::Idle => {}
        }
    }

    /// One pass of the state machine. The flush continuation loops here with
    /// a polling origin instead of re-invoking itself.
    async fn run(&self, origin: Origin, request: Arc<Request>) {
        let mut origin = origin;
        loop {
            let interval = request.options.polling_interval.unwrap_or(self.interval);
            let decision = self.decide(origin, &request, interval);
            match decision {
                Decision::Bail => return,
                Decision::Wait(delay) => {
                    self.schedule(delay, &request);
                    return;
                }
                Decision::Flush => {
                    self.flush(&request).await;
                    if origin == Origin::Unload {
                        return;
                    }
                    origin = Origin::Polling;
                }
            }
        }
    }

    fn decide(&self, origin: Origin, request: &Arc<Request>, interval: Duration) -> Decision {
        let mut state = lock(&self.state);

        if origin == Origin::External && matches!(state.phase, Phase::Stopped) {
            // External calls always re-arm.
            state.phase = Phase::Idle;
        }
        if matches!(state.phase, Phase::Stopped) {
            return Decision::Bail;
        }

        self.hook_unload(&mut state, request);

        let elapsed = state.last_send.elapsed();
        let immediate = request.options.immediate && origin != Origin::Polling;
        if immediate || elapsed >= interval {
            Decision::Flush
        } else {
            Decision::Wait(interval - elapsed)
        }
    }

    /// Collects the unreported set, flags it, and hands the payload to the
    /// sink. Flags flip before the send: one attempt per mark, failures are
    /// not rolled back.
    async fn flush(&self, request: &Request) {
        let marks: Vec<Mark> = {
            let mut log = lock(&self.log);
            let indices = log.unreported();
            let marks = indices.iter().map(|&i| log.marks()[i].clone()).collect();
            log.set_reported(&indices);
            marks
        };

        {
            let mut state = lock(&self.state);
            state.last_send = Instant::now();
            match std::mem::replace(&mut state.phase, Phase::Idle) {
                Phase::Pending(handle) => handle.abort(),
                // A stop that landed since the decision stays in force.
                Phase::Stopped => state.phase = Phase::Stopped,
                Phase::Idle => {}
            }
        }

        let payload = (request.handler)(&marks);
        if marks.is_empty() || payload.is_empty() {
            return;
        }
        let delivered = self.sink.deliver(&request.destination, payload).await;
        tracing::debug!(count = marks.len(), delivered, "flushed marks");
    }

    /// Replaces the pending timer with one firing after `delay`.
    fn schedule(&self, delay: Duration, request: &Arc<Request>) {
        let this = self.clone();
        let request = request.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.run_boxed(Origin::Polling, request).await;
        });

        let mut state = lock(&self.state);
        if matches!(state.phase, Phase::Stopped) {
            handle.abort();
            return;
        }
        if let Phase::Pending(previous) = std::mem::replace(&mut state.phase, Phase::Pending(handle))
        {
            previous.abort();
        }
    }

    /// Installs the unload listener, at most once per reporter lifetime.
    fn hook_unload(&self, state: &mut SchedulerState, request: &Arc<Request>) {
        if state.unload_hooked {
            return;
        }
        let Some(signal) = self.unload.clone() else {
            return;
        };
        state.unload_hooked = true;

        let mut final_request = (**request).clone();
        final_request.options.immediate = true;
        let final_request = Arc::new(final_request);
        let this = self.clone();
        tokio::spawn(async move {
            signal.notified().await;
            tracing::debug!("unload signal fired, forcing final flush");
            this.run_boxed(Origin::Unload, final_request).await;
        });
    }

    /// Boxed re-entry so spawned continuations don't build an infinite
    /// future type.
    fn run_boxed(
        &self,
        origin: Origin,
        request: Arc<Request>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        let this = self.clone();
        Box::pin(async move { this.run(origin, request).await })
    }
}
