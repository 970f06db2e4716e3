//! # Poller
//!
//! Runs `fetch` once immediately and then again `interval` after each tick
//! completes. Every request gets a fresh epoch; a response is applied only if its
//! epoch is still the newest one when it arrives, so `stop()` and `restart()`
//! never need to abort a request that is already on the wire.
//!
//! ## Tick outcome
//! - **error**: failures + 1, `on_error` is called, the circuit trips at the bound.
//! - **rejected by `validate`**: failures + 1 with no callback at all.
//! - **accepted**: `on_result` is called, then failures reset to 0.
//! - **`validate` or `on_result` panicked**: logged, failures + 1.
//!
//! A tripped circuit leaves the poller `Stopped` with [`PollHandle::is_circuit_open`]
//! set. Only `restart()` brings it back.

use serde_json::json;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::panic_message;
use crate::loggers::LogSink;

/// Consecutive failures tolerated when no positive bound is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

type FetchFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;
type FetchFn<T, E> = Box<dyn Fn() -> FetchFuture<T, E> + Send + Sync>;
type ResultFn<T> = Box<dyn Fn(T) + Send + Sync>;
type ValidateFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type ErrorFn<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Lifecycle of a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Constructed, never started.
    Idle,
    /// A session is scheduling ticks.
    Running,
    /// Stopped by the caller or by the circuit.
    Stopped,
}

/// # Polling Options
///
/// Fixed for the lifetime of a poller; `restart()` reuses them as they are.
pub struct PollingOptions<T, E> {
    interval: Duration,
    max_retries: u32,
    validate: Option<ValidateFn<T>>,
    on_error: Option<ErrorFn<E>>,
}

impl<T, E> PollingOptions<T, E> {
    /// Ticks `interval_ms` apart. Negative intervals are clamped to zero.
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms.max(0) as u64),
            max_retries: DEFAULT_MAX_RETRIES,
            validate: None,
            on_error: None,
        }
    }

    /// Consecutive failures before the circuit trips. Zero keeps the default.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = if max_retries == 0 {
            DEFAULT_MAX_RETRIES
        } else {
            max_retries
        };
        self
    }

    /// A semantic check on a fetched result. A rejected result counts as a failure
    /// but reaches neither `on_result` nor `on_error`.
    pub fn validate(mut self, validate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Called with every fetch error. A panic inside the hook is logged and swallowed.
    pub fn on_error(mut self, on_error: impl Fn(&E) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    /// The clamped tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The effective failure bound.
    pub fn retry_limit(&self) -> u32 {
        self.max_retries
    }
}

impl<T, E> fmt::Debug for PollingOptions<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingOptions")
            .field("interval", &self.interval)
            .field("max_retries", &self.max_retries)
            .field("validate", &self.validate.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

struct Session {
    state: PollState,
    epoch: u64,
    failures: u32,
    circuit_open: bool,
    token: CancellationToken,
}

impl Session {
    /// Ends the current session. Bumping the epoch orphans any in-flight response.
    fn halt(&mut self) {
        self.state = PollState::Stopped;
        self.token.cancel();
        self.epoch += 1;
    }
}

struct Core<T, E> {
    fetch: FetchFn<T, E>,
    on_result: ResultFn<T>,
    options: PollingOptions<T, E>,
    logger: Arc<dyn LogSink>,
    session: Mutex<Session>,
}

impl<T, E> Core<T, E> {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|p| p.into_inner())
    }
}

enum Next {
    Sleep,
    Exit,
}

/// # Poll Handle
///
/// Controls one poller. Clones share the same poller.
pub struct PollHandle<T, E> {
    core: Arc<Core<T, E>>,
}

impl<T, E> Clone for PollHandle<T, E> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T, E> PollHandle<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Builds an idle poller. Nothing runs until [`start`](Self::start).
    pub fn new<F, Fut>(
        fetch: F,
        on_result: impl Fn(T) + Send + Sync + 'static,
        options: PollingOptions<T, E>,
        logger: Arc<dyn LogSink>,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let fetch: FetchFn<T, E> = Box::new(move || Box::pin(fetch()));
        Self {
            core: Arc::new(Core {
                fetch,
                on_result: Box::new(on_result),
                options,
                logger,
                session: Mutex::new(Session {
                    state: PollState::Idle,
                    epoch: 0,
                    failures: 0,
                    circuit_open: false,
                    token: CancellationToken::new(),
                }),
            }),
        }
    }

    /// Starts ticking. Only an idle poller starts; use `restart` afterwards.
    /// Must be called inside a tokio runtime.
    pub fn start(&self) {
        let token = {
            let mut session = self.core.session();
            if session.state != PollState::Idle {
                return;
            }
            session.state = PollState::Running;
            session.token.clone()
        };
        tokio::spawn(run(Arc::clone(&self.core), token));
    }

    /// Stops ticking. A response still in flight is discarded when it arrives.
    /// Stopping a stopped poller does nothing.
    pub fn stop(&self) {
        let mut session = self.core.session();
        if session.state == PollState::Stopped {
            return;
        }
        session.halt();
    }

    /// Stops the current session and starts a fresh one with the failure count
    /// and circuit reset. Works from any state.
    pub fn restart(&self) {
        let token = {
            let mut session = self.core.session();
            if session.state != PollState::Stopped {
                session.halt();
            }
            session.token = CancellationToken::new();
            session.failures = 0;
            session.circuit_open = false;
            session.state = PollState::Running;
            session.token.clone()
        };
        tokio::spawn(run(Arc::clone(&self.core), token));
    }
}

impl<T, E> PollHandle<T, E> {
    /// Current lifecycle state.
    pub fn state(&self) -> PollState {
        self.core.session().state
    }

    /// True once the failure bound stopped the poller.
    pub fn is_circuit_open(&self) -> bool {
        self.core.session().circuit_open
    }

    /// Failures since the last accepted result.
    pub fn consecutive_failures(&self) -> u32 {
        self.core.session().failures
    }

    /// Identity of the newest request; grows on every tick, stop and restart.
    pub fn epoch(&self) -> u64 {
        self.core.session().epoch
    }
}

/// Builds a poller and starts it straight away.
pub fn poll<T, E, F, Fut>(
    fetch: F,
    on_result: impl Fn(T) + Send + Sync + 'static,
    options: PollingOptions<T, E>,
    logger: Arc<dyn LogSink>,
) -> PollHandle<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let handle = PollHandle::new(fetch, on_result, options, logger);
    handle.start();
    handle
}

async fn run<T, E>(core: Arc<Core<T, E>>, token: CancellationToken)
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    loop {
        match tick(&core, &token).await {
            Next::Exit => return,
            Next::Sleep => {}
        }

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(core.options.interval) => {}
        }
    }
}

async fn tick<T, E>(core: &Core<T, E>, token: &CancellationToken) -> Next
where
    E: fmt::Display,
{
    let epoch = {
        let mut session = core.session();
        if token.is_cancelled() || session.state != PollState::Running {
            return Next::Exit;
        }
        session.epoch += 1;
        session.epoch
    };

    let outcome = (core.fetch)().await;

    // Decide under the lock, call back without it.
    let mut session = core.session();
    if session.epoch != epoch || session.state != PollState::Running {
        drop(session);
        core.logger
            .debug("Discarding stale poll response", Some(json!({ "epoch": epoch })));
        return Next::Exit;
    }

    match outcome {
        Ok(result) => {
            drop(session);
            let delivered = deliver(core, result);

            let mut session = core.session();
            // `on_result` may have stopped or restarted the poller.
            if session.epoch != epoch || session.state != PollState::Running {
                return Next::Exit;
            }
            if delivered {
                session.failures = 0;
                Next::Sleep
            } else {
                session.failures += 1;
                trip_if_exhausted(core, &mut session)
            }
        }
        Err(error) => {
            session.failures += 1;
            let failures = session.failures;
            drop(session);

            if let Some(on_error) = &core.options.on_error {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| on_error(&error))) {
                    core.logger.error(
                        "Polling error hook failed",
                        Some(json!({ "panic": panic_message(payload.as_ref()) })),
                    );
                }
            }
            core.logger.error(
                "Polling error",
                Some(json!({ "error": error.to_string(), "failures": failures })),
            );

            let mut session = core.session();
            // The hook may have stopped or restarted the poller.
            if session.epoch != epoch || session.state != PollState::Running {
                return Next::Exit;
            }
            trip_if_exhausted(core, &mut session)
        }
    }
}

/// Runs `validate` then `on_result` without the session lock. False when the
/// result was rejected or either callback panicked.
fn deliver<T, E>(core: &Core<T, E>, result: T) -> bool {
    if let Some(validate) = &core.options.validate {
        match catch_unwind(AssertUnwindSafe(|| validate(&result))) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(payload) => {
                core.logger.error(
                    "Polling validator failed",
                    Some(json!({ "panic": panic_message(payload.as_ref()) })),
                );
                return false;
            }
        }
    }

    match catch_unwind(AssertUnwindSafe(|| (core.on_result)(result))) {
        Ok(()) => true,
        Err(payload) => {
            core.logger.error(
                "Polling result handler failed",
                Some(json!({ "panic": panic_message(payload.as_ref()) })),
            );
            false
        }
    }
}

fn trip_if_exhausted<T, E>(core: &Core<T, E>, session: &mut Session) -> Next {
    if session.failures < core.options.max_retries {
        return Next::Sleep;
    }
    session.halt();
    session.circuit_open = true;
    core.logger.error(
        "Max polling retries reached, stopping",
        Some(json!({
            "failures": session.failures,
            "maxRetries": core.options.max_retries,
        })),
    );
    Next::Exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loggers::MemoryLogger;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn options_clamp_interval_and_default_the_bound() {
        let options = PollingOptions::<(), String>::new(-250).max_retries(0);
        assert_eq!(options.interval(), Duration::ZERO);
        assert_eq!(options.retry_limit(), DEFAULT_MAX_RETRIES);
        assert_eq!(PollingOptions::<(), String>::new(10).max_retries(3).retry_limit(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn circuit_trips_after_exactly_max_retries_failures() {
        let calls = counter();
        let errors = counter();
        let results = counter();
        let logger = Arc::new(MemoryLogger::new());

        let fetch_calls = calls.clone();
        let error_calls = errors.clone();
        let result_calls = results.clone();
        let handle = poll(
            move || {
                fetch_calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, String>("offline".to_string()) }
            },
            move |_: u32| {
                result_calls.fetch_add(1, Ordering::SeqCst);
            },
            PollingOptions::new(1_000)
                .max_retries(5)
                .on_error(move |_: &String| {
                    error_calls.fetch_add(1, Ordering::SeqCst);
                }),
            logger.clone(),
        );

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(errors.load(Ordering::SeqCst), 5);
        assert_eq!(results.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state(), PollState::Stopped);
        assert!(handle.is_circuit_open());
        assert_eq!(logger.count("Polling error"), 5);
        assert_eq!(logger.count("Max polling retries reached, stopping"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_results_are_counted_but_never_reported() {
        let calls = counter();
        let errors = counter();
        let results = counter();

        let fetch_calls = calls.clone();
        let error_calls = errors.clone();
        let result_calls = results.clone();
        let handle = poll(
            move || {
                fetch_calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<Vec<u32>, String>(vec![]) }
            },
            move |_| {
                result_calls.fetch_add(1, Ordering::SeqCst);
            },
            PollingOptions::new(500)
                .max_retries(5)
                .validate(|items: &Vec<u32>| !items.is_empty())
                .on_error(move |_| {
                    error_calls.fetch_add(1, Ordering::SeqCst);
                }),
            Arc::new(MemoryLogger::new()),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
        assert_eq!(results.load(Ordering::SeqCst), 0);
        assert!(handle.is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_failure_count() {
        let calls = counter();
        let fetch_calls = calls.clone();
        let handle = poll(
            move || {
                let n = fetch_calls.fetch_add(1, Ordering::SeqCst);
                // Fail, fail, succeed, repeat.
                async move {
                    if n % 3 == 2 {
                        Ok(n)
                    } else {
                        Err(format!("attempt {} failed", n))
                    }
                }
            },
            |_: usize| {},
            PollingOptions::new(100).max_retries(3),
            Arc::new(MemoryLogger::new()),
        );

        tokio::time::sleep(Duration::from_millis(1_050)).await;

        assert!(calls.load(Ordering::SeqCst) > 3);
        assert_eq!(handle.state(), PollState::Running);
        assert!(!handle.is_circuit_open());
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_is_discarded_after_restart() {
        let (gate_tx, gate_rx) = oneshot::channel::<u32>();
        let gate = Arc::new(Mutex::new(Some(gate_rx)));
        let calls = counter();
        let applied = Arc::new(Mutex::new(Vec::new()));
        let logger = Arc::new(MemoryLogger::new());

        let fetch_calls = calls.clone();
        let sink = applied.clone();
        let handle = poll(
            move || -> FetchFuture<u32, String> {
                fetch_calls.fetch_add(1, Ordering::SeqCst);
                match gate.lock().unwrap().take() {
                    Some(rx) => Box::pin(async move { rx.await.map_err(|e| e.to_string()) }),
                    None => Box::pin(async { Ok(2) }),
                }
            },
            move |value| sink.lock().unwrap().push(value),
            PollingOptions::new(10_000),
            logger.clone(),
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.epoch(), 1);

        handle.restart();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(*applied.lock().unwrap(), vec![2]);

        gate_tx.send(1).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(*applied.lock().unwrap(), vec![2]);
        assert_eq!(logger.count("Discarding stale poll response"), 1);
        assert_eq!(handle.state(), PollState::Running);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_in_flight_and_is_idempotent() {
        let (gate_tx, gate_rx) = oneshot::channel::<u32>();
        let gate = Arc::new(Mutex::new(Some(gate_rx)));
        let results = counter();

        let result_calls = results.clone();
        let handle = poll(
            move || {
                let rx = gate.lock().unwrap().take();
                async move {
                    match rx {
                        Some(rx) => rx.await.map_err(|e| e.to_string()),
                        None => Err("gate already used".to_string()),
                    }
                }
            },
            move |_| {
                result_calls.fetch_add(1, Ordering::SeqCst);
            },
            PollingOptions::new(1_000),
            Arc::new(MemoryLogger::new()),
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.stop();
        let epoch = handle.epoch();
        handle.stop();
        assert_eq!(handle.epoch(), epoch);

        gate_tx.send(7).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(results.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state(), PollState::Stopped);
        assert!(!handle.is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_error_hook_does_not_break_the_loop() {
        let calls = counter();
        let fetch_calls = calls.clone();
        let logger = Arc::new(MemoryLogger::new());
        let handle = poll(
            move || {
                fetch_calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), String>("down".into()) }
            },
            |_| {},
            PollingOptions::new(10)
                .max_retries(2)
                .on_error(|_| panic!("hook exploded")),
            logger.clone(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(logger.count("Polling error hook failed"), 2);
        assert!(handle.is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_result_handler_counts_as_a_failure() {
        let calls = counter();
        let fetch_calls = calls.clone();
        let logger = Arc::new(MemoryLogger::new());
        let handle = poll(
            move || {
                fetch_calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<u32, String>(1) }
            },
            |_| panic!("consumer exploded"),
            PollingOptions::new(100).max_retries(3),
            logger.clone(),
        );

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(logger.count("Polling result handler failed"), 3);
        assert_eq!(handle.state(), PollState::Stopped);
        assert!(handle.is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_validator_counts_as_a_rejection() {
        let calls = counter();
        let results = counter();
        let fetch_calls = calls.clone();
        let result_calls = results.clone();
        let logger = Arc::new(MemoryLogger::new());
        let handle = poll(
            move || {
                fetch_calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<u32, String>(1) }
            },
            move |_| {
                result_calls.fetch_add(1, Ordering::SeqCst);
            },
            PollingOptions::new(100)
                .max_retries(3)
                .validate(|_: &u32| panic!("validator exploded")),
            logger.clone(),
        );

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(results.load(Ordering::SeqCst), 0);
        assert_eq!(logger.count("Polling validator failed"), 3);
        assert!(handle.is_circuit_open());
    }

    #[tokio::test(start_paused = true)]
    async fn validator_may_read_the_handle() {
        let slot: Arc<Mutex<Option<PollHandle<u32, String>>>> = Arc::new(Mutex::new(None));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = slot.clone();
        let sink = seen.clone();
        let handle = PollHandle::new(
            || async { Ok::<u32, String>(1) },
            |_| {},
            PollingOptions::new(100).validate(move |_: &u32| {
                if let Some(handle) = reader.lock().unwrap().as_ref() {
                    sink.lock().unwrap().push(handle.epoch());
                }
                true
            }),
            Arc::new(MemoryLogger::new()),
        );
        *slot.lock().unwrap() = Some(handle.clone());
        handle.start();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(handle.state(), PollState::Running);
        handle.stop();
        slot.lock().unwrap().take();
    }
}
