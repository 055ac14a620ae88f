//! Fault recovery: rate-limit classification, the retry scheduler, and the
//! restart supervisor.
//!
//! The scheduler alternates between two states. While **Running** it pulls
//! comments from the transport and dispatches them. Any fault moves it to
//! **Recovering**: the fault text is classified, a wait is computed, and the
//! wait is counted down in fixed steps before it goes back to Running.
//!
//! A rate-limited comment is retried after the wait. Any other fault marks
//! the offending comment handled first, so one unanswerable comment cannot
//! trap the bot in a retry loop.
//!
//! Faults that escape recovery itself (e.g. the handled marker cannot be
//! set) end the scheduler run; the [`Supervisor`] waits a fixed interval and
//! starts a new run.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::{Dispatcher, Fault, Outcome};
use crate::error::{ConfigError, ConfigResult, TransportResult};
use crate::transport::{Comment, ForumTransport};

/// First token of a rate-limit notice.
pub const RATE_LIMIT_MARKER: &str = "RATELIMIT:";

const MINUTE_UNITS: [&str; 4] = ["minute", "minutes", "min", "mins"];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Backoff timing, all in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Wait after a fault that names no duration.
    pub default_secs: u64,
    /// Countdown granularity; one sleep and one log line per step.
    pub step_secs: u64,
    /// Added to every parsed rate-limit wait.
    pub margin_secs: u64,
    /// Supervisor pause before restarting a failed run.
    pub restart_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            default_secs: 15,
            step_secs: 5,
            margin_secs: 60,
            restart_secs: 20,
        }
    }
}

impl BackoffConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.step_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "backoff.step_secs must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn step(&self) -> Duration {
        Duration::from_secs(self.step_secs)
    }

    pub fn restart(&self) -> Duration {
        Duration::from_secs(self.restart_secs)
    }

    /// Classify a fault's text payload.
    ///
    /// Only text whose first whitespace token is `RATELIMIT:` is a rate
    /// limit. Its first integer token is the wait; when any token is a
    /// minute unit the integer counts minutes. Surrounding punctuation and
    /// quotes are ignored on every token.
    pub fn classify(&self, text: &str) -> FaultClass {
        let trimmed = text.trim_matches(|c: char| c == '.' || c == '\'' || c.is_whitespace());
        let mut tokens = trimmed.split_whitespace();
        if tokens.next() != Some(RATE_LIMIT_MARKER) {
            return FaultClass::Other;
        }

        let words: Vec<String> = tokens
            .map(|t| {
                t.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .collect();
        let amount = words.iter().find_map(|w| w.parse::<u64>().ok());
        let in_minutes = words.iter().any(|w| MINUTE_UNITS.contains(&w.as_str()));

        let seconds = match amount {
            Some(n) if in_minutes => n.saturating_mul(60).saturating_add(self.margin_secs),
            Some(n) => n.saturating_add(self.margin_secs),
            None => self.default_secs,
        };
        FaultClass::RateLimit { seconds }
    }
}

/// How a fault is recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Posting restriction; wait `seconds`, then retry.
    RateLimit { seconds: u64 },
    Other,
}

/// [`BackoffConfig::classify`] with the default timings.
pub fn classify_fault(text: &str) -> FaultClass {
    BackoffConfig::default().classify(text)
}

// ---------------------------------------------------------------------------
// Sleeping
// ---------------------------------------------------------------------------

/// Blocking wait. Injected so tests never sleep.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Real sleeps. With an interrupt flag, sleeps end early once it is set.
#[derive(Debug, Clone, Default)]
pub struct ThreadSleeper {
    interrupt: Option<Arc<AtomicBool>>,
}

impl ThreadSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interruptible(flag: Arc<AtomicBool>) -> Self {
        Self {
            interrupt: Some(flag),
        }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        let Some(flag) = &self.interrupt else {
            std::thread::sleep(duration);
            return;
        };
        let tick = Duration::from_millis(250);
        let mut left = duration;
        while !left.is_zero() && !flag.load(Ordering::Relaxed) {
            let nap = tick.min(left);
            std::thread::sleep(nap);
            left -= nap;
        }
    }
}

/// Records requested sleeps instead of sleeping. Optionally raises a
/// shutdown flag once a given number of sleeps has been recorded.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
    stop_after: Option<(usize, Arc<AtomicBool>)>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `flag` when the `count`-th sleep is recorded.
    pub fn stopping_after(count: usize, flag: Arc<AtomicBool>) -> Self {
        Self {
            slept: Mutex::new(Vec::new()),
            stop_after: Some((count, flag)),
        }
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.slept().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        let Ok(mut slept) = self.slept.lock() else {
            return;
        };
        slept.push(duration);
        if let Some((count, flag)) = &self.stop_after {
            if slept.len() >= *count {
                flag.store(true, Ordering::Relaxed);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Recovering { remaining_secs: u64 },
}

/// Why a run ended without a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The transport has no more comments.
    StreamEnded,
    /// The operator asked to stop.
    Shutdown,
}

/// Counters over the scheduler's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub replied: u64,
    pub skipped: u64,
    pub faults: u64,
    pub rate_limits: u64,
}

/// Drives the dispatcher over the comment stream and recovers from faults.
pub struct Scheduler<S: Sleeper> {
    config: BackoffConfig,
    sleeper: S,
    shutdown: Arc<AtomicBool>,
    state: SchedulerState,
    stats: RunStats,
}

impl<S: Sleeper> Scheduler<S> {
    pub fn new(config: BackoffConfig, sleeper: S, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            config,
            sleeper,
            shutdown,
            state: SchedulerState::Running,
            stats: RunStats::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Process comments until the stream ends or shutdown is requested.
    ///
    /// Returns `Err` only for faults raised during recovery.
    pub fn run(
        &mut self,
        dispatcher: &Dispatcher,
        transport: &mut dyn ForumTransport,
    ) -> TransportResult<RunEnd> {
        let mut retry: Option<Comment> = None;
        loop {
            if self.stopping() {
                return Ok(RunEnd::Shutdown);
            }

            let comment = match retry.take() {
                Some(comment) => comment,
                None => match transport.next_comment() {
                    Ok(Some(comment)) => comment,
                    Ok(None) if self.stopping() => return Ok(RunEnd::Shutdown),
                    Ok(None) => return Ok(RunEnd::StreamEnded),
                    Err(e) => {
                        self.recover(&Fault::on_stream(e), transport)?;
                        continue;
                    }
                },
            };

            match dispatcher.handle(&comment, transport) {
                Ok(Outcome::Replied) => self.stats.replied += 1,
                Ok(_) => self.stats.skipped += 1,
                Err(fault) => {
                    if let FaultClass::RateLimit { .. } = self.recover(&fault, transport)? {
                        retry = Some(comment);
                    }
                }
            }
        }
    }

    /// Classify `fault`, mark its comment handled unless rate limited, and
    /// wait out the backoff.
    pub fn recover(
        &mut self,
        fault: &Fault,
        transport: &mut dyn ForumTransport,
    ) -> TransportResult<FaultClass> {
        self.stats.faults += 1;
        let text = fault.text();
        let class = self.config.classify(&text);

        let wait = match class {
            FaultClass::RateLimit { seconds } => {
                self.stats.rate_limits += 1;
                tracing::warn!(
                    comment_id = fault.comment_id.as_deref().unwrap_or("-"),
                    wait_secs = seconds,
                    error = %text,
                    "rate limited"
                );
                seconds
            }
            FaultClass::Other => {
                tracing::error!(
                    comment_id = fault.comment_id.as_deref().unwrap_or("-"),
                    error = %text,
                    "fault while handling comment"
                );
                if let Some(id) = &fault.comment_id {
                    transport.mark_handled(id)?;
                    tracing::info!(comment_id = %id, "comment marked handled after fault");
                }
                self.config.default_secs
            }
        };

        self.countdown(wait);
        Ok(class)
    }

    fn countdown(&mut self, seconds: u64) {
        let step = self.config.step_secs.max(1);
        let mut remaining = seconds;
        while remaining > 0 && !self.stopping() {
            self.state = SchedulerState::Recovering {
                remaining_secs: remaining,
            };
            tracing::info!(remaining_secs = remaining, "retrying in {remaining} seconds");
            self.sleeper.sleep(Duration::from_secs(step));
            remaining = remaining.saturating_sub(step);
        }
        self.state = SchedulerState::Running;
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Restarts a failed run after a fixed pause, until it ends cleanly or
/// shutdown is requested.
pub struct Supervisor<S: Sleeper> {
    restart: Duration,
    sleeper: S,
    shutdown: Arc<AtomicBool>,
    restarts: u64,
}

impl<S: Sleeper> Supervisor<S> {
    pub fn new(restart: Duration, sleeper: S, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            restart,
            sleeper,
            shutdown,
            restarts: 0,
        }
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn run<F, E>(&mut self, mut body: F) -> RunEnd
    where
        F: FnMut() -> Result<RunEnd, E>,
        E: fmt::Display,
    {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return RunEnd::Shutdown;
            }
            match body() {
                Ok(end) => return end,
                Err(e) => {
                    self.restarts += 1;
                    tracing::error!(
                        error = %e,
                        restart_secs = self.restart.as_secs(),
                        restarts = self.restarts,
                        "run failed, restarting"
                    );
                    self.sleeper.sleep(self.restart);
                }
            }
        }
    }
}

/// The full service loop: a supervised scheduler over `transport`.
pub fn run_supervised<S: Sleeper>(
    dispatcher: &Dispatcher,
    transport: &mut dyn ForumTransport,
    config: BackoffConfig,
    sleeper: &S,
    shutdown: Arc<AtomicBool>,
) -> (RunEnd, RunStats) {
    let mut supervisor = Supervisor::new(config.restart(), sleeper, Arc::clone(&shutdown));
    let mut scheduler = Scheduler::new(config, sleeper, shutdown);
    let end = supervisor.run(|| scheduler.run(dispatcher, &mut *transport));
    (end, scheduler.stats().clone())
}
