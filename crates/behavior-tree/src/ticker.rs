//! Periodic ticking of a root node.
//!
//! A [`Ticker`] owns a background task that ticks its root once per period
//! until it is stopped, its [`Context`] completes, or the configured
//! [`StopPolicy`] decides the latest tick was terminal. Ticks run
//! synchronously on the ticker task and never overlap; wrap slow ticks with
//! [`crate::async_tick`] to keep the cadence independent of tick latency.

use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info, trace, warn};

use crate::async_tick::catch_panic;
use crate::context::Context;
use crate::node::{Node, Tick};
use crate::{Error, Result, Status};

/// When a ticker stops on its own, besides stop requests and its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StopPolicy {
    /// Keep ticking regardless of status or tick errors.
    #[default]
    Continue,
    /// Stop on the first tick error; `Failure` alone keeps ticking.
    StopOnError,
    /// Stop on the first `Failure` status or tick error.
    StopOnFailure,
}

/// Ticker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TickerConfig {
    /// Interval between ticks (must be non-zero)
    pub period: Duration,
    pub policy: StopPolicy,
    /// Record [`Error::TickFailed`] when a `Failure` without error stops the
    /// ticker under [`StopPolicy::StopOnFailure`] (default: false, no error)
    pub failure_is_error: bool,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            policy: StopPolicy::Continue,
            failure_is_error: false,
        }
    }
}

/// What the ticker evaluates each period.
enum Source {
    /// Resolved again on every tick.
    Node(Node),
    /// Reused as-is on every tick.
    Fixed { tick: Tick, children: Vec<Node> },
}

impl Source {
    fn resolve(&self) -> (Option<Tick>, Vec<Node>) {
        match self {
            Source::Node(node) => node.resolve(),
            Source::Fixed { tick, children } => (Some(Arc::clone(tick)), children.clone()),
        }
    }
}

/// State shared between a [`Ticker`] handle and its loop task.
struct Shared {
    stop: CancellationToken,
    done: CancellationToken,
    /// Written once, before `done` is cancelled.
    err: OnceLock<Error>,
}

/// Handle to a running ticker.
///
/// Dropping the handle requests a stop, so the loop task never outlives it.
pub struct Ticker {
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Create a new ticker builder
    pub fn builder() -> TickerBuilder {
        TickerBuilder::new()
    }

    /// Ticks `node` every `period` until stopped or `ctx` completes.
    ///
    /// Uses [`StopPolicy::Continue`].
    pub fn new(ctx: &Context, period: Duration, node: Node) -> Result<Self> {
        Self::builder()
            .context(ctx.clone())
            .period(period)
            .node(node)
            .build()
    }

    /// Like [`Ticker::new`], but also stops on the first `Failure` or error.
    pub fn stop_on_failure(ctx: &Context, period: Duration, node: Node) -> Result<Self> {
        Self::builder()
            .context(ctx.clone())
            .period(period)
            .policy(StopPolicy::StopOnFailure)
            .node(node)
            .build()
    }

    /// Requests shutdown. Idempotent and non-blocking.
    pub fn stop(&self) {
        self.shared.stop.cancel();
    }

    /// Future that resolves once the ticker has stopped.
    ///
    /// Any number of observers may wait on their own `done()` future.
    pub fn done(&self) -> WaitForCancellationFutureOwned {
        self.shared.done.clone().cancelled_owned()
    }

    /// Returns `true` once the ticker has stopped.
    pub fn is_done(&self) -> bool {
        self.shared.done.is_cancelled()
    }

    /// Terminal error, if any.
    ///
    /// Always `None` before the ticker stops; fixed once [`Ticker::done`]
    /// resolves.
    pub fn err(&self) -> Option<Error> {
        self.shared.err.get().cloned()
    }

    /// Waits for the loop task to finish and returns its terminal error.
    pub async fn wait(mut self) -> Result<()> {
        if let Some(task) = self.task.take()
            && let Err(join_error) = task.await
        {
            warn!(%join_error, "ticker task did not complete");
            return Err(self
                .err()
                .unwrap_or(Error::TaskJoin(join_error.to_string())));
        }
        self.err().map_or(Ok(()), Err)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builder for [`Ticker`].
///
/// A context and a node (or tick) are required; the period defaults to
/// [`TickerConfig::default`].
pub struct TickerBuilder {
    config: TickerConfig,
    ctx: Option<Context>,
    source: Option<Source>,
}

impl TickerBuilder {
    fn new() -> Self {
        Self {
            config: TickerConfig::default(),
            ctx: None,
            source: None,
        }
    }

    /// Override ticker configuration
    pub fn config(mut self, config: TickerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set required context
    pub fn context(mut self, ctx: Context) -> Self {
        self.ctx = Some(ctx);
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    pub fn policy(mut self, policy: StopPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Record [`Error::TickFailed`] for a terminal `Failure` without error.
    pub fn failure_is_error(mut self, enable: bool) -> Self {
        self.config.failure_is_error = enable;
        self
    }

    /// Tick `node`, resolving it again every period.
    pub fn node(mut self, node: Node) -> Self {
        self.source = Some(Source::Node(node));
        self
    }

    /// Tick a fixed `tick` with fixed `children` every period.
    pub fn tick(mut self, tick: Tick, children: Vec<Node>) -> Self {
        self.source = Some(Source::Fixed { tick, children });
        self
    }

    /// Validates the configuration and starts the ticker task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Ticker> {
        let ctx = self.ctx.ok_or(Error::MissingContext)?;
        if self.config.period.is_zero() {
            return Err(Error::InvalidPeriod);
        }
        let source = self.source.ok_or(Error::MissingNode)?;
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let shared = Arc::new(Shared {
            stop: CancellationToken::new(),
            done: CancellationToken::new(),
            err: OnceLock::new(),
        });

        let worker = TickerWorker {
            ctx,
            source,
            config: self.config,
            shared: Arc::clone(&shared),
        };

        // Arm the interval before returning so the first tick is one period
        // from construction.
        let first = Instant::now() + worker.config.period;
        let task = handle.spawn(worker.run(first));

        Ok(Ticker {
            shared,
            task: Some(task),
        })
    }
}

/// Loop task behind a [`Ticker`].
struct TickerWorker {
    ctx: Context,
    source: Source,
    config: TickerConfig,
    shared: Arc<Shared>,
}

impl TickerWorker {
    /// Main ticker loop.
    async fn run(self, first: Instant) {
        info!(
            period = ?self.config.period,
            policy = ?self.config.policy,
            "ticker started"
        );

        let err = {
            let mut interval = time::interval_at(first, self.config.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let ctx_done = self.ctx.done();
            tokio::pin!(ctx_done);

            let mut ticks: u64 = 0;
            loop {
                tokio::select! {
                    biased;
                    _ = self.shared.stop.cancelled() => {
                        debug!(ticks, "ticker stopped by request");
                        break None;
                    }
                    _ = &mut ctx_done => {
                        let err = self.ctx.err().map(Error::from);
                        debug!(ticks, ?err, "ticker context completed");
                        break err;
                    }
                    _ = interval.tick() => {
                        ticks += 1;
                        if let ControlFlow::Break(err) = self.tick_once(ticks) {
                            debug!(ticks, ?err, "ticker stopped by tick outcome");
                            break err;
                        }
                    }
                }
            }
        };

        self.finish(err);
    }

    /// Resolves the source, ticks it and applies the stop policy.
    ///
    /// Panics raised while resolving or ticking are terminal under every
    /// policy.
    fn tick_once(&self, n: u64) -> ControlFlow<Option<Error>> {
        let resolved = catch_panic(|| {
            let (tick, children) = self.source.resolve();
            tick.map(|tick| tick(&children))
        });
        let result = match resolved {
            Ok(Some(result)) => result,
            Ok(None) => return ControlFlow::Break(Some(Error::MissingTick)),
            Err(panicked) => return ControlFlow::Break(Some(panicked)),
        };
        trace!(tick = n, ?result, "ticked root");

        match (self.config.policy, result) {
            (StopPolicy::Continue, Err(err)) => {
                warn!(tick = n, %err, "ignoring tick error");
                ControlFlow::Continue(())
            }
            (StopPolicy::Continue, Ok(_)) => ControlFlow::Continue(()),
            (StopPolicy::StopOnError | StopPolicy::StopOnFailure, Err(err)) => {
                ControlFlow::Break(Some(err))
            }
            (StopPolicy::StopOnFailure, Ok(Status::Failure)) => {
                ControlFlow::Break(self.config.failure_is_error.then_some(Error::TickFailed))
            }
            (StopPolicy::StopOnError | StopPolicy::StopOnFailure, Ok(_)) => {
                ControlFlow::Continue(())
            }
        }
    }

    /// Records the terminal error, then signals completion exactly once.
    fn finish(&self, err: Option<Error>) {
        if let Some(err) = err {
            let _ = self.shared.err.set(err);
        }
        self.shared.done.cancel();
    }
}

/// Closes `done` even if the loop task unwinds or is aborted.
impl Drop for TickerWorker {
    fn drop(&mut self) {
        if !self.shared.done.is_cancelled() {
            let err = if std::thread::panicking() {
                Error::Panicked("ticker task panicked".to_string())
            } else {
                Error::TaskJoin("ticker task cancelled".to_string())
            };
            self.finish(Some(err));
        }
    }
}
