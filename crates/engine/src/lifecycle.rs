use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use common::{Config, EngineCommand, EngineState, Signal};

use crate::signal_engine::SignalEngine;

/// Periods of the three scheduled actions.
#[derive(Debug, Clone)]
pub struct Cadence {
    pub heartbeat: Duration,
    pub scan: Duration,
    pub reconcile: Duration,
}

impl Cadence {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            heartbeat: cfg.heartbeat_interval,
            scan: cfg.scan_interval,
            reconcile: cfg.reconcile_interval,
        }
    }
}

/// Wall-clock time that advances with the runtime's monotonic clock.
#[derive(Debug, Clone, Copy)]
struct Clock {
    origin_utc: DateTime<Utc>,
    origin: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            origin_utc: Utc::now(),
            origin: Instant::now(),
        }
    }

    /// Wall-clock time of a runtime instant.
    fn at(&self, instant: Instant) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(instant.saturating_duration_since(self.origin))
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin_utc + elapsed
    }
}

/// Cloneable handle passed to other crates (Telegram, API).
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
    engine: Arc<SignalEngine>,
}

impl EngineHandle {
    pub async fn send(&self, cmd: EngineCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            warn!(?cmd, "Scheduler is gone, command dropped");
        }
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    pub async fn open_signals(&self) -> Vec<Signal> {
        self.engine.pending_signals().await
    }

    pub fn symbols(&self) -> &[String] {
        self.engine.symbols()
    }
}

/// Drives heartbeat, scan and reconcile on one cooperative loop.
///
/// Actions run one at a time, so scan and reconcile never overlap. Heartbeat
/// and scan fire once on start. Cancellation is observed between actions: a
/// pass in flight finishes (its fetches are timeout-bounded) before the loop exits.
pub struct Scheduler {
    engine: Arc<SignalEngine>,
    cadence: Cadence,
    state: Arc<RwLock<EngineState>>,
    command_rx: mpsc::Receiver<EngineCommand>,
    shutdown: CancellationToken,
    clock: Clock,
}

impl Scheduler {
    pub fn new(
        engine: Arc<SignalEngine>,
        cadence: Cadence,
        shutdown: CancellationToken,
    ) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(EngineState::Stopped));

        let handle = EngineHandle {
            command_tx,
            state: state.clone(),
            engine: engine.clone(),
        };

        let scheduler = Scheduler {
            engine,
            cadence,
            state,
            command_rx,
            shutdown,
            clock: Clock::start(),
        };

        (scheduler, handle)
    }

    /// Run until the shutdown token is cancelled. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        *self.state.write().await = EngineState::Running;
        info!(
            symbols = ?self.engine.symbols(),
            scan = ?self.cadence.scan,
            reconcile = ?self.cadence.reconcile,
            heartbeat = ?self.cadence.heartbeat,
            "Scheduler started"
        );

        let start = Instant::now();
        self.heartbeat(start).await;
        self.scan(start).await;

        let mut heartbeat = ticker(start, self.cadence.heartbeat);
        let mut scan = ticker(start, self.cadence.scan);
        let mut reconcile = ticker(start, self.cadence.reconcile);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(cmd) = self.command_rx.recv() => self.apply(cmd).await,
                at = reconcile.tick() => self.reconcile(at).await,
                at = scan.tick() => self.scan(at).await,
                at = heartbeat.tick() => self.heartbeat(at).await,
            }
        }

        *self.state.write().await = EngineState::Stopped;
        let forgotten = self.engine.pending_signals().await;
        if !forgotten.is_empty() {
            warn!(
                count = forgotten.len(),
                "Pending signals are not persisted and will be forgotten"
            );
            for signal in &forgotten {
                warn!(
                    signal_id = %signal.id,
                    symbol = %signal.symbol,
                    opened_at = %signal.opened_at,
                    "Forgotten pending signal"
                );
            }
        }
        info!("Scheduler stopped");
    }

    async fn apply(&self, cmd: EngineCommand) {
        let mut state = self.state.write().await;
        match (cmd, *state) {
            (EngineCommand::Pause, EngineState::Running) => {
                info!("Engine paused; reconciliation continues, scanning suspended");
                *state = EngineState::Paused;
            }
            (EngineCommand::Resume, EngineState::Paused) => {
                info!("Engine resumed");
                *state = EngineState::Running;
            }
            (cmd, current) => debug!(?cmd, %current, "Command has no effect in current state"),
        }
    }

    /// Passes are stamped with the tick's scheduled instant, not the moment
    /// they start, so a signal opened on one tick is due exactly one hold later.
    async fn scan(&self, at: Instant) {
        if *self.state.read().await != EngineState::Running {
            debug!("Scan skipped while paused");
            return;
        }
        let report = self.engine.scan(self.clock.at(at)).await;
        info!(
            evaluated = report.evaluated,
            opened = report.opened,
            suppressed = report.suppressed,
            skipped = report.skipped,
            "Scan complete"
        );
    }

    async fn reconcile(&self, at: Instant) {
        let report = self.engine.reconcile(self.clock.at(at)).await;
        if report.due > 0 {
            info!(
                due = report.due,
                resolved = report.resolved,
                deferred = report.deferred,
                "Reconciliation complete"
            );
        }
    }

    async fn heartbeat(&self, at: Instant) {
        let state = *self.state.read().await;
        self.engine.heartbeat(state, self.clock.at(at)).await;
    }
}

/// Interval whose first tick is one period after `start`.
fn ticker(start: Instant, period: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(start + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
