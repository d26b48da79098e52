use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use common::{Bias, Error, Outcome, RejectionReason, Result, Signal, SignalState};

/// How many resolved signal ids are remembered for double-resolve detection.
/// Resolved signals themselves are discarded.
pub const RESOLVED_ID_MEMORY: usize = 1024;

/// User-configurable admission policy.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Minimum time between two signals opened for the same symbol.
    pub cooldown: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::hours(1),
        }
    }
}

/// The gatekeeper between condition evaluation and alerting.
///
/// Owns the pending-signal set and the cooldown ledger. At most one signal is
/// open per symbol; a symbol may not re-fire until the cooldown since its last
/// opened signal has elapsed, whether or not that signal has resolved.
#[derive(Debug, Default)]
pub struct SignalRegistry {
    config: RegistryConfig,
    /// Open signals keyed by symbol.
    pending: HashMap<String, Signal>,
    /// Cooldown ledger: symbol → opened_at of the most recent signal.
    last_signal_at: HashMap<String, DateTime<Utc>>,
    resolved_ids: HashSet<String>,
    resolved_order: VecDeque<String>,
}

impl SignalRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Admit a new signal for `symbol`, or say why not.
    ///
    /// The ledger is only touched on success, so suppressed detections never
    /// extend a cooldown.
    pub fn try_open(
        &mut self,
        symbol: &str,
        bias: Bias,
        reference_close: f64,
        now: DateTime<Utc>,
    ) -> Result<Signal, RejectionReason> {
        self.admit(Signal::open(symbol, bias, reference_close, now))
    }

    /// Like `try_open`, for a candidate built by the caller. The candidate's
    /// `opened_at` is the admission time.
    pub fn admit(&mut self, candidate: Signal) -> Result<Signal, RejectionReason> {
        let symbol = candidate.symbol.as_str();
        if self.pending.contains_key(symbol) {
            debug!(symbol, "Signal suppressed: already open");
            return Err(RejectionReason::AlreadyOpen);
        }

        if let Some(&last) = self.last_signal_at.get(symbol) {
            let elapsed = candidate.opened_at - last;
            if elapsed < self.config.cooldown {
                let remaining_secs = (self.config.cooldown - elapsed).num_seconds();
                debug!(symbol, remaining_secs, "Signal suppressed: cooldown");
                return Err(RejectionReason::Cooldown { remaining_secs });
            }
        }

        self.last_signal_at
            .insert(candidate.symbol.clone(), candidate.opened_at);
        self.pending
            .insert(candidate.symbol.clone(), candidate.clone());
        info!(
            symbol = %candidate.symbol,
            signal_id = %candidate.id,
            bias = %candidate.bias,
            reference_close = candidate.reference_close,
            "Signal opened"
        );
        Ok(candidate)
    }

    /// Every open signal with `now >= opened_at + hold`, oldest first.
    pub fn due_for_reconciliation(&self, now: DateTime<Utc>, hold: Duration) -> Vec<Signal> {
        let mut due: Vec<Signal> = self
            .pending
            .values()
            .filter(|s| now >= s.due_at(hold))
            .cloned()
            .collect();
        sort_oldest_first(&mut due);
        due
    }

    /// Close a pending signal with its outcome and evict it.
    ///
    /// Fails with `NotPending` when the id was already resolved and `NotFound`
    /// when it was never seen; neither case changes the pending set.
    pub fn resolve(&mut self, signal_id: &str, outcome: Outcome) -> Result<Signal> {
        let symbol = self
            .pending
            .values()
            .find(|s| s.id == signal_id)
            .map(|s| s.symbol.clone());

        let Some(symbol) = symbol else {
            return Err(if self.resolved_ids.contains(signal_id) {
                Error::NotPending(signal_id.to_string())
            } else {
                Error::NotFound(signal_id.to_string())
            });
        };

        let Some(mut signal) = self.pending.remove(&symbol) else {
            return Err(Error::NotFound(signal_id.to_string()));
        };
        signal.state = SignalState::Resolved;
        signal.outcome = Some(outcome);
        self.remember_resolved(signal_id);

        info!(symbol = %signal.symbol, signal_id, "Signal resolved");
        Ok(signal)
    }

    /// Snapshot of all open signals, oldest first.
    pub fn pending(&self) -> Vec<Signal> {
        let mut open: Vec<Signal> = self.pending.values().cloned().collect();
        sort_oldest_first(&mut open);
        open
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn open_signal(&self, symbol: &str) -> Option<&Signal> {
        self.pending.get(symbol)
    }

    pub fn last_signal_at(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.last_signal_at.get(symbol).copied()
    }

    fn remember_resolved(&mut self, signal_id: &str) {
        if self.resolved_ids.insert(signal_id.to_string()) {
            self.resolved_order.push_back(signal_id.to_string());
        }
        while self.resolved_order.len() > RESOLVED_ID_MEMORY {
            if let Some(oldest) = self.resolved_order.pop_front() {
                self.resolved_ids.remove(&oldest);
            }
        }
    }
}

fn sort_oldest_first(signals: &mut [Signal]) {
    signals.sort_by(|a, b| {
        a.opened_at
            .cmp(&b.opened_at)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

// ─── Tests ────────────────────────────────────────────────────────────────────
