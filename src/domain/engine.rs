//! Evaluation cycle: bars → snapshots → signal → confirmation → sizing → guard → order.
//!
//! Every failure is recovered per instrument; one instrument never aborts the
//! rest of the cycle.

use tracing::{debug, error, info, info_span, warn};

use crate::domain::config::EngineConfig;
use crate::domain::error::EngineError;
use crate::domain::guard::OrderGuard;
use crate::domain::indicator::compute_snapshots;
use crate::domain::order::{OrderIntent, build_intent};
use crate::domain::risk::{ExitReason, RiskLevels, SwingRange, compute_levels};
use crate::domain::signal::Signal;
use crate::domain::state::{EngineState, InstrumentState};
use crate::ports::broker_port::{BrokerPort, OrderId};
use crate::ports::data_port::BarSource;

/// What happened to an open position during the exit check.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitEvent {
    Flattened { reason: ExitReason, price: f64 },
    FlattenFailed { reason: ExitReason, error: String },
    /// The broker no longer reports a position or order; levels were dropped.
    Reconciled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Nothing to do this cycle.
    Idle,
    /// A buy-type signal armed the confirmation state machine.
    Armed,
    Submitted { order_id: OrderId, intent: OrderIntent },
    /// Open order or position already exists; signal dropped.
    Discarded,
    SizingFailed { reason: String },
    Rejected { reason: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub instrument: String,
    /// Raw classifier output for the latest bar.
    pub signal: Signal,
    pub confirmed: Option<Signal>,
    pub exit: Option<ExitEvent>,
    pub action: Action,
}

impl CycleOutcome {
    fn new(instrument: &str) -> Self {
        CycleOutcome {
            instrument: instrument.to_string(),
            signal: Signal::None,
            confirmed: None,
            exit: None,
            action: Action::Idle,
        }
    }

    fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.action = Action::Skipped {
            reason: reason.into(),
        };
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub outcomes: Vec<CycleOutcome>,
}

impl CycleReport {
    pub fn submitted(&self) -> impl Iterator<Item = &CycleOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.action, Action::Submitted { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.action, Action::Skipped { .. }))
            .count()
    }

    pub fn outcome(&self, instrument: &str) -> Option<&CycleOutcome> {
        self.outcomes.iter().find(|o| o.instrument == instrument)
    }
}

/// Re-check stored levels against the latest close and flatten if crossed.
/// `swing` adds the swing-break exit on top of the stored levels.
fn check_exit(
    state: &mut InstrumentState,
    instrument: &str,
    price: f64,
    swing: Option<SwingRange>,
    broker: &mut dyn BrokerPort,
) -> Option<ExitEvent> {
    state.risk.as_ref()?;

    match (
        broker.open_position(instrument),
        broker.open_orders(instrument),
    ) {
        (Ok(None), Ok(orders)) if orders.is_empty() => {
            info!(instrument, "position closed at broker, clearing risk levels");
            state.risk = None;
            return Some(ExitEvent::Reconciled);
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!(instrument, error = %e, "position query failed, checking levels anyway");
        }
        _ => {}
    }

    let levels = state.risk.as_mut()?;
    levels.observe(price);
    let direction = levels.direction;
    let reason = levels.exit_trigger(price).or_else(|| {
        swing
            .filter(|range| range.is_broken(direction, price))
            .map(|_| ExitReason::SwingBreak)
    })?;

    match broker.flatten_position(instrument) {
        Ok(()) => {
            info!(instrument, %reason, price, "exit level crossed, position flattened");
            state.risk = None;
            Some(ExitEvent::Flattened { reason, price })
        }
        Err(e) => {
            error!(instrument, %reason, error = %e, "exit level crossed but flatten failed");
            Some(ExitEvent::FlattenFailed {
                reason,
                error: e.to_string(),
            })
        }
    }
}

/// Run one evaluation for a single instrument, mutating only its own state.
pub fn evaluate_instrument(
    config: &EngineConfig,
    state: &mut InstrumentState,
    instrument: &str,
    source: &dyn BarSource,
    broker: &mut dyn BrokerPort,
) -> CycleOutcome {
    let mut outcome = CycleOutcome::new(instrument);

    let bars = match source.get_bars(instrument, config.lookback, config.period_unit) {
        Ok(bars) => bars,
        Err(e) => {
            warn!(instrument, error = %e, "bar source failed, skipping");
            return outcome.skipped(e.to_string());
        }
    };
    let Some(latest_bar) = bars.last() else {
        let e = EngineError::DataUnavailable {
            instrument: instrument.to_string(),
        };
        info!(instrument, "no bars, skipping");
        return outcome.skipped(e.to_string());
    };

    let snapshots = match compute_snapshots(&bars, &config.indicators) {
        Ok(snapshots) => snapshots,
        Err(e) => {
            info!(instrument, error = %e, "indicators undefined, skipping");
            return outcome.skipped(e.to_string());
        }
    };
    let Some(current) = snapshots.last() else {
        return outcome.skipped("no snapshot");
    };
    let previous = snapshots.len().checked_sub(2).map(|i| &snapshots[i]);

    let swing = if config.risk.swing_exit {
        SwingRange::prior_to_latest(&bars)
    } else {
        None
    };
    outcome.exit = check_exit(state, instrument, current.close, swing, broker);

    let raw = config.classifier.classify(current, previous);
    outcome.signal = raw;
    debug!(instrument, signal = %raw, close = current.close, "classified");

    let (next, confirmed) = state.confirmation.step(
        raw,
        latest_bar,
        config.confirmation_mode,
        config.require_confirmation,
    );

    let Some(signal) = confirmed else {
        if next.is_pending() {
            info!(instrument, signal = %raw, "signal armed, awaiting confirmation");
            outcome.action = Action::Armed;
        }
        state.confirmation = next;
        return outcome;
    };
    outcome.confirmed = Some(signal);

    match OrderGuard::check(&*broker, instrument) {
        Ok(()) => {}
        Err(EngineError::ConflictingOrder { .. }) => {
            info!(instrument, %signal, "open order or position exists, signal discarded");
            state.confirmation = next;
            outcome.action = Action::Discarded;
            return outcome;
        }
        Err(e) => {
            warn!(instrument, %signal, error = %e, "order guard query failed, not dispatching");
            state.confirmation = state.confirmation.after_failed_dispatch(raw);
            return outcome.skipped(e.to_string());
        }
    }

    let Some(direction) = signal.direction() else {
        state.confirmation = next;
        return outcome;
    };
    let levels = match compute_levels(
        current.close,
        direction,
        config.risk.basis(current.atr),
        config.risk.risk_reward_ratio,
    ) {
        Ok(levels) => levels,
        Err(e) => {
            warn!(instrument, %signal, error = %e, "risk sizing failed, no order");
            state.confirmation = state.confirmation.after_failed_dispatch(raw);
            outcome.action = Action::SizingFailed {
                reason: e.to_string(),
            };
            return outcome;
        }
    };

    let Some(intent) = build_intent(
        instrument,
        signal,
        config.quantity,
        &levels,
        config.risk.exit_mode,
        &config.options,
    ) else {
        state.confirmation = next;
        return outcome;
    };

    match broker.submit_order(&intent) {
        Ok(order_id) => {
            info!(
                instrument,
                %signal,
                %order_id,
                side = %intent.side,
                kind = %intent.kind,
                quantity = intent.quantity,
                stop_loss = ?intent.stop_loss,
                take_profit = ?intent.take_profit,
                "order submitted"
            );
            let mut risk = RiskLevels::from_intent(&intent);
            if let (Some(levels), Some(pct)) = (risk.as_mut(), config.risk.trailing()) {
                levels.trail_pct = Some(pct);
            }
            state.risk = risk;
            state.confirmation = next;
            outcome.action = Action::Submitted { order_id, intent };
        }
        Err(e) => {
            error!(instrument, %signal, error = %e, "order submission failed");
            state.confirmation = state.confirmation.after_failed_dispatch(raw);
            outcome.action = Action::Rejected {
                reason: e.to_string(),
            };
        }
    }

    outcome
}

/// Evaluate every configured instrument once, in order.
pub fn run_cycle(
    config: &EngineConfig,
    state: &mut EngineState,
    source: &dyn BarSource,
    broker: &mut dyn BrokerPort,
) -> CycleReport {
    let span = info_span!("cycle", instruments = config.instruments.len());
    let _enter = span.enter();

    let mut report = CycleReport::default();
    for instrument in &config.instruments {
        let span = info_span!("instrument", instrument = %instrument);
        let _enter = span.enter();
        let outcome = evaluate_instrument(
            config,
            state.entry(instrument),
            instrument,
            source,
            broker,
        );
        report.outcomes.push(outcome);
    }
    state.prune(&config.instruments);

    info!(
        evaluated = report.outcomes.len(),
        submitted = report.submitted().count(),
        skipped = report.skipped(),
        "cycle complete"
    );
    report
}

/// Owns configuration and the per-instrument state map across cycles.
pub struct Engine {
    config: EngineConfig,
    state: EngineState,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config,
            state: EngineState::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Replace the state map, e.g. from a restart snapshot.
    pub fn restore(&mut self, state: EngineState) {
        self.state = state;
    }

    pub fn run_cycle(
        &mut self,
        source: &dyn BarSource,
        broker: &mut dyn BrokerPort,
    ) -> CycleReport {
        run_cycle(&self.config, &mut self.state, source, broker)
    }
}
