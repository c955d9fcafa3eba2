//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvBarSource;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_state_adapter::JsonStateAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::config::{CUSTOM_RULE_KEYS, EngineConfig, build_engine_config};
use crate::domain::config_validation::validate_engine_config;
use crate::domain::engine::{Action, CycleOutcome, Engine, ExitEvent};
use crate::domain::error::EngineError;
use crate::domain::rule::RuleSetKind;
use crate::domain::rule_parser;
use crate::logging::{LogFormat, init_logging};
use crate::ports::config_port::ConfigPort;
use crate::ports::state_port::StatePort;

#[derive(Parser, Debug)]
#[command(name = "trendgate", about = "Indicator signal engine with risk-bounded orders")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one evaluation cycle against the paper broker
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding one `<INSTRUMENT>.csv` per instrument
        #[arg(short, long)]
        data_dir: PathBuf,
        /// Restart snapshot, loaded before and saved after the cycle
        #[arg(short, long)]
        state: Option<PathBuf>,
    },
    /// Validate an engine configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.log_format);
    match cli.command {
        Command::Evaluate {
            config,
            data_dir,
            state,
        } => run_evaluate(&config, data_dir, state),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: EngineError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

fn run_evaluate(config_path: &PathBuf, data_dir: PathBuf, state_path: Option<PathBuf>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = match build_engine_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let store = state_path.map(JsonStateAdapter::new);
    let restored = match store.as_ref().map(|s| s.load()).transpose() {
        Ok(state) => state.flatten(),
        Err(e) => return fail(e),
    };

    let quantity = config.quantity;
    let mut engine = Engine::new(config);
    if let Some(state) = restored {
        info!(instruments = state.instruments.len(), "restored state snapshot");
        engine.restore(state);
    }

    let source = CsvBarSource::new(data_dir);
    let mut broker = PaperBroker::seeded(engine.state(), quantity);
    let report = engine.run_cycle(&source, &mut broker);

    for outcome in &report.outcomes {
        println!("{}", format_outcome(outcome));
    }

    if let Some(store) = &store {
        if let Err(e) = store.save(engine.state()) {
            return fail(e);
        }
    }

    ExitCode::SUCCESS
}

/// One summary line per instrument, `key=value` pairs after the symbol.
pub fn format_outcome(outcome: &CycleOutcome) -> String {
    let mut line = format!("{} signal={}", outcome.instrument, outcome.signal);
    if let Some(confirmed) = outcome.confirmed {
        line.push_str(&format!(" confirmed={}", confirmed));
    }
    match &outcome.exit {
        Some(ExitEvent::Flattened { reason, price }) => {
            line.push_str(&format!(" exit={} exit_price={:.2}", reason, price));
        }
        Some(ExitEvent::FlattenFailed { reason, error }) => {
            line.push_str(&format!(" exit={} exit_error=\"{}\"", reason, error));
        }
        Some(ExitEvent::Reconciled) => line.push_str(" exit=reconciled"),
        None => {}
    }
    let action = match &outcome.action {
        Action::Idle => "action=idle".to_string(),
        Action::Armed => "action=armed".to_string(),
        Action::Discarded => "action=discarded".to_string(),
        Action::Submitted { order_id, intent } => {
            let mut s = format!(
                "action=submitted order={} side={} kind={} qty={} entry={:.2}",
                order_id, intent.side, intent.kind, intent.quantity, intent.entry_price
            );
            if let Some(sl) = intent.stop_loss {
                s.push_str(&format!(" stop_loss={:.2}", sl));
            }
            if let Some(tp) = intent.take_profit {
                s.push_str(&format!(" take_profit={:.2}", tp));
            }
            if let Some(strike) = intent.strike {
                s.push_str(&format!(" strike={:.2}", strike));
            }
            if let Some(expiry) = intent.expiry {
                s.push_str(&format!(" expiry={}", expiry));
            }
            s
        }
        Action::SizingFailed { reason } => format!("action=sizing_failed reason=\"{}\"", reason),
        Action::Rejected { reason } => format!("action=rejected reason=\"{}\"", reason),
        Action::Skipped { reason } => format!("action=skipped reason=\"{}\"", reason),
    };
    line.push(' ');
    line.push_str(&action);
    line
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let is_custom = adapter
        .get_string("signals", "rule_set")
        .and_then(|s| s.parse::<RuleSetKind>().ok())
        == Some(RuleSetKind::Custom);
    if is_custom {
        for (key, _) in CUSTOM_RULE_KEYS {
            let Some(text) = adapter.get_string("signals", key) else {
                continue;
            };
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            if let Err(e) = rule_parser::parse(text) {
                eprintln!("error in [signals] {}:\n{}", key, e.display_with_context(text));
                return (&EngineError::from(e)).into();
            }
        }
    }

    if let Err(e) = validate_engine_config(&adapter) {
        return fail(e);
    }
    let config = match build_engine_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    print_summary(&config);
    println!("OK");
    ExitCode::SUCCESS
}

fn print_summary(config: &EngineConfig) {
    let signals: Vec<String> = config
        .classifier
        .rules
        .entries
        .iter()
        .map(|entry| entry.signal.to_string())
        .collect();

    eprintln!("  Instruments:  {}", config.instruments.join(", "));
    eprintln!("  Rule set:     {}", config.classifier.rules.kind);
    eprintln!("  Signals:      {}", signals.join(", "));
    eprintln!(
        "  Indicators:   EMA {}/{}, RSI {}, MACD {}/{}/{}, ATR {}",
        config.indicators.ema_short,
        config.indicators.ema_long,
        config.indicators.rsi_period,
        config.indicators.macd_fast,
        config.indicators.macd_slow,
        config.indicators.macd_signal,
        config.indicators.atr_period
    );
    eprintln!(
        "  Confirmation: {}",
        if config.require_confirmation { "required" } else { "off" }
    );
    eprintln!("  Min bars:     {}", config.indicators.min_bars());
}
