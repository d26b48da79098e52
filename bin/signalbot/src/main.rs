use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::Config;
use engine::{AlertFormatter, Cadence, DerivClient, EngineSettings, Scheduler, SignalEngine};
use registry::{RegistryConfig, SignalRegistry};
use strategy::{ConditionEvaluator, EvaluatorConfig, TrendMomentumEvaluator};
use telegram_ctrl::{start_bot, BotDeps, TelegramNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid configuration")?;
    info!(
        symbols = ?cfg.symbols,
        granularity_secs = cfg.granularity_secs,
        "SignalBot starting"
    );

    // ── Conditions ────────────────────────────────────────────────────────────
    let evaluator_cfg = match &cfg.strategy_config_path {
        Some(path) => EvaluatorConfig::load(path)
            .with_context(|| format!("failed to load condition config {path}"))?,
        None => EvaluatorConfig::default(),
    };
    let evaluator = TrendMomentumEvaluator::new(&evaluator_cfg, cfg.minimum_window)
        .context("condition config does not fit the minimum window")?;
    info!(
        evaluator = evaluator.name(),
        minimum_window = evaluator.minimum_window(),
        "Conditions ready"
    );

    // ── Broker (fail fast if the token is rejected) ──────────────────────────
    let deriv = tokio::time::timeout(
        cfg.fetch_timeout,
        DerivClient::connect(&cfg.deriv_ws_url, cfg.deriv_app_id, cfg.deriv_api_token.clone()),
    )
    .await
    .context("timed out connecting to the broker")?
    .context("broker connection failed")?;

    // ── Engine ────────────────────────────────────────────────────────────────
    let notifier = TelegramNotifier::new(cfg.telegram_token.clone(), cfg.telegram_chat_id);
    let alerts = AlertFormatter::new(cfg.display_utc_offset_minutes, cfg.granularity_secs)
        .context("invalid display offset")?;
    let registry = SignalRegistry::new(RegistryConfig {
        cooldown: cfg.cooldown,
    });
    let engine = Arc::new(SignalEngine::new(
        EngineSettings::from_config(&cfg),
        Arc::new(deriv),
        Arc::new(evaluator),
        Arc::new(notifier.clone()),
        registry,
        alerts,
    ));
    engine.announce_startup(Utc::now()).await;

    let shutdown = CancellationToken::new();
    let (scheduler, handle) = Scheduler::new(engine, Cadence::from_config(&cfg), shutdown.clone());

    // ── Telegram C2 ───────────────────────────────────────────────────────────
    let bot_deps = BotDeps {
        engine: handle.clone(),
        chat_id: notifier.chat_id(),
    };
    let bot_task = tokio::spawn(start_bot(notifier.bot(), bot_deps, shutdown.clone()));

    // ── Health endpoint ───────────────────────────────────────────────────────
    let api_state = api::AppState { engine: handle };
    let port = cfg.health_port;
    let api_shutdown = shutdown.clone();
    let api_task = tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port, api_shutdown).await {
            error!(error = %e, port, "Health endpoint failed");
        }
    });

    let scheduler_task = tokio::spawn(scheduler.run());

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    shutdown.cancel();

    for (name, task) in [
        ("scheduler", scheduler_task),
        ("telegram", bot_task),
        ("api", api_task),
    ] {
        if let Err(e) = task.await {
            error!(task = name, error = %e, "Task ended abnormally");
        }
    }
    info!("SignalBot stopped");
    Ok(())
}
