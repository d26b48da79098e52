use std::sync::Arc;

use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use common::{EngineCommand, EngineState, Signal};
use engine::EngineHandle;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub engine: EngineHandle,
    /// The only chat whose commands are honoured.
    pub chat_id: ChatId,
}

/// Telegram bot commands exposed to the operator.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "SignalBot commands:")]
pub enum Command {
    #[command(description = "Show engine state and open signals")]
    Status,
    #[command(description = "Stop looking for new signals (open ones are still reconciled)")]
    Pause,
    #[command(description = "Resume looking for new signals")]
    Resume,
}

/// Run the command bot in long-polling mode until `shutdown` is cancelled.
pub async fn start_bot(bot: Bot, deps: BotDeps, shutdown: CancellationToken) {
    let deps = Arc::new(deps);

    info!("Telegram bot starting (long-polling)");

    let mut dispatcher = Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .build();

    let stop = dispatcher.shutdown_token();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        if let Ok(done) = stop.shutdown() {
            done.await;
        }
    });

    dispatcher.dispatch().await;
    info!("Telegram bot stopped");
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Status].endpoint(handle_status))
        .branch(case![Command::Pause].endpoint(handle_pause))
        .branch(case![Command::Resume].endpoint(handle_resume));

    Update::filter_message()
        .filter(chat_filter)
        .branch(command_handler)
}

/// Drop messages from any chat other than the configured one.
fn chat_filter(msg: Message, deps: Arc<BotDeps>) -> bool {
    let allowed = msg.chat.id == deps.chat_id;
    if !allowed {
        warn!(chat_id = msg.chat.id.0, "Ignoring command from unknown chat");
    }
    allowed
}

async fn handle_status(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = deps.engine.state().await;
    let open = deps.engine.open_signals().await;
    let text = status_text(state, &open, deps.engine.symbols());
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_pause(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let reply = match deps.engine.state().await {
        EngineState::Running => {
            deps.engine.send(EngineCommand::Pause).await;
            "Scanning paused. Open signals will still be reconciled."
        }
        EngineState::Paused => "Engine is already paused.",
        EngineState::Stopped => "Engine is stopped.",
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_resume(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let reply = match deps.engine.state().await {
        EngineState::Paused => {
            deps.engine.send(EngineCommand::Resume).await;
            "Scanning resumed."
        }
        EngineState::Running => "Engine is already running.",
        EngineState::Stopped => "Engine is stopped.",
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

fn status_text(state: EngineState, open: &[Signal], symbols: &[String]) -> String {
    let mut text = format!(
        "SignalBot Status\n\
         Engine: {state}\n\
         Symbols: {}\n\
         Open signals: {}",
        symbols.join(", "),
        open.len()
    );
    for signal in open {
        text.push_str(&format!(
            "\n• {} {} @ {:.5} since {}",
            signal.symbol,
            signal.bias,
            signal.reference_close,
            signal.opened_at.format("%H:%M:%S UTC")
        ));
    }
    text
}
