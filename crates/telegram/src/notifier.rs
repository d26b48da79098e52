use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::debug;

use common::{Error, Notifier, Result};

/// Delivers engine messages to the configured Telegram chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: i64) -> Self {
        Self {
            bot: Bot::new(token),
            chat_id: ChatId(chat_id),
        }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        self.bot
            .send_message(self.chat_id, text)
            .await
            .map_err(|e| Error::Notify(e.to_string()))?;
        debug!(chat_id = self.chat_id.0, "Telegram message delivered");
        Ok(())
    }
}
