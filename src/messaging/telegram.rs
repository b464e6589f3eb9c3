use async_trait::async_trait;

use super::{Event, Sender, SenderOptions};
use crate::telegram::BotApi;

/// Sends one chat message per event.
pub struct TelegramSender {
    opts: SenderOptions,
    api: BotApi,
    chat_id: i64,
}

impl TelegramSender {
    pub fn new(opts: SenderOptions, api: BotApi, chat_id: i64) -> TelegramSender {
        TelegramSender { opts, api, chat_id }
    }
}

#[async_trait]
impl Sender for TelegramSender {
    fn name(&self) -> &str {
        &self.opts.name
    }

    async fn send(&self, events: &[Event]) -> anyhow::Result<()> {
        for event in events {
            let text = if self.opts.json {
                event.to_json()?
            } else {
                event.to_chat_text(self.opts.include_date, self.opts.timezone)
            };
            self.api.send_message(self.chat_id, &text).await?;
        }
        Ok(())
    }
}
