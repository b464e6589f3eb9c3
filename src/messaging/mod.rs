//! Delivery of events to the configured senders.

use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;

mod console;
pub use console::ConsoleSender;

mod event;
pub use event::Event;

mod telegram;
pub use telegram::TelegramSender;

/// Settings shared by every sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderOptions {
    pub name: String,
    /// Prefix messages with the date of the log entry
    pub include_date: bool,
    /// Timezone of the displayed dates
    pub timezone: Tz,
    /// Send raw json instead of formatted text
    pub json: bool,
}

impl Default for SenderOptions {
    fn default() -> Self {
        SenderOptions {
            name: String::new(),
            include_date: false,
            timezone: Tz::UTC,
            json: false,
        }
    }
}

/// Timezone from its IANA name (`Europe/Paris`), UTC when missing or unknown.
pub fn parse_timezone(name: Option<&str>) -> Tz {
    match name {
        None | Some("") => Tz::UTC,
        Some(name) => name.parse().unwrap_or_else(|err| {
            log::warn!("unknown timezone {}, using UTC: {}", name, err);
            Tz::UTC
        }),
    }
}

#[async_trait]
pub trait Sender: Send + Sync {
    fn name(&self) -> &str;
    /// Deliver all events, in order.
    async fn send(&self, events: &[Event]) -> anyhow::Result<()>;
}

/// Send `events` to every sender.
///
/// A failing sender is logged and doesn't keep the others from receiving
/// the events. Returns the number of senders that failed.
pub async fn dispatch(senders: &[Arc<dyn Sender>], events: &[Event]) -> usize {
    if events.is_empty() {
        return 0;
    }

    let results =
        futures::future::join_all(senders.iter().map(|sender| sender.send(events))).await;

    let mut failed = 0;
    for (sender, result) in senders.iter().zip(results) {
        if let Err(err) = result {
            failed += 1;
            log::error!("unable to send message with sender {}: {:?}", sender.name(), err);
        }
    }
    failed
}
