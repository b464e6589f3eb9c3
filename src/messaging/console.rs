use async_trait::async_trait;

use super::{Event, Sender, SenderOptions};

/// Writes events to the terminal.
///
/// Formatted events go through the logger, json is printed to stdout
/// so it can be piped.
pub struct ConsoleSender {
    opts: SenderOptions,
}

impl ConsoleSender {
    pub fn new(opts: SenderOptions) -> ConsoleSender {
        ConsoleSender { opts }
    }

    fn render(&self, event: &Event) -> anyhow::Result<String> {
        if self.opts.json {
            Ok(event.to_json()?)
        } else {
            Ok(event.to_text(self.opts.include_date, false, self.opts.timezone))
        }
    }
}

#[async_trait]
impl Sender for ConsoleSender {
    fn name(&self) -> &str {
        &self.opts.name
    }

    async fn send(&self, events: &[Event]) -> anyhow::Result<()> {
        for event in events {
            let line = self.render(event)?;
            if self.opts.json {
                println!("{}", line);
            } else {
                log::info!("{}", line);
            }
        }
        Ok(())
    }
}
