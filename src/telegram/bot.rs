use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveTime;
use chrono_tz::Tz;
use thiserror::Error;
use tokio::sync::watch;

use super::BotApi;
use crate::api::{
    LogQuery, LogsReader, ReservationsReader, SmartlockAuthReader, SmartlockReader, MAX_LOG_LIMIT,
};
use crate::messaging::Event;
use crate::pending::{parse_hour_minute, PendingModification, PendingModificationRoutine};
use crate::reservations::ReservationNames;

const HELP: &str = "\
/logs [N] - last N logs (default 10)
/battery - smartlock battery state
/resa - reservations
/code - keypad codes
/modify REF [HH:MM HH:MM] - change check in/out once reservation REF exists
/listmodify - pending modifications
/deletemodify REF - delete a pending modification
/applymodify - apply pending modifications now
/version - running version
/help - this message";

const DEFAULT_LOGS: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Logs(i32),
    Battery,
    Reservations,
    Codes,
    Modify {
        reference: String,
        check_in: Option<NaiveTime>,
        check_out: Option<NaiveTime>,
    },
    ListModify,
    DeleteModify(String),
    ApplyModify,
    Version,
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("not a command")]
    NotACommand,
    #[error("unknown command {0}, try /help")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    /// Parse a message like `/modify ABC 15:00 10:00`. A `@botname` suffix is ignored.
    pub fn parse(text: &str) -> Result<Command, ParseError> {
        let mut words = text.split_whitespace();
        let command = match words.next() {
            Some(word) if word.starts_with('/') => word,
            _ => return Err(ParseError::NotACommand),
        };
        let command = command.split('@').next().unwrap_or(command);
        let args: Vec<&str> = words.collect();

        match (command, args.as_slice()) {
            ("/logs", []) => Ok(Command::Logs(DEFAULT_LOGS)),
            ("/logs", [n]) => match n.parse::<i32>() {
                Ok(n) if (1..=MAX_LOG_LIMIT).contains(&n) => Ok(Command::Logs(n)),
                _ => Err(ParseError::Usage("/logs [1-50]")),
            },
            ("/battery", []) => Ok(Command::Battery),
            ("/resa", []) => Ok(Command::Reservations),
            ("/code", []) => Ok(Command::Codes),
            ("/modify", [reference]) => Ok(Command::Modify {
                reference: reference.to_string(),
                check_in: None,
                check_out: None,
            }),
            ("/modify", [reference, check_in, check_out]) => {
                match (parse_hour_minute(check_in), parse_hour_minute(check_out)) {
                    (Ok(check_in), Ok(check_out)) => Ok(Command::Modify {
                        reference: reference.to_string(),
                        check_in: Some(check_in),
                        check_out: Some(check_out),
                    }),
                    _ => Err(ParseError::Usage("/modify REF [HH:MM HH:MM]")),
                }
            }
            ("/modify", _) => Err(ParseError::Usage("/modify REF [HH:MM HH:MM]")),
            ("/listmodify", []) => Ok(Command::ListModify),
            ("/deletemodify", [reference]) => Ok(Command::DeleteModify(reference.to_string())),
            ("/deletemodify", _) => Err(ParseError::Usage("/deletemodify REF")),
            ("/applymodify", []) => Ok(Command::ApplyModify),
            ("/version", []) => Ok(Command::Version),
            ("/help", _) | ("/start", _) => Ok(Command::Help),
            (command, _) => Err(ParseError::Unknown(command.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotOptions {
    /// Only answer these chats, everyone when empty
    pub restrict_to_chat_ids: Vec<i64>,
    pub default_check_in: NaiveTime,
    pub default_check_out: NaiveTime,
    /// Timezone of the displayed dates
    pub timezone: Tz,
    /// Long polling timeout of `getUpdates`
    pub poll_timeout: Duration,
}

/// Readers the bot answers from.
pub struct BotReaders {
    pub logs: Arc<dyn LogsReader>,
    pub smartlock: Arc<dyn SmartlockReader>,
    pub auths: Arc<dyn SmartlockAuthReader>,
    pub reservations: Arc<dyn ReservationsReader>,
}

pub struct Bot {
    api: BotApi,
    options: BotOptions,
    readers: BotReaders,
    names: ReservationNames,
    pending: PendingModificationRoutine,
}

impl Bot {
    pub fn new(
        api: BotApi,
        options: BotOptions,
        readers: BotReaders,
        pending: PendingModificationRoutine,
    ) -> Bot {
        let names = ReservationNames::new(Arc::clone(&readers.reservations));
        Bot {
            api,
            options,
            readers,
            names,
            pending,
        }
    }

    pub fn is_allowed(&self, chat_id: i64) -> bool {
        self.options.restrict_to_chat_ids.is_empty()
            || self.options.restrict_to_chat_ids.contains(&chat_id)
    }

    /// Reply to a message, `None` if the message isn't meant for the bot.
    pub async fn reply(&mut self, chat_id: i64, text: &str) -> Option<String> {
        let command = match Command::parse(text) {
            Ok(command) => command,
            Err(ParseError::NotACommand) => return None,
            Err(err) => return Some(err.to_string()),
        };

        log::info!("chat {}: {:?}", chat_id, command);
        match self.execute(chat_id, command).await {
            Ok(reply) => Some(reply),
            Err(err) => {
                log::warn!("chat {}: command failed: {:?}", chat_id, err);
                Some(format!("error: {:#}", err))
            }
        }
    }

    async fn execute(&mut self, chat_id: i64, command: Command) -> anyhow::Result<String> {
        match command {
            Command::Logs(limit) => {
                let logs = self
                    .readers
                    .logs
                    .logs(&LogQuery::latest(limit))
                    .await
                    .context("fetch logs")?;
                if logs.is_empty() {
                    return Ok("no logs".to_string());
                }

                let mut lines = Vec::with_capacity(logs.len());
                for log in logs {
                    let event = self.names.event(log).await;
                    lines.push(event.to_chat_text(true, self.options.timezone));
                }
                Ok(lines.join("\n"))
            }
            Command::Battery => {
                let state = self
                    .readers
                    .smartlock
                    .smartlock()
                    .await
                    .context("fetch smartlock")?;
                Ok(Event::Smartlock(state).to_chat_text(false, self.options.timezone))
            }
            Command::Reservations => {
                let reservations = self
                    .readers
                    .reservations
                    .reservations()
                    .await
                    .context("fetch reservations")?;
                let tz = self.options.timezone;
                Ok(list_or(
                    reservations.iter().map(|resa| resa.to_text(tz)),
                    "no reservation",
                ))
            }
            Command::Codes => {
                let auths = self
                    .readers
                    .auths
                    .smartlock_auths()
                    .await
                    .context("fetch smartlock auths")?;
                let codes = auths.iter().filter_map(|auth| {
                    auth.code.map(|code| {
                        let disabled = if auth.enabled { "" } else { " (disabled)" };
                        format!("{}: {}{}", auth.name, code, disabled)
                    })
                });
                Ok(list_or(codes, "no keypad code"))
            }
            Command::Modify {
                reference,
                check_in,
                check_out,
            } => {
                let modification = PendingModification::new(
                    reference,
                    check_in.unwrap_or(self.options.default_check_in),
                    check_out.unwrap_or(self.options.default_check_out),
                    chat_id,
                );
                let reply = format!("pending modification registered: {}", modification);
                self.pending.add(modification).await?;
                Ok(reply)
            }
            Command::ListModify => Ok(list_or(
                self.pending.list().await.iter(),
                "no pending modification",
            )),
            Command::DeleteModify(reference) => {
                if self.pending.delete(&reference).await {
                    Ok(format!("{} deleted", reference))
                } else {
                    Ok(format!("no pending modification for {}", reference))
                }
            }
            Command::ApplyModify => {
                self.pending.apply_now().await?;
                Ok(list_or(
                    self.pending.list().await.iter(),
                    "no pending modification",
                ))
            }
            Command::Version => Ok(version()),
            Command::Help => Ok(HELP.to_string()),
        }
    }

    /// Answer messages until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        log::info!("telegram bot started");
        let mut offset = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let updates = tokio::select! {
                updates = self.api.get_updates(offset, self.options.poll_timeout) => updates,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(err) => {
                    log::warn!("couldn't fetch telegram updates: {:?}", err);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let (chat_id, text) = match update.message {
                    Some(message) => (message.chat.id, message.text.unwrap_or_default()),
                    None => continue,
                };

                if !self.is_allowed(chat_id) {
                    log::warn!("ignoring message from chat {}", chat_id);
                    continue;
                }

                if let Some(reply) = self.reply(chat_id, &text).await {
                    if let Err(err) = self.api.send_message(chat_id, &reply).await {
                        log::warn!("couldn't reply to chat {}: {:?}", chat_id, err);
                    }
                }
            }
        }

        log::info!("telegram bot stopped");
    }
}

fn version() -> String {
    format!("{}, version {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn list_or<T: ToString>(items: impl Iterator<Item = T>, empty: &str) -> String {
    let lines: Vec<String> = items.map(|item| item.to_string()).collect();
    if lines.is_empty() {
        empty.to_string()
    } else {
        lines.join("\n")
    }
}

/// Tell the chat that registered a modification how it went.
pub fn notify_pending_results(pending: &PendingModificationRoutine, api: BotApi) {
    let done_api = api.clone();
    pending.on_modification_done(move |modification| {
        let api = done_api.clone();
        let chat_id = modification.from_chat_id;
        let text = format!("\u{2705} reservation modified: {}", modification);
        tokio::spawn(async move {
            if let Err(err) = api.send_message(chat_id, &text).await {
                log::warn!("couldn't notify chat {}: {:?}", chat_id, err);
            }
        });
    });

    pending.on_error(move |modification, err| {
        // errors without a modification are only logged
        let modification = match modification {
            Some(modification) => modification,
            None => return,
        };
        let api = api.clone();
        let chat_id = modification.from_chat_id;
        let text = format!("\u{274c} {}", err);
        tokio::spawn(async move {
            if let Err(err) = api.send_message(chat_id, &text).await {
                log::warn!("couldn't notify chat {}: {:?}", chat_id, err);
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::{Command, ParseError};

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse("/logs"), Ok(Command::Logs(10)));
        assert_eq!(Command::parse("/logs@nuki_bot 5"), Ok(Command::Logs(5)));
        assert_eq!(Command::parse("/battery"), Ok(Command::Battery));
        assert_eq!(Command::parse("/listmodify"), Ok(Command::ListModify));
        assert_eq!(Command::parse("/version"), Ok(Command::Version));
        assert_eq!(
            Command::parse("/deletemodify ABC"),
            Ok(Command::DeleteModify("ABC".to_string()))
        );
        assert_eq!(
            Command::parse("/modify ABC 14:00 11:00"),
            Ok(Command::Modify {
                reference: "ABC".to_string(),
                check_in: NaiveTime::from_hms_opt(14, 0, 0),
                check_out: NaiveTime::from_hms_opt(11, 0, 0),
            })
        );
        assert_eq!(
            Command::parse("/modify ABC"),
            Ok(Command::Modify {
                reference: "ABC".to_string(),
                check_in: None,
                check_out: None,
            })
        );
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Command::parse("hello"), Err(ParseError::NotACommand));
        assert_eq!(Command::parse(""), Err(ParseError::NotACommand));
        assert!(matches!(Command::parse("/nope"), Err(ParseError::Unknown(_))));
        assert!(matches!(Command::parse("/logs 0"), Err(ParseError::Usage(_))));
        assert!(matches!(Command::parse("/logs 51"), Err(ParseError::Usage(_))));
        assert!(matches!(Command::parse("/modify ABC 25:00 11:00"), Err(ParseError::Usage(_))));
        assert!(matches!(Command::parse("/modify ABC 14:00"), Err(ParseError::Usage(_))));
        assert!(matches!(Command::parse("/deletemodify"), Err(ParseError::Usage(_))));
    }
}
