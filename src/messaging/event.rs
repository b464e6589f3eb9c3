use std::collections::BTreeMap;

use chrono_tz::Tz;

use crate::nuki::{Action, Log, SmartlockState, Source, Trigger};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DOOR_EMOJI: &str = "\u{1f6aa}";
const BATTERY_EMOJI: &str = "\u{1faab}";

/// Something worth telling the senders about.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A new log entry, `reservation_name` is the resolved guest name for keypad
    /// codes and [`Log::name`] otherwise.
    Log {
        log: Log,
        reservation_name: String,
    },
    /// The smartlock needs attention.
    Smartlock(SmartlockState),
}

impl Event {
    /// Event for a log entry without a resolved name.
    pub fn log(log: Log) -> Event {
        let reservation_name = log.name.clone();
        Event::Log {
            log,
            reservation_name,
        }
    }

    pub fn as_log(&self) -> Option<&Log> {
        match self {
            Event::Log { log, .. } => Some(log),
            Event::Smartlock(_) => None,
        }
    }

    /// Raw json of the underlying log entry or smartlock state.
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Event::Log { log, .. } => serde_json::to_string(log),
            Event::Smartlock(state) => serde_json::to_string(state),
        }
    }

    /// Key/value description of the event, sorted by key. Dates are shown in `tz`.
    pub fn values(&self, include_date: bool, emoji: bool, tz: Tz) -> BTreeMap<&'static str, String> {
        let mut values = BTreeMap::new();
        match self {
            Event::Log {
                log,
                reservation_name,
            } => {
                values.insert("action", log.action.to_string());
                values.insert("source", log.source.to_string());
                if emoji {
                    values.insert("trigger", log.trigger.emoji().to_string());
                    values.insert("state", log.state.emoji().to_string());
                } else {
                    values.insert("trigger", log.trigger.to_string());
                    values.insert("state", log.state.to_string());
                }

                if log.source == Source::KeypadCode {
                    values.insert("reference", log.name.clone());
                    values.insert("name", reservation_name.clone());
                }

                if include_date {
                    let date = log.date.with_timezone(&tz).format(DATE_FORMAT);
                    values.insert("date", date.to_string());
                }
            }
            Event::Smartlock(state) => {
                values.insert("smartlock", state.name.clone());
                values.insert("battery_charge", state.battery_charge.to_string());
                values.insert("battery_critical", state.battery_critical.to_string());
                values.insert(
                    "keypad_battery_critical",
                    state.keypad_battery_critical.to_string(),
                );
                values.insert(
                    "doorsensor_battery_critical",
                    state.doorsensor_battery_critical.to_string(),
                );
            }
        }
        values
    }

    /// `key=value, key=value` text.
    pub fn to_text(&self, include_date: bool, emoji: bool, tz: Tz) -> String {
        self.values(include_date, emoji, tz)
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Short human friendly text used for chat messages.
    pub fn to_chat_text(&self, include_date: bool, tz: Tz) -> String {
        let log = match self {
            Event::Log { log, .. } => log,
            Event::Smartlock(state) => return smartlock_chat_text(state),
        };

        let date = if include_date {
            format!(
                "{} - ",
                log.date.with_timezone(&tz).format(DATE_FORMAT)
            )
        } else {
            String::new()
        };
        let trigger = log.trigger.emoji();
        let state = log.state.emoji();

        match (log.trigger, log.source, log.action) {
            (Trigger::Button, _, action) => format!("{}{} {} {}", date, trigger, action, state),
            (Trigger::Keypad, Source::KeypadCode, action) => {
                let name = match self {
                    Event::Log {
                        reservation_name, ..
                    } if !reservation_name.is_empty() => reservation_name.as_str(),
                    _ => log.name.as_str(),
                };
                format!("{}{} {} by '{}' {}", date, trigger, action, name, state)
            }
            (Trigger::Keypad, Source::Default, action) => {
                format!("{}{} {} {}", date, trigger, action, state)
            }
            (Trigger::System, _, action @ (Action::DoorOpened | Action::DoorClosed)) => {
                format!("{}{} {} {}", date, DOOR_EMOJI, action, state)
            }
            _ => self.to_text(include_date, true, tz),
        }
    }
}

fn smartlock_chat_text(state: &SmartlockState) -> String {
    let mut problems = Vec::new();
    if state.battery_critical {
        problems.push("battery critical");
    }
    if state.keypad_battery_critical {
        problems.push("keypad battery critical");
    }
    if state.doorsensor_battery_critical {
        problems.push("door sensor battery critical");
    }

    let mut text = format!(
        "{} {}: battery at {}%",
        BATTERY_EMOJI, state.name, state.battery_charge
    );
    if !problems.is_empty() {
        text.push_str(&format!(" ({})", problems.join(", ")));
    }
    text
}

#[cfg(test)]
mod tests {
    use chrono_tz::Tz;

    use super::Event;
    use crate::nuki::log_entry::test_util::{keypad_log, log};
    use crate::nuki::{Action, SmartlockState, Trigger};

    #[test]
    fn keypad_values_include_reference_and_name() {
        let event = Event::Log {
            log: keypad_log("1", 0, "REF1"),
            reservation_name: "Jane".to_string(),
        };
        assert_eq!(
            event.to_text(false, false, Tz::UTC),
            "action=unlock, name=Jane, reference=REF1, source=Keypad code, state=Success, trigger=keypad"
        );
        assert!(event.values(true, false, Tz::UTC).contains_key("date"));
    }

    #[test]
    fn chat_text() {
        let event = Event::Log {
            log: keypad_log("1", 0, "REF1"),
            reservation_name: "Jane".to_string(),
        };
        assert_eq!(event.to_chat_text(false, Tz::UTC), "\u{1f522} unlock by 'Jane' \u{1f7e2}");

        let button = Event::log(log("2", 0));
        assert_eq!(button.to_chat_text(false, Tz::UTC), "\u{1f518} unlock \u{1f7e2}");

        let mut door = log("3", 0);
        door.trigger = Trigger::System;
        door.action = Action::DoorOpened;
        assert!(Event::log(door).to_chat_text(false, Tz::UTC).starts_with("\u{1f6aa} door opened"));
    }

    #[test]
    fn unresolved_keypad_name_falls_back_to_reference() {
        let event = Event::Log {
            log: keypad_log("1", 0, "REF1"),
            reservation_name: String::new(),
        };
        assert!(event.to_chat_text(false, Tz::UTC).contains("'REF1'"));
    }

    #[test]
    fn smartlock_event() {
        let event = Event::Smartlock(SmartlockState {
            smartlock_id: 1,
            name: "Front".to_string(),
            battery_critical: true,
            battery_charge: 12,
            keypad_battery_critical: false,
            doorsensor_battery_critical: false,
        });
        assert_eq!(
            event.to_chat_text(false, Tz::UTC),
            "\u{1faab} Front: battery at 12% (battery critical)"
        );
        assert!(event.to_json().unwrap().contains(r#""battery_charge":12"#));
        assert!(event.as_log().is_none());
    }

    #[test]
    fn dates_use_the_sender_timezone() {
        // 2024-01-01 12:30 UTC
        let event = Event::log(log("1", 30));

        assert_eq!(event.values(true, false, Tz::UTC)["date"], "2024-01-01 12:30:00");
        assert_eq!(
            event.values(true, false, Tz::Europe__Paris)["date"],
            "2024-01-01 13:30:00"
        );
        assert_eq!(
            event.to_chat_text(true, Tz::America__New_York),
            "2024-01-01 07:30:00 - \u{1f518} unlock \u{1f7e2}"
        );
        assert!(!event.values(false, false, Tz::UTC).contains_key("date"));
    }
}
