use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::codes::{Action, DeviceType, Source, State, Trigger};
use crate::api;

/// One access event reported by the smartlock.
///
/// Two entries are the same event if their ids match, no matter what
/// the other fields say.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub id: String,
    pub smartlock_id: i64,
    pub device_type: DeviceType,
    #[serde(default)]
    pub account_user_id: i64,
    #[serde(default)]
    pub auth_id: String,
    /// Meaning depends on [`Log::source`], for keypad codes this is a reservation reference.
    pub name: String,
    pub action: Action,
    pub trigger: Trigger,
    pub state: State,
    #[serde(default)]
    pub auto_unlock: bool,
    pub date: DateTime<Utc>,
    pub source: Source,
}

impl PartialEq for Log {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Log {}

impl Log {
    /// Whether [`Log::name`] is a reservation reference that can be resolved to a guest name.
    pub fn has_reservation_reference(&self) -> bool {
        self.trigger == Trigger::Keypad
            && self.source == Source::KeypadCode
            && self.state != State::WrongKeypadCode
    }
}

impl std::fmt::Display for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} {} ({}, {}, {})",
            self.id, self.date, self.action, self.trigger, self.state, self.source
        )?;
        if !self.name.is_empty() {
            write!(f, " name={}", self.name)?;
        }
        Ok(())
    }
}

impl TryFrom<api::Log> for Log {
    type Error = anyhow::Error;
    /// Convert logs from the API into a common format.
    fn try_from(value: api::Log) -> Result<Self, Self::Error> {
        let date = DateTime::parse_from_rfc3339(&value.date)
            .with_context(|| format!("parse log date `{}`", value.date))?
            .with_timezone(&Utc);

        Ok(Log {
            id: value.id,
            smartlock_id: value.smartlock_id,
            device_type: value.device_type.into(),
            account_user_id: value.account_user_id,
            auth_id: value.auth_id,
            name: value.name,
            action: value.action.into(),
            trigger: value.trigger.into(),
            state: value.state.into(),
            auto_unlock: value.auto_unlock,
            date,
            source: value.source.into(),
        })
    }
}
