use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::api;

/// A booking registered on an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    /// Correlates with [`Log::name`](super::Log::name) for keypad code entries.
    pub reference: String,
    /// Guest name
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl Reservation {
    /// `REF - name (start -> end)` with dates shown in `tz`.
    pub fn to_text(&self, tz: Tz) -> String {
        format!(
            "{} - {} ({} -> {})",
            self.reference,
            self.name,
            self.start_date.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
            self.end_date.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
        )
    }
}

impl std::fmt::Display for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text(Tz::UTC))
    }
}

impl TryFrom<api::Reservation> for Reservation {
    type Error = anyhow::Error;
    fn try_from(value: api::Reservation) -> Result<Self, Self::Error> {
        let start_date = DateTime::parse_from_rfc3339(&value.start_date)
            .context("parse reservation start date")?
            .with_timezone(&Utc);
        let end_date = DateTime::parse_from_rfc3339(&value.end_date)
            .context("parse reservation end date")?
            .with_timezone(&Utc);

        Ok(Reservation {
            id: value.id,
            reference: value.reference,
            name: value.name,
            start_date,
            end_date,
        })
    }
}
