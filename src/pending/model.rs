use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::nuki::Reservation;

/// How long a done modification is kept before being purged.
pub const GRACE_PERIOD: Duration = Duration::from_secs(72 * 60 * 60);

/// Check in/out change waiting for its reservation to show up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingModification {
    pub reservation_ref: String,
    pub check_in_time: NaiveTime,
    pub check_out_time: NaiveTime,
    pub modification_done: bool,
    /// Set once the reservation has been found and modified
    pub linked_reservation: Option<Reservation>,
    /// Chat to notify once done (or failing)
    pub from_chat_id: i64,
    pub last_update_time: DateTime<Utc>,
}

impl PendingModification {
    /// New, not yet applied modification. Seconds are dropped from both times.
    pub fn new(
        reservation_ref: impl Into<String>,
        check_in_time: NaiveTime,
        check_out_time: NaiveTime,
        from_chat_id: i64,
    ) -> PendingModification {
        PendingModification {
            reservation_ref: reservation_ref.into(),
            check_in_time: truncate_to_minute(check_in_time),
            check_out_time: truncate_to_minute(check_out_time),
            modification_done: false,
            linked_reservation: None,
            from_chat_id,
            last_update_time: Utc::now(),
        }
    }

    pub fn check_in_minutes(&self) -> i32 {
        minutes_from_midnight(self.check_in_time)
    }

    pub fn check_out_minutes(&self) -> i32 {
        minutes_from_midnight(self.check_out_time)
    }

    /// Done and untouched for longer than `grace`.
    pub fn is_expired(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        let grace = match chrono::Duration::from_std(grace) {
            Ok(grace) => grace,
            Err(_) => return false,
        };
        self.modification_done && now.signed_duration_since(self.last_update_time) > grace
    }
}

impl std::fmt::Display for PendingModification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - in {} - out {}{}",
            self.reservation_ref,
            self.check_in_time.format("%H:%M"),
            self.check_out_time.format("%H:%M"),
            if self.modification_done { " (done)" } else { "" },
        )
    }
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// `14:00` -> 840
pub fn minutes_from_midnight(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

/// Parse `H:MM` or `HH:MM` (24h clock).
pub fn parse_hour_minute(value: &str) -> anyhow::Result<NaiveTime> {
    let (_, hour, minute) = lazy_regex::regex_captures!(r"^(\d{1,2}):(\d{2})$", value.trim())
        .ok_or_else(|| anyhow!("`{}` is not formatted as HH:MM", value))?;

    let hour: u32 = hour.parse()?;
    let minute: u32 = minute.parse()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| anyhow!("`{}` is not a valid time of day", value))
}
