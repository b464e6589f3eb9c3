//! Seams between the polling/reconciliation logic and the web API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::nuki;

/// Maximum number of log entries the API returns per request.
pub const MAX_LOG_LIMIT: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub limit: i32,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl LogQuery {
    pub fn latest(limit: i32) -> LogQuery {
        LogQuery {
            limit,
            from: None,
            to: None,
        }
    }

    /// `limit` forced into `1..=50`.
    pub fn clamped_limit(&self) -> i32 {
        self.limit.clamp(1, MAX_LOG_LIMIT)
    }
}

impl Default for LogQuery {
    fn default() -> Self {
        LogQuery::latest(20)
    }
}

#[async_trait]
pub trait LogsReader: Send + Sync {
    /// Fetch logs, **newest log at index 0**.
    async fn logs(&self, query: &LogQuery) -> anyhow::Result<Vec<nuki::Log>>;
}

#[async_trait]
pub trait SmartlockReader: Send + Sync {
    async fn smartlock(&self) -> anyhow::Result<nuki::SmartlockState>;
}

#[async_trait]
pub trait SmartlockAuthReader: Send + Sync {
    async fn smartlock_auths(&self) -> anyhow::Result<Vec<nuki::SmartlockAuth>>;
}

#[async_trait]
pub trait ReservationsReader: Send + Sync {
    async fn reservations(&self) -> anyhow::Result<Vec<nuki::Reservation>>;
}

#[async_trait]
pub trait ReservationTimeModifier: Send + Sync {
    /// Change check in/out of a reservation, both given in minutes from midnight.
    async fn modify_access_times(
        &self,
        reservation_id: &str,
        check_in: i32,
        check_out: i32,
    ) -> anyhow::Result<()>;
}
