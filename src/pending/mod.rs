//! Reservation check in/out changes applied once the reservation exists.
//!
//! Modifications are registered ahead of time (usually from the telegram bot),
//! kept in a map persisted to the cache and reconciled against the live
//! reservations on a timer by [`PendingModificationRoutine`].

use thiserror::Error;

use crate::cache::CacheError;

mod model;
pub use model::{minutes_from_midnight, parse_hour_minute, PendingModification, GRACE_PERIOD};

mod routine;
pub use routine::{PendingModificationRoutine, RoutineOptions};

#[derive(Debug, Error)]
pub enum RoutineError {
    #[error("unable to fetch reservations: {0:#}")]
    FetchReservations(anyhow::Error),
    #[error("unable to modify reservation {reference}: {source:#}")]
    Modify {
        reference: String,
        source: anyhow::Error,
    },
    #[error("unable to persist pending modifications: {0}")]
    Persist(#[from] CacheError),
    #[error("pending modification routine is not running")]
    Stopped,
}
