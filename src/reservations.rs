//! Resolve reservation references to guest names.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::time::Instant;

use crate::api::ReservationsReader;
use crate::messaging::Event;
use crate::nuki::Log;

/// How long resolved names are trusted before asking the API again.
pub const NAME_CACHE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Best effort `reference -> guest name` lookup.
///
/// All names are refreshed at once when the ttl expired or when a
/// reference is unknown.
pub struct ReservationNames {
    reader: Arc<dyn ReservationsReader>,
    ttl: Duration,
    names: HashMap<String, String>,
    last_update: Option<Instant>,
}

impl ReservationNames {
    pub fn new(reader: Arc<dyn ReservationsReader>) -> ReservationNames {
        Self::with_ttl(reader, NAME_CACHE_TTL)
    }

    pub fn with_ttl(reader: Arc<dyn ReservationsReader>, ttl: Duration) -> ReservationNames {
        ReservationNames {
            reader,
            ttl,
            names: HashMap::new(),
            last_update: None,
        }
    }

    fn is_fresh(&self) -> bool {
        self.last_update
            .map_or(false, |last_update| last_update.elapsed() < self.ttl)
    }

    /// Guest name of the reservation with the given reference.
    ///
    /// An empty reference resolves to an empty name without asking the API.
    pub async fn name(&mut self, reference: &str) -> anyhow::Result<String> {
        if reference.is_empty() {
            return Ok(String::new());
        }

        if self.is_fresh() {
            if let Some(name) = self.names.get(reference) {
                return Ok(name.clone());
            }
        }

        self.refresh().await?;

        self.names
            .get(reference)
            .cloned()
            .ok_or_else(|| anyhow!("unable to find reservation reference `{}`", reference))
    }

    /// Event for `log`, with the guest name when the entry carries a
    /// reservation reference. Falls back to the raw reference.
    pub async fn event(&mut self, log: Log) -> Event {
        if !log.has_reservation_reference() {
            return Event::log(log);
        }

        match self.name(&log.name).await {
            Ok(reservation_name) => Event::Log {
                log,
                reservation_name,
            },
            Err(err) => {
                log::warn!("couldn't resolve reservation name of {}: {:#}", log.name, err);
                Event::log(log)
            }
        }
    }

    async fn refresh(&mut self) -> anyhow::Result<()> {
        let reservations = self.reader.reservations().await?;
        log::debug!("refreshed {} reservation names", reservations.len());

        for resa in reservations {
            self.names.insert(resa.reference, resa.name);
        }
        self.last_update = Some(Instant::now());
        Ok(())
    }
}
