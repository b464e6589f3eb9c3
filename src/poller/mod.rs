//! Poll the smartlock logs and notify the senders about new entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::api::{LogQuery, LogsReader, SmartlockReader};
use crate::cache::{self, Cache, CacheError, LOGS_KEY};
use crate::messaging::{self, Event, Sender};
use crate::nuki::{self, Log};
use crate::reservations::ReservationNames;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerOptions {
    /// Time between two log fetches
    pub interval: Duration,
    /// Time between two smartlock battery checks
    pub smartlock_interval: Duration,
    /// Number of logs fetched each time
    pub limit: i32,
}

impl Default for PollerOptions {
    fn default() -> Self {
        PollerOptions {
            interval: Duration::from_secs(60),
            smartlock_interval: Duration::from_secs(2 * 60 * 60),
            limit: 20,
        }
    }
}

pub struct Poller {
    logs: Arc<dyn LogsReader>,
    smartlock: Arc<dyn SmartlockReader>,
    names: ReservationNames,
    senders: Vec<Arc<dyn Sender>>,
    cache: Arc<dyn Cache>,
    options: PollerOptions,
    /// Last fetch that produced notifications, newest first. `None` until seeded.
    cache_logs: Option<Vec<Log>>,
    /// Date of the newest log ever seen
    last_log_date: Option<DateTime<Utc>>,
}

impl Poller {
    pub fn new(
        logs: Arc<dyn LogsReader>,
        smartlock: Arc<dyn SmartlockReader>,
        names: ReservationNames,
        senders: Vec<Arc<dyn Sender>>,
        cache: Arc<dyn Cache>,
        options: PollerOptions,
    ) -> Poller {
        Poller {
            logs,
            smartlock,
            names,
            senders,
            cache,
            options,
            cache_logs: None,
            last_log_date: None,
        }
    }

    /// Logs currently known, newest first.
    pub fn cached_logs(&self) -> Option<&[Log]> {
        self.cache_logs.as_deref()
    }

    /// Load the known logs from the cache, or fetch them once without
    /// notifying anyone when the cache is empty.
    pub async fn bootstrap(&mut self) {
        match cache::load_json::<Vec<Log>>(self.cache.as_ref(), LOGS_KEY).await {
            Ok(Some(logs)) if !logs.is_empty() => {
                log::info!("loaded {} logs from {} cache", logs.len(), self.cache.name());
                self.remember(logs);
                return;
            }
            Ok(_) => log::info!("no logs in {} cache", self.cache.name()),
            Err(err) => log::warn!("couldn't load logs from {} cache: {}", self.cache.name(), err),
        }

        match self.fetch().await {
            Some(logs) if !logs.is_empty() => {
                log::info!("seeding cache with {} logs", logs.len());
                self.replace_cache(logs).await;
            }
            Some(_) => log::info!("no logs to seed the cache with"),
            None => log::warn!("couldn't seed the cache, next successful fetch will"),
        }
    }

    async fn fetch(&self) -> Option<Vec<Log>> {
        let query = LogQuery::latest(self.options.limit);
        match self.logs.logs(&query).await {
            Ok(logs) => Some(logs),
            Err(err) => {
                log::warn!("couldn't fetch logs: {:?}", err);
                None
            }
        }
    }

    /// Fetch the logs once and notify the senders about new entries.
    ///
    /// Returns the number of new entries.
    pub async fn poll_logs(&mut self) -> usize {
        let logs = match self.fetch().await {
            Some(logs) => logs,
            None => return 0,
        };

        // the API sometimes omits the most recent entries
        if let (Some(newest), Some(last_log_date)) = (logs.first(), self.last_log_date) {
            if newest.date < last_log_date {
                log::warn!(
                    "newest fetched log ({}) is older than the newest known log ({}), skipping",
                    newest.date,
                    last_log_date
                );
                return 0;
            }
        }

        let old = match &self.cache_logs {
            Some(old) => old,
            None => {
                if !logs.is_empty() {
                    log::info!("seeding cache with {} logs", logs.len());
                    self.replace_cache(logs).await;
                }
                return 0;
            }
        };

        let new_logs = nuki::diff(&logs, old);
        if new_logs.is_empty() {
            log::debug!("no new logs");
            return 0;
        }

        let count = new_logs.len();
        log::info!("{} new log(s)", count);

        let mut events = Vec::with_capacity(count);
        for entry in new_logs {
            events.push(self.names.event(entry).await);
        }
        messaging::dispatch(&self.senders, &events).await;

        self.replace_cache(logs).await;
        count
    }

    fn remember(&mut self, logs: Vec<Log>) {
        if let Some(newest) = logs.first() {
            self.last_log_date = Some(match self.last_log_date {
                Some(last) => last.max(newest.date),
                None => newest.date,
            });
        }
        self.cache_logs = Some(logs);
    }

    async fn replace_cache(&mut self, logs: Vec<Log>) {
        match cache::save_json(self.cache.as_ref(), LOGS_KEY, &logs).await {
            Ok(()) | Err(CacheError::Disabled) => {}
            Err(err) => log::warn!("couldn't save logs to {} cache: {}", self.cache.name(), err),
        }
        self.remember(logs);
    }

    /// Notify the senders if the smartlock batteries need attention.
    pub async fn check_smartlock(&self) -> bool {
        check_smartlock(self.smartlock.as_ref(), &self.senders).await
    }

    /// Poll until `shutdown` fires. Battery checks run on their own task so
    /// a slow log fetch never delays them.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.bootstrap().await;

        let health = tokio::spawn(health_loop(
            Arc::clone(&self.smartlock),
            self.senders.clone(),
            self.options.smartlock_interval,
            shutdown.clone(),
        ));

        let mut interval = tokio::time::interval(self.options.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;

        log::info!("polling logs every {:?}", self.options.interval);
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {
                    self.poll_logs().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Err(err) = health.await {
            log::warn!("smartlock check task failed: {:?}", err);
        }
        log::info!("poller stopped");
    }
}

async fn check_smartlock(reader: &dyn SmartlockReader, senders: &[Arc<dyn Sender>]) -> bool {
    let state = match reader.smartlock().await {
        Ok(state) => state,
        Err(err) => {
            log::warn!("couldn't fetch smartlock state: {:?}", err);
            return false;
        }
    };

    if !state.needs_attention() {
        log::debug!("smartlock {} is fine ({}%)", state.name, state.battery_charge);
        return false;
    }

    log::warn!("smartlock {} needs attention", state.name);
    messaging::dispatch(senders, &[Event::Smartlock(state)]).await;
    true
}

async fn health_loop(
    reader: Arc<dyn SmartlockReader>,
    senders: Vec<Arc<dyn Sender>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = interval.tick() => {
                check_smartlock(reader.as_ref(), &senders).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
