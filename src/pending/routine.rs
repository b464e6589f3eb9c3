use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{PendingModification, RoutineError, GRACE_PERIOD};
use crate::api::{ReservationTimeModifier, ReservationsReader};
use crate::cache::{self, Cache, CacheError, PENDING_MODIFICATIONS_KEY};

type ErrorListener = Box<dyn Fn(Option<&PendingModification>, &RoutineError) + Send + Sync>;
type DoneListener = Box<dyn Fn(&PendingModification) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutineOptions {
    /// Time between two reconciliation passes
    pub check_interval: Duration,
    /// Time between two sweeps of expired modifications
    pub purge_interval: Duration,
    /// How long done modifications are kept
    pub grace_period: Duration,
}

impl Default for RoutineOptions {
    fn default() -> Self {
        RoutineOptions {
            check_interval: Duration::from_secs(10),
            purge_interval: Duration::from_secs(2 * 60 * 60),
            grace_period: GRACE_PERIOD,
        }
    }
}

enum Message {
    Add(PendingModification, oneshot::Sender<()>),
    ApplyNow(oneshot::Sender<()>),
}

struct Shared {
    reader: Arc<dyn ReservationsReader>,
    modifier: Arc<dyn ReservationTimeModifier>,
    cache: Arc<dyn Cache>,
    options: RoutineOptions,
    /// Held for every read-modify-write, including the save to the cache
    pending: Mutex<HashMap<String, PendingModification>>,
    error_listeners: parking_lot::Mutex<Vec<ErrorListener>>,
    done_listeners: parking_lot::Mutex<Vec<DoneListener>>,
}

/// Handle to the background task reconciling pending modifications.
///
/// Cloning the handle is cheap, every clone talks to the same task. The task
/// stops when the shutdown signal fires or when every handle is dropped.
#[derive(Clone)]
pub struct PendingModificationRoutine {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<Message>,
}

impl PendingModificationRoutine {
    /// Load the persisted modifications and spawn the routine.
    pub async fn start(
        reader: Arc<dyn ReservationsReader>,
        modifier: Arc<dyn ReservationTimeModifier>,
        cache: Arc<dyn Cache>,
        options: RoutineOptions,
        shutdown: watch::Receiver<bool>,
    ) -> (PendingModificationRoutine, JoinHandle<()>) {
        let pending = load(cache.as_ref()).await;
        log::info!(
            "loaded {} pending modification(s) from {} cache",
            pending.len(),
            cache.name()
        );

        let shared = Arc::new(Shared {
            reader,
            modifier,
            cache,
            options,
            pending: Mutex::new(pending),
            error_listeners: parking_lot::Mutex::new(Vec::new()),
            done_listeners: parking_lot::Mutex::new(Vec::new()),
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Arc::clone(&shared).run(rx, shutdown));

        (PendingModificationRoutine { shared, tx }, handle)
    }

    /// Register a modification, replacing any modification with the same reference.
    ///
    /// Returns once the routine stored it. Only fails when the routine is stopped,
    /// a failing cache is reported to the error listeners.
    pub async fn add(&self, mut modification: PendingModification) -> Result<(), RoutineError> {
        modification.last_update_time = Utc::now();

        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Message::Add(modification, ack_tx))
            .map_err(|_| RoutineError::Stopped)?;
        ack_rx.await.map_err(|_| RoutineError::Stopped)
    }

    /// Remove the modification registered for `reference`, returns whether there was one.
    pub async fn delete(&self, reference: &str) -> bool {
        let mut pending = self.shared.pending.lock().await;
        if pending.remove(reference).is_none() {
            return false;
        }
        log::info!("pending modification {} deleted", reference);
        self.shared.persist(&pending).await;
        true
    }

    /// Snapshot of all modifications, ordered by reference.
    pub async fn list(&self) -> Vec<PendingModification> {
        let pending = self.shared.pending.lock().await;
        let mut list: Vec<_> = pending.values().cloned().collect();
        list.sort_by(|a, b| a.reservation_ref.cmp(&b.reservation_ref));
        list
    }

    /// Run a reconciliation pass now and wait for it to finish.
    pub async fn apply_now(&self) -> Result<(), RoutineError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Message::ApplyNow(done_tx))
            .map_err(|_| RoutineError::Stopped)?;
        done_rx.await.map_err(|_| RoutineError::Stopped)
    }

    /// Called when a reconciliation fails. The modification is `None` when
    /// the reservations couldn't be fetched at all.
    pub fn on_error<F>(&self, listener: F)
    where
        F: Fn(Option<&PendingModification>, &RoutineError) + Send + Sync + 'static,
    {
        self.shared.error_listeners.lock().push(Box::new(listener));
    }

    /// Called when a modification has been applied.
    pub fn on_modification_done<F>(&self, listener: F)
    where
        F: Fn(&PendingModification) + Send + Sync + 'static,
    {
        self.shared.done_listeners.lock().push(Box::new(listener));
    }
}

async fn load(cache: &dyn Cache) -> HashMap<String, PendingModification> {
    match cache::load_json(cache, PENDING_MODIFICATIONS_KEY).await {
        Ok(Some(pending)) => pending,
        Ok(None) => HashMap::new(),
        Err(err) => {
            log::warn!("unable to load pending modifications, starting empty: {}", err);
            HashMap::new()
        }
    }
}

impl Shared {
    async fn run(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<Message>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut check = tokio::time::interval(self.options.check_interval);
        check.set_missed_tick_behavior(MissedTickBehavior::Skip);
        check.tick().await;

        let mut purge = tokio::time::interval(self.options.purge_interval);
        purge.set_missed_tick_behavior(MissedTickBehavior::Skip);
        purge.tick().await;

        log::info!(
            "pending modification routine started (check every {:?}, purge every {:?})",
            self.options.check_interval,
            self.options.purge_interval
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = check.tick() => self.reconcile().await,
                _ = purge.tick() => self.purge().await,
                msg = rx.recv() => match msg {
                    Some(Message::Add(modification, ack)) => {
                        self.insert(modification).await;
                        let _ = ack.send(());
                    }
                    Some(Message::ApplyNow(done)) => {
                        log::info!("reconciliation requested");
                        self.reconcile().await;
                        let _ = done.send(());
                    }
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        log::info!("pending modification routine stopped");
    }

    async fn insert(&self, modification: PendingModification) {
        let mut pending = self.pending.lock().await;
        log::info!("pending modification added: {}", modification);
        pending.insert(modification.reservation_ref.clone(), modification);
        self.persist(&pending).await;
    }

    /// Apply every modification whose reservation is now visible.
    async fn reconcile(&self) {
        let reservations = match self.reader.reservations().await {
            Ok(reservations) => reservations,
            Err(err) => {
                self.notify_error(None, &RoutineError::FetchReservations(err));
                return;
            }
        };

        let mut pending = self.pending.lock().await;
        let mut changed = false;

        for resa in &reservations {
            let modification = match pending.get_mut(&resa.reference) {
                Some(modification) if !modification.modification_done => modification,
                _ => continue,
            };

            let check_in = modification.check_in_minutes();
            let check_out = modification.check_out_minutes();
            log::info!(
                "modifying reservation {} ({}): check in {}, check out {}",
                resa.reference,
                resa.id,
                check_in,
                check_out
            );

            match self
                .modifier
                .modify_access_times(&resa.id, check_in, check_out)
                .await
            {
                Ok(()) => {
                    modification.modification_done = true;
                    modification.last_update_time = Utc::now();
                    modification.linked_reservation = Some(resa.clone());
                    changed = true;
                    self.notify_done(modification);
                }
                Err(source) => {
                    let err = RoutineError::Modify {
                        reference: resa.reference.clone(),
                        source,
                    };
                    self.notify_error(Some(modification), &err);
                }
            }
        }

        if changed {
            self.persist(&pending).await;
        }
    }

    /// Drop done modifications older than the grace period.
    async fn purge(&self) {
        let now = Utc::now();
        let mut pending = self.pending.lock().await;

        let before = pending.len();
        pending.retain(|_, modification| !modification.is_expired(now, self.options.grace_period));
        let purged = before - pending.len();
        if purged == 0 {
            return;
        }

        log::info!("purged {} expired pending modification(s)", purged);
        self.persist(&pending).await;
    }

    /// Save the whole map.
    ///
    /// The in-memory map stays the reference when the save fails, the routine
    /// keeps running without durability and error listeners are told about it.
    async fn persist(&self, pending: &HashMap<String, PendingModification>) {
        match cache::save_json(self.cache.as_ref(), PENDING_MODIFICATIONS_KEY, pending).await {
            Ok(()) | Err(CacheError::Disabled) => {}
            Err(err) if err.is_empty_result() => {
                log::warn!("pending modifications kept in memory only: {}", err);
            }
            Err(err) => {
                log::warn!("pending modifications kept in memory only");
                self.notify_error(None, &RoutineError::Persist(err));
            }
        }
    }

    fn notify_error(&self, modification: Option<&PendingModification>, err: &RoutineError) {
        match modification {
            Some(modification) => log::error!("{} ({})", err, modification),
            None => log::error!("{}", err),
        }

        for listener in self.error_listeners.lock().iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(modification, err))).is_err() {
                log::error!("error listener panicked");
            }
        }
    }

    fn notify_done(&self, modification: &PendingModification) {
        log::info!("pending modification done: {}", modification);

        for listener in self.done_listeners.lock().iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(modification))).is_err() {
                log::error!("modification done listener panicked");
            }
        }
    }
}
