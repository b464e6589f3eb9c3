use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use nuki_logger::api::{ReservationTimeModifier, ReservationsReader};
use nuki_logger::cache::{self, Cache, CacheError, CacheResult, MemoryCache, PENDING_MODIFICATIONS_KEY};
use nuki_logger::nuki::Reservation;
use nuki_logger::pending::{PendingModification, PendingModificationRoutine, RoutineError, RoutineOptions};
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Makes the modifier wait in the middle of a reconciliation pass.
#[derive(Clone, Default)]
struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[derive(Default)]
struct Api {
    references: Mutex<Vec<String>>,
    fetch_fails: Mutex<bool>,
    modifications: Mutex<Vec<(String, i32, i32)>>,
    gate: Mutex<Option<Gate>>,
}

impl Api {
    fn publish(&self, reference: &str) {
        self.references.lock().push(reference.to_string());
    }
}

#[async_trait]
impl ReservationsReader for Api {
    async fn reservations(&self) -> anyhow::Result<Vec<Reservation>> {
        if *self.fetch_fails.lock() {
            anyhow::bail!("502 Bad Gateway");
        }
        let references = self.references.lock().clone();
        Ok(references
            .into_iter()
            .map(|reference| Reservation {
                id: format!("id-{}", reference),
                name: format!("guest of {}", reference),
                reference,
                start_date: Utc::now(),
                end_date: Utc::now(),
            })
            .collect())
    }
}

#[async_trait]
impl ReservationTimeModifier for Api {
    async fn modify_access_times(
        &self,
        reservation_id: &str,
        check_in: i32,
        check_out: i32,
    ) -> anyhow::Result<()> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.modifications
            .lock()
            .push((reservation_id.to_string(), check_in, check_out));
        Ok(())
    }
}

/// Loads fine but every save fails.
struct BrokenCache;

#[async_trait]
impl Cache for BrokenCache {
    async fn load(&self, key: &str) -> CacheResult<Vec<u8>> {
        Err(CacheError::NotFound(key.to_string()))
    }

    async fn save(&self, _key: &str, _value: &[u8]) -> CacheResult<()> {
        Err(CacheError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn modification(reference: &str) -> PendingModification {
    PendingModification::new(reference, hm(14, 0), hm(11, 0), 99)
}

struct Setup {
    api: Arc<Api>,
    cache: Arc<MemoryCache>,
    routine: PendingModificationRoutine,
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

async fn start(cache: Arc<MemoryCache>, options: RoutineOptions) -> Setup {
    let api = Arc::new(Api::default());
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (routine, handle) =
        PendingModificationRoutine::start(api.clone(), api.clone(), cache.clone(), options, shutdown_rx)
            .await;
    Setup {
        api,
        cache,
        routine,
        handle,
        shutdown,
    }
}

fn manual() -> RoutineOptions {
    RoutineOptions {
        check_interval: Duration::from_secs(24 * 60 * 60),
        purge_interval: Duration::from_secs(24 * 60 * 60),
        ..Default::default()
    }
}

async fn persisted(cache: &MemoryCache) -> HashMap<String, PendingModification> {
    cache::load_json(cache, PENDING_MODIFICATIONS_KEY)
        .await
        .unwrap()
        .unwrap_or_default()
}

#[tokio::test]
async fn add_then_list_is_untouched() {
    let s = start(Arc::new(MemoryCache::new()), manual()).await;
    let pm = modification("R1");

    s.routine.add(pm.clone()).await.unwrap();

    let list = s.routine.list().await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].reservation_ref, "R1");
    assert_eq!(list[0].check_in_time, pm.check_in_time);
    assert_eq!(list[0].check_out_time, pm.check_out_time);
    assert!(!list[0].modification_done);
    assert!(list[0].linked_reservation.is_none());

    assert!(persisted(&s.cache).await.contains_key("R1"));
}

#[tokio::test]
async fn add_replaces_same_reference() {
    let s = start(Arc::new(MemoryCache::new()), manual()).await;

    s.routine.add(modification("R1")).await.unwrap();
    s.routine
        .add(PendingModification::new("R1", hm(18, 30), hm(9, 0), 1))
        .await
        .unwrap();

    let list = s.routine.list().await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].check_in_time, hm(18, 30));
}

#[tokio::test]
async fn reconciliation_applies_minutes_from_midnight() {
    let s = start(Arc::new(MemoryCache::new()), manual()).await;
    let done = Arc::new(Mutex::new(Vec::new()));
    {
        let done = Arc::clone(&done);
        s.routine
            .on_modification_done(move |pm| done.lock().push((pm.reservation_ref.clone(), pm.from_chat_id)));
    }

    s.routine.add(modification("R1")).await.unwrap();
    s.api.publish("OTHER");
    s.api.publish("R1");
    s.routine.apply_now().await.unwrap();

    assert_eq!(
        *s.api.modifications.lock(),
        [("id-R1".to_string(), 840, 660)]
    );
    assert_eq!(*done.lock(), [("R1".to_string(), 99)]);

    let list = s.routine.list().await;
    assert!(list[0].modification_done);
    assert_eq!(list[0].linked_reservation.as_ref().unwrap().id, "id-R1");
    assert!(persisted(&s.cache).await["R1"].modification_done);

    // done items are not modified twice
    s.routine.apply_now().await.unwrap();
    assert_eq!(s.api.modifications.lock().len(), 1);
}

#[tokio::test]
async fn unmatched_item_stays_pending() {
    let s = start(Arc::new(MemoryCache::new()), manual()).await;

    s.routine.add(modification("R1")).await.unwrap();
    s.api.publish("R2");
    s.routine.apply_now().await.unwrap();

    let list = s.routine.list().await;
    assert_eq!(list.len(), 1);
    assert!(!list[0].modification_done);
    assert!(s.api.modifications.lock().is_empty());
}

#[tokio::test]
async fn fetch_failure_reports_without_item() {
    let s = start(Arc::new(MemoryCache::new()), manual()).await;
    let errors = Arc::new(Mutex::new(Vec::new()));
    {
        let errors = Arc::clone(&errors);
        s.routine.on_error(move |pm, err| {
            errors.lock().push((
                pm.is_none(),
                matches!(err, RoutineError::FetchReservations(_)),
            ))
        });
    }

    s.routine.add(modification("R1")).await.unwrap();
    s.api.publish("R1");
    *s.api.fetch_fails.lock() = true;
    s.routine.apply_now().await.unwrap();

    assert_eq!(*errors.lock(), [(true, true)]);
    assert!(!s.routine.list().await[0].modification_done);

    *s.api.fetch_fails.lock() = false;
    s.routine.apply_now().await.unwrap();
    assert!(s.routine.list().await[0].modification_done);
}

#[tokio::test]
async fn delete_removes_and_persists() {
    let s = start(Arc::new(MemoryCache::new()), manual()).await;

    s.routine.add(modification("R1")).await.unwrap();
    s.routine.add(modification("R2")).await.unwrap();

    assert!(s.routine.delete("R1").await);
    assert!(!s.routine.delete("R1").await);

    let list = s.routine.list().await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].reservation_ref, "R2");

    let stored = persisted(&s.cache).await;
    assert!(!stored.contains_key("R1"));
    assert!(stored.contains_key("R2"));

    // a deleted item is not brought back by a reconciliation
    s.api.publish("R1");
    s.api.publish("R2");
    s.routine.apply_now().await.unwrap();
    assert_eq!(s.routine.list().await.len(), 1);
    assert_eq!(*s.api.modifications.lock(), [("id-R2".to_string(), 840, 660)]);
}

#[tokio::test]
async fn delete_waits_for_running_reconciliation() {
    let s = start(Arc::new(MemoryCache::new()), manual()).await;
    for reference in ["R1", "R2", "R3"] {
        s.routine.add(modification(reference)).await.unwrap();
    }
    s.api.publish("R2");
    let gate = Gate::default();
    *s.api.gate.lock() = Some(gate.clone());

    let apply = {
        let routine = s.routine.clone();
        tokio::spawn(async move { routine.apply_now().await })
    };
    // the pass is now inside the modifier call for R2
    gate.entered.notified().await;

    let delete = {
        let routine = s.routine.clone();
        tokio::spawn(async move { routine.delete("R3").await })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!delete.is_finished());

    gate.release.notify_one();
    apply.await.unwrap().unwrap();
    assert!(delete.await.unwrap());

    let list = s.routine.list().await;
    let refs: Vec<_> = list.iter().map(|pm| pm.reservation_ref.as_str()).collect();
    assert_eq!(refs, ["R1", "R2"]);
    assert!(list[1].modification_done);

    let stored = persisted(&s.cache).await;
    assert!(!stored.contains_key("R3"));
    assert!(stored["R2"].modification_done);
}

#[tokio::test]
async fn failing_cache_keeps_changes_in_memory() {
    let api = Arc::new(Api::default());
    let (_shutdown, shutdown_rx) = watch::channel(false);
    let (routine, _handle) = PendingModificationRoutine::start(
        api.clone(),
        api.clone(),
        Arc::new(BrokenCache),
        manual(),
        shutdown_rx,
    )
    .await;
    let errors = Arc::new(Mutex::new(Vec::new()));
    {
        let errors = Arc::clone(&errors);
        routine.on_error(move |pm, err| {
            errors
                .lock()
                .push((pm.is_none(), matches!(err, RoutineError::Persist(_))))
        });
    }

    routine.add(modification("R1")).await.unwrap();
    routine.add(modification("R2")).await.unwrap();
    assert_eq!(routine.list().await.len(), 2);

    assert!(routine.delete("R1").await);
    let list = routine.list().await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].reservation_ref, "R2");

    assert_eq!(*errors.lock(), [(true, true); 3]);
}

#[tokio::test]
async fn restart_reloads_persisted_items() {
    let cache = Arc::new(MemoryCache::new());
    let first = start(Arc::clone(&cache), manual()).await;
    first.routine.add(modification("R1")).await.unwrap();
    first.shutdown.send(true).unwrap();
    first.handle.await.unwrap();

    let second = start(cache, manual()).await;
    let list = second.routine.list().await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].reservation_ref, "R1");
}

#[tokio::test(start_paused = true)]
async fn timer_drives_reconciliation() {
    let s = start(
        Arc::new(MemoryCache::new()),
        RoutineOptions {
            check_interval: Duration::from_secs(10),
            ..manual()
        },
    )
    .await;

    s.routine.add(modification("R1")).await.unwrap();
    s.api.publish("R1");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(s.api.modifications.lock().is_empty());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(s.api.modifications.lock().len(), 1);
    assert!(s.routine.list().await[0].modification_done);
}

#[tokio::test(start_paused = true)]
async fn done_items_purged_only_after_grace_period() {
    let now = Utc::now();
    let mut stored = HashMap::new();
    for (reference, done, hours) in [("OLD", true, 73), ("RECENT", true, 71), ("WAITING", false, 200)] {
        let mut pm = modification(reference);
        pm.modification_done = done;
        pm.last_update_time = now - chrono::Duration::hours(hours);
        stored.insert(reference.to_string(), pm);
    }
    let cache = Arc::new(MemoryCache::new());
    cache::save_json(cache.as_ref(), PENDING_MODIFICATIONS_KEY, &stored)
        .await
        .unwrap();

    let s = start(
        cache,
        RoutineOptions {
            purge_interval: Duration::from_secs(60),
            ..manual()
        },
    )
    .await;
    assert_eq!(s.routine.list().await.len(), 3);

    tokio::time::sleep(Duration::from_secs(90)).await;

    let refs: Vec<_> = s
        .routine
        .list()
        .await
        .into_iter()
        .map(|pm| pm.reservation_ref)
        .collect();
    assert_eq!(refs, ["RECENT", "WAITING"]);
    assert!(!persisted(&s.cache).await.contains_key("OLD"));
}
