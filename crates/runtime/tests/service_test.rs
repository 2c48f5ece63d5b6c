//! LevelService scenarios: events, write-through, failures and concurrency.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use leveling_core::{
    EntityId, ExponentialFormula, Formula, Level, LevelFormula, LinearFormula, ProgressionRecord,
    Xp,
};
use leveling_runtime::repository::{MetaEntries, XpRemap};
use leveling_runtime::{
    InMemoryProgressionRepo, LevelService, LevelUpListener, LevelingError, ProgressionRepository,
    RepositoryError, SqliteProgressionRepository,
};
use tempfile::TempDir;

/// Records every notification as a readable line.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn attach(&self, service: &LevelService) {
        let listeners = service.listeners();

        let log = self.clone();
        listeners
            .xp_gain
            .register(Arc::new(move |_: EntityId, amount: Xp| log.push(format!("gain {amount}"))));
        let log = self.clone();
        listeners
            .xp_loss
            .register(Arc::new(move |_: EntityId, amount: Xp| log.push(format!("loss {amount}"))));
        let log = self.clone();
        listeners
            .level_up
            .register(Arc::new(move |_: EntityId, level: Level| log.push(format!("up {level}"))));
        let log = self.clone();
        listeners
            .level_down
            .register(Arc::new(move |_: EntityId, level: Level| log.push(format!("down {level}"))));
        let log = self.clone();
        listeners.level_change.register(Arc::new(
            move |_: EntityId, old: Level, new: Level| log.push(format!("change {old}->{new}")),
        ));
    }

    fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

fn exponential_service() -> (LevelService, Recorder) {
    let formula: Formula = ExponentialFormula::new(100.0, 1.7).unwrap().into();
    let service = LevelService::new(formula, Arc::new(InMemoryProgressionRepo::new()));
    let recorder = Recorder::default();
    recorder.attach(&service);
    (service, recorder)
}

#[test]
fn add_xp_to_fresh_entity_levels_up_once() {
    let (service, recorder) = exponential_service();
    let id = EntityId::new_v4();

    let level = service.add_xp(id, 500).unwrap();

    let expected = service.formula().level_for_xp(500).unwrap();
    assert_eq!(expected, 3);
    assert_eq!(level, expected);
    assert_eq!(service.get_xp(id).unwrap(), 500);
    assert_eq!(service.get_level(id).unwrap(), expected);
    assert_eq!(recorder.take(), vec!["gain 500", "up 3", "change 1->3"]);
    assert_eq!(service.repository().load(id).unwrap().unwrap().xp(), 500);
}

#[test]
fn xp_events_fire_even_without_level_change() {
    let (service, recorder) = exponential_service();
    let id = EntityId::new_v4();

    service.add_xp(id, 0).unwrap();
    service.add_xp(id, 50).unwrap();
    service.remove_xp(id, 80).unwrap();

    assert_eq!(service.get_xp(id).unwrap(), 0);
    assert_eq!(recorder.take(), vec!["gain 0", "gain 50", "loss 80"]);
}

#[test]
fn remove_xp_clamps_and_levels_down() {
    let (service, recorder) = exponential_service();
    let id = EntityId::new_v4();
    service.add_xp(id, 700).unwrap();
    recorder.take();

    assert_eq!(service.remove_xp(id, 10_000).unwrap(), 1);
    assert_eq!(service.get_xp(id).unwrap(), 0);
    assert_eq!(recorder.take(), vec!["loss 10000", "down 1", "change 4->1"]);
}

#[test]
fn set_xp_reports_only_real_level_changes() {
    let (service, recorder) = exponential_service();
    let id = EntityId::new_v4();
    service.set_xp(id, 700).unwrap();
    assert_eq!(recorder.take(), vec!["up 4", "change 1->4"]);

    // Same level: 648..=1_055 is level 4.
    service.set_xp(id, 650).unwrap();
    assert!(recorder.take().is_empty());

    service.set_xp(id, 120).unwrap();
    assert_eq!(recorder.take(), vec!["down 2", "change 4->2"]);

    service.set_xp(id, -40).unwrap();
    assert_eq!(service.get_xp(id).unwrap(), 0);
    assert_eq!(recorder.take(), vec!["down 1", "change 2->1"]);
}

#[test]
fn level_operations_move_to_exact_floors() {
    let (service, recorder) = exponential_service();
    let id = EntityId::new_v4();

    assert_eq!(service.add_level(id, 0).unwrap(), 1);
    assert!(recorder.take().is_empty());
    assert!(!service.repository().exists(id).unwrap());

    assert_eq!(service.add_level(id, 5).unwrap(), 6);
    assert_eq!(service.get_xp(id).unwrap(), service.xp_for_level(6).unwrap());
    assert_eq!(recorder.take(), vec!["up 6", "change 1->6"]);

    assert_eq!(service.remove_level(id, 2).unwrap(), 4);
    assert_eq!(recorder.take(), vec!["down 4", "change 6->4"]);

    assert_eq!(service.set_level(id, 10).unwrap(), 10);
    assert_eq!(recorder.take(), vec!["up 10", "change 4->10"]);

    assert_eq!(service.remove_level(id, 50).unwrap(), 1);
    assert_eq!(service.get_xp(id).unwrap(), 0);

    for bad in [0, -3] {
        assert!(matches!(
            service.remove_level(id, bad),
            Err(LevelingError::InvalidArgument(_))
        ));
    }
}

#[test]
fn negative_add_level_reports_a_level_down() {
    let (service, recorder) = exponential_service();
    let id = EntityId::new_v4();
    service.set_level(id, 5).unwrap();
    recorder.take();

    assert_eq!(service.add_level(id, -2).unwrap(), 3);
    assert_eq!(service.get_xp(id).unwrap(), 325);
    assert_eq!(recorder.take(), vec!["down 3", "change 5->3"]);

    // Floored at level 1; a move past the bottom still reports once.
    assert_eq!(service.add_level(id, -10).unwrap(), 1);
    assert_eq!(service.get_xp(id).unwrap(), 0);
    assert_eq!(recorder.take(), vec!["down 1", "change 3->1"]);

    // Already at the floor: nothing moves, nothing fires.
    assert_eq!(service.add_level(id, -1).unwrap(), 1);
    assert!(recorder.take().is_empty());
}

#[test]
fn unregistered_listener_stops_receiving() {
    let (service, _) = exponential_service();
    let hits = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&hits);
    let handle: Arc<dyn LevelUpListener> = Arc::new(move |_: EntityId, _: Level| {
        *counter.lock().unwrap() += 1;
    });
    service.listeners().level_up.register(Arc::clone(&handle));

    let id = EntityId::new_v4();
    service.add_xp(id, 100).unwrap();
    assert!(service.listeners().level_up.unregister(&handle));
    service.add_xp(id, 1_000).unwrap();

    assert_eq!(*hits.lock().unwrap(), 1);
}

struct Reentrant {
    service: Mutex<Option<Arc<LevelService>>>,
    observed: Mutex<Vec<Xp>>,
}

impl LevelUpListener for Reentrant {
    fn on_level_up(&self, entity: EntityId, _new_level: Level) {
        let service = self.service.lock().unwrap().clone();
        if let Some(service) = service {
            self.observed.lock().unwrap().push(service.get_xp(entity).unwrap());
        }
    }
}

#[test]
fn listeners_may_call_back_into_the_service() {
    let service = Arc::new(LevelService::new(
        LinearFormula::new(100).unwrap().into(),
        Arc::new(InMemoryProgressionRepo::new()),
    ));
    let listener = Arc::new(Reentrant {
        service: Mutex::new(Some(Arc::clone(&service))),
        observed: Mutex::new(Vec::new()),
    });
    service.listeners().level_up.register(listener.clone());

    service.add_xp(EntityId::from_u128(5), 250).unwrap();
    assert_eq!(*listener.observed.lock().unwrap(), vec![250]);

    // Break the Arc cycle.
    listener.service.lock().unwrap().take();
}

#[test]
fn concurrent_mutations_on_one_entity_are_serialized() {
    let service = Arc::new(LevelService::new(
        LinearFormula::new(100).unwrap().into(),
        Arc::new(InMemoryProgressionRepo::new()),
    ));
    let level_ups = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&level_ups);
    service
        .listeners()
        .level_up
        .register(Arc::new(move |_: EntityId, _: Level| {
            *counter.lock().unwrap() += 1;
        }));

    let id = EntityId::from_u128(77);
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for _ in 0..100 {
                    service.add_xp(id, 10).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(service.get_xp(id).unwrap(), 8_000);
    assert_eq!(service.get_level(id).unwrap(), 81);
    assert_eq!(*level_ups.lock().unwrap(), 80);
    assert_eq!(service.repository().load(id).unwrap().unwrap().xp(), 8_000);
}

#[test]
fn invalidation_racing_mutations_loses_no_writes() {
    let service = Arc::new(LevelService::new(
        LinearFormula::new(100).unwrap().into(),
        Arc::new(InMemoryProgressionRepo::new()),
    ));
    let id = EntityId::from_u128(78);
    let done = Arc::new(AtomicBool::new(false));

    let invalidator = {
        let service = Arc::clone(&service);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                service.invalidate(id).unwrap();
                thread::yield_now();
            }
        })
    };

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for _ in 0..250 {
                    service.add_xp(id, 5).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    invalidator.join().unwrap();

    assert_eq!(service.repository().load(id).unwrap().unwrap().xp(), 5_000);
    assert_eq!(service.get_xp(id).unwrap(), 5_000);
    assert!(service.invalidate(id).unwrap());
    assert_eq!(service.get_xp(id).unwrap(), 5_000);
}

/// In-memory store whose writes can be switched off.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryProgressionRepo,
    failing: AtomicBool,
}

impl ProgressionRepository for FlakyStore {
    fn save(&self, record: &ProgressionRecord) -> leveling_runtime::repository::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Io(io::Error::other("write refused")));
        }
        self.inner.save(record)
    }

    fn load(&self, id: EntityId) -> leveling_runtime::repository::Result<Option<ProgressionRecord>> {
        self.inner.load(id)
    }

    fn exists(&self, id: EntityId) -> leveling_runtime::repository::Result<bool> {
        self.inner.exists(id)
    }

    fn close(&self) -> leveling_runtime::repository::Result<()> {
        self.inner.close()
    }

    fn meta_get(&self, key: &str) -> leveling_runtime::repository::Result<Option<String>> {
        self.inner.meta_get(key)
    }

    fn meta_put_all(&self, entries: &MetaEntries<'_>) -> leveling_runtime::repository::Result<()> {
        self.inner.meta_put_all(entries)
    }

    fn rewrite_xp(
        &self,
        batch_size: usize,
        remap: &mut XpRemap<'_>,
        meta: &MetaEntries<'_>,
    ) -> leveling_runtime::repository::Result<u64> {
        self.inner.rewrite_xp(batch_size, remap, meta)
    }

    fn list_ids(&self) -> leveling_runtime::repository::Result<Vec<EntityId>> {
        self.inner.list_ids()
    }
}

#[test]
fn failed_write_fires_nothing_and_can_be_resynced() {
    let store = Arc::new(FlakyStore::default());
    let service = LevelService::new(LinearFormula::new(100).unwrap().into(), store.clone());
    let recorder = Recorder::default();
    recorder.attach(&service);

    let id = EntityId::from_u128(9);
    service.add_xp(id, 150).unwrap();
    recorder.take();

    store.failing.store(true, Ordering::SeqCst);
    let err = service.add_xp(id, 500).unwrap_err();
    match err {
        LevelingError::Persistence { operation, .. } => assert_eq!(operation, "add_xp"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(recorder.take().is_empty());

    // Cache ran ahead of the store.
    assert_eq!(service.get_xp(id).unwrap(), 650);
    assert_eq!(store.load(id).unwrap().unwrap().xp(), 150);

    store.failing.store(false, Ordering::SeqCst);
    assert!(service.invalidate(id).unwrap());
    assert_eq!(service.get_xp(id).unwrap(), 150);
}

#[test]
fn writes_reach_sqlite_and_survive_a_new_service() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("leveling.db");
    let id = EntityId::new_v4();
    let formula: Formula = LinearFormula::new(100).unwrap().into();

    {
        let repo = Arc::new(SqliteProgressionRepository::open(&path).unwrap());
        let service = LevelService::new(formula.clone(), repo.clone());
        service.set_level(id, 12).unwrap();
        service.remove_xp(id, 30).unwrap();
        repo.close().unwrap();
    }

    let repo = Arc::new(SqliteProgressionRepository::open(&path).unwrap());
    let service = LevelService::new(formula, repo);
    assert_eq!(service.get_xp(id).unwrap(), 1_070);
    assert_eq!(service.get_level(id).unwrap(), 11);
}
