//! Listener contracts and registries for progression events.
//!
//! Listeners run synchronously on the thread that performed the mutation,
//! after the write reached the repository and after the entity lock was
//! released, so they may call back into the service.

use std::sync::{Arc, RwLock};

use leveling_core::{EntityId, Level, Xp};
use tracing::debug;

pub trait LevelUpListener: Send + Sync {
    fn on_level_up(&self, entity: EntityId, new_level: Level);
}

pub trait LevelDownListener: Send + Sync {
    fn on_level_down(&self, entity: EntityId, new_level: Level);
}

/// Fires after the directional listener on every level transition.
pub trait LevelChangeListener: Send + Sync {
    fn on_level_change(&self, entity: EntityId, old_level: Level, new_level: Level);
}

pub trait XpGainListener: Send + Sync {
    fn on_xp_gain(&self, entity: EntityId, amount: Xp);
}

pub trait XpLossListener: Send + Sync {
    fn on_xp_loss(&self, entity: EntityId, amount: Xp);
}

impl<F> LevelUpListener for F
where
    F: Fn(EntityId, Level) + Send + Sync,
{
    fn on_level_up(&self, entity: EntityId, new_level: Level) {
        self(entity, new_level)
    }
}

impl<F> LevelDownListener for F
where
    F: Fn(EntityId, Level) + Send + Sync,
{
    fn on_level_down(&self, entity: EntityId, new_level: Level) {
        self(entity, new_level)
    }
}

impl<F> LevelChangeListener for F
where
    F: Fn(EntityId, Level, Level) + Send + Sync,
{
    fn on_level_change(&self, entity: EntityId, old_level: Level, new_level: Level) {
        self(entity, old_level, new_level)
    }
}

impl<F> XpGainListener for F
where
    F: Fn(EntityId, Xp) + Send + Sync,
{
    fn on_xp_gain(&self, entity: EntityId, amount: Xp) {
        self(entity, amount)
    }
}

impl<F> XpLossListener for F
where
    F: Fn(EntityId, Xp) + Send + Sync,
{
    fn on_xp_loss(&self, entity: EntityId, amount: Xp) {
        self(entity, amount)
    }
}

/// Insertion-ordered list of listener handles.
///
/// Handles are compared by identity (`Arc::ptr_eq`); keep the `Arc` returned
/// by [`register`](Self::register) to unregister later.
pub struct ListenerRegistry<L: ?Sized> {
    name: &'static str,
    handles: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> ListenerRegistry<L> {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            handles: RwLock::new(Vec::new()),
        }
    }

    /// Appends `listener`; the same handle may be registered more than once.
    pub fn register(&self, listener: Arc<L>) -> Arc<L> {
        let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
        handles.push(Arc::clone(&listener));
        debug!(target: "leveling::listeners", registry = self.name, count = handles.len(), "Listener registered");
        listener
    }

    /// Removes the first registration of `listener`. Returns whether one was
    /// found.
    pub fn unregister(&self, listener: &Arc<L>) -> bool {
        let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
        match handles.iter().position(|h| Arc::ptr_eq(h, listener)) {
            Some(index) => {
                handles.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles in registration order, cloned so dispatch holds no lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<L>> {
        self.handles
            .read()
            .map(|h| h.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

/// The five registries owned by a [`LevelService`](super::LevelService).
pub struct Listeners {
    pub level_up: ListenerRegistry<dyn LevelUpListener>,
    pub level_down: ListenerRegistry<dyn LevelDownListener>,
    pub level_change: ListenerRegistry<dyn LevelChangeListener>,
    pub xp_gain: ListenerRegistry<dyn XpGainListener>,
    pub xp_loss: ListenerRegistry<dyn XpLossListener>,
}

impl Default for Listeners {
    fn default() -> Self {
        Self {
            level_up: ListenerRegistry::new("level_up"),
            level_down: ListenerRegistry::new("level_down"),
            level_change: ListenerRegistry::new("level_change"),
            xp_gain: ListenerRegistry::new("xp_gain"),
            xp_loss: ListenerRegistry::new("xp_loss"),
        }
    }
}

/// Notification collected under the entity lock, dispatched after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ProgressionEvent {
    XpGained { entity: EntityId, amount: Xp },
    XpLost { entity: EntityId, amount: Xp },
    LevelUp { entity: EntityId, old: Level, new: Level },
    LevelDown { entity: EntityId, old: Level, new: Level },
}

impl Listeners {
    pub(crate) fn dispatch(&self, event: ProgressionEvent) {
        match event {
            ProgressionEvent::XpGained { entity, amount } => {
                for listener in self.xp_gain.snapshot() {
                    listener.on_xp_gain(entity, amount);
                }
            }
            ProgressionEvent::XpLost { entity, amount } => {
                for listener in self.xp_loss.snapshot() {
                    listener.on_xp_loss(entity, amount);
                }
            }
            ProgressionEvent::LevelUp { entity, old, new } => {
                for listener in self.level_up.snapshot() {
                    listener.on_level_up(entity, new);
                }
                self.dispatch_change(entity, old, new);
            }
            ProgressionEvent::LevelDown { entity, old, new } => {
                for listener in self.level_down.snapshot() {
                    listener.on_level_down(entity, new);
                }
                self.dispatch_change(entity, old, new);
            }
        }
    }

    fn dispatch_change(&self, entity: EntityId, old: Level, new: Level) {
        for listener in self.level_change.snapshot() {
            listener.on_level_change(entity, old, new);
        }
    }
}
