//! Level service: cached per-entity progression with write-through and
//! synchronous change notifications.
//!
//! Every mutation follows the same path under the entity's own lock:
//! derive the old level, apply the change, persist, derive the new level.
//! Notifications are collected on the way and dispatched once the lock is
//! released, in this order: XP event, directional level event, generic
//! level-change event.
//!
//! If the write fails the cached record keeps the new value, no listener
//! fires and the error is returned; [`LevelService::invalidate`] drops the
//! entry so the next access reloads from the store. Invalidation is safe
//! under concurrent mutation: it waits for the in-flight mutation, and a
//! thread that raced it onto the evicted entry retries on the fresh one.

mod cache;
mod listeners;

use std::sync::Arc;

use leveling_core::{EntityId, Formula, Level, LevelFormula, ProgressionRecord, Xp};
use tracing::{debug, warn};

use crate::api::{LevelingError, Result};
use crate::repository::ProgressionRepository;
use cache::{EntityCache, Entry};
use listeners::ProgressionEvent;

pub use listeners::{
    LevelChangeListener, LevelDownListener, LevelUpListener, ListenerRegistry, Listeners,
    XpGainListener, XpLossListener,
};

/// Which level transitions a mutation reports.
#[derive(Clone, Copy)]
enum Watch {
    Up,
    Down,
    Both,
}

pub struct LevelService {
    formula: Formula,
    repository: Arc<dyn ProgressionRepository>,
    cache: EntityCache,
    listeners: Listeners,
}

impl LevelService {
    pub fn new(formula: Formula, repository: Arc<dyn ProgressionRepository>) -> Self {
        Self {
            formula,
            repository,
            cache: EntityCache::new(),
            listeners: Listeners::default(),
        }
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn repository(&self) -> &Arc<dyn ProgressionRepository> {
        &self.repository
    }

    /// Listener registries; register and unregister through their fields.
    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    pub fn get_xp(&self, id: EntityId) -> Result<Xp> {
        self.with_record(id, |record| Ok(record.xp()))
    }

    /// Level derived from the cached XP by the active formula.
    pub fn get_level(&self, id: EntityId) -> Result<Level> {
        let xp = self.get_xp(id)?;
        Ok(self.formula.level_for_xp(xp)?)
    }

    /// XP floor of `level`; levels at or below 1 need no XP.
    pub fn xp_for_level(&self, level: Level) -> Result<Xp> {
        if level <= 1 {
            return Ok(0);
        }
        Ok(self.formula.xp_for_level(level)?)
    }

    /// Adds `amount` XP (saturating). Fires the XP-gain event, then level-up
    /// if the level rose.
    pub fn add_xp(&self, id: EntityId, amount: Xp) -> Result<Level> {
        if amount < 0 {
            return Err(LevelingError::invalid(format!(
                "xp amount must be >= 0, got {amount}"
            )));
        }
        self.mutate(
            id,
            "add_xp",
            Watch::Up,
            Some(ProgressionEvent::XpGained { entity: id, amount }),
            |xp, _| Ok(xp.saturating_add(amount)),
        )
    }

    /// Removes `amount` XP, clamping at zero. Fires the XP-loss event with
    /// the requested amount, then level-down if the level fell.
    pub fn remove_xp(&self, id: EntityId, amount: Xp) -> Result<Level> {
        if amount < 0 {
            return Err(LevelingError::invalid(format!(
                "xp amount must be >= 0, got {amount}"
            )));
        }
        self.mutate(
            id,
            "remove_xp",
            Watch::Down,
            Some(ProgressionEvent::XpLost { entity: id, amount }),
            |xp, _| Ok(xp.saturating_sub(amount)),
        )
    }

    /// Overwrites XP (negative clamps to zero).
    pub fn set_xp(&self, id: EntityId, xp: Xp) -> Result<Level> {
        self.mutate(id, "set_xp", Watch::Both, None, |_, _| Ok(xp))
    }

    /// Moves the entity `delta` levels (negative moves down, floored at 1)
    /// and sets XP to that level's floor. `delta == 0` changes nothing.
    pub fn add_level(&self, id: EntityId, delta: Level) -> Result<Level> {
        if delta == 0 {
            return self.get_level(id);
        }
        self.mutate(id, "add_level", Watch::Both, None, |_, level| {
            let target = level.saturating_add(delta).max(1);
            Ok(self.formula.xp_for_level(target)?)
        })
    }

    /// Moves the entity down `delta` levels, floored at 1. `delta` must be
    /// strictly positive.
    pub fn remove_level(&self, id: EntityId, delta: Level) -> Result<Level> {
        if delta <= 0 {
            return Err(LevelingError::invalid(format!(
                "level delta must be > 0, got {delta}"
            )));
        }
        self.mutate(id, "remove_level", Watch::Down, None, |_, level| {
            let target = level.saturating_sub(delta).max(1);
            Ok(self.formula.xp_for_level(target)?)
        })
    }

    /// Sets XP to the floor of `max(level, 1)` and returns the resulting level.
    pub fn set_level(&self, id: EntityId, level: Level) -> Result<Level> {
        let target = level.max(1);
        self.mutate(id, "set_level", Watch::Both, None, |_, _| {
            Ok(self.formula.xp_for_level(target)?)
        })
    }

    /// Drops the cached entry for `id`. Returns whether one was cached.
    pub fn invalidate(&self, id: EntityId) -> Result<bool> {
        self.cache.remove(id)
    }

    /// Number of entities currently cached.
    pub fn cached_entities(&self) -> usize {
        self.cache.len()
    }

    fn entry(&self, id: EntityId) -> Result<Entry> {
        self.cache.get_or_load(id, || {
            let stored = self
                .repository
                .load(id)
                .map_err(|e| LevelingError::persistence("load", e))?;
            Ok(stored.unwrap_or_else(|| ProgressionRecord::new(id)))
        })
    }

    /// Runs `f` on the live cached record of `id` while holding its lock.
    fn with_record<T>(
        &self,
        id: EntityId,
        f: impl FnOnce(&mut ProgressionRecord) -> Result<T>,
    ) -> Result<T> {
        loop {
            let entry = self.entry(id)?;
            let mut slot = entry.lock().map_err(|_| LevelingError::LockPoisoned)?;
            // Evicted while we waited for the lock.
            if slot.is_retired() {
                continue;
            }
            return f(&mut slot.record);
        }
    }

    /// Runs one mutation under the entity lock and dispatches its events.
    ///
    /// `next_xp` receives the current XP and level.
    fn mutate(
        &self,
        id: EntityId,
        operation: &'static str,
        watch: Watch,
        xp_event: Option<ProgressionEvent>,
        next_xp: impl FnOnce(Xp, Level) -> Result<Xp>,
    ) -> Result<Level> {
        let mut events = Vec::with_capacity(2);

        let new_level = self.with_record(id, |record| {
            let old_level = self.formula.level_for_xp(record.xp())?;

            let xp = next_xp(record.xp(), old_level)?;
            record.set_xp(xp);

            if let Err(source) = self.repository.save(record) {
                warn!(
                    target: "leveling::service",
                    entity = %id,
                    operation,
                    error = %source,
                    "Persist failed; cached record is ahead of the store"
                );
                return Err(LevelingError::persistence(operation, source));
            }

            let new_level = self.formula.level_for_xp(record.xp())?;
            debug!(
                target: "leveling::service",
                entity = %id,
                operation,
                xp = record.xp(),
                old_level,
                new_level,
                "Progression updated"
            );

            events.extend(xp_event);
            let rose = new_level > old_level;
            let fell = new_level < old_level;
            match watch {
                Watch::Up | Watch::Both if rose => events.push(ProgressionEvent::LevelUp {
                    entity: id,
                    old: old_level,
                    new: new_level,
                }),
                Watch::Down | Watch::Both if fell => events.push(ProgressionEvent::LevelDown {
                    entity: id,
                    old: old_level,
                    new: new_level,
                }),
                _ => {}
            }
            Ok(new_level)
        })?;

        for event in events {
            self.listeners.dispatch(event);
        }
        Ok(new_level)
    }
}
