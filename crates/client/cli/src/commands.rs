//! Command execution against an assembled service.
use std::sync::Arc;

use anyhow::{Context, Result};
use leveling_bootstrap::LevelingSetup;
use leveling_core::{EntityId, Level, Xp};
use leveling_runtime::{LevelService, MigrationOutcome};

use crate::cli::{Command, DEMO_ENTITY};

/// Log every progression change at INFO.
pub fn register_log_listeners(service: &LevelService) {
    let listeners = service.listeners();
    listeners
        .level_up
        .register(Arc::new(|entity: EntityId, level: Level| {
            tracing::info!(%entity, level, "Level up");
        }));
    listeners
        .level_down
        .register(Arc::new(|entity: EntityId, level: Level| {
            tracing::info!(%entity, level, "Level down");
        }));
    listeners.xp_gain.register(Arc::new(|entity: EntityId, amount: Xp| {
        tracing::debug!(%entity, amount, "XP gained");
    }));
    listeners.xp_loss.register(Arc::new(|entity: EntityId, amount: Xp| {
        tracing::debug!(%entity, amount, "XP lost");
    }));
}

pub fn execute(setup: &LevelingSetup, command: Command) -> Result<()> {
    let service = setup.service.as_ref();

    match command {
        Command::Get { entity } => report(service, entity),
        Command::AddXp { entity, amount } => {
            service.add_xp(entity, amount).context("add-xp failed")?;
            report(service, entity)
        }
        Command::RemoveXp { entity, amount } => {
            service.remove_xp(entity, amount).context("remove-xp failed")?;
            report(service, entity)
        }
        Command::SetXp { entity, xp } => {
            service.set_xp(entity, xp).context("set-xp failed")?;
            report(service, entity)
        }
        Command::AddLevel { entity, delta } => {
            service.add_level(entity, delta).context("add-level failed")?;
            report(service, entity)
        }
        Command::RemoveLevel { entity, delta } => {
            service
                .remove_level(entity, delta)
                .context("remove-level failed")?;
            report(service, entity)
        }
        Command::SetLevel { entity, level } => {
            service.set_level(entity, level).context("set-level failed")?;
            report(service, entity)
        }
        Command::XpForLevel { level } => {
            let xp = service.xp_for_level(level)?;
            println!("level {level} starts at {xp} xp ({})", service.formula().descriptor());
            Ok(())
        }
        Command::Migrate => {
            let outcome = match &setup.migration {
                Some(outcome) => outcome.clone(),
                None => setup.migrate()?,
            };
            print_outcome(&outcome);
            Ok(())
        }
        Command::Demo => {
            let entity: EntityId = DEMO_ENTITY.parse()?;
            service.add_xp(entity, 500)?;
            let xp = service.get_xp(entity)?;
            let level = service.get_level(entity)?;
            tracing::info!("XP: {xp}");
            tracing::info!("Level: {level}");
            Ok(())
        }
    }
}

fn report(service: &LevelService, entity: EntityId) -> Result<()> {
    let xp = service.get_xp(entity)?;
    let level = service.get_level(entity)?;
    println!("{entity} level {level} xp {xp}");
    Ok(())
}

fn print_outcome(outcome: &MigrationOutcome) {
    match outcome {
        MigrationOutcome::Initialized => println!("no formula recorded yet; current formula recorded"),
        MigrationOutcome::UpToDate => println!("stored xp already matches the configured formula"),
        MigrationOutcome::Migrated { records, from, to } => {
            println!("migrated {records} records from {from} to {to}")
        }
    }
}
