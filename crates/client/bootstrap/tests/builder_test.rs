use std::fs;
use std::path::Path;

use leveling_bootstrap::{LevelingBuilder, LevelingConfig, StorageBackend};
use leveling_core::EntityId;
use leveling_runtime::{MigrationOutcome, ProgressionRepository};
use tempfile::TempDir;

fn config(backend: StorageBackend, kind: &str) -> LevelingConfig {
    let mut config = LevelingConfig::default();
    config.database.backend = backend;
    config.formula.kind = kind.to_string();
    config
}

fn build(dir: &Path, config: LevelingConfig) -> leveling_bootstrap::LevelingSetup {
    LevelingBuilder::new(config, dir).build().unwrap()
}

#[test]
fn fresh_store_records_formula_and_serves_requests() {
    let dir = TempDir::new().unwrap();
    let setup = build(dir.path(), config(StorageBackend::Memory, "EXPONENTIAL"));

    assert_eq!(setup.migration, Some(MigrationOutcome::Initialized));
    let id = EntityId::new_v4();
    assert_eq!(setup.service.add_xp(id, 500).unwrap(), 3);

    setup.shutdown().unwrap();
    setup.shutdown().unwrap();
}

#[test]
fn formula_change_between_runs_keeps_levels() {
    let dir = TempDir::new().unwrap();
    let id = EntityId::from_u128(31);

    {
        let setup = build(dir.path(), config(StorageBackend::Sqlite, "LINEAR"));
        setup.service.set_level(id, 7).unwrap();
        assert_eq!(setup.service.get_xp(id).unwrap(), 600);
        setup.shutdown().unwrap();
    }

    let setup = build(dir.path(), config(StorageBackend::Sqlite, "EXPONENTIAL"));
    assert!(matches!(
        setup.migration,
        Some(MigrationOutcome::Migrated { records: 1, .. })
    ));
    assert_eq!(setup.service.get_level(id).unwrap(), 7);
    assert_eq!(
        setup.service.get_xp(id).unwrap(),
        setup.service.xp_for_level(7).unwrap()
    );
    setup.shutdown().unwrap();
}

#[test]
fn disabled_migration_leaves_store_alone_until_requested() {
    let dir = TempDir::new().unwrap();
    let mut config = config(StorageBackend::File, "LINEAR");
    config.formula.migrate_xp = false;
    config.database.path = "store".into();

    let setup = build(dir.path(), config);
    assert_eq!(setup.migration, None);
    assert!(dir.path().join("store").is_dir());
    assert_eq!(setup.repository.meta_get("formula.type").unwrap(), None);

    assert_eq!(setup.migrate().unwrap(), MigrationOutcome::Initialized);
    assert_eq!(
        setup.repository.meta_get("formula.type").unwrap().as_deref(),
        Some("LINEAR")
    );
    setup.shutdown().unwrap();
}

#[test]
fn table_formula_reads_csv_from_data_dir() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("levels.csv"), "level,xp\n1,0\n2,100\n3,250\n").unwrap();

    let setup = build(dir.path(), config(StorageBackend::Memory, "TABLE"));
    let id = EntityId::new_v4();
    assert_eq!(setup.service.add_xp(id, 260).unwrap(), 3);
}

#[test]
fn missing_table_file_fails_build() {
    let dir = TempDir::new().unwrap();
    let result = LevelingBuilder::new(config(StorageBackend::Memory, "TABLE"), dir.path()).build();
    assert!(result.is_err());
}

#[test]
fn edited_table_blocks_startup_migration() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("levels.csv");
    fs::write(&csv, "1,0\n2,100\n3,250\n").unwrap();

    {
        let setup = build(dir.path(), config(StorageBackend::Sqlite, "TABLE"));
        setup.service.add_xp(EntityId::from_u128(1), 120).unwrap();
        setup.shutdown().unwrap();
    }

    fs::write(&csv, "1,0\n2,150\n3,250\n").unwrap();
    let result = LevelingBuilder::new(config(StorageBackend::Sqlite, "LINEAR"), dir.path()).build();
    assert!(result.is_err());
}
