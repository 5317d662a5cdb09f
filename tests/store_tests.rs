//! Record store integration tests
//!
//! Exercises the copy-and-splice upsert against real files: idempotence,
//! position preservation, and round-tripping through the parser.

use spicerack::store::{slot_key, RecordStore, SlotRecord};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> RecordStore {
    RecordStore::open(dir.path().join("spice_data")).unwrap()
}

fn record(slot: usize, name: &str, adc: i64, mass: f64, volume: f64) -> SlotRecord {
    SlotRecord::new(slot_key(slot), name, adc, mass, volume)
}

#[test]
fn upsert_into_empty_store_creates_single_line() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let rec = record(1, "Paprika", 1450, 260.0, 19.25);
    store.upsert("Spice1", &rec.to_line()).unwrap();

    let contents = std::fs::read_to_string(store.path()).unwrap();
    assert_eq!(contents, rec.to_line());
    assert_eq!(contents.lines().count(), 1);
}

#[test]
fn upsert_same_key_replaces_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    store
        .upsert("Spice1", &record(1, "Paprika", 1450, 260.0, 19.25).to_line())
        .unwrap();
    store
        .upsert("Spice1", &record(1, "Paprika", 999, 120.0, 8.8).to_line())
        .unwrap();

    let contents = std::fs::read_to_string(store.path()).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains("ADC_Reading:999"));
    assert!(!contents.contains("ADC_Reading:1450"));
}

#[test]
fn upsert_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let rec = record(2, "Cumin", 1300, 120.5, 8.5);
    store.upsert("Spice2", &rec.to_line()).unwrap();
    let once = std::fs::read(store.path()).unwrap();

    store.upsert("Spice2", &rec.to_line()).unwrap();
    let twice = std::fs::read(store.path()).unwrap();

    assert_eq!(once, twice);
}

#[test]
fn upsert_preserves_record_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    store
        .upsert("Spice1", &record(1, "Paprika", 100, 1.0, 1.0).to_line())
        .unwrap();
    store
        .upsert("Spice2", &record(2, "Cumin", 200, 2.0, 2.0).to_line())
        .unwrap();
    store
        .upsert("Spice3", &record(3, "Salt", 300, 3.0, 3.0).to_line())
        .unwrap();

    // Rewrite the middle record, then add a new one
    store
        .upsert("Spice2", &record(2, "Cumin", 999, 2.5, 2.2).to_line())
        .unwrap();
    store
        .upsert("Spice4", &record(4, "Pepper", 400, 4.0, 4.0).to_line())
        .unwrap();

    let contents = std::fs::read_to_string(store.path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("Spice1"));
    assert!(lines[1].contains("Spice2"));
    assert!(lines[1].contains("ADC_Reading:999"));
    assert!(lines[2].contains("Spice3"));
    assert!(lines[3].contains("Spice4"));
}

#[test]
fn records_round_trip_through_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let originals = vec![
        record(1, "Paprika", 1450, 260.123456, 19.254321),
        record(2, "Cumin", 1300, 120.5, 8.5),
    ];
    for rec in &originals {
        store.upsert(&rec.location, &rec.to_line()).unwrap();
    }

    let loaded = store.load_records().unwrap();
    assert_eq!(loaded, originals);
}

#[test]
fn get_returns_record_by_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    store
        .upsert("Spice1", &record(1, "Paprika", 100, 1.0, 1.0).to_line())
        .unwrap();

    let found = store.get("Spice1").unwrap().unwrap();
    assert_eq!(found.name, "Paprika");
    assert!(store.get("Spice9").unwrap().is_none());
}

#[test]
fn malformed_lines_are_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    store
        .upsert("Spice1", &record(1, "Paprika", 100, 1.0, 1.0).to_line())
        .unwrap();
    // Corrupt the file with a stray line
    let mut contents = std::fs::read_to_string(store.path()).unwrap();
    contents.push_str("this is not a record\n");
    std::fs::write(store.path(), contents).unwrap();

    let loaded = store.load_records().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "Paprika");
}

#[test]
fn scratch_file_survives_reuse_across_upserts() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    // Grow then shrink the file repeatedly; the scratch file is truncated
    // and reused on every call
    for i in 0..5 {
        let name = if i % 2 == 0 { "LongSpiceName" } else { "S" };
        store
            .upsert("Spice1", &record(1, name, i, i as f64, 0.0).to_line())
            .unwrap();
    }

    let contents = std::fs::read_to_string(store.path()).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains("ADC_Reading:4"));
}
