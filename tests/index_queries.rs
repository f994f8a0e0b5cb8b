//! Direct index access through the Database API: find_by_index and
//! friends, index density, and the typed error kinds.

mod common;

use common::{post_record, test_db, user_record, PostExtractor, UserExtractor};
use flatsql::{Database, EngineError, Value};

#[test]
fn find_by_index_returns_matching_records() {
    let mut db = test_db();
    db.ingest_one(&user_record(42, "DirectTest", "direct@test.com", 33))
        .unwrap();

    let records = db
        .find_by_index("User", "id", &Value::Int32(42))
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].header.sequence, 1);

    let record = db
        .find_one_by_index("User", "id", &Value::Int32(42))
        .unwrap()
        .expect("record SHOULD be found");
    assert_eq!(record.header.file_id.as_bytes(), b"USER");

    assert!(db
        .find_one_by_index("User", "id", &Value::Int32(43))
        .unwrap()
        .is_none());
}

#[test]
fn find_raw_by_index_returns_the_stored_bytes_unchanged() {
    let mut db = test_db();
    let payload = user_record(7, "Raw", "raw@test.com", 21);
    db.ingest_one(&payload).unwrap();

    let raw = db
        .find_raw_by_index("User", "id", &Value::Int32(7))
        .unwrap()
        .expect("raw lookup SHOULD hit");
    assert_eq!(raw.data, payload.as_slice());
    assert_eq!(raw.sequence, 1);
    assert_eq!(raw.offset, 0);
}

#[test]
fn string_keyed_index_supports_point_lookup() {
    let mut db = test_db();
    for i in 0..100 {
        let email = format!("user{}@example.com", i);
        db.ingest_one(&user_record(i, "n", &email, 20)).unwrap();
    }

    let records = db
        .find_by_index("User", "email", &Value::Str("user63@example.com".into()))
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].header.sequence, 64);
}

#[test]
fn non_unique_index_is_dense_and_ordered_by_sequence() {
    let mut db = test_db();
    // five posts per user, interleaved across users
    for round in 0..5 {
        for user in 0..10 {
            let id = user * 5 + round;
            db.ingest_one(&post_record(id, user, "t")).unwrap();
        }
    }

    for user in 0..10 {
        let records = db
            .find_by_index("Post", "user_id", &Value::Int32(user))
            .unwrap();
        assert_eq!(
            records.len(),
            5,
            "user {} SHOULD have exactly five indexed posts",
            user
        );
        let sequences: Vec<u64> = records.iter().map(|r| r.header.sequence).collect();
        let mut sorted = sequences.clone();
        sorted.sort_unstable();
        assert_eq!(sequences, sorted);
    }
}

#[test]
fn iterate_all_visits_records_in_insertion_order() {
    let mut db = test_db();
    for i in 0..50 {
        db.ingest_one(&user_record(i, "iter", "i@x.io", i)).unwrap();
    }

    let mut sequences = Vec::new();
    let visited = db
        .iterate_all("User", |record| {
            sequences.push(record.sequence);
            true
        })
        .unwrap();
    assert_eq!(visited, 50);
    assert_eq!(sequences, (1..=50).collect::<Vec<u64>>());

    // early halt stops the walk
    let mut count = 0;
    db.iterate_all("User", |_| {
        count += 1;
        count < 10
    })
    .unwrap();
    assert_eq!(count, 10);
}

#[test]
fn unindexed_column_lookup_fails_with_the_typed_kind() {
    let db = test_db();
    let err = db
        .find_by_index("User", "name", &Value::Str("Alice".into()))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::ColumnNotIndexed { .. })
    ));
}

#[test]
fn unknown_table_fails_with_the_typed_kind() {
    let db = test_db();
    let err = db
        .find_by_index("Missing", "id", &Value::Int32(1))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::TableNotFound(name)) if name == "Missing"
    ));

    let err = db.iterate_all("Nope", |_| true).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::TableNotFound(_))
    ));
}

#[test]
fn index_entry_count_matches_extraction_for_every_key() {
    // the invariant: |find_by_index(k)| equals the number of routed records
    // whose extracted column equals k
    let mut db = test_db();
    let keys: Vec<i32> = (0..200).map(|i| (i * 7) % 13).collect();
    for (i, &k) in keys.iter().enumerate() {
        db.ingest_one(&user_record(i as i32, "u", "u@x.io", k)).unwrap();
    }

    for key in 0..13 {
        let expected = keys.iter().filter(|&&k| k == key).count();
        let got = db
            .find_by_index("User", "age", &Value::Int32(key))
            .unwrap()
            .len();
        assert_eq!(got, expected, "age {} cardinality", key);
    }
}

#[test]
fn late_extractor_registration_serves_scans_but_not_indexes() {
    let mut db = Database::from_schema(common::SCHEMA, "late").unwrap();
    db.register_file_id("POST", "Post").unwrap();
    db.ingest_one(&post_record(1, 9, "early")).unwrap();

    // extractor arrives after ingest: the record is scannable...
    db.set_field_extractor("Post", Box::new(PostExtractor)).unwrap();
    let result = db.query("SELECT title FROM Post").unwrap();
    assert_eq!(result.rows, vec![vec![Value::Str("early".into())]]);

    // ...but was never indexed
    let records = db
        .find_by_index("Post", "user_id", &Value::Int32(9))
        .unwrap();
    assert!(records.is_empty());

    // records ingested after registration are indexed
    db.set_field_extractor("User", Box::new(UserExtractor)).unwrap();
    db.ingest_one(&post_record(2, 9, "late")).unwrap();
    let records = db
        .find_by_index("Post", "user_id", &Value::Int32(9))
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].header.sequence, 2);
}
