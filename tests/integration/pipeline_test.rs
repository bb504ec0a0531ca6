//! Read and write pipeline integration tests.
//!
//! Every test builds its own context over a fresh in-memory SQLite engine.

use std::sync::{Arc, Mutex};

use db_ripple::db::{BindParams, QueryResult, ScalarFunction, Value};
use db_ripple::notify::{listener, Delivery, FixedClock, Listener};
use db_ripple::pipeline::{ReactiveDb, ReactiveOptions};
use db_ripple::schema::{RowValue, Schema, SchemaSource, SqlType, TableSchema};

const NOW: i64 = 1649577131008;

fn people() -> Schema {
    Schema::new().table(
        "test",
        TableSchema::new()
            .field("id", SqlType::Integer)
            .field("age", SqlType::Integer)
            .field("name", SqlType::Text)
            .row([
                ("id", RowValue::from(1)),
                ("age", RowValue::from(10)),
                ("name", RowValue::from("Ling")),
            ])
            .row([
                ("id", RowValue::from(2)),
                ("age", RowValue::from(18)),
                ("name", RowValue::from("Paul")),
            ]),
    )
}

async fn open(delivery: Delivery) -> ReactiveDb {
    let db = ReactiveDb::new(
        ReactiveOptions::default()
            .delivery(delivery)
            .clock(FixedClock(NOW)),
    );
    db.initialize(SchemaSource::new(people()), Vec::new())
        .await
        .unwrap();
    db
}

fn recording() -> (Listener, Arc<Mutex<Vec<i64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (listener(move |ts| sink.lock().unwrap().push(ts)), seen)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[tokio::test]
async fn test_execute_query_returns_seed_rows() {
    let db = open(Delivery::Inline).await;

    let results = db
        .execute_query("SELECT * FROM test", &BindParams::None)
        .await
        .unwrap();

    assert_eq!(
        results,
        vec![QueryResult::with_data(
            vec!["id".into(), "age".into(), "name".into()],
            vec![
                vec![Value::Integer(1), Value::Integer(10), text("Ling")],
                vec![Value::Integer(2), Value::Integer(18), text("Paul")],
            ],
        )]
    );
}

#[tokio::test]
async fn test_execute_query_with_named_params() {
    let db = open(Delivery::Inline).await;

    let results = db
        .execute_query(
            "SELECT id FROM test;SELECT age,name FROM test WHERE id=$id1",
            &BindParams::named([("$id1", 1), ("$id2", 2)]),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].rows,
        vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]
    );
    assert_eq!(results[1].columns, vec!["age", "name"]);
    assert_eq!(results[1].rows, vec![vec![Value::Integer(10), text("Ling")]]);
}

#[tokio::test]
async fn test_execute_query_missing_table_is_absent() {
    let db = ReactiveDb::default();
    db.initialize(SchemaSource::default(), Vec::new())
        .await
        .unwrap();

    assert!(db
        .execute_query("SELECT age,name FROM test", &BindParams::None)
        .await
        .is_none());
}

#[tokio::test]
async fn test_select_then_insert_notifies_reader() {
    let db = open(Delivery::Inline).await;
    let (reader, seen) = recording();

    let outcome = db
        .query(&reader, "SELECT name FROM test", &BindParams::None)
        .await
        .unwrap();
    assert_eq!(outcome.results[0].row_count(), 2);

    let outcome = db
        .insert(
            "INSERT INTO test VALUES ($id, :age, @name);",
            &BindParams::named([
                ("$id", Value::Integer(3)),
                (":age", Value::Integer(30)),
                ("@name", text("Ada")),
            ]),
        )
        .await
        .unwrap();
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.notification.unwrap().wait().await.invoked, 1);
    assert_eq!(*seen.lock().unwrap(), vec![NOW]);

    let results = db
        .execute_query("SELECT count(*) FROM test", &BindParams::None)
        .await
        .unwrap();
    assert_eq!(results[0].rows, vec![vec![Value::Integer(3)]]);
}

#[tokio::test]
async fn test_detached_delivery_reaches_listener() {
    let db = open(Delivery::Detached).await;
    let (reader, seen) = recording();
    db.query(&reader, "SELECT id FROM test", &BindParams::None)
        .await
        .unwrap();

    let outcome = db
        .insert("INSERT INTO test VALUES (3, 30, 'Ada')", &BindParams::None)
        .await
        .unwrap();

    let report = outcome.notification.unwrap().wait().await;
    assert_eq!(report.invoked, 1);
    assert_eq!(*seen.lock().unwrap(), vec![NOW]);
}

#[tokio::test]
async fn test_insert_pipeline_ignores_select() {
    let db = open(Delivery::Inline).await;
    let (reader, seen) = recording();
    db.query(&reader, "SELECT id FROM test", &BindParams::None)
        .await
        .unwrap();

    assert!(db
        .insert("SELECT id FROM test", &BindParams::None)
        .await
        .is_none());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_query_pipeline_insert_triggers_listeners() {
    let db = open(Delivery::Inline).await;
    let (reader, seen) = recording();
    db.query(&reader, "SELECT id FROM test", &BindParams::None)
        .await
        .unwrap();

    let (writer, writer_seen) = recording();
    let outcome = db
        .query(&writer, "INSERT INTO test VALUES (3, 30, 'Ada')", &BindParams::None)
        .await
        .unwrap();

    assert!(outcome.notification.is_some());
    assert_eq!(*seen.lock().unwrap(), vec![NOW]);
    assert!(writer_seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_insert_does_not_notify() {
    let db = open(Delivery::Inline).await;
    let (reader, seen) = recording();
    db.query(&reader, "SELECT id FROM test", &BindParams::None)
        .await
        .unwrap();

    assert!(db
        .insert("INSERT INTO test VALUES (1, 2)", &BindParams::None)
        .await
        .is_none());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_dropped_reader_is_skipped() {
    let db = open(Delivery::Inline).await;
    let (kept, seen) = recording();
    let (dropped, _) = recording();
    db.query(&dropped, "SELECT id FROM test", &BindParams::None)
        .await
        .unwrap();
    db.query(&kept, "SELECT name FROM test", &BindParams::None)
        .await
        .unwrap();
    drop(dropped);

    let report = db
        .insert("INSERT INTO test VALUES (3, 30, 'Ada')", &BindParams::None)
        .await
        .unwrap()
        .notification
        .unwrap()
        .wait()
        .await;

    assert_eq!(report.invoked, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(db.registry().len("test"), 2);
}

#[tokio::test]
async fn test_functions_are_available_to_seed_rows() {
    let minus: ScalarFunction = Arc::new(|args: &[Value]| {
        let n = args
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| "minus expects an integer".to_string())?;
        Ok(Value::Integer(-n))
    });

    let schema = Schema::new().table(
        "numbers",
        TableSchema::new()
            .field("id", SqlType::Integer)
            .field("value", SqlType::Integer)
            .row([
                ("id", RowValue::from(1)),
                ("value", RowValue::function("minus(10)")),
            ]),
    );

    let db = ReactiveDb::default();
    db.initialize(SchemaSource::new(schema), vec![("minus".to_string(), minus)])
        .await
        .unwrap();

    let results = db
        .execute("SELECT value FROM numbers WHERE id = 1", &BindParams::None)
        .await
        .unwrap();
    assert_eq!(results[0].rows, vec![vec![Value::Integer(-10)]]);
    assert_eq!(db.tables(), vec!["numbers"]);
}

#[tokio::test]
async fn test_destroy_then_query_is_absent() {
    let db = open(Delivery::Inline).await;
    let (reader, _) = recording();
    db.query(&reader, "SELECT id FROM test", &BindParams::None)
        .await
        .unwrap();

    db.destroy().await.unwrap();

    assert!(db
        .query(&reader, "SELECT id FROM test", &BindParams::None)
        .await
        .is_none());
    // Registration happens before execution, so the failed call still adds an entry.
    assert_eq!(db.registry().len("test"), 2);
}
