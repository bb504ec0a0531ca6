//! Schema loading and image round-trip integration tests.

use std::sync::Arc;

use db_ripple::db::{BindParams, ScalarFunction, Value};
use db_ripple::pipeline::ReactiveDb;
use db_ripple::schema::{CompileMode, Schema, SchemaSource};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

const JSON_SCHEMA: &str = r#"{
    "test": {
        "fields": {"id": "INTEGER", "age": "INTEGER", "name": "TEXT"},
        "values": [
            {"id": 1, "age": 10, "name": "Ling"},
            {"id": 2, "age": 18, "name": "Paul"}
        ]
    },
    "scores": {
        "fields": {"id": "INTEGER", "score": "INTEGER"},
        "rows": [{"id": 1, "score": {"func": "plusFive(10)"}}]
    }
}"#;

fn plus_five() -> ScalarFunction {
    Arc::new(|args: &[Value]| {
        args.first()
            .and_then(Value::as_i64)
            .map(|n| Value::Integer(n + 5))
            .ok_or_else(|| "plusFive expects an integer".to_string())
    })
}

#[tokio::test]
async fn test_json_schema_file_with_function_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schema.json");
    std::fs::write(&path, JSON_SCHEMA).unwrap();

    let source = SchemaSource::load(Some(&path), None).unwrap();
    assert_eq!(source.mode(), CompileMode::Fresh);

    let db = ReactiveDb::default();
    db.initialize(source, vec![("plusFive".to_string(), plus_five())])
        .await
        .unwrap();

    assert_eq!(db.tables(), vec!["test", "scores"]);
    let results = db
        .execute("SELECT score FROM scores", &BindParams::None)
        .await
        .unwrap();
    assert_eq!(results[0].rows, vec![vec![Value::Integer(15)]]);
}

#[tokio::test]
async fn test_toml_schema_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schema.toml");
    std::fs::write(
        &path,
        r#"
[books.fields]
id = "INTEGER"
title = "TEXT"

[[books.rows]]
id = 1
title = "Dune"
"#,
    )
    .unwrap();

    let schema = Schema::load(&path).unwrap();
    let compiled = SchemaSource::new(schema).compile().unwrap();

    assert_eq!(
        compiled.script,
        "CREATE TABLE books (id INTEGER, title TEXT);INSERT INTO books VALUES (1, 'Dune');"
    );
}

#[tokio::test]
async fn test_exported_image_reopens_cautiously() {
    let schema = Schema::from_json_str(
        r#"{"test": {"fields": {"id": "INTEGER", "name": "TEXT"},
            "rows": [{"id": 1, "name": "Ling"}]}}"#,
    )
    .unwrap();

    let first = ReactiveDb::default();
    first
        .initialize(SchemaSource::new(schema.clone()), Vec::new())
        .await
        .unwrap();
    first
        .execute("INSERT INTO test VALUES (2, 'Paul')", &BindParams::None)
        .await
        .unwrap();
    let image = first.export().await.unwrap();
    first.destroy().await.unwrap();
    assert!(!image.is_empty());

    // Re-applying the schema to the image must not fail on existing tables.
    let source = SchemaSource::new(Schema::from_json_str(
        r#"{"test": {"fields": {"id": "INTEGER", "name": "TEXT"}}}"#,
    )
    .unwrap())
    .with_data(image);
    assert_eq!(source.mode(), CompileMode::Cautious);
    assert!(source
        .compile()
        .unwrap()
        .script
        .starts_with("CREATE TABLE IF NOT EXISTS test"));

    let second = ReactiveDb::default();
    second.initialize(source, Vec::new()).await.unwrap();

    let results = second
        .execute("SELECT name FROM test ORDER BY id", &BindParams::None)
        .await
        .unwrap();
    assert_eq!(
        results[0].rows,
        vec![
            vec![Value::Text("Ling".into())],
            vec![Value::Text("Paul".into())]
        ]
    );
}

#[tokio::test]
async fn test_image_file_round_trip_through_load() {
    let dir = tempdir().unwrap();
    let schema_path = dir.path().join("schema.json");
    let data_path = dir.path().join("seed.db");
    std::fs::write(
        &schema_path,
        r#"{"notes": {"fields": {"id": "INTEGER", "body": "TEXT"}}}"#,
    )
    .unwrap();

    let db = ReactiveDb::default();
    db.initialize(SchemaSource::load(Some(&schema_path), None).unwrap(), Vec::new())
        .await
        .unwrap();
    db.execute("INSERT INTO notes VALUES (7, 'hi')", &BindParams::None)
        .await
        .unwrap();
    std::fs::write(&data_path, db.export().await.unwrap()).unwrap();

    let source = SchemaSource::load(Some(&schema_path), Some(&data_path)).unwrap();
    let reopened = ReactiveDb::default();
    reopened.initialize(source, Vec::new()).await.unwrap();

    let results = reopened
        .execute("SELECT id FROM notes", &BindParams::None)
        .await
        .unwrap();
    assert_eq!(results[0].rows, vec![vec![Value::Integer(7)]]);
}

#[test]
fn test_compile_is_idempotent() {
    let schema = Schema::from_json_str(JSON_SCHEMA).unwrap();
    let source = SchemaSource::new(schema);

    assert_eq!(source.compile().unwrap(), source.compile().unwrap());
}

#[tokio::test]
async fn test_reinitialize_keeps_listeners() {
    let db = ReactiveDb::default();
    db.initialize(SchemaSource::new(Schema::from_json_str(JSON_SCHEMA).unwrap()), vec![(
        "plusFive".to_string(),
        plus_five(),
    )])
    .await
    .unwrap();
    let l = db_ripple::listener(|_| {});
    db.query(&l, "SELECT id FROM test", &BindParams::None)
        .await
        .unwrap();

    db.initialize(SchemaSource::default(), Vec::new())
        .await
        .unwrap();

    assert!(db.tables().is_empty());
    assert_eq!(db.registry().len("test"), 1);
}
