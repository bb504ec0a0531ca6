//! Registry, classifier and fingerprint integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use db_ripple::classify::{classify_read, classify_write, Classification, TableClassifier};
use db_ripple::fingerprint::fingerprint;
use db_ripple::notify::{listener, Delivery, ListenerRegistry};

#[test]
fn test_pinned_fingerprints() {
    assert_eq!(fingerprint("SELECT id FROM test;"), -1631577509);
    assert_eq!(
        fingerprint(
            "DROP TABLE IF EXISTS test;\n\
             CREATE TABLE test (id INTEGER, age INTEGER, name TEXT);\
             INSERT INTO test VALUES (1, 18, 'Liu');\
             INSERT INTO test VALUES (2, 20, 'Paul');\
             SELECT id FROM test;\
             SELECT age,name FROM test WHERE id=1"
        ),
        -1367929158
    );
}

#[test]
fn test_read_and_write_never_both_match() {
    let tables = ["test", "books", "authors"];
    let queries = [
        "SELECT * FROM test",
        "INSERT INTO test VALUES (1,2,3);",
        "SELECT b.id FROM books b INNER JOIN authors a ON b.author_id=a.id",
        "INSERT INTO books SELECT * FROM authors",
        "UPDATE test SET id = 1",
    ];

    for query in queries {
        let read = classify_read(query, &tables);
        let write = classify_write(query, &tables);
        assert!(
            read.is_none() || write.is_none(),
            "both matched for {query:?}"
        );
    }
}

#[test]
fn test_multi_line_left_joins() {
    let classifier = TableClassifier::new(&["orders", "customers", "items"]).unwrap();
    let query = "SELECT o.id, c.name, i.sku\n\
                 FROM\norders o\n\
                 LEFT JOIN customers c ON c.id = o.customer_id\n\
                 LEFT JOIN\nitems i ON i.order_id = o.id\n\
                 LEFT JOIN customers c2 ON c2.id = o.referrer_id";

    assert_eq!(
        classifier.classify(query),
        Classification::Read {
            tables: vec!["orders".into(), "customers".into(), "items".into()]
        }
    );
}

#[test]
fn test_registry_is_shareable_across_threads() {
    let registry = Arc::new(ListenerRegistry::new());
    let hits = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&hits);
    let l = listener(move |_| *counter.lock().unwrap() += 1);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let l = Arc::clone(&l);
            std::thread::spawn(move || registry.register("t", &l))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    registry.trigger("t", 1, Delivery::Inline);
    assert_eq!(*hits.lock().unwrap(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_detached_trigger_does_not_block_caller() {
    let registry = ListenerRegistry::new();
    let (tx, rx) = std::sync::mpsc::channel();
    let gate = Arc::new(Mutex::new(rx));
    let done = Arc::new(Mutex::new(false));

    let flag = Arc::clone(&done);
    let slow = listener(move |_| {
        // Blocks until the test releases it.
        let _ = gate.lock().unwrap().recv_timeout(Duration::from_secs(5));
        *flag.lock().unwrap() = true;
    });
    registry.register("t", &slow);

    let notification = registry.trigger("t", 42, Delivery::Detached).unwrap();
    assert!(!*done.lock().unwrap());

    tx.send(()).unwrap();
    let report = notification.wait().await;
    assert_eq!(report.invoked, 1);
    assert!(*done.lock().unwrap());
}
