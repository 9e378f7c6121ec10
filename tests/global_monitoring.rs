//! Behavior of the process-wide monitoring context.

use serial_test::serial;

use docstore_monitoring::storage::MockDocumentStore;
use docstore_monitoring::{DocumentReference, DocumentStore, Monitoring, MonitoringError, Options};

#[test]
#[serial]
fn test_global_is_a_single_instance() {
    let first = Monitoring::global() as *const Monitoring;
    let second = Monitoring::monitoring(None) as *const Monitoring;

    assert_eq!(first, second);
}

#[test]
#[serial]
fn test_reading_options_never_changes_them() {
    Monitoring::monitoring(Some(Options::with_logs()));

    for _ in 0..3 {
        assert_eq!(Monitoring::monitoring(None).options(), Options::with_logs());
    }

    Monitoring::monitoring(Some(Options::default()));
    assert_eq!(Monitoring::global().options(), Options::default());
}

#[tokio::test]
#[serial]
async fn test_global_counts_reads_from_every_client() {
    let monitoring = Monitoring::global();
    let before = monitoring.document_counts().count_from_server;

    let first = monitoring.instrument(MockDocumentStore::new()).unwrap();
    let second = monitoring.instrument(MockDocumentStore::new()).unwrap();
    first
        .get_document(&DocumentReference::new("global/1"))
        .await
        .unwrap();
    second
        .get_document(&DocumentReference::new("global/2"))
        .await
        .unwrap();

    assert_eq!(monitoring.document_counts().count_from_server, before + 2);
}

#[test]
#[serial]
fn test_global_refuses_double_instrumentation() {
    let store = Monitoring::global()
        .instrument(MockDocumentStore::new())
        .unwrap();

    let result = Monitoring::global().instrument(store);

    assert!(matches!(result, Err(MonitoringError::AlreadyInstrumented)));
}
