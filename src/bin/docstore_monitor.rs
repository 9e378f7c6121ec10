//! docstore-monitor: read counting walkthrough
//!
//! Instruments an in-memory store, drives every read entry point once
//! and prints the collected counts as JSON.
//!
//! ## Configuration
//! ```yaml
//! # docstore-monitoring.yaml
//! show_logs: true
//! ```
//!
//! Or via environment: `DOCSTORE_MONITORING__SHOW_LOGS=true`.
//! Log level is read from `DOCSTORE_MONITORING_LOG` (default `info`).

use futures::StreamExt;
use serde_json::json;
use tracing::info;

use docstore_monitoring::storage::MockDocumentStore;
use docstore_monitoring::utils::bootstrap::init_tracing;
use docstore_monitoring::{DocumentReference, DocumentStore, Monitoring, Query, Source};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let monitoring = Monitoring::from_config(config_path.as_deref())?;

    let client = MockDocumentStore::new();
    client
        .set_document("users/ada", json!({"name": "Ada", "role": "admin"}))
        .await;
    client
        .set_document("users/grace", json!({"name": "Grace", "role": "admin"}))
        .await;
    client
        .set_document("users/linus", json!({"name": "Linus", "role": "member"}))
        .await;

    let store = monitoring.instrument(client)?;
    let ada = DocumentReference::new("users/ada");
    let admins = Query::collection("users").where_eq("role", "admin");

    store.get_document(&ada).await?;
    store.get_document_from(&ada, Source::Cache).await?;
    store.get_documents(&admins).await?;
    store.get_documents_from(&admins, Source::Cache).await?;

    let mut doc_listener = store.listen_document(&ada);
    let mut doc_meta_listener = store.listen_document_with_metadata(&ada, true);
    let mut query_listener = store.listen_query(&admins);
    let mut query_meta_listener = store.listen_query_with_metadata(&admins, true);

    doc_listener.updates.next().await.transpose()?;
    doc_meta_listener.updates.next().await.transpose()?;
    doc_meta_listener.updates.next().await.transpose()?;
    query_listener.updates.next().await.transpose()?;
    query_meta_listener.updates.next().await.transpose()?;
    query_meta_listener.updates.next().await.transpose()?;

    for listener in [&doc_listener, &doc_meta_listener] {
        listener.remove();
    }
    for listener in [&query_listener, &query_meta_listener] {
        listener.remove();
    }

    let snapshot = monitoring.snapshot();
    info!(
        document_reads = snapshot.documents.count_from_server + snapshot.documents.count_from_cache,
        collection_reads =
            snapshot.collections.count_from_server + snapshot.collections.count_from_cache,
        "docstore-monitor finished"
    );
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}
