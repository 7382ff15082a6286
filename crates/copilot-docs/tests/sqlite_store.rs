//! Vector store contract tests against the SQLite backend.

use std::path::Path;

use tempfile::TempDir;

use copilot_docs::config::{load_config, Config};
use copilot_docs::sqlite_store;
use copilot_docs_core::models::ChunkMetadata;
use copilot_docs_core::store::{DistanceMetric, VectorStore};

fn test_config(dir: &Path) -> Config {
    let path = dir.join("cdocs.toml");
    std::fs::write(
        &path,
        format!("[db]\npath = \"{}/db/cdocs.sqlite\"\n", dir.display()),
    )
    .unwrap();
    load_config(&path).unwrap()
}

fn meta(chunk: u32) -> ChunkMetadata {
    ChunkMetadata {
        source: "uniswap-guide".to_string(),
        page_number: 1,
        chunk_number: chunk,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_add_and_query_nearest() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store::open(&test_config(tmp.path())).await.unwrap();
    let col = store
        .get_or_create_collection("uniswap", DistanceMetric::L2)
        .await
        .unwrap();

    col.add(
        &strings(&["a", "b", "c"]),
        &strings(&["doc a", "doc b", "doc c"]),
        &[vec![0.0, 0.0], vec![3.0, 0.0], vec![1.0, 0.0]],
        &[meta(0), meta(1), meta(2)],
    )
    .await
    .unwrap();
    assert_eq!(col.count().await.unwrap(), 3);

    let hits = col
        .query(&[vec![0.0, 0.0]], 2)
        .await
        .unwrap()
        .into_first();
    assert_eq!(hits.ids, vec!["a", "c"]);
    assert_eq!(hits.documents, vec!["doc a", "doc c"]);
    assert_eq!(hits.distances, vec![0.0, 1.0]);
    assert_eq!(hits.metadatas[1], meta(2));
}

#[tokio::test]
async fn test_existing_ids_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store::open(&test_config(tmp.path())).await.unwrap();
    let col = store
        .get_or_create_collection("uniswap", DistanceMetric::Cosine)
        .await
        .unwrap();

    col.add(&strings(&["a"]), &strings(&["first"]), &[vec![1.0, 0.0]], &[meta(0)])
        .await
        .unwrap();
    col.add(
        &strings(&["a", "b"]),
        &strings(&["second", "other"]),
        &[vec![0.0, 1.0], vec![0.0, 1.0]],
        &[meta(0), meta(1)],
    )
    .await
    .unwrap();

    assert_eq!(col.count().await.unwrap(), 2);
    let hits = col.query(&[vec![1.0, 0.0]], 5).await.unwrap().into_first();
    assert_eq!(hits.ids[0], "a");
    assert_eq!(hits.documents[0], "first");
}

#[tokio::test]
async fn test_ties_keep_insertion_order() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store::open(&test_config(tmp.path())).await.unwrap();
    let col = store
        .get_or_create_collection("uniswap", DistanceMetric::Cosine)
        .await
        .unwrap();

    col.add(
        &strings(&["z", "y"]),
        &strings(&["z", "y"]),
        &[vec![1.0, 0.0], vec![2.0, 0.0]],
        &[meta(0), meta(1)],
    )
    .await
    .unwrap();
    col.add(&strings(&["x"]), &strings(&["x"]), &[vec![5.0, 0.0]], &[meta(2)])
        .await
        .unwrap();

    let hits = col.query(&[vec![1.0, 0.0]], 3).await.unwrap().into_first();
    assert_eq!(hits.ids, vec!["z", "y", "x"]);
}

#[tokio::test]
async fn test_metric_and_records_persist_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());

    {
        let store = sqlite_store::open(&config).await.unwrap();
        let col = store
            .get_or_create_collection("aave", DistanceMetric::Ip)
            .await
            .unwrap();
        col.add(&strings(&["a"]), &strings(&["doc"]), &[vec![1.0]], &[meta(0)])
            .await
            .unwrap();
        store.pool().close().await;
    }

    let store = sqlite_store::open(&config).await.unwrap();
    let col = store
        .get_or_create_collection("aave", DistanceMetric::Cosine)
        .await
        .unwrap();
    assert_eq!(col.metric(), DistanceMetric::Ip);
    assert_eq!(col.count().await.unwrap(), 1);
    assert_eq!(store.list_collections().await.unwrap(), vec!["aave"]);
}

#[tokio::test]
async fn test_empty_collection_query() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store::open(&test_config(tmp.path())).await.unwrap();
    let col = store
        .get_or_create_collection("empty", DistanceMetric::Cosine)
        .await
        .unwrap();

    assert_eq!(col.count().await.unwrap(), 0);
    let hits = col.query(&[vec![1.0, 0.0]], 10).await.unwrap().into_first();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_mismatched_add_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store::open(&test_config(tmp.path())).await.unwrap();
    let col = store
        .get_or_create_collection("uniswap", DistanceMetric::Cosine)
        .await
        .unwrap();

    let err = col
        .add(&strings(&["a", "b"]), &strings(&["only one"]), &[vec![1.0]], &[meta(0)])
        .await;
    assert!(err.is_err());
    assert_eq!(col.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_dimension_mismatch_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    {
        let store = sqlite_store::open(&config).await.unwrap();
        let col = store
            .get_or_create_collection("uniswap", DistanceMetric::Cosine)
            .await
            .unwrap();
        col.add(&strings(&["a"]), &strings(&["doc"]), &[vec![1.0, 0.0]], &[meta(0)])
            .await
            .unwrap();
        store.pool().close().await;
    }

    // Reopened as if the embedding model had been switched.
    let store = sqlite_store::open(&config).await.unwrap();
    let col = store
        .get_or_create_collection("uniswap", DistanceMetric::Cosine)
        .await
        .unwrap();

    let err = col.query(&[vec![1.0, 0.0, 0.0]], 5).await.unwrap_err();
    assert!(err.to_string().contains("dimensions"), "{}", err);

    let added = col
        .add(&strings(&["b"]), &strings(&["other"]), &[vec![0.0, 1.0, 0.0]], &[meta(1)])
        .await;
    assert!(added.is_err());
    assert_eq!(col.count().await.unwrap(), 1);
}
