//! SQLite-backed [`VectorStore`] implementation.
//!
//! Collections are rows of the `collections` table; their records live
//! in `records`, keyed by `(collection, id)`. Embeddings are stored as
//! little-endian `f32` BLOBs and ranked in process on every query, which
//! is adequate for the small per-topic corpora this tool indexes.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use copilot_docs_core::embedding::{blob_to_vec, vec_to_blob};
use copilot_docs_core::models::ChunkMetadata;
use copilot_docs_core::store::{
    nearest, validate_add, validate_dims, Collection, DistanceMetric, QueryResult, StoredRecord, VectorStore,
};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`VectorStore`] trait.
///
/// Expects the schema from [`crate::migrate::create_schema`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Connect to the configured database and make sure the schema exists.
pub async fn open(config: &Config) -> Result<SqliteStore> {
    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;
    Ok(SqliteStore::new(pool))
}

/// One collection of a [`SqliteStore`].
pub struct SqliteCollection {
    pool: SqlitePool,
    name: String,
    metric: DistanceMetric,
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn get_or_create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
    ) -> Result<Arc<dyn Collection>> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT OR IGNORE INTO collections (name, metric, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(metric.as_str())
            .bind(now)
            .execute(&self.pool)
            .await?;

        let stored: String = sqlx::query_scalar("SELECT metric FROM collections WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        let stored_metric: DistanceMetric = stored
            .parse()
            .with_context(|| format!("Collection '{}' has an invalid metric", name))?;
        if stored_metric != metric {
            debug!(collection = name, requested = %metric, stored = %stored_metric, "keeping existing collection metric");
        }

        Ok(Arc::new(SqliteCollection {
            pool: self.pool.clone(),
            name: name.to_string(),
            metric: stored_metric,
        }))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM collections ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}

#[async_trait]
impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn add(
        &self,
        ids: &[String],
        documents: &[String],
        embeddings: &[Vec<f32>],
        metadatas: &[ChunkMetadata],
    ) -> Result<()> {
        validate_add(ids, documents, embeddings, metadatas)?;

        let mut tx = self.pool.begin().await?;

        let existing_bytes: Option<i64> =
            sqlx::query_scalar("SELECT LENGTH(embedding) FROM records WHERE collection = ? LIMIT 1")
                .bind(&self.name)
                .fetch_optional(&mut *tx)
                .await?;
        validate_dims(
            existing_bytes.map(|b| b as usize / std::mem::size_of::<f32>()),
            embeddings,
        )?;

        let mut seq: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(seq) + 1, 0) FROM records WHERE collection = ?")
                .bind(&self.name)
                .fetch_one(&mut *tx)
                .await?;

        let mut skipped = 0usize;
        for (i, id) in ids.iter().enumerate() {
            let metadata = serde_json::to_string(&metadatas[i])?;
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO records (collection, id, document, embedding, metadata, seq)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&self.name)
            .bind(id)
            .bind(&documents[i])
            .bind(vec_to_blob(&embeddings[i]))
            .bind(metadata)
            .bind(seq)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                skipped += 1;
            } else {
                seq += 1;
            }
        }

        tx.commit().await?;

        if skipped > 0 {
            debug!(collection = %self.name, skipped, "add skipped existing ids");
        }
        Ok(())
    }

    async fn query(&self, query_embeddings: &[Vec<f32>], n_results: usize) -> Result<QueryResult> {
        let rows = sqlx::query(
            r#"
            SELECT id, document, embedding, metadata
            FROM records
            WHERE collection = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata");
            let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
                .with_context(|| format!("Invalid metadata for record '{}'", id))?;
            records.push(StoredRecord {
                id,
                document: row.get("document"),
                embedding: blob_to_vec(&blob),
                metadata,
            });
        }

        let mut result = QueryResult::default();
        for q in query_embeddings {
            result.push(nearest(self.metric, &records, q, n_results)?);
        }
        Ok(result)
    }
}
