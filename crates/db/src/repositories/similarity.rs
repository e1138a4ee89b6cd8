use async_trait::async_trait;
use sqlx::Row;
use tokio::sync::OnceCell;

use kindred_core::domain::product::ProductId;
use kindred_core::domain::similarity::SimilarityEdge;
use kindred_core::store::{SimilarityStore, StoreError};

use crate::DbPool;

/// One row per directed edge. The composite primary key enforces edge
/// uniqueness, and the covering index serves the read path's
/// score-descending scan without a sort step.
const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS product_similarity (
    product_id INTEGER NOT NULL,
    similar_product_id INTEGER NOT NULL,
    similarity_score REAL NOT NULL,
    PRIMARY KEY (product_id, similar_product_id)
)";

const CREATE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_product_similarity_read
    ON product_similarity (product_id, similarity_score DESC, similar_product_id ASC)";

/// SQLite-backed edge store. The schema is created lazily on first use
/// rather than through an explicit migration step, so a fresh database
/// file works out of the box for both the writer and the reader.
pub struct SqlSimilarityStore {
    pool: DbPool,
    schema: OnceCell<()>,
}

impl SqlSimilarityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, schema: OnceCell::new() }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::Schema(e.to_string()))?;
                sqlx::query(CREATE_INDEX)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::Schema(e.to_string()))?;
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

#[async_trait]
impl SimilarityStore for SqlSimilarityStore {
    /// Transactional delete-then-insert: readers never observe a partial
    /// edge set for a product.
    async fn replace(
        &self,
        product_id: ProductId,
        edges: &[SimilarityEdge],
    ) -> Result<(), StoreError> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("DELETE FROM product_similarity WHERE product_id = ?")
            .bind(product_id.0 as i64)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        for edge in edges {
            sqlx::query(
                "INSERT INTO product_similarity (product_id, similar_product_id, similarity_score)
                 VALUES (?, ?, ?)",
            )
            .bind(edge.product_id.0 as i64)
            .bind(edge.similar_product_id.0 as i64)
            .bind(edge.score)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)
    }

    async fn truncate_all(&self) -> Result<(), StoreError> {
        self.ensure_schema().await?;

        sqlx::query("DELETE FROM product_similarity")
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn top_n(
        &self,
        product_id: ProductId,
        limit: usize,
    ) -> Result<Vec<SimilarityEdge>, StoreError> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            "SELECT similar_product_id, similarity_score
             FROM product_similarity
             WHERE product_id = ?
             ORDER BY similarity_score DESC, similar_product_id ASC
             LIMIT ?",
        )
        .bind(product_id.0 as i64)
        .bind(limit.min(i64::MAX as usize) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                let similar_product_id: i64 =
                    row.try_get("similar_product_id").map_err(backend)?;
                let score: f64 = row.try_get("similarity_score").map_err(backend)?;
                Ok(SimilarityEdge::new(
                    product_id,
                    ProductId(similar_product_id as u64),
                    score,
                ))
            })
            .collect()
    }

    async fn source_ids(&self) -> Result<Vec<ProductId>, StoreError> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            "SELECT DISTINCT product_id FROM product_similarity ORDER BY product_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("product_id").map_err(backend)?;
                Ok(ProductId(id as u64))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use kindred_core::domain::product::ProductId;
    use kindred_core::domain::similarity::SimilarityEdge;
    use kindred_core::store::SimilarityStore;

    use super::SqlSimilarityStore;
    use crate::connect_with_settings;

    async fn store() -> SqlSimilarityStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        SqlSimilarityStore::new(pool)
    }

    fn edge(from: u64, to: u64, score: f64) -> SimilarityEdge {
        SimilarityEdge::new(ProductId(from), ProductId(to), score)
    }

    #[tokio::test]
    async fn fresh_database_reads_empty_without_migrations() {
        let store = store().await;
        // First touch creates the schema.
        let edges = store.top_n(ProductId(1), 10).await.expect("top_n");
        assert!(edges.is_empty());
        assert!(store.source_ids().await.expect("source_ids").is_empty());
    }

    #[tokio::test]
    async fn replace_then_top_n_returns_score_descending() {
        let store = store().await;
        store
            .replace(
                ProductId(1),
                &[edge(1, 5, 0.5), edge(1, 2, 1.0), edge(1, 9, 0.8)],
            )
            .await
            .expect("replace");

        let edges = store.top_n(ProductId(1), 10).await.expect("top_n");
        let ids: Vec<u64> = edges.iter().map(|e| e.similar_product_id.0).collect();
        assert_eq!(ids, vec![2, 9, 5]);
        assert_eq!(edges[0].score, 1.0);
    }

    #[tokio::test]
    async fn equal_scores_tie_break_on_id_ascending() {
        let store = store().await;
        store
            .replace(
                ProductId(1),
                &[edge(1, 7, 0.5), edge(1, 3, 0.5), edge(1, 5, 0.5)],
            )
            .await
            .expect("replace");

        let edges = store.top_n(ProductId(1), 10).await.expect("top_n");
        let ids: Vec<u64> = edges.iter().map(|e| e.similar_product_id.0).collect();
        assert_eq!(ids, vec![3, 5, 7]);
    }

    #[tokio::test]
    async fn top_n_applies_the_limit() {
        let store = store().await;
        store
            .replace(
                ProductId(1),
                &[edge(1, 2, 1.0), edge(1, 3, 0.9), edge(1, 4, 0.8)],
            )
            .await
            .expect("replace");

        let edges = store.top_n(ProductId(1), 2).await.expect("top_n");
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[1].similar_product_id, ProductId(3));
    }

    #[tokio::test]
    async fn replace_is_a_full_overwrite() {
        let store = store().await;
        store
            .replace(ProductId(1), &[edge(1, 2, 1.0), edge(1, 3, 0.8)])
            .await
            .expect("first replace");
        store.replace(ProductId(1), &[edge(1, 4, 0.5)]).await.expect("second replace");

        let edges = store.top_n(ProductId(1), 10).await.expect("top_n");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].similar_product_id, ProductId(4));
    }

    #[tokio::test]
    async fn replace_with_empty_slice_clears_the_product() {
        let store = store().await;
        store.replace(ProductId(1), &[edge(1, 2, 1.0)]).await.expect("seed");
        store.replace(ProductId(1), &[]).await.expect("clear");

        assert!(store.top_n(ProductId(1), 10).await.expect("top_n").is_empty());
    }

    #[tokio::test]
    async fn truncate_clears_every_source() {
        let store = store().await;
        store.replace(ProductId(1), &[edge(1, 2, 1.0)]).await.expect("seed 1");
        store.replace(ProductId(2), &[edge(2, 1, 1.0)]).await.expect("seed 2");

        store.truncate_all().await.expect("truncate");
        assert!(store.source_ids().await.expect("source_ids").is_empty());
    }

    #[tokio::test]
    async fn source_ids_are_distinct_and_sorted() {
        let store = store().await;
        store.replace(ProductId(9), &[edge(9, 1, 1.0), edge(9, 2, 0.8)]).await.expect("seed 9");
        store.replace(ProductId(3), &[edge(3, 1, 1.0)]).await.expect("seed 3");

        let sources = store.source_ids().await.expect("source_ids");
        assert_eq!(sources, vec![ProductId(3), ProductId(9)]);
    }
}
