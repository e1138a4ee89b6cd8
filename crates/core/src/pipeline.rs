//! Batched, resumable recomputation of the similarity edge table.
//!
//! The pipeline is the error boundary for catalog-wide runs: per-product
//! failures are logged, counted, and skipped, while truncate/enumeration
//! failures abort the run. The incremental entry point re-raises instead,
//! because its caller (the catalog's save hook) may want to surface the
//! failure to a human editor.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::catalog::{Catalog, CatalogError};
use crate::domain::product::ProductId;
use crate::domain::similarity::ProductSummary;
use crate::selector::SimilarityStrategy;
use crate::store::{SimilarityStore, StoreError};

/// How many failure messages a report renders verbatim before collapsing
/// the rest into a count.
const ERROR_SAMPLE: usize = 3;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to truncate similarity store: {0}")]
    Truncate(#[source] StoreError),
    #[error("failed to enumerate published products: {0}")]
    Enumeration(#[source] CatalogError),
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("catalog failure while updating product {product_id}: {source}")]
    Catalog {
        product_id: ProductId,
        #[source]
        source: CatalogError,
    },
    #[error("store failure while updating product {product_id}: {source}")]
    Store {
        product_id: ProductId,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Fatal(#[from] PipelineError),
    #[error("batch {batch} failed on product {product_id}: {source}")]
    Product {
        batch: u64,
        product_id: ProductId,
        #[source]
        source: UpdateError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Outcome of a full synchronous recompute. Per-product failures do not
/// fail the run; they are surfaced here in aggregate.
#[derive(Clone, Debug, Serialize)]
pub struct RecomputeReport {
    pub status: RunStatus,
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RecomputeReport {
    /// "first few plus a count of the rest" rendering of the error list.
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let mut summary = self.errors.iter().take(ERROR_SAMPLE).cloned().collect::<Vec<_>>().join("; ");
        if self.errors.len() > ERROR_SAMPLE {
            summary.push_str(&format!("... and {} more errors", self.errors.len() - ERROR_SAMPLE));
        }
        Some(summary)
    }
}

/// Progress payload for one resumable batch step. The caller owns the
/// cursor: it supplies the next batch number, and restarting from batch 0
/// restarts the run (fresh truncation), it does not resume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchStep {
    pub processed: u64,
    pub total: u64,
    pub percentage: u8,
    pub complete: bool,
    pub product: Option<ProductSummary>,
}

/// Engine tunables, loaded from `[engine]` config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Target number of similar products stored per product.
    pub max_similar: usize,
    /// Chunk size for the full-recompute loop.
    pub batch_size: usize,
    /// Cache-flush cadence, in processed products.
    pub flush_every: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { max_similar: 12, batch_size: 20, flush_every: 10 }
    }
}

impl From<&crate::config::EngineConfig> for EngineSettings {
    fn from(config: &crate::config::EngineConfig) -> Self {
        Self {
            max_similar: config.max_similar,
            batch_size: config.batch_size,
            flush_every: config.flush_every,
        }
    }
}

pub struct RecomputePipeline {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn SimilarityStore>,
    strategy: Arc<dyn SimilarityStrategy>,
    settings: EngineSettings,
}

impl RecomputePipeline {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn SimilarityStore>,
        strategy: Arc<dyn SimilarityStrategy>,
        settings: EngineSettings,
    ) -> Self {
        Self { catalog, store, strategy, settings }
    }

    /// Truncate the store and recompute edges for every published product,
    /// in fixed-size chunks. Truncate and enumeration failures are fatal;
    /// everything per-product is skip-and-continue.
    pub async fn full_recompute(&self) -> Result<RecomputeReport, PipelineError> {
        let started_at = Utc::now();
        info!(
            event_name = "pipeline.full_recompute.start",
            strategy = self.strategy.name(),
            "starting full similarity recompute"
        );

        self.store.truncate_all().await.map_err(|source| {
            error!(
                event_name = "pipeline.full_recompute.truncate_failed",
                error = %source,
                "aborting run: could not truncate similarity store"
            );
            PipelineError::Truncate(source)
        })?;

        let ids = self.catalog.list_published_ids().await.map_err(|source| {
            error!(
                event_name = "pipeline.full_recompute.enumeration_failed",
                error = %source,
                "aborting run: could not enumerate published products"
            );
            PipelineError::Enumeration(source)
        })?;

        let total = ids.len();
        info!(event_name = "pipeline.full_recompute.enumerated", total, "enumerated catalog");

        let mut processed = 0usize;
        let mut skipped = 0usize;
        let mut errors: Vec<String> = Vec::new();
        let chunk_size = self.settings.batch_size.max(1);
        let flush_every = self.settings.flush_every.max(1);

        for chunk in ids.chunks(chunk_size) {
            for &product_id in chunk {
                match self.update_product(product_id).await {
                    Ok(true) => {
                        processed += 1;
                        if processed % flush_every == 0 {
                            self.catalog.flush_caches().await;
                            info!(
                                event_name = "pipeline.full_recompute.progress",
                                processed,
                                total,
                                "recompute progress"
                            );
                        }
                    }
                    Ok(false) => skipped += 1,
                    Err(source) => {
                        warn!(
                            event_name = "pipeline.full_recompute.product_failed",
                            product_id = product_id.0,
                            error = %source,
                            "skipping product after processing failure"
                        );
                        errors.push(format!("product {product_id}: {source}"));
                    }
                }
            }
            // Chunk boundary: per-product scratch from this chunk is gone,
            // keeping peak memory bounded regardless of catalog size.
        }

        self.catalog.flush_caches().await;

        let report = RecomputeReport {
            status: RunStatus::Completed,
            total,
            processed,
            skipped,
            errors,
            started_at,
            finished_at: Utc::now(),
        };

        if let Some(summary) = report.error_summary() {
            warn!(
                event_name = "pipeline.full_recompute.completed_with_errors",
                processed = report.processed,
                failed = report.errors.len(),
                errors = %summary,
                "full recompute completed with errors"
            );
        } else {
            info!(
                event_name = "pipeline.full_recompute.completed",
                processed = report.processed,
                skipped = report.skipped,
                total = report.total,
                "full recompute completed"
            );
        }

        Ok(report)
    }

    /// Recompute the outgoing edges of one product (catalog create/update
    /// hook). Returns `Ok(false)` when the product no longer resolves.
    /// Idempotent for an unchanged catalog, modulo the tiered strategy's
    /// documented sampling nondeterminism. Failures are logged and
    /// re-raised.
    pub async fn update_product(&self, product_id: ProductId) -> Result<bool, UpdateError> {
        let product = self
            .catalog
            .get_product(product_id)
            .await
            .map_err(|source| UpdateError::Catalog { product_id, source })
            .map_err(log_update_error)?;

        let Some(product) = product else {
            warn!(
                event_name = "pipeline.update.missing_product",
                product_id = product_id.0,
                "product not found in catalog, skipping"
            );
            return Ok(false);
        };

        let edges = self
            .strategy
            .select(self.catalog.as_ref(), &product, self.settings.max_similar)
            .await
            .map_err(|source| UpdateError::Catalog { product_id, source })
            .map_err(log_update_error)?;

        self.store
            .replace(product_id, &edges)
            .await
            .map_err(|source| UpdateError::Store { product_id, source })
            .map_err(log_update_error)?;

        debug!(
            event_name = "pipeline.update.replaced",
            product_id = product_id.0,
            edges = edges.len(),
            "replaced similarity edges"
        );
        Ok(true)
    }

    /// One unit of caller-driven recompute: batch N is the Nth published
    /// product in ascending id order. Batch 0 truncates the store first.
    /// A batch past the end reports completion. A per-product failure is an
    /// error for this step so the polling caller can retry or abort.
    pub async fn step(&self, batch: u64) -> Result<BatchStep, StepError> {
        if batch == 0 {
            self.store.truncate_all().await.map_err(PipelineError::Truncate)?;
            info!(
                event_name = "pipeline.step.truncated",
                "similarity store truncated for new batch run"
            );
        }

        let ids = self.catalog.list_published_ids().await.map_err(PipelineError::Enumeration)?;
        let total = ids.len() as u64;

        let Some(&product_id) = ids.get(batch as usize) else {
            info!(event_name = "pipeline.step.exhausted", batch, total, "no more products");
            return Ok(BatchStep {
                processed: total,
                total,
                percentage: 100,
                complete: true,
                product: None,
            });
        };

        self.update_product(product_id)
            .await
            .map_err(|source| StepError::Product { batch, product_id, source })?;

        let product = self.catalog.get_product(product_id).await.ok().flatten();
        let summary = product.as_ref().map(ProductSummary::from_product);
        self.catalog.flush_caches().await;

        let processed = batch + 1;
        let step = BatchStep {
            processed,
            total,
            percentage: percentage(processed, total),
            complete: processed >= total,
            product: summary,
        };
        info!(
            event_name = "pipeline.step.completed",
            batch,
            product_id = product_id.0,
            percentage = step.percentage,
            "batch step completed"
        );
        Ok(step)
    }
}

/// Server-tracked run over the batch-step protocol. The job owns the
/// cursor, so "what batch comes next" has a single source of truth instead
/// of trusting a polling caller to count correctly. The cursor advances
/// only on success; calling [`RecomputeJob::advance`] again after a failure
/// retries the same batch.
pub struct RecomputeJob {
    id: u64,
    pipeline: Arc<RecomputePipeline>,
    next_batch: AtomicU64,
}

impl RecomputeJob {
    pub fn new(pipeline: Arc<RecomputePipeline>) -> Self {
        let id = Utc::now().timestamp_millis().max(0) as u64;
        Self { id, pipeline, next_batch: AtomicU64::new(0) }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn next_batch(&self) -> u64 {
        self.next_batch.load(AtomicOrdering::Acquire)
    }

    pub async fn advance(&self) -> Result<BatchStep, StepError> {
        let batch = self.next_batch.load(AtomicOrdering::Acquire);
        let step = self.pipeline.step(batch).await?;
        self.next_batch.store(batch + 1, AtomicOrdering::Release);
        Ok(step)
    }
}

fn log_update_error(source: UpdateError) -> UpdateError {
    error!(
        event_name = "pipeline.update.failed",
        error = %source,
        "incremental similarity update failed"
    );
    source
}

fn percentage(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (processed as f64 / total as f64 * 100.0).round() as u64;
    pct.min(100) as u8
}
