//! Candidate selection strategies.
//!
//! Two strategies implement the same contract: a tiered fallback walk over
//! the category graph (the default deployment) and a full pairwise scan
//! scored by [`PairwiseScorer`]. Their score scales differ, so a deployment
//! picks exactly one; a full recompute rewrites the whole edge table, which
//! is what makes switching safe.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use async_trait::async_trait;

use crate::catalog::{Catalog, CatalogError};
use crate::domain::category::CategoryId;
use crate::domain::product::{Product, ProductId};
use crate::domain::similarity::SimilarityEdge;
use crate::sampling::{Sampler, ThreadRngSampler};
use crate::scoring::{ComparableFeatures, PairwiseScorer};

/// Score assigned to candidates found in the product's own categories.
pub const SAME_CATEGORY_SCORE: f64 = 1.0;
/// Score assigned to candidates drawn from parent categories.
pub const PARENT_CATEGORY_SCORE: f64 = 0.8;
/// Score assigned to random catalog fill.
pub const CATALOG_FILL_SCORE: f64 = 0.5;

/// A candidate-selection policy. Output is deduplicated, excludes the
/// product itself, has non-increasing scores, and is at most `max_count`
/// long.
#[async_trait]
pub trait SimilarityStrategy: Send + Sync {
    async fn select(
        &self,
        catalog: &dyn Catalog,
        product: &Product,
        max_count: usize,
    ) -> Result<Vec<SimilarityEdge>, CatalogError>;

    fn name(&self) -> &'static str;
}

/// Tiered fallback selection: same category (1.0), then parent categories
/// (0.8), then random catalog fill (0.5). Each tier is only consulted while
/// the running count is below `max_count`.
///
/// A product with no categories returns an empty result: the tiered
/// strategy has no basis to operate, and guaranteed coverage is a job for
/// the pairwise strategy instead.
pub struct TieredSelector {
    sampler: Box<dyn Sampler>,
}

impl TieredSelector {
    pub fn new() -> Self {
        Self { sampler: Box::new(ThreadRngSampler) }
    }

    pub fn with_sampler(sampler: Box<dyn Sampler>) -> Self {
        Self { sampler }
    }

    fn take(
        &self,
        pool: Vec<ProductId>,
        score: f64,
        product_id: ProductId,
        chosen: &mut HashSet<ProductId>,
        selected: &mut Vec<SimilarityEdge>,
        max_count: usize,
    ) {
        let remaining = max_count.saturating_sub(selected.len());
        if remaining == 0 {
            return;
        }
        let pool: Vec<ProductId> = pool.into_iter().filter(|id| !chosen.contains(id)).collect();
        for id in self.sampler.draw(pool, remaining) {
            chosen.insert(id);
            selected.push(SimilarityEdge::new(product_id, id, score));
        }
    }
}

impl Default for TieredSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimilarityStrategy for TieredSelector {
    async fn select(
        &self,
        catalog: &dyn Catalog,
        product: &Product,
        max_count: usize,
    ) -> Result<Vec<SimilarityEdge>, CatalogError> {
        if product.category_ids.is_empty() {
            tracing::debug!(
                event_name = "selector.no_categories",
                product_id = product.id.0,
                "product has no categories, returning empty candidate set"
            );
            return Ok(Vec::new());
        }

        let mut selected: Vec<SimilarityEdge> = Vec::new();
        let mut chosen: HashSet<ProductId> = HashSet::new();
        chosen.insert(product.id);

        for category in &product.category_ids {
            if selected.len() >= max_count {
                break;
            }
            let pool = catalog.list_published_in_category(*category).await?;
            self.take(pool, SAME_CATEGORY_SCORE, product.id, &mut chosen, &mut selected, max_count);
        }

        if selected.len() < max_count {
            // Parents are deduped and walked in ascending id order so two
            // runs differ only through the sampler.
            let mut parents: Vec<CategoryId> = Vec::new();
            for category in &product.category_ids {
                if let Some(parent) = catalog.parent_category(*category).await? {
                    if !parents.contains(&parent) {
                        parents.push(parent);
                    }
                }
            }
            parents.sort();

            for parent in parents {
                if selected.len() >= max_count {
                    break;
                }
                let pool = catalog.list_published_in_category(parent).await?;
                self.take(
                    pool,
                    PARENT_CATEGORY_SCORE,
                    product.id,
                    &mut chosen,
                    &mut selected,
                    max_count,
                );
            }
        }

        if selected.len() < max_count {
            let pool = catalog.list_published_ids().await?;
            self.take(pool, CATALOG_FILL_SCORE, product.id, &mut chosen, &mut selected, max_count);
        }

        Ok(selected)
    }

    fn name(&self) -> &'static str {
        "tiered"
    }
}

/// Full pairwise scan: scores every other published product and keeps the
/// top `max_count` with score > 0. The top-K is streamed through a bounded
/// min-heap, so memory stays O(max_count) no matter how large the catalog
/// is. Ties break by catalog iteration order (stable).
pub struct PairwiseSelector {
    scorer: PairwiseScorer,
}

impl PairwiseSelector {
    pub fn new() -> Self {
        Self { scorer: PairwiseScorer::new() }
    }

    pub fn with_scorer(scorer: PairwiseScorer) -> Self {
        Self { scorer }
    }
}

impl Default for PairwiseSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimilarityStrategy for PairwiseSelector {
    async fn select(
        &self,
        catalog: &dyn Catalog,
        product: &Product,
        max_count: usize,
    ) -> Result<Vec<SimilarityEdge>, CatalogError> {
        if max_count == 0 {
            return Ok(Vec::new());
        }

        let features = ComparableFeatures::from(product);
        let mut heap: BinaryHeap<Ranked> = BinaryHeap::with_capacity(max_count + 1);

        for (seq, candidate_id) in catalog.list_published_ids().await?.into_iter().enumerate() {
            if candidate_id == product.id {
                continue;
            }
            let Some(candidate) = catalog.get_product(candidate_id).await? else {
                continue;
            };

            let score = self.scorer.score(&features, &ComparableFeatures::from(&candidate));
            if score <= 0.0 {
                continue;
            }

            heap.push(Ranked { score, seq, id: candidate_id });
            if heap.len() > max_count {
                heap.pop();
            }
        }

        let edges = heap
            .into_sorted_vec()
            .into_iter()
            .map(|ranked| SimilarityEdge::new(product.id, ranked.id, ranked.score))
            .collect();
        Ok(edges)
    }

    fn name(&self) -> &'static str {
        "pairwise"
    }
}

/// Heap entry ordered by "worseness": the heap's maximum is the candidate
/// to evict, so lower scores (and, at equal score, later discovery) rank
/// greater.
struct Ranked {
    score: f64,
    seq: usize,
    id: ProductId,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.score.partial_cmp(&self.score) {
            Some(Ordering::Equal) | None => self.seq.cmp(&other.seq),
            Some(ordering) => ordering,
        }
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use rust_decimal::Decimal;

    use crate::catalog::InMemoryCatalog;
    use crate::domain::category::{CategoryId, CategoryNode};
    use crate::domain::product::{Product, ProductId};
    use crate::sampling::{OrderedSampler, SeededSampler};

    use super::{
        PairwiseSelector, SimilarityStrategy, TieredSelector, CATALOG_FILL_SCORE,
        PARENT_CATEGORY_SCORE, SAME_CATEGORY_SCORE,
    };

    fn product(id: u64, categories: &[u64]) -> Product {
        Product {
            id: ProductId(id),
            name: format!("Product {id}"),
            sku: format!("SKU-{id:03}"),
            price: Decimal::new(1000, 2),
            category_ids: categories.iter().copied().map(CategoryId).collect(),
            tag_ids: BTreeSet::new(),
            attributes: BTreeMap::new(),
            image_url: None,
            permalink: None,
            published: true,
            visible: true,
        }
    }

    async fn seeded_catalog() -> InMemoryCatalog {
        // Category tree: 10 is the parent of 11; 20 stands alone.
        let catalog = InMemoryCatalog::new();
        catalog.upsert_category(CategoryNode { id: CategoryId(10), parent_id: None }).await;
        catalog
            .upsert_category(CategoryNode { id: CategoryId(11), parent_id: Some(CategoryId(10)) })
            .await;
        catalog.upsert_category(CategoryNode { id: CategoryId(20), parent_id: None }).await;

        catalog.upsert_product(product(1, &[11])).await;
        catalog.upsert_product(product(2, &[11])).await;
        catalog.upsert_product(product(3, &[11])).await;
        catalog.upsert_product(product(4, &[10])).await;
        catalog.upsert_product(product(5, &[10])).await;
        catalog.upsert_product(product(6, &[20])).await;
        catalog.upsert_product(product(7, &[20])).await;
        catalog
    }

    #[tokio::test]
    async fn zero_category_product_returns_empty() {
        let catalog = seeded_catalog().await;
        let selector = TieredSelector::new();

        let edges =
            selector.select(&catalog, &product(99, &[]), 5).await.expect("select candidates");
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn same_category_candidates_score_max() {
        let catalog = seeded_catalog().await;
        let selector = TieredSelector::with_sampler(Box::new(OrderedSampler));

        let edges = selector.select(&catalog, &product(1, &[11]), 2).await.expect("select");
        assert_eq!(edges.len(), 2);
        for edge in &edges {
            assert_eq!(edge.score, SAME_CATEGORY_SCORE);
            assert_ne!(edge.similar_product_id, ProductId(1));
        }
    }

    #[tokio::test]
    async fn tiers_fall_back_in_order_with_band_scores() {
        let catalog = seeded_catalog().await;
        let selector = TieredSelector::with_sampler(Box::new(OrderedSampler));

        // Product 1 in category 11: two same-category peers (2, 3), two in
        // parent category 10 (4, 5), rest from the catalog at large.
        let edges = selector.select(&catalog, &product(1, &[11]), 6).await.expect("select");
        let scores: Vec<f64> = edges.iter().map(|edge| edge.score).collect();
        assert_eq!(
            scores,
            vec![
                SAME_CATEGORY_SCORE,
                SAME_CATEGORY_SCORE,
                PARENT_CATEGORY_SCORE,
                PARENT_CATEGORY_SCORE,
                CATALOG_FILL_SCORE,
                CATALOG_FILL_SCORE,
            ]
        );

        // Non-increasing and free of duplicates/self.
        let mut seen = std::collections::HashSet::new();
        for window in edges.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        for edge in &edges {
            assert!(seen.insert(edge.similar_product_id));
            assert_ne!(edge.similar_product_id, ProductId(1));
        }
    }

    #[tokio::test]
    async fn count_guarantee_when_catalog_is_large_enough() {
        let catalog = seeded_catalog().await;
        let selector = TieredSelector::with_sampler(Box::new(SeededSampler::new(5)));

        // Six other products exist, so a request for six is fully served.
        let edges = selector.select(&catalog, &product(1, &[11]), 6).await.expect("select");
        assert_eq!(edges.len(), 6);
    }

    #[tokio::test]
    async fn exhausted_catalog_returns_fewer_than_requested() {
        let catalog = seeded_catalog().await;
        let selector = TieredSelector::with_sampler(Box::new(SeededSampler::new(5)));

        let edges = selector.select(&catalog, &product(1, &[11]), 50).await.expect("select");
        assert_eq!(edges.len(), 6);
    }

    #[tokio::test]
    async fn seeded_sampler_makes_selection_reproducible() {
        let catalog = seeded_catalog().await;

        let first = TieredSelector::with_sampler(Box::new(SeededSampler::new(71)))
            .select(&catalog, &product(1, &[11]), 4)
            .await
            .expect("select");
        let second = TieredSelector::with_sampler(Box::new(SeededSampler::new(71)))
            .select(&catalog, &product(1, &[11]), 4)
            .await
            .expect("select");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn pairwise_excludes_self_and_zero_scores() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_product(product(1, &[11])).await;
        catalog.upsert_product(product(2, &[11])).await;
        // No shared categories, no tags, no attributes, same price: price
        // closeness still yields a positive score.
        catalog.upsert_product(product(3, &[20])).await;

        let mut unrelated = product(4, &[]);
        unrelated.price = Decimal::ZERO;
        catalog.upsert_product(unrelated).await;

        let selector = PairwiseSelector::new();
        let edges = selector.select(&catalog, &product(1, &[11]), 10).await.expect("select");

        assert!(edges.iter().all(|edge| edge.similar_product_id != ProductId(1)));
        assert!(edges.iter().all(|edge| edge.score > 0.0));
        assert!(!edges.iter().any(|edge| edge.similar_product_id == ProductId(4)));
    }

    #[tokio::test]
    async fn pairwise_orders_by_score_then_catalog_order() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_product(product(1, &[11])).await;
        // 2 and 3 tie exactly (same category set, same price); 5 shares
        // nothing but price.
        catalog.upsert_product(product(2, &[11])).await;
        catalog.upsert_product(product(3, &[11])).await;
        catalog.upsert_product(product(5, &[20])).await;

        let selector = PairwiseSelector::new();
        let edges = selector.select(&catalog, &product(1, &[11]), 2).await.expect("select");

        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].similar_product_id, ProductId(2));
        assert_eq!(edges[1].similar_product_id, ProductId(3));
        assert!(edges[0].score >= edges[1].score);
    }

    #[tokio::test]
    async fn pairwise_truncates_to_max_count() {
        let catalog = seeded_catalog().await;
        let selector = PairwiseSelector::new();

        let edges = selector.select(&catalog, &product(1, &[11]), 3).await.expect("select");
        assert_eq!(edges.len(), 3);
    }
}
