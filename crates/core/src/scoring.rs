//! Pairwise attribute-similarity scoring.

use std::collections::BTreeSet;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::category::CategoryId;
use crate::domain::product::Product;

/// Weights for the pairwise scoring dimensions. Dimensions with empty data
/// on either side contribute zero rather than a penalty, so the weights must
/// sum to 1.0 for the score to stay in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight for category overlap (default: 0.30)
    pub category: f64,
    /// Weight for price closeness (default: 0.20)
    pub price: f64,
    /// Weight for shared attribute names (default: 0.30)
    pub attributes: f64,
    /// Weight for tag overlap (default: 0.20)
    pub tags: f64,
}

impl ScoringWeights {
    pub fn is_normalized(&self) -> bool {
        let total = self.category + self.price + self.attributes + self.tags;
        (total - 1.0).abs() < 1e-9
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { category: 0.30, price: 0.20, attributes: 0.30, tags: 0.20 }
    }
}

/// The comparison view extracted from a product: only the dimensions the
/// scorer looks at. Attribute identity is the attribute name.
#[derive(Clone, Debug, PartialEq)]
pub struct ComparableFeatures {
    pub category_ids: BTreeSet<CategoryId>,
    pub tag_ids: BTreeSet<u64>,
    pub attribute_names: BTreeSet<String>,
    pub price: Decimal,
}

impl From<&Product> for ComparableFeatures {
    fn from(product: &Product) -> Self {
        Self {
            category_ids: product.category_ids.clone(),
            tag_ids: product.tag_ids.clone(),
            attribute_names: product.attributes.keys().cloned().collect(),
            price: product.price,
        }
    }
}

/// Pure, deterministic, symmetric scorer: a weighted blend of Jaccard-style
/// overlap ratios plus relative price closeness. Result is in [0, 1];
/// higher means more similar. Ties are broken by the selector, not here.
#[derive(Clone, Copy, Debug, Default)]
pub struct PairwiseScorer {
    weights: ScoringWeights,
}

impl PairwiseScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    pub fn score(&self, a: &ComparableFeatures, b: &ComparableFeatures) -> f64 {
        let mut score = 0.0;

        score += overlap_ratio(&a.category_ids, &b.category_ids) * self.weights.category;
        score += price_closeness(a.price, b.price) * self.weights.price;
        score += overlap_ratio(&a.attribute_names, &b.attribute_names) * self.weights.attributes;
        score += overlap_ratio(&a.tag_ids, &b.tag_ids) * self.weights.tags;

        score.min(1.0)
    }
}

/// `|a ∩ b| / max(|a|, |b|)`; zero when either side is empty.
fn overlap_ratio<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(b).count();
    common as f64 / a.len().max(b.len()) as f64
}

/// `1 - min(|pa - pb| / max(pa, pb), 1)`; zero when either price is
/// unknown (zero or negative).
fn price_closeness(a: Decimal, b: Decimal) -> f64 {
    if a <= Decimal::ZERO || b <= Decimal::ZERO {
        return 0.0;
    }
    let (a, b) = (a.to_f64().unwrap_or(0.0), b.to_f64().unwrap_or(0.0));
    if a <= 0.0 || b <= 0.0 {
        return 0.0;
    }
    let diff = (a - b).abs() / a.max(b);
    1.0 - diff.min(1.0)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;

    use crate::domain::category::CategoryId;

    use super::{ComparableFeatures, PairwiseScorer, ScoringWeights};

    fn features(
        categories: &[u64],
        tags: &[u64],
        attributes: &[&str],
        price: Decimal,
    ) -> ComparableFeatures {
        ComparableFeatures {
            category_ids: categories.iter().copied().map(CategoryId).collect(),
            tag_ids: tags.iter().copied().collect(),
            attribute_names: attributes.iter().map(|name| (*name).to_string()).collect(),
            price,
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        assert!(ScoringWeights::default().is_normalized());
    }

    #[test]
    fn identical_products_score_one() {
        let scorer = PairwiseScorer::new();
        let a = features(&[1, 2], &[7], &["color", "size"], Decimal::new(4999, 2));
        assert!((scorer.score(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn score_is_symmetric_and_bounded() {
        let scorer = PairwiseScorer::new();
        let a = features(&[1, 2], &[7, 8], &["color"], Decimal::new(2000, 2));
        let b = features(&[2, 3], &[8], &["color", "material"], Decimal::new(3500, 2));

        let ab = scorer.score(&a, &b);
        let ba = scorer.score(&b, &a);
        assert_eq!(ab, ba);
        assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn empty_dimensions_contribute_zero_not_penalty() {
        let scorer = PairwiseScorer::new();
        let a = features(&[1], &[], &[], Decimal::ZERO);
        let b = features(&[1], &[5], &["color"], Decimal::new(1000, 2));

        // Only the category dimension has data on both sides.
        let score = scorer.score(&a, &b);
        assert!((score - 0.30).abs() < 1e-9);
    }

    #[test]
    fn unknown_price_is_excluded_from_comparison() {
        let scorer = PairwiseScorer::new();
        let priced = features(&[1], &[], &[], Decimal::new(10_000, 2));
        let unpriced = features(&[1], &[], &[], Decimal::ZERO);

        let with_price = scorer.score(&priced, &priced);
        let without_price = scorer.score(&priced, &unpriced);
        assert!(with_price > without_price);
        assert!((without_price - 0.30).abs() < 1e-9);
    }

    #[test]
    fn closer_prices_score_higher() {
        let scorer = PairwiseScorer::new();
        let base = features(&[], &[], &[], Decimal::new(10_000, 2));
        let near = features(&[], &[], &[], Decimal::new(11_000, 2));
        let far = features(&[], &[], &[], Decimal::new(90_000, 2));

        assert!(scorer.score(&base, &near) > scorer.score(&base, &far));
    }

    #[test]
    fn attribute_overlap_compares_names_not_values() {
        let scorer = PairwiseScorer::new();
        // Same attribute names, so the dimension is a full match even though
        // real option values would differ.
        let a = features(&[], &[], &["color", "size"], Decimal::ZERO);
        let b = features(&[], &[], &["color", "size"], Decimal::ZERO);
        assert!((scorer.score(&a, &b) - 0.30).abs() < 1e-9);
    }

    #[test]
    fn partial_overlap_uses_larger_side_as_denominator() {
        let scorer = PairwiseScorer::new();
        let a = features(&[1, 2, 3, 4], &[], &[], Decimal::ZERO);
        let b = features(&[1, 2], &[], &[], Decimal::ZERO);

        // 2 common / max(4, 2) = 0.5, weighted by 0.30.
        assert!((scorer.score(&a, &b) - 0.15).abs() < 1e-9);
    }

    #[test]
    fn features_extract_attribute_names_from_product() {
        use crate::domain::product::{Product, ProductId};
        use std::collections::BTreeMap;

        let mut attributes = BTreeMap::new();
        attributes.insert("color".to_string(), BTreeSet::from(["red".to_string()]));
        let product = Product {
            id: ProductId(1),
            name: "Chair".to_string(),
            sku: "CH-1".to_string(),
            price: Decimal::new(100, 0),
            category_ids: BTreeSet::new(),
            tag_ids: BTreeSet::new(),
            attributes,
            image_url: None,
            permalink: None,
            published: true,
            visible: true,
        };

        let extracted = ComparableFeatures::from(&product);
        assert!(extracted.attribute_names.contains("color"));
    }
}
