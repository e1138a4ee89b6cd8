pub mod catalog;
pub mod config;
pub mod domain;
pub mod pipeline;
pub mod reader;
pub mod sampling;
pub mod scoring;
pub mod selector;
pub mod store;

pub use catalog::{Catalog, CatalogError, CatalogSnapshot, InMemoryCatalog};
pub use config::{
    AppConfig, ConfigError, ConfigOverrides, DatabaseConfig, EngineConfig, LoadOptions, LogFormat,
    LoggingConfig, StrategyKind,
};
pub use domain::category::{CategoryId, CategoryNode};
pub use domain::product::{Product, ProductId};
pub use domain::similarity::{ProductSummary, SimilarProduct, SimilarityEdge};
pub use pipeline::{
    BatchStep, EngineSettings, PipelineError, RecomputeJob, RecomputePipeline, RecomputeReport,
    RunStatus, StepError, UpdateError,
};
pub use reader::{SimilarityReader, PLACEHOLDER_IMAGE_URL};
pub use sampling::{OrderedSampler, Sampler, SeededSampler, ThreadRngSampler};
pub use scoring::{ComparableFeatures, PairwiseScorer, ScoringWeights};
pub use selector::{
    PairwiseSelector, SimilarityStrategy, TieredSelector, CATALOG_FILL_SCORE,
    PARENT_CATEGORY_SCORE, SAME_CATEGORY_SCORE,
};
pub use store::{InMemorySimilarityStore, SimilarityStore, StoreError};
