pub mod similarity;

pub use similarity::SqlSimilarityStore;
