pub mod config;
pub mod recompute;
pub mod similar;
pub mod step;
pub mod update;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use kindred_core::catalog::InMemoryCatalog;
use kindred_core::config::StrategyKind;
use kindred_core::selector::{PairwiseSelector, SimilarityStrategy, TieredSelector};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Value) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Shared by every command that needs product data: the catalog is a JSON
/// snapshot on disk, loaded into memory for the run.
pub(crate) fn load_catalog(path: &Path) -> Result<Arc<InMemoryCatalog>, String> {
    InMemoryCatalog::from_json_file(path).map(Arc::new).map_err(|error| error.to_string())
}

pub(crate) fn build_strategy(kind: StrategyKind) -> Arc<dyn SimilarityStrategy> {
    match kind {
        StrategyKind::Tiered => Arc::new(TieredSelector::new()),
        StrategyKind::Pairwise => Arc::new(PairwiseSelector::new()),
    }
}
