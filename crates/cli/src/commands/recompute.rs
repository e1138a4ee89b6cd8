use std::path::Path;
use std::sync::Arc;

use kindred_core::config::{AppConfig, ConfigOverrides, LoadOptions, StrategyKind};
use kindred_core::pipeline::{EngineSettings, RecomputePipeline};
use kindred_db::{connect_with_settings, SqlSimilarityStore};

use crate::commands::{build_strategy, load_catalog, CommandResult};

pub fn run(catalog_path: &Path, strategy: Option<StrategyKind>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        overrides: ConfigOverrides { strategy, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "recompute",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "recompute",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let catalog =
            load_catalog(catalog_path).map_err(|message| ("catalog_load", message, 6u8))?;
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let store = Arc::new(SqlSimilarityStore::new(pool.clone()));
        let pipeline = RecomputePipeline::new(
            catalog,
            store,
            build_strategy(config.engine.strategy),
            EngineSettings::from(&config.engine),
        );

        let report =
            pipeline.full_recompute().await.map_err(|error| ("recompute", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(report)
    });

    match result {
        Ok(report) => {
            let message = match report.error_summary() {
                Some(summary) => format!(
                    "recomputed {} of {} products ({} skipped); errors: {summary}",
                    report.processed, report.total, report.skipped
                ),
                None => format!(
                    "recomputed {} of {} products ({} skipped)",
                    report.processed, report.total, report.skipped
                ),
            };
            let data = serde_json::to_value(&report).unwrap_or_default();
            CommandResult::success_with_data("recompute", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("recompute", error_class, message, exit_code)
        }
    }
}
