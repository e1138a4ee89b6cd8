use std::path::Path;
use std::sync::Arc;

use kindred_core::config::{AppConfig, ConfigOverrides, LoadOptions, StrategyKind};
use kindred_core::pipeline::{EngineSettings, RecomputePipeline};
use kindred_db::{connect_with_settings, SqlSimilarityStore};

use crate::commands::{build_strategy, load_catalog, CommandResult};

/// One batch of the resumable recompute. The caller drives the cursor:
/// start at `--batch 0`, then pass the previous `processed` value back in
/// as the next batch number until `complete` is true.
pub fn run(catalog_path: &Path, batch: u64, strategy: Option<StrategyKind>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        overrides: ConfigOverrides { strategy, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "step",
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
                "step",
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

        let step = pipeline.step(batch).await.map_err(|error| ("step", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(step)
    });

    match result {
        Ok(step) => {
            let message = if step.complete {
                format!("batch run complete: {} of {} products", step.processed, step.total)
            } else {
                format!(
                    "processed batch {batch}: {} of {} products ({}%)",
                    step.processed, step.total, step.percentage
                )
            };
            let data = serde_json::to_value(&step).unwrap_or_default();
            CommandResult::success_with_data("step", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("step", error_class, message, exit_code)
        }
    }
}
