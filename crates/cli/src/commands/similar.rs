use std::path::Path;
use std::sync::Arc;

use kindred_core::config::{AppConfig, LoadOptions};
use kindred_core::domain::product::ProductId;
use kindred_core::reader::SimilarityReader;
use kindred_db::{connect_with_settings, SqlSimilarityStore};

use crate::commands::{load_catalog, CommandResult};

pub fn run(catalog_path: &Path, product: u64, limit: Option<usize>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "similar",
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
                "similar",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let limit = limit.unwrap_or(config.engine.max_similar);

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
        let reader = SimilarityReader::new(catalog, store);
        let similar = reader.get_similar(ProductId(product), limit).await;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(similar)
    });

    match result {
        Ok(similar) => {
            let message =
                format!("{} similar products for product {product}", similar.len());
            let data = serde_json::to_value(&similar).unwrap_or_default();
            CommandResult::success_with_data("similar", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("similar", error_class, message, exit_code)
        }
    }
}
