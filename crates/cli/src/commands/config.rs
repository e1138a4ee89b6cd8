use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use kindred_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let fields: [(&str, String, Option<&str>); 10] = [
        ("database.url", config.database.url.clone(), Some("KINDRED_DATABASE_URL")),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            Some("KINDRED_DATABASE_MAX_CONNECTIONS"),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            Some("KINDRED_DATABASE_TIMEOUT_SECS"),
        ),
        (
            "engine.strategy",
            format!("{:?}", config.engine.strategy).to_ascii_lowercase(),
            Some("KINDRED_ENGINE_STRATEGY"),
        ),
        (
            "engine.max_similar",
            config.engine.max_similar.to_string(),
            Some("KINDRED_ENGINE_MAX_SIMILAR"),
        ),
        (
            "engine.batch_size",
            config.engine.batch_size.to_string(),
            Some("KINDRED_ENGINE_BATCH_SIZE"),
        ),
        (
            "engine.flush_every",
            config.engine.flush_every.to_string(),
            Some("KINDRED_ENGINE_FLUSH_EVERY"),
        ),
        ("logging.level", config.logging.level.clone(), Some("KINDRED_LOGGING_LEVEL")),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            Some("KINDRED_LOGGING_FORMAT"),
        ),
        ("config.file", describe_config_file(config_file_path.as_deref()), None),
    ];

    for (key, value, env_key) in fields {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn describe_config_file(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_else(|| "<none>".to_string())
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("kindred.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/kindred.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
