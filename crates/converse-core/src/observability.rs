//! Process-wide tracing setup.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_JSON_LOG_FILE: &str = "converse.logs.jsonl";

pub(crate) fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn observability_enabled() -> bool {
    std::env::var("CONVERSE_OBSERVABILITY_ENABLED")
        .ok()
        .map(|value| parse_bool_env(&value).unwrap_or(true))
        .unwrap_or(true)
}

fn resolve_env_filter() -> EnvFilter {
    if let Ok(level) = std::env::var("CONVERSE_LOG_LEVEL")
        && let Ok(filter) = EnvFilter::try_new(level)
    {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Installs the tracing subscriber once per process.
///
/// Environment variables:
/// - `CONVERSE_OBSERVABILITY_ENABLED`: set to `false` to install nothing (default enabled).
/// - `CONVERSE_LOG_LEVEL`: filter directive (`info`, `converse_core=debug`, ...).
///   Falls back to `RUST_LOG`, then `info`.
/// - `CONVERSE_JSON_LOG_PATH`: when set, logs go to that file as JSON lines;
///   otherwise a compact format is written to stdout.
pub fn init_observability() {
    INIT.get_or_init(|| {
        if !observability_enabled() {
            return;
        }

        let env_filter = resolve_env_filter();
        match std::env::var("CONVERSE_JSON_LOG_PATH") {
            Ok(raw) => {
                let (dir, file_name) = split_log_path(Path::new(&raw));
                let _ = std::fs::create_dir_all(&dir);
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            Err(_) => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stdout);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_env_values() {
        assert_eq!(parse_bool_env(" Off "), Some(false));
        assert_eq!(parse_bool_env("enabled"), Some(true));
        assert_eq!(parse_bool_env("maybe"), None);
    }

    #[test]
    fn log_path_without_directory_uses_cwd() {
        let (dir, file) = split_log_path(Path::new("run.jsonl"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(file, "run.jsonl");
        let (dir, file) = split_log_path(Path::new("/var/log/converse/out.jsonl"));
        assert_eq!(dir, PathBuf::from("/var/log/converse"));
        assert_eq!(file, "out.jsonl");
    }

    #[test]
    fn init_is_idempotent() {
        init_observability();
        init_observability();
    }
}
