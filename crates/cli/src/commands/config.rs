use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use qbeat_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILES};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult};

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let lines = render(&config, config_file_doc.as_ref(), config_file_path.as_deref());
    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn render(
    config: &AppConfig,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> Vec<String> {
    let api_key = config
        .sync
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let menu_path = config
        .menu
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<bundled>".to_string());

    let fields: [(&str, String, &[&str]); 13] = [
        ("sync.enabled", config.sync.enabled.to_string(), &["QBEAT_SYNC_ENABLED"]),
        ("sync.base_url", config.sync.base_url.clone(), &["QBEAT_SYNC_BASE_URL", "WEBAPP_URL"]),
        ("sync.api_key", api_key, &["QBEAT_SYNC_API_KEY"]),
        ("sync.timeout_secs", config.sync.timeout_secs.to_string(), &["QBEAT_SYNC_TIMEOUT_SECS"]),
        ("order.tax_rate", config.order.tax_rate.to_string(), &["QBEAT_ORDER_TAX_RATE"]),
        (
            "order.tax_rounding",
            config.order.tax_rounding.to_string(),
            &["QBEAT_ORDER_TAX_ROUNDING"],
        ),
        ("order.store_name", config.order.store_name.clone(), &["QBEAT_ORDER_STORE_NAME"]),
        (
            "order.ready_estimate",
            config.order.ready_estimate.clone(),
            &["QBEAT_ORDER_READY_ESTIMATE"],
        ),
        (
            "session.teardown_delay_ms",
            config.session.teardown_delay_ms.to_string(),
            &["QBEAT_SESSION_TEARDOWN_DELAY_MS"],
        ),
        (
            "session.completion_disconnect_ms",
            config.session.completion_disconnect_ms.to_string(),
            &["QBEAT_SESSION_COMPLETION_DISCONNECT_MS"],
        ),
        ("menu.path", menu_path, &["QBEAT_MENU_PATH"]),
        (
            "logging.level",
            config.logging.level.clone(),
            &["QBEAT_LOGGING_LEVEL", "QBEAT_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["QBEAT_LOGGING_FORMAT", "QBEAT_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in fields {
        let source = field_source(key_path, env_keys, config_file_doc, config_file_path);
        lines.push(render_line(key_path, &value, source));
    }
    lines
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then_some(path.to_path_buf());
    }
    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
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

/// Keeps only the first four characters of longer secrets.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.chars().count() > 12 {
        let prefix: String = trimmed.chars().take(4).collect();
        return format!("{prefix}***");
    }
    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn nested_keys_are_found_in_file_documents() {
        let doc: Value = "[order]\ntax_rate = \"0.08\"\n".parse().expect("valid toml");

        assert!(contains_path(&doc, "order.tax_rate"));
        assert!(!contains_path(&doc, "order.store_name"));
        assert!(!contains_path(&doc, "sync.base_url"));
    }

    #[test]
    fn secrets_never_render_in_full() {
        assert_eq!(redact_secret("  "), "<empty>");
        assert_eq!(redact_secret("short-key"), "<redacted>");
        assert_eq!(redact_secret("sk_live_0123456789abcdef"), "sk_l***");
    }
}
