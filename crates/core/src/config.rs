use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ordering::pricing::{TaxPolicy, TaxRounding};
use crate::session::SessionSettings;

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["qbeat.toml", "config/qbeat.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub order: OrderConfig,
    pub session: SessionConfig,
    pub menu: MenuConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct OrderConfig {
    pub tax_rate: Decimal,
    pub tax_rounding: TaxRounding,
    pub store_name: String,
    pub ready_estimate: String,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub teardown_delay_ms: u64,
    pub completion_disconnect_ms: u64,
}

#[derive(Clone, Debug, Default)]
pub struct MenuConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub sync_enabled: Option<bool>,
    pub sync_base_url: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub menu_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig {
                enabled: false,
                base_url: "http://localhost:3000".to_string(),
                api_key: None,
                timeout_secs: 10,
            },
            order: OrderConfig {
                tax_rate: TaxPolicy::DEFAULT_RATE,
                tax_rounding: TaxRounding::HalfUp,
                store_name: "QBeatAI".to_string(),
                ready_estimate: "10-15 minutes".to_string(),
            },
            session: SessionConfig { teardown_delay_ms: 5_000, completion_disconnect_ms: 3_000 },
            menu: MenuConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn tax_policy(&self) -> TaxPolicy {
        TaxPolicy::new(self.order.tax_rate, self.order.tax_rounding)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            tax: self.tax_policy(),
            store_name: self.order.store_name.clone(),
            ready_estimate: self.order.ready_estimate.clone(),
            teardown_delay: Duration::from_millis(self.session.teardown_delay_ms),
            completion_disconnect: Duration::from_millis(self.session.completion_disconnect_ms),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(sync) = patch.sync {
            if let Some(enabled) = sync.enabled {
                self.sync.enabled = enabled;
            }
            if let Some(base_url) = sync.base_url {
                self.sync.base_url = base_url;
            }
            if let Some(sync_api_key_value) = sync.api_key {
                self.sync.api_key = Some(secret_value(sync_api_key_value));
            }
            if let Some(timeout_secs) = sync.timeout_secs {
                self.sync.timeout_secs = timeout_secs;
            }
        }

        if let Some(order) = patch.order {
            if let Some(tax_rate) = order.tax_rate {
                self.order.tax_rate = tax_rate;
            }
            if let Some(tax_rounding) = order.tax_rounding {
                self.order.tax_rounding = tax_rounding;
            }
            if let Some(store_name) = order.store_name {
                self.order.store_name = store_name;
            }
            if let Some(ready_estimate) = order.ready_estimate {
                self.order.ready_estimate = ready_estimate;
            }
        }

        if let Some(session) = patch.session {
            if let Some(teardown_delay_ms) = session.teardown_delay_ms {
                self.session.teardown_delay_ms = teardown_delay_ms;
            }
            if let Some(completion_disconnect_ms) = session.completion_disconnect_ms {
                self.session.completion_disconnect_ms = completion_disconnect_ms;
            }
        }

        if let Some(menu) = patch.menu {
            if let Some(path) = menu.path {
                self.menu.path = Some(path);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("QBEAT_SYNC_ENABLED") {
            self.sync.enabled = parse_bool("QBEAT_SYNC_ENABLED", &value)?;
        }
        let base_url = read_env("QBEAT_SYNC_BASE_URL").or_else(|| read_env("WEBAPP_URL"));
        if let Some(value) = base_url {
            self.sync.base_url = value;
        }
        if let Some(value) = read_env("QBEAT_SYNC_API_KEY") {
            self.sync.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("QBEAT_SYNC_TIMEOUT_SECS") {
            self.sync.timeout_secs = parse_u64("QBEAT_SYNC_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("QBEAT_ORDER_TAX_RATE") {
            self.order.tax_rate = parse_decimal("QBEAT_ORDER_TAX_RATE", &value)?;
        }
        if let Some(value) = read_env("QBEAT_ORDER_TAX_ROUNDING") {
            self.order.tax_rounding = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "QBEAT_ORDER_TAX_ROUNDING".to_string(),
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = read_env("QBEAT_ORDER_STORE_NAME") {
            self.order.store_name = value;
        }
        if let Some(value) = read_env("QBEAT_ORDER_READY_ESTIMATE") {
            self.order.ready_estimate = value;
        }

        if let Some(value) = read_env("QBEAT_SESSION_TEARDOWN_DELAY_MS") {
            self.session.teardown_delay_ms = parse_u64("QBEAT_SESSION_TEARDOWN_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("QBEAT_SESSION_COMPLETION_DISCONNECT_MS") {
            self.session.completion_disconnect_ms =
                parse_u64("QBEAT_SESSION_COMPLETION_DISCONNECT_MS", &value)?;
        }

        if let Some(value) = read_env("QBEAT_MENU_PATH") {
            self.menu.path = Some(PathBuf::from(value));
        }

        let log_level = read_env("QBEAT_LOGGING_LEVEL").or_else(|| read_env("QBEAT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("QBEAT_LOGGING_FORMAT").or_else(|| read_env("QBEAT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(enabled) = overrides.sync_enabled {
            self.sync.enabled = enabled;
        }
        if let Some(base_url) = overrides.sync_base_url {
            self.sync.base_url = base_url;
        }
        if let Some(tax_rate) = overrides.tax_rate {
            self.order.tax_rate = tax_rate;
        }
        if let Some(menu_path) = overrides.menu_path {
            self.menu.path = Some(menu_path);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sync(&self.sync)?;
        validate_order(&self.order)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_sync(sync: &SyncConfig) -> Result<(), ConfigError> {
    let base_url = sync.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "sync.base_url must start with http:// or https:// (set QBEAT_SYNC_BASE_URL or WEBAPP_URL)"
                .to_string(),
        ));
    }

    if sync.timeout_secs == 0 || sync.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "sync.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    let blank_key =
        sync.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(false);
    if blank_key {
        return Err(ConfigError::Validation(
            "sync.api_key is set but empty; remove it or provide a key".to_string(),
        ));
    }

    Ok(())
}

fn validate_order(order: &OrderConfig) -> Result<(), ConfigError> {
    if order.tax_rate < Decimal::ZERO || order.tax_rate >= Decimal::ONE {
        return Err(ConfigError::Validation(format!(
            "order.tax_rate must be a fraction in range 0 <= rate < 1 (got {})",
            order.tax_rate
        )));
    }

    if order.store_name.trim().is_empty() {
        return Err(ConfigError::Validation("order.store_name must not be empty".to_string()));
    }

    if order.ready_estimate.trim().is_empty() {
        return Err(ConfigError::Validation(
            "order.ready_estimate must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.teardown_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "session.teardown_delay_ms must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    sync: Option<SyncPatch>,
    order: Option<OrderPatch>,
    session: Option<SessionPatch>,
    menu: Option<MenuPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SyncPatch {
    enabled: Option<bool>,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OrderPatch {
    tax_rate: Option<Decimal>,
    tax_rounding: Option<TaxRounding>,
    store_name: Option<String>,
    ready_estimate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    teardown_delay_ms: Option<u64>,
    completion_disconnect_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MenuPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use crate::ordering::pricing::TaxRounding;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_storefront_settings() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        let settings = config.session_settings();

        ensure(!config.sync.enabled, "sync should be disabled by default")?;
        ensure(config.sync.base_url == "http://localhost:3000", "default base url")?;
        ensure(settings.tax.rate == Decimal::new(975, 4), "default tax rate should be 9.75%")?;
        ensure(settings.tax.rounding == TaxRounding::HalfUp, "default rounding is half up")?;
        ensure(settings.store_name == "QBeatAI", "default store name")?;
        ensure(settings.teardown_delay == Duration::from_secs(5), "default teardown delay")?;
        ensure(
            settings.completion_disconnect == Duration::from_secs(3),
            "default disconnect notice",
        )?;
        Ok(())
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_QBEAT_SYNC_KEY", "key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("qbeat.toml");
            fs::write(
                &path,
                r#"
[sync]
enabled = true
api_key = "${TEST_QBEAT_SYNC_KEY}"

[order]
tax_rate = "0.0825"
tax_rounding = "half_even"
store_name = "Corner Bakery"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.sync.enabled, "sync should be enabled from file")?;
            ensure(
                config.sync.api_key.as_ref().map(|key| key.expose_secret() == "key-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )?;
            ensure(config.order.tax_rate == Decimal::new(825, 4), "tax rate from file")?;
            ensure(config.order.tax_rounding == TaxRounding::HalfEven, "rounding from file")?;
            ensure(config.order.store_name == "Corner Bakery", "store name from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_QBEAT_SYNC_KEY"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("qbeat.toml");
        fs::write(&path, "[sync]\napi_key = \"${QBEAT_TEST_UNSET_VARIABLE}\"\n")
            .map_err(|err| err.to_string())?;

        let result =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(
                result,
                Err(ConfigError::MissingEnvInterpolation { ref var })
                    if var == "QBEAT_TEST_UNSET_VARIABLE"
            ),
            "missing variable should be named in the error",
        )
    }

    #[test]
    fn webapp_url_is_accepted_as_base_url_alias() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("WEBAPP_URL", "https://orders.example.test");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.sync.base_url == "https://orders.example.test",
                "WEBAPP_URL should set the sync base url",
            )
        })();

        clear_vars(&["WEBAPP_URL"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QBEAT_LOG_LEVEL", "warn");
        env::set_var("QBEAT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["QBEAT_LOG_LEVEL", "QBEAT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QBEAT_SYNC_BASE_URL", "http://from-env:3000");
        env::set_var("QBEAT_ORDER_STORE_NAME", "Env Bakery");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("qbeat.toml");
            fs::write(
                &path,
                r#"
[sync]
base_url = "http://from-file:3000"

[order]
store_name = "File Bakery"
tax_rate = "0.05"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    sync_base_url: Some("http://from-override:3000".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.sync.base_url == "http://from-override:3000",
                "override base url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.order.store_name == "Env Bakery", "env should win over file")?;
            ensure(config.order.tax_rate == Decimal::new(5, 2), "file should win over defaults")?;
            Ok(())
        })();

        clear_vars(&["QBEAT_SYNC_BASE_URL", "QBEAT_ORDER_STORE_NAME"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QBEAT_SYNC_TIMEOUT_SECS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("sync.timeout_secs")
            );
            ensure(has_message, "validation failure should mention sync.timeout_secs")
        })();

        clear_vars(&["QBEAT_SYNC_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn out_of_range_tax_rate_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QBEAT_ORDER_TAX_RATE", "9.75");

        let result = (|| -> Result<(), String> {
            let error = AppConfig::load(LoadOptions::default())
                .err()
                .ok_or_else(|| "a rate of 975% must be rejected".to_string())?;
            let names_field = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("order.tax_rate")
            );
            ensure(names_field, "validation failure should mention order.tax_rate")
        })();

        clear_vars(&["QBEAT_ORDER_TAX_RATE"]);
        result
    }

    #[test]
    fn malformed_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QBEAT_SYNC_ENABLED", "sometimes");

        let result = (|| -> Result<(), String> {
            let error = AppConfig::load(LoadOptions::default())
                .err()
                .ok_or_else(|| "malformed bool must fail".to_string())?;
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. } if key == "QBEAT_SYNC_ENABLED"
                ),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["QBEAT_SYNC_ENABLED"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QBEAT_SYNC_API_KEY", "sync-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("sync-secret-value"),
                "debug output should not contain the sync api key",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["QBEAT_SYNC_API_KEY"]);
        result
    }
}
