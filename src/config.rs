//! Environment-variable driven startup configuration.
//!
//! Every var is read once at process start. Required vars missing at that
//! point are a hard error — we fail fast at construction rather than deep in
//! a request handler.

use std::env;

/// All environment-derived settings the engine needs to run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub telegram_chat_id: i64,
    pub google_api_key: String,
    pub dashboard_password: String,
    pub sqlite_db_path: String,
    pub port: u16,
    pub model: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for environment variable {0}: {1}")]
    Invalid(&'static str, String),
}

const DEFAULT_SQLITE_DB_PATH: &str = "./data/jobs.db";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

impl AppConfig {
    /// Load configuration from the process environment, failing fast if a
    /// required variable is absent or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;

        let telegram_chat_id = required("TELEGRAM_CHAT_ID")?
            .parse::<i64>()
            .map_err(|_| ConfigError::Invalid("TELEGRAM_CHAT_ID", "expected an integer chat id".to_string()))?;

        let google_api_key = required("GOOGLE_API_KEY")?;
        let dashboard_password = required("DASHBOARD_PASSWORD")?;

        let sqlite_db_path = env::var("SQLITE_DB_PATH").unwrap_or_else(|_| DEFAULT_SQLITE_DB_PATH.to_string());

        let port = match env::var("PORT") {
            Ok(v) => v
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("PORT", v))?,
            Err(_) => DEFAULT_PORT,
        };

        let model = env::var("MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self {
            telegram_bot_token,
            telegram_chat_id,
            google_api_key,
            dashboard_password,
            sqlite_db_path,
            port,
            model,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

#[cfg(test)]
#[allow(unsafe_code)] // env::set_var / remove_var are unsafe in Rust 2024; tests are single-threaded.
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialises env-var tests so they don't race each other's set/remove.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "TELEGRAM_BOT_TOKEN",
        "TELEGRAM_CHAT_ID",
        "GOOGLE_API_KEY",
        "DASHBOARD_PASSWORD",
        "SQLITE_DB_PATH",
        "PORT",
        "MODEL",
    ];

    fn clear_all() {
        // SAFETY: single-threaded per `ENV_LOCK`; no other threads read these vars.
        unsafe {
            for var in ALL_VARS {
                env::remove_var(var);
            }
        }
    }

    fn set_required() {
        // SAFETY: single-threaded per `ENV_LOCK`.
        unsafe {
            env::set_var("TELEGRAM_BOT_TOKEN", "test-token");
            env::set_var("TELEGRAM_CHAT_ID", "42");
            env::set_var("GOOGLE_API_KEY", "test-key");
            env::set_var("DASHBOARD_PASSWORD", "secret");
        }
    }

    #[test]
    fn missing_required_var_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_all();
        let result = AppConfig::from_env();
        assert!(result.is_err());
        clear_all();
    }

    #[test]
    fn loads_with_defaults_for_optional_vars() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_all();
        set_required();
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.telegram_chat_id, 42);
        assert_eq!(config.sqlite_db_path, DEFAULT_SQLITE_DB_PATH);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.model, DEFAULT_MODEL);
        clear_all();
    }

    #[test]
    fn invalid_chat_id_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_all();
        set_required();
        // SAFETY: single-threaded per `ENV_LOCK`.
        unsafe {
            env::set_var("TELEGRAM_CHAT_ID", "not-a-number");
        }
        let result = AppConfig::from_env();
        assert!(result.is_err());
        clear_all();
    }

    #[test]
    fn port_override_is_respected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_all();
        set_required();
        // SAFETY: single-threaded per `ENV_LOCK`.
        unsafe {
            env::set_var("PORT", "8080");
        }
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        clear_all();
    }
}
