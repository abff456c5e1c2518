//! Run configuration, read from the process environment.
//!
//! Missing required values are a configuration error: the run fails
//! immediately without launching a browser, and is never retried.

use crate::targets;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub const ENV_EMAIL: &str = "EVERGREEN_EMAIL";
pub const ENV_PASSWORD: &str = "EVERGREEN_PASSWORD";
pub const ENV_RENEW_URL: &str = "EVERGREEN_RENEW_URL";
pub const ENV_LOGIN_URL: &str = "EVERGREEN_LOGIN_URL";
pub const ENV_MAX_ATTEMPTS: &str = "EVERGREEN_MAX_ATTEMPTS";
pub const ENV_TELEGRAM_TOKEN: &str = "EVERGREEN_TELEGRAM_TOKEN";
pub const ENV_TELEGRAM_CHAT: &str = "EVERGREEN_TELEGRAM_CHAT";
pub const ENV_EXTENSIONS_DIR: &str = "EVERGREEN_EXTENSIONS_DIR";
pub const ENV_ARTIFACT_DIR: &str = "EVERGREEN_ARTIFACT_DIR";

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const MAX_ATTEMPTS_CEILING: u32 = 10;

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Account identifier (email). Opaque to the engine.
    pub email: String,
    /// Account secret. Never logged.
    pub password: String,
    /// The renewal page for the target server.
    pub renew_url: Url,
    /// Sign-in page; derived from the renew URL's origin when not given.
    pub login_url: Url,
    /// Attempt ceiling for the retry controller.
    pub max_attempts: u32,
    pub telegram: Option<TelegramConfig>,
    /// Directory holding unpacked passive-mitigation extensions.
    pub extensions_dir: Option<PathBuf>,
    /// Where attempt screenshots are written.
    pub artifact_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary lookup function. Tests inject a map here
    /// instead of mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &'static str| -> Option<String> {
            lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let email = require(ENV_EMAIL)?;
        let password = require(ENV_PASSWORD)?;
        let renew_url = parse_url(ENV_RENEW_URL, &require(ENV_RENEW_URL)?)?;

        let login_url = match get(ENV_LOGIN_URL) {
            Some(raw) => parse_url(ENV_LOGIN_URL, &raw)?,
            None => derive_login_url(&renew_url)?,
        };

        let max_attempts = match get(ENV_MAX_ATTEMPTS) {
            Some(raw) => {
                let n: u32 = raw.parse().map_err(|_| ConfigError::Invalid {
                    name: ENV_MAX_ATTEMPTS,
                    reason: format!("not a number: {:?}", raw),
                })?;
                n.clamp(1, MAX_ATTEMPTS_CEILING)
            }
            None => DEFAULT_MAX_ATTEMPTS,
        };

        let telegram = match (get(ENV_TELEGRAM_TOKEN), get(ENV_TELEGRAM_CHAT)) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig { token, chat_id }),
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "telegram partially configured ({} and {} must both be set); notifications disabled",
                    ENV_TELEGRAM_TOKEN,
                    ENV_TELEGRAM_CHAT
                );
                None
            }
        };

        Ok(Self {
            email,
            password,
            renew_url,
            login_url,
            max_attempts,
            telegram,
            extensions_dir: get(ENV_EXTENSIONS_DIR).map(PathBuf::from),
            artifact_dir: get(ENV_ARTIFACT_DIR).map(PathBuf::from),
        })
    }

    /// Account identifier safe for logs: 3-char prefix only.
    pub fn redacted_email(&self) -> String {
        redact(&self.email)
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn derive_login_url(renew_url: &Url) -> Result<Url, ConfigError> {
    renew_url.join(targets::LOGIN_PATH).map_err(|e| ConfigError::Invalid {
        name: ENV_RENEW_URL,
        reason: format!("cannot derive login URL: {}", e),
    })
}

pub fn redact(identifier: &str) -> String {
    let prefix: String = identifier.chars().take(3).collect();
    format!("{}***", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (ENV_EMAIL, "user@example.com"),
            (ENV_PASSWORD, "hunter2hunter2"),
            (ENV_RENEW_URL, "https://dashboard.example.com/servers/edit?id=42"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn loads_with_required_vars_only() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(
            config.login_url.as_str(),
            "https://dashboard.example.com/auth/login"
        );
        assert!(config.telegram.is_none());
    }

    #[test]
    fn each_required_var_is_enforced() {
        for var in [ENV_EMAIL, ENV_PASSWORD, ENV_RENEW_URL] {
            let mut vars = base_vars();
            vars.remove(var);
            match load(&vars) {
                Err(ConfigError::Missing(name)) => assert_eq!(name, var),
                other => panic!("expected Missing({}), got {:?}", var, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut vars = base_vars();
        vars.insert(ENV_PASSWORD, "   ");
        assert!(matches!(load(&vars), Err(ConfigError::Missing(ENV_PASSWORD))));
    }

    #[test]
    fn max_attempts_is_clamped() {
        let mut vars = base_vars();
        vars.insert(ENV_MAX_ATTEMPTS, "50");
        assert_eq!(load(&vars).unwrap().max_attempts, 10);
        vars.insert(ENV_MAX_ATTEMPTS, "0");
        assert_eq!(load(&vars).unwrap().max_attempts, 1);
    }

    #[test]
    fn partial_telegram_config_is_dropped() {
        let mut vars = base_vars();
        vars.insert(ENV_TELEGRAM_TOKEN, "123:abc");
        assert!(load(&vars).unwrap().telegram.is_none());
    }

    #[test]
    fn email_is_redacted_for_logs() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.redacted_email(), "use***");
    }
}
