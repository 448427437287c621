//! Environment configuration.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Whether the store write blocks the webhook response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Append before responding; a store failure becomes a visible 500.
    Foreground,
    /// Append on a detached task; failures are only logged. Dedup-by-id is
    /// the safety net for the redelivery that foreground mode would answer
    /// with an error.
    Background,
}

impl WriteMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "foreground" | "sync" => Ok(WriteMode::Foreground),
            "background" | "async" => Ok(WriteMode::Background),
            other => Err(ConfigError::InvalidValue {
                key: "INBOX_WRITE_MODE".into(),
                message: format!("expected foreground or background, got {other:?}"),
            }),
        }
    }
}

/// Credentials for the outbound push API.
#[derive(Debug, Clone)]
pub struct PushCredentials {
    pub app_id: String,
    pub app_secret: SecretString,
}

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Shared webhook token. `None` disables the signature gate.
    pub token: Option<String>,
    /// Push credentials. `None` disables the outbound push endpoint.
    pub push: Option<PushCredentials>,
    pub store_path: PathBuf,
    pub bind: String,
    pub write_mode: WriteMode,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("WECHAT_TOKEN").ok().filter(|t| !t.is_empty());

        let push = match (
            std::env::var("WECHAT_APPID").ok().filter(|v| !v.is_empty()),
            std::env::var("WECHAT_APPSECRET").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(app_id), Some(secret)) => Some(PushCredentials {
                app_id,
                app_secret: SecretString::from(secret),
            }),
            _ => None,
        };

        let store_path = std::env::var("INBOX_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/wechat_messages.csv"));

        let bind = std::env::var("INBOX_BIND").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let write_mode = match std::env::var("INBOX_WRITE_MODE") {
            Ok(value) => WriteMode::parse(&value)?,
            Err(_) => WriteMode::Foreground,
        };

        Ok(Self {
            token,
            push,
            store_path,
            bind,
            write_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_mode_parses_both_spellings() {
        assert_eq!(WriteMode::parse("foreground").unwrap(), WriteMode::Foreground);
        assert_eq!(WriteMode::parse("sync").unwrap(), WriteMode::Foreground);
        assert_eq!(WriteMode::parse("Background").unwrap(), WriteMode::Background);
        assert_eq!(WriteMode::parse(" async ").unwrap(), WriteMode::Background);
    }

    #[test]
    fn write_mode_rejects_typos() {
        let err = WriteMode::parse("backgroundd").unwrap_err();
        assert!(err.to_string().contains("INBOX_WRITE_MODE"));
    }

    #[test]
    fn from_env_defaults() {
        // Single test touches the environment, so no parallel-test races.
        // SAFETY: no other thread reads these vars concurrently.
        unsafe {
            std::env::remove_var("WECHAT_TOKEN");
            std::env::remove_var("WECHAT_APPID");
            std::env::remove_var("WECHAT_APPSECRET");
            std::env::remove_var("INBOX_STORE_PATH");
            std::env::remove_var("INBOX_BIND");
            std::env::remove_var("INBOX_WRITE_MODE");
        }
        let config = AppConfig::from_env().unwrap();
        assert!(config.token.is_none());
        assert!(config.push.is_none());
        assert_eq!(config.store_path, PathBuf::from("./data/wechat_messages.csv"));
        assert_eq!(config.bind, "0.0.0.0:8000");
        assert_eq!(config.write_mode, WriteMode::Foreground);

        // Push requires the full credential pair.
        // SAFETY: as above.
        unsafe { std::env::set_var("WECHAT_APPID", "wx123") };
        assert!(AppConfig::from_env().unwrap().push.is_none());
        unsafe { std::env::set_var("WECHAT_APPSECRET", "s3cret") };
        assert!(AppConfig::from_env().unwrap().push.is_some());
        unsafe {
            std::env::remove_var("WECHAT_APPID");
            std::env::remove_var("WECHAT_APPSECRET");
        }
    }
}
