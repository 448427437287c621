//! Outbound push — text messages through the platform's REST API.
//!
//! The access token comes from a separate token-issuing endpoint with a
//! server-declared expiry. It is cached as explicit `{token, expires_at}`
//! state on the client rather than process-wide, and refreshed transparently
//! by [`PushClient::access_token`].

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::PushError;

const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com";

/// Refresh this long before the declared expiry.
const EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > Duration::seconds(EXPIRY_SLACK_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    errcode: Option<i64>,
    errmsg: Option<String>,
}

/// REST client for the platform's custom-message push API.
pub struct PushClient {
    app_id: String,
    app_secret: SecretString,
    api_base: String,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl PushClient {
    pub fn new(app_id: String, app_secret: SecretString) -> Self {
        Self {
            app_id,
            app_secret,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    /// Point the client at a different API host. Test hook.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Current access token, refreshed from the token endpoint when the
    /// cached one has less than a minute of life left.
    pub async fn access_token(&self) -> Result<String, PushError> {
        let mut cache = self.token.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(Utc::now()) {
                return Ok(cached.token.clone());
            }
        }

        let fetched = self.fetch_token().await?;
        let token = fetched.token.clone();
        *cache = Some(fetched);
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, PushError> {
        let url = format!(
            "{}/cgi-bin/token?grant_type=client_credential&appid={}&secret={}",
            self.api_base,
            self.app_id,
            self.app_secret.expose_secret(),
        );

        let resp: TokenResponse = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PushError::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| PushError::Http(e.to_string()))?;

        match resp.access_token {
            Some(token) => {
                let expires_in = resp.expires_in.unwrap_or(7200);
                debug!(expires_in, "access token refreshed");
                Ok(CachedToken {
                    token,
                    expires_at: Utc::now() + Duration::seconds(expires_in),
                })
            }
            None => Err(PushError::TokenDenied {
                errcode: resp.errcode.unwrap_or(-1),
                errmsg: resp.errmsg.unwrap_or_else(|| "no access_token in response".into()),
            }),
        }
    }

    /// Push a text message to a single account.
    pub async fn send_text(&self, openid: &str, content: &str) -> Result<(), PushError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/cgi-bin/message/custom/send?access_token={token}",
            self.api_base
        );
        let body = serde_json::json!({
            "touser": openid,
            "msgtype": "text",
            "text": { "content": content },
        });

        let resp: SendResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PushError::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| PushError::Http(e.to_string()))?;

        match resp.errcode.unwrap_or(0) {
            0 => {
                info!(openid, "text message pushed");
                Ok(())
            }
            errcode => Err(PushError::SendDenied {
                openid: openid.to_string(),
                errcode,
                errmsg: resp.errmsg.unwrap_or_default(),
            }),
        }
    }

    #[cfg(test)]
    fn seed_token(&self, token: &str, expires_at: DateTime<Utc>) {
        *self.token.try_lock().unwrap() = Some(CachedToken {
            token: token.to_string(),
            expires_at,
        });
    }
}
