//! Operator-supplied configuration.

use std::net::SocketAddr;

use tracing::debug;

pub const DEFAULT_IMAGE_MAX_SIZE_MB: f64 = 5.0;
pub const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com";

pub const ENV_APP_ID: &str = "WXMP_APP_ID";
pub const ENV_APP_SECRET: &str = "WXMP_APP_SECRET";
pub const ENV_IMAGE_MAX_SIZE: &str = "WXMP_IMAGE_MAX_SIZE";
pub const ENV_CDN_PREFIX: &str = "WXMP_CDN_PREFIX";
pub const ENV_API_BASE: &str = "WXMP_API_BASE";
pub const ENV_LISTEN: &str = "WXMP_LISTEN";

pub const DEFAULT_LISTEN: ([u8; 4], u16) = ([0, 0, 0, 0], 8000);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub app_id: String,
    pub app_secret: String,
    /// Size ceiling in megabytes.
    pub image_max_size: f64,
    pub cdn_prefix: Option<String>,
    pub api_base: String,
    /// Address the GraphQL surface is served on.
    pub listen: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            image_max_size: DEFAULT_IMAGE_MAX_SIZE_MB,
            cdn_prefix: None,
            api_base: DEFAULT_API_BASE.to_owned(),
            listen: DEFAULT_LISTEN.into(),
        }
    }
}

/// Application identifiers accepted by the authorization endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_secret: String,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let image_max_size = match non_empty(ENV_IMAGE_MAX_SIZE) {
            Some(raw) => parse_size(&raw).ok_or(ConfigurationError::Invalid {
                name: ENV_IMAGE_MAX_SIZE,
                value: raw,
            })?,
            None => DEFAULT_IMAGE_MAX_SIZE_MB,
        };

        let listen: SocketAddr = match non_empty(ENV_LISTEN) {
            Some(raw) => raw.parse().map_err(|_| ConfigurationError::Invalid {
                name: ENV_LISTEN,
                value: raw.clone(),
            })?,
            None => DEFAULT_LISTEN.into(),
        };

        let config = Self {
            app_id: non_empty(ENV_APP_ID).unwrap_or_default(),
            app_secret: non_empty(ENV_APP_SECRET).unwrap_or_default(),
            image_max_size,
            cdn_prefix: non_empty(ENV_CDN_PREFIX),
            api_base: non_empty(ENV_API_BASE).unwrap_or_else(|| DEFAULT_API_BASE.to_owned()),
            listen,
        };
        debug!(
            message = "Loaded configuration",
            app_id = %config.app_id,
            image_max_size = config.image_max_size,
            cdn_prefix = ?config.cdn_prefix,
            api_base = %config.api_base,
            listen = %config.listen,
        );
        Ok(config)
    }

    pub fn app_credentials(&self) -> Result<AppCredentials, ConfigurationError> {
        if self.app_id.is_empty() {
            return Err(ConfigurationError::Missing("appId"));
        }
        if self.app_secret.is_empty() {
            return Err(ConfigurationError::Missing("appSecret"));
        }
        Ok(AppCredentials {
            app_id: self.app_id.clone(),
            app_secret: self.app_secret.clone(),
        })
    }

    /// The CDN prefix without a trailing slash, if one is configured.
    pub fn cdn_prefix(&self) -> Option<&str> {
        self.cdn_prefix
            .as_deref()
            .map(|prefix| prefix.trim_end_matches('/'))
            .filter(|prefix| !prefix.is_empty())
    }
}

fn parse_size(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|size| size.is_finite() && *size > 0.0)
}
