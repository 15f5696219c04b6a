use crate::error::{Error, ErrorKind, Result};
use clap::Args;
use reqwest::Url;
use std::time::Duration;

/// Upstream endpoints, secrets and timings of the resolution pipeline.
#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Base url of the upstream api. The `video-url`, `otp` and `verify-token`
    /// endpoints are resolved under it.
    #[arg(long, env = "VIDKEY_API_BASE", value_name = "URL")]
    pub api_base: Url,

    /// Passphrase the payload key is derived from.
    #[arg(long, env = "VIDKEY_PASSPHRASE", hide_env_values = true)]
    pub passphrase: String,

    /// Send `origin` and `referer` headers pointing at this url.
    #[arg(long, env = "VIDKEY_ORIGIN", value_name = "URL")]
    pub origin: Option<Url>,

    /// Acquire a verified token and reuse it as device id.
    #[arg(long, env = "VIDKEY_VERIFY_TOKENS", default_value_t = true, action = clap::ArgAction::Set)]
    pub verify_tokens: bool,

    /// Timeout in seconds of the video url request.
    #[arg(long, default_value_t = 30, value_name = "SECS", help_heading = "Timing Options")]
    pub request_timeout: u64,

    /// Timeout in seconds of the manifest request.
    #[arg(long, default_value_t = 20, value_name = "SECS", help_heading = "Timing Options")]
    pub manifest_timeout: u64,

    /// Timeout in seconds of the token verification request.
    #[arg(long, default_value_t = 15, value_name = "SECS", help_heading = "Timing Options")]
    pub token_timeout: u64,

    /// Timeout in seconds of the content key request.
    /// Must be shorter than `--request-timeout`.
    #[arg(long, default_value_t = 10, value_name = "SECS", help_heading = "Timing Options")]
    pub drm_timeout: u64,

    /// Seconds a completed resolution is reused.
    #[arg(long, default_value_t = 300, value_name = "SECS", help_heading = "Timing Options")]
    pub result_ttl: u64,

    /// Seconds a verified token is reused.
    #[arg(long, default_value_t = 1800, value_name = "SECS", help_heading = "Timing Options")]
    pub token_ttl: u64,
}

impl Config {
    /// Configuration with default timings.
    pub fn new(api_base: Url, passphrase: impl Into<String>) -> Self {
        Self {
            api_base,
            passphrase: passphrase.into(),
            origin: None,
            verify_tokens: true,
            request_timeout: 30,
            manifest_timeout: 20,
            token_timeout: 15,
            drm_timeout: 10,
            result_ttl: 300,
            token_ttl: 1800,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.passphrase.is_empty() {
            return Err("passphrase must not be empty".to_owned());
        }

        if self.drm_timeout >= self.request_timeout {
            return Err(format!(
                "drm timeout ({}s) must be shorter than request timeout ({}s)",
                self.drm_timeout, self.request_timeout
            ));
        }

        Ok(())
    }

    /// Join `path` under the api base, keeping the base's own path.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.api_base.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        base.join(path).map_err(|e| {
            Error::new(ErrorKind::Internal(format!(
                "invalid endpoint {}: {}",
                path, e
            )))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout)
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout)
    }

    pub fn drm_timeout(&self) -> Duration {
        Duration::from_secs(self.drm_timeout)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl)
    }
}
