//! Cloudflare Turnstile verification
//!
//! The widget posts a token with the form; the server checks it against
//! `siteverify` with the secret key. Disabled in configuration means every
//! check passes.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::CaptchaConfig;

#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("CAPTCHA token is missing")]
    MissingToken,

    #[error("CAPTCHA verification failed")]
    Rejected(Vec<String>),

    #[error("CAPTCHA service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

pub struct CaptchaService {
    config: CaptchaConfig,
    client: reqwest::Client,
}

impl CaptchaService {
    pub fn new(config: CaptchaConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Public key for rendering the widget
    pub fn site_key(&self) -> &str {
        &self.config.site_key
    }

    pub async fn verify(&self, token: Option<&str>, remote_ip: Option<&str>) -> Result<(), CaptchaError> {
        if !self.config.enabled {
            return Ok(());
        }

        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(CaptchaError::MissingToken)?;

        let mut form = vec![("secret", self.config.secret_key.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(&self.config.verify_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| CaptchaError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CaptchaError::Unavailable(format!("status {}", response.status())));
        }

        let body: SiteVerifyResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::Unavailable(e.to_string()))?;

        if body.success {
            Ok(())
        } else {
            tracing::warn!("Turnstile rejected token: {:?}", body.error_codes);
            Err(CaptchaError::Rejected(body.error_codes))
        }
    }
}
