//! Outbound email for password reset codes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::EmailConfig;

const RESET_SUBJECT: &str = "BodyMetrics - Password Reset Code";

/// Errors raised while delivering mail.
#[derive(Debug, Error)]
pub enum MailError {
    /// The request never got a response
    #[error("mail transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with an error status
    #[error("mail provider returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers password reset codes.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to: &str, code: &str) -> Result<(), MailError>;
}

/// Sends mail through the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_password_reset(&self, to: &str, code: &str) -> Result<(), MailError> {
        let payload = json!({
            "from": self.from,
            "to": [to],
            "subject": RESET_SUBJECT,
            "html": reset_email_html(code),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "Mail provider accepted message");
        Ok(())
    }
}

/// Writes reset codes to the log instead of sending them. Used when no
/// provider key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, to: &str, code: &str) -> Result<(), MailError> {
        info!(to = %to, "Mail delivery disabled; reset code issued");
        debug!(to = %to, code = %code, "Reset code");
        Ok(())
    }
}

/// Pick the mailer the configuration asks for.
pub fn from_config(config: &EmailConfig) -> Arc<dyn Mailer> {
    match config.resend_api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => Arc::new(ResendMailer::new(&config.endpoint, key, &config.from)),
        None => Arc::new(LogMailer),
    }
}

fn reset_email_html(code: &str) -> String {
    format!(
        "<p>Use this code to reset your BodyMetrics password:</p>\
         <p style=\"font-size:32px;font-weight:bold;letter-spacing:8px\">{code}</p>\
         <p>The code is valid for a limited time. If you did not ask for it, ignore this email.</p>"
    )
}
