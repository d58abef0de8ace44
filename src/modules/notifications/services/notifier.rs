use super::super::models::Notification;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Notification service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid notification: {0}")]
    Invalid(String),
}

impl NotifyError {
    /// Whether a later attempt could succeed
    ///
    /// Network failures, timeouts, 5xx and 429 are transient. Everything else,
    /// validation failures included, is final.
    pub fn is_transient(&self) -> bool {
        match self {
            NotifyError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().map(is_transient_status).unwrap_or(false)
            }
            NotifyError::Status { status, .. } => StatusCode::from_u16(*status)
                .map(is_transient_status)
                .unwrap_or(false),
            NotifyError::Timeout(_) => true,
            NotifyError::Invalid(_) => false,
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Sends one notification, one attempt
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Posts notifications as JSON to the notification subsystem
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if notification.recipient.trim().is_empty() {
            return Err(NotifyError::Invalid("recipient is empty".into()));
        }

        debug!(template = %notification.template, tag = %notification.tag, "Sending notification");

        let response = self.client.post(&self.url).json(notification).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status { status, body });
        }

        Ok(())
    }
}

/// Logs notifications instead of sending them, used when no URL is configured
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            template = %notification.template,
            tag = %notification.tag,
            "Notification (not sent, no notification URL configured)"
        );
        Ok(())
    }
}
