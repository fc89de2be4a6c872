use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NotificationsConfig;
use crate::domain::notification::ManagerNotification;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub request_id: String,
    pub action: String,
}

impl From<&ManagerNotification> for NotificationPayload {
    fn from(notification: &ManagerNotification) -> Self {
        Self {
            title: notification.title.clone(),
            body: notification.message.clone(),
            request_id: notification.request_id.0.clone(),
            action: notification.action.as_str().to_string(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification channel `{0}` is unavailable")]
    ChannelUnavailable(String),
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Fan-out of manager notifications beyond the in-app record.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_notification(
        &self,
        channel: &str,
        target: &str,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError>;
}

/// Delivers by writing a structured log line.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotificationSender;

#[async_trait]
impl NotificationSender for TracingNotificationSender {
    async fn send_notification(
        &self,
        channel: &str,
        target: &str,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError> {
        info!(
            event_name = "notify.manager.sent",
            channel,
            target,
            request_id = %payload.request_id,
            action = %payload.action,
            title = %payload.title,
            "manager notification dispatched"
        );
        Ok(())
    }
}

/// Posts each notification as JSON to a webhook endpoint.
#[derive(Clone)]
pub struct WebhookNotificationSender {
    client: Client,
    url: String,
    token: Option<SecretString>,
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    channel: &'a str,
    target: &'a str,
    #[serde(flatten)]
    payload: &'a NotificationPayload,
}

impl WebhookNotificationSender {
    pub fn new(url: impl Into<String>, token: Option<SecretString>) -> Self {
        Self { client: Client::new(), url: url.into(), token }
    }

    /// `None` unless a webhook endpoint is configured.
    pub fn from_config(config: &NotificationsConfig) -> Option<Self> {
        let url = config.webhook_url.as_ref()?;
        Some(Self::new(url.clone(), config.webhook_token.clone()))
    }
}

#[async_trait]
impl NotificationSender for WebhookNotificationSender {
    async fn send_notification(
        &self,
        channel: &str,
        target: &str,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError> {
        let body = WebhookBody { channel, target, payload };
        let mut request = self.client.post(&self.url).timeout(WEBHOOK_TIMEOUT).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            warn!(
                event_name = "notify.webhook.request_failed",
                channel,
                error = %error,
                "webhook request failed"
            );
            if error.is_connect() {
                NotifyError::ChannelUnavailable(channel.to_string())
            } else {
                NotifyError::Delivery(error.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!("webhook returned {}", response.status())));
        }

        info!(
            event_name = "notify.webhook.sent",
            channel,
            target,
            request_id = %payload.request_id,
            action = %payload.action,
            "manager notification posted"
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotificationSender;

#[async_trait]
impl NotificationSender for NoopNotificationSender {
    async fn send_notification(
        &self,
        _channel: &str,
        _target: &str,
        _payload: &NotificationPayload,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentNotification {
    pub channel: String,
    pub target: String,
    pub payload: NotificationPayload,
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSender {
    sent: Arc<Mutex<Vec<SentNotification>>>,
}

impl InMemoryNotificationSender {
    pub fn sent(&self) -> Vec<SentNotification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl NotificationSender for InMemoryNotificationSender {
    async fn send_notification(
        &self,
        channel: &str,
        target: &str,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError> {
        let entry = SentNotification {
            channel: channel.to_string(),
            target: target.to_string(),
            payload: payload.clone(),
        };
        match self.sent.lock() {
            Ok(mut sent) => sent.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        Ok(())
    }
}
