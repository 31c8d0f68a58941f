//! Webhook notifier.

use crate::error::{Error, Result};
use std::time::Duration;
use tracing::debug;

use super::{Notification, Notifier};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts the notification payload as JSON to a URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns `Transport` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&notification.payload())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "webhook returned HTTP {status}: {body}"
            )));
        }
        debug!(url = %self.url, "Notification delivered");
        Ok(())
    }
}
