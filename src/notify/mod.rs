//! Run notifications.
//!
//! A run ends with exactly one [`Notification`] when notifications are
//! enabled. Delivery failures are the caller's to log; they never change
//! the outcome of the run.
//!
//! # Submodules
//!
//! - [`webhook`] - JSON POST to an HTTP endpoint

pub mod webhook;

pub use webhook::WebhookNotifier;

use crate::config::NotifySettings;
use crate::error::Result;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use tracing::{error, info};

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failure(String),
}

/// Subject and body describing one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub job: String,
    pub outcome: RunOutcome,
}

impl Notification {
    #[must_use]
    pub fn new(job: impl Into<String>, outcome: RunOutcome) -> Self {
        Self {
            job: job.into(),
            outcome,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Success)
    }

    #[must_use]
    pub fn subject(&self) -> String {
        let kind = if self.is_success() { "Success" } else { "Error" };
        format!("{} - {kind}", self.job)
    }

    #[must_use]
    pub fn body(&self) -> String {
        match &self.outcome {
            RunOutcome::Success => format!("{} completed successfully.", self.job),
            RunOutcome::Failure(detail) => format!("{} encountered an error.\n{detail}", self.job),
        }
    }

    /// Wire form sent to webhooks.
    #[must_use]
    pub fn payload(&self) -> NotificationPayload {
        NotificationPayload {
            job: self.job.clone(),
            status: if self.is_success() { "success" } else { "error" },
            subject: self.subject(),
            body: self.body(),
            text: format!("{}\n{}", self.subject(), self.body()),
        }
    }
}

/// JSON body of a webhook notification.
///
/// `text` carries subject and body together for chat webhooks that only
/// render a single text field.
#[derive(Debug, Serialize)]
pub struct NotificationPayload {
    pub job: String,
    pub status: &'static str,
    pub subject: String,
    pub body: String,
    pub text: String,
}

/// Trait for notification channels.
pub trait Notifier: Send + Sync {
    /// Short channel name for logs.
    fn name(&self) -> &'static str;

    /// Deliver one notification.
    fn notify(&self, notification: &Notification) -> impl Future<Output = Result<()>> + Send;
}

/// Writes the notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        if notification.is_success() {
            info!(subject = %notification.subject(), "{}", notification.body());
        } else {
            error!(subject = %notification.subject(), "{}", notification.body());
        }
        Ok(())
    }
}

/// Boxed notifier for runtime channel selection.
///
/// The trait's `impl Future` methods are not object-safe, so dispatch goes
/// through [`NotifierBoxed`].
pub struct BoxedNotifier {
    inner: Box<dyn NotifierBoxed>,
}

/// Object-safe version of [`Notifier`] for boxing.
pub trait NotifierBoxed: Send + Sync {
    fn name(&self) -> &'static str;
    fn notify_boxed<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

struct BoxedNotifierWrapper<N: Notifier + 'static>(N);

impl<N: Notifier + 'static> NotifierBoxed for BoxedNotifierWrapper<N> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn notify_boxed<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.0.notify(notification))
    }
}

impl BoxedNotifier {
    pub fn new<N: Notifier + 'static>(notifier: N) -> Self {
        Self {
            inner: Box::new(BoxedNotifierWrapper(notifier)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns the channel's delivery error.
    pub async fn notify(&self, notification: &Notification) -> Result<()> {
        self.inner.notify_boxed(notification).await
    }
}

/// Create the configured notifier.
///
/// Returns `None` when notifications are disabled. Enabled without a
/// webhook URL falls back to the log.
///
/// # Errors
///
/// Returns `Transport` if the webhook HTTP client cannot be built.
pub fn create_notifier(settings: &NotifySettings) -> Result<Option<BoxedNotifier>> {
    if !settings.enabled {
        return Ok(None);
    }
    let notifier = match &settings.webhook_url {
        Some(url) => BoxedNotifier::new(WebhookNotifier::new(url.clone())?),
        None => BoxedNotifier::new(LogNotifier),
    };
    Ok(Some(notifier))
}
