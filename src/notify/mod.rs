//! Outbound messages: deployment notifications and error reports.

pub mod reporter;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::DeployError;

pub use reporter::{ErrorReporter, HttpErrorReporter, LogReporter};

/// Delivers the human-readable summary of a deployment
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), DeployError>;
}

/// `<name> has been deployed: a, b`
pub fn deploy_message(deployment_name: &str, services: &[String]) -> String {
    format!("{deployment_name} has been deployed: {}", services.join(", "))
}

/// Posts `message=<text>` as a urlencoded form to a webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, DeployError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeployError::Notification(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> Result<(), DeployError> {
        self.client
            .post(&self.url)
            .form(&[("message", message)])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| DeployError::Notification(e.to_string()))?;
        Ok(())
    }
}
