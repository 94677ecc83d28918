use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

use crate::error::DeployError;
use crate::RELEASE;

/// Receives every per-item failure of a cycle together with structured context.
/// Reporting never fails the caller.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, error: &DeployError, context: JsonValue);
}

/// Default reporter: the failure only goes to the log
#[derive(Debug, Clone, Default)]
pub struct LogReporter;

#[async_trait]
impl ErrorReporter for LogReporter {
    async fn report(&self, error: &DeployError, context: JsonValue) {
        log::error!("[{}] {error} context={context}", error.kind());
    }
}

/// Forwards failures as JSON to an external error collector
#[derive(Debug, Clone)]
pub struct HttpErrorReporter {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpErrorReporter {
    pub fn new(url: impl Into<String>, token: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }

    pub fn payload(error: &DeployError, context: JsonValue) -> JsonValue {
        json!({
            "error": error.to_string(),
            "kind": error.kind(),
            "context": context,
            "release": RELEASE,
            "timestamp": Utc::now().to_rfc3339(),
        })
    }
}

#[async_trait]
impl ErrorReporter for HttpErrorReporter {
    async fn report(&self, error: &DeployError, context: JsonValue) {
        log::error!("[{}] {error} context={context}", error.kind());

        let mut request = self
            .client
            .post(&self.url)
            .json(&Self::payload(error, context));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        match request.send().await.and_then(|r| r.error_for_status()) {
            Ok(_) => log::debug!("error report delivered to {}", self.url),
            Err(e) => log::warn!("unable to deliver error report to {}: {e}", self.url),
        }
    }
}
