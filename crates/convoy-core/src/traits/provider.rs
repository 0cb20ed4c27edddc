// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound provider client contract and failure classification.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::Team;
use crate::types::{Destination, MessageContent};

/// What the engine asks the provider to deliver to one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPayload {
    pub content: MessageContent,
    /// Provider id of the message being replied to, for quoted replies.
    pub context_message_id: Option<String>,
}

/// Synchronous acceptance of a send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReceipt {
    pub provider_message_id: String,
}

/// A rejected or failed send attempt, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// HTTP status, when the provider answered at all.
    pub http_status: Option<u16>,
    /// Provider-specific error code.
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    /// The request never reached the provider or no answer came back.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            http_status: None,
            code: None,
            message: message.into(),
        }
    }

    /// The provider answered with an error.
    pub fn api(http_status: u16, code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            http_status: Some(http_status),
            code,
            message: message.into(),
        }
    }
}

/// Whether a failed attempt may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureClass {
    Transient,
    Permanent,
}

/// Maps provider failures to [`FailureClass`].
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &ProviderError) -> FailureClass;
}

/// Fallback classifier that only looks at the HTTP status.
///
/// Transport failures, 408, 429 and 5xx are transient; every other answer is permanent.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpStatusClassifier;

impl ErrorClassifier for HttpStatusClassifier {
    fn classify(&self, error: &ProviderError) -> FailureClass {
        match error.http_status {
            None => FailureClass::Transient,
            Some(408 | 429) => FailureClass::Transient,
            Some(s) if s >= 500 => FailureClass::Transient,
            Some(_) => FailureClass::Permanent,
        }
    }
}

/// Transmits messages through the external messaging provider.
#[async_trait]
pub trait ProviderClient: Send + Sync + 'static {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    /// Attempt a single transmission to one destination using the team's credentials.
    async fn attempt_send(
        &self,
        destination: &Destination,
        payload: &OutboundPayload,
        team: &Team,
    ) -> Result<ProviderReceipt, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_classifier() {
        let c = HttpStatusClassifier;
        assert_eq!(
            c.classify(&ProviderError::transport("connection reset")),
            FailureClass::Transient
        );
        assert_eq!(
            c.classify(&ProviderError::api(503, None, "unavailable")),
            FailureClass::Transient
        );
        assert_eq!(
            c.classify(&ProviderError::api(429, None, "slow down")),
            FailureClass::Transient
        );
        assert_eq!(
            c.classify(&ProviderError::api(400, Some(100), "bad param")),
            FailureClass::Permanent
        );
    }
}
