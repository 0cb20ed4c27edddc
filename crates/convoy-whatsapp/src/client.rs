// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp Cloud API.
//!
//! [`WhatsAppClient`] performs exactly one send attempt per call. Retries,
//! backoff and classification belong to the delivery engine.

use std::time::Duration;

use async_trait::async_trait;
use convoy_config::model::WhatsAppConfig;
use convoy_core::model::Team;
use convoy_core::traits::{OutboundPayload, ProviderReceipt};
use convoy_core::{ConvoyError, Destination, ProviderClient, ProviderError};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::types::{GraphErrorResponse, SendRequest, SendResponse};

/// Graph API client shared by every team; credentials come from the [`Team`].
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    base_url: String,
}

impl WhatsAppClient {
    /// Creates a client for `base_url` (e.g. `https://graph.facebook.com`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ConvoyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConvoyError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &WhatsAppConfig, timeout: Duration) -> Result<Self, ConvoyError> {
        Self::new(&config.graph_base_url, timeout)
    }

    fn messages_url(&self, team: &Team) -> String {
        format!(
            "{}/{}/{}/messages",
            self.base_url, team.api_version, team.phone_number_id
        )
    }
}

#[async_trait]
impl ProviderClient for WhatsAppClient {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn attempt_send(
        &self,
        destination: &Destination,
        payload: &OutboundPayload,
        team: &Team,
    ) -> Result<ProviderReceipt, ProviderError> {
        let request = SendRequest::new(
            destination.phone(),
            &payload.content,
            payload.context_message_id.as_deref(),
        );

        let response = self
            .client
            .post(self.messages_url(team))
            .bearer_auth(team.access_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        debug!(status = %status, team_id = %team.id, kind = payload.content.type_name(), "send response received");

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<GraphErrorResponse>(&body) {
                Ok(envelope) => {
                    ProviderError::api(status.as_u16(), envelope.error.code, envelope.error.message)
                }
                Err(_) => ProviderError::api(status.as_u16(), None, format!("API returned {status}: {body}")),
            });
        }

        let parsed: SendResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::api(status.as_u16(), None, format!("failed to parse API response: {e}"))
        })?;
        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| ProviderReceipt {
                provider_message_id: m.id,
            })
            .ok_or_else(|| ProviderError::api(status.as_u16(), None, "response carried no message id"))
    }
}
