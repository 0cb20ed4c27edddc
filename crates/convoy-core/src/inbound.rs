// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider-neutral inbound webhook events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::ProviderError;
use crate::types::MessageContent;

/// A message sent by a counterpart to one of the tenant's numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Provider phone-number id of the receiving tenant.
    pub phone_number_id: String,
    pub provider_message_id: String,
    /// Sender phone number as reported by the provider.
    pub from: String,
    /// Profile name the provider attached to the sender, if any.
    pub profile_name: Option<String>,
    /// Provider-side group id for group messages.
    pub group_id: Option<String>,
    /// The participant who authored a group message, when it differs from `from`.
    pub participant: Option<String>,
    /// Provider id of the message this one quotes.
    pub context_message_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub content: MessageContent,
}

impl InboundEvent {
    /// Phone number of the actual author.
    pub fn author_phone(&self) -> &str {
        self.participant.as_deref().unwrap_or(&self.from)
    }
}

/// Delivery progress reported by the provider for an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderStatus {
    Sent,
    Delivered,
    Read,
    /// Voice note played; implies read.
    Played,
    Failed,
}

/// A status callback for a previously accepted outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub phone_number_id: String,
    pub provider_message_id: String,
    pub status: ProviderStatus,
    pub timestamp: DateTime<Utc>,
    /// Populated for `failed` callbacks.
    pub error: Option<ProviderError>,
}

/// One decoded webhook entry.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Inbound(InboundEvent),
    Status(StatusUpdate),
}
