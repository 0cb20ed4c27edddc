// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook surface for the WhatsApp Cloud API.
//!
//! `GET /webhook` answers the subscription handshake. `POST /webhook` checks
//! the `X-Hub-Signature-256` header, decodes the delivery into provider-neutral
//! [`WebhookEvent`]s and pushes them onto a channel for the engine.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use convoy_core::inbound::{InboundEvent, ProviderStatus, StatusUpdate, WebhookEvent};
use convoy_core::types::MediaKind;
use convoy_core::{MessageContent, ProviderError};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::{InboundMedia, StatusError, WebhookMessage, WebhookPayload, WebhookStatus};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("malformed webhook payload: {0}")]
    Malformed(String),

    #[error("webhook signature mismatch")]
    InvalidSignature,
}

/// Shared state for the webhook routes.
#[derive(Debug, Clone)]
pub struct WebhookState {
    app_secret: Option<Arc<SecretString>>,
    verify_token: Option<Arc<SecretString>>,
    events: mpsc::Sender<WebhookEvent>,
}

impl WebhookState {
    /// `app_secret: None` disables signature verification.
    pub fn new(
        app_secret: Option<SecretString>,
        verify_token: Option<SecretString>,
        events: mpsc::Sender<WebhookEvent>,
    ) -> Self {
        Self {
            app_secret: app_secret.map(Arc::new),
            verify_token: verify_token.map(Arc::new),
            events,
        }
    }

    fn check_signature(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), WebhookError> {
        let Some(secret) = &self.app_secret else {
            return Ok(());
        };
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(WebhookError::InvalidSignature)?;
        if verify_signature(secret.expose_secret().as_bytes(), body, header) {
            Ok(())
        } else {
            Err(WebhookError::InvalidSignature)
        }
    }
}

/// Checks a `sha256=<hex>` signature over `body` in constant time.
pub fn verify_signature(secret: &[u8], body: &[u8], header: &str) -> bool {
    let Some(hex_digest) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Builds the `/webhook` routes.
pub fn webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(handshake).post(receive))
        .with_state(state)
}

async fn handshake(
    State(state): State<WebhookState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, StatusCode> {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token");
    let challenge = params.get("hub.challenge");

    match (&state.verify_token, mode, token, challenge) {
        (Some(expected), Some("subscribe"), Some(token), Some(challenge))
            if token.as_str() == expected.expose_secret() =>
        {
            debug!("webhook subscription verified");
            Ok(challenge.clone())
        }
        _ => {
            warn!("webhook subscription handshake rejected");
            Err(StatusCode::FORBIDDEN)
        }
    }
}

async fn receive(State(state): State<WebhookState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if let Err(e) = state.check_signature(&headers, &body) {
        warn!(error = %e, "rejecting webhook delivery");
        return StatusCode::UNAUTHORIZED;
    }

    let events = match parse_webhook(&body) {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "rejecting webhook delivery");
            return StatusCode::BAD_REQUEST;
        }
    };

    debug!(count = events.len(), "webhook delivery decoded");
    for event in events {
        if state.events.send(event).await.is_err() {
            warn!("webhook consumer is gone");
            return StatusCode::SERVICE_UNAVAILABLE;
        }
    }
    StatusCode::OK
}

/// Decodes a webhook body. Unsupported message and status types are skipped.
pub fn parse_webhook(body: &[u8]) -> Result<Vec<WebhookEvent>, WebhookError> {
    let payload: WebhookPayload =
        serde_json::from_slice(body).map_err(|e| WebhookError::Malformed(e.to_string()))?;
    if payload.object != "whatsapp_business_account" {
        return Err(WebhookError::Malformed(format!(
            "unexpected object {:?}",
            payload.object
        )));
    }

    let mut events = Vec::new();
    for change in payload.entry.into_iter().flat_map(|e| e.changes) {
        if change.field != "messages" {
            debug!(field = %change.field, "skipping webhook change");
            continue;
        }
        let value = change.value;
        let Some(metadata) = value.metadata else {
            return Err(WebhookError::Malformed("change without metadata".into()));
        };
        let phone_number_id = metadata.phone_number_id;

        for message in value.messages {
            let profile_name = value
                .contacts
                .iter()
                .find(|c| c.wa_id == message.from)
                .and_then(|c| c.profile.as_ref())
                .map(|p| p.name.clone());
            if let Some(event) = inbound_event(&phone_number_id, message, profile_name)? {
                events.push(WebhookEvent::Inbound(event));
            }
        }
        for status in value.statuses {
            if let Some(update) = status_update(&phone_number_id, status)? {
                events.push(WebhookEvent::Status(update));
            }
        }
    }
    Ok(events)
}

fn inbound_event(
    phone_number_id: &str,
    message: WebhookMessage,
    profile_name: Option<String>,
) -> Result<Option<InboundEvent>, WebhookError> {
    let timestamp = parse_timestamp(&message.timestamp)?;
    let Some(content) = inbound_content(&message) else {
        debug!(kind = %message.kind, id = %message.id, "skipping unsupported message type");
        return Ok(None);
    };
    Ok(Some(InboundEvent {
        phone_number_id: phone_number_id.to_string(),
        provider_message_id: message.id,
        from: message.from,
        profile_name,
        group_id: message.group_id,
        participant: None,
        context_message_id: message.context.map(|c| c.id),
        timestamp,
        content,
    }))
}

/// Media arrives as a provider media id; it is stored in place of a URL.
fn inbound_content(message: &WebhookMessage) -> Option<MessageContent> {
    let media = |kind: MediaKind, media: &Option<InboundMedia>| {
        media.as_ref().map(|m| MessageContent::Media {
            kind,
            url: m.id.clone(),
            caption: m.caption.clone(),
        })
    };
    match message.kind.as_str() {
        "text" => message.text.as_ref().map(|t| MessageContent::text(&t.body)),
        "image" => media(MediaKind::Image, &message.image),
        "video" => media(MediaKind::Video, &message.video),
        "audio" => media(MediaKind::Audio, &message.audio),
        "document" => media(MediaKind::Document, &message.document),
        "sticker" => media(MediaKind::Sticker, &message.sticker),
        "location" => message.location.as_ref().map(|l| MessageContent::Location {
            latitude: l.latitude,
            longitude: l.longitude,
            name: l.name.clone(),
        }),
        "contacts" => message
            .contacts
            .as_ref()
            .and_then(|cards| cards.first())
            .and_then(|card| {
                let phone = card
                    .phones
                    .iter()
                    .find_map(|p| p.phone.clone().or_else(|| p.wa_id.clone()))?;
                Some(MessageContent::Contact {
                    name: card.name.formatted_name.clone(),
                    phone,
                })
            }),
        _ => None,
    }
}

fn status_update(
    phone_number_id: &str,
    status: WebhookStatus,
) -> Result<Option<StatusUpdate>, WebhookError> {
    let kind = match status.status.as_str() {
        "sent" => ProviderStatus::Sent,
        "delivered" => ProviderStatus::Delivered,
        "read" => ProviderStatus::Read,
        "played" => ProviderStatus::Played,
        "failed" => ProviderStatus::Failed,
        other => {
            debug!(status = other, id = %status.id, "skipping unsupported status");
            return Ok(None);
        }
    };
    let timestamp = parse_timestamp(&status.timestamp)?;
    let error = status.errors.into_iter().next().map(status_error);
    Ok(Some(StatusUpdate {
        phone_number_id: phone_number_id.to_string(),
        provider_message_id: status.id,
        status: kind,
        timestamp,
        error,
    }))
}

fn status_error(error: StatusError) -> ProviderError {
    ProviderError {
        http_status: None,
        code: Some(error.code),
        message: error.message.unwrap_or(error.title),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, WebhookError> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| WebhookError::Malformed(format!("invalid timestamp {raw:?}")))
}
