// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API integration for Convoy.
//!
//! - [`WhatsAppClient`] sends messages through the Graph API using each
//!   team's own credentials.
//! - [`GraphErrorClassifier`] sorts Graph API failures into transient and
//!   permanent.
//! - [`webhook`] verifies, parses and forwards inbound webhook deliveries.

pub mod classify;
pub mod client;
pub mod types;
pub mod webhook;

pub use classify::GraphErrorClassifier;
pub use client::WhatsAppClient;
pub use convoy_core::phone::normalize_phone;
pub use webhook::{parse_webhook, verify_signature, webhook_router, WebhookError, WebhookState};
