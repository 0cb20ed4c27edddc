// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Convoy messaging bridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Convoy configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConvoyConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Delivery retry policy.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Background retry scheduler.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Group fan-out behaviour.
    #[serde(default)]
    pub groups: GroupsConfig,

    /// WhatsApp Cloud API and webhook settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Tenants and their provider credentials.
    #[serde(default)]
    pub teams: Vec<TeamConfig>,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "convoy".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Delivery retry policy.
///
/// A failed attempt is retried at `now + min(base * 2^retry_count, max)` until
/// `retry_count` exceeds `retry_budget`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Number of retries allowed after the first failed attempt.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    /// Backoff seed in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff cap in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Per-attempt provider timeout; an elapsed attempt counts as a transient failure.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl DeliveryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry_budget: default_retry_budget(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_retry_budget() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_send_timeout_secs() -> u64 {
    15
}

/// Background retry scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Run the retry scheduler inside `convoy serve`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between scans for due retries.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum number of messages retried per scan.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_batch_size() -> usize {
    100
}

/// Group fan-out configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GroupsConfig {
    /// Relay a participant's inbound group message to the other active participants.
    #[serde(default = "default_true")]
    pub relay_inbound: bool,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            relay_inbound: true,
        }
    }
}

/// WhatsApp Cloud API and webhook configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Graph API base URL.
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    /// API version used by teams that do not set their own.
    #[serde(default = "default_api_version")]
    pub default_api_version: String,

    /// App secret for `X-Hub-Signature-256` verification. `None` disables verification.
    #[serde(default)]
    pub app_secret: Option<String>,

    /// Token expected during the webhook subscription handshake.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// Address the webhook listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port the webhook listener binds to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            graph_base_url: default_graph_base_url(),
            default_api_version: default_api_version(),
            app_secret: None,
            verify_token: None,
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v21.0".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8088
}

/// One tenant and its provider credentials, declared via `[[teams]]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TeamConfig {
    /// Numeric team id.
    pub id: i64,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// WhatsApp phone-number id the team sends from.
    #[serde(default)]
    pub phone_number_id: String,

    /// Graph API access token.
    #[serde(default)]
    pub access_token: String,

    /// WhatsApp business account id.
    #[serde(default)]
    pub business_account_id: Option<String>,

    /// API version override; falls back to `whatsapp.default_api_version`.
    #[serde(default)]
    pub api_version: Option<String>,

    /// Country calling code, digits only (e.g. "31").
    #[serde(default)]
    pub country_code: String,

    /// Inactive teams keep their history but cannot send.
    #[serde(default = "default_true")]
    pub active: bool,

    /// Provider attempts allowed per minute.
    #[serde(default = "default_messages_per_minute")]
    pub messages_per_minute: u32,

    /// Provider attempts allowed per UTC day (`None` = unlimited).
    #[serde(default)]
    pub messages_per_day: Option<u32>,
}

fn default_messages_per_minute() -> u32 {
    80
}
