// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./convoy.toml` > `~/.config/convoy/convoy.toml` > `/etc/convoy/convoy.toml`
//! with environment variable overrides via `CONVOY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ConvoyConfig;

/// Sections that accept `CONVOY_<SECTION>_<KEY>` overrides.
const ENV_SECTIONS: &[&str] = &["service", "delivery", "scheduler", "groups", "whatsapp"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/convoy/convoy.toml` (system-wide)
/// 3. `~/.config/convoy/convoy.toml` (user XDG config)
/// 4. `./convoy.toml` (local directory)
/// 5. `CONVOY_*` environment variables
pub fn load_config() -> Result<ConvoyConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ConvoyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConvoyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ConvoyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConvoyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ConvoyConfig::default()))
        .merge(Toml::file("/etc/convoy/convoy.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("convoy/convoy.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("convoy.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `CONVOY_SECTION_KEY` to `section.key`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `CONVOY_DELIVERY_RETRY_BUDGET` maps to `delivery.retry_budget`.
fn env_provider() -> Env {
    Env::prefixed("CONVOY_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
