// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express:
//! retry policy bounds, scheduler intervals, and tenant uniqueness.

use std::collections::HashSet;

use tracing::debug;

use crate::diagnostic::ConfigError;
use crate::model::ConvoyConfig;

/// Upper bound on the retry budget; beyond it backoff caps dominate and
/// failures linger for hours.
const MAX_RETRY_BUDGET: u32 = 20;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ConvoyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let delivery = &config.delivery;
    if delivery.retry_budget == 0 || delivery.retry_budget > MAX_RETRY_BUDGET {
        fail(format!(
            "delivery.retry_budget must be between 1 and {MAX_RETRY_BUDGET}, got {}",
            delivery.retry_budget
        ));
    }
    if delivery.backoff_base_ms == 0 {
        fail("delivery.backoff_base_ms must be greater than 0".to_string());
    }
    if delivery.backoff_max_ms < delivery.backoff_base_ms {
        fail(format!(
            "delivery.backoff_max_ms ({}) must not be lower than delivery.backoff_base_ms ({})",
            delivery.backoff_max_ms, delivery.backoff_base_ms
        ));
    }
    if delivery.send_timeout_secs == 0 {
        fail("delivery.send_timeout_secs must be greater than 0".to_string());
    }

    if config.scheduler.poll_interval_secs == 0 {
        fail("scheduler.poll_interval_secs must be greater than 0".to_string());
    }
    if config.scheduler.batch_size == 0 {
        fail("scheduler.batch_size must be greater than 0".to_string());
    }

    if config.whatsapp.bind_address.trim().is_empty() {
        fail("whatsapp.bind_address must not be empty".to_string());
    }
    if !config.whatsapp.graph_base_url.starts_with("http://")
        && !config.whatsapp.graph_base_url.starts_with("https://")
    {
        fail(format!(
            "whatsapp.graph_base_url `{}` must be an http(s) URL",
            config.whatsapp.graph_base_url
        ));
    }

    let mut seen_ids = HashSet::new();
    let mut seen_numbers = HashSet::new();
    for (i, team) in config.teams.iter().enumerate() {
        if !seen_ids.insert(team.id) {
            fail(format!("duplicate team id `{}` in [[teams]] array", team.id));
        }

        if !team.country_code.is_empty() && !team.country_code.chars().all(|c| c.is_ascii_digit())
        {
            fail(format!(
                "teams[{i}].country_code must contain digits only, got `{}`",
                team.country_code
            ));
        }

        if team.messages_per_minute == 0 {
            fail(format!("teams[{i}].messages_per_minute must be greater than 0"));
        }
        if team.messages_per_day == Some(0) {
            fail(format!("teams[{i}].messages_per_day must be greater than 0 when set"));
        }

        if !team.active {
            continue;
        }
        if team.phone_number_id.trim().is_empty() {
            fail(format!("teams[{i}].phone_number_id must not be empty for an active team"));
        } else if !seen_numbers.insert(team.phone_number_id.as_str()) {
            fail(format!(
                "teams[{i}].phone_number_id `{}` is already used by another team",
                team.phone_number_id
            ));
        }
        if team.access_token.trim().is_empty() {
            fail(format!("teams[{i}].access_token must not be empty for an active team"));
        }
        if team.country_code.is_empty() {
            fail(format!("teams[{i}].country_code must not be empty for an active team"));
        }
    }

    if errors.is_empty() {
        debug!(teams = config.teams.len(), "configuration validated");
        Ok(())
    } else {
        Err(errors)
    }
}
