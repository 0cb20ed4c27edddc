// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Convoy configuration system.

use convoy_config::diagnostic::ConfigError;
use convoy_config::model::ConvoyConfig;
use convoy_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_convoy_config() {
    let toml = r#"
[service]
name = "convoy-test"
log_level = "debug"

[delivery]
retry_budget = 5
backoff_base_ms = 250
backoff_max_ms = 8000
send_timeout_secs = 5

[scheduler]
enabled = false
poll_interval_secs = 3
batch_size = 20

[groups]
relay_inbound = false

[whatsapp]
graph_base_url = "http://localhost:9999"
default_api_version = "v20.0"
app_secret = "shh"
verify_token = "hello"
port = 9000

[[teams]]
id = 7
name = "Rotterdam"
phone_number_id = "10987"
access_token = "EAAG-token"
country_code = "31"
messages_per_minute = 30
messages_per_day = 1000

[[teams]]
id = 8
name = "Legacy"
active = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "convoy-test");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.delivery.retry_budget, 5);
    assert_eq!(config.delivery.backoff_base().as_millis(), 250);
    assert_eq!(config.delivery.backoff_max().as_millis(), 8000);
    assert_eq!(config.delivery.send_timeout().as_secs(), 5);
    assert!(!config.scheduler.enabled);
    assert_eq!(config.scheduler.batch_size, 20);
    assert!(!config.groups.relay_inbound);
    assert_eq!(config.whatsapp.app_secret.as_deref(), Some("shh"));
    assert_eq!(config.whatsapp.port, 9000);
    assert_eq!(config.teams.len(), 2);
    assert_eq!(config.teams[0].messages_per_day, Some(1000));
    assert!(config.teams[0].active);
    assert!(!config.teams[1].active);
    assert_eq!(config.teams[1].messages_per_minute, 80);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.service.name, "convoy");
    assert_eq!(config.delivery.retry_budget, 3);
    assert_eq!(config.delivery.backoff_base_ms, 1_000);
    assert_eq!(config.delivery.backoff_max_ms, 30_000);
    assert!(config.scheduler.enabled);
    assert!(config.groups.relay_inbound);
    assert_eq!(config.whatsapp.graph_base_url, "https://graph.facebook.com");
    assert!(config.teams.is_empty());
}

#[test]
fn default_struct_round_trips_through_json() {
    let config = ConvoyConfig::default();
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["delivery"]["retry_budget"], 3);
    assert_eq!(json["whatsapp"]["port"], 8088);
}

/// Unknown keys are reported with a suggestion and a span into the source.
#[test]
fn unknown_key_produces_suggestion() {
    let toml = r#"
[delivery]
retry_budgt = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key,
                suggestion,
                span,
                ..
            } => Some((key.clone(), suggestion.clone(), *span)),
            _ => None,
        })
        .expect("expected an UnknownKey error");

    assert_eq!(unknown.0, "retry_budgt");
    assert_eq!(unknown.1.as_deref(), Some("retry_budget"));
    assert!(unknown.2.is_some(), "inline source should yield a span");
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let errors = load_and_validate_str("[storage]\npath = \"x\"\n").unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "storage")));
}

#[test]
fn team_without_id_reports_missing_key() {
    let toml = r#"
[[teams]]
name = "no id"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::MissingKey { key } if key.ends_with("id"))));
}

#[test]
fn wrong_type_reports_invalid_type() {
    let errors = load_and_validate_str("[delivery]\nretry_budget = \"three\"\n").unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("retry_budget"))));
}

#[test]
fn wrong_type_points_at_the_value() {
    let toml = "[delivery]\nretry_budget = \"three\"\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    let span = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::InvalidType { span, .. } => *span,
            _ => None,
        })
        .expect("inline source should yield a span");
    assert_eq!(&toml[span.offset()..span.offset() + span.len()], "\"three\"");
}

#[test]
fn semantic_errors_surface_from_load_and_validate() {
    let toml = r#"
[delivery]
retry_budget = 0

[scheduler]
batch_size = 0
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}
