// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared harness for engine integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use convoy_config::model::ConvoyConfig;
use convoy_core::inbound::InboundEvent;
use convoy_core::traits::HttpStatusClassifier;
use convoy_core::{Clock, MessageContent, TeamId};
use convoy_engine::{Engine, EngineDeps, TenantContext, TenantRegistry};
use convoy_test_utils::{team, Fixture, ManualClock, MockProvider, RecordingSink};

pub const TEAM_A: TeamId = TeamId(1);
pub const TEAM_B: TeamId = TeamId(2);
pub const NUMBER_A: &str = "100200300";
pub const NUMBER_B: &str = "400500600";

pub struct Harness {
    pub fixture: Fixture,
    pub provider: Arc<MockProvider>,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<RecordingSink>,
    pub engine: Engine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ConvoyConfig::default())
    }

    pub fn with_config(config: ConvoyConfig) -> Self {
        Self::build(config, MockProvider::new())
    }

    pub fn build(config: ConvoyConfig, provider: MockProvider) -> Self {
        let fixture = Fixture::new();
        let provider = Arc::new(provider);
        let clock = Arc::new(ManualClock::default());
        let sink = Arc::new(RecordingSink::new());

        let tenants = Arc::new(TenantRegistry::new(Arc::clone(&clock) as Arc<dyn Clock>));
        tenants.load(vec![team(TEAM_A, NUMBER_A), team(TEAM_B, NUMBER_B)]);

        let deps = EngineDeps {
            store: fixture.dyn_store(),
            provider: Arc::clone(&provider) as _,
            classifier: Arc::new(HttpStatusClassifier),
            tenants,
            sink: Arc::clone(&sink) as _,
            clock: Arc::clone(&clock) as _,
        };
        let engine = Engine::new(deps, &config);

        Self {
            fixture,
            provider,
            clock,
            sink,
            engine,
        }
    }

    pub fn ctx(&self, team_id: TeamId) -> TenantContext {
        self.engine.tenants.context(team_id).unwrap()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance(&self, by: TimeDelta) {
        self.clock.advance(by);
    }
}

pub fn text(body: &str) -> MessageContent {
    MessageContent::text(body)
}

pub fn template(name: &str) -> MessageContent {
    MessageContent::Template {
        name: name.to_string(),
        language: "en".to_string(),
        parameters: BTreeMap::new(),
    }
}

/// An inbound text from `from` to the tenant number `to`.
pub fn inbound(to: &str, from: &str, provider_id: &str, at: DateTime<Utc>) -> InboundEvent {
    InboundEvent {
        phone_number_id: to.to_string(),
        provider_message_id: provider_id.to_string(),
        from: from.to_string(),
        profile_name: Some("Sam".to_string()),
        group_id: None,
        participant: None,
        context_message_id: None,
        timestamp: at,
        content: MessageContent::text("on my way"),
    }
}
