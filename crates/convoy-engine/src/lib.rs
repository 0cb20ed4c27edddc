// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-window and message-delivery engine for Convoy.
//!
//! The [`Engine`] wires together:
//! - The [`ConversationOrchestrator`], entry point for staff sends, inbound
//!   webhooks and conversation maintenance
//! - The [`DeliveryEngine`], which dispatches recipients and tracks retries
//! - The [`InteractionEngine`] for reactions, pin, star, delete and forward
//! - The [`RetryScheduler`] that re-dispatches failed messages in the background
//! - The [`TenantRegistry`] holding team credentials and rate limits

pub mod delivery;
pub mod events;
pub mod interaction;
pub mod locks;
pub mod orchestrator;
pub mod recipients;
pub mod scheduler;
pub mod tenant;
pub mod window;

use std::sync::Arc;

use convoy_config::model::ConvoyConfig;
use convoy_core::{
    Clock, ConversationId, ErrorClassifier, EventSink, MessageId, MessageStore, ProviderClient,
};
use tracing::info;

pub use delivery::{DeliveryEngine, DeliveryOutcome, RecipientFailure, RetryPolicy};
pub use events::BroadcastSink;
pub use interaction::InteractionEngine;
pub use locks::KeyedLocks;
pub use orchestrator::{ConversationOrchestrator, ForwardResult, InboundOutcome, OutboundRequest};
pub use recipients::RecipientResolver;
pub use scheduler::{RetryScheduler, RetrySummary};
pub use tenant::{ConfigTenantSource, TenantContext, TenantRegistry};
pub use window::{RemainingTime, WindowStatus};

/// Collaborators shared by every engine component.
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn MessageStore>,
    pub provider: Arc<dyn ProviderClient>,
    pub classifier: Arc<dyn ErrorClassifier>,
    pub tenants: Arc<TenantRegistry>,
    pub sink: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
}

/// The assembled engine. Components share the per-entity lock tables.
pub struct Engine {
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub delivery: Arc<DeliveryEngine>,
    pub interaction: Arc<InteractionEngine>,
    pub scheduler: Arc<RetryScheduler>,
    pub tenants: Arc<TenantRegistry>,
}

impl Engine {
    pub fn new(deps: EngineDeps, config: &ConvoyConfig) -> Self {
        let message_locks: Arc<KeyedLocks<MessageId>> = Arc::new(KeyedLocks::new());
        let conversation_locks: Arc<KeyedLocks<ConversationId>> = Arc::new(KeyedLocks::new());

        let policy = RetryPolicy::from_config(&config.delivery);
        let delivery = Arc::new(DeliveryEngine::new(
            &deps,
            Arc::clone(&message_locks),
            policy,
        ));
        let interaction = Arc::new(InteractionEngine::new(&deps, Arc::clone(&message_locks)));
        let orchestrator = Arc::new(ConversationOrchestrator::new(
            &deps,
            Arc::clone(&delivery),
            Arc::clone(&interaction),
            Arc::clone(&conversation_locks),
            config.groups.relay_inbound,
        ));
        let scheduler = Arc::new(RetryScheduler::new(
            &deps,
            Arc::clone(&delivery),
            message_locks,
            conversation_locks,
            &config.scheduler,
        ));

        info!(
            retry_budget = policy.budget,
            tenants = deps.tenants.len(),
            relay_inbound = config.groups.relay_inbound,
            "engine initialized"
        );

        Self {
            orchestrator,
            delivery,
            interaction,
            scheduler,
            tenants: deps.tenants,
        }
    }
}
