// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget state change notifications.

use serde::Serialize;

use crate::types::{ConversationId, MessageId, MessageStatus, Reactor, RecipientId, TeamId};

/// A state change worth pushing to connected clients or operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    MessageCreated {
        team_id: Option<TeamId>,
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    StatusChanged {
        conversation_id: ConversationId,
        message_id: MessageId,
        status: MessageStatus,
    },
    RecipientStatusChanged {
        message_id: MessageId,
        recipient_id: RecipientId,
        status: MessageStatus,
    },
    ReactionChanged {
        message_id: MessageId,
        reactor: Reactor,
        emoji: String,
    },
    /// Pin, star, soft-delete, or forward count changed.
    MessageUpdated {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    ConversationUpdated {
        conversation_id: ConversationId,
    },
    /// Terminal delivery failure; routed to the operator surface.
    DeliveryExhausted {
        conversation_id: ConversationId,
        message_id: MessageId,
        reason: String,
    },
}

/// Receives engine events. Delivery is best-effort and must never block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: EngineEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: EngineEvent) {}
}
