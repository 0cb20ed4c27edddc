// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Convoy messaging bridge.
//!
//! This crate provides the entity model, the error taxonomy, phone
//! normalization and the collaborator traits (provider client, persistence,
//! tenant source, event sink, clock) that the engine in `convoy-engine` is
//! written against.

pub mod error;
pub mod inbound;
pub mod model;
pub mod phone;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ConvoyError;
pub use types::{
    ConversationId, ConversationKind, Destination, Direction, DriverId, GroupId, MessageContent,
    MessageId, MessageStatus, ParticipantId, ReactionId, Reactor, RecipientId, Sender, TeamId,
    UserId,
};

pub use traits::{
    Clock, EngineEvent, ErrorClassifier, EventSink, FailureClass, MessageStore, ProviderClient,
    ProviderError, SystemClock, TenantSource,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_collaborator_traits_are_exported() {
        // Compiles only if every collaborator trait is reachable from the crate root.
        fn _assert_provider<T: ProviderClient>() {}
        fn _assert_store<T: MessageStore>() {}
        fn _assert_tenant_source<T: TenantSource>() {}
        fn _assert_sink<T: EventSink>() {}
        fn _assert_classifier<T: ErrorClassifier>() {}
    }

    #[test]
    fn ids_display_as_plain_numbers() {
        assert_eq!(MessageId(42).to_string(), "42");
        assert_eq!(TeamId(7).to_string(), "7");
        let json = serde_json::to_string(&ConversationId(9)).expect("should serialize");
        assert_eq!(json, "9");
    }
}
