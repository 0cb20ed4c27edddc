// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Convoy messaging bridge.

use thiserror::Error;

use crate::types::{ConversationId, MessageId, TeamId};

/// The primary error type used across the engine, its collaborators, and the binary.
#[derive(Debug, Error)]
pub enum ConvoyError {
    /// A free-form send was attempted outside the 24h customer service window.
    #[error("session window closed for conversation {conversation_id}; only templates may be sent")]
    WindowClosed { conversation_id: ConversationId },

    /// An individual conversation has no driver reference.
    #[error("conversation {conversation_id} has no driver assigned")]
    NoDriverAssigned { conversation_id: ConversationId },

    /// A group conversation has no group reference to fan out to.
    #[error("conversation {conversation_id} has no recipients to resolve")]
    NoRecipients { conversation_id: ConversationId },

    /// The operation is refused because the message was soft-deleted.
    #[error("message {message_id} has been deleted")]
    MessageDeleted { message_id: MessageId },

    /// The provider rejected the attempt with a retryable failure.
    #[error("transient provider error: {message}")]
    TransientProvider { message: String },

    /// The provider rejected the attempt permanently.
    #[error("permanent provider error: {message}")]
    PermanentProvider {
        code: Option<i64>,
        message: String,
    },

    /// The retry budget for a message has been used up.
    #[error("retry budget exhausted for message {message_id} after {attempts} attempts")]
    RetryBudgetExhausted { message_id: MessageId, attempts: u32 },

    /// Staff-initiated sends are refused on archived conversations.
    #[error("conversation {conversation_id} is archived")]
    ConversationArchived { conversation_id: ConversationId },

    /// A reply target lives in a different conversation.
    #[error("message {reply_to} is not part of conversation {conversation_id}")]
    ReplyOutsideConversation {
        conversation_id: ConversationId,
        reply_to: MessageId,
    },

    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The record has no tenant, or the tenant is unknown to the registry.
    #[error("no tenant available{}", team_suffix(.team_id))]
    NoTenant { team_id: Option<TeamId> },

    /// The tenant exists but has been deactivated.
    #[error("team {team_id} is inactive")]
    TenantInactive { team_id: TeamId },

    /// The entity belongs to a different tenant than the calling context.
    #[error("conversation {conversation_id} does not belong to team {team_id}")]
    TenantMismatch {
        team_id: TeamId,
        conversation_id: ConversationId,
    },

    /// The tenant's per-minute or per-day message limit has been reached.
    #[error("team {team_id} exceeded its {window} message limit")]
    RateLimited { team_id: TeamId, window: &'static str },

    /// A phone number could not be normalised to international digits.
    #[error("invalid phone number `{raw}`")]
    InvalidPhone { raw: String },

    /// Configuration errors (invalid values, missing credentials).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence collaborator errors.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

fn team_suffix(team_id: &Option<TeamId>) -> String {
    team_id.map(|t| format!(" for team {t}")).unwrap_or_default()
}

impl ConvoyError {
    /// Shorthand for a [`ConvoyError::NotFound`] error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ConvoyError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether a background retry may resolve this error without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConvoyError::TransientProvider { .. }
                | ConvoyError::RateLimited { .. }
                | ConvoyError::Timeout { .. }
        )
    }

    /// Whether the error is a data-integrity failure that must be surfaced, never retried.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            ConvoyError::NoDriverAssigned { .. } | ConvoyError::NoRecipients { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ConvoyError::TransientProvider { message: "x".into() }.is_retryable());
        assert!(
            ConvoyError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(
            !ConvoyError::PermanentProvider {
                code: Some(131026),
                message: "x".into()
            }
            .is_retryable()
        );
        assert!(
            !ConvoyError::WindowClosed {
                conversation_id: ConversationId(1)
            }
            .is_retryable()
        );
    }

    #[test]
    fn integrity_failures_are_not_retryable() {
        let err = ConvoyError::NoDriverAssigned {
            conversation_id: ConversationId(7),
        };
        assert!(err.is_integrity_failure());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "conversation 7 has no driver assigned");
    }

    #[test]
    fn no_tenant_message_mentions_team_when_known() {
        let err = ConvoyError::NoTenant {
            team_id: Some(TeamId(3)),
        };
        assert_eq!(err.to_string(), "no tenant available for team 3");
        let err = ConvoyError::NoTenant { team_id: None };
        assert_eq!(err.to_string(), "no tenant available");
    }
}
