// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity shapes shared between the engine and the persistence collaborator.
//!
//! These structs carry data and the small invariants that belong to a single
//! record (monotonic timestamps, pin/star toggles). Cross-record rules live in
//! `convoy-engine`.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::types::{
    ConversationId, ConversationKind, Direction, DriverId, GroupId, MessageContent, MessageId,
    MessageStatus, ParticipantId, ParticipantRole, ParticipantTarget, ReactionId, Reactor,
    RecipientId, RecipientTarget, Sender, TeamId, UserId,
};

/// Per-tenant sending limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub messages_per_minute: u32,
    /// `None` means no daily cap.
    pub messages_per_day: Option<u32>,
}

/// A tenant and its single active provider credential set.
#[derive(Debug)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// Provider phone-number identifier the team sends from.
    pub phone_number_id: String,
    pub access_token: SecretString,
    pub business_account_id: Option<String>,
    pub api_version: String,
    /// Country calling code (digits only) used to normalise national numbers.
    pub country_code: String,
    pub active: bool,
    pub rate_limits: RateLimits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub team_id: Option<TeamId>,
    pub name: String,
    /// Normalised international number, digits only.
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub team_id: Option<TeamId>,
    pub name: String,
    /// Provider-side group identifier carried by inbound webhooks.
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupParticipant {
    pub id: ParticipantId,
    pub group_id: GroupId,
    pub target: ParticipantTarget,
    pub joined_at: DateTime<Utc>,
    pub active: bool,
    pub role: ParticipantRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    /// `None` marks a legacy record with no sending capability.
    pub team_id: Option<TeamId>,
    pub kind: ConversationKind,
    pub driver_id: Option<DriverId>,
    pub group_id: Option<GroupId>,
    pub last_inbound_message_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub answered: bool,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by: Option<UserId>,
    pub assigned_to: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Record an inbound message. Timestamps never move backwards.
    ///
    /// Returns `true` if `last_inbound_message_at` advanced.
    pub fn record_inbound(&mut self, at: DateTime<Utc>) -> bool {
        let advanced = match self.last_inbound_message_at {
            Some(prev) if prev >= at => false,
            _ => {
                self.last_inbound_message_at = Some(at);
                true
            }
        };
        self.touch(at);
        self.answered = false;
        advanced
    }

    /// Record an accepted staff send. Never touches the inbound timestamp.
    pub fn record_outbound(&mut self, at: DateTime<Utc>) {
        self.touch(at);
        self.answered = true;
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        if self.last_message_at.is_none_or(|prev| prev < at) {
            self.last_message_at = Some(at);
        }
    }
}

/// Fields supplied when creating a conversation; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConversation {
    pub team_id: Option<TeamId>,
    pub kind: ConversationKind,
    pub driver_id: Option<DriverId>,
    pub group_id: Option<GroupId>,
    pub created_at: DateTime<Utc>,
}

impl NewConversation {
    pub fn individual(team_id: TeamId, driver_id: DriverId, created_at: DateTime<Utc>) -> Self {
        Self {
            team_id: Some(team_id),
            kind: ConversationKind::Individual,
            driver_id: Some(driver_id),
            group_id: None,
            created_at,
        }
    }

    pub fn group(team_id: TeamId, group_id: GroupId, created_at: DateTime<Utc>) -> Self {
        Self {
            team_id: Some(team_id),
            kind: ConversationKind::Group,
            driver_id: None,
            group_id: Some(group_id),
            created_at,
        }
    }

    pub fn into_conversation(self, id: ConversationId) -> Conversation {
        Conversation {
            id,
            team_id: self.team_id,
            kind: self.kind,
            driver_id: self.driver_id,
            group_id: self.group_id,
            last_inbound_message_at: None,
            last_message_at: None,
            answered: false,
            archived: false,
            archived_at: None,
            archived_by: None,
            assigned_to: None,
            created_at: self.created_at,
        }
    }
}

/// Snapshot of the replied-to message, captured once at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplySnapshot {
    pub message_id: MessageId,
    pub preview: String,
    pub sender: Sender,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub content: MessageContent,
    pub direction: Direction,
    pub sender: Sender,
    pub sent_at: DateTime<Utc>,
    /// Provider id of the inbound message, or of the single outbound attempt.
    pub provider_message_id: Option<String>,
    /// Aggregate over recipients; recomputed, never set independently.
    pub status: MessageStatus,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub starred: bool,
    pub starred_at: Option<DateTime<Utc>>,
    pub pinned: bool,
    pub pinned_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<UserId>,
    pub forward_count: u32,
    pub reply_to: Option<ReplySnapshot>,
    pub forwarded_from: Option<MessageId>,
}

/// Fields supplied when creating a message; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub content: MessageContent,
    pub sender: Sender,
    pub sent_at: DateTime<Utc>,
    pub provider_message_id: Option<String>,
    pub status: MessageStatus,
    pub reply_to: Option<ReplySnapshot>,
    pub forwarded_from: Option<MessageId>,
}

impl NewMessage {
    pub fn into_message(self, id: MessageId) -> Message {
        Message {
            id,
            conversation_id: self.conversation_id,
            direction: self.sender.direction(),
            content: self.content,
            sender: self.sender,
            sent_at: self.sent_at,
            provider_message_id: self.provider_message_id,
            status: self.status,
            retry_count: 0,
            next_retry_at: None,
            starred: false,
            starred_at: None,
            pinned: false,
            pinned_at: None,
            deleted: false,
            deleted_at: None,
            deleted_by: None,
            forward_count: 0,
            reply_to: self.reply_to,
            forwarded_from: self.forwarded_from,
        }
    }
}

/// Delivery record for one concrete destination of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub message_id: MessageId,
    pub target: RecipientTarget,
    pub phone: String,
    pub status: MessageStatus,
    pub provider_message_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub seen_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipient {
    pub target: RecipientTarget,
    pub phone: String,
}

impl NewRecipient {
    pub fn into_recipient(self, id: RecipientId, message_id: MessageId) -> Recipient {
        Recipient {
            id,
            message_id,
            target: self.target,
            phone: self.phone,
            status: MessageStatus::Pending,
            provider_message_id: None,
            sent_at: None,
            delivered_at: None,
            read_at: None,
            seen_at: None,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: ReactionId,
    pub message_id: MessageId,
    pub reactor: Reactor,
    pub emoji: String,
    pub reacted_at: DateTime<Utc>,
}
