// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence collaborator contract.
//!
//! Implementations must provide read-your-writes consistency per entity. The
//! engine serializes mutations of a single message or conversation itself, so
//! stores need no cross-call transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ConvoyError;
use crate::model::{
    Conversation, Driver, Group, GroupParticipant, Message, NewConversation, NewMessage,
    NewRecipient, Reaction, Recipient,
};
use crate::types::{
    ConversationId, DriverId, GroupId, MessageId, Reactor, RecipientId, TeamId,
};

#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    // --- Drivers and groups ---

    async fn driver(&self, id: DriverId) -> Result<Option<Driver>, ConvoyError>;

    async fn driver_by_phone(
        &self,
        team_id: TeamId,
        phone: &str,
    ) -> Result<Option<Driver>, ConvoyError>;

    /// Returns the existing driver when the team already has one with this phone.
    async fn insert_driver(
        &self,
        team_id: TeamId,
        name: &str,
        phone: &str,
    ) -> Result<Driver, ConvoyError>;

    async fn group(&self, id: GroupId) -> Result<Option<Group>, ConvoyError>;

    async fn group_by_external_id(
        &self,
        team_id: TeamId,
        external_id: &str,
    ) -> Result<Option<Group>, ConvoyError>;

    /// All participants of a group, active or not, in ascending id order.
    async fn participants(&self, group_id: GroupId) -> Result<Vec<GroupParticipant>, ConvoyError>;

    // --- Conversations ---

    async fn conversation(&self, id: ConversationId) -> Result<Option<Conversation>, ConvoyError>;

    async fn conversation_for_driver(
        &self,
        team_id: TeamId,
        driver_id: DriverId,
    ) -> Result<Option<Conversation>, ConvoyError>;

    async fn conversation_for_group(
        &self,
        team_id: TeamId,
        group_id: GroupId,
    ) -> Result<Option<Conversation>, ConvoyError>;

    /// Returns the existing conversation when one already exists for the same
    /// team and counterpart, so concurrent find-or-create never duplicates.
    async fn insert_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<Conversation, ConvoyError>;

    async fn update_conversation(&self, conversation: &Conversation) -> Result<(), ConvoyError>;

    // --- Messages ---

    async fn insert_message(&self, message: NewMessage) -> Result<Message, ConvoyError>;

    async fn message(&self, id: MessageId) -> Result<Option<Message>, ConvoyError>;

    async fn message_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Message>, ConvoyError>;

    async fn update_message(&self, message: &Message) -> Result<(), ConvoyError>;

    /// Messages whose `next_retry_at` is set and not later than `now`, oldest first.
    async fn due_for_retry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MessageId>, ConvoyError>;

    // --- Recipients ---

    async fn insert_recipients(
        &self,
        message_id: MessageId,
        recipients: Vec<NewRecipient>,
    ) -> Result<Vec<Recipient>, ConvoyError>;

    async fn recipient(&self, id: RecipientId) -> Result<Option<Recipient>, ConvoyError>;

    /// Recipients of a message in ascending id order.
    async fn recipients(&self, message_id: MessageId) -> Result<Vec<Recipient>, ConvoyError>;

    async fn recipient_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Recipient>, ConvoyError>;

    async fn update_recipient(&self, recipient: &Recipient) -> Result<(), ConvoyError>;

    // --- Reactions ---

    async fn reactions(&self, message_id: MessageId) -> Result<Vec<Reaction>, ConvoyError>;

    async fn insert_reaction(
        &self,
        message_id: MessageId,
        reactor: Reactor,
        emoji: &str,
        reacted_at: DateTime<Utc>,
    ) -> Result<Reaction, ConvoyError>;

    async fn update_reaction(&self, reaction: &Reaction) -> Result<(), ConvoyError>;
}
