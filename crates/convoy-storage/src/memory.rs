// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `MessageStore` backed by in-process ordered maps.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use convoy_core::model::{
    Conversation, Driver, Group, GroupParticipant, Message, NewConversation, NewMessage,
    NewRecipient, Reaction, Recipient,
};
use convoy_core::types::{
    ConversationId, ConversationKind, DriverId, GroupId, MessageId, ParticipantId,
    ParticipantRole, ParticipantTarget, ReactionId, Reactor, RecipientId, TeamId,
};
use convoy_core::{ConvoyError, MessageStore};

#[derive(Default)]
struct Tables {
    drivers: BTreeMap<DriverId, Driver>,
    groups: BTreeMap<GroupId, Group>,
    participants: BTreeMap<ParticipantId, GroupParticipant>,
    conversations: BTreeMap<ConversationId, Conversation>,
    messages: BTreeMap<MessageId, Message>,
    recipients: BTreeMap<RecipientId, Recipient>,
    reactions: BTreeMap<ReactionId, Reaction>,
    seq: Sequences,
}

#[derive(Default)]
struct Sequences {
    driver: i64,
    group: i64,
    participant: i64,
    conversation: i64,
    message: i64,
    recipient: i64,
    reaction: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// In-memory store. Cheap to construct; wrap in an `Arc` to share.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group. Groups are administrative records; the engine never creates them.
    pub async fn insert_group(
        &self,
        team_id: Option<TeamId>,
        name: &str,
        external_id: Option<&str>,
    ) -> Group {
        let mut t = self.tables.write().await;
        let id = GroupId(next(&mut t.seq.group));
        let group = Group {
            id,
            team_id,
            name: name.to_string(),
            external_id: external_id.map(str::to_string),
        };
        t.groups.insert(id, group.clone());
        group
    }

    /// Add an active participant to a group.
    pub async fn insert_participant(
        &self,
        group_id: GroupId,
        target: ParticipantTarget,
        role: ParticipantRole,
        joined_at: DateTime<Utc>,
    ) -> Result<GroupParticipant, ConvoyError> {
        let mut t = self.tables.write().await;
        if !t.groups.contains_key(&group_id) {
            return Err(ConvoyError::not_found("group", group_id));
        }
        let id = ParticipantId(next(&mut t.seq.participant));
        let participant = GroupParticipant {
            id,
            group_id,
            target,
            joined_at,
            active: true,
            role,
        };
        t.participants.insert(id, participant.clone());
        Ok(participant)
    }

    /// Flip a participant's active flag. Historical recipient rows are untouched.
    pub async fn set_participant_active(
        &self,
        id: ParticipantId,
        active: bool,
    ) -> Result<(), ConvoyError> {
        let mut t = self.tables.write().await;
        let participant = t
            .participants
            .get_mut(&id)
            .ok_or_else(|| ConvoyError::not_found("participant", id))?;
        participant.active = active;
        tracing::debug!(participant_id = %id, active, "participant active flag changed");
        Ok(())
    }

    /// Insert a driver without a tenant, as found in legacy data.
    pub async fn insert_unowned_driver(&self, name: &str, phone: &str) -> Driver {
        let mut t = self.tables.write().await;
        let id = DriverId(next(&mut t.seq.driver));
        let driver = Driver {
            id,
            team_id: None,
            name: name.to_string(),
            phone: phone.to_string(),
        };
        t.drivers.insert(id, driver.clone());
        driver
    }

    /// All messages of a conversation in ascending id order.
    pub async fn messages_in(&self, conversation_id: ConversationId) -> Vec<Message> {
        let t = self.tables.read().await;
        t.messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Total number of messages across all conversations.
    pub async fn message_count(&self) -> usize {
        self.tables.read().await.messages.len()
    }
}

fn existing_conversation<'a>(
    t: &'a Tables,
    new: &NewConversation,
) -> Option<&'a Conversation> {
    t.conversations.values().find(|c| {
        c.team_id == new.team_id
            && c.kind == new.kind
            && match new.kind {
                ConversationKind::Individual => c.driver_id == new.driver_id,
                ConversationKind::Group => c.group_id == new.group_id,
            }
    })
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn driver(&self, id: DriverId) -> Result<Option<Driver>, ConvoyError> {
        Ok(self.tables.read().await.drivers.get(&id).cloned())
    }

    async fn driver_by_phone(
        &self,
        team_id: TeamId,
        phone: &str,
    ) -> Result<Option<Driver>, ConvoyError> {
        let t = self.tables.read().await;
        Ok(t
            .drivers
            .values()
            .find(|d| d.team_id == Some(team_id) && d.phone == phone)
            .cloned())
    }

    async fn insert_driver(
        &self,
        team_id: TeamId,
        name: &str,
        phone: &str,
    ) -> Result<Driver, ConvoyError> {
        let mut t = self.tables.write().await;
        if let Some(existing) = t
            .drivers
            .values()
            .find(|d| d.team_id == Some(team_id) && d.phone == phone)
        {
            return Ok(existing.clone());
        }
        let id = DriverId(next(&mut t.seq.driver));
        let driver = Driver {
            id,
            team_id: Some(team_id),
            name: name.to_string(),
            phone: phone.to_string(),
        };
        t.drivers.insert(id, driver.clone());
        Ok(driver)
    }

    async fn group(&self, id: GroupId) -> Result<Option<Group>, ConvoyError> {
        Ok(self.tables.read().await.groups.get(&id).cloned())
    }

    async fn group_by_external_id(
        &self,
        team_id: TeamId,
        external_id: &str,
    ) -> Result<Option<Group>, ConvoyError> {
        let t = self.tables.read().await;
        Ok(t
            .groups
            .values()
            .find(|g| g.team_id == Some(team_id) && g.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn participants(&self, group_id: GroupId) -> Result<Vec<GroupParticipant>, ConvoyError> {
        let t = self.tables.read().await;
        Ok(t
            .participants
            .values()
            .filter(|p| p.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn conversation(&self, id: ConversationId) -> Result<Option<Conversation>, ConvoyError> {
        Ok(self.tables.read().await.conversations.get(&id).cloned())
    }

    async fn conversation_for_driver(
        &self,
        team_id: TeamId,
        driver_id: DriverId,
    ) -> Result<Option<Conversation>, ConvoyError> {
        let t = self.tables.read().await;
        Ok(t
            .conversations
            .values()
            .find(|c| {
                c.team_id == Some(team_id)
                    && c.kind == ConversationKind::Individual
                    && c.driver_id == Some(driver_id)
            })
            .cloned())
    }

    async fn conversation_for_group(
        &self,
        team_id: TeamId,
        group_id: GroupId,
    ) -> Result<Option<Conversation>, ConvoyError> {
        let t = self.tables.read().await;
        Ok(t
            .conversations
            .values()
            .find(|c| {
                c.team_id == Some(team_id)
                    && c.kind == ConversationKind::Group
                    && c.group_id == Some(group_id)
            })
            .cloned())
    }

    async fn insert_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<Conversation, ConvoyError> {
        let mut t = self.tables.write().await;
        if let Some(existing) = existing_conversation(&t, &conversation) {
            return Ok(existing.clone());
        }
        let id = ConversationId(next(&mut t.seq.conversation));
        let conversation = conversation.into_conversation(id);
        t.conversations.insert(id, conversation.clone());
        Ok(conversation)
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<(), ConvoyError> {
        let mut t = self.tables.write().await;
        let slot = t
            .conversations
            .get_mut(&conversation.id)
            .ok_or_else(|| ConvoyError::not_found("conversation", conversation.id))?;
        if slot.kind != conversation.kind {
            return Err(ConvoyError::Internal(format!(
                "conversation {} kind is immutable",
                conversation.id
            )));
        }
        *slot = conversation.clone();
        Ok(())
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, ConvoyError> {
        let mut t = self.tables.write().await;
        if !t.conversations.contains_key(&message.conversation_id) {
            return Err(ConvoyError::not_found("conversation", message.conversation_id));
        }
        let id = MessageId(next(&mut t.seq.message));
        let message = message.into_message(id);
        t.messages.insert(id, message.clone());
        Ok(message)
    }

    async fn message(&self, id: MessageId) -> Result<Option<Message>, ConvoyError> {
        Ok(self.tables.read().await.messages.get(&id).cloned())
    }

    async fn message_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Message>, ConvoyError> {
        let t = self.tables.read().await;
        Ok(t
            .messages
            .values()
            .find(|m| m.provider_message_id.as_deref() == Some(provider_message_id))
            .cloned())
    }

    async fn update_message(&self, message: &Message) -> Result<(), ConvoyError> {
        let mut t = self.tables.write().await;
        let slot = t
            .messages
            .get_mut(&message.id)
            .ok_or_else(|| ConvoyError::not_found("message", message.id))?;
        *slot = message.clone();
        Ok(())
    }

    async fn due_for_retry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MessageId>, ConvoyError> {
        let t = self.tables.read().await;
        let mut due: Vec<(DateTime<Utc>, MessageId)> = t
            .messages
            .values()
            .filter_map(|m| m.next_retry_at.filter(|at| *at <= now).map(|at| (at, m.id)))
            .collect();
        due.sort();
        Ok(due.into_iter().take(limit).map(|(_, id)| id).collect())
    }

    async fn insert_recipients(
        &self,
        message_id: MessageId,
        recipients: Vec<NewRecipient>,
    ) -> Result<Vec<Recipient>, ConvoyError> {
        let mut t = self.tables.write().await;
        if !t.messages.contains_key(&message_id) {
            return Err(ConvoyError::not_found("message", message_id));
        }
        let mut inserted = Vec::with_capacity(recipients.len());
        for new in recipients {
            let id = RecipientId(next(&mut t.seq.recipient));
            let recipient = new.into_recipient(id, message_id);
            t.recipients.insert(id, recipient.clone());
            inserted.push(recipient);
        }
        Ok(inserted)
    }

    async fn recipient(&self, id: RecipientId) -> Result<Option<Recipient>, ConvoyError> {
        Ok(self.tables.read().await.recipients.get(&id).cloned())
    }

    async fn recipients(&self, message_id: MessageId) -> Result<Vec<Recipient>, ConvoyError> {
        let t = self.tables.read().await;
        Ok(t
            .recipients
            .values()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect())
    }

    async fn recipient_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Recipient>, ConvoyError> {
        let t = self.tables.read().await;
        Ok(t
            .recipients
            .values()
            .find(|r| r.provider_message_id.as_deref() == Some(provider_message_id))
            .cloned())
    }

    async fn update_recipient(&self, recipient: &Recipient) -> Result<(), ConvoyError> {
        let mut t = self.tables.write().await;
        let slot = t
            .recipients
            .get_mut(&recipient.id)
            .ok_or_else(|| ConvoyError::not_found("recipient", recipient.id))?;
        *slot = recipient.clone();
        Ok(())
    }

    async fn reactions(&self, message_id: MessageId) -> Result<Vec<Reaction>, ConvoyError> {
        let t = self.tables.read().await;
        Ok(t
            .reactions
            .values()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect())
    }

    async fn insert_reaction(
        &self,
        message_id: MessageId,
        reactor: Reactor,
        emoji: &str,
        reacted_at: DateTime<Utc>,
    ) -> Result<Reaction, ConvoyError> {
        let mut t = self.tables.write().await;
        if !t.messages.contains_key(&message_id) {
            return Err(ConvoyError::not_found("message", message_id));
        }
        let id = ReactionId(next(&mut t.seq.reaction));
        let reaction = Reaction {
            id,
            message_id,
            reactor,
            emoji: emoji.to_string(),
            reacted_at,
        };
        t.reactions.insert(id, reaction.clone());
        Ok(reaction)
    }

    async fn update_reaction(&self, reaction: &Reaction) -> Result<(), ConvoyError> {
        let mut t = self.tables.write().await;
        let slot = t
            .reactions
            .get_mut(&reaction.id)
            .ok_or_else(|| ConvoyError::not_found("reaction", reaction.id))?;
        *slot = reaction.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use convoy_core::types::{MessageContent, MessageStatus, RecipientTarget, Sender, UserId};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    async fn seeded() -> (MemoryStore, Conversation) {
        let store = MemoryStore::new();
        let driver = store.insert_driver(TeamId(1), "Ana", "31612345678").await.unwrap();
        let conv = store
            .insert_conversation(NewConversation::individual(TeamId(1), driver.id, t0()))
            .await
            .unwrap();
        (store, conv)
    }

    fn outbound(conversation_id: ConversationId) -> NewMessage {
        NewMessage {
            conversation_id,
            content: MessageContent::text("hi"),
            sender: Sender::Staff(UserId(1)),
            sent_at: t0(),
            provider_message_id: None,
            status: MessageStatus::Pending,
            reply_to: None,
            forwarded_from: None,
        }
    }

    #[tokio::test]
    async fn insert_driver_is_idempotent_per_team_and_phone() {
        let store = MemoryStore::new();
        let a = store.insert_driver(TeamId(1), "Ana", "316").await.unwrap();
        let b = store.insert_driver(TeamId(1), "Other", "316").await.unwrap();
        let c = store.insert_driver(TeamId(2), "Ana", "316").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(
            store.driver_by_phone(TeamId(2), "316").await.unwrap().map(|d| d.id),
            Some(c.id)
        );
    }

    #[tokio::test]
    async fn insert_conversation_returns_existing_for_same_counterpart() {
        let (store, conv) = seeded().await;
        let again = store
            .insert_conversation(NewConversation::individual(
                TeamId(1),
                conv.driver_id.unwrap(),
                t0() + Duration::hours(1),
            ))
            .await
            .unwrap();
        assert_eq!(again.id, conv.id);
        assert_eq!(again.created_at, t0());
    }

    #[tokio::test]
    async fn conversation_kind_cannot_change() {
        let (store, mut conv) = seeded().await;
        conv.kind = ConversationKind::Group;
        let err = store.update_conversation(&conv).await.unwrap_err();
        assert!(matches!(err, ConvoyError::Internal(_)));
    }

    #[tokio::test]
    async fn message_requires_existing_conversation() {
        let store = MemoryStore::new();
        let err = store.insert_message(outbound(ConversationId(99))).await.unwrap_err();
        assert!(matches!(err, ConvoyError::NotFound { entity: "conversation", .. }));
    }

    #[tokio::test]
    async fn due_for_retry_orders_by_time_and_respects_limit() {
        let (store, conv) = seeded().await;
        let mut ids = Vec::new();
        for offset in [30, 10, 20, 90] {
            let mut m = store.insert_message(outbound(conv.id)).await.unwrap();
            m.status = MessageStatus::Failed;
            m.next_retry_at = Some(t0() + Duration::seconds(offset));
            store.update_message(&m).await.unwrap();
            ids.push(m.id);
        }

        let due = store
            .due_for_retry(t0() + Duration::seconds(60), 2)
            .await
            .unwrap();
        assert_eq!(due, vec![ids[1], ids[2]]);

        let all = store
            .due_for_retry(t0() + Duration::seconds(60), 10)
            .await
            .unwrap();
        assert_eq!(all, vec![ids[1], ids[2], ids[0]]);
    }

    #[tokio::test]
    async fn recipients_keep_insertion_order_and_provider_lookup() {
        let (store, conv) = seeded().await;
        let m = store.insert_message(outbound(conv.id)).await.unwrap();
        let rows = store
            .insert_recipients(
                m.id,
                vec![
                    NewRecipient {
                        target: RecipientTarget::Participant(ParticipantId(2)),
                        phone: "2".into(),
                    },
                    NewRecipient {
                        target: RecipientTarget::Participant(ParticipantId(1)),
                        phone: "1".into(),
                    },
                ],
            )
            .await
            .unwrap();
        assert!(rows.iter().all(|r| r.status == MessageStatus::Pending));

        let mut second = rows[1].clone();
        second.provider_message_id = Some("wamid.B".into());
        store.update_recipient(&second).await.unwrap();

        let listed = store.recipients(m.id).await.unwrap();
        assert_eq!(listed[0].phone, "2");
        assert_eq!(
            store
                .recipient_by_provider_id("wamid.B")
                .await
                .unwrap()
                .map(|r| r.id),
            Some(second.id)
        );
    }

    #[tokio::test]
    async fn participants_can_be_deactivated() {
        let store = MemoryStore::new();
        let group = store.insert_group(Some(TeamId(1)), "Night shift", Some("g-1")).await;
        let p = store
            .insert_participant(
                group.id,
                ParticipantTarget::Contact {
                    phone: "3161".into(),
                    name: None,
                },
                ParticipantRole::Member,
                t0(),
            )
            .await
            .unwrap();
        store.set_participant_active(p.id, false).await.unwrap();

        let listed = store.participants(group.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].active);
        assert_eq!(
            store
                .group_by_external_id(TeamId(1), "g-1")
                .await
                .unwrap()
                .map(|g| g.id),
            Some(group.id)
        );
        assert!(store
            .group_by_external_id(TeamId(2), "g-1")
            .await
            .unwrap()
            .is_none());
    }
}
