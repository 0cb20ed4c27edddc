// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seed data for engine tests.
//!
//! `Fixture` owns a [`MemoryStore`] and offers shortcuts for the records a
//! test usually needs before it can send anything: a driver with an
//! individual conversation, a group with participants, an open window.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use convoy_core::model::{
    Conversation, Driver, Group, GroupParticipant, NewConversation, RateLimits, Team,
};
use convoy_core::types::{ParticipantRole, ParticipantTarget};
use convoy_core::{ConversationId, ConvoyError, DriverId, MessageStore, TeamId};
use convoy_storage::MemoryStore;
use secrecy::SecretString;

/// The instant every test clock starts at.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// An active team with generous limits and UK national numbering.
pub fn team(id: TeamId, phone_number_id: &str) -> Team {
    Team {
        id,
        name: format!("team-{id}"),
        phone_number_id: phone_number_id.to_string(),
        access_token: SecretString::from(format!("token-{id}")),
        business_account_id: None,
        api_version: "v21.0".to_string(),
        country_code: "44".to_string(),
        active: true,
        rate_limits: RateLimits {
            messages_per_minute: 1_000,
            messages_per_day: None,
        },
    }
}

/// A store plus shortcuts for seeding it.
#[derive(Clone, Default)]
pub struct Fixture {
    pub store: Arc<MemoryStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store as the trait object the engine consumes.
    pub fn dyn_store(&self) -> Arc<dyn MessageStore> {
        Arc::clone(&self.store) as Arc<dyn MessageStore>
    }

    /// A driver and their individual conversation, with no window yet.
    pub async fn individual(
        &self,
        team_id: TeamId,
        name: &str,
        phone: &str,
    ) -> Result<(Driver, Conversation), ConvoyError> {
        let driver = self.store.insert_driver(team_id, name, phone).await?;
        let conversation = self
            .store
            .insert_conversation(NewConversation::individual(team_id, driver.id, start_time()))
            .await?;
        Ok((driver, conversation))
    }

    /// An individual conversation whose driver has not been set.
    pub async fn orphan_conversation(
        &self,
        team_id: TeamId,
    ) -> Result<Conversation, ConvoyError> {
        self.store
            .insert_conversation(NewConversation {
                team_id: Some(team_id),
                kind: convoy_core::ConversationKind::Individual,
                driver_id: None,
                group_id: None,
                created_at: start_time(),
            })
            .await
    }

    /// A group whose participants are plain contacts, in the given order.
    pub async fn group_of_contacts(
        &self,
        team_id: TeamId,
        external_id: &str,
        phones: &[&str],
    ) -> Result<(Group, Conversation, Vec<GroupParticipant>), ConvoyError> {
        let group = self
            .store
            .insert_group(Some(team_id), &format!("group {external_id}"), Some(external_id))
            .await;
        let mut participants = Vec::with_capacity(phones.len());
        for (i, phone) in phones.iter().enumerate() {
            let participant = self
                .store
                .insert_participant(
                    group.id,
                    ParticipantTarget::Contact {
                        phone: (*phone).to_string(),
                        name: Some(format!("contact {i}")),
                    },
                    ParticipantRole::Member,
                    start_time(),
                )
                .await?;
            participants.push(participant);
        }
        let conversation = self
            .store
            .insert_conversation(NewConversation::group(team_id, group.id, start_time()))
            .await?;
        Ok((group, conversation, participants))
    }

    /// Add a driver to an existing group.
    pub async fn add_driver_participant(
        &self,
        group: &Group,
        driver_id: DriverId,
    ) -> Result<GroupParticipant, ConvoyError> {
        self.store
            .insert_participant(
                group.id,
                ParticipantTarget::Driver { driver_id },
                ParticipantRole::Member,
                start_time(),
            )
            .await
    }

    /// Record an inbound message at `at`, opening the window.
    pub async fn inbound_at(
        &self,
        conversation_id: ConversationId,
        at: DateTime<Utc>,
    ) -> Result<Conversation, ConvoyError> {
        let mut conversation = self
            .store
            .conversation(conversation_id)
            .await?
            .ok_or_else(|| ConvoyError::not_found("conversation", conversation_id))?;
        conversation.record_inbound(at);
        self.store.update_conversation(&conversation).await?;
        Ok(conversation)
    }

    /// Shortcut for [`Self::inbound_at`] relative to `now`.
    pub async fn inbound_ago(
        &self,
        conversation_id: ConversationId,
        now: DateTime<Utc>,
        ago: TimeDelta,
    ) -> Result<Conversation, ConvoyError> {
        self.inbound_at(conversation_id, now - ago).await
    }

    pub async fn archive(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ConvoyError> {
        let mut conversation = self
            .store
            .conversation(conversation_id)
            .await?
            .ok_or_else(|| ConvoyError::not_found("conversation", conversation_id))?;
        conversation.archived = true;
        conversation.archived_at = Some(start_time());
        self.store.update_conversation(&conversation).await?;
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn group_participants_keep_order() {
        let fixture = Fixture::new();
        let (group, conversation, participants) = fixture
            .group_of_contacts(TeamId(1), "grp-1", &["447700900001", "447700900002"])
            .await
            .unwrap();

        assert_eq!(conversation.group_id, Some(group.id));
        assert_eq!(participants.len(), 2);
        assert!(participants[0].id < participants[1].id);
    }

    #[tokio::test]
    async fn inbound_opens_window() {
        let fixture = Fixture::new();
        let (_, conversation) = fixture
            .individual(TeamId(1), "Ann", "447700900001")
            .await
            .unwrap();
        let now = start_time() + TimeDelta::hours(3);
        let updated = fixture
            .inbound_ago(conversation.id, now, TimeDelta::hours(1))
            .await
            .unwrap();
        assert_eq!(updated.last_inbound_message_at, Some(now - TimeDelta::hours(1)));
    }
}
