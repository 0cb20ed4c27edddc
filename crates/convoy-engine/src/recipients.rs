// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient resolution: one driver, or every active group participant.

use std::sync::Arc;

use convoy_core::model::Conversation;
use convoy_core::types::ParticipantTarget;
use convoy_core::{ConversationKind, ConvoyError, Destination, MessageStore, Sender};
use tracing::{error, warn};

pub struct RecipientResolver {
    store: Arc<dyn MessageStore>,
}

impl RecipientResolver {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Destinations for a message in `conversation` authored by `sender`.
    ///
    /// Group fan-out is ordered by participant id and excludes the authoring
    /// participant; staff-authored messages reach every active participant.
    /// A group without active participants yields an empty list.
    pub async fn resolve(
        &self,
        conversation: &Conversation,
        sender: &Sender,
    ) -> Result<Vec<Destination>, ConvoyError> {
        match conversation.kind {
            ConversationKind::Individual => {
                let driver_id = conversation.driver_id.ok_or_else(|| {
                    error!(conversation_id = %conversation.id, "individual conversation without driver");
                    ConvoyError::NoDriverAssigned {
                        conversation_id: conversation.id,
                    }
                })?;
                let driver = self
                    .store
                    .driver(driver_id)
                    .await?
                    .ok_or_else(|| ConvoyError::not_found("driver", driver_id))?;
                Ok(vec![Destination::Driver {
                    driver_id,
                    phone: driver.phone,
                }])
            }
            ConversationKind::Group => {
                let group_id = conversation.group_id.ok_or_else(|| {
                    error!(conversation_id = %conversation.id, "group conversation without group");
                    ConvoyError::NoRecipients {
                        conversation_id: conversation.id,
                    }
                })?;

                let mut participants = self.store.participants(group_id).await?;
                participants.sort_by_key(|p| p.id);

                let mut destinations = Vec::with_capacity(participants.len());
                for participant in participants.into_iter().filter(|p| p.active) {
                    match (&participant.target, sender) {
                        (_, Sender::Participant(author)) if *author == participant.id => continue,
                        (ParticipantTarget::Driver { driver_id }, Sender::Driver(author))
                            if author == driver_id =>
                        {
                            continue;
                        }
                        _ => {}
                    }

                    match participant.target {
                        ParticipantTarget::Driver { driver_id } => {
                            match self.store.driver(driver_id).await? {
                                Some(driver) => destinations.push(Destination::Participant {
                                    participant_id: participant.id,
                                    phone: driver.phone,
                                    name: Some(driver.name),
                                }),
                                None => warn!(
                                    participant_id = %participant.id,
                                    driver_id = %driver_id,
                                    "participant references a missing driver, skipping"
                                ),
                            }
                        }
                        ParticipantTarget::Contact { phone, name } => {
                            destinations.push(Destination::Participant {
                                participant_id: participant.id,
                                phone,
                                name,
                            });
                        }
                    }
                }
                Ok(destinations)
            }
        }
    }
}
