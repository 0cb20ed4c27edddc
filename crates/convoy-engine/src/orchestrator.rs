// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation orchestrator: the entry point for staff actions, inbound
//! messages and provider callbacks.
//!
//! Every staff-facing call takes an explicit [`TenantContext`] and refuses
//! conversations owned by another team. Conversation-level state (window
//! timestamps, archive flag, message creation) changes under the
//! conversation lock; dispatch then runs under the message lock only.

use std::sync::Arc;

use convoy_core::inbound::{InboundEvent, StatusUpdate, WebhookEvent};
use convoy_core::model::{
    Conversation, GroupParticipant, Message, NewConversation, NewMessage, NewRecipient, Reaction,
    ReplySnapshot, Team,
};
use convoy_core::phone::normalize_phone;
use convoy_core::types::ParticipantTarget;
use convoy_core::{
    Clock, ConversationId, ConversationKind, ConvoyError, Destination, EngineEvent, EventSink,
    GroupId, MessageContent, MessageId, MessageStatus, MessageStore, Reactor, Sender, TeamId,
    UserId,
};
use tracing::{debug, info, warn};

use crate::delivery::{DeliveryEngine, DeliveryOutcome};
use crate::interaction::{snapshot, InteractionEngine};
use crate::locks::KeyedLocks;
use crate::recipients::RecipientResolver;
use crate::tenant::{TenantContext, TenantRegistry};
use crate::window::{self, WindowStatus};
use crate::EngineDeps;

/// A staff send request.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub conversation_id: ConversationId,
    pub author: UserId,
    pub content: MessageContent,
    pub reply_to: Option<MessageId>,
}

impl OutboundRequest {
    pub fn new(conversation_id: ConversationId, author: UserId, content: MessageContent) -> Self {
        Self {
            conversation_id,
            author,
            content,
            reply_to: None,
        }
    }

    pub fn replying_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// What happened to an inbound webhook message.
#[derive(Debug)]
pub enum InboundOutcome {
    Recorded {
        message: Message,
        /// Fan-out to the other group participants, when relayed.
        relay: Option<DeliveryOutcome>,
    },
    /// The provider id was already recorded; nothing changed.
    Duplicate(Message),
}

impl InboundOutcome {
    pub fn message(&self) -> &Message {
        match self {
            InboundOutcome::Recorded { message, .. } | InboundOutcome::Duplicate(message) => {
                message
            }
        }
    }
}

/// Per-target result of a forward.
#[derive(Debug)]
pub struct ForwardResult {
    pub target: ConversationId,
    pub result: Result<DeliveryOutcome, ConvoyError>,
}

pub struct ConversationOrchestrator {
    store: Arc<dyn MessageStore>,
    tenants: Arc<TenantRegistry>,
    delivery: Arc<DeliveryEngine>,
    interaction: Arc<InteractionEngine>,
    resolver: RecipientResolver,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks<ConversationId>>,
    relay_inbound: bool,
}

impl ConversationOrchestrator {
    pub fn new(
        deps: &EngineDeps,
        delivery: Arc<DeliveryEngine>,
        interaction: Arc<InteractionEngine>,
        locks: Arc<KeyedLocks<ConversationId>>,
        relay_inbound: bool,
    ) -> Self {
        Self {
            store: Arc::clone(&deps.store),
            tenants: Arc::clone(&deps.tenants),
            delivery,
            interaction,
            resolver: RecipientResolver::new(Arc::clone(&deps.store)),
            sink: Arc::clone(&deps.sink),
            clock: Arc::clone(&deps.clock),
            locks,
            relay_inbound,
        }
    }

    // --- Staff sends ---

    /// Create a staff message and dispatch it.
    ///
    /// Rejected up-front with `ConversationArchived`, `WindowClosed` (free-form
    /// content outside the window) or `RateLimited`; no record is created then.
    pub async fn send(
        &self,
        ctx: &TenantContext,
        request: OutboundRequest,
    ) -> Result<DeliveryOutcome, ConvoyError> {
        let message_id = self
            .create_outbound(
                ctx,
                request.conversation_id,
                request.author,
                request.content,
                request.reply_to,
                None,
            )
            .await?;
        self.delivery.send(ctx, message_id).await
    }

    /// Copy a message into each target conversation and dispatch the copies.
    ///
    /// Each target is evaluated on its own; a rejected target does not stop
    /// the others. The source's forward count grows per created copy.
    pub async fn forward(
        &self,
        ctx: &TenantContext,
        author: UserId,
        message_id: MessageId,
        targets: &[ConversationId],
        override_text: Option<String>,
    ) -> Result<Vec<ForwardResult>, ConvoyError> {
        self.authorized_message(ctx, message_id).await?;
        let draft = self
            .interaction
            .prepare_forward(message_id, override_text)
            .await?;

        let mut results = Vec::with_capacity(targets.len());
        for &target in targets {
            let created = self
                .create_outbound(
                    ctx,
                    target,
                    author,
                    draft.content.clone(),
                    None,
                    Some(draft.source_id),
                )
                .await;

            let result = match created {
                Ok(copy_id) => {
                    self.interaction.record_forward(draft.source_id).await?;
                    info!(
                        message_id = %draft.source_id,
                        target = %target,
                        copy_id = %copy_id,
                        "message forwarded"
                    );
                    self.delivery.send(ctx, copy_id).await
                }
                Err(err) => {
                    warn!(
                        message_id = %draft.source_id,
                        target = %target,
                        error = %err,
                        "forward to target rejected"
                    );
                    Err(err)
                }
            };
            results.push(ForwardResult { target, result });
        }
        Ok(results)
    }

    async fn create_outbound(
        &self,
        ctx: &TenantContext,
        conversation_id: ConversationId,
        author: UserId,
        content: MessageContent,
        reply_to: Option<MessageId>,
        forwarded_from: Option<MessageId>,
    ) -> Result<MessageId, ConvoyError> {
        let _guard = self.locks.lock(conversation_id).await;
        let mut conversation = self.authorized(ctx, conversation_id).await?;

        if conversation.archived {
            warn!(conversation_id = %conversation_id, "send to archived conversation refused");
            return Err(ConvoyError::ConversationArchived { conversation_id });
        }

        let now = self.clock.now();
        let status = window::evaluate(conversation.last_inbound_message_at, now);
        if let Err(err) = window::ensure_sendable(conversation_id, &content, status) {
            metrics::counter!("convoy_window_rejections_total").increment(1);
            warn!(
                conversation_id = %conversation_id,
                window = %status,
                content_type = content.type_name(),
                "free-form send outside session window"
            );
            return Err(err);
        }

        let sender = Sender::Staff(author);
        let destinations = self.resolver.resolve(&conversation, &sender).await?;
        let needed = u32::try_from(destinations.len()).unwrap_or(u32::MAX).max(1);
        self.tenants.check_capacity(ctx.team_id(), needed)?;

        let reply = match reply_to {
            Some(id) => Some(self.interaction.reply_context(conversation_id, id).await?),
            None => None,
        };

        let message = self
            .store
            .insert_message(NewMessage {
                conversation_id,
                content,
                sender,
                sent_at: now,
                provider_message_id: None,
                status: if destinations.is_empty() {
                    MessageStatus::Sent
                } else {
                    MessageStatus::Pending
                },
                reply_to: reply,
                forwarded_from,
            })
            .await?;
        self.insert_recipients(message.id, destinations).await?;

        conversation.record_outbound(now);
        self.store.update_conversation(&conversation).await?;

        debug!(
            conversation_id = %conversation_id,
            message_id = %message.id,
            team_id = %ctx.team_id(),
            "outbound message created"
        );
        self.sink.publish(EngineEvent::MessageCreated {
            team_id: conversation.team_id,
            conversation_id,
            message_id: message.id,
        });
        self.sink.publish(EngineEvent::ConversationUpdated { conversation_id });
        Ok(message.id)
    }

    async fn insert_recipients(
        &self,
        message_id: MessageId,
        destinations: Vec<Destination>,
    ) -> Result<usize, ConvoyError> {
        if destinations.is_empty() {
            return Ok(0);
        }
        let rows = destinations
            .iter()
            .map(|d| NewRecipient {
                target: d.target(),
                phone: d.phone().to_string(),
            })
            .collect();
        Ok(self.store.insert_recipients(message_id, rows).await?.len())
    }

    // --- Provider webhooks ---

    /// Route one decoded webhook entry.
    pub async fn handle_webhook(&self, event: WebhookEvent) -> Result<(), ConvoyError> {
        match event {
            WebhookEvent::Inbound(inbound) => self.receive_inbound(inbound).await.map(|_| ()),
            WebhookEvent::Status(update) => self.handle_status(update).await.map(|_| ()),
        }
    }

    /// Record an inbound message, opening the session window.
    ///
    /// Unknown drivers are created from the sender's phone and profile name.
    /// Group messages require an existing group and participant. Archived
    /// conversations are unarchived. Repeated provider ids are ignored.
    pub async fn receive_inbound(&self, event: InboundEvent) -> Result<InboundOutcome, ConvoyError> {
        let team = self
            .tenants
            .team_for_number(&event.phone_number_id)
            .ok_or(ConvoyError::NoTenant { team_id: None })?;

        if let Some(existing) = self.duplicate_of(&event).await? {
            return Ok(InboundOutcome::Duplicate(existing));
        }

        let phone = normalize_phone(event.author_phone(), &team.country_code)?;
        let (conversation_id, sender) = match event.group_id.as_deref() {
            None => self.individual_counterpart(&team, &phone, &event).await?,
            Some(external_id) => self.group_counterpart(&team, external_id, &phone).await?,
        };

        let guard = self.locks.lock(conversation_id).await;
        if let Some(existing) = self.duplicate_of(&event).await? {
            return Ok(InboundOutcome::Duplicate(existing));
        }

        let mut conversation = self.load_conversation(conversation_id).await?;
        let now = self.clock.now();
        if conversation.archived {
            conversation.archived = false;
            conversation.archived_at = None;
            conversation.archived_by = None;
            info!(conversation_id = %conversation_id, "conversation unarchived by inbound message");
        }
        conversation.record_inbound(now);

        let reply = self
            .inbound_reply(conversation_id, event.context_message_id.as_deref())
            .await?;
        let message = self
            .store
            .insert_message(NewMessage {
                conversation_id,
                content: event.content,
                sender,
                sent_at: event.timestamp,
                provider_message_id: Some(event.provider_message_id),
                status: MessageStatus::Sent,
                reply_to: reply,
                forwarded_from: None,
            })
            .await?;
        self.store.update_conversation(&conversation).await?;

        metrics::counter!("convoy_inbound_messages_total", "team" => team.id.to_string())
            .increment(1);
        debug!(
            conversation_id = %conversation_id,
            message_id = %message.id,
            sender = %sender,
            "inbound message recorded"
        );
        self.sink.publish(EngineEvent::MessageCreated {
            team_id: Some(team.id),
            conversation_id,
            message_id: message.id,
        });
        self.sink.publish(EngineEvent::ConversationUpdated { conversation_id });

        let relay_count = if self.should_relay(&conversation, &team) {
            let destinations = self.resolver.resolve(&conversation, &sender).await?;
            self.insert_recipients(message.id, destinations).await?
        } else {
            0
        };
        drop(guard);

        let relay = if relay_count > 0 {
            let ctx = self.tenants.context(team.id)?;
            debug!(message_id = %message.id, recipients = relay_count, "relaying group message");
            Some(self.delivery.send(&ctx, message.id).await?)
        } else {
            None
        };

        Ok(InboundOutcome::Recorded { message, relay })
    }

    /// Apply a provider status callback.
    pub async fn handle_status(
        &self,
        update: StatusUpdate,
    ) -> Result<Option<convoy_core::model::Recipient>, ConvoyError> {
        if self.tenants.team_for_number(&update.phone_number_id).is_none() {
            return Err(ConvoyError::NoTenant { team_id: None });
        }
        self.delivery.apply_status_update(&update).await
    }

    fn should_relay(&self, conversation: &Conversation, team: &Team) -> bool {
        self.relay_inbound && team.active && conversation.kind == ConversationKind::Group
    }

    async fn duplicate_of(&self, event: &InboundEvent) -> Result<Option<Message>, ConvoyError> {
        let existing = self
            .store
            .message_by_provider_id(&event.provider_message_id)
            .await?;
        if existing.is_some() {
            debug!(
                provider_message_id = %event.provider_message_id,
                "duplicate inbound webhook ignored"
            );
        }
        Ok(existing)
    }

    async fn individual_counterpart(
        &self,
        team: &Team,
        phone: &str,
        event: &InboundEvent,
    ) -> Result<(ConversationId, Sender), ConvoyError> {
        let driver = match self.store.driver_by_phone(team.id, phone).await? {
            Some(driver) => driver,
            None => {
                let name = event.profile_name.as_deref().unwrap_or(phone);
                let driver = self.store.insert_driver(team.id, name, phone).await?;
                info!(team_id = %team.id, driver_id = %driver.id, "driver registered from inbound message");
                driver
            }
        };

        let conversation = match self.store.conversation_for_driver(team.id, driver.id).await? {
            Some(conversation) => conversation,
            None => {
                self.store
                    .insert_conversation(NewConversation::individual(
                        team.id,
                        driver.id,
                        self.clock.now(),
                    ))
                    .await?
            }
        };
        Ok((conversation.id, Sender::Driver(driver.id)))
    }

    async fn group_counterpart(
        &self,
        team: &Team,
        external_id: &str,
        phone: &str,
    ) -> Result<(ConversationId, Sender), ConvoyError> {
        let group = self
            .store
            .group_by_external_id(team.id, external_id)
            .await?
            .ok_or_else(|| ConvoyError::not_found("group", external_id))?;

        let participant = self
            .participant_by_phone(group.id, phone)
            .await?
            .ok_or_else(|| {
                warn!(group_id = %group.id, "inbound group message from unknown participant");
                ConvoyError::not_found("participant", phone)
            })?;

        let conversation = match self.store.conversation_for_group(team.id, group.id).await? {
            Some(conversation) => conversation,
            None => {
                self.store
                    .insert_conversation(NewConversation::group(
                        team.id,
                        group.id,
                        self.clock.now(),
                    ))
                    .await?
            }
        };
        Ok((conversation.id, Sender::Participant(participant.id)))
    }

    /// Active participants win over removed ones with the same phone.
    async fn participant_by_phone(
        &self,
        group_id: GroupId,
        phone: &str,
    ) -> Result<Option<GroupParticipant>, ConvoyError> {
        let mut matched: Option<GroupParticipant> = None;
        for participant in self.store.participants(group_id).await? {
            let participant_phone = match &participant.target {
                ParticipantTarget::Contact { phone, .. } => Some(phone.clone()),
                ParticipantTarget::Driver { driver_id } => {
                    self.store.driver(*driver_id).await?.map(|d| d.phone)
                }
            };
            if participant_phone.as_deref() != Some(phone) {
                continue;
            }
            if participant.active {
                return Ok(Some(participant));
            }
            matched.get_or_insert(participant);
        }
        Ok(matched)
    }

    async fn inbound_reply(
        &self,
        conversation_id: ConversationId,
        context_message_id: Option<&str>,
    ) -> Result<Option<ReplySnapshot>, ConvoyError> {
        let Some(provider_id) = context_message_id else {
            return Ok(None);
        };
        let quoted = match self.store.message_by_provider_id(provider_id).await? {
            Some(message) => Some(message),
            None => match self.store.recipient_by_provider_id(provider_id).await? {
                Some(recipient) => self.store.message(recipient.message_id).await?,
                None => None,
            },
        };
        Ok(quoted
            .filter(|m| m.conversation_id == conversation_id)
            .map(|m| snapshot(&m)))
    }

    // --- Conversation maintenance ---

    pub async fn conversation(
        &self,
        ctx: &TenantContext,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ConvoyError> {
        self.authorized(ctx, conversation_id).await
    }

    /// Current session window, recomputed from the stored inbound timestamp.
    pub async fn window_status(
        &self,
        ctx: &TenantContext,
        conversation_id: ConversationId,
    ) -> Result<WindowStatus, ConvoyError> {
        let conversation = self.authorized(ctx, conversation_id).await?;
        Ok(window::evaluate(
            conversation.last_inbound_message_at,
            self.clock.now(),
        ))
    }

    pub async fn archive(
        &self,
        ctx: &TenantContext,
        conversation_id: ConversationId,
        actor: UserId,
    ) -> Result<Conversation, ConvoyError> {
        self.update_conversation(ctx, conversation_id, |conversation, now| {
            if conversation.archived {
                return false;
            }
            conversation.archived = true;
            conversation.archived_at = Some(now);
            conversation.archived_by = Some(actor);
            info!(conversation_id = %conversation_id, actor = %actor, "conversation archived");
            true
        })
        .await
    }

    pub async fn unarchive(
        &self,
        ctx: &TenantContext,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ConvoyError> {
        self.update_conversation(ctx, conversation_id, |conversation, _| {
            if !conversation.archived {
                return false;
            }
            conversation.archived = false;
            conversation.archived_at = None;
            conversation.archived_by = None;
            info!(conversation_id = %conversation_id, "conversation unarchived");
            true
        })
        .await
    }

    /// Assign a staff member, or clear the assignment with `None`.
    pub async fn assign(
        &self,
        ctx: &TenantContext,
        conversation_id: ConversationId,
        staff: Option<UserId>,
    ) -> Result<Conversation, ConvoyError> {
        self.update_conversation(ctx, conversation_id, |conversation, _| {
            if conversation.assigned_to == staff {
                return false;
            }
            conversation.assigned_to = staff;
            true
        })
        .await
    }

    async fn update_conversation<F>(
        &self,
        ctx: &TenantContext,
        conversation_id: ConversationId,
        mutate: F,
    ) -> Result<Conversation, ConvoyError>
    where
        F: FnOnce(&mut Conversation, chrono::DateTime<chrono::Utc>) -> bool,
    {
        let _guard = self.locks.lock(conversation_id).await;
        let mut conversation = self.authorized(ctx, conversation_id).await?;
        if mutate(&mut conversation, self.clock.now()) {
            self.store.update_conversation(&conversation).await?;
            self.sink
                .publish(EngineEvent::ConversationUpdated { conversation_id });
        }
        Ok(conversation)
    }

    // --- Message interactions, tenant-checked ---

    pub async fn react(
        &self,
        ctx: &TenantContext,
        message_id: MessageId,
        reactor: Reactor,
        emoji: &str,
    ) -> Result<Reaction, ConvoyError> {
        self.authorized_message(ctx, message_id).await?;
        self.interaction.react(message_id, reactor, emoji).await
    }

    pub async fn pin(
        &self,
        ctx: &TenantContext,
        message_id: MessageId,
        pinned: bool,
    ) -> Result<Message, ConvoyError> {
        self.authorized_message(ctx, message_id).await?;
        self.interaction.pin(message_id, pinned).await
    }

    pub async fn star(
        &self,
        ctx: &TenantContext,
        message_id: MessageId,
        starred: bool,
    ) -> Result<Message, ConvoyError> {
        self.authorized_message(ctx, message_id).await?;
        self.interaction.star(message_id, starred).await
    }

    pub async fn soft_delete(
        &self,
        ctx: &TenantContext,
        message_id: MessageId,
        actor: UserId,
    ) -> Result<Message, ConvoyError> {
        self.authorized_message(ctx, message_id).await?;
        self.interaction.soft_delete(message_id, actor).await
    }

    /// Administrative stop for a message's retry chain.
    pub async fn abandon(
        &self,
        ctx: &TenantContext,
        message_id: MessageId,
        actor: UserId,
    ) -> Result<Message, ConvoyError> {
        self.authorized_message(ctx, message_id).await?;
        self.delivery.abandon(message_id, actor).await
    }

    /// Read a message, soft-deleted or not.
    pub async fn message(
        &self,
        ctx: &TenantContext,
        message_id: MessageId,
    ) -> Result<Message, ConvoyError> {
        self.authorized_message(ctx, message_id).await
    }

    // --- Tenant checks ---

    async fn load_conversation(&self, id: ConversationId) -> Result<Conversation, ConvoyError> {
        self.store
            .conversation(id)
            .await?
            .ok_or_else(|| ConvoyError::not_found("conversation", id))
    }

    async fn authorized(
        &self,
        ctx: &TenantContext,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ConvoyError> {
        let conversation = self.load_conversation(conversation_id).await?;
        check_tenant(ctx.team_id(), &conversation)?;
        Ok(conversation)
    }

    async fn authorized_message(
        &self,
        ctx: &TenantContext,
        message_id: MessageId,
    ) -> Result<Message, ConvoyError> {
        let message = self.interaction.message(message_id).await?;
        self.authorized(ctx, message.conversation_id).await?;
        Ok(message)
    }
}

fn check_tenant(team_id: TeamId, conversation: &Conversation) -> Result<(), ConvoyError> {
    match conversation.team_id {
        None => Err(ConvoyError::NoTenant { team_id: None }),
        Some(owner) if owner != team_id => Err(ConvoyError::TenantMismatch {
            team_id,
            conversation_id: conversation.id,
        }),
        Some(_) => Ok(()),
    }
}
