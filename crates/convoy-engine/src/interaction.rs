// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message interactions: reactions, pin, star, soft-delete, forward and reply.
//!
//! Mutations run under the message lock. Soft-deleted messages stay readable
//! but refuse every mutation except a repeated delete.

use std::sync::Arc;

use convoy_core::model::{Message, Reaction, ReplySnapshot};
use convoy_core::{
    Clock, ConversationId, ConvoyError, EngineEvent, EventSink, MessageContent, MessageId,
    MessageStore, Reactor, UserId,
};
use tracing::{debug, info};

use crate::locks::KeyedLocks;
use crate::EngineDeps;

/// Content and provenance for the copies created by a forward.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardDraft {
    pub source_id: MessageId,
    pub source_conversation_id: ConversationId,
    pub content: MessageContent,
}

pub struct InteractionEngine {
    store: Arc<dyn MessageStore>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks<MessageId>>,
}

impl InteractionEngine {
    pub fn new(deps: &EngineDeps, locks: Arc<KeyedLocks<MessageId>>) -> Self {
        Self {
            store: Arc::clone(&deps.store),
            sink: Arc::clone(&deps.sink),
            clock: Arc::clone(&deps.clock),
            locks,
        }
    }

    /// Read access, including soft-deleted messages.
    pub async fn message(&self, id: MessageId) -> Result<Message, ConvoyError> {
        self.store
            .message(id)
            .await?
            .ok_or_else(|| ConvoyError::not_found("message", id))
    }

    pub async fn reactions(&self, id: MessageId) -> Result<Vec<Reaction>, ConvoyError> {
        self.store.reactions(id).await
    }

    /// Upsert the reactor's single reaction on a message.
    pub async fn react(
        &self,
        message_id: MessageId,
        reactor: Reactor,
        emoji: &str,
    ) -> Result<Reaction, ConvoyError> {
        let _guard = self.locks.lock(message_id).await;
        let message = self.live_message(message_id).await?;
        let now = self.clock.now();

        let existing = self
            .store
            .reactions(message_id)
            .await?
            .into_iter()
            .find(|r| r.reactor == reactor);

        let reaction = match existing {
            Some(reaction) if reaction.emoji == emoji => return Ok(reaction),
            Some(mut reaction) => {
                reaction.emoji = emoji.to_string();
                reaction.reacted_at = now;
                self.store.update_reaction(&reaction).await?;
                reaction
            }
            None => {
                self.store
                    .insert_reaction(message_id, reactor, emoji, now)
                    .await?
            }
        };

        debug!(message_id = %message.id, emoji, "reaction set");
        self.sink.publish(EngineEvent::ReactionChanged {
            message_id,
            reactor,
            emoji: reaction.emoji.clone(),
        });
        Ok(reaction)
    }

    /// Pin or unpin. `pinned_at` is set only on the false-to-true transition.
    pub async fn pin(&self, message_id: MessageId, pinned: bool) -> Result<Message, ConvoyError> {
        let _guard = self.locks.lock(message_id).await;
        let mut message = self.live_message(message_id).await?;
        if message.pinned == pinned {
            return Ok(message);
        }
        message.pinned = pinned;
        message.pinned_at = pinned.then(|| self.clock.now());
        self.save(&message).await?;
        Ok(message)
    }

    /// Star or unstar, with the same timestamp rules as [`Self::pin`].
    pub async fn star(&self, message_id: MessageId, starred: bool) -> Result<Message, ConvoyError> {
        let _guard = self.locks.lock(message_id).await;
        let mut message = self.live_message(message_id).await?;
        if message.starred == starred {
            return Ok(message);
        }
        message.starred = starred;
        message.starred_at = starred.then(|| self.clock.now());
        self.save(&message).await?;
        Ok(message)
    }

    /// Flag a message as deleted. Content is retained. Repeating is a no-op.
    pub async fn soft_delete(
        &self,
        message_id: MessageId,
        actor: UserId,
    ) -> Result<Message, ConvoyError> {
        let _guard = self.locks.lock(message_id).await;
        let mut message = self.message(message_id).await?;
        if message.deleted {
            return Ok(message);
        }
        message.deleted = true;
        message.deleted_at = Some(self.clock.now());
        message.deleted_by = Some(actor);
        self.save(&message).await?;
        info!(message_id = %message_id, actor = %actor, "message soft-deleted");
        Ok(message)
    }

    /// Validate a forward source and build the content of its copies.
    ///
    /// `override_text` replaces the original content with a text body.
    pub async fn prepare_forward(
        &self,
        message_id: MessageId,
        override_text: Option<String>,
    ) -> Result<ForwardDraft, ConvoyError> {
        let message = self.live_message(message_id).await?;
        let content = match override_text {
            Some(body) => MessageContent::Text { body },
            None => message.content,
        };
        Ok(ForwardDraft {
            source_id: message.id,
            source_conversation_id: message.conversation_id,
            content,
        })
    }

    /// Count one successful forward copy on the source message.
    ///
    /// The copy already exists, so this succeeds even if the source was
    /// deleted in the meantime.
    pub async fn record_forward(&self, message_id: MessageId) -> Result<Message, ConvoyError> {
        let _guard = self.locks.lock(message_id).await;
        let mut message = self.message(message_id).await?;
        message.forward_count += 1;
        self.save(&message).await?;
        Ok(message)
    }

    /// One-time snapshot of the message being replied to.
    pub async fn reply_context(
        &self,
        conversation_id: ConversationId,
        reply_to: MessageId,
    ) -> Result<ReplySnapshot, ConvoyError> {
        let target = self.message(reply_to).await?;
        if target.conversation_id != conversation_id {
            return Err(ConvoyError::ReplyOutsideConversation {
                conversation_id,
                reply_to,
            });
        }
        Ok(snapshot(&target))
    }

    async fn live_message(&self, id: MessageId) -> Result<Message, ConvoyError> {
        let message = self.message(id).await?;
        if message.deleted {
            return Err(ConvoyError::MessageDeleted { message_id: id });
        }
        Ok(message)
    }

    async fn save(&self, message: &Message) -> Result<(), ConvoyError> {
        self.store.update_message(message).await?;
        self.sink.publish(EngineEvent::MessageUpdated {
            conversation_id: message.conversation_id,
            message_id: message.id,
        });
        Ok(())
    }
}

/// Denormalised preview of `message` for a reply.
pub fn snapshot(message: &Message) -> ReplySnapshot {
    ReplySnapshot {
        message_id: message.id,
        preview: message.content.preview(),
        sender: message.sender,
        direction: message.direction,
    }
}
