// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery state machine.
//!
//! Owns the per-recipient status lifecycle and the message-level retry
//! bookkeeping. Every mutation of a message or its recipients happens under
//! that message's lock, so acknowledgements, failures and retries never
//! interleave. Provider I/O happens under the lock too, bounded by the send
//! timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use convoy_config::model::DeliveryConfig;
use convoy_core::inbound::{ProviderStatus, StatusUpdate};
use convoy_core::model::{Message, Recipient, Team};
use convoy_core::traits::OutboundPayload;
use convoy_core::types::RecipientTarget;
use convoy_core::{
    Clock, ConvoyError, Destination, Direction, EngineEvent, ErrorClassifier, EventSink, FailureClass,
    MessageId, MessageStatus, MessageStore, ProviderClient, ProviderError, RecipientId, UserId,
};
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::locks::KeyedLocks;
use crate::tenant::{TenantContext, TenantRegistry};
use crate::EngineDeps;

/// Retry budget, backoff bounds and per-attempt timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first failed attempt.
    pub budget: u32,
    pub base: Duration,
    pub max: Duration,
    pub send_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            budget: config.retry_budget,
            base: config.backoff_base(),
            max: config.backoff_max(),
            send_timeout: config.send_timeout(),
        }
    }

    /// `min(base * 2^retry_count, max)`.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        2u32.checked_pow(retry_count)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DeliveryConfig::default())
    }
}

/// A recipient whose attempt did not succeed, with the typed reason.
#[derive(Debug)]
pub struct RecipientFailure {
    pub recipient_id: RecipientId,
    pub error: ConvoyError,
}

/// Result of one dispatch round for a message.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub message: Message,
    pub recipients: Vec<Recipient>,
    /// Failures from this round only. Empty when nothing was dispatched.
    pub failures: Vec<RecipientFailure>,
}

impl DeliveryOutcome {
    /// Every recipient has been accepted by the provider.
    pub fn is_accepted(&self) -> bool {
        self.message.status.is_accepted()
    }

    /// The first failure of this round, if any, as an error.
    pub fn into_result(self) -> Result<Message, ConvoyError> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.message),
        }
    }
}

enum Attempt {
    /// The recipient as persisted in the Sent state.
    Accepted(Recipient),
    Failed {
        class: FailureClass,
        error: ConvoyError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ack {
    Sent,
    Delivered,
    Read,
    /// Voice note played; implies read.
    Seen,
}

pub struct DeliveryEngine {
    store: Arc<dyn MessageStore>,
    provider: Arc<dyn ProviderClient>,
    classifier: Arc<dyn ErrorClassifier>,
    tenants: Arc<TenantRegistry>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks<MessageId>>,
    policy: RetryPolicy,
}

impl DeliveryEngine {
    pub fn new(deps: &EngineDeps, locks: Arc<KeyedLocks<MessageId>>, policy: RetryPolicy) -> Self {
        Self {
            store: Arc::clone(&deps.store),
            provider: Arc::clone(&deps.provider),
            classifier: Arc::clone(&deps.classifier),
            tenants: Arc::clone(&deps.tenants),
            sink: Arc::clone(&deps.sink),
            clock: Arc::clone(&deps.clock),
            locks,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Dispatch every Pending or Failed recipient of `message_id`.
    ///
    /// Idempotent: a message whose recipients have all been accepted (or
    /// exhausted) is returned unchanged. Provider failures are recorded as
    /// state and reported in [`DeliveryOutcome::failures`]; only storage and
    /// tenant errors are returned as `Err`.
    pub async fn send(
        &self,
        ctx: &TenantContext,
        message_id: MessageId,
    ) -> Result<DeliveryOutcome, ConvoyError> {
        let _guard = self.locks.lock(message_id).await;

        let mut message = self.load_message(message_id).await?;
        let conversation = self
            .store
            .conversation(message.conversation_id)
            .await?
            .ok_or_else(|| ConvoyError::not_found("conversation", message.conversation_id))?;
        if conversation.team_id != Some(ctx.team_id()) {
            return Err(ConvoyError::TenantMismatch {
                team_id: ctx.team_id(),
                conversation_id: conversation.id,
            });
        }

        let mut recipients = self.store.recipients(message_id).await?;
        let due: Vec<usize> = recipients
            .iter()
            .enumerate()
            .filter(|(_, r)| r.status.awaits_dispatch())
            .map(|(i, _)| i)
            .collect();

        if due.is_empty() {
            debug!(message_id = %message_id, status = %message.status, "nothing to dispatch");
            if message.next_retry_at.take().is_some() {
                self.store.update_message(&message).await?;
            }
            return Ok(DeliveryOutcome {
                message,
                recipients,
                failures: Vec::new(),
            });
        }

        let before = message.status;
        for &i in &due {
            if recipients[i].status != MessageStatus::Pending {
                recipients[i].status = MessageStatus::Pending;
                self.store.update_recipient(&recipients[i]).await?;
            }
        }
        message.status = MessageStatus::aggregate(recipients.iter().map(|r| r.status));
        self.store.update_message(&message).await?;

        let payload = self.payload_for(&message).await?;
        let team = ctx.team();
        let results = join_all(
            due.iter()
                .map(|&i| self.dispatch(team, &recipients[i], &payload)),
        )
        .await;

        let now = self.clock.now();
        let team_label = team.id.to_string();
        let mut failures = Vec::new();
        for (&i, result) in due.iter().zip(results) {
            let recipient = &mut recipients[i];
            match result? {
                Attempt::Accepted(accepted) => {
                    metrics::counter!("convoy_messages_sent_total", "team" => team_label.clone())
                        .increment(1);
                    *recipient = accepted;
                }
                Attempt::Failed { class, error } => {
                    warn!(
                        message_id = %message_id,
                        recipient_id = %recipient.id,
                        class = %class,
                        error = %error,
                        "send attempt failed"
                    );
                    recipient.status = match class {
                        FailureClass::Transient => MessageStatus::Failed,
                        FailureClass::Permanent => MessageStatus::FailedExhausted,
                    };
                    recipient.last_error = Some(error.to_string());
                    metrics::counter!(
                        "convoy_send_failures_total",
                        "team" => team_label.clone(),
                        "class" => class.to_string()
                    )
                    .increment(1);
                    failures.push(RecipientFailure {
                        recipient_id: recipient.id,
                        error,
                    });
                }
            }
        }

        // Inbound messages keep their own provider id; relays never replace it.
        if message.direction == Direction::Outbound
            && message.provider_message_id.is_none()
            && recipients.len() == 1
        {
            message.provider_message_id = recipients[0].provider_message_id.clone();
        }

        let permanent = failures
            .iter()
            .any(|f| matches!(f.error, ConvoyError::PermanentProvider { .. }));
        let exhausted = self.settle_retry(&mut message, &mut recipients, &mut failures, now);
        let reason = match (exhausted, permanent) {
            (true, _) => Some(format!(
                "retry budget of {} exhausted",
                self.policy.budget
            )),
            (false, true) => Some("permanent provider failure".to_string()),
            (false, false) => None,
        };

        self.commit(&mut message, before, &recipients, &due, reason)
            .await?;

        Ok(DeliveryOutcome {
            message,
            recipients,
            failures,
        })
    }

    /// Mark a recipient as accepted. No-op when already Sent or further.
    pub async fn acknowledge_sent(
        &self,
        recipient_id: RecipientId,
        at: DateTime<Utc>,
    ) -> Result<Recipient, ConvoyError> {
        self.acknowledge(recipient_id, Ack::Sent, at).await
    }

    /// Record delivery, backfilling Sent when it was skipped.
    pub async fn acknowledge_delivery(
        &self,
        recipient_id: RecipientId,
        at: DateTime<Utc>,
    ) -> Result<Recipient, ConvoyError> {
        self.acknowledge(recipient_id, Ack::Delivered, at).await
    }

    /// Record a read receipt, backfilling Sent and Delivered when skipped.
    pub async fn acknowledge_read(
        &self,
        recipient_id: RecipientId,
        at: DateTime<Utc>,
    ) -> Result<Recipient, ConvoyError> {
        self.acknowledge(recipient_id, Ack::Read, at).await
    }

    /// Record that a voice note was played. Implies Read.
    pub async fn acknowledge_seen(
        &self,
        recipient_id: RecipientId,
        at: DateTime<Utc>,
    ) -> Result<Recipient, ConvoyError> {
        self.acknowledge(recipient_id, Ack::Seen, at).await
    }

    /// Apply a provider status callback. Unknown provider ids yield `Ok(None)`.
    pub async fn apply_status_update(
        &self,
        update: &StatusUpdate,
    ) -> Result<Option<Recipient>, ConvoyError> {
        let Some(recipient) = self
            .store
            .recipient_by_provider_id(&update.provider_message_id)
            .await?
        else {
            debug!(
                provider_message_id = %update.provider_message_id,
                status = %update.status,
                "status callback for unknown provider id"
            );
            return Ok(None);
        };

        let updated = match update.status {
            ProviderStatus::Sent => self.acknowledge_sent(recipient.id, update.timestamp).await?,
            ProviderStatus::Delivered => {
                self.acknowledge_delivery(recipient.id, update.timestamp)
                    .await?
            }
            ProviderStatus::Read => self.acknowledge_read(recipient.id, update.timestamp).await?,
            ProviderStatus::Played => self.acknowledge_seen(recipient.id, update.timestamp).await?,
            ProviderStatus::Failed => {
                let error = update.error.clone().unwrap_or_else(|| ProviderError {
                    http_status: None,
                    code: None,
                    message: "provider reported failure without detail".to_string(),
                });
                self.fail_recipient(recipient.id, &error).await?
            }
        };
        Ok(Some(updated))
    }

    /// Feed an asynchronous provider failure into the retry path.
    ///
    /// Only Pending and Sent recipients can fail; later states are left alone.
    pub async fn fail_recipient(
        &self,
        recipient_id: RecipientId,
        error: &ProviderError,
    ) -> Result<Recipient, ConvoyError> {
        let message_id = self.recipient_message(recipient_id).await?;
        let _guard = self.locks.lock(message_id).await;

        let mut message = self.load_message(message_id).await?;
        let mut recipients = self.store.recipients(message_id).await?;
        let idx = position(&recipients, recipient_id)?;

        if !recipients[idx].status.can_transition_to(MessageStatus::Failed) {
            debug!(
                recipient_id = %recipient_id,
                status = %recipients[idx].status,
                "failure callback ignored"
            );
            return Ok(recipients.swap_remove(idx));
        }

        let class = self.classifier.classify(error);
        let failure = provider_failure(class, error);
        warn!(
            message_id = %message_id,
            recipient_id = %recipient_id,
            class = %class,
            error = %failure,
            "provider reported delivery failure"
        );
        let team_label = self
            .store
            .conversation(message.conversation_id)
            .await?
            .and_then(|c| c.team_id)
            .map_or_else(|| "none".to_string(), |t| t.to_string());
        metrics::counter!(
            "convoy_send_failures_total",
            "team" => team_label,
            "class" => class.to_string()
        )
        .increment(1);

        let before = message.status;
        let recipient = &mut recipients[idx];
        recipient.status = match class {
            FailureClass::Transient => MessageStatus::Failed,
            FailureClass::Permanent => MessageStatus::FailedExhausted,
        };
        recipient.last_error = Some(failure.to_string());

        let mut failures = vec![RecipientFailure {
            recipient_id,
            error: failure,
        }];
        // One failed round costs one attempt, however many callbacks report it.
        let exhausted = if message.next_retry_at.is_some() {
            debug!(
                message_id = %message_id,
                recipient_id = %recipient_id,
                retry_count = message.retry_count,
                "failure joins the scheduled retry"
            );
            false
        } else {
            let now = self.clock.now();
            self.settle_retry(&mut message, &mut recipients, &mut failures, now)
        };
        let reason = match (exhausted, class) {
            (true, _) => Some(format!("retry budget of {} exhausted", self.policy.budget)),
            (false, FailureClass::Permanent) => Some("permanent provider failure".to_string()),
            (false, FailureClass::Transient) => None,
        };

        self.commit(&mut message, before, &recipients, &[idx], reason)
            .await?;
        Ok(recipients.swap_remove(idx))
    }

    /// Give up on a stuck retry chain: every Pending or Failed recipient becomes
    /// Failed-Exhausted and the message is reported to the operator.
    pub async fn abandon(
        &self,
        message_id: MessageId,
        actor: UserId,
    ) -> Result<Message, ConvoyError> {
        let _guard = self.locks.lock(message_id).await;

        let mut message = self.load_message(message_id).await?;
        let mut recipients = self.store.recipients(message_id).await?;
        let before = message.status;

        let mut changed = Vec::new();
        for (i, recipient) in recipients.iter_mut().enumerate() {
            if recipient.status.awaits_dispatch() {
                recipient.status = MessageStatus::FailedExhausted;
                recipient.last_error = Some(format!("abandoned by staff:{actor}"));
                changed.push(i);
            }
        }

        if changed.is_empty() && message.next_retry_at.is_none() {
            debug!(message_id = %message_id, "abandon: nothing in flight");
            return Ok(message);
        }

        message.next_retry_at = None;
        info!(
            message_id = %message_id,
            actor = %actor,
            recipients = changed.len(),
            "retry chain abandoned"
        );
        self.commit(
            &mut message,
            before,
            &recipients,
            &changed,
            Some(format!("abandoned by staff:{actor}")),
        )
        .await?;
        Ok(message)
    }

    /// Push a scheduled retry back without consuming an attempt.
    pub async fn postpone(
        &self,
        message_id: MessageId,
        delay: Duration,
    ) -> Result<(), ConvoyError> {
        let _guard = self.locks.lock(message_id).await;
        let mut message = self.load_message(message_id).await?;
        if message.next_retry_at.is_some() {
            message.next_retry_at = Some(after(self.clock.now(), delay));
            self.store.update_message(&message).await?;
        }
        Ok(())
    }

    async fn acknowledge(
        &self,
        recipient_id: RecipientId,
        ack: Ack,
        at: DateTime<Utc>,
    ) -> Result<Recipient, ConvoyError> {
        let message_id = self.recipient_message(recipient_id).await?;
        let _guard = self.locks.lock(message_id).await;

        let mut recipients = self.store.recipients(message_id).await?;
        let idx = position(&recipients, recipient_id)?;

        if !apply_ack(&mut recipients[idx], ack, at) {
            return Ok(recipients.swap_remove(idx));
        }
        debug!(
            message_id = %message_id,
            recipient_id = %recipient_id,
            status = %recipients[idx].status,
            "acknowledgement applied"
        );

        let mut message = self.load_message(message_id).await?;
        let before = message.status;
        self.commit(&mut message, before, &recipients, &[idx], None)
            .await?;
        Ok(recipients.swap_remove(idx))
    }

    async fn attempt(
        &self,
        team: &Team,
        recipient: &Recipient,
        payload: &OutboundPayload,
    ) -> Result<String, (FailureClass, ConvoyError)> {
        if let Err(error) = self.tenants.try_acquire(team.id) {
            return Err((FailureClass::Transient, error));
        }

        let destination = destination_for(recipient);
        let send = self.provider.attempt_send(&destination, payload, team);
        match tokio::time::timeout(self.policy.send_timeout, send).await {
            Ok(Ok(receipt)) => Ok(receipt.provider_message_id),
            Ok(Err(err)) => {
                let class = self.classifier.classify(&err);
                Err((class, provider_failure(class, &err)))
            }
            Err(_) => Err((
                FailureClass::Transient,
                ConvoyError::Timeout {
                    duration: self.policy.send_timeout,
                },
            )),
        }
    }

    /// Run one attempt and persist an acceptance right away, so status
    /// callbacks for this recipient resolve while the rest of the fan-out is
    /// still in flight. They then queue on the message lock.
    async fn dispatch(
        &self,
        team: &Team,
        recipient: &Recipient,
        payload: &OutboundPayload,
    ) -> Result<Attempt, ConvoyError> {
        match self.attempt(team, recipient, payload).await {
            Ok(provider_message_id) => {
                debug!(
                    message_id = %recipient.message_id,
                    recipient_id = %recipient.id,
                    provider_message_id = %provider_message_id,
                    "provider accepted message"
                );
                let mut accepted = recipient.clone();
                accepted.status = MessageStatus::Sent;
                accepted.provider_message_id = Some(provider_message_id);
                accepted.sent_at = Some(self.clock.now());
                accepted.last_error = None;
                self.store.update_recipient(&accepted).await?;
                Ok(Attempt::Accepted(accepted))
            }
            Err((class, error)) => Ok(Attempt::Failed { class, error }),
        }
    }

    /// Update retry bookkeeping after a failure round. Returns `true` when the
    /// budget ran out and the remaining Failed recipients were exhausted.
    fn settle_retry(
        &self,
        message: &mut Message,
        recipients: &mut [Recipient],
        failures: &mut [RecipientFailure],
        now: DateTime<Utc>,
    ) -> bool {
        if !recipients.iter().any(|r| r.status == MessageStatus::Failed) {
            message.next_retry_at = None;
            return false;
        }

        message.retry_count += 1;
        if message.retry_count > self.policy.budget {
            for recipient in recipients
                .iter_mut()
                .filter(|r| r.status == MessageStatus::Failed)
            {
                recipient.status = MessageStatus::FailedExhausted;
            }
            for failure in failures.iter_mut().filter(|f| f.error.is_retryable()) {
                failure.error = ConvoyError::RetryBudgetExhausted {
                    message_id: message.id,
                    attempts: message.retry_count,
                };
            }
            message.next_retry_at = None;
            return true;
        }

        let delay = self.policy.backoff(message.retry_count);
        let next = after(now, delay);
        message.next_retry_at = Some(next);
        metrics::counter!("convoy_retries_scheduled_total").increment(1);
        info!(
            message_id = %message.id,
            retry_count = message.retry_count,
            next_retry_at = %next,
            "retry scheduled"
        );
        false
    }

    /// Persist changed recipients and the recomputed message, then notify.
    async fn commit(
        &self,
        message: &mut Message,
        before: MessageStatus,
        recipients: &[Recipient],
        changed: &[usize],
        exhausted: Option<String>,
    ) -> Result<(), ConvoyError> {
        message.status = MessageStatus::aggregate(recipients.iter().map(|r| r.status));

        for &i in changed {
            let recipient = &recipients[i];
            self.store.update_recipient(recipient).await?;
            self.sink.publish(EngineEvent::RecipientStatusChanged {
                message_id: message.id,
                recipient_id: recipient.id,
                status: recipient.status,
            });
        }
        self.store.update_message(message).await?;

        if message.status != before {
            debug!(
                message_id = %message.id,
                from = %before,
                to = %message.status,
                "message status changed"
            );
            self.sink.publish(EngineEvent::StatusChanged {
                conversation_id: message.conversation_id,
                message_id: message.id,
                status: message.status,
            });
        }

        if let Some(reason) = exhausted {
            error!(message_id = %message.id, reason = %reason, "delivery exhausted");
            metrics::counter!("convoy_delivery_exhausted_total").increment(1);
            self.sink.publish(EngineEvent::DeliveryExhausted {
                conversation_id: message.conversation_id,
                message_id: message.id,
                reason,
            });
        }
        Ok(())
    }

    async fn payload_for(&self, message: &Message) -> Result<OutboundPayload, ConvoyError> {
        let context_message_id = match &message.reply_to {
            Some(reply) => self
                .store
                .message(reply.message_id)
                .await?
                .and_then(|m| m.provider_message_id),
            None => None,
        };
        Ok(OutboundPayload {
            content: message.content.clone(),
            context_message_id,
        })
    }

    async fn load_message(&self, id: MessageId) -> Result<Message, ConvoyError> {
        self.store
            .message(id)
            .await?
            .ok_or_else(|| ConvoyError::not_found("message", id))
    }

    async fn recipient_message(&self, id: RecipientId) -> Result<MessageId, ConvoyError> {
        self.store
            .recipient(id)
            .await?
            .map(|r| r.message_id)
            .ok_or_else(|| ConvoyError::not_found("recipient", id))
    }
}

fn position(recipients: &[Recipient], id: RecipientId) -> Result<usize, ConvoyError> {
    recipients
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| ConvoyError::not_found("recipient", id))
}

fn provider_failure(class: FailureClass, error: &ProviderError) -> ConvoyError {
    match class {
        FailureClass::Transient => ConvoyError::TransientProvider {
            message: error.message.clone(),
        },
        FailureClass::Permanent => ConvoyError::PermanentProvider {
            code: error.code,
            message: error.message.clone(),
        },
    }
}

fn destination_for(recipient: &Recipient) -> Destination {
    match recipient.target {
        RecipientTarget::Driver(driver_id) => Destination::Driver {
            driver_id,
            phone: recipient.phone.clone(),
        },
        RecipientTarget::Participant(participant_id) => Destination::Participant {
            participant_id,
            phone: recipient.phone.clone(),
            name: None,
        },
    }
}

fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Move a recipient forward, backfilling skipped timestamps with `at`.
/// Returns whether anything changed.
fn apply_ack(recipient: &mut Recipient, ack: Ack, at: DateTime<Utc>) -> bool {
    if matches!(
        recipient.status,
        MessageStatus::Failed | MessageStatus::FailedExhausted
    ) {
        debug!(
            recipient_id = %recipient.id,
            status = %recipient.status,
            "acknowledgement for failed recipient ignored"
        );
        return false;
    }

    let before = (recipient.status, recipient.seen_at);
    let target = match ack {
        Ack::Sent => MessageStatus::Sent,
        Ack::Delivered => MessageStatus::Delivered,
        Ack::Read | Ack::Seen => MessageStatus::Read,
    };

    if target > recipient.status {
        if recipient.sent_at.is_none() {
            recipient.sent_at = Some(at);
        }
        if target >= MessageStatus::Delivered && recipient.delivered_at.is_none() {
            recipient.delivered_at = Some(at);
        }
        if target >= MessageStatus::Read && recipient.read_at.is_none() {
            recipient.read_at = Some(at);
        }
        recipient.status = target;
    }
    if ack == Ack::Seen && recipient.seen_at.is_none() {
        recipient.seen_at = Some(at);
    }

    (recipient.status, recipient.seen_at) != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use convoy_core::{DriverId, MessageId};
    use proptest::prelude::*;

    fn recipient(status: MessageStatus) -> Recipient {
        Recipient {
            id: RecipientId(1),
            message_id: MessageId(1),
            target: RecipientTarget::Driver(DriverId(1)),
            phone: "31600000000".into(),
            status,
            provider_message_id: Some("wamid.1".into()),
            sent_at: None,
            delivered_at: None,
            read_at: None,
            seen_at: None,
            last_error: None,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn backoff_doubles_from_first_retry_and_caps() {
        let policy = RetryPolicy {
            budget: 3,
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            send_timeout: Duration::from_secs(15),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(5), Duration::from_secs(30));
        assert_eq!(policy.backoff(64), Duration::from_secs(30));
    }

    #[test]
    fn read_before_delivered_backfills() {
        let mut r = recipient(MessageStatus::Pending);
        assert!(apply_ack(&mut r, Ack::Read, at()));
        assert_eq!(r.status, MessageStatus::Read);
        assert_eq!(r.sent_at, Some(at()));
        assert_eq!(r.delivered_at, Some(at()));
        assert_eq!(r.read_at, Some(at()));
    }

    #[test]
    fn late_delivery_after_read_is_noop() {
        let mut r = recipient(MessageStatus::Sent);
        r.sent_at = Some(at());
        apply_ack(&mut r, Ack::Read, at() + TimeDelta::seconds(5));
        assert!(!apply_ack(&mut r, Ack::Delivered, at() + TimeDelta::seconds(9)));
        assert_eq!(r.status, MessageStatus::Read);
        assert_eq!(r.delivered_at, Some(at() + TimeDelta::seconds(5)));
    }

    #[test]
    fn seen_sets_timestamp_once() {
        let mut r = recipient(MessageStatus::Delivered);
        assert!(apply_ack(&mut r, Ack::Seen, at()));
        assert_eq!(r.status, MessageStatus::Read);
        assert_eq!(r.seen_at, Some(at()));
        assert!(!apply_ack(&mut r, Ack::Seen, at() + TimeDelta::minutes(1)));
        assert_eq!(r.seen_at, Some(at()));
    }

    #[test]
    fn acks_on_failed_recipients_are_ignored() {
        for status in [MessageStatus::Failed, MessageStatus::FailedExhausted] {
            let mut r = recipient(status);
            assert!(!apply_ack(&mut r, Ack::Delivered, at()));
            assert_eq!(r.status, status);
        }
    }

    fn ack_strategy() -> impl Strategy<Value = Ack> {
        prop_oneof![
            Just(Ack::Sent),
            Just(Ack::Delivered),
            Just(Ack::Read),
            Just(Ack::Seen)
        ]
    }

    proptest! {
        #[test]
        fn acks_never_move_backwards(acks in proptest::collection::vec(ack_strategy(), 0..12)) {
            let mut r = recipient(MessageStatus::Pending);
            let mut prev = r.status;
            for (i, ack) in acks.into_iter().enumerate() {
                apply_ack(&mut r, ack, at() + TimeDelta::seconds(i as i64));
                prop_assert!(r.status >= prev);
                prev = r.status;
            }
        }

        #[test]
        fn backoff_is_bounded(count in 0u32..200, base_ms in 1u64..10_000, extra_ms in 0u64..100_000) {
            let policy = RetryPolicy {
                budget: 3,
                base: Duration::from_millis(base_ms),
                max: Duration::from_millis(base_ms + extra_ms),
                send_timeout: Duration::from_secs(1),
            };
            let delay = policy.backoff(count);
            prop_assert!(delay <= policy.max);
            prop_assert!(delay >= policy.base.min(policy.max));
        }
    }
}
