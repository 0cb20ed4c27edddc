// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background retry driver.
//!
//! Polls the store for messages whose `next_retry_at` has passed and hands
//! them back to [`DeliveryEngine::send`]. Several schedulers may run against
//! the same store; the message lock plus the due-recipient check in `send`
//! keep a message from being dispatched twice for the same retry.

use std::sync::Arc;
use std::time::Duration;

use convoy_config::model::SchedulerConfig;
use convoy_core::{Clock, ConversationId, ConvoyError, MessageId, MessageStore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::delivery::DeliveryEngine;
use crate::locks::KeyedLocks;
use crate::tenant::{TenantContext, TenantRegistry};
use crate::EngineDeps;

/// Counters for a single scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub due: usize,
    pub dispatched: usize,
    /// Pushed back because the owning tenant is gone or inactive.
    pub postponed: usize,
    pub errors: usize,
}

pub struct RetryScheduler {
    store: Arc<dyn MessageStore>,
    tenants: Arc<TenantRegistry>,
    clock: Arc<dyn Clock>,
    delivery: Arc<DeliveryEngine>,
    message_locks: Arc<KeyedLocks<MessageId>>,
    conversation_locks: Arc<KeyedLocks<ConversationId>>,
    poll_interval: Duration,
    batch_size: usize,
    postpone_delay: Duration,
}

impl RetryScheduler {
    pub fn new(
        deps: &EngineDeps,
        delivery: Arc<DeliveryEngine>,
        message_locks: Arc<KeyedLocks<MessageId>>,
        conversation_locks: Arc<KeyedLocks<ConversationId>>,
        config: &SchedulerConfig,
    ) -> Self {
        let postpone_delay = delivery.policy().max;
        Self {
            store: Arc::clone(&deps.store),
            tenants: Arc::clone(&deps.tenants),
            clock: Arc::clone(&deps.clock),
            delivery,
            message_locks,
            conversation_locks,
            poll_interval: config.poll_interval(),
            batch_size: config.batch_size,
            postpone_delay,
        }
    }

    /// Poll until `cancel` fires. A failed pass is logged and the loop continues.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            batch_size = self.batch_size,
            "retry scheduler started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(summary) if summary.due > 0 => {
                            debug!(
                                due = summary.due,
                                dispatched = summary.dispatched,
                                postponed = summary.postponed,
                                errors = summary.errors,
                                "retry pass complete"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "retry pass failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    break;
                }
            }
        }

        info!("retry scheduler stopped");
    }

    /// Run one pass over the due messages.
    pub async fn tick(&self) -> Result<RetrySummary, ConvoyError> {
        let due = self
            .store
            .due_for_retry(self.clock.now(), self.batch_size)
            .await?;
        let mut summary = RetrySummary {
            due: due.len(),
            ..RetrySummary::default()
        };

        for message_id in due {
            match self.context_for(message_id).await {
                Ok(ctx) => match self.delivery.send(&ctx, message_id).await {
                    Ok(_) => summary.dispatched += 1,
                    Err(e) => {
                        summary.errors += 1;
                        warn!(message_id = %message_id, error = %e, "scheduled retry failed");
                    }
                },
                Err(e @ (ConvoyError::NoTenant { .. } | ConvoyError::TenantInactive { .. })) => {
                    warn!(
                        message_id = %message_id,
                        error = %e,
                        delay_secs = self.postpone_delay.as_secs(),
                        "tenant unavailable, retry postponed"
                    );
                    self.delivery
                        .postpone(message_id, self.postpone_delay)
                        .await?;
                    summary.postponed += 1;
                }
                Err(e) => {
                    summary.errors += 1;
                    warn!(message_id = %message_id, error = %e, "cannot resolve retry tenant");
                }
            }
        }

        self.message_locks.prune();
        self.conversation_locks.prune();
        Ok(summary)
    }

    async fn context_for(&self, message_id: MessageId) -> Result<TenantContext, ConvoyError> {
        let message = self
            .store
            .message(message_id)
            .await?
            .ok_or_else(|| ConvoyError::not_found("message", message_id))?;
        let conversation = self
            .store
            .conversation(message.conversation_id)
            .await?
            .ok_or_else(|| ConvoyError::not_found("conversation", message.conversation_id))?;
        let team_id = conversation
            .team_id
            .ok_or(ConvoyError::NoTenant { team_id: None })?;
        self.tenants.context(team_id)
    }
}
