// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock provider client for deterministic testing.
//!
//! `MockProvider` implements `ProviderClient` with scripted outcomes,
//! enabling delivery tests without calling the real messaging API.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use convoy_core::model::Team;
use convoy_core::traits::{OutboundPayload, ProviderReceipt};
use convoy_core::{Destination, MessageContent, ProviderClient, ProviderError, TeamId};
use tokio::sync::Mutex;

/// A transmission the mock accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub team_id: TeamId,
    pub phone: String,
    pub content: MessageContent,
    pub context_message_id: Option<String>,
    pub provider_message_id: String,
}

/// A provider client that answers from a script.
///
/// Outcomes are popped from a FIFO queue; once it is empty every attempt
/// succeeds. Phones registered with [`MockProvider::fail_phone`] fail on
/// every attempt regardless of the queue.
pub struct MockProvider {
    script: Mutex<VecDeque<Result<(), ProviderError>>>,
    failing_phones: Mutex<HashMap<String, ProviderError>>,
    slow_phones: Mutex<HashMap<String, Duration>>,
    sent: Mutex<Vec<SentMessage>>,
    attempts: AtomicUsize,
    next_id: AtomicU64,
    latency: Option<Duration>,
}

impl MockProvider {
    /// Create a mock provider that accepts everything.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            failing_phones: Mutex::new(HashMap::new()),
            slow_phones: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            latency: None,
        }
    }

    /// Delay every attempt by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue the outcome of the next unscripted attempt.
    pub async fn push_outcome(&self, outcome: Result<(), ProviderError>) {
        self.script.lock().await.push_back(outcome);
    }

    /// Queue `n` identical failures.
    pub async fn fail_next(&self, n: usize, error: ProviderError) {
        let mut script = self.script.lock().await;
        for _ in 0..n {
            script.push_back(Err(error.clone()));
        }
    }

    /// Make every attempt to `phone` fail with `error`.
    pub async fn fail_phone(&self, phone: &str, error: ProviderError) {
        self.failing_phones
            .lock()
            .await
            .insert(phone.to_string(), error);
    }

    /// Delay attempts to `phone` by `delay`, on top of any global latency.
    pub async fn slow_phone(&self, phone: &str, delay: Duration) {
        self.slow_phones
            .lock()
            .await
            .insert(phone.to_string(), delay);
    }

    /// Stop failing attempts to `phone`.
    pub async fn heal_phone(&self, phone: &str) {
        self.failing_phones.lock().await.remove(phone);
    }

    /// Accepted transmissions, in order.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Accepted transmissions to one phone.
    pub async fn sent_to(&self, phone: &str) -> Vec<SentMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|s| s.phone == phone)
            .cloned()
            .collect()
    }

    /// Every attempt, accepted or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    async fn attempt_send(
        &self,
        destination: &Destination,
        payload: &OutboundPayload,
        team: &Team,
    ) -> Result<ProviderReceipt, ProviderError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let slow = self.slow_phones.lock().await.get(destination.phone()).copied();
        if let Some(delay) = slow {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failing_phones.lock().await.get(destination.phone()) {
            return Err(error.clone());
        }
        if let Some(Err(error)) = self.script.lock().await.pop_front() {
            return Err(error);
        }

        let provider_message_id = format!(
            "wamid.mock.{}",
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );
        self.sent.lock().await.push(SentMessage {
            team_id: team.id,
            phone: destination.phone().to_string(),
            content: payload.content.clone(),
            context_message_id: payload.context_message_id.clone(),
            provider_message_id: provider_message_id.clone(),
        });
        Ok(ProviderReceipt {
            provider_message_id,
        })
    }
}
