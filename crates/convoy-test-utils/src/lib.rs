// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Convoy integration tests.
//!
//! Provides deterministic collaborators so engine tests run without a
//! provider account or wall-clock waits.
//!
//! # Components
//!
//! - [`MockProvider`] - Scripted provider client that captures every send
//! - [`ManualClock`] - Clock that only moves when told to
//! - [`RecordingSink`] - Event sink that keeps every published event
//! - [`Fixture`] - Seeds a [`MemoryStore`](convoy_storage::MemoryStore) with teams, drivers and groups

pub mod clock;
pub mod fixture;
pub mod mock_provider;
pub mod sink;

pub use clock::ManualClock;
pub use fixture::{team, Fixture};
pub use mock_provider::{MockProvider, SentMessage};
pub use sink::RecordingSink;
