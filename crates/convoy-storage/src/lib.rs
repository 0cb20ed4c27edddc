// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence layer for the Convoy messaging bridge.
//!
//! [`MemoryStore`] implements the `MessageStore` collaborator contract with
//! read-your-writes consistency per entity. Tables live behind a single
//! `tokio::sync::RwLock`; ids are assigned from per-table sequences starting
//! at 1, so ascending id order equals insertion order.

pub mod memory;

pub use memory::MemoryStore;
