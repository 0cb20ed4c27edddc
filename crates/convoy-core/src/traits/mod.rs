// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator contracts consumed by the engine.
//!
//! Every trait uses `#[async_trait]` where it suspends, so implementations can
//! be held as `Arc<dyn Trait>` and swapped in tests.

pub mod clock;
pub mod notify;
pub mod provider;
pub mod store;
pub mod tenant;

pub use clock::{Clock, SystemClock};
pub use notify::{EngineEvent, EventSink, NullSink};
pub use provider::{
    ErrorClassifier, FailureClass, HttpStatusClassifier, OutboundPayload, ProviderClient,
    ProviderError, ProviderReceipt,
};
pub use store::MessageStore;
pub use tenant::TenantSource;
