// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source of tenant definitions for the registry.

use async_trait::async_trait;

use crate::error::ConvoyError;
use crate::model::Team;

/// Loads the current set of teams and their credentials.
#[async_trait]
pub trait TenantSource: Send + Sync {
    async fn load_teams(&self) -> Result<Vec<Team>, ConvoyError>;
}
