// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus exporter for Convoy.
//!
//! The engine records through the metrics-rs facade. This crate installs the
//! Prometheus recorder, registers metric descriptions and renders the text
//! format served on `/metrics`.

pub mod recording;

use convoy_core::ConvoyError;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub use recording::register_metrics;

/// Owns the process-wide Prometheus recorder handle.
#[derive(Clone)]
pub struct PrometheusExporter {
    handle: PrometheusHandle,
}

impl PrometheusExporter {
    /// Installs the recorder globally. Only one recorder can exist per process.
    pub fn install() -> Result<Self, ConvoyError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| ConvoyError::Internal(format!("failed to install Prometheus recorder: {e}")))?;

        register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
