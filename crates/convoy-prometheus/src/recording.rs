// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric names and descriptions.

use metrics::{describe_counter, Unit};

pub const MESSAGES_SENT: &str = "convoy_messages_sent_total";
pub const SEND_FAILURES: &str = "convoy_send_failures_total";
pub const RETRIES_SCHEDULED: &str = "convoy_retries_scheduled_total";
pub const DELIVERY_EXHAUSTED: &str = "convoy_delivery_exhausted_total";
pub const WINDOW_REJECTIONS: &str = "convoy_window_rejections_total";
pub const INBOUND_MESSAGES: &str = "convoy_inbound_messages_total";

/// Register all Convoy metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        MESSAGES_SENT,
        Unit::Count,
        "Recipient sends accepted by the provider, by team"
    );
    describe_counter!(
        SEND_FAILURES,
        Unit::Count,
        "Failed send attempts, by team and failure class"
    );
    describe_counter!(
        RETRIES_SCHEDULED,
        Unit::Count,
        "Failed recipients scheduled for another attempt"
    );
    describe_counter!(
        DELIVERY_EXHAUSTED,
        Unit::Count,
        "Recipients that ran out of attempts or failed permanently"
    );
    describe_counter!(
        WINDOW_REJECTIONS,
        Unit::Count,
        "Outbound sends refused because the session window was closed"
    );
    describe_counter!(
        INBOUND_MESSAGES,
        Unit::Count,
        "Inbound messages recorded, by team"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn described_counters_render_with_help_text() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            metrics::counter!(MESSAGES_SENT, "team" => "1").increment(2);
            metrics::counter!(SEND_FAILURES, "team" => "1", "class" => "transient").increment(1);
        });

        let text = handle.render();
        assert!(text.contains("# HELP convoy_messages_sent_total"));
        assert!(text.contains("convoy_messages_sent_total{team=\"1\"} 2"));
        assert!(text.contains("class=\"transient\""));
    }
}
