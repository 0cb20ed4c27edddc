// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `convoy serve` command implementation.
//!
//! Wires the in-memory store, the WhatsApp provider client and the tenant
//! registry into the engine, then runs the retry scheduler, the webhook
//! consumer and the HTTP listener until a shutdown signal arrives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use convoy_config::model::ConvoyConfig;
use convoy_core::inbound::WebhookEvent;
use convoy_core::{ConvoyError, EngineEvent, SystemClock};
use convoy_engine::{
    BroadcastSink, ConfigTenantSource, ConversationOrchestrator, Engine, EngineDeps,
    TenantRegistry,
};
use convoy_prometheus::PrometheusExporter;
use convoy_storage::MemoryStore;
use convoy_whatsapp::{GraphErrorClassifier, WebhookState, WhatsAppClient};
use secrecy::SecretString;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::http::{self, HealthState};
use crate::shutdown;

/// Webhook events buffered between the HTTP handler and the engine.
const WEBHOOK_QUEUE: usize = 1024;

/// Runs the `convoy serve` command.
pub async fn run_serve(config: ConvoyConfig) -> Result<(), ConvoyError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, "starting convoy serve");

    let exporter = match PrometheusExporter::install() {
        Ok(exporter) => Some(exporter),
        Err(e) => {
            warn!(error = %e, "metrics exporter unavailable");
            None
        }
    };

    let clock = Arc::new(SystemClock);
    let tenants = Arc::new(TenantRegistry::new(clock.clone()));
    let source = ConfigTenantSource::new(
        config.teams.clone(),
        config.whatsapp.default_api_version.clone(),
    );
    let loaded = tenants.refresh(&source).await?;
    info!(teams = loaded, "tenant registry loaded");

    let provider = WhatsAppClient::from_config(
        &config.whatsapp,
        Duration::from_secs(config.delivery.send_timeout_secs),
    )?;
    let sink = Arc::new(BroadcastSink::default());
    let events = sink.subscribe();

    let deps = EngineDeps {
        store: Arc::new(MemoryStore::new()),
        provider: Arc::new(provider),
        classifier: Arc::new(GraphErrorClassifier),
        tenants,
        sink,
        clock,
    };
    let engine = Engine::new(deps, &config);

    let cancel = shutdown::install_signal_handler();

    tokio::spawn(log_engine_events(events, cancel.clone()));

    let scheduler_task = if config.scheduler.enabled {
        let scheduler = Arc::clone(&engine.scheduler);
        let scheduler_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            scheduler.run(scheduler_cancel).await;
        }))
    } else {
        info!("retry scheduler disabled");
        None
    };

    let (webhook_tx, webhook_rx) = mpsc::channel(WEBHOOK_QUEUE);
    let consumer_task = tokio::spawn(consume_webhooks(
        webhook_rx,
        Arc::clone(&engine.orchestrator),
    ));

    let webhook_state = WebhookState::new(
        config.whatsapp.app_secret.clone().map(SecretString::from),
        config.whatsapp.verify_token.clone().map(SecretString::from),
        webhook_tx,
    );
    if config.whatsapp.app_secret.is_none() {
        warn!("no app secret configured, webhook signatures are not verified");
    }
    let health = HealthState {
        start_time: Instant::now(),
        prometheus_render: exporter.map(|exporter| {
            Arc::new(move || exporter.render()) as Arc<dyn Fn() -> String + Send + Sync>
        }),
    };
    let app = http::app(webhook_state, health);

    let addr = format!("{}:{}", config.whatsapp.bind_address, config.whatsapp.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ConvoyError::Config(format!("failed to bind webhook listener to {addr}: {e}")))?;
    info!("webhook listener on {addr}");

    let server_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await
        .map_err(|e| ConvoyError::Internal(format!("webhook server error: {e}")))?;

    // The router owned the only sender; the consumer drains what is queued.
    cancel.cancel();
    if let Err(e) = consumer_task.await {
        error!(error = %e, "webhook consumer panicked");
    }
    if let Some(task) = scheduler_task {
        if let Err(e) = task.await {
            error!(error = %e, "retry scheduler panicked");
        }
    }

    info!("convoy stopped");
    Ok(())
}

/// Feeds decoded webhook events to the engine, one task per event.
async fn consume_webhooks(
    mut rx: mpsc::Receiver<WebhookEvent>,
    orchestrator: Arc<ConversationOrchestrator>,
) {
    let mut in_flight = tokio::task::JoinSet::new();
    while let Some(event) = rx.recv().await {
        let orchestrator = Arc::clone(&orchestrator);
        in_flight.spawn(async move {
            if let Err(e) = orchestrator.handle_webhook(event).await {
                if e.is_integrity_failure() {
                    error!(error = %e, "webhook event rejected");
                } else {
                    warn!(error = %e, "webhook event rejected");
                }
            }
        });
        // Reap finished handlers so the set stays small.
        while in_flight.try_join_next().is_some() {}
    }
    while in_flight.join_next().await.is_some() {}
    debug!("webhook consumer stopped");
}

/// Routes engine events to the log; exhausted deliveries surface at error level.
async fn log_engine_events(mut rx: broadcast::Receiver<EngineEvent>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(EngineEvent::DeliveryExhausted { conversation_id, message_id, reason }) => {
                    error!(
                        conversation_id = %conversation_id,
                        message_id = %message_id,
                        reason = %reason,
                        "delivery exhausted"
                    );
                }
                Ok(event) => debug!(?event, "engine event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "engine event log lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = cancel.cancelled() => break,
        }
    }
}

/// Initializes the tracing subscriber; `RUST_LOG` overrides `log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("convoy={log_level},tower_http={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
