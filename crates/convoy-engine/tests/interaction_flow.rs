// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reactions, pin/star, soft-delete, reply and forward.

mod common;

use chrono::TimeDelta;
use convoy_core::model::Message;
use convoy_core::{ConvoyError, EngineEvent, MessageContent, MessageStore, Reactor, UserId};
use convoy_engine::OutboundRequest;

use common::{text, Harness, TEAM_A, TEAM_B};

const STAFF: UserId = UserId(7);

async fn sent_message(h: &Harness, phone: &str) -> Message {
    let (_, conv) = h.fixture.individual(TEAM_A, "Ann", phone).await.unwrap();
    h.fixture.inbound_at(conv.id, h.now()).await.unwrap();
    h.engine
        .orchestrator
        .send(&h.ctx(TEAM_A), OutboundRequest::new(conv.id, STAFF, text("load at dock 4")))
        .await
        .unwrap()
        .message
}

#[tokio::test]
async fn reaction_is_one_per_reactor() {
    let h = Harness::new();
    let message = sent_message(&h, "447700900001").await;
    let ctx = h.ctx(TEAM_A);
    let reactor = Reactor::Staff(STAFF);

    h.engine.orchestrator.react(&ctx, message.id, reactor, "👍").await.unwrap();
    h.engine.orchestrator.react(&ctx, message.id, reactor, "👍").await.unwrap();
    assert_eq!(
        h.sink.count(|e| matches!(e, EngineEvent::ReactionChanged { .. })),
        1
    );

    h.engine.orchestrator.react(&ctx, message.id, reactor, "🎉").await.unwrap();
    let reactions = h.engine.interaction.reactions(message.id).await.unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0].emoji, "🎉");

    h.engine
        .orchestrator
        .react(&ctx, message.id, Reactor::Staff(UserId(8)), "👍")
        .await
        .unwrap();
    assert_eq!(h.engine.interaction.reactions(message.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn pin_and_star_toggle_timestamps() {
    let h = Harness::new();
    let message = sent_message(&h, "447700900001").await;
    let ctx = h.ctx(TEAM_A);

    let pinned = h.engine.orchestrator.pin(&ctx, message.id, true).await.unwrap();
    assert!(pinned.pinned);
    let pinned_at = pinned.pinned_at;
    assert_eq!(pinned_at, Some(h.now()));

    // Pinning again keeps the original timestamp.
    h.advance(TimeDelta::minutes(5));
    let again = h.engine.orchestrator.pin(&ctx, message.id, true).await.unwrap();
    assert_eq!(again.pinned_at, pinned_at);

    let unpinned = h.engine.orchestrator.pin(&ctx, message.id, false).await.unwrap();
    assert!(!unpinned.pinned);
    assert_eq!(unpinned.pinned_at, None);

    let starred = h.engine.orchestrator.star(&ctx, message.id, true).await.unwrap();
    assert_eq!(starred.starred_at, Some(h.now()));
}

#[tokio::test]
async fn deleted_message_refuses_mutations_but_stays_readable() {
    let h = Harness::new();
    let message = sent_message(&h, "447700900001").await;
    let ctx = h.ctx(TEAM_A);

    let deleted = h
        .engine
        .orchestrator
        .soft_delete(&ctx, message.id, STAFF)
        .await
        .unwrap();
    assert!(deleted.deleted);
    assert_eq!(deleted.deleted_by, Some(STAFF));

    // Idempotent.
    h.advance(TimeDelta::minutes(1));
    let again = h
        .engine
        .orchestrator
        .soft_delete(&ctx, message.id, UserId(8))
        .await
        .unwrap();
    assert_eq!(again.deleted_at, deleted.deleted_at);
    assert_eq!(again.deleted_by, Some(STAFF));

    let err = h.engine.orchestrator.pin(&ctx, message.id, true).await.unwrap_err();
    assert!(matches!(err, ConvoyError::MessageDeleted { .. }));
    let err = h
        .engine
        .orchestrator
        .react(&ctx, message.id, Reactor::Staff(STAFF), "👍")
        .await
        .unwrap_err();
    assert!(matches!(err, ConvoyError::MessageDeleted { .. }));
    let err = h
        .engine
        .orchestrator
        .forward(&ctx, STAFF, message.id, &[message.conversation_id], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConvoyError::MessageDeleted { .. }));

    let read = h.engine.orchestrator.message(&ctx, message.id).await.unwrap();
    assert_eq!(read.content, message.content);
}

#[tokio::test]
async fn reply_must_stay_in_conversation() {
    let h = Harness::new();
    let first = sent_message(&h, "447700900001").await;
    let other = sent_message(&h, "447700900002").await;
    let ctx = h.ctx(TEAM_A);

    let outcome = h
        .engine
        .orchestrator
        .send(
            &ctx,
            OutboundRequest::new(first.conversation_id, STAFF, text("as above")).replying_to(first.id),
        )
        .await
        .unwrap();
    let reply = outcome.message.reply_to.unwrap();
    assert_eq!(reply.message_id, first.id);
    assert_eq!(reply.preview, "load at dock 4");
    // Quoted replies carry the provider id of the original.
    let sent = h.provider.sent().await;
    assert_eq!(
        sent.last().unwrap().context_message_id,
        first.provider_message_id
    );

    let err = h
        .engine
        .orchestrator
        .send(
            &ctx,
            OutboundRequest::new(first.conversation_id, STAFF, text("wrong thread")).replying_to(other.id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConvoyError::ReplyOutsideConversation { .. }));
}

#[tokio::test]
async fn reply_snapshot_survives_edits_to_original() {
    let h = Harness::new();
    let first = sent_message(&h, "447700900001").await;
    let ctx = h.ctx(TEAM_A);

    let outcome = h
        .engine
        .orchestrator
        .send(
            &ctx,
            OutboundRequest::new(first.conversation_id, STAFF, text("reminder")).replying_to(first.id),
        )
        .await
        .unwrap();
    h.engine
        .orchestrator
        .soft_delete(&ctx, first.id, STAFF)
        .await
        .unwrap();

    let reply = h
        .engine
        .orchestrator
        .message(&ctx, outcome.message.id)
        .await
        .unwrap()
        .reply_to
        .unwrap();
    assert_eq!(reply.preview, "load at dock 4");
}

#[tokio::test]
async fn forward_checks_each_target_window() {
    let h = Harness::new();
    let source = sent_message(&h, "447700900001").await;
    let ctx = h.ctx(TEAM_A);

    let (_, open) = h.fixture.individual(TEAM_A, "Bo", "447700900002").await.unwrap();
    h.fixture.inbound_at(open.id, h.now()).await.unwrap();
    let (_, closed) = h.fixture.individual(TEAM_A, "Cy", "447700900003").await.unwrap();
    h.fixture
        .inbound_ago(closed.id, h.now(), TimeDelta::hours(30))
        .await
        .unwrap();

    let results = h
        .engine
        .orchestrator
        .forward(&ctx, STAFF, source.id, &[open.id, closed.id], None)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let copy = results[0].result.as_ref().unwrap();
    assert_eq!(copy.message.forwarded_from, Some(source.id));
    assert_eq!(copy.message.content, source.content);
    assert!(matches!(
        results[1].result,
        Err(ConvoyError::WindowClosed { .. })
    ));

    let source = h.fixture.store.message(source.id).await.unwrap().unwrap();
    assert_eq!(source.forward_count, 1);
    assert!(h.fixture.store.messages_in(closed.id).await.is_empty());
}

#[tokio::test]
async fn forward_override_replaces_content() {
    let h = Harness::new();
    let source = sent_message(&h, "447700900001").await;
    let ctx = h.ctx(TEAM_A);
    let (_, target) = h.fixture.individual(TEAM_A, "Bo", "447700900002").await.unwrap();
    h.fixture.inbound_at(target.id, h.now()).await.unwrap();

    let results = h
        .engine
        .orchestrator
        .forward(&ctx, STAFF, source.id, &[target.id], Some("see below".to_string()))
        .await
        .unwrap();

    let copy = results[0].result.as_ref().unwrap();
    assert_eq!(copy.message.content, MessageContent::text("see below"));
}

#[tokio::test]
async fn forward_into_foreign_team_is_rejected_per_target() {
    let h = Harness::new();
    let source = sent_message(&h, "447700900001").await;
    let ctx = h.ctx(TEAM_A);
    let (_, foreign) = h.fixture.individual(TEAM_B, "Di", "447700900004").await.unwrap();
    h.fixture.inbound_at(foreign.id, h.now()).await.unwrap();

    let results = h
        .engine
        .orchestrator
        .forward(&ctx, STAFF, source.id, &[foreign.id], None)
        .await
        .unwrap();
    assert!(matches!(
        results[0].result,
        Err(ConvoyError::TenantMismatch { .. })
    ));
    let source = h.fixture.store.message(source.id).await.unwrap().unwrap();
    assert_eq!(source.forward_count, 0);
}

#[tokio::test]
async fn archive_assign_round_trip() {
    let h = Harness::new();
    let (_, conv) = h.fixture.individual(TEAM_A, "Ann", "447700900001").await.unwrap();
    let ctx = h.ctx(TEAM_A);

    let archived = h.engine.orchestrator.archive(&ctx, conv.id, STAFF).await.unwrap();
    assert!(archived.archived);
    assert_eq!(archived.archived_by, Some(STAFF));

    let restored = h.engine.orchestrator.unarchive(&ctx, conv.id).await.unwrap();
    assert!(!restored.archived);
    assert_eq!(restored.archived_by, None);

    let assigned = h
        .engine
        .orchestrator
        .assign(&ctx, conv.id, Some(UserId(9)))
        .await
        .unwrap();
    assert_eq!(assigned.assigned_to, Some(UserId(9)));
    let cleared = h.engine.orchestrator.assign(&ctx, conv.id, None).await.unwrap();
    assert_eq!(cleared.assigned_to, None);
}
