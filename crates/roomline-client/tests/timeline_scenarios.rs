//! End-to-end timeline scenarios against the in-memory client.
//!
//! Every push goes through `MemoryClient` → broadcast → listener task →
//! `RoomTimeline`, the same path a real protocol client drives. Tests that
//! need "nothing happened" use [`settle`]: a typing push is always answered,
//! and the listener handles pushes in order, so once its notification
//! arrives every earlier push has been applied.

use std::sync::Arc;
use std::time::Duration;

use futures::poll;
use roomline_client::{
    ClientError, Direction, EventContext, MemoryClient, RemotePage, RoomTimeline, SegmentId,
    TimelineConfig, TimelineNotification,
};
use roomline_types::{EventId, ReceiptContent, ReceiptType, RoomEvent, RoomId, UserId};
use tokio::sync::broadcast;

// ============================================================================
// Shared test setup
// ============================================================================

fn room() -> RoomId {
    RoomId::new("!room:test")
}

fn text(id: &str) -> RoomEvent {
    RoomEvent::text(id, room(), "@alice:test", id)
}

fn encrypted(id: &str) -> RoomEvent {
    RoomEvent::encrypted(id, room(), "@alice:test")
}

struct Harness {
    client: Arc<MemoryClient>,
    live: SegmentId,
    timeline: RoomTimeline,
    rx: broadcast::Receiver<TimelineNotification>,
}

/// A room whose live segment holds `live_events`, optionally with a backward
/// token. The timeline is created but not loaded.
fn harness_with(
    live_events: Vec<RoomEvent>,
    back_token: Option<&str>,
    encrypted: bool,
    config: TimelineConfig,
) -> Harness {
    let client = Arc::new(MemoryClient::new("@me:test"));
    let (segments, live) = client.add_room(room(), encrypted);
    {
        let mut arena = segments.write();
        let segment = arena.get_mut(live).unwrap();
        for event in live_events {
            segment.push_event(event);
        }
        segment.set_pagination_token(Direction::Backward, back_token.map(str::to_string));
    }
    let timeline = RoomTimeline::new(client.clone(), room(), config).unwrap();
    let rx = timeline.subscribe();
    Harness { client, live, timeline, rx }
}

fn harness(live_events: Vec<RoomEvent>, back_token: Option<&str>) -> Harness {
    harness_with(live_events, back_token, false, TimelineConfig::default())
}

/// Harness with the live timeline loaded and the `Ready` notification drained.
async fn loaded(live_events: Vec<RoomEvent>, back_token: Option<&str>) -> Harness {
    let mut h = harness(live_events, back_token);
    assert!(h.timeline.load_live_timeline().await);
    assert_eq!(next(&mut h.rx).await, TimelineNotification::Ready { event_id: None });
    h
}

async fn next(rx: &mut broadcast::Receiver<TimelineNotification>) -> TimelineNotification {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification channel closed")
}

/// Wait until every earlier push has been handled. Returns the notifications
/// emitted in the meantime.
async fn settle(
    client: &MemoryClient,
    rx: &mut broadcast::Receiver<TimelineNotification>,
) -> Vec<TimelineNotification> {
    client.set_typing(&room(), "@sync:test", false);
    let mut seen = Vec::new();
    loop {
        match next(rx).await {
            TimelineNotification::TypingMembersUpdated(_) => return seen,
            other => seen.push(other),
        }
    }
}

fn ids(events: &[RoomEvent]) -> Vec<String> {
    events.iter().map(|e| e.event_id.to_string()).collect()
}

fn merged_id(notification: &TimelineNotification) -> Option<&str> {
    match notification {
        TimelineNotification::Event(Some(event)) => Some(event.event_id.as_str()),
        _ => None,
    }
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_backward_pagination_two_segments() {
    let mut h = loaded(vec![text("$4"), text("$5"), text("$6")], Some("tokA")).await;
    h.client.add_remote_page(&room(), "tokA", RemotePage {
        events: vec![text("$1"), text("$2"), text("$3")],
        next_token: Some("tokB".into()),
        joins: None,
    });
    assert!(h.timeline.can_paginate_backward());

    assert!(h.timeline.paginate_timeline(Direction::Backward, Some(10)).await);

    assert_eq!(ids(&h.timeline.events()), vec!["$1", "$2", "$3", "$4", "$5", "$6"]);
    assert_eq!(
        next(&mut h.rx).await,
        TimelineNotification::Paginated {
            direction: Direction::Backward,
            loaded: 3,
            can_paginate_more: true,
        }
    );
    assert_eq!(h.client.pagination_requests(), vec![(h.live, Direction::Backward, 10)]);
    assert!(h.timeline.can_paginate_backward());
    assert!(h.timeline.is_serving_live_timeline());
    assert!(!h.timeline.is_paginating());
}

#[tokio::test]
async fn test_pagination_reaches_start_of_room() {
    let mut h = loaded(vec![text("$2")], Some("tokA")).await;
    h.client.add_remote_page(&room(), "tokA", RemotePage {
        events: vec![RoomEvent::new("$1", room(), "@alice:test", "m.room.create")],
        ..RemotePage::default()
    });

    assert!(h.timeline.paginate_timeline(Direction::Backward, None).await);
    assert_eq!(
        next(&mut h.rx).await,
        TimelineNotification::Paginated {
            direction: Direction::Backward,
            loaded: 1,
            can_paginate_more: false,
        }
    );
    assert!(!h.timeline.can_paginate_backward());
    // Default page size when no limit is given.
    assert_eq!(h.client.pagination_requests()[0].2, 30);

    // Nothing left: refused without a client call.
    assert!(!h.timeline.paginate_timeline(Direction::Backward, None).await);
    assert_eq!(h.client.pagination_requests().len(), 1);
}

#[tokio::test]
async fn test_concurrent_pagination_rejected() {
    let h = loaded(vec![text("$2")], Some("tokA")).await;
    h.client.add_remote_page(&room(), "tokA", RemotePage {
        events: vec![text("$1")],
        ..RemotePage::default()
    });
    let gate = h.client.pause_pagination();

    let first = h.timeline.paginate_timeline(Direction::Backward, None);
    tokio::pin!(first);
    assert!(poll!(first.as_mut()).is_pending());
    assert!(h.timeline.is_paginating());

    assert!(!h.timeline.paginate_timeline(Direction::Backward, None).await);
    assert_eq!(h.client.pagination_requests().len(), 1);
    assert_eq!(ids(&h.timeline.events()), vec!["$2"]);

    gate.notify_one();
    assert!(first.await);
    assert!(!h.timeline.is_paginating());
    assert_eq!(ids(&h.timeline.events()), vec!["$1", "$2"]);
}

#[tokio::test]
async fn test_cancelled_pagination_clears_flag() {
    let h = loaded(vec![text("$2")], Some("tokA")).await;
    h.client.add_remote_page(&room(), "tokA", RemotePage::default());
    let _gate = h.client.pause_pagination();

    {
        let pending = h.timeline.paginate_timeline(Direction::Backward, None);
        tokio::pin!(pending);
        assert!(poll!(pending.as_mut()).is_pending());
        assert!(h.timeline.is_paginating());
    }

    assert!(!h.timeline.is_paginating());
}

#[tokio::test]
async fn test_pagination_failure_is_recoverable() {
    let mut h = loaded(vec![text("$2")], Some("tokA")).await;
    h.client.add_remote_page(&room(), "tokA", RemotePage {
        events: vec![text("$1")],
        ..RemotePage::default()
    });
    h.client.fail_next_pagination(ClientError::Network("connection reset".into()));

    assert!(!h.timeline.paginate_timeline(Direction::Backward, None).await);
    assert_eq!(
        next(&mut h.rx).await,
        TimelineNotification::Paginated {
            direction: Direction::Backward,
            loaded: 0,
            can_paginate_more: true,
        }
    );
    assert!(!h.timeline.is_paginating());
    assert_eq!(ids(&h.timeline.events()), vec!["$2"]);

    // Token untouched: a retry goes through.
    assert!(h.timeline.paginate_timeline(Direction::Backward, None).await);
    assert_eq!(ids(&h.timeline.events()), vec!["$1", "$2"]);
}

#[tokio::test]
async fn test_pagination_decrypts_encrypted_history() {
    let mut h = harness_with(vec![text("$2")], Some("tokA"), true, TimelineConfig::default());
    h.client.add_remote_page(&room(), "tokA", RemotePage {
        events: vec![encrypted("$1")],
        ..RemotePage::default()
    });
    assert!(h.timeline.load_live_timeline().await);
    assert!(h.timeline.paginate_timeline(Direction::Backward, None).await);

    let first = h.timeline.find_event_by_id(&EventId::new("$1")).unwrap();
    assert!(first.is_decrypted());
    assert_eq!(h.client.decryption_requests(), vec!["$1"]);
    // Historical decryptions never merge twice.
    settle(&h.client, &mut h.rx).await;
    assert_eq!(ids(&h.timeline.events()), vec!["$1", "$2"]);
}

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn test_load_decrypts_before_merge() {
    let mut h = harness_with(
        vec![encrypted("$e1"), text("$p"), encrypted("$e2"), encrypted("$bad")],
        None,
        true,
        TimelineConfig::default(),
    );
    h.client.fail_decryption("$bad");

    assert!(h.timeline.load_live_timeline().await);

    // Newest first.
    assert_eq!(h.client.decryption_requests(), vec!["$bad", "$e2", "$e1"]);
    let events = h.timeline.events();
    assert_eq!(ids(&events), vec!["$e1", "$p", "$e2", "$bad"]);
    assert!(events[0].is_decrypted());
    assert!(events[2].is_decrypted());
    // Undecryptable placeholder stays in place.
    assert!(events[3].needs_decryption());
    assert_eq!(h.timeline.pending_decryptions(), 0);
    assert!(settle(&h.client, &mut h.rx).await.iter().all(|n| merged_id(n).is_none()));
}

#[tokio::test]
async fn test_load_event_timeline_and_return_to_live() {
    let mut h = loaded(vec![text("$new1")], None).await;
    h.client.add_event_context(&room(), "$old", EventContext {
        events: vec![text("$old")],
        back_token: None,
        forward_token: Some("f1".into()),
    });

    assert!(h.timeline.load_event_timeline(&EventId::new("$old")).await);
    assert_eq!(
        next(&mut h.rx).await,
        TimelineNotification::Ready { event_id: Some(EventId::new("$old")) }
    );
    assert!(!h.timeline.is_serving_live_timeline());
    assert!(h.timeline.can_paginate_forward());
    assert!(h.timeline.has_event_in_active_timeline(&EventId::new("$old")));
    assert!(!h.timeline.has_event_in_live_timeline(&EventId::new("$old")));

    // Viewing history: live pushes are not merged.
    h.client.push_live_event(text("$new2"));
    assert!(settle(&h.client, &mut h.rx).await.is_empty());
    assert_eq!(ids(&h.timeline.events()), vec!["$old"]);

    // Forward pagination joins the live segment.
    h.client.add_remote_page(&room(), "f1", RemotePage {
        events: vec![text("$mid")],
        next_token: None,
        joins: Some(h.live),
    });
    assert!(h.timeline.paginate_timeline(Direction::Forward, None).await);
    assert_eq!(
        next(&mut h.rx).await,
        TimelineNotification::Paginated {
            direction: Direction::Forward,
            loaded: 3,
            can_paginate_more: false,
        }
    );
    assert!(h.timeline.is_serving_live_timeline());
    assert_eq!(ids(&h.timeline.events()), vec!["$old", "$mid", "$new1", "$new2"]);

    h.client.push_live_event(text("$new3"));
    assert_eq!(merged_id(&next(&mut h.rx).await), Some("$new3"));
}

#[tokio::test]
async fn test_load_unknown_event_fails() {
    let mut h = loaded(vec![text("$1")], None).await;
    assert!(!h.timeline.load_event_timeline(&EventId::new("$missing")).await);
    assert!(h.timeline.is_serving_live_timeline());
    assert!(h.rx.try_recv().is_err());
}

// ============================================================================
// Live events
// ============================================================================

#[tokio::test]
async fn test_live_event_merged() {
    let mut h = loaded(vec![text("$1")], None).await;
    h.client.push_live_event(text("$2"));
    assert_eq!(merged_id(&next(&mut h.rx).await), Some("$2"));
    assert_eq!(ids(&h.timeline.events()), vec!["$1", "$2"]);
}

#[tokio::test]
async fn test_other_room_ignored() {
    let mut h = loaded(vec![], None).await;
    let elsewhere = RoomId::new("!elsewhere:test");
    h.client.add_room(elsewhere.clone(), false);
    h.client.push_live_event(RoomEvent::text("$x", elsewhere.clone(), "@bob:test", "hi"));
    h.client.set_typing(&elsewhere, "@bob:test", true);

    assert!(settle(&h.client, &mut h.rx).await.is_empty());
    assert!(h.timeline.events().is_empty());
    assert!(h.timeline.typing_members().is_empty());
}

#[tokio::test]
async fn test_encrypted_live_event_waits_for_decryption() {
    let mut h = harness_with(vec![], None, true, TimelineConfig::default());
    assert!(h.timeline.load_live_timeline().await);
    next(&mut h.rx).await;

    h.client.push_live_event(encrypted("$e1"));
    assert!(settle(&h.client, &mut h.rx).await.is_empty());
    assert_eq!(h.timeline.pending_decryptions(), 1);
    assert!(h.timeline.events().is_empty());

    h.client.complete_decryption(&room(), &EventId::new("$e1")).unwrap();
    let merged = next(&mut h.rx).await;
    assert_eq!(merged_id(&merged), Some("$e1"));
    assert_eq!(h.timeline.pending_decryptions(), 0);

    // A repeated decryption notice does not merge it again.
    h.client.complete_decryption(&room(), &EventId::new("$e1")).unwrap();
    settle(&h.client, &mut h.rx).await;
    let events = h.timeline.events();
    assert_eq!(ids(&events), vec!["$e1"]);
    assert!(events[0].is_decrypted());
}

#[tokio::test]
async fn test_plaintext_overtakes_decryption_by_default() {
    let mut h = harness_with(vec![], None, true, TimelineConfig::default());
    assert!(h.timeline.load_live_timeline().await);
    next(&mut h.rx).await;

    h.client.push_live_event(encrypted("$e1"));
    h.client.push_live_event(text("$p1"));
    assert_eq!(merged_id(&next(&mut h.rx).await), Some("$p1"));

    h.client.complete_decryption(&room(), &EventId::new("$e1")).unwrap();
    assert_eq!(merged_id(&next(&mut h.rx).await), Some("$e1"));
    assert_eq!(ids(&h.timeline.events()), vec!["$p1", "$e1"]);
}

#[tokio::test]
async fn test_reorder_mode_keeps_arrival_order() {
    let config = TimelineConfig::default().with_reorder_live_events(true);
    let mut h = harness_with(vec![], None, true, config);
    assert!(h.timeline.load_live_timeline().await);
    next(&mut h.rx).await;

    h.client.push_live_event(encrypted("$e1"));
    h.client.push_live_event(text("$p1"));
    assert!(settle(&h.client, &mut h.rx).await.is_empty());
    assert_eq!(h.timeline.pending_decryptions(), 1);

    h.client.complete_decryption(&room(), &EventId::new("$e1")).unwrap();
    assert_eq!(merged_id(&next(&mut h.rx).await), Some("$e1"));
    assert_eq!(merged_id(&next(&mut h.rx).await), Some("$p1"));
    assert_eq!(ids(&h.timeline.events()), vec!["$e1", "$p1"]);
}

#[tokio::test]
async fn test_live_events_ignored_during_pagination() {
    let mut h = loaded(vec![text("$2")], Some("tokA")).await;
    h.client.add_remote_page(&room(), "tokA", RemotePage {
        events: vec![text("$1")],
        ..RemotePage::default()
    });
    let gate = h.client.pause_pagination();

    let paginating = h.timeline.paginate_timeline(Direction::Backward, None);
    tokio::pin!(paginating);
    assert!(poll!(paginating.as_mut()).is_pending());

    h.client.push_live_event(text("$3"));
    assert!(settle(&h.client, &mut h.rx).await.is_empty());

    gate.notify_one();
    assert!(paginating.await);
    // The rebuild picks it up from the live segment instead.
    assert_eq!(ids(&h.timeline.events()), vec!["$1", "$2", "$3"]);
}

#[tokio::test]
async fn test_push_queued_across_reload_merges_once() {
    let mut h = loaded(vec![text("$1")], None).await;

    // The push is still queued for the listener when the rebuild runs.
    h.client.push_live_event(text("$x"));
    assert!(h.timeline.load_live_timeline().await);

    let seen = settle(&h.client, &mut h.rx).await;
    assert_eq!(seen, vec![TimelineNotification::Ready { event_id: None }]);
    assert_eq!(ids(&h.timeline.events()), vec!["$1", "$x"]);
}

#[tokio::test]
async fn test_push_queued_across_pagination_merges_once() {
    let mut h = loaded(vec![text("$2")], Some("tokA")).await;
    h.client.add_remote_page(&room(), "tokA", RemotePage {
        events: vec![text("$1")],
        ..RemotePage::default()
    });

    h.client.push_live_event(text("$x"));
    assert!(h.timeline.paginate_timeline(Direction::Backward, None).await);

    assert!(settle(&h.client, &mut h.rx).await.iter().all(|n| merged_id(n).is_none()));
    assert_eq!(ids(&h.timeline.events()), vec!["$1", "$2", "$x"]);
}

#[tokio::test]
async fn test_reorder_mode_skips_rebuilt_pushes() {
    let config = TimelineConfig::default().with_reorder_live_events(true);
    let mut h = harness_with(vec![text("$1")], None, false, config);
    assert!(h.timeline.load_live_timeline().await);
    next(&mut h.rx).await;

    h.client.push_live_event(encrypted("$e"));
    h.client.push_live_event(text("$p"));
    assert!(h.timeline.load_live_timeline().await);

    assert!(settle(&h.client, &mut h.rx).await.iter().all(|n| merged_id(n).is_none()));
    // Nothing reserved for an event the rebuild already placed.
    assert_eq!(h.timeline.pending_decryptions(), 0);
    assert_eq!(ids(&h.timeline.events()), vec!["$1", "$e", "$p"]);
}

// ============================================================================
// Redaction
// ============================================================================

#[tokio::test]
async fn test_redaction_removes_event_and_relations() {
    let mut h = loaded(
        vec![
            text("$1"),
            RoomEvent::edit("$ed", room(), "@alice:test", "$1", "fixed"),
            RoomEvent::reaction("$re", room(), "@bob:test", "$1", "👍"),
            text("$2"),
        ],
        None,
    )
    .await;
    let target = EventId::new("$1");
    assert_eq!(h.timeline.edits_for(&target).len(), 1);
    assert_eq!(h.timeline.reactions_for(&target).len(), 1);

    h.client.redact(&room(), &target);
    assert_eq!(next(&mut h.rx).await, TimelineNotification::Event(None));

    assert_eq!(ids(&h.timeline.events()), vec!["$2"]);
    assert!(h.timeline.edits_for(&target).is_empty());
    assert!(h.timeline.reactions_for(&target).is_empty());

    // Idempotent: a second redaction notice changes nothing.
    h.client.redact(&room(), &target);
    assert_eq!(next(&mut h.rx).await, TimelineNotification::Event(None));
    assert_eq!(ids(&h.timeline.events()), vec!["$2"]);
}

#[tokio::test]
async fn test_redaction_applies_during_pagination() {
    let mut h = loaded(vec![text("$2"), text("$3")], Some("tokA")).await;
    h.client.add_remote_page(&room(), "tokA", RemotePage {
        events: vec![text("$1")],
        ..RemotePage::default()
    });
    let gate = h.client.pause_pagination();

    let paginating = h.timeline.paginate_timeline(Direction::Backward, None);
    tokio::pin!(paginating);
    assert!(poll!(paginating.as_mut()).is_pending());

    h.client.redact(&room(), &EventId::new("$3"));
    assert_eq!(settle(&h.client, &mut h.rx).await, vec![TimelineNotification::Event(None)]);
    assert_eq!(ids(&h.timeline.events()), vec!["$2"]);

    gate.notify_one();
    assert!(paginating.await);
    assert_eq!(ids(&h.timeline.events()), vec!["$1", "$2"]);
}

#[tokio::test]
async fn test_first_reaction_to_event() {
    let mut h = loaded(vec![text("$E100")], None).await;
    h.client.push_live_event(RoomEvent::reaction("$r1", room(), "@bob:test", "$E100", "🎉"));
    assert_eq!(merged_id(&next(&mut h.rx).await), Some("$r1"));

    let reactions = h.timeline.reactions_for(&EventId::new("$E100"));
    assert_eq!(ids(&reactions), vec!["$r1"]);
    assert_eq!(ids(&h.timeline.events()), vec!["$E100"]);
}

// ============================================================================
// Typing and receipts
// ============================================================================

#[tokio::test]
async fn test_typing_members_snapshot() {
    let mut h = loaded(vec![], None).await;
    h.client.set_typing(&room(), "@a:test", true);
    h.client.set_typing(&room(), "@b:test", true);
    h.client.set_typing(&room(), "@a:test", false);

    let mut last = None;
    for _ in 0..3 {
        last = Some(next(&mut h.rx).await);
    }
    let Some(TimelineNotification::TypingMembersUpdated(members)) = last.clone() else {
        panic!("expected typing update, got {last:?}");
    };
    let members: Vec<_> = members.iter().map(UserId::as_str).collect();
    assert_eq!(members, vec!["@b:test"]);
    assert!(h.timeline.typing_members().contains("@b:test"));
}

#[tokio::test]
async fn test_live_receipt_only_for_last_live_event() {
    let mut h = loaded(vec![text("$1"), text("$2")], None).await;

    h.client.receive_receipts(
        &room(),
        ReceiptContent::new().with_receipt("$1", ReceiptType::Read, "@bob:test", Some(1)),
    );
    h.client.receive_receipts(
        &room(),
        ReceiptContent::new().with_receipt("$2", ReceiptType::ReadPrivate, "@bob:test", Some(2)),
    );
    assert!(settle(&h.client, &mut h.rx).await.is_empty());

    h.client.receive_receipts(
        &room(),
        ReceiptContent::new().with_receipt("$2", ReceiptType::Read, "@carol:test", Some(3)),
    );
    assert_eq!(next(&mut h.rx).await, TimelineNotification::LiveReceipt);
    let readers: Vec<_> = h.timeline.live_readers().into_iter().map(UserId::into_string).collect();
    assert_eq!(readers, vec!["@carol:test"]);
}

#[tokio::test]
async fn test_event_readers() {
    let h = loaded(vec![text("$1"), text("$2"), text("$3")], None).await;
    h.client.set_read_up_to(&room(), "@a:test", "$1");
    h.client.set_read_up_to(&room(), "@b:test", "$3");
    h.client.set_read_up_to(&room(), "@c:test", "$2");

    let names = |set: indexmap::IndexSet<UserId>| -> Vec<String> {
        set.into_iter().map(UserId::into_string).collect()
    };
    assert_eq!(names(h.timeline.event_readers(&EventId::new("$2"))), vec!["@c:test", "@b:test"]);
    assert_eq!(
        names(h.timeline.event_readers(&EventId::new("$1"))),
        vec!["@a:test", "@c:test", "@b:test"]
    );
    assert_eq!(names(h.timeline.event_readers(&EventId::new("$nope"))), vec!["@b:test"]);
}

#[tokio::test]
async fn test_mark_as_read() {
    let h = loaded(vec![text("$1"), text("$2")], None).await;
    assert_eq!(h.timeline.read_up_to_event_id(), None);

    assert!(h.timeline.mark_as_read().await.unwrap());
    assert_eq!(h.client.sent_receipts(), vec![(room(), EventId::new("$2"))]);
    assert_eq!(h.timeline.read_up_to_event_id(), Some(EventId::new("$2")));

    // Already there.
    assert!(!h.timeline.mark_as_read().await.unwrap());
    assert_eq!(h.client.sent_receipts().len(), 1);
}

#[tokio::test]
async fn test_mark_as_read_empty_timeline() {
    let h = loaded(vec![], None).await;
    assert!(!h.timeline.mark_as_read().await.unwrap());
    assert!(h.client.sent_receipts().is_empty());
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_teardown_stops_listening() {
    let mut h = loaded(vec![text("$1")], None).await;
    assert!(h.timeline.teardown());
    assert!(!h.timeline.teardown());

    h.client.push_live_event(text("$2"));
    h.client.set_typing(&room(), "@a:test", true);
    let quiet = tokio::time::timeout(Duration::from_millis(100), h.rx.recv()).await;
    assert!(quiet.is_err(), "got {quiet:?} after teardown");
    assert_eq!(ids(&h.timeline.events()), vec!["$1"]);
}
