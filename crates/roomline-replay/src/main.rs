//! roomline scenario replay.
//!
//! Seeds an in-memory protocol client from a RON scenario, drives a
//! `RoomTimeline` through the scripted steps and prints every notification
//! the timeline emits.
//!
//! Usage:
//!   roomline-replay scenarios/encrypted_room.ron
//!   roomline-replay scenarios/encrypted_room.ron --config roomline.ron --page-size 5
//!   RUST_LOG=roomline_client=debug roomline-replay scenarios/encrypted_room.ron

mod scenario;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use roomline_client::{MemoryClient, RoomTimeline, TimelineConfig, TimelineNotification};
use roomline_types::{ReceiptContent, ReceiptType, RoomEvent};
use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, fmt};

use crate::scenario::{Scenario, Step};

/// Replay a scripted room scenario through the timeline engine.
#[derive(Parser, Debug)]
#[command(name = "roomline-replay")]
#[command(about = "Replay a RON room scenario and print timeline notifications")]
struct Args {
    /// Scenario file (RON)
    scenario: PathBuf,

    /// Timeline config file (RON); overrides the scenario's own config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hold plaintext live events behind pending decryptions
    #[arg(long)]
    reorder: bool,

    /// Events per pagination call
    #[arg(long)]
    page_size: Option<usize>,

    /// Signed-in user
    #[arg(long, default_value = "@me:example.org")]
    user: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Notifications go to stdout, logs to stderr
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let source = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading {}", args.scenario.display()))?;
    let scenario = Scenario::from_ron(&source)
        .with_context(|| format!("parsing {}", args.scenario.display()))?;
    let config = resolve_config(&args, &scenario)?;

    tracing::info!(
        room = %scenario.room,
        steps = scenario.steps.len(),
        reorder = config.reorder_live_events,
        "replaying scenario"
    );

    let client = Arc::new(MemoryClient::new(args.user.as_str()));
    scenario.seed(&client);
    let timeline = RoomTimeline::new(client.clone(), scenario.room.clone(), config)?;
    let mut rx = timeline.subscribe();

    for (index, step) in scenario.steps.iter().enumerate() {
        println!("[{index:>2}] {}", describe_step(step));
        run_step(&scenario, &client, &timeline, step).await?;
        settle().await;
        drain(&mut rx);
    }

    println!("--- final timeline ---");
    dump(&timeline);
    timeline.teardown();
    Ok(())
}

fn resolve_config(args: &Args, scenario: &Scenario) -> Result<TimelineConfig> {
    let mut config = match &args.config {
        Some(path) => TimelineConfig::load(path)?,
        None => scenario.timeline_config(),
    };
    if args.reorder {
        config = config.with_reorder_live_events(true);
    }
    if let Some(page_size) = args.page_size {
        config = config.with_page_size(page_size);
    }
    config.validate()?;
    Ok(config)
}

async fn run_step(
    scenario: &Scenario,
    client: &MemoryClient,
    timeline: &RoomTimeline,
    step: &Step,
) -> Result<()> {
    let room = &scenario.room;
    match step {
        Step::LoadLive => {
            timeline.load_live_timeline().await;
        }
        Step::LoadEvent(event_id) => {
            if !timeline.load_event_timeline(event_id).await {
                println!("     event {event_id} not found");
            }
        }
        Step::Paginate { direction, limit } => {
            let ok = timeline.paginate_timeline(*direction, *limit).await;
            println!("     paginate {direction}: {}", if ok { "ok" } else { "refused or failed" });
        }
        Step::PushLive(spec) => {
            if !client.push_live_event(spec.to_event(room)) {
                bail!("room {room} missing from client");
            }
        }
        Step::Decrypt(event_id) => {
            if let Err(e) = client.complete_decryption(room, event_id) {
                println!("     decrypt {event_id}: {e}");
            }
        }
        Step::Redact(event_id) => {
            client.redact(room, event_id);
        }
        Step::Typing { user, typing } => client.set_typing(room, user.clone(), *typing),
        Step::Receipt { user, event } => {
            let content = ReceiptContent::new().with_receipt(event.clone(), ReceiptType::Read, user.clone(), None);
            client.receive_receipts(room, content);
        }
        Step::MarkAsRead => {
            let sent = timeline.mark_as_read().await?;
            println!("     read receipt {}", if sent { "sent" } else { "not needed" });
        }
        Step::Readers(event_id) => {
            let readers: Vec<_> = timeline.event_readers(event_id).into_iter().map(|u| u.to_string()).collect();
            println!("     readers of {event_id}: [{}]", readers.join(", "));
        }
        Step::Dump => dump(timeline),
    }
    Ok(())
}

/// Let the listener task catch up with pushes. The runtime is single
/// threaded, so one yield runs it to completion.
async fn settle() {
    tokio::task::yield_now().await;
}

fn drain(rx: &mut broadcast::Receiver<TimelineNotification>) {
    loop {
        match rx.try_recv() {
            Ok(notification) => println!("     -> {}", describe_notification(&notification)),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                println!("     -> ({skipped} notifications dropped)");
            }
            Err(_) => break,
        }
    }
}

fn describe_step(step: &Step) -> String {
    match step {
        Step::PushLive(spec) => format!("push {} from {}", spec.id, spec.sender),
        other => format!("{other:?}"),
    }
}

fn describe_notification(notification: &TimelineNotification) -> String {
    match notification {
        TimelineNotification::Ready { event_id: Some(id) } => format!("ready at {id}"),
        TimelineNotification::Ready { event_id: None } => "ready (live)".to_string(),
        TimelineNotification::Paginated { direction, loaded, can_paginate_more } => {
            format!("paginated {direction}: loaded {loaded}, more: {can_paginate_more}")
        }
        TimelineNotification::Event(Some(event)) => format!("event {}", summarize(event)),
        TimelineNotification::Event(None) => "event removed".to_string(),
        TimelineNotification::TypingMembersUpdated(members) => {
            let names: Vec<_> = members.iter().map(|u| u.as_str()).collect();
            format!("typing [{}]", names.join(", "))
        }
        TimelineNotification::LiveReceipt => "live receipt".to_string(),
    }
}

fn summarize(event: &RoomEvent) -> String {
    let body = event
        .content()
        .get("body")
        .and_then(|b| b.as_str())
        .map(|b| format!(" {b:?}"))
        .unwrap_or_default();
    format!("{} {} <{}>{body}", event.event_id, event.event_type(), event.sender)
}

fn dump(timeline: &RoomTimeline) {
    let live = if timeline.is_serving_live_timeline() { "live" } else { "history" };
    println!(
        "     {live}, back: {}, forward: {}",
        timeline.can_paginate_backward(),
        timeline.can_paginate_forward()
    );
    for (index, event) in timeline.events().iter().enumerate() {
        let edits = timeline.edits_for(&event.event_id).len();
        let reactions = timeline.reactions_for(&event.event_id);
        let keys: Vec<_> = reactions
            .iter()
            .filter_map(|r| r.relation().and_then(|rel| rel.key.clone()))
            .collect();
        let mut line = format!("     {index:>3} {}", summarize(event));
        if edits > 0 {
            line.push_str(&format!(" (edited x{edits})"));
        }
        if !keys.is_empty() {
            line.push_str(&format!(" [{}]", keys.join(" ")));
        }
        println!("{line}");
    }
}
