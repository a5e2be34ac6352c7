mod common;

use common::*;
use deskbridge_core::api::InboundStatus;
use deskbridge_core::model::{InboundMessage, OutputSnapshot, Point};
use deskbridge_core::payload::DEFAULT_SIGNATURE;
use deskbridge_core::BridgeError;
use deskbridge_daemon::commands::{Command, TEST_PAYLOAD};
use deskbridge_daemon::inbound::{REPLY_ACK, REPLY_DENIED, REPLY_FAILED, REPLY_SENT, REPLY_TOO_SHORT};

fn msg(text: &str, at_ms: i64) -> InboundMessage {
    InboundMessage::new(OWNER, text, at_ms)
}

#[tokio::test(start_paused = true)]
async fn unauthorized_sender_is_denied_explicitly() {
    let h = Harness::new(&config());
    let out = h
        .bridge
        .handle_inbound(InboundMessage::new(STRANGER, "rm everything", 0))
        .await;
    assert_eq!(out.status, InboundStatus::Denied);
    assert_eq!(out.replies, vec![REPLY_DENIED.to_string()]);
    assert_eq!(h.bridge.stats().errors(), 1);
    assert_eq!(h.bridge.stats().received(), 0);
    assert!(h.actuator.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shortcut_submit_sequence() {
    let h = Harness::new(&config());
    let out = h.bridge.handle_inbound(msg("  write the tests  ", 0)).await;
    assert_eq!(out.status, InboundStatus::Dispatched);
    assert_eq!(out.replies, vec![REPLY_ACK.to_string(), REPLY_SENT.to_string()]);
    assert_eq!(
        h.actuator.calls(),
        vec![
            Call::Focus,
            Call::Click(Point { x: 500, y: 800 }),
            Call::Clear,
            Call::Type("write the tests".into()),
            Call::Shortcut("ctrl+enter".into()),
        ]
    );
    assert_eq!(h.bridge.stats().sent(), 1);
}

#[tokio::test(start_paused = true)]
async fn click_submit_when_shortcut_is_none() {
    let mut cfg = config();
    cfg.desktop.submit_shortcut = Some("None".into());
    let h = Harness::new(&cfg);
    h.bridge.handle_inbound(msg("deploy please", 0)).await;

    let calls = h.actuator.calls();
    assert_eq!(calls.last(), Some(&Call::Click(Point { x: 850, y: 800 })));
    assert!(!calls.iter().any(|c| matches!(c, Call::Shortcut(_))));
    let submit_clicks = calls
        .iter()
        .filter(|c| **c == Call::Click(Point { x: 850, y: 800 }))
        .count();
    assert_eq!(submit_clicks, 1);
}

#[tokio::test(start_paused = true)]
async fn focus_failure_touches_nothing_else() {
    let cfg = config();
    let h = Harness::build(
        &cfg,
        FakeActuator::unfocusable(),
        ScriptedCapture::new(Vec::<String>::new()),
        FakeTransport::new(vec![OWNER]),
        OutputSnapshot::default(),
    );
    let out = h.bridge.handle_inbound(msg("hello there", 0)).await;
    assert_eq!(out.status, InboundStatus::DispatchFailed);
    assert_eq!(out.replies, vec![REPLY_ACK.to_string(), REPLY_FAILED.to_string()]);
    assert_eq!(h.actuator.calls(), vec![Call::Focus]);
    assert_eq!(h.bridge.stats().errors(), 1);
}

#[tokio::test(start_paused = true)]
async fn actuation_error_stops_before_submit() {
    let h = Harness::build(
        &config(),
        FakeActuator::failing_typing(),
        ScriptedCapture::new(Vec::<String>::new()),
        FakeTransport::new(vec![OWNER]),
        OutputSnapshot::default(),
    );
    let out = h.bridge.handle_inbound(msg("hello there", 0)).await;
    assert_eq!(out.status, InboundStatus::DispatchFailed);
    assert!(!h
        .actuator
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Shortcut(_))));
}

#[tokio::test(start_paused = true)]
async fn echoed_output_is_ignored() {
    let h = Harness::new(&config());
    let echoed = format!("{DEFAULT_SIGNATURE}\n\nAll tests passed");
    let out = h.bridge.handle_inbound(msg(&echoed, 0)).await;
    assert_eq!(out.status, InboundStatus::Echo);
    assert!(out.replies.is_empty());
    assert!(h.actuator.calls().is_empty());
    assert_eq!(h.bridge.stats().received(), 0);
}

#[tokio::test(start_paused = true)]
async fn duplicate_and_throttle_windows() {
    let h = Harness::new(&config());
    assert_eq!(
        h.bridge.handle_inbound(msg("run it", 10_000)).await.status,
        InboundStatus::Dispatched
    );
    assert_eq!(
        h.bridge.handle_inbound(msg("run it", 11_000)).await.status,
        InboundStatus::Duplicate
    );
    assert_eq!(
        h.bridge.handle_inbound(msg("something else", 10_500)).await.status,
        InboundStatus::Throttled
    );
    assert_eq!(
        h.bridge.handle_inbound(msg("run it", 12_000)).await.status,
        InboundStatus::Dispatched
    );
    assert_eq!(h.bridge.stats().received(), 2);
}

#[tokio::test(start_paused = true)]
async fn throttled_message_can_be_resent() {
    let h = Harness::new(&config());
    assert_eq!(
        h.bridge.handle_inbound(msg("first command", 10_000)).await.status,
        InboundStatus::Dispatched
    );
    assert_eq!(
        h.bridge.handle_inbound(msg("second command", 10_500)).await.status,
        InboundStatus::Throttled
    );
    // The throttled copy never became the sender's latest text.
    assert_eq!(
        h.bridge.handle_inbound(msg("second command", 11_500)).await.status,
        InboundStatus::Dispatched
    );
    assert!(h
        .actuator
        .calls()
        .contains(&Call::Type("second command".into())));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_copies_dispatch_once() {
    let mut cfg = config();
    cfg.desktop.action_delay_ms = 0;
    let h = Harness::new(&cfg);

    let a = {
        let bridge = h.bridge.clone();
        tokio::spawn(async move { bridge.handle_inbound(msg("ship the release", 5_000)).await })
    };
    let b = {
        let bridge = h.bridge.clone();
        tokio::spawn(async move { bridge.handle_inbound(msg("ship the release", 5_000)).await })
    };
    let (a, b) = tokio::join!(a, b);
    let statuses = [a.unwrap().status, b.unwrap().status];

    let dispatched = statuses
        .iter()
        .filter(|s| **s == InboundStatus::Dispatched)
        .count();
    assert_eq!(dispatched, 1, "{statuses:?}");
    let typed = h
        .actuator
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Type(_)))
        .count();
    assert_eq!(typed, 1);
}

#[tokio::test(start_paused = true)]
async fn one_char_message_is_too_short() {
    let h = Harness::new(&config());
    let out = h.bridge.handle_inbound(msg(" k ", 0)).await;
    assert_eq!(out.status, InboundStatus::TooShort);
    assert_eq!(out.replies, vec![REPLY_TOO_SHORT.to_string()]);
    assert_eq!(h.bridge.stats().received(), 1);
    assert!(h.actuator.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn acknowledgements_follow_cadence() {
    let h = Harness::new(&config());
    let mut acks = Vec::new();
    let mut notices = Vec::new();
    for i in 0..7i64 {
        let out = h
            .bridge
            .handle_inbound(msg(&format!("task number {i}"), i * 1_000))
            .await;
        assert_eq!(out.status, InboundStatus::Dispatched);
        acks.push(out.replies.contains(&REPLY_ACK.to_string()));
        notices.push(out.replies.contains(&REPLY_SENT.to_string()));
    }
    assert_eq!(acks, [true, false, false, false, false, true, false]);
    assert_eq!(notices, [true, false, false, true, false, false, true]);
}

#[tokio::test(start_paused = true)]
async fn commands_require_authorization() {
    let h = Harness::new(&config());
    let err = h
        .bridge
        .run_command(STRANGER, Command::Status)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::AuthorizationDenied(id) if id == STRANGER));
    assert_eq!(h.bridge.stats().errors(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_command_dispatches_canned_payload() {
    let h = Harness::new(&config());
    let resp = h.bridge.run_command(OWNER, Command::Test).await.unwrap();
    assert!(resp.ok);
    assert!(h.actuator.calls().contains(&Call::Type(TEST_PAYLOAD.into())));

    let status = h.bridge.status_report();
    assert_eq!(status.messages_sent, 1);
    assert!(status.security_mode);
    assert_eq!(status.allowed_users, 1);
}

#[tokio::test(start_paused = true)]
async fn toggle_flips_and_reports() {
    let h = Harness::new(&config());
    assert!(h.bridge.monitoring_enabled());
    let resp = h.bridge.run_command(OWNER, Command::MonitorToggle).await.unwrap();
    assert_eq!(resp.reply, "Monitoring disabled.");
    assert!(!h.bridge.monitoring_enabled());

    let status = h.bridge.monitor_status().await;
    assert!(!status.enabled);
    assert_eq!(status.last_snapshot_at, None);
    assert_eq!(status.capture_region, Point { x: 600, y: 700 });
}
