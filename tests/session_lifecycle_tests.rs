// Lifecycle tests for the live session controller: startup, teardown and
// every path into the terminal Closed state.

mod common;

use common::{wait_for_state, FailingChannel, PendingChannel, ScriptedChannel};
use merkez_live::audio::SyntheticDevice;
use merkez_live::{LiveConfig, LiveSession, SessionState};
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> LiveConfig {
    LiveConfig {
        session_id: "live-test".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_start_reaches_listening() {
    let (channel, _remote) = ScriptedChannel::new();
    let device = Arc::new(SyntheticDevice::new());
    let session = LiveSession::new(test_config(), channel, device.clone());

    assert_eq!(session.state(), SessionState::Idle);
    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Listening);

    session.close().await;
}

#[tokio::test]
async fn test_captured_audio_reaches_the_uplink() {
    let (channel, mut remote) = ScriptedChannel::new();
    let device = Arc::new(SyntheticDevice::scripted(vec![vec![0.5; 4096]]));
    let session = LiveSession::new(test_config(), channel, device.clone());

    session.start().await.unwrap();

    let frame = remote.frames.recv().await.expect("no frame on uplink");
    assert_eq!(frame.mime_type, "audio/pcm;rate=16000");
    assert!(!frame.is_empty());

    session.close().await;
}

#[tokio::test]
async fn test_close_releases_every_resource() {
    let (channel, mut remote) = ScriptedChannel::new();
    let device = Arc::new(SyntheticDevice::scripted(vec![vec![0.1; 4096]]));
    let probe = device.probe();
    let session = LiveSession::new(test_config(), channel, device.clone());

    session.start().await.unwrap();
    session.close().await;

    assert_eq!(session.state(), SessionState::Closed);
    assert!(device.capture_stopped(), "capture source must be stopped");
    assert!(probe.lock().unwrap().closed, "playback sink must be closed");

    // The uplink closes once both the pipeline and the session drop it
    remote.drain_uplink().await;
}

#[tokio::test]
async fn test_double_close_is_a_noop() {
    let (channel, _remote) = ScriptedChannel::new();
    let device = Arc::new(SyntheticDevice::new());
    let session = LiveSession::new(test_config(), channel, device);

    session.start().await.unwrap();
    session.close().await;
    session.close().await;

    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_close_without_start() {
    let (channel, _remote) = ScriptedChannel::new();
    let device = Arc::new(SyntheticDevice::new());
    let session = LiveSession::new(test_config(), channel, device);

    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let (channel, _remote) = ScriptedChannel::new();
    let device = Arc::new(SyntheticDevice::new());
    let session = LiveSession::new(test_config(), channel, device);

    session.start().await.unwrap();
    assert!(session.start().await.is_err(), "second start must be rejected");
    assert_eq!(session.state(), SessionState::Listening);

    session.close().await;
}

#[tokio::test]
async fn test_start_after_close_is_rejected() {
    let (channel, _remote) = ScriptedChannel::new();
    let device = Arc::new(SyntheticDevice::new());
    let session = LiveSession::new(test_config(), channel, device);

    session.start().await.unwrap();
    session.close().await;

    assert!(session.start().await.is_err(), "closed sessions cannot restart");
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_connect_failure_lands_closed_with_resources_released() {
    let device = Arc::new(SyntheticDevice::new());
    let probe = device.probe();
    let session = LiveSession::new(test_config(), Arc::new(FailingChannel), device.clone());

    assert!(session.start().await.is_err());
    assert_eq!(session.state(), SessionState::Closed);
    assert!(device.capture_stopped());
    assert!(probe.lock().unwrap().closed);
}

#[tokio::test]
async fn test_remote_close_ends_the_session() {
    let (channel, remote) = ScriptedChannel::new();
    let device = Arc::new(SyntheticDevice::new());
    let probe = device.probe();
    let session = LiveSession::new(test_config(), channel, device.clone());

    session.start().await.unwrap();

    // Remote hangs up: the inbound event stream ends
    drop(remote.events);

    wait_for_state(&session, SessionState::Closed).await;
    assert!(device.capture_stopped());
    assert!(probe.lock().unwrap().closed);
}

#[tokio::test]
async fn test_capture_death_is_fatal() {
    let (channel, _remote) = ScriptedChannel::new();
    let device = Arc::new(SyntheticDevice::finite(vec![vec![0.1; 4096]]));
    let probe = device.probe();
    let session = LiveSession::new(test_config(), channel, device.clone());

    session.start().await.unwrap();

    // The capture stream ends after its single frame; no recovery
    wait_for_state(&session, SessionState::Closed).await;
    assert!(probe.lock().unwrap().closed);
}

#[tokio::test]
async fn test_close_while_connecting() {
    let device = Arc::new(SyntheticDevice::new());
    let probe = device.probe();
    let session = Arc::new(LiveSession::new(
        test_config(),
        Arc::new(PendingChannel),
        device.clone(),
    ));

    let starter = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.start().await })
    };

    // Give start() time to reach the connect await
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.state(), SessionState::Connecting);

    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert!(device.capture_stopped());
    assert!(probe.lock().unwrap().closed);

    assert!(starter.await.unwrap().is_ok(), "interrupted start is not an error");
}
