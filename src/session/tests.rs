//! Integration tests for the session layer
//!
//! These run a real session against the in-memory mock transport and verify
//! heartbeat setup, stream resynchronization and liveness transitions.

use super::*;
use crate::protocol::encode;
use crate::test_utils::{MockDevice, MockTransport};
use std::io;
use tokio::sync::mpsc;

fn options(timeout: Duration) -> SessionOptions {
    SessionOptions { session_timeout: timeout, max_read_bytes: 64 }
}

/// Start a session whose batches are forwarded to the returned receiver.
async fn start_session(
    timeout: Duration,
) -> (Session, MockDevice, mpsc::UnboundedReceiver<Vec<Packet>>) {
    let (transport, device) = MockTransport::new();
    let (tx, rx) = mpsc::unbounded_channel();

    let session = Session::start(
        Arc::new(transport),
        move |packets: Vec<Packet>| {
            let _ = tx.send(packets);
        },
        options(timeout),
    )
    .await
    .expect("session starts against mock transport");

    (session, device, rx)
}

async fn next_batch(rx: &mut mpsc::UnboundedReceiver<Vec<Packet>>) -> Vec<Packet> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("batch delivered within timeout")
        .expect("sink channel open")
}

fn position(device: u8, value: f32) -> Packet {
    Packet::from_value(PacketId::POSITION, DeviceId::new(device), value)
}

#[tokio::test]
async fn start_configures_device_heartbeat() {
    let _ = tracing_subscriber::fmt::try_init();

    let (session, device, _rx) = start_session(Duration::from_secs(3)).await;

    let written = device.written_packets();
    let expected = vec![
        Packet::new(PacketId::HEARTBEAT_FREQUENCY, DeviceId::ALL, vec![0]).unwrap(),
        Packet::new(PacketId::HEARTBEAT_SET, DeviceId::ALL, vec![PacketId::MODEL_NUMBER.value()])
            .unwrap(),
        Packet::new(PacketId::HEARTBEAT_FREQUENCY, DeviceId::ALL, vec![1]).unwrap(),
    ];
    assert_eq!(written, expected);

    session.shutdown().await;
}

#[tokio::test]
async fn start_fails_when_link_is_down() {
    let (transport, device) = MockTransport::new();
    device.fail_writes(true);

    let result = Session::start(Arc::new(transport), |_packets: Vec<Packet>| {}, options(Duration::from_secs(3))).await;

    assert!(matches!(result, Err(ReachError::Transport { .. })));
}

#[tokio::test]
async fn send_surfaces_write_failure() {
    let (session, device, _rx) = start_session(Duration::from_secs(3)).await;

    device.fail_writes(true);
    let result = session.send(&position(1, 0.5)).await;
    assert!(matches!(result, Err(ReachError::Transport { .. })));

    device.fail_writes(false);
    session.send(&position(1, 0.5)).await.expect("send succeeds once the link is back");
    assert_eq!(device.written_with_id(PacketId::POSITION), vec![position(1, 0.5)]);

    session.shutdown().await;
}

#[tokio::test]
async fn reassembles_frames_split_across_reads() {
    let (session, device, mut rx) = start_session(Duration::from_secs(3)).await;

    let packet = position(5, 1.0);
    let frame = encode(&packet);
    let (head, tail) = frame.split_at(4);

    device.inject(head.to_vec());
    device.inject(tail.to_vec());

    assert_eq!(next_batch(&mut rx).await, vec![packet]);
    session.shutdown().await;
}

#[tokio::test]
async fn several_frames_in_one_read_form_one_batch() {
    let (session, device, mut rx) = start_session(Duration::from_secs(3)).await;

    let packets = vec![position(1, 1.0), position(2, 2.0), position(3, 3.0)];
    let mut bytes: Vec<u8> = packets.iter().flat_map(encode).collect();
    // Start of a fourth frame stays buffered
    let partial = encode(&position(4, 4.0));
    bytes.extend_from_slice(&partial[..3]);

    device.inject(bytes);
    assert_eq!(next_batch(&mut rx).await, packets);

    device.inject(partial[3..].to_vec());
    assert_eq!(next_batch(&mut rx).await, vec![position(4, 4.0)]);

    session.shutdown().await;
}

#[tokio::test]
async fn corrupt_frame_does_not_block_later_frames() {
    let (session, device, mut rx) = start_session(Duration::from_secs(3)).await;

    let mut bytes = encode(&position(1, 1.0));
    bytes.extend_from_slice(&[0x07, 0x13, 0x37, 0x00]);
    bytes.extend(encode(&position(2, 2.0)));

    device.inject(bytes);
    assert_eq!(next_batch(&mut rx).await, vec![position(1, 1.0), position(2, 2.0)]);

    session.shutdown().await;
}

#[tokio::test]
async fn read_errors_do_not_stop_the_reader() {
    let (session, device, mut rx) = start_session(Duration::from_secs(3)).await;

    device.inject_read_error(io::ErrorKind::ConnectionReset);
    device.inject_read_error(io::ErrorKind::TimedOut);
    device.inject_packet(&position(3, 0.25));

    assert_eq!(next_batch(&mut rx).await, vec![position(3, 0.25)]);
    session.shutdown().await;
}

#[tokio::test]
async fn buffer_without_delimiter_is_discarded() {
    let (session, device, mut rx) = start_session(Duration::from_secs(3)).await;

    // A full buffer of noise, then a clean frame
    device.inject(vec![0xAA; 64]);
    device.inject_packet(&position(2, 8.0));

    assert_eq!(next_batch(&mut rx).await, vec![position(2, 8.0)]);
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn liveness_follows_heartbeats() {
    let (session, device, _rx) = start_session(Duration::from_secs(2)).await;
    let mut states = session.state_changes();

    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert!(!session.connected());

    device.inject_heartbeat();
    session
        .wait_for_connection(Duration::from_secs(5))
        .await
        .expect("heartbeat connects the session");
    assert!(session.connected());

    // No further heartbeats: the link must time out
    tokio::time::timeout(Duration::from_secs(10), states.wait_for(|s| *s == ConnectionState::Disconnected))
        .await
        .expect("session times out without heartbeats")
        .expect("monitor alive");
    assert!(!session.connected());

    // And recover on the next heartbeat
    device.inject_heartbeat();
    session
        .wait_for_connection(Duration::from_secs(5))
        .await
        .expect("a new heartbeat reconnects the session");

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn wait_for_connection_times_out_without_heartbeat() {
    let (session, _device, _rx) = start_session(Duration::from_secs(1)).await;

    let result = session.wait_for_connection(Duration::from_secs(3)).await;
    assert!(matches!(result, Err(ReachError::Timeout { .. })));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn regular_heartbeats_keep_the_link_up() {
    let (session, device, _rx) = start_session(Duration::from_secs(2)).await;

    device.inject_heartbeat();
    session.wait_for_connection(Duration::from_secs(5)).await.expect("connected");

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        device.inject_heartbeat();
        assert!(session.connected());
    }

    session.shutdown().await;
}

#[tokio::test]
async fn writer_outlives_session_shutdown() {
    let (session, device, _rx) = start_session(Duration::from_secs(3)).await;
    device.inject_heartbeat();
    session.wait_for_connection(Duration::from_secs(5)).await.expect("connected");

    let writer = session.writer();
    session.shutdown().await;

    // The writer still works, only the background tasks are gone
    writer.send(&position(1, 1.0)).await.expect("writer outlives session tasks");
}
