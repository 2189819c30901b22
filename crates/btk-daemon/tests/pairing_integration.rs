//! Connection pairing across the two HID listeners.

use std::time::Duration;

use btk_daemon::infrastructure::transport::listener::HidListener;
use btk_daemon::infrastructure::transport::mock::{listener, MockConnector};
use btk_daemon::infrastructure::transport::{PacketChannel, PeerAddr};
use futures_util::StreamExt;

const HOST_A: PeerAddr = PeerAddr([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x01]);
const HOST_B: PeerAddr = PeerAddr([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x02]);

fn hid_listener(timeout: Duration) -> (HidListener, MockConnector, MockConnector) {
    let (control, control_host) = listener();
    let (interrupt, interrupt_host) = listener();
    (
        HidListener::new(Box::new(control), Box::new(interrupt), timeout),
        control_host,
        interrupt_host,
    )
}

#[tokio::test]
async fn test_interleaved_connections_are_paired_by_address() {
    // Arrange – A and B both open control before either opens interrupt,
    // and B finishes first.
    let (hid, control_host, interrupt_host) = hid_listener(Duration::from_secs(5));
    let a_control = control_host.connect(HOST_A).unwrap();
    let b_control = control_host.connect(HOST_B).unwrap();
    let b_interrupt = interrupt_host.connect(HOST_B).unwrap();
    let a_interrupt = interrupt_host.connect(HOST_A).unwrap();
    let mut incoming = Box::pin(hid.incoming());

    // Act
    let first = incoming.next().await.unwrap().unwrap();
    let second = incoming.next().await.unwrap().unwrap();

    // Assert – every pair's channels lead back to the same host
    let mut pairs = [first, second];
    pairs.sort_by_key(|pair| pair.peer);
    let [pair_a, pair_b] = pairs;
    assert_eq!(pair_a.peer, HOST_A);
    assert_eq!(pair_b.peer, HOST_B);

    pair_a.control.send(b"a-ctl").await.unwrap();
    pair_a.interrupt.send(b"a-int").await.unwrap();
    pair_b.control.send(b"b-ctl").await.unwrap();
    pair_b.interrupt.send(b"b-int").await.unwrap();
    assert_eq!(a_control.recv_packet().await.unwrap(), b"a-ctl");
    assert_eq!(a_interrupt.recv_packet().await.unwrap(), b"a-int");
    assert_eq!(b_control.recv_packet().await.unwrap(), b"b-ctl");
    assert_eq!(b_interrupt.recv_packet().await.unwrap(), b"b-int");
}

#[tokio::test(start_paused = true)]
async fn test_stale_half_expires_without_blocking_other_hosts() {
    // Arrange – A opens only its control channel
    let (hid, control_host, interrupt_host) = hid_listener(Duration::from_secs(5));
    let a_control = control_host.connect(HOST_A).unwrap();
    let mut incoming = Box::pin(hid.incoming());

    // Act – B connects fully while A's half is still waiting
    let _b_control = control_host.connect(HOST_B).unwrap();
    let _b_interrupt = interrupt_host.connect(HOST_B).unwrap();
    let pair = incoming.next().await.unwrap().unwrap();

    // Assert
    assert_eq!(pair.peer, HOST_B);
    let waited = tokio::time::timeout(Duration::from_secs(10), incoming.next()).await;
    assert!(waited.is_err(), "A never completes");
    assert_eq!(a_control.recv_packet().await, None, "A's half was closed");
}
