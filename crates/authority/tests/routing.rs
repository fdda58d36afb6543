//! End-to-end routing: authority, real workers and the client library over
//! loopback sockets. The test drives the authority one connection at a time
//! with `accept_one`, mirroring its single-threaded accept loop.

use std::net::SocketAddr;
use std::time::Duration;
use switchboard_authority::Authority;
use switchboard_client::{request_assignment, Assignment, ChatSession};
use switchboard_common::config::CoordinatorConfig;
use switchboard_proto::Availability;
use switchboard_worker::Worker;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn authority() -> (Authority, String) {
    authority_with(CoordinatorConfig {
        probe_timeout_ms: 2000,
        handshake_timeout_ms: 2000,
    })
    .await
}

async fn authority_with(config: CoordinatorConfig) -> (Authority, String) {
    let authority = Authority::bind("127.0.0.1:0".parse().unwrap(), &config)
        .await
        .unwrap();
    let addr = authority.local_addr().unwrap().to_string();
    (authority, addr)
}

/// Start a worker and let the authority accept its registration
async fn add_worker(authority: &mut Authority, addr: &str) -> SocketAddr {
    let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let worker = Worker::start(addr, bind).await.unwrap();
    let local = worker.local_addr().unwrap();

    authority.accept_one().await.unwrap();
    tokio::spawn(worker.run());
    local
}

/// One client assignment round-trip through the authority
async fn assign(authority: &mut Authority, addr: &str) -> Assignment {
    let addr = addr.to_string();
    let client = tokio::spawn(async move { request_assignment(&addr).await });
    authority.accept_one().await.unwrap();
    client.await.unwrap().unwrap()
}

fn ports(authority: &Authority) -> Vec<u16> {
    authority
        .registry()
        .snapshot()
        .iter()
        .map(|w| w.address.port())
        .collect()
}

#[tokio::test]
async fn no_workers_means_no_servers_available() {
    let (mut authority, addr) = authority().await;
    assert_eq!(assign(&mut authority, &addr).await, Assignment::NoServersAvailable);
}

#[tokio::test]
async fn client_is_routed_to_a_free_worker_and_chats() {
    let (mut authority, addr) = authority().await;
    let worker = add_worker(&mut authority, &addr).await;
    assert_eq!(ports(&authority), vec![worker.port()]);

    let Assignment::Connect(assigned) = assign(&mut authority, &addr).await else {
        panic!("expected an assignment");
    };
    assert_eq!(assigned, worker);

    let mut session = ChatSession::connect(assigned).await.unwrap();
    assert_eq!(session.exchange(b"hello worker").await.unwrap(), b"hello worker");

    // While the session is open the only worker is busy
    assert_eq!(assign(&mut authority, &addr).await, Assignment::NoServersAvailable);
    assert_eq!(authority.registry().snapshot()[0].availability, Availability::Busy);
    assert_eq!(ports(&authority), vec![worker.port()]);

    session.close().await.unwrap();

    let mut reassigned = None;
    for _ in 0..100 {
        if let Assignment::Connect(addr) = assign(&mut authority, &addr).await {
            reassigned = Some(addr);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(reassigned, Some(worker));
}

#[tokio::test]
async fn first_free_worker_in_registration_order_wins() {
    let (mut authority, addr) = authority().await;
    let a = add_worker(&mut authority, &addr).await;
    let b = add_worker(&mut authority, &addr).await;
    let c = add_worker(&mut authority, &addr).await;

    // Occupy B
    let mut session = ChatSession::connect(b).await.unwrap();
    assert_eq!(session.exchange(b"x").await.unwrap(), b"x");

    assert_eq!(assign(&mut authority, &addr).await, Assignment::Connect(a));

    let states: Vec<_> = authority
        .registry()
        .snapshot()
        .iter()
        .map(|w| w.availability)
        .collect();
    assert_eq!(
        states,
        vec![Availability::Free, Availability::Busy, Availability::Free]
    );
    assert_eq!(ports(&authority), vec![a.port(), b.port(), c.port()]);
}

#[tokio::test]
async fn malformed_registration_is_closed_without_a_record() {
    let (mut authority, addr) = authority().await;

    for payload in [&b"SERVER"[..], b"SERVER abc", b"SERVER 0", b"SERVER 99999"] {
        let mut stream = TcpStream::connect(&addr).await.unwrap();
        stream.write_all(payload).await.unwrap();
        authority.accept_one().await.unwrap();

        let mut buffer = [0u8; 16];
        let n = stream.read(&mut buffer).await.unwrap_or(0);
        assert_eq!(n, 0, "connection should be closed");
        assert!(authority.registry().is_empty());
    }
}

#[tokio::test]
async fn dead_worker_is_evicted_on_next_assignment() {
    let (mut authority, addr) = authority().await;
    let live = add_worker(&mut authority, &addr).await;

    // A registration whose process then goes away
    let mut doomed = TcpStream::connect(&addr).await.unwrap();
    doomed.write_all(b"SERVER 1").await.unwrap();
    authority.accept_one().await.unwrap();
    assert_eq!(ports(&authority), vec![live.port(), 1]);
    drop(doomed);

    assert_eq!(assign(&mut authority, &addr).await, Assignment::Connect(live));
    assert_eq!(ports(&authority), vec![live.port()]);
}

#[tokio::test]
async fn back_to_back_requests_can_share_a_free_worker() {
    let (mut authority, addr) = authority().await;
    let worker = add_worker(&mut authority, &addr).await;

    // No reservation between assignment and the client connecting
    let first = assign(&mut authority, &addr).await;
    let second = assign(&mut authority, &addr).await;
    assert_eq!(first, Assignment::Connect(worker));
    assert_eq!(second, Assignment::Connect(worker));
}

#[tokio::test]
async fn unknown_first_message_is_dropped() {
    let (mut authority, addr) = authority().await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream.write_all(b"HELLO").await.unwrap();
    authority.accept_one().await.unwrap();

    let mut buffer = [0u8; 16];
    assert_eq!(stream.read(&mut buffer).await.unwrap_or(0), 0);
    assert!(authority.registry().is_empty());
}

#[tokio::test]
async fn silent_connection_is_dropped_after_handshake_timeout() {
    let (mut authority, addr) = authority_with(CoordinatorConfig {
        probe_timeout_ms: 2000,
        handshake_timeout_ms: 100,
    })
    .await;

    // Connects but never says anything
    let mut silent = TcpStream::connect(&addr).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), authority.accept_one())
        .await
        .expect("authority should give up on a silent connection")
        .unwrap();

    let mut buffer = [0u8; 16];
    assert_eq!(silent.read(&mut buffer).await.unwrap_or(0), 0);
    assert!(authority.registry().is_empty());

    // The next connection is served normally
    let worker = add_worker(&mut authority, &addr).await;
    assert_eq!(assign(&mut authority, &addr).await, Assignment::Connect(worker));
}
