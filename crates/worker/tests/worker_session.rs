//! Worker behaviour over real sockets, with the test playing the authority.

use std::net::SocketAddr;
use std::time::Duration;
use switchboard_common::SwitchboardError;
use switchboard_worker::Worker;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Start a worker on an ephemeral port and accept its registration.
async fn registered_worker() -> (Worker, TcpStream, u16) {
    let authority = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let authority_addr = authority.local_addr().unwrap().to_string();

    let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let worker = Worker::start(&authority_addr, bind).await.unwrap();
    let port = worker.local_addr().unwrap().port();

    let (mut authority_link, _) = authority.accept().await.unwrap();
    let mut buffer = [0u8; 127];
    let n = authority_link.read(&mut buffer).await.unwrap();
    assert_eq!(&buffer[..n], format!("SERVER {}", port).as_bytes());

    (worker, authority_link, port)
}

async fn ping(channel: &mut TcpStream) -> Vec<u8> {
    channel.write_all(b"PING").await.unwrap();
    let mut buffer = [0u8; 16];
    let n = channel.read(&mut buffer).await.unwrap();
    buffer[..n].to_vec()
}

async fn ping_until(channel: &mut TcpStream, expected: &[u8]) {
    for _ in 0..100 {
        if ping(channel).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "worker never reported {}",
        String::from_utf8_lossy(expected)
    );
}

#[tokio::test]
async fn busy_during_session_and_free_after() {
    let (worker, mut authority_link, port) = registered_worker().await;
    tokio::spawn(worker.run());

    assert_eq!(ping(&mut authority_link).await, b"FREE");

    let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    client.write_all(b"hello").await.unwrap();
    let mut buffer = [0u8; 256];
    let n = client.read(&mut buffer).await.unwrap();
    assert_eq!(&buffer[..n], b"hello");

    // The echo came back, so the session has been accepted
    assert_eq!(ping(&mut authority_link).await, b"BUSY");

    drop(client);
    ping_until(&mut authority_link, b"FREE").await;
}

#[tokio::test]
async fn echo_is_byte_identical() {
    let (worker, _authority_link, port) = registered_worker().await;
    tokio::spawn(worker.run());

    let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let payloads: [&[u8]; 4] = [b"a", b"with spaces and\nnewlines", b"\0\0\xfe\xff", &[0x42; 256]];

    for payload in payloads {
        client.write_all(payload).await.unwrap();
        let mut echoed = vec![0u8; payload.len()];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(echoed, payload);
    }
}

#[tokio::test]
async fn serves_sessions_back_to_back() {
    let (worker, mut authority_link, port) = registered_worker().await;
    tokio::spawn(worker.run());

    for round in 0..3u8 {
        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        client.write_all(&[round]).await.unwrap();
        let mut buffer = [0u8; 1];
        client.read_exact(&mut buffer).await.unwrap();
        assert_eq!(buffer[0], round);

        assert_eq!(ping(&mut authority_link).await, b"BUSY");
        drop(client);
        ping_until(&mut authority_link, b"FREE").await;
    }
}

/// Send one message on an open session and read the echo back
async fn echo(client: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    client.write_all(payload).await.unwrap();
    let mut echoed = vec![0u8; payload.len()];
    client.read_exact(&mut echoed).await.unwrap();
    echoed
}

#[tokio::test]
async fn session_survives_losing_the_authority() {
    let (worker, authority_link, port) = registered_worker().await;
    let running = tokio::spawn(worker.run());

    let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    assert_eq!(echo(&mut client, b"one").await, b"one");

    drop(authority_link);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The open session keeps going and the worker keeps running
    assert_eq!(echo(&mut client, b"two").await, b"two");
    assert!(!running.is_finished());

    // Direct connections are still served once the session ends
    drop(client);
    let mut next = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let echoed = tokio::time::timeout(Duration::from_secs(5), echo(&mut next, b"three"))
        .await
        .expect("worker should serve the next session");
    assert_eq!(echoed, b"three");
    assert!(!running.is_finished());
}

#[tokio::test]
async fn second_client_waits_for_first_session() {
    let (worker, _authority_link, port) = registered_worker().await;
    tokio::spawn(worker.run());

    let mut first = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    assert_eq!(echo(&mut first, b"first").await, b"first");

    // Queued in the backlog, nothing reads it yet
    let mut second = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    second.write_all(b"second").await.unwrap();
    let mut buffer = [0u8; 6];
    let early = tokio::time::timeout(Duration::from_millis(200), second.read_exact(&mut buffer)).await;
    assert!(early.is_err(), "second client was served during the first session");

    drop(first);
    tokio::time::timeout(Duration::from_secs(5), second.read_exact(&mut buffer))
        .await
        .expect("second client should be served after the first leaves")
        .unwrap();
    assert_eq!(&buffer, b"second");
}

#[tokio::test]
async fn start_fails_without_authority() {
    // Bind and drop to get a port nothing listens on
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = unused.local_addr().unwrap().to_string();
    drop(unused);

    let result = Worker::start(&addr, "127.0.0.1:0".parse().unwrap()).await;
    assert!(matches!(result, Err(SwitchboardError::Connection(_))));
}
