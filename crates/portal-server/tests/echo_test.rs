//! Integration tests for the echo server over real sockets

use portal_server::{EchoServer, EchoServerConfig, ListenAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn spawn_tcp_echo() -> String {
    let server = EchoServer::bind(EchoServerConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
    })
    .await
    .unwrap();

    let addr = match server.local_addr().unwrap() {
        ListenAddr::Tcp(addr) => addr,
        other => panic!("unexpected listen address {:?}", other),
    };
    tokio::spawn(server.serve());
    addr
}

/// Send everything, half-close, collect everything
async fn round_trip(addr: &str, payload: Vec<u8>) -> Vec<u8> {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut read, mut write) = stream.into_split();

    let writer = tokio::spawn(async move {
        // Several writes so chunk boundaries differ from the server's reads
        for chunk in payload.chunks(777) {
            write.write_all(chunk).await.unwrap();
        }
        write.shutdown().await.unwrap();
    });

    let mut received = Vec::new();
    read.read_to_end(&mut received).await.unwrap();
    writer.await.unwrap();
    received
}

#[tokio::test(flavor = "multi_thread")]
async fn test_echo_fidelity() {
    let addr = spawn_tcp_echo().await;

    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    let received = round_trip(&addr, payload.clone()).await;

    assert_eq!(received.len(), payload.len());
    assert_eq!(received, payload);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_echo_empty_session() {
    let addr = spawn_tcp_echo().await;
    let received = round_trip(&addr, Vec::new()).await;
    assert!(received.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_session_isolation() {
    let addr = spawn_tcp_echo().await;

    let mut a = TcpStream::connect(&addr).await.unwrap();
    let mut b = TcpStream::connect(&addr).await.unwrap();

    // Interleave writes from both clients
    for _ in 0..10 {
        a.write_all(&[b'A'; 100]).await.unwrap();
        b.write_all(&[b'B'; 100]).await.unwrap();
    }
    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();

    let mut from_a = Vec::new();
    let mut from_b = Vec::new();
    a.read_to_end(&mut from_a).await.unwrap();
    b.read_to_end(&mut from_b).await.unwrap();

    assert_eq!(from_a, vec![b'A'; 1000]);
    assert_eq!(from_b, vec![b'B'; 1000]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_closing_one_session_leaves_others_open() {
    let addr = spawn_tcp_echo().await;

    let mut survivor = TcpStream::connect(&addr).await.unwrap();
    let mut closing = TcpStream::connect(&addr).await.unwrap();

    survivor.write_all(b"before").await.unwrap();
    let mut buf = [0u8; 6];
    survivor.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"before");

    // Closing side sees the server end its session
    closing.write_all(b"bye").await.unwrap();
    closing.shutdown().await.unwrap();
    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), closing.read_to_end(&mut rest))
        .await
        .expect("server session did not terminate")
        .unwrap();
    assert_eq!(rest, b"bye");
    drop(closing);

    survivor.write_all(b"after").await.unwrap();
    let mut buf = [0u8; 5];
    survivor.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"after");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stalled_session_does_not_block_others() {
    let addr = spawn_tcp_echo().await;

    // Connected but silent; its session sits in read
    let _idle = TcpStream::connect(&addr).await.unwrap();

    let received = tokio::time::timeout(
        Duration::from_secs(5),
        round_trip(&addr, b"still served".to_vec()),
    )
    .await
    .expect("echo blocked by idle session");
    assert_eq!(received, b"still served");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_many_concurrent_sessions() {
    let addr = spawn_tcp_echo().await;

    let mut handles = Vec::new();
    for i in 0..32u8 {
        let addr = addr.clone();
        handles.push(tokio::spawn(async move {
            let payload = vec![i; 4096 + i as usize];
            let received = round_trip(&addr, payload.clone()).await;
            assert_eq!(received, payload);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_unix_echo_with_stale_file() {
    use tokio::net::UnixStream;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.sock");
    std::fs::write(&path, b"stale").unwrap();

    let server = EchoServer::bind(EchoServerConfig {
        listen_addr: ListenAddr::Unix(path.clone()),
    })
    .await
    .unwrap();
    tokio::spawn(server.serve());

    let mut stream = UnixStream::connect(&path).await.unwrap();
    stream.write_all(b"over unix").await.unwrap();
    stream.shutdown().await.unwrap();

    let mut received = Vec::new();
    stream.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, b"over unix");
}
