use std::time::{Duration, Instant};

use inovo_iva::drivers::IvaConfig;
use inovo_iva::socket::{Listener, Stream, MAX_FRAME};
use inovo_iva::TransportError;
use tokio::io::AsyncWriteExt;

fn loopback() -> IvaConfig {
    IvaConfig::new("127.0.0.1", 0)
}

#[tokio::test]
async fn try_read_times_out_without_error() {
    let (client, _server) = tokio::io::duplex(256);
    let mut stream = Stream::new(client);

    let started = Instant::now();
    let line = stream.try_read(Duration::from_millis(100)).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(line, None);
    assert!(elapsed >= Duration::from_millis(90), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(1), "{:?}", elapsed);
}

#[tokio::test]
async fn partial_line_survives_a_timeout() {
    let (client, mut server) = tokio::io::duplex(256);
    let mut stream = Stream::new(client);

    server.write_all(b"O").await.unwrap();
    assert_eq!(stream.try_read(Duration::from_millis(20)).await.unwrap(), None);

    server.write_all(b"K\n").await.unwrap();
    assert_eq!(stream.try_read(Duration::from_millis(500)).await.unwrap().as_deref(), Some("OK"));
}

#[tokio::test]
async fn oversized_frame_is_rejected() {
    let (client, mut server) = tokio::io::duplex(MAX_FRAME * 4);
    let mut stream = Stream::new(client);

    server.write_all(&vec![b'x'; MAX_FRAME + 500]).await.unwrap();
    let err = stream.read().await.unwrap_err();
    assert!(matches!(err, TransportError::FrameTooLarge { max: MAX_FRAME, .. }));
}

#[tokio::test]
async fn tail_of_oversized_frame_is_never_a_reply() {
    let (client, mut server) = tokio::io::duplex(MAX_FRAME * 4);
    let mut stream = Stream::new(client);

    server.write_all(&vec![b'x'; MAX_FRAME + 1]).await.unwrap();
    let err = stream.read().await.unwrap_err();
    assert!(matches!(err, TransportError::FrameTooLarge { .. }));

    // Same frame, continued after the error was reported.
    server.write_all(b"OK\nTrue\n").await.unwrap();
    assert_eq!(stream.read().await.unwrap(), "True");
}

#[tokio::test]
async fn oversized_frame_is_dropped_up_to_its_terminator() {
    let (client, mut server) = tokio::io::duplex(MAX_FRAME * 4);
    let mut stream = Stream::new(client);

    let mut bytes = vec![b'x'; MAX_FRAME + 1];
    bytes.extend_from_slice(b"OK\nTrue\n");
    server.write_all(&bytes).await.unwrap();

    assert!(matches!(stream.read().await, Err(TransportError::FrameTooLarge { .. })));
    assert_eq!(stream.read().await.unwrap(), "True");
}

#[tokio::test]
async fn closed_peer_is_end_of_communication() {
    let (client, mut server) = tokio::io::duplex(256);
    let mut stream = Stream::new(client);

    server.write_all(b"OK\n").await.unwrap();
    drop(server);

    assert_eq!(stream.read().await.unwrap(), "OK");
    assert!(matches!(stream.read().await, Err(TransportError::EndOfCommunication)));
}

#[tokio::test]
async fn listener_accepts_runtime_connection() {
    let mut listener = Listener::bind(&loopback()).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let runtime = tokio::spawn(async move {
        let mut stream = Stream::connect(addr).await.unwrap();
        let request = stream.read().await.unwrap();
        stream.write(&format!("echo {}", request)).await.unwrap();
    });

    let mut session = listener.accept().await;
    assert!(session.peer_addr().is_some());

    session.write("{\"type\":\"pop\"}").await.unwrap();
    assert_eq!(session.read().await.unwrap(), "echo {\"type\":\"pop\"}");
    runtime.await.unwrap();
}

#[tokio::test]
async fn bind_and_connect_failures_name_the_address() {
    let listener = Listener::bind(&loopback()).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let taken = Listener::bind(&IvaConfig::new("127.0.0.1", port)).await;
    assert!(matches!(taken, Err(TransportError::Bind { .. })));

    drop(listener);
    let refused = Stream::connect(format!("127.0.0.1:{}", port)).await;
    match refused {
        Err(TransportError::Connect { addr, .. }) => assert!(addr.ends_with(&port.to_string())),
        other => panic!("expected connect error, got {:?}", other.map(|_| ())),
    }
}
