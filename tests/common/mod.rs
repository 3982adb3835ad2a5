//! Shared fixtures for integration tests

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use rsa::Pkcs1v15Encrypt;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use votifier_protocol::config::ServerConfig;
use votifier_protocol::core::codec::ModernDecoderFactory;
use votifier_protocol::error::Result;
use votifier_protocol::protocol::notify::ChannelSink;
use votifier_protocol::utils::metrics::Metrics;
use votifier_protocol::{InboundDispatcher, RsaKeyProvider, VoteEvent, VoteServer};

static SERVER_KEYS: OnceLock<Arc<RsaKeyProvider>> = OnceLock::new();
static OTHER_KEYS: OnceLock<Arc<RsaKeyProvider>> = OnceLock::new();

/// Key pair the server under test decrypts with
pub fn server_keys() -> Arc<RsaKeyProvider> {
    SERVER_KEYS
        .get_or_init(|| Arc::new(RsaKeyProvider::generate().expect("generate server key")))
        .clone()
}

/// A different key pair, for "wrong public key on the list" cases
pub fn other_keys() -> Arc<RsaKeyProvider> {
    OTHER_KEYS
        .get_or_init(|| Arc::new(RsaKeyProvider::generate().expect("generate other key")))
        .clone()
}

/// Encrypt `plaintext` into a 256-byte legacy frame for `keys`
pub fn legacy_frame(keys: &RsaKeyProvider, plaintext: &[u8]) -> Vec<u8> {
    keys.public_key()
        .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, plaintext)
        .expect("encrypt legacy frame")
}

pub fn vote_plaintext(service: &str, username: &str, address: &str, timestamp: &str) -> Vec<u8> {
    format!("VOTE\n{service}\n{username}\n{address}\n{timestamp}\n").into_bytes()
}

/// A server bound to an ephemeral loopback port
pub struct TestServer {
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<VoteEvent>,
    pub metrics: Arc<Metrics>,
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    /// Stop accepting, wait for in-flight connections, return the run result
    pub async fn shutdown(self) -> (Result<()>, mpsc::UnboundedReceiver<VoteEvent>) {
        let _ = self.shutdown.send(()).await;
        let result = self.handle.await.expect("server task panicked");
        (result, self.events)
    }
}

pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        address: "127.0.0.1:0".to_string(),
        max_connections: 64,
        connection_timeout: Duration::from_secs(5),
        shutdown_timeout: Duration::from_secs(2),
    }
}

pub async fn start_server(
    config: ServerConfig,
    modern: Option<Arc<dyn ModernDecoderFactory>>,
) -> TestServer {
    let (sink, events) = ChannelSink::new();
    let dispatcher = Arc::new(InboundDispatcher::new(Arc::new(sink)));
    let metrics = dispatcher.metrics().clone();

    let mut server = VoteServer::bind(&config, server_keys(), dispatcher)
        .await
        .expect("bind test server");
    if let Some(factory) = modern {
        server = server.with_modern_decoder(factory);
    }
    let addr = server.local_addr().expect("local addr");

    let (shutdown, shutdown_rx) = mpsc::channel(1);
    let handle = tokio::spawn(server.run_with_shutdown(shutdown_rx));

    TestServer {
        addr,
        events,
        metrics,
        shutdown,
        handle,
    }
}

/// Read until the server closes. A reset counts as closed.
pub async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => return out,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::ConnectionReset => return out,
            Err(e) => panic!("read failed: {e}"),
        }
    }
}

/// Connect, send `payload`, and return (greeting line, everything after it)
pub async fn exchange(addr: SocketAddr, payload: &[u8]) -> (String, Vec<u8>) {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(payload).await.expect("write payload");
    let bytes = tokio::time::timeout(Duration::from_secs(10), read_until_closed(&mut stream))
        .await
        .expect("server did not close the connection");
    split_greeting(bytes)
}

pub fn split_greeting(bytes: Vec<u8>) -> (String, Vec<u8>) {
    let end = bytes
        .iter()
        .position(|&b| b == b'\n')
        .expect("greeting line");
    let greeting = String::from_utf8(bytes[..end].to_vec()).expect("ascii greeting");
    (greeting, bytes[end + 1..].to_vec())
}
