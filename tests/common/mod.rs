//! Shared fixtures for TLS integration tests
//!
//! The PEM material lives in `testdata/` so tests that need file paths
//! (certificate loading) and tests that need in-memory parsing (the
//! loopback server) use the same bundle.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use openssl::pkey::PKey;
use openssl::ssl::{Ssl, SslContextBuilder, SslMethod, SslStream, SslVerifyMode};
use openssl::x509::X509;

pub const SERVER_CERT: &str = include_str!("../../testdata/server.crt");
pub const SERVER_KEY: &str = include_str!("../../testdata/server.key");
pub const CLIENT_CERT: &str = include_str!("../../testdata/client.crt");

/// One-time test setup: logging plus engine bootstrap.
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
    vtls::engine::initialize();
}

/// Path to a PEM fixture under `testdata/`.
pub fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

/// Spawn a one-shot TLS server on a loopback port.
///
/// The handler runs on the server thread with the established stream;
/// assertion failures inside it propagate through `JoinHandle::join`.
pub fn spawn_tls_server<F>(require_client_cert: bool, handler: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(SslStream<TcpStream>) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (tcp, _) = listener.accept().unwrap();

        let mut builder = SslContextBuilder::new(SslMethod::tls_server()).unwrap();
        let cert = X509::from_pem(SERVER_CERT.as_bytes()).unwrap();
        let key = PKey::private_key_from_pem(SERVER_KEY.as_bytes()).unwrap();
        builder.set_certificate(&cert).unwrap();
        builder.set_private_key(&key).unwrap();

        if require_client_cert {
            let client_ca = X509::from_pem(CLIENT_CERT.as_bytes()).unwrap();
            builder.cert_store_mut().add_cert(client_ca).unwrap();
            builder.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
        }

        let ctx = builder.build();
        let ssl = Ssl::new(&ctx).unwrap();
        let stream = ssl.accept(tcp).unwrap();

        handler(stream);
    });

    (addr, handle)
}
