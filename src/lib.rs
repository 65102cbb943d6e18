//! vtls - Client-side TLS session management
//!
//! This crate manages the lifecycle of a single encrypted connection layered
//! over an already-connected plain transport: engine bootstrap, session
//! creation, certificate/key loading, handshake, encrypted I/O, and teardown.
//! The cryptographic protocol itself (record layer, cipher suites, chain
//! validation) is delegated to OpenSSL via the `openssl` crate.
//!
//! # Architecture
//!
//! 1. `engine` performs process-wide one-time initialization of OpenSSL
//! 2. `Session` owns one TLS context bound to one transport and walks an
//!    explicit lifecycle: `Created` -> `CertificatesLoaded` (optional) ->
//!    `HandshakeInProgress` -> `Established` -> `Closed`
//! 3. Out-of-order calls are rejected at the API boundary with a typed
//!    state-precondition error instead of being forwarded to the engine
//!
//! The transport is caller-owned. Pass `&mut stream` and the session borrows
//! it for its lifetime; closing the session never closes the transport.
//!
//! # Examples
//!
//! ```no_run
//! use std::net::TcpStream;
//! use vtls::{engine, Session};
//!
//! engine::initialize();
//!
//! let mut tcp = TcpStream::connect("example.com:443").unwrap();
//! let mut session = Session::create(&mut tcp).unwrap();
//! session.handshake().unwrap();
//!
//! session.send(b"ping").unwrap();
//! let mut buf = [0u8; 1024];
//! let n = session.recv(&mut buf).unwrap();
//! println!("received {} bytes", n);
//!
//! session.close();
//! drop(session);
//!
//! engine::shutdown();
//! ```

pub mod cert;
pub mod engine;
pub mod error;
pub mod info;
pub mod session;

pub use cert::CertInfo;
pub use error::{CertificateReason, Error, HandshakeReason, IoReason};
pub use info::SessionInfo;
pub use session::{Session, SessionState};

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, Error>;
