//! Error taxonomy for TLS session operations
//!
//! Every operation returns a typed error to the immediate caller. The only
//! condition the caller is expected to retry is `WouldBlock` on non-blocking
//! transports; state-precondition errors are always caller bugs.

use openssl::error::ErrorStack;

use crate::session::SessionState;

/// TLS session errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The engine reported memory exhaustion while allocating a context or
    /// protocol instance.
    #[error("engine allocation failure")]
    Allocation,

    /// The engine could not construct or configure a context.
    #[error("context setup failed: {0}")]
    Context(#[source] ErrorStack),

    /// Certificate or private key could not be loaded into the session.
    #[error("certificate load failed: {reason}")]
    Certificate { reason: CertificateReason },

    /// The handshake did not complete.
    #[error("handshake failed: {reason}")]
    Handshake { reason: HandshakeReason },

    /// Encrypted write failed.
    #[error("send failed: {reason}")]
    Send { reason: IoReason },

    /// Encrypted read failed.
    #[error("recv failed: {reason}")]
    Recv { reason: IoReason },

    /// Operation invoked in the wrong lifecycle state. Never retried and
    /// never forwarded to the engine.
    #[error("operation requires state {expected}, session is {actual}")]
    StatePrecondition {
        expected: SessionState,
        actual: SessionState,
    },
}

impl Error {
    /// Map an engine error stack to `Allocation` or `Context`.
    pub(crate) fn engine(stack: ErrorStack) -> Self {
        let out_of_memory = stack
            .errors()
            .iter()
            .any(|e| e.reason().is_some_and(|r| r.contains("malloc")));

        if out_of_memory {
            Error::Allocation
        } else {
            Error::Context(stack)
        }
    }
}

/// Why a certificate/key pair could not be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CertificateReason {
    #[error("certificate file unreadable")]
    CertUnreadable,

    #[error("certificate file malformed")]
    CertMalformed,

    #[error("private key file unreadable")]
    KeyUnreadable,

    #[error("private key file malformed")]
    KeyMalformed,

    #[error("private key does not match certificate")]
    KeyMismatch,
}

/// Why a handshake failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeReason {
    /// Only meaningful on non-blocking transports; retry `handshake`.
    #[error("transport would block, retry")]
    WouldBlock,

    /// The peer violated the protocol. Fatal to the session.
    #[error("peer violated the protocol")]
    ProtocolViolation,

    /// The peer certificate failed verification. Fatal to the session.
    #[error("peer certificate verification failed")]
    CertificateVerifyFailed,

    /// The transport was closed mid-handshake. Fatal to the session.
    #[error("transport closed during handshake")]
    TransportClosed,

    #[error("unknown handshake failure")]
    Unknown,
}

/// Why an established-session read or write failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IoReason {
    /// Only meaningful on non-blocking transports; retry the operation.
    #[error("transport would block, retry")]
    WouldBlock,

    /// The transport was closed without a clean TLS shutdown.
    #[error("transport closed")]
    TransportClosed,

    /// Record-layer protocol failure. Fatal to the session.
    #[error("record layer protocol error")]
    ProtocolError,
}
