//! TLS session lifecycle and encrypted I/O
//!
//! A `Session` owns one TLS context and one protocol instance, bound to a
//! caller-owned transport for its entire lifetime. Operations are only
//! valid in the lifecycle states that permit them; anything else returns
//! `Error::StatePrecondition` without touching the engine or the transport.

use std::fmt;
use std::io::{self, Read, Write};
use std::mem;
use std::path::Path;

use log::{debug, trace};
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{
    ErrorCode, HandshakeError, MidHandshakeSslStream, Ssl, SslContextBuilder, SslMethod, SslStream,
};
use openssl::x509::{X509, X509VerifyResult};

use crate::cert;
use crate::error::{CertificateReason, Error, HandshakeReason, IoReason};
use crate::info::SessionInfo;
use crate::Result;

/// Observable lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Context allocated and bound to the transport; handshake not attempted
    Created,
    /// A certificate/key pair has been loaded; handshake not attempted
    CertificatesLoaded,
    /// Handshake started but blocked on the transport (non-blocking mode)
    HandshakeInProgress,
    /// Handshake complete; `send`/`recv` are valid
    Established,
    /// A fatal handshake or record-layer failure occurred; only `close` is
    /// valid
    Failed,
    /// Terminal state; all engine resources released
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "Created",
            SessionState::CertificatesLoaded => "CertificatesLoaded",
            SessionState::HandshakeInProgress => "HandshakeInProgress",
            SessionState::Established => "Established",
            SessionState::Failed => "Failed",
            SessionState::Closed => "Closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context and transport held until the handshake freezes the configuration.
///
/// The engine's context builder stays mutable here so certificates can be
/// loaded after `create`; it is built into an immutable context when the
/// handshake starts.
struct Pending<S> {
    ctx: SslContextBuilder,
    transport: S,
}

enum State<S> {
    Created(Pending<S>),
    CertificatesLoaded(Pending<S>),
    HandshakeInProgress(MidHandshakeSslStream<S>),
    Established(SslStream<S>),
    Failed,
    Closed,
}

/// One client TLS session over one transport
///
/// The transport is any `Read + Write` byte stream that is already
/// connected. Pass `&mut stream` to keep ownership on the caller side: the
/// session then borrows the transport and releasing the session (via
/// [`close`](Session::close) or drop) ends the borrow without closing the
/// underlying stream.
///
/// A session is single-owner. Concurrent `send`/`recv`/`close` from
/// multiple threads requires external serialization by the caller.
pub struct Session<S: Read + Write> {
    state: State<S>,
}

impl<S: Read + Write> Session<S> {
    /// Create a session bound to an already-connected transport.
    ///
    /// The context uses a fixed client-method policy; the protocol version
    /// is negotiated by the engine. Fails with `Error::Allocation` or
    /// `Error::Context` if the engine cannot construct the context; no
    /// partial resources survive a failed attempt.
    pub fn create(transport: S) -> Result<Self> {
        let ctx = SslContextBuilder::new(SslMethod::tls_client()).map_err(Error::engine)?;

        Ok(Session {
            state: State::Created(Pending { ctx, transport }),
        })
    }

    /// Observable lifecycle state.
    pub fn state(&self) -> SessionState {
        match &self.state {
            State::Created(_) => SessionState::Created,
            State::CertificatesLoaded(_) => SessionState::CertificatesLoaded,
            State::HandshakeInProgress(_) => SessionState::HandshakeInProgress,
            State::Established(_) => SessionState::Established,
            State::Failed => SessionState::Failed,
            State::Closed => SessionState::Closed,
        }
    }

    /// The borrowed transport, while the session still holds one.
    pub fn transport(&self) -> Option<&S> {
        match &self.state {
            State::Created(p) | State::CertificatesLoaded(p) => Some(&p.transport),
            State::HandshakeInProgress(mid) => Some(mid.get_ref()),
            State::Established(stream) => Some(stream.get_ref()),
            State::Failed | State::Closed => None,
        }
    }

    /// Negotiated parameters, once the session is established.
    pub fn info(&self) -> Option<SessionInfo> {
        match &self.state {
            State::Established(stream) => Some(SessionInfo::from_ssl(stream.ssl())),
            _ => None,
        }
    }

    /// Load a PEM certificate chain and matching PEM private key.
    ///
    /// Valid only in `Created`, before the handshake is attempted. On any
    /// certificate error the session remains in `Created` and the call can
    /// be retried with corrected files.
    pub fn load_certificates(
        &mut self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<()> {
        if !matches!(self.state, State::Created(_)) {
            return Err(self.precondition(SessionState::Created));
        }

        let (leaf, extra) = cert::read_cert_chain(cert_path.as_ref())?;
        let key = cert::read_private_key(key_path.as_ref())?;

        let State::Created(mut pending) = mem::replace(&mut self.state, State::Closed) else {
            unreachable!("state checked above");
        };

        match install_credentials(&mut pending.ctx, leaf, extra, &key) {
            Ok(()) => {
                trace!("certificate chain and key loaded");
                self.state = State::CertificatesLoaded(pending);
                Ok(())
            }
            Err(err) => {
                self.state = State::Created(pending);
                Err(err)
            }
        }
    }

    /// Drive the handshake to completion over the bound transport.
    ///
    /// Valid from `Created` and `CertificatesLoaded`, and again from
    /// `HandshakeInProgress` after a `WouldBlock` on a non-blocking
    /// transport. Blocking transports block here until the negotiation
    /// finishes; bound the wait with transport-level timeouts if needed.
    ///
    /// Fatal failures (`ProtocolViolation`, `CertificateVerifyFailed`,
    /// `TransportClosed`, `Unknown`) leave the session in `Failed`: no
    /// further I/O is possible and the caller must still `close`.
    pub fn handshake(&mut self) -> Result<()> {
        match self.state {
            State::Created(_) | State::CertificatesLoaded(_) | State::HandshakeInProgress(_) => {}
            _ => return Err(self.precondition(SessionState::Created)),
        }

        let attempt = match mem::replace(&mut self.state, State::Failed) {
            State::Created(pending) | State::CertificatesLoaded(pending) => {
                let ctx = pending.ctx.build();
                let ssl = Ssl::new(&ctx).map_err(Error::engine)?;
                ssl.connect(pending.transport)
            }
            State::HandshakeInProgress(mid) => mid.handshake(),
            _ => unreachable!("state checked above"),
        };

        match attempt {
            Ok(stream) => {
                debug!(
                    "handshake complete: {} {}",
                    stream.ssl().version_str(),
                    stream
                        .ssl()
                        .current_cipher()
                        .map(|c| c.name())
                        .unwrap_or("<undef>")
                );
                self.state = State::Established(stream);
                Ok(())
            }
            Err(HandshakeError::WouldBlock(mid)) => {
                self.state = State::HandshakeInProgress(mid);
                Err(Error::Handshake {
                    reason: HandshakeReason::WouldBlock,
                })
            }
            Err(HandshakeError::Failure(mid)) => {
                let reason = classify_handshake_failure(&mid);
                debug!("handshake failed ({}): {}", reason, mid.error());
                Err(Error::Handshake { reason })
            }
            Err(HandshakeError::SetupFailure(stack)) => Err(Error::engine(stack)),
        }
    }

    /// Write encrypted bytes to the peer.
    ///
    /// Valid only in `Established`. May write fewer bytes than requested;
    /// loop until everything is sent. An empty input is a no-op returning
    /// 0 without touching the engine.
    pub fn send(&mut self, buf: &[u8]) -> Result<usize> {
        let actual = self.state();
        let stream = match &mut self.state {
            State::Established(stream) => stream,
            _ => {
                return Err(Error::StatePrecondition {
                    expected: SessionState::Established,
                    actual,
                })
            }
        };

        if buf.is_empty() {
            return Ok(0);
        }

        match stream.ssl_write(buf) {
            Ok(n) => Ok(n),
            Err(err) => {
                let (reason, fatal) = classify_io_failure(&err);
                if fatal {
                    self.state = State::Failed;
                }
                Err(Error::Send { reason })
            }
        }
    }

    /// Read decrypted bytes from the peer.
    ///
    /// Valid only in `Established`. Returns `Ok(0)` when the peer performed
    /// a clean TLS shutdown (end of stream); an abrupt transport close
    /// without the shutdown notification is `Error::Recv` with
    /// `TransportClosed` instead.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let actual = self.state();
        let stream = match &mut self.state {
            State::Established(stream) => stream,
            _ => {
                return Err(Error::StatePrecondition {
                    expected: SessionState::Established,
                    actual,
                })
            }
        };

        match stream.ssl_read(buf) {
            Ok(n) => Ok(n),
            Err(err) if err.code() == ErrorCode::ZERO_RETURN => {
                trace!("peer sent close_notify");
                Ok(0)
            }
            Err(err) => {
                let (reason, fatal) = classify_io_failure(&err);
                if fatal {
                    self.state = State::Failed;
                }
                Err(Error::Recv { reason })
            }
        }
    }

    /// Release the protocol instance and context.
    ///
    /// Idempotent and infallible; valid from every state. Sends a
    /// best-effort shutdown notification to the peer when the handshake
    /// completed, swallowing any failure of the notification itself. Never
    /// closes the transport, which the session does not own.
    pub fn close(&mut self) {
        match mem::replace(&mut self.state, State::Closed) {
            State::Established(mut stream) => {
                if let Err(err) = stream.shutdown() {
                    trace!("shutdown notification not delivered: {}", err);
                }
            }
            _ => {
                // Handshake never completed: nothing to notify, resources
                // are released by dropping the replaced state.
            }
        }
    }

    fn precondition(&self, expected: SessionState) -> Error {
        Error::StatePrecondition {
            expected,
            actual: self.state(),
        }
    }
}

impl<S: Read + Write> Drop for Session<S> {
    fn drop(&mut self) {
        if let State::Established(stream) = &mut self.state {
            let _ = stream.shutdown();
        }
    }
}

/// Install a parsed chain and key into the context builder.
///
/// The mismatch check runs both in the engine's own key-install path and
/// explicitly afterwards, since OpenSSL only cross-checks at install time
/// when a certificate is already present.
fn install_credentials(
    ctx: &mut SslContextBuilder,
    leaf: X509,
    extra: Vec<X509>,
    key: &PKey<Private>,
) -> Result<()> {
    ctx.set_certificate(&leaf).map_err(|_| Error::Certificate {
        reason: CertificateReason::CertMalformed,
    })?;

    for cert in extra {
        ctx.add_extra_chain_cert(cert)
            .map_err(|_| Error::Certificate {
                reason: CertificateReason::CertMalformed,
            })?;
    }

    ctx.set_private_key(key)
        .map_err(|stack| Error::Certificate {
            reason: key_install_reason(&stack),
        })?;

    ctx.check_private_key().map_err(|_| Error::Certificate {
        reason: CertificateReason::KeyMismatch,
    })?;

    Ok(())
}

fn key_install_reason(stack: &ErrorStack) -> CertificateReason {
    let mismatch = stack
        .errors()
        .iter()
        .any(|e| e.reason().is_some_and(|r| r.contains("mismatch")));

    if mismatch {
        CertificateReason::KeyMismatch
    } else {
        CertificateReason::KeyMalformed
    }
}

/// OpenSSL 3 reports a missing close_notify as an SSL-level error rather
/// than a syscall EOF; both spell "the transport went away".
fn eof_in_stack(stack: Option<&ErrorStack>) -> bool {
    stack.is_some_and(|s| {
        s.errors()
            .iter()
            .any(|e| e.reason().is_some_and(|r| r.contains("unexpected eof")))
    })
}

fn classify_handshake_failure<S>(mid: &MidHandshakeSslStream<S>) -> HandshakeReason {
    if mid.ssl().verify_result() != X509VerifyResult::OK {
        return HandshakeReason::CertificateVerifyFailed;
    }

    let err = mid.error();
    match err.code() {
        ErrorCode::ZERO_RETURN => HandshakeReason::TransportClosed,
        ErrorCode::SYSCALL => match err.io_error() {
            None => HandshakeReason::TransportClosed,
            Some(io_err) => match io_err.kind() {
                io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => HandshakeReason::TransportClosed,
                _ => HandshakeReason::Unknown,
            },
        },
        ErrorCode::SSL => {
            if eof_in_stack(err.ssl_error()) {
                HandshakeReason::TransportClosed
            } else {
                HandshakeReason::ProtocolViolation
            }
        }
        _ => HandshakeReason::Unknown,
    }
}

fn classify_io_failure(err: &openssl::ssl::Error) -> (IoReason, bool) {
    match err.code() {
        ErrorCode::WANT_READ | ErrorCode::WANT_WRITE => (IoReason::WouldBlock, false),
        ErrorCode::ZERO_RETURN => (IoReason::TransportClosed, true),
        ErrorCode::SYSCALL => match err.io_error() {
            None => (IoReason::TransportClosed, true),
            Some(io_err) => match io_err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                    (IoReason::WouldBlock, false)
                }
                _ => (IoReason::TransportClosed, true),
            },
        },
        ErrorCode::SSL if eof_in_stack(err.ssl_error()) => (IoReason::TransportClosed, true),
        _ => (IoReason::ProtocolError, true),
    }
}
