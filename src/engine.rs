//! Process-wide engine bootstrap
//!
//! OpenSSL keeps process-wide state (algorithm registrations, error-string
//! tables) that must be ready before the first session is created. Callers
//! are responsible for ordering: `initialize` once before any session,
//! `shutdown` at most once per `initialize`, after every session has been
//! closed. Session operations do not re-check this at runtime; the contract
//! is a documented precondition so the I/O path stays allocation-free.

use std::sync::atomic::{AtomicBool, Ordering};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize the engine's process-wide state.
///
/// Safe to call more than once; the underlying registration runs a single
/// time. OpenSSL 1.1+ cannot fail this registration, so no error is
/// surfaced.
pub fn initialize() {
    openssl::init();
    INITIALIZED.store(true, Ordering::Release);
}

/// Mark the engine's process-wide state as released.
///
/// OpenSSL 1.1+ releases its tables automatically at process exit, so this
/// is an ordering marker rather than a resource release. Creating sessions
/// after `shutdown` is undefined; call it only once all sessions are closed.
pub fn shutdown() {
    INITIALIZED.store(false, Ordering::Release);
}

/// Whether `initialize` has been called and not yet `shutdown`.
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}
