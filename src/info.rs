//! Negotiated-session introspection
//!
//! Populated from the engine once the handshake completes.

use openssl::ssl::SslRef;

use crate::cert::{peer_chain, CertInfo};

/// Parameters negotiated for an established session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Negotiated protocol version (e.g. "TLSv1.3")
    pub version: String,
    /// Negotiated cipher suite
    pub cipher: String,
    /// Peer certificate chain, leaf first
    pub peer_chain: Vec<CertInfo>,
}

impl SessionInfo {
    pub(crate) fn from_ssl(ssl: &SslRef) -> Self {
        SessionInfo {
            version: ssl.version_str().to_string(),
            cipher: ssl
                .current_cipher()
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "<undef>".to_string()),
            peer_chain: peer_chain(ssl),
        }
    }

    /// The peer's leaf certificate, if one was presented.
    pub fn peer(&self) -> Option<&CertInfo> {
        self.peer_chain.first()
    }
}
