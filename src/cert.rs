//! Certificate loading and introspection
//!
//! PEM parsing is delegated to the engine; this module reads the files
//! itself so that unreadable and malformed inputs map to distinct error
//! reasons.

use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::SslRef;
use openssl::x509::{X509NameRef, X509Ref, X509};

use crate::error::{CertificateReason, Error};
use crate::Result;

/// Read a PEM certificate chain from disk. Returns the leaf and any extra
/// chain certificates in file order.
pub(crate) fn read_cert_chain(path: &Path) -> Result<(X509, Vec<X509>)> {
    let pem = fs::read(path).map_err(|_| Error::Certificate {
        reason: CertificateReason::CertUnreadable,
    })?;

    let mut certs = X509::stack_from_pem(&pem)
        .map_err(|_| Error::Certificate {
            reason: CertificateReason::CertMalformed,
        })?
        .into_iter();

    let leaf = certs.next().ok_or(Error::Certificate {
        reason: CertificateReason::CertMalformed,
    })?;

    Ok((leaf, certs.collect()))
}

/// Read a PEM private key from disk.
pub(crate) fn read_private_key(path: &Path) -> Result<PKey<Private>> {
    let pem = fs::read(path).map_err(|_| Error::Certificate {
        reason: CertificateReason::KeyUnreadable,
    })?;

    PKey::private_key_from_pem(&pem).map_err(|_| Error::Certificate {
        reason: CertificateReason::KeyMalformed,
    })
}

/// Summary of one X.509 certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Subject Common Name
    pub subject: String,
    /// Issuer Common Name
    pub issuer: String,
    /// Subject Alternative Names (DNS names and IP addresses)
    pub subject_alt_names: Vec<String>,
}

impl CertInfo {
    /// Extract a summary from an X.509 certificate.
    pub fn from_x509(cert: &X509Ref) -> Self {
        CertInfo {
            subject: common_name(cert.subject_name()),
            issuer: common_name(cert.issuer_name()),
            subject_alt_names: alt_names(cert),
        }
    }
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|cn| cn.to_string())
        .unwrap_or_else(|| "<undef>".to_string())
}

fn alt_names(cert: &X509Ref) -> Vec<String> {
    let Some(sans) = cert.subject_alt_names() else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for san in sans {
        if let Some(dns) = san.dnsname() {
            names.push(format!("DNS:{}", dns));
        } else if let Some(ip) = san.ipaddress() {
            if let Ok(octets) = <[u8; 4]>::try_from(ip) {
                names.push(format!("IP:{}", Ipv4Addr::from(octets)));
            } else if let Ok(octets) = <[u8; 16]>::try_from(ip) {
                names.push(format!("IP:{}", Ipv6Addr::from(octets)));
            }
        }
    }
    names
}

/// Collect the peer's certificate chain from an established connection,
/// leaf first. Empty if the peer presented no certificate.
pub(crate) fn peer_chain(ssl: &SslRef) -> Vec<CertInfo> {
    if let Some(chain) = ssl.peer_cert_chain() {
        chain.iter().map(CertInfo::from_x509).collect()
    } else if let Some(peer) = ssl.peer_certificate() {
        vec![CertInfo::from_x509(&peer)]
    } else {
        Vec::new()
    }
}
