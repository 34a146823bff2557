//! Ephemeral leaf certificate minting for the MITM proxy, built from
//! `rcgen` + `rustls` + `tokio-rustls` and layered under the connection
//! accept loop's per-connection TLS handshake.

use rand::RngCore;
use rcgen::{CertificateParams, DistinguishedName, DnType, Issuer, KeyPair};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

/// Validity window for minted leaf certificates: backdated one day,
/// valid roughly 240 hours from there.
const LEAF_BACKDATE: Duration = Duration::days(1);
const LEAF_VALIDITY_HOURS: i64 = 240;

#[derive(Debug, Error)]
pub enum CertError {
    #[error("certificate generation failed: {0}")]
    Rcgen(#[from] rcgen::Error),
    #[error("invalid PEM material: {0}")]
    Pem(String),
}

/// The proxy's local certificate authority, loaded once at startup. Its key
/// and certificate are read-only after that.
pub struct CertificateAuthority {
    ca_cert_der: rcgen::CertifiedKey,
}

impl CertificateAuthority {
    /// Loads a CA from PEM-encoded certificate and private key bytes.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self, CertError> {
        let key_pair = KeyPair::from_pem(key_pem).map_err(|e| CertError::Pem(e.to_string()))?;
        let params = CertificateParams::from_ca_cert_pem(cert_pem).map_err(|e| CertError::Pem(e.to_string()))?;
        let cert = params.self_signed(&key_pair)?;
        Ok(CertificateAuthority {
            ca_cert_der: rcgen::CertifiedKey { cert, key_pair },
        })
    }

    /// Generates a fresh, self-signed CA — useful for tests and local
    /// development environments that have not provisioned a real CA.
    pub fn generate_ephemeral() -> Result<Self, CertError> {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
        let mut params = CertificateParams::new(Vec::<String>::new())?;
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "catalog-cache MITM local CA");
        params.distinguished_name = dn;
        let cert = params.self_signed(&key_pair)?;
        Ok(CertificateAuthority {
            ca_cert_der: rcgen::CertifiedKey { cert, key_pair },
        })
    }

    /// Mints an ephemeral leaf certificate for `host`, signed by this CA.
    /// P-256 key, random 128-bit serial, `NotBefore` backdated one day to
    /// tolerate clock skew on the peer.
    pub fn issue_leaf(&self, host: &str) -> Result<LeafCertificate, CertError> {
        let leaf_key = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
        let mut params = CertificateParams::new(vec![host.to_string()])?;

        let mut serial_bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut serial_bytes);
        params.serial_number = Some(rcgen::SerialNumber::from_slice(&serial_bytes));

        let not_before = OffsetDateTime::now_utc() - LEAF_BACKDATE;
        params.not_before = not_before;
        params.not_after = not_before + Duration::hours(LEAF_VALIDITY_HOURS);

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, host);
        params.distinguished_name = dn;

        let issuer = Issuer::from_ca_cert_der(self.ca_cert_der.cert.der(), self.ca_cert_der.key_pair.clone())?;
        let cert = params.signed_by(&leaf_key, &issuer)?;

        Ok(LeafCertificate {
            cert_der: cert.der().to_vec(),
            key_der: leaf_key.serialize_der(),
        })
    }
}

/// A minted leaf certificate, DER-encoded and ready for `rustls`.
pub struct LeafCertificate {
    pub cert_der: Vec<u8>,
    pub key_der: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_leaf_with_expected_validity_window() {
        let ca = CertificateAuthority::generate_ephemeral().unwrap();
        let leaf = ca.issue_leaf("catalog.example.org").unwrap();
        assert!(!leaf.cert_der.is_empty());
        assert!(!leaf.key_der.is_empty());
    }

    #[test]
    fn distinct_hosts_get_distinct_certs() {
        let ca = CertificateAuthority::generate_ephemeral().unwrap();
        let a = ca.issue_leaf("a.example.org").unwrap();
        let b = ca.issue_leaf("b.example.org").unwrap();
        assert_ne!(a.cert_der, b.cert_der);
    }
}
