//! Certificate generation and fingerprint utilities.
//!
//! Helpers to generate self-signed ECDSA certificates, usable as server or
//! client credentials, and to compute and format SHA-256 fingerprints for
//! pinning.

use std::fmt;

use rcgen::{
    Certificate as RcgenCertificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256,
};
use sha2::{Digest, Sha256};

use crate::auth::Credential;
use crate::Error;

/// Certificate and private key pair
#[derive(Clone)]
pub struct SelfSignedCertificate {
    /// Certificate in DER format
    pub certificate: Vec<u8>,
    /// PKCS#8 private key in DER format
    pub private_key: Vec<u8>,
}

/// Generate a self-signed P-256 certificate for `subject`, also used as the
/// only subject alternative name.
pub fn generate_self_signed(subject: &str) -> Result<SelfSignedCertificate, Error> {
    let failed = |e: rcgen::RcgenError| Error::CertificateError(format!("Generation failed: {}", e));

    let key_pair = KeyPair::generate(&PKCS_ECDSA_P256_SHA256).map_err(failed)?;

    let mut params = CertificateParams::new(vec![subject.to_string()]);

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, subject.to_string());
    params.distinguished_name = distinguished_name;

    params.is_ca = IsCa::NoCa;
    params.key_pair = Some(key_pair);

    // Valid from yesterday for a year, tolerating some clock skew.
    let now = time::OffsetDateTime::now_utc();
    params.not_before = now - time::Duration::days(1);
    params.not_after = now + time::Duration::days(365);

    let cert = RcgenCertificate::from_params(params).map_err(failed)?;
    let cert_der = cert.serialize_der().map_err(failed)?;
    let key_der = cert.serialize_private_key_der();

    Ok(SelfSignedCertificate {
        certificate: cert_der,
        private_key: key_der,
    })
}

impl SelfSignedCertificate {
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.certificate)
    }

    pub fn to_credential(&self) -> Credential {
        Credential::new(self.certificate.clone(), self.private_key.clone())
    }
}

impl fmt::Debug for SelfSignedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfSignedCertificate")
            .field("certificate", &self.certificate.len())
            .field("private_key", &self.private_key.len())
            .finish()
    }
}

/// SHA-256 of a DER certificate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

/// Calculate a certificate fingerprint using SHA-256
pub fn fingerprint(cert_der: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(cert_der);
    Fingerprint(hasher.finalize().into())
}

/// Formats as colon-separated uppercase hex, for example "AF:12:F6:...".
impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_signed_certificate() {
        let cert = generate_self_signed("localhost").unwrap();
        assert!(!cert.certificate.is_empty());
        assert!(!cert.private_key.is_empty());
        assert_eq!(cert.fingerprint(), fingerprint(&cert.certificate));
    }

    #[test]
    fn fingerprint_formatting() {
        let mut fp = [0u8; 32];
        fp[..5].copy_from_slice(&[0xAF, 0x12, 0xF6, 0x38, 0x2A]);
        let formatted = Fingerprint(fp).to_string();
        assert!(formatted.starts_with("AF:12:F6:38:2A:00"));

        // 32 hex pairs with ':' between them
        assert_eq!(formatted.len(), 95);
        for segment in formatted.split(':') {
            assert_eq!(segment.len(), 2);
            assert!(u8::from_str_radix(segment, 16).is_ok());
        }
    }
}
