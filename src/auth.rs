//! Trust evaluation and credentials.
//!
//! The engine does not implement PKI policy. It hands the peer chain to a
//! [`TrustEvaluator`] and asks a [`CredentialProvider`] for its own
//! certificates, keys and pre-shared keys. Either may defer the answer, which
//! suspends the handshake until the application resolves it through
//! [`Tls::resolve_trust`](crate::Tls::resolve_trust) or
//! [`Tls::provide_client_credential`](crate::Tls::provide_client_credential).

use std::fmt;

use crate::certificate::{fingerprint, Fingerprint};
use crate::crypto::Secret;
use crate::types::{ClientCertificateType, SignatureAndHashAlgorithm};

/// Outcome of evaluating a peer certificate chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustDecision {
    Trusted,
    Rejected(String),
    /// Answer later through [`Tls::resolve_trust`](crate::Tls::resolve_trust).
    Deferred,
}

/// Decides whether a peer certificate chain is acceptable.
pub trait TrustEvaluator: Send + Sync + fmt::Debug {
    /// `chain` is leaf first, DER encoded. `peer_name` is the server name
    /// the client asked for, if any.
    fn evaluate(&self, chain: &[Vec<u8>], peer_name: Option<&str>) -> TrustDecision;
}

/// Trusts chains whose leaf certificate has one of a set of SHA-256
/// fingerprints.
#[derive(Debug, Clone, Default)]
pub struct PinnedCertificates {
    pins: Vec<Fingerprint>,
}

impl PinnedCertificates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_certificate(mut self, cert_der: &[u8]) -> Self {
        self.pins.push(fingerprint(cert_der));
        self
    }

    pub fn with_fingerprint(mut self, fp: Fingerprint) -> Self {
        self.pins.push(fp);
        self
    }
}

impl TrustEvaluator for PinnedCertificates {
    fn evaluate(&self, chain: &[Vec<u8>], _peer_name: Option<&str>) -> TrustDecision {
        let Some(leaf) = chain.first() else {
            return TrustDecision::Rejected("Empty certificate chain".into());
        };
        if self.pins.contains(&fingerprint(leaf)) {
            TrustDecision::Trusted
        } else {
            TrustDecision::Rejected("Certificate not pinned".into())
        }
    }
}

/// Defers every decision to the application.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferredTrust;

impl TrustEvaluator for DeferredTrust {
    fn evaluate(&self, _chain: &[Vec<u8>], _peer_name: Option<&str>) -> TrustDecision {
        TrustDecision::Deferred
    }
}

/// A certificate chain with the private key of its leaf.
#[derive(Clone)]
pub struct Credential {
    /// DER certificates, leaf first.
    pub certificate_chain: Vec<Vec<u8>>,
    /// PKCS#8, PKCS#1 or SEC1 DER (or PEM) private key.
    pub private_key: Vec<u8>,
}

impl Credential {
    pub fn new(certificate: Vec<u8>, private_key: Vec<u8>) -> Self {
        Credential {
            certificate_chain: vec![certificate],
            private_key,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("certificates", &self.certificate_chain.len())
            .finish()
    }
}

/// What the server asked for in CertificateRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCertificateRequest {
    pub certificate_types: Vec<ClientCertificateType>,
    /// Empty before TLS 1.2.
    pub signature_algorithms: Vec<SignatureAndHashAlgorithm>,
    /// DER distinguished names of acceptable CAs.
    pub authorities: Vec<Vec<u8>>,
}

/// Answer to a client credential request.
#[derive(Debug, Clone)]
pub enum CredentialResult {
    /// `None` continues without a client certificate.
    Ready(Option<Credential>),
    /// Answer later through
    /// [`Tls::provide_client_credential`](crate::Tls::provide_client_credential).
    Deferred,
}

/// Source of local credentials.
///
/// All methods default to having nothing.
pub trait CredentialProvider: Send + Sync + fmt::Debug {
    /// Server certificate and key, selected by the SNI name.
    fn server_credential(&self, _server_name: Option<&str>) -> Option<Credential> {
        None
    }

    /// Client certificate in response to a CertificateRequest.
    fn client_credential(&self, _request: &ClientCertificateRequest) -> CredentialResult {
        CredentialResult::Ready(None)
    }

    /// Client side PSK identity and key, given the server hint.
    fn psk_identity(&self, _hint: Option<&[u8]>) -> Option<(Vec<u8>, Secret)> {
        None
    }

    /// Server side PSK lookup.
    fn psk_for_identity(&self, _identity: &[u8]) -> Option<Secret> {
        None
    }
}

/// Credentials fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    server: Option<Credential>,
    client: Option<Credential>,
    psks: Vec<(Vec<u8>, Secret)>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, credential: Credential) -> Self {
        self.server = Some(credential);
        self
    }

    pub fn with_client(mut self, credential: Credential) -> Self {
        self.client = Some(credential);
        self
    }

    /// Add a PSK. The first one added is what a client uses.
    pub fn with_psk(mut self, identity: &[u8], key: &[u8]) -> Self {
        self.psks.push((identity.to_vec(), Secret::from_slice(key)));
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn server_credential(&self, _server_name: Option<&str>) -> Option<Credential> {
        self.server.clone()
    }

    fn client_credential(&self, _request: &ClientCertificateRequest) -> CredentialResult {
        CredentialResult::Ready(self.client.clone())
    }

    fn psk_identity(&self, _hint: Option<&[u8]>) -> Option<(Vec<u8>, Secret)> {
        self.psks.first().cloned()
    }

    fn psk_for_identity(&self, identity: &[u8]) -> Option<Secret> {
        self.psks
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(_, key)| key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_trusts_only_pinned_leaf() {
        let trust = PinnedCertificates::new().with_certificate(b"cert-a");
        assert_eq!(
            trust.evaluate(&[b"cert-a".to_vec()], None),
            TrustDecision::Trusted
        );
        assert!(matches!(
            trust.evaluate(&[b"cert-b".to_vec()], None),
            TrustDecision::Rejected(_)
        ));
        assert!(matches!(trust.evaluate(&[], None), TrustDecision::Rejected(_)));
    }

    #[test]
    fn static_psk_lookup() {
        let creds = StaticCredentials::new()
            .with_psk(b"alice", b"k1")
            .with_psk(b"bob", b"k2");
        assert_eq!(&*creds.psk_for_identity(b"bob").unwrap(), b"k2");
        assert!(creds.psk_for_identity(b"eve").is_none());
        let (id, _) = creds.psk_identity(None).unwrap();
        assert_eq!(id, b"alice");
    }
}
