use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CredentialProvider, TrustEvaluator};
use crate::crypto::CryptoProvider;
use crate::session::SessionCache;
use crate::suite::CipherSuite;
use crate::types::{NamedGroup, ProtocolVersion, SignatureAndHashAlgorithm, Variant};
use crate::Error;

/// Smallest MTU a DTLS configuration accepts.
///
/// Leaves room for the record and handshake headers plus the largest
/// protection overhead with some body bytes in every fragment.
pub const MIN_MTU: usize = 128;

/// Whether a server asks for a client certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuth {
    /// No CertificateRequest is sent.
    #[default]
    None,
    /// CertificateRequest is sent, an empty answer is accepted.
    Optional,
    /// CertificateRequest is sent, an empty answer fails the handshake.
    Required,
}

/// TLS/DTLS configuration
///
/// Shared read-only between connections through an `Arc<Config>`.
#[derive(Clone)]
pub struct Config {
    variant: Variant,
    min_version: ProtocolVersion,
    max_version: ProtocolVersion,
    cipher_suites: Vec<CipherSuite>,
    groups: Vec<NamedGroup>,
    signature_algorithms: Vec<SignatureAndHashAlgorithm>,
    mtu: usize,
    max_queue_rx: usize,
    max_queue_tx: usize,
    flight_start_rto: Duration,
    flight_retries: usize,
    handshake_timeout: Duration,
    client_auth: ClientAuth,
    dtls_cookies: bool,
    extended_master_secret: bool,
    psk_identity_hint: Option<Vec<u8>>,
    rng_seed: Option<u64>,
    crypto_provider: CryptoProvider,
    trust_evaluator: Option<Arc<dyn TrustEvaluator>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    session_cache: Option<Arc<dyn SessionCache>>,
}

impl Config {
    /// Create a new configuration builder.
    ///
    /// Defaults to TLS over a byte stream, versions 1.0 to 1.2.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            variant: Variant::Tls,
            min_version: None,
            max_version: None,
            cipher_suites: CipherSuite::default_suites(),
            groups: NamedGroup::supported().to_vec(),
            signature_algorithms: SignatureAndHashAlgorithm::supported().to_vec(),
            mtu: 1150,
            max_queue_rx: 30,
            max_queue_tx: 10,
            flight_start_rto: Duration::from_secs(1),
            flight_retries: 4,
            handshake_timeout: Duration::from_secs(40),
            client_auth: ClientAuth::None,
            dtls_cookies: true,
            extended_master_secret: true,
            psk_identity_hint: None,
            rng_seed: None,
            crypto_provider: None,
            trust_evaluator: None,
            credentials: None,
            session_cache: None,
        }
    }

    /// TLS or DTLS.
    #[inline(always)]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    #[inline(always)]
    pub fn is_dtls(&self) -> bool {
        self.variant == Variant::Dtls
    }

    /// Lowest protocol version accepted.
    #[inline(always)]
    pub fn min_version(&self) -> ProtocolVersion {
        self.min_version
    }

    /// Highest protocol version offered.
    #[inline(always)]
    pub fn max_version(&self) -> ProtocolVersion {
        self.max_version
    }

    /// Enabled cipher suites in preference order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    /// ECDHE groups in preference order.
    #[inline(always)]
    pub fn groups(&self) -> &[NamedGroup] {
        &self.groups
    }

    /// Signature algorithms offered and accepted in TLS 1.2.
    #[inline(always)]
    pub fn signature_algorithms(&self) -> &[SignatureAndHashAlgorithm] {
        &self.signature_algorithms
    }

    /// Max transmission unit.
    ///
    /// The largest size UDP packets we will produce. Only used for DTLS.
    #[inline(always)]
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Max amount of incoming records to buffer before rejecting more input.
    #[inline(always)]
    pub fn max_queue_rx(&self) -> usize {
        self.max_queue_rx
    }

    /// Max amount of outgoing packets to buffer.
    #[inline(always)]
    pub fn max_queue_tx(&self) -> usize {
        self.max_queue_tx
    }

    /// Time of first retry.
    ///
    /// Every flight restarts with this value.
    /// Doubled for every retry with a ±25% jitter.
    #[inline(always)]
    pub fn flight_start_rto(&self) -> Duration {
        self.flight_start_rto
    }

    /// Max number of retries per flight.
    #[inline(always)]
    pub fn flight_retries(&self) -> usize {
        self.flight_retries
    }

    /// Timeout for the entire DTLS handshake, regardless of flights.
    #[inline(always)]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// For a server, whether to ask for a client certificate.
    #[inline(always)]
    pub fn client_auth(&self) -> ClientAuth {
        self.client_auth
    }

    /// For a DTLS server, whether to answer a ClientHello without a valid
    /// cookie with a HelloVerifyRequest.
    #[inline(always)]
    pub fn dtls_cookies(&self) -> bool {
        self.dtls_cookies
    }

    /// Whether to negotiate the Extended Master Secret extension (rfc7627).
    #[inline(always)]
    pub fn extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }

    /// Identity hint a PSK server sends in ServerKeyExchange.
    #[inline(always)]
    pub fn psk_identity_hint(&self) -> Option<&[u8]> {
        self.psk_identity_hint.as_deref()
    }

    /// Seed for deterministic randomness. Tests only.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }

    /// Cryptographic provider.
    ///
    /// Provides all cryptographic operations (ciphers, key exchange, signing, etc.).
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Decides on peer certificate chains. Without one every chain is
    /// handed to the application through a suspension.
    #[inline(always)]
    pub fn trust_evaluator(&self) -> Option<&dyn TrustEvaluator> {
        self.trust_evaluator.as_deref()
    }

    /// Local certificates, keys and PSKs.
    #[inline(always)]
    pub fn credentials(&self) -> Option<&dyn CredentialProvider> {
        self.credentials.as_deref()
    }

    /// Server side session cache for resumption.
    #[inline(always)]
    pub fn session_cache(&self) -> Option<&dyn SessionCache> {
        self.session_cache.as_deref()
    }

    /// Enabled suites negotiable at `version`.
    pub(crate) fn suites_for(&self, version: ProtocolVersion) -> impl Iterator<Item = CipherSuite> + '_ {
        self.cipher_suites
            .iter()
            .copied()
            .filter(move |s| s.supports(version))
    }

    /// Configured versions, newest first.
    pub(crate) fn versions(&self) -> impl Iterator<Item = ProtocolVersion> + '_ {
        ProtocolVersion::supported(self.variant).iter().copied().filter(|v| {
            v.rank() >= self.min_version.rank() && v.rank() <= self.max_version.rank()
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("variant", &self.variant)
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("cipher_suites", &self.cipher_suites)
            .field("mtu", &self.mtu)
            .field("client_auth", &self.client_auth)
            .field("extended_master_secret", &self.extended_master_secret)
            .finish_non_exhaustive()
    }
}

/// Builder for TLS/DTLS configuration.
pub struct ConfigBuilder {
    variant: Variant,
    min_version: Option<ProtocolVersion>,
    max_version: Option<ProtocolVersion>,
    cipher_suites: Vec<CipherSuite>,
    groups: Vec<NamedGroup>,
    signature_algorithms: Vec<SignatureAndHashAlgorithm>,
    mtu: usize,
    max_queue_rx: usize,
    max_queue_tx: usize,
    flight_start_rto: Duration,
    flight_retries: usize,
    handshake_timeout: Duration,
    client_auth: ClientAuth,
    dtls_cookies: bool,
    extended_master_secret: bool,
    psk_identity_hint: Option<Vec<u8>>,
    rng_seed: Option<u64>,
    crypto_provider: Option<CryptoProvider>,
    trust_evaluator: Option<Arc<dyn TrustEvaluator>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    session_cache: Option<Arc<dyn SessionCache>>,
}

impl ConfigBuilder {
    /// Run over datagrams (DTLS) instead of a byte stream.
    ///
    /// The version range defaults to DTLS 1.0 to 1.2.
    pub fn dtls(mut self) -> Self {
        self.variant = Variant::Dtls;
        self
    }

    /// Set the accepted protocol versions.
    ///
    /// Both must belong to the configured variant.
    pub fn versions(mut self, min: ProtocolVersion, max: ProtocolVersion) -> Self {
        self.min_version = Some(min);
        self.max_version = Some(max);
        self
    }

    /// Set the enabled cipher suites, in preference order.
    ///
    /// Defaults to every suite except export, PSK and static ECDH.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    /// Set the ECDHE groups, in preference order.
    pub fn groups(mut self, groups: &[NamedGroup]) -> Self {
        self.groups = groups.to_vec();
        self
    }

    /// Set the TLS 1.2 signature algorithms.
    pub fn signature_algorithms(mut self, algorithms: &[SignatureAndHashAlgorithm]) -> Self {
        self.signature_algorithms = algorithms.to_vec();
        self
    }

    /// Set the max transmission unit (MTU).
    ///
    /// The largest size UDP packets we will produce.
    /// Defaults to 1150.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the max amount of incoming records to buffer before rejecting more input.
    ///
    /// Defaults to 30.
    pub fn max_queue_rx(mut self, max_queue_rx: usize) -> Self {
        self.max_queue_rx = max_queue_rx;
        self
    }

    /// Set the max amount of outgoing packets to buffer.
    ///
    /// Defaults to 10.
    pub fn max_queue_tx(mut self, max_queue_tx: usize) -> Self {
        self.max_queue_tx = max_queue_tx;
        self
    }

    /// Set the time of first retry.
    ///
    /// Every flight restarts with this value.
    /// Doubled for every retry with a ±25% jitter.
    /// Defaults to 1 second.
    pub fn flight_start_rto(mut self, rto: Duration) -> Self {
        self.flight_start_rto = rto;
        self
    }

    /// Set the max number of retries per flight.
    ///
    /// Defaults to 4.
    pub fn flight_retries(mut self, retries: usize) -> Self {
        self.flight_retries = retries;
        self
    }

    /// Set the timeout for the entire DTLS handshake, regardless of flights.
    ///
    /// Defaults to 40 seconds.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set whether a server asks for a client certificate.
    ///
    /// Defaults to [`ClientAuth::None`].
    pub fn client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }

    /// Set whether a DTLS server demands a cookie exchange.
    ///
    /// Defaults to true.
    pub fn dtls_cookies(mut self, enabled: bool) -> Self {
        self.dtls_cookies = enabled;
        self
    }

    /// Set whether to enable Extended Master Secret extension (rfc7627)
    ///
    /// Defaults to true.
    pub fn extended_master_secret(mut self, enabled: bool) -> Self {
        self.extended_master_secret = enabled;
        self
    }

    /// Set the identity hint a PSK server sends.
    pub fn psk_identity_hint(mut self, hint: &[u8]) -> Self {
        self.psk_identity_hint = Some(hint.to_vec());
        self
    }

    /// Make all randomness deterministic. Never use outside tests.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Set a custom crypto provider.
    ///
    /// If not set, the provider installed with
    /// [`CryptoProvider::install_default`] is used, or else the built in
    /// RustCrypto provider.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    pub fn trust_evaluator(mut self, evaluator: Arc<dyn TrustEvaluator>) -> Self {
        self.trust_evaluator = Some(evaluator);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn session_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.session_cache = Some(cache);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigError` for a version range that is empty or
    /// outside the variant, when no enabled suite can be negotiated in the
    /// range, or for a DTLS MTU below [`MIN_MTU`].
    pub fn build(self) -> Result<Config, Error> {
        let supported = ProtocolVersion::supported(self.variant);
        let newest = supported[0];
        let oldest = supported[supported.len() - 1];
        let min_version = self.min_version.unwrap_or(oldest);
        let max_version = self.max_version.unwrap_or(newest);

        for v in [min_version, max_version] {
            if v.variant() != Some(self.variant) {
                return Err(Error::ConfigError(format!(
                    "{} is not a {:?} version",
                    v, self.variant
                )));
            }
        }
        if min_version.rank() > max_version.rank() {
            return Err(Error::ConfigError(format!(
                "Empty version range {} - {}",
                min_version, max_version
            )));
        }

        if self.cipher_suites.is_empty() {
            return Err(Error::ConfigError("No cipher suites".into()));
        }
        if let Some(s) = self
            .cipher_suites
            .iter()
            .find(|s| !CipherSuite::all().contains(*s))
        {
            return Err(Error::ConfigError(format!("Cannot enable {}", s)));
        }
        let usable = supported
            .iter()
            .filter(|v| v.rank() >= min_version.rank() && v.rank() <= max_version.rank())
            .any(|v| self.cipher_suites.iter().any(|s| s.supports(*v)));
        if !usable {
            return Err(Error::ConfigError(format!(
                "No enabled cipher suite usable with {} - {}",
                min_version, max_version
            )));
        }

        if self.signature_algorithms.is_empty() {
            return Err(Error::ConfigError("No signature algorithms".into()));
        }

        if self.variant == Variant::Dtls && self.mtu < MIN_MTU {
            return Err(Error::ConfigError(format!(
                "MTU {} below minimum {}",
                self.mtu, MIN_MTU
            )));
        }

        let crypto_provider = self
            .crypto_provider
            .unwrap_or_else(CryptoProvider::default_or_builtin);

        Ok(Config {
            variant: self.variant,
            min_version,
            max_version,
            cipher_suites: self.cipher_suites,
            groups: self.groups,
            signature_algorithms: self.signature_algorithms,
            mtu: self.mtu,
            max_queue_rx: self.max_queue_rx,
            max_queue_tx: self.max_queue_tx,
            flight_start_rto: self.flight_start_rto,
            flight_retries: self.flight_retries,
            handshake_timeout: self.handshake_timeout,
            client_auth: self.client_auth,
            dtls_cookies: self.dtls_cookies,
            extended_master_secret: self.extended_master_secret,
            psk_identity_hint: self.psk_identity_hint,
            rng_seed: self.rng_seed,
            crypto_provider,
            trust_evaluator: self.trust_evaluator,
            credentials: self.credentials,
            session_cache: self.session_cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_variant() {
        let tls = Config::builder().build().unwrap();
        assert_eq!(tls.min_version(), ProtocolVersion::TLS1_0);
        assert_eq!(tls.max_version(), ProtocolVersion::TLS1_2);

        let dtls = Config::builder().dtls().build().unwrap();
        assert_eq!(dtls.min_version(), ProtocolVersion::DTLS1_0);
        assert_eq!(dtls.max_version(), ProtocolVersion::DTLS1_2);
        assert_eq!(
            dtls.versions().collect::<Vec<_>>(),
            vec![ProtocolVersion::DTLS1_2, ProtocolVersion::DTLS1_0]
        );
    }

    #[test]
    fn mixed_variants_rejected() {
        let r = Config::builder()
            .dtls()
            .versions(ProtocolVersion::TLS1_0, ProtocolVersion::TLS1_2)
            .build();
        assert!(matches!(r, Err(Error::ConfigError(_))));
    }

    #[test]
    fn empty_range_rejected() {
        let r = Config::builder()
            .versions(ProtocolVersion::TLS1_2, ProtocolVersion::TLS1_0)
            .build();
        assert!(matches!(r, Err(Error::ConfigError(_))));
    }

    #[test]
    fn suites_must_fit_range() {
        assert!(Config::builder().cipher_suites(&[]).build().is_err());

        // GCM needs TLS 1.2.
        let r = Config::builder()
            .versions(ProtocolVersion::TLS1_0, ProtocolVersion::TLS1_1)
            .cipher_suites(&[CipherSuite::RSA_WITH_AES_128_GCM_SHA256])
            .build();
        assert!(matches!(r, Err(Error::ConfigError(_))));

        let r = Config::builder()
            .cipher_suites(&[CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV])
            .build();
        assert!(matches!(r, Err(Error::ConfigError(_))));
    }

    #[test]
    fn mtu_lower_bound() {
        assert!(Config::builder().dtls().mtu(MIN_MTU - 1).build().is_err());
        assert!(Config::builder().dtls().mtu(MIN_MTU).build().is_ok());
        // Ignored for TLS.
        assert!(Config::builder().mtu(10).build().is_ok());
    }
}
