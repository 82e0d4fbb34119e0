//! Key exchange handlers.
//!
//! Each handler establishes the premaster secret for one family of cipher
//! suites. The handshake drives them through the same five steps, on
//! whichever side applies:
//!
//! ```text
//! server                                  client
//! encode_server_params  ---SKE-->  decode_and_verify_server_params
//! decode_client_params  <--CKE---  encode_client_params
//! compute_premaster_secret                compute_premaster_secret
//! ```
//!
//! A handler without a ServerKeyExchange (RSA, static ECDH, PSK without a
//! hint) reports it through [`KeyExchange::sends_server_params`].

use crate::auth::CredentialProvider;
use crate::buffer::Buf;
use crate::crypto::{CryptoProvider, PrivateKey, Secret};
use crate::message::DigitallySigned;
use crate::suite::{CipherSuite, KeyExchangeAlgorithm};
use crate::types::{NamedGroup, ProtocolVersion, SignatureAlgorithm, SignatureAndHashAlgorithm};
use crate::{Error, SeededRng};

mod dhe;
mod ecdh;
mod ecdhe;
mod psk;
mod rsa;
pub mod signature;

pub use dhe::DheKx;
pub use ecdh::EcdhStaticKx;
pub use ecdhe::{select_group, EcdheKx};
pub use psk::PskKx;
pub use rsa::RsaKx;

/// Everything a handler may need from the handshake.
pub struct KxContext<'a> {
    pub provider: &'a CryptoProvider,
    pub rng: &'a mut SeededRng,
    /// Negotiated version.
    pub version: ProtocolVersion,
    /// Highest version in ClientHello, bound into the RSA premaster.
    pub client_version: ProtocolVersion,
    pub client_random: [u8; 32],
    pub server_random: [u8; 32],
    /// Server leaf certificate. Client side.
    pub server_certificate: Option<&'a [u8]>,
    /// Key of our own certificate. Server side.
    pub private_key: Option<&'a dyn PrivateKey>,
    /// signature_algorithms offered by the client. Server side.
    pub peer_signature_algorithms: Option<&'a [SignatureAndHashAlgorithm]>,
    /// Signature algorithms we accept.
    pub signature_algorithms: &'a [SignatureAndHashAlgorithm],
    /// Groups we accept.
    pub groups: &'a [NamedGroup],
    pub credentials: Option<&'a dyn CredentialProvider>,
}

impl<'a> KxContext<'a> {
    fn server_certificate(&self) -> Result<&'a [u8], Error> {
        self.server_certificate
            .ok_or_else(|| Error::CertificateError("No server certificate".into()))
    }

    fn private_key(&self) -> Result<&'a dyn PrivateKey, Error> {
        self.private_key
            .ok_or_else(|| Error::ConfigError("No private key for key exchange".into()))
    }

    /// Sign `client_random || server_random || params` and append the
    /// DigitallySigned.
    fn sign_params(&mut self, params: &[u8], output: &mut Buf) -> Result<(), Error> {
        let key = self.private_key()?;
        let (algorithm, hash) = signature::select_scheme(
            self.version,
            key.algorithm(),
            self.peer_signature_algorithms,
            self.signature_algorithms,
        )?;
        let digest = signature::digest(
            self.provider.hash_provider,
            hash,
            &[&self.client_random, &self.server_random, params],
        )?;
        signature::sign_into(key, algorithm, hash, &digest, output)
    }

    /// Verify the server signature over the params.
    fn verify_params(
        &self,
        key: SignatureAlgorithm,
        params: &[u8],
        signed: Option<&DigitallySigned>,
    ) -> Result<(), Error> {
        let Some(signed) = signed else {
            return Err(Error::DecodeError("Missing ServerKeyExchange signature".into()));
        };
        let cert = self.server_certificate()?;
        let hash =
            signature::accept_scheme(self.version, key, signed.algorithm, self.signature_algorithms)?;
        let digest = signature::digest(
            self.provider.hash_provider,
            hash,
            &[&self.client_random, &self.server_random, params],
        )?;
        signature::verify(self.provider.public_keys, cert, hash, &digest, signed.signature)
    }
}

/// Key exchange for the negotiated suite.
#[derive(Debug)]
pub enum KeyExchange {
    Rsa(RsaKx),
    Dhe(DheKx),
    Ecdhe(EcdheKx),
    EcdhStatic(EcdhStaticKx),
    Psk(PskKx),
}

impl KeyExchange {
    /// Handler for `suite`.
    ///
    /// `ecdhe_group` is the group a server selected for ECDHE, `psk_hint`
    /// the identity hint a PSK server sends.
    pub fn for_suite(
        suite: CipherSuite,
        ecdhe_group: Option<NamedGroup>,
        psk_hint: Option<&[u8]>,
    ) -> Result<Self, Error> {
        use KeyExchangeAlgorithm::*;
        let kx = match suite.key_exchange() {
            Rsa | RsaExport => KeyExchange::Rsa(RsaKx::new()),
            DheRsa => KeyExchange::Dhe(DheKx::new()),
            EcdheRsa => KeyExchange::Ecdhe(EcdheKx::new(SignatureAlgorithm::RSA, ecdhe_group)),
            EcdheEcdsa => KeyExchange::Ecdhe(EcdheKx::new(SignatureAlgorithm::ECDSA, ecdhe_group)),
            EcdhEcdsa | EcdhRsa => KeyExchange::EcdhStatic(EcdhStaticKx::new()),
            Psk => KeyExchange::Psk(PskKx::new(psk_hint)),
            Null => {
                return Err(Error::NegotiationError(format!(
                    "No key exchange for {}",
                    suite
                )))
            }
        };
        Ok(kx)
    }

    /// Whether the server sends a ServerKeyExchange.
    pub fn sends_server_params(&self) -> bool {
        match self {
            KeyExchange::Rsa(_) | KeyExchange::EcdhStatic(_) => false,
            KeyExchange::Dhe(_) | KeyExchange::Ecdhe(_) => true,
            KeyExchange::Psk(p) => p.has_hint(),
        }
    }

    /// Server: write the ServerKeyExchange body.
    pub fn encode_server_params(
        &mut self,
        ctx: &mut KxContext,
        output: &mut Buf,
    ) -> Result<(), Error> {
        match self {
            KeyExchange::Dhe(k) => k.encode_server_params(ctx, output),
            KeyExchange::Ecdhe(k) => k.encode_server_params(ctx, output),
            KeyExchange::Psk(k) => k.encode_server_params(output),
            KeyExchange::Rsa(_) | KeyExchange::EcdhStatic(_) => Err(no_server_params()),
        }
    }

    /// Client: parse and verify a ServerKeyExchange body.
    pub fn decode_and_verify_server_params(
        &mut self,
        ctx: &mut KxContext,
        body: &[u8],
    ) -> Result<(), Error> {
        match self {
            KeyExchange::Dhe(k) => k.decode_and_verify_server_params(ctx, body),
            KeyExchange::Ecdhe(k) => k.decode_and_verify_server_params(ctx, body),
            KeyExchange::Psk(k) => k.decode_server_params(body),
            KeyExchange::Rsa(_) | KeyExchange::EcdhStatic(_) => Err(no_server_params()),
        }
    }

    /// Client: write the ClientKeyExchange body.
    pub fn encode_client_params(
        &mut self,
        ctx: &mut KxContext,
        output: &mut Buf,
    ) -> Result<(), Error> {
        match self {
            KeyExchange::Rsa(k) => k.encode_client_params(ctx, output),
            KeyExchange::Dhe(k) => k.encode_client_params(ctx, output),
            KeyExchange::Ecdhe(k) => k.encode_client_params(ctx, output),
            KeyExchange::EcdhStatic(k) => k.encode_client_params(ctx, output),
            KeyExchange::Psk(k) => k.encode_client_params(ctx, output),
        }
    }

    /// Server: parse the ClientKeyExchange body.
    pub fn decode_client_params(&mut self, ctx: &mut KxContext, body: &[u8]) -> Result<(), Error> {
        match self {
            KeyExchange::Rsa(k) => k.decode_client_params(body),
            KeyExchange::Dhe(k) => k.decode_client_params(body),
            KeyExchange::Ecdhe(k) => k.decode_client_params(body),
            KeyExchange::EcdhStatic(k) => k.decode_client_params(body),
            KeyExchange::Psk(k) => k.decode_client_params(ctx, body),
        }
    }

    /// The premaster secret. Can be taken once.
    pub fn compute_premaster_secret(&mut self, ctx: &mut KxContext) -> Result<Secret, Error> {
        match self {
            KeyExchange::Rsa(k) => k.compute_premaster_secret(ctx),
            KeyExchange::Dhe(k) => k.compute_premaster_secret(),
            KeyExchange::Ecdhe(k) => k.compute_premaster_secret(),
            KeyExchange::EcdhStatic(k) => k.compute_premaster_secret(ctx),
            KeyExchange::Psk(k) => k.compute_premaster_secret(),
        }
    }
}

fn no_server_params() -> Error {
    Error::UnexpectedMessage("Key exchange has no ServerKeyExchange".into())
}

fn no_premaster() -> Error {
    Error::UnexpectedMessage("Premaster secret not available".into())
}

fn crypto(e: String) -> Error {
    Error::CryptoError(e)
}

/// Reject trailing bytes after a parsed body.
fn consumed<T>(rest: &[u8], value: T) -> Result<T, Error> {
    if !rest.is_empty() {
        return Err(Error::DecodeError(format!(
            "{} trailing bytes in key exchange",
            rest.len()
        )));
    }
    Ok(value)
}
