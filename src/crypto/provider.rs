//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The engine never implements primitives itself. Everything it needs is
//! reached through a [`CryptoProvider`], a struct of `&'static dyn` trait
//! objects each covering one capability:
//!
//! - **Hashing** ([`HashProvider`]): running transcript digests.
//! - **HMAC** ([`HmacProvider`]): the record MAC, the PRF and DTLS cookies.
//! - **Ciphers** ([`CipherProvider`]): CBC block ciphers and AEADs.
//! - **Key exchange** ([`SupportedKxGroup`], [`DhProvider`]): ephemeral ECDH
//!   and finite field DH.
//! - **Public keys** ([`PublicKeyProvider`]): key extraction from peer
//!   certificates, signature verification and RSA encryption.
//! - **Private keys** ([`KeyProvider`], [`PrivateKey`]): signing, RSA
//!   decryption and static ECDH.
//! - **Randomness** ([`SecureRandom`]).
//!
//! A default backend built on RustCrypto crates is available in
//! [`rust_crypto`](crate::crypto::rust_crypto).
//!
//! ```
//! use tlsengine::crypto::{rust_crypto, CryptoProvider};
//!
//! let provider = rust_crypto::default_provider();
//!
//! // Swap out a single component.
//! let custom = CryptoProvider {
//!     secure_random: provider.secure_random,
//!     ..provider
//! };
//! # let _ = custom;
//! ```

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::sync::OnceLock;

use crate::buffer::Buf;
use crate::suite::BulkCipher;
use crate::types::{HashAlgorithm, NamedGroup, SignatureAlgorithm, SignatureHash};
use crate::SeededRng;

// ============================================================================
// Marker Trait
// ============================================================================

/// Marker trait for types that are safe to use in crypto provider components.
///
/// Automatically implemented for every type that is
/// `Send + Sync + Debug + UnwindSafe + RefUnwindSafe`.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits (created by factories)
// ============================================================================

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Clone the context and finalize it, appending the hash to `out`.
    /// The original context can continue to be updated.
    fn clone_and_finalize(&self, out: &mut Buf);
}

/// CBC mode block cipher keyed for one direction.
pub trait BlockCipher: CryptoSafe {
    /// Cipher block length in bytes.
    fn block_len(&self) -> usize;

    /// Encrypt `data` in place. `data` is a whole number of blocks.
    fn encrypt(&mut self, iv: &[u8], data: &mut [u8]) -> Result<(), String>;

    /// Decrypt `data` in place. `data` is a whole number of blocks.
    fn decrypt(&mut self, iv: &[u8], data: &mut [u8]) -> Result<(), String>;
}

/// AEAD cipher for in-place encryption/decryption.
pub trait AeadCipher: CryptoSafe {
    /// Authentication tag length in bytes.
    fn tag_len(&self) -> usize;

    /// Encrypt in place, appending the tag.
    fn seal(&mut self, nonce: &[u8], aad: &[u8], data: &mut Buf) -> Result<(), String>;

    /// Verify and decrypt in place, removing the tag.
    fn open(&mut self, nonce: &[u8], aad: &[u8], data: &mut Buf) -> Result<(), String>;
}

/// Active key exchange instance (ephemeral keypair for one handshake).
pub trait ActiveKeyExchange: CryptoSafe {
    /// Our public value in wire encoding.
    fn pub_key(&self) -> &[u8];

    /// Complete the exchange with the peer's public value, appending the
    /// shared secret to `out`.
    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String>;

    /// The group of this exchange.
    fn group(&self) -> NamedGroup;
}

/// Private key loaded from DER.
pub trait PrivateKey: CryptoSafe {
    /// Signature algorithm this key produces.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Curve of an EC key.
    fn group(&self) -> Option<NamedGroup>;

    /// Sign a precomputed digest.
    ///
    /// For [`SignatureHash::Md5Sha1`] the 36 byte digest is signed raw
    /// (PKCS#1 v1.5 without DigestInfo).
    fn sign(&self, hash: SignatureHash, digest: &[u8], out: &mut Buf) -> Result<(), String>;

    /// PKCS#1 v1.5 decryption with an RSA key.
    fn rsa_decrypt(&self, ciphertext: &[u8], out: &mut Buf) -> Result<(), String>;

    /// Static ECDH with an EC key, appending the shared x coordinate.
    fn agree(&self, peer_point: &[u8], out: &mut Buf) -> Result<(), String>;
}

/// The public key found in a peer certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerKey {
    /// RSA or ECDSA.
    pub algorithm: SignatureAlgorithm,
    /// Curve of an EC key.
    pub group: Option<NamedGroup>,
    /// Modulus or field size in bits.
    pub bits: usize,
    /// SEC1 encoded point of an EC key, empty for RSA.
    pub point: Vec<u8>,
}

// ============================================================================
// Factory Traits (used by CryptoProvider)
// ============================================================================

/// Key exchange group support (factory for ActiveKeyExchange).
pub trait SupportedKxGroup: CryptoSafe {
    /// Named group for this key exchange group.
    fn name(&self) -> NamedGroup;

    /// Start a new key exchange, generating an ephemeral keypair.
    fn start_exchange(&self, rng: &mut SeededRng) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// Finite field Diffie-Hellman over explicit domain parameters.
pub trait DhProvider: CryptoSafe {
    /// Generate an ephemeral keypair for the group `(p, g)`.
    ///
    /// Both values are big-endian without leading zeroes.
    fn start_exchange(
        &self,
        p: &[u8],
        g: &[u8],
        rng: &mut SeededRng,
    ) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// Factory for record protection ciphers.
pub trait CipherProvider: CryptoSafe {
    fn create_block_cipher(
        &self,
        cipher: BulkCipher,
        key: &[u8],
    ) -> Result<Box<dyn BlockCipher>, String>;

    fn create_aead(&self, cipher: BulkCipher, key: &[u8]) -> Result<Box<dyn AeadCipher>, String>;
}

/// Operations with the public key of a DER-encoded X.509 certificate.
pub trait PublicKeyProvider: CryptoSafe {
    /// Extract the subject public key.
    fn peer_key(&self, cert_der: &[u8]) -> Result<PeerKey, String>;

    /// Verify a signature over a precomputed digest.
    fn verify(
        &self,
        cert_der: &[u8],
        hash: SignatureHash,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), String>;

    /// PKCS#1 v1.5 encryption to an RSA certificate key.
    fn rsa_encrypt(
        &self,
        cert_der: &[u8],
        data: &[u8],
        rng: &mut SeededRng,
        out: &mut Buf,
    ) -> Result<(), String>;
}

/// Private key parser (factory for PrivateKey).
pub trait KeyProvider: CryptoSafe {
    /// Parse a PKCS#8 or SEC1 DER private key.
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn PrivateKey>, String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// Hash provider (factory for HashContext).
pub trait HashProvider: CryptoSafe {
    /// Create a new hash context for the specified algorithm.
    fn create_hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn HashContext>, String>;

    /// One-shot digest of the concatenation of `parts`.
    fn digest(&self, algorithm: HashAlgorithm, parts: &[&[u8]], out: &mut Buf) -> Result<(), String> {
        let mut ctx = self.create_hash(algorithm)?;
        for p in parts {
            ctx.update(p);
        }
        ctx.clone_and_finalize(out);
        Ok(())
    }
}

/// HMAC provider.
pub trait HmacProvider: CryptoSafe {
    /// Compute HMAC(key, parts[0] || parts[1] || ...) with the given hash,
    /// appending the result to `out`.
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        parts: &[&[u8]],
        out: &mut Buf,
    ) -> Result<(), String>;
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for the engine.
///
/// Holds static references to every capability the engine uses. Build a
/// custom provider by taking [`rust_crypto::default_provider`] and
/// replacing fields.
///
/// [`rust_crypto::default_provider`]: crate::crypto::rust_crypto::default_provider
#[derive(Debug, Clone, Copy)]
pub struct CryptoProvider {
    /// Supported ECDHE groups.
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],

    /// Finite field DH.
    pub dh: &'static dyn DhProvider,

    /// Record protection ciphers.
    pub ciphers: &'static dyn CipherProvider,

    /// Certificate public key operations.
    pub public_keys: &'static dyn PublicKeyProvider,

    /// Key provider for parsing private keys.
    pub key_provider: &'static dyn KeyProvider,

    /// Secure random number generator.
    pub secure_random: &'static dyn SecureRandom,

    /// Hash provider for handshake hashing.
    pub hash_provider: &'static dyn HashProvider,

    /// HMAC provider for the PRF, record MACs and cookies.
    pub hmac_provider: &'static dyn HmacProvider,
}

static DEFAULT: OnceLock<CryptoProvider> = OnceLock::new();

impl CryptoProvider {
    /// Install a default crypto provider for the process.
    ///
    /// Used by [`Config::builder()`](crate::Config::builder) when no explicit
    /// provider is set. Returns the provider back if a default was already
    /// installed.
    pub fn install_default(provider: CryptoProvider) -> Result<(), CryptoProvider> {
        DEFAULT.set(provider)
    }

    /// Get the default crypto provider, if one has been installed.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }

    /// The installed default, or the RustCrypto provider.
    pub(crate) fn default_or_builtin() -> CryptoProvider {
        Self::get_default()
            .copied()
            .unwrap_or_else(crate::crypto::rust_crypto::default_provider)
    }

    /// The ECDHE group implementation for `group`, if supported.
    pub fn kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups.iter().find(|g| g.name() == group).copied()
    }
}
