//! RustCrypto cryptographic provider.
//!
//! A pure Rust backend built on crates from the
//! [RustCrypto](https://github.com/RustCrypto) organization, plus
//! `x25519-dalek` and `num-bigint`.
//!
//! ```
//! use std::sync::Arc;
//! use tlsengine::Config;
//! use tlsengine::crypto::rust_crypto;
//!
//! let config = Arc::new(
//!     Config::builder()
//!         .with_crypto_provider(rust_crypto::default_provider())
//!         .build()
//!         .unwrap()
//! );
//! # let _ = config;
//! ```

mod cipher;
mod dh;
mod hash;
mod hmac;
mod kx_group;
mod random;
mod sign;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # Ciphers
///
/// - AES-128/256 in GCM and CBC mode
/// - 3DES-EDE and DES (export) in CBC mode
///
/// # Key Exchange
///
/// - ECDHE over X25519, P-256 and P-384
/// - Finite field DH (any safe prime of at least 512 bits)
/// - Static ECDH with a P-256 or P-384 certificate key
///
/// # Keys and Signatures
///
/// - RSA PKCS#1 v1.5 signatures (MD5+SHA1, SHA-1, SHA-256, SHA-384, SHA-512)
///   and encryption
/// - ECDSA over P-256 and P-384
/// - Private keys as PKCS#8, PKCS#1 or SEC1 DER, or PKCS#8 PEM
///
/// # Hashes
///
/// MD5, SHA-1, SHA-256, SHA-384 and SHA-512, with HMAC over each.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        kx_groups: kx_group::ALL_KX_GROUPS,
        dh: &dh::DH_PROVIDER,
        ciphers: &cipher::CIPHER_PROVIDER,
        public_keys: &sign::PUBLIC_KEY_PROVIDER,
        key_provider: &sign::KEY_PROVIDER,
        secure_random: &random::SECURE_RANDOM,
        hash_provider: &hash::HASH_PROVIDER,
        hmac_provider: &hmac::HMAC_PROVIDER,
    }
}
