//! Choosing, computing and checking handshake signatures.
//!
//! Before TLS 1.2 the scheme is implied by the key: RSA signs the raw
//! `MD5 || SHA-1` concatenation and ECDSA signs SHA-1. From 1.2 on an
//! explicit [`SignatureAndHashAlgorithm`] is picked from what the peer
//! advertised.

use crate::buffer::Buf;
use crate::crypto::{HashProvider, PrivateKey, PublicKeyProvider};
use crate::message::DigitallySigned;
use crate::types::{HashAlgorithm, ProtocolVersion, SignatureAlgorithm};
use crate::types::{SignatureAndHashAlgorithm, SignatureHash};
use crate::Error;

fn legacy_hash(key: SignatureAlgorithm) -> Result<SignatureHash, Error> {
    match key {
        SignatureAlgorithm::RSA => Ok(SignatureHash::Md5Sha1),
        SignatureAlgorithm::ECDSA => Ok(SignatureHash::Hash(HashAlgorithm::SHA1)),
        _ => Err(Error::NegotiationError(format!(
            "No signature scheme for {:?} keys",
            key
        ))),
    }
}

/// Pick the scheme to sign with.
///
/// `peer` is the peer's signature_algorithms list. When the peer sent none,
/// RFC 5246 7.4.1.4.1 says to assume SHA-1 with the key's algorithm.
pub fn select_scheme(
    version: ProtocolVersion,
    key: SignatureAlgorithm,
    peer: Option<&[SignatureAndHashAlgorithm]>,
    local: &[SignatureAndHashAlgorithm],
) -> Result<(Option<SignatureAndHashAlgorithm>, SignatureHash), Error> {
    if !version.is_tls12() {
        return Ok((None, legacy_hash(key)?));
    }

    let default = [SignatureAndHashAlgorithm::new(HashAlgorithm::SHA1, key)];
    let peer = peer.unwrap_or(&default[..]);

    local
        .iter()
        .find(|a| a.signature == key && peer.contains(*a))
        .map(|a| (Some(*a), SignatureHash::Hash(a.hash)))
        .ok_or_else(|| {
            Error::NegotiationError(format!("No common signature algorithm for {:?}", key))
        })
}

/// Check the scheme of a received signature against the peer key and what
/// we advertised.
pub fn accept_scheme(
    version: ProtocolVersion,
    key: SignatureAlgorithm,
    algorithm: Option<SignatureAndHashAlgorithm>,
    local: &[SignatureAndHashAlgorithm],
) -> Result<SignatureHash, Error> {
    if !version.is_tls12() {
        return legacy_hash(key);
    }

    let Some(alg) = algorithm else {
        return Err(Error::DecodeError("Missing signature algorithm".into()));
    };

    if alg.signature != key || !local.contains(&alg) {
        return Err(Error::IllegalParameter(format!(
            "Signature algorithm {:?} not acceptable",
            alg
        )));
    }

    Ok(SignatureHash::Hash(alg.hash))
}

/// One shot digest of `parts` as a [`SignatureHash`] describes it.
pub fn digest(
    hashes: &dyn HashProvider,
    hash: SignatureHash,
    parts: &[&[u8]],
) -> Result<Buf, Error> {
    let mut out = Buf::new();
    match hash {
        SignatureHash::Md5Sha1 => {
            hashes
                .digest(HashAlgorithm::MD5, parts, &mut out)
                .map_err(Error::CryptoError)?;
            hashes
                .digest(HashAlgorithm::SHA1, parts, &mut out)
                .map_err(Error::CryptoError)?;
        }
        SignatureHash::Hash(h) => {
            hashes
                .digest(h, parts, &mut out)
                .map_err(Error::CryptoError)?;
        }
    }
    Ok(out)
}

/// Sign `digest` and write a DigitallySigned.
pub fn sign_into(
    key: &dyn PrivateKey,
    algorithm: Option<SignatureAndHashAlgorithm>,
    hash: SignatureHash,
    digest: &[u8],
    output: &mut Buf,
) -> Result<(), Error> {
    let mut signature = Buf::new();
    key.sign(hash, digest, &mut signature)
        .map_err(Error::CryptoError)?;
    DigitallySigned::new(algorithm, &signature).serialize(output);
    Ok(())
}

/// Verify a signature with the key of `cert_der`.
pub fn verify(
    public_keys: &dyn PublicKeyProvider,
    cert_der: &[u8],
    hash: SignatureHash,
    digest: &[u8],
    signature: &[u8],
) -> Result<(), Error> {
    public_keys
        .verify(cert_der, hash, digest, signature)
        .map_err(|e| Error::DecryptError(format!("Signature verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_schemes_are_implied() {
        let (alg, hash) = select_scheme(
            ProtocolVersion::TLS1_0,
            SignatureAlgorithm::RSA,
            None,
            SignatureAndHashAlgorithm::supported(),
        )
        .unwrap();
        assert_eq!(alg, None);
        assert_eq!(hash, SignatureHash::Md5Sha1);

        let hash = accept_scheme(
            ProtocolVersion::DTLS1_0,
            SignatureAlgorithm::ECDSA,
            None,
            SignatureAndHashAlgorithm::supported(),
        )
        .unwrap();
        assert_eq!(hash, SignatureHash::Hash(HashAlgorithm::SHA1));
    }

    #[test]
    fn absent_peer_list_means_sha1() {
        let (alg, _) = select_scheme(
            ProtocolVersion::TLS1_2,
            SignatureAlgorithm::ECDSA,
            None,
            SignatureAndHashAlgorithm::supported(),
        )
        .unwrap();
        assert_eq!(
            alg,
            Some(SignatureAndHashAlgorithm::new(
                HashAlgorithm::SHA1,
                SignatureAlgorithm::ECDSA
            ))
        );
    }

    #[test]
    fn local_preference_wins() {
        let peer = [
            SignatureAndHashAlgorithm::new(HashAlgorithm::SHA384, SignatureAlgorithm::RSA),
            SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::RSA),
        ];
        let (alg, hash) = select_scheme(
            ProtocolVersion::TLS1_2,
            SignatureAlgorithm::RSA,
            Some(&peer[..]),
            SignatureAndHashAlgorithm::supported(),
        )
        .unwrap();
        assert_eq!(alg, Some(peer[1]));
        assert_eq!(hash, SignatureHash::Hash(HashAlgorithm::SHA256));
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let alg = SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::RSA);
        let err = accept_scheme(
            ProtocolVersion::TLS1_2,
            SignatureAlgorithm::ECDSA,
            Some(alg),
            SignatureAndHashAlgorithm::supported(),
        );
        assert!(matches!(err, Err(Error::IllegalParameter(_))));

        let peer = [SignatureAndHashAlgorithm::new(
            HashAlgorithm::SHA512,
            SignatureAlgorithm::RSA,
        )];
        let err = select_scheme(
            ProtocolVersion::TLS1_2,
            SignatureAlgorithm::RSA,
            Some(&peer[..]),
            SignatureAndHashAlgorithm::supported(),
        );
        assert!(matches!(err, Err(Error::NegotiationError(_))));
    }
}
