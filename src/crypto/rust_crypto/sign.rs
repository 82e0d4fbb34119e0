//! Private key loading, signatures and RSA encryption using RustCrypto.

use std::str;

use der::{Decode, Encode};
use pkcs8::DecodePrivateKey;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use spki::ObjectIdentifier;
use x509_cert::Certificate as X509Certificate;

use crate::buffer::Buf;
use crate::crypto::provider::{KeyProvider, PeerKey, PrivateKey, PublicKeyProvider};
use crate::types::{HashAlgorithm, NamedGroup, SignatureAlgorithm, SignatureHash};
use crate::SeededRng;

const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

type P256SigningKey = p256::ecdsa::SigningKey;
type P384SigningKey = p384::ecdsa::SigningKey;

/// PKCS#1 v1.5 signature scheme for a digest.
fn rsa_scheme(hash: SignatureHash) -> Result<Pkcs1v15Sign, String> {
    let scheme = match hash {
        SignatureHash::Md5Sha1 => Pkcs1v15Sign::new_unprefixed(),
        SignatureHash::Hash(HashAlgorithm::SHA1) => Pkcs1v15Sign::new::<sha1::Sha1>(),
        SignatureHash::Hash(HashAlgorithm::SHA256) => Pkcs1v15Sign::new::<sha2::Sha256>(),
        SignatureHash::Hash(HashAlgorithm::SHA384) => Pkcs1v15Sign::new::<sha2::Sha384>(),
        SignatureHash::Hash(HashAlgorithm::SHA512) => Pkcs1v15Sign::new::<sha2::Sha512>(),
        _ => return Err(format!("Unsupported RSA signature hash: {:?}", hash)),
    };
    Ok(scheme)
}

/// ECDSA prehash for a curve with `field_len` byte scalars.
///
/// Digests shorter than the field (SHA-1 with P-384) are left padded with
/// zeroes. That keeps the integer value, which is what ECDSA signs, and
/// satisfies the minimum prehash length of the ecdsa crate.
fn ecdsa_prehash(hash: SignatureHash, digest: &[u8], field_len: usize) -> Result<Vec<u8>, String> {
    if hash == SignatureHash::Md5Sha1 {
        return Err("ECDSA does not sign MD5+SHA1".to_string());
    }
    let mut prehash = Vec::with_capacity(field_len.max(digest.len()));
    if digest.len() < field_len {
        prehash.resize(field_len - digest.len(), 0);
    }
    prehash.extend_from_slice(digest);
    Ok(prehash)
}

/// Private key implementation.
enum KeyPair {
    P256(P256SigningKey),
    P384(P384SigningKey),
    Rsa(Box<RsaPrivateKey>),
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPair::P256(_) => f.debug_tuple("KeyPair::P256").finish(),
            KeyPair::P384(_) => f.debug_tuple("KeyPair::P384").finish(),
            KeyPair::Rsa(k) => f.debug_tuple("KeyPair::Rsa").field(&(k.size() * 8)).finish(),
        }
    }
}

impl PrivateKey for KeyPair {
    fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::P256(_) | KeyPair::P384(_) => SignatureAlgorithm::ECDSA,
            KeyPair::Rsa(_) => SignatureAlgorithm::RSA,
        }
    }

    fn group(&self) -> Option<NamedGroup> {
        match self {
            KeyPair::P256(_) => Some(NamedGroup::Secp256r1),
            KeyPair::P384(_) => Some(NamedGroup::Secp384r1),
            KeyPair::Rsa(_) => None,
        }
    }

    fn sign(&self, hash: SignatureHash, digest: &[u8], out: &mut Buf) -> Result<(), String> {
        match self {
            KeyPair::P256(key) => {
                let prehash = ecdsa_prehash(hash, digest, 32)?;
                let signature: p256::ecdsa::Signature = key
                    .sign_prehash(&prehash)
                    .map_err(|_| "Signing failed".to_string())?;
                out.extend_from_slice(signature.to_der().as_bytes());
            }
            KeyPair::P384(key) => {
                let prehash = ecdsa_prehash(hash, digest, 48)?;
                let signature: p384::ecdsa::Signature = key
                    .sign_prehash(&prehash)
                    .map_err(|_| "Signing failed".to_string())?;
                out.extend_from_slice(signature.to_der().as_bytes());
            }
            KeyPair::Rsa(key) => {
                let sig = key
                    .sign(rsa_scheme(hash)?, digest)
                    .map_err(|e| format!("RSA signing failed: {}", e))?;
                out.extend_from_slice(&sig);
            }
        }
        Ok(())
    }

    fn rsa_decrypt(&self, ciphertext: &[u8], out: &mut Buf) -> Result<(), String> {
        let KeyPair::Rsa(key) = self else {
            return Err("Not an RSA key".to_string());
        };
        let plain = key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|_| "RSA decryption failed".to_string())?;
        out.extend_from_slice(&plain);
        Ok(())
    }

    fn agree(&self, peer_point: &[u8], out: &mut Buf) -> Result<(), String> {
        match self {
            KeyPair::P256(key) => {
                let peer = p256::PublicKey::from_sec1_bytes(peer_point)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared = p256::ecdh::diffie_hellman(key.as_nonzero_scalar(), peer.as_affine());
                out.extend_from_slice(shared.raw_secret_bytes().as_slice());
            }
            KeyPair::P384(key) => {
                let peer = p384::PublicKey::from_sec1_bytes(peer_point)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared = p384::ecdh::diffie_hellman(key.as_nonzero_scalar(), peer.as_affine());
                out.extend_from_slice(shared.raw_secret_bytes().as_slice());
            }
            KeyPair::Rsa(_) => return Err("Static ECDH needs an EC key".to_string()),
        }
        Ok(())
    }
}

/// Key provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl RustCryptoKeyProvider {
    /// Wrap a SEC1 `ECPrivateKey` in PKCS#8 so the curve crates can load it.
    fn load_sec1(&self, key_der: &[u8]) -> Option<KeyPair> {
        let ec_key = sec1::EcPrivateKey::try_from(key_der).ok()?;

        let curve_oid = match &ec_key.parameters {
            Some(sec1::EcParameters::NamedCurve(oid)) => *oid,
            None if ec_key.private_key.len() == 32 => OID_P256,
            None if ec_key.private_key.len() == 48 => OID_P384,
            None => return None,
        };

        let curve_params_der = curve_oid.to_der().ok()?;
        let curve_params_any = der::asn1::AnyRef::try_from(curve_params_der.as_slice()).ok()?;

        let pkcs8 = pkcs8::PrivateKeyInfo {
            algorithm: spki::AlgorithmIdentifierRef {
                oid: OID_EC_PUBLIC_KEY,
                parameters: Some(curve_params_any),
            },
            private_key: key_der,
            public_key: None,
        };
        let pkcs8_der = pkcs8.to_der().ok()?;

        match curve_oid {
            OID_P256 => P256SigningKey::from_pkcs8_der(&pkcs8_der)
                .ok()
                .map(KeyPair::P256),
            OID_P384 => P384SigningKey::from_pkcs8_der(&pkcs8_der)
                .ok()
                .map(KeyPair::P384),
            _ => None,
        }
    }
}

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn PrivateKey>, String> {
        // PKCS#8 DER format first (most common)
        if let Ok(key) = P256SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(KeyPair::P256(key)));
        }
        if let Ok(key) = P384SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(KeyPair::P384(key)));
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(KeyPair::Rsa(Box::new(key))));
        }

        // Traditional OpenSSL formats
        if let Ok(key) = RsaPrivateKey::from_pkcs1_der(key_der) {
            return Ok(Box::new(KeyPair::Rsa(Box::new(key))));
        }
        if let Some(key) = self.load_sec1(key_der) {
            return Ok(Box::new(key));
        }

        // PEM encoded PKCS#8
        if let Ok(pem_str) = str::from_utf8(key_der) {
            if pem_str.contains("-----BEGIN") {
                if let Ok((_label, doc)) = pkcs8::Document::from_pem(pem_str) {
                    return self.load_private_key(doc.as_bytes());
                }
            }
        }

        Err("Failed to parse private key in any supported format".to_string())
    }
}

/// A parsed certificate public key.
enum PublicKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    Rsa(RsaPublicKey),
}

fn parse_public_key(cert_der: &[u8]) -> Result<(PublicKey, Vec<u8>), String> {
    let cert = X509Certificate::from_der(cert_der)
        .map_err(|e| format!("Failed to parse certificate: {e}"))?;
    let spki = &cert.tbs_certificate.subject_public_key_info;

    let pubkey_bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| "Invalid subject_public_key bitstring".to_string())?;

    match spki.algorithm.oid {
        OID_RSA_ENCRYPTION => {
            let key = RsaPublicKey::from_pkcs1_der(pubkey_bytes)
                .map_err(|e| format!("Invalid RSA public key: {e}"))?;
            Ok((PublicKey::Rsa(key), Vec::new()))
        }
        OID_EC_PUBLIC_KEY => {
            let curve_oid: ObjectIdentifier = spki
                .algorithm
                .parameters
                .as_ref()
                .ok_or("Missing EC curve parameter in certificate")?
                .decode_as()
                .map_err(|_| "Invalid EC curve parameter in certificate".to_string())?;

            let key = match curve_oid {
                OID_P256 => PublicKey::P256(
                    p256::ecdsa::VerifyingKey::from_sec1_bytes(pubkey_bytes)
                        .map_err(|_| "Invalid P-256 public key".to_string())?,
                ),
                OID_P384 => PublicKey::P384(
                    p384::ecdsa::VerifyingKey::from_sec1_bytes(pubkey_bytes)
                        .map_err(|_| "Invalid P-384 public key".to_string())?,
                ),
                _ => return Err(format!("Unsupported EC curve: {}", curve_oid)),
            };
            Ok((key, pubkey_bytes.to_vec()))
        }
        oid => Err(format!("Unsupported public key algorithm: {}", oid)),
    }
}

/// Public key provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoPublicKeyProvider;

impl PublicKeyProvider for RustCryptoPublicKeyProvider {
    fn peer_key(&self, cert_der: &[u8]) -> Result<PeerKey, String> {
        let (key, point) = parse_public_key(cert_der)?;
        let peer_key = match key {
            PublicKey::P256(_) => PeerKey {
                algorithm: SignatureAlgorithm::ECDSA,
                group: Some(NamedGroup::Secp256r1),
                bits: 256,
                point,
            },
            PublicKey::P384(_) => PeerKey {
                algorithm: SignatureAlgorithm::ECDSA,
                group: Some(NamedGroup::Secp384r1),
                bits: 384,
                point,
            },
            PublicKey::Rsa(k) => PeerKey {
                algorithm: SignatureAlgorithm::RSA,
                group: None,
                bits: k.n().bits(),
                point,
            },
        };
        Ok(peer_key)
    }

    fn verify(
        &self,
        cert_der: &[u8],
        hash: SignatureHash,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), String> {
        let (key, _) = parse_public_key(cert_der)?;
        match key {
            PublicKey::P256(vk) => {
                let prehash = ecdsa_prehash(hash, digest, 32)?;
                let sig = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|_| "Invalid signature format".to_string())?;
                vk.verify_prehash(&prehash, &sig)
                    .map_err(|_| format!("ECDSA signature verification failed for {:?}", hash))
            }
            PublicKey::P384(vk) => {
                let prehash = ecdsa_prehash(hash, digest, 48)?;
                let sig = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|_| "Invalid signature format".to_string())?;
                vk.verify_prehash(&prehash, &sig)
                    .map_err(|_| format!("ECDSA signature verification failed for {:?}", hash))
            }
            PublicKey::Rsa(pk) => pk
                .verify(rsa_scheme(hash)?, digest, signature)
                .map_err(|_| format!("RSA signature verification failed for {:?}", hash)),
        }
    }

    fn rsa_encrypt(
        &self,
        cert_der: &[u8],
        data: &[u8],
        rng: &mut SeededRng,
        out: &mut Buf,
    ) -> Result<(), String> {
        let (PublicKey::Rsa(pk), _) = parse_public_key(cert_der)? else {
            return Err("Certificate does not hold an RSA key".to_string());
        };
        let ct = pk
            .encrypt(rng, Pkcs1v15Encrypt, data)
            .map_err(|e| format!("RSA encryption failed: {}", e))?;
        out.extend_from_slice(&ct);
        Ok(())
    }
}

/// Static instance of the key provider.
pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;

/// Static instance of the public key provider.
pub(super) static PUBLIC_KEY_PROVIDER: RustCryptoPublicKeyProvider = RustCryptoPublicKeyProvider;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;

    const RSA_KEY: &[u8] = include_bytes!("../../../tests/data/rsa2048.key.der");
    const RSA_CERT: &[u8] = include_bytes!("../../../tests/data/rsa2048.cert.der");
    const EC_KEY: &[u8] = include_bytes!("../../../tests/data/p256.key.der");
    const EC_CERT: &[u8] = include_bytes!("../../../tests/data/p256.cert.der");

    fn rng() -> SeededRng {
        SeededRng::new(Some(5), rust_crypto::default_provider().secure_random)
    }

    #[test]
    fn peer_keys() {
        let rsa = PUBLIC_KEY_PROVIDER.peer_key(RSA_CERT).unwrap();
        assert_eq!(rsa.algorithm, SignatureAlgorithm::RSA);
        assert_eq!(rsa.bits, 2048);

        let ec = PUBLIC_KEY_PROVIDER.peer_key(EC_CERT).unwrap();
        assert_eq!(ec.group, Some(NamedGroup::Secp256r1));
        assert_eq!(ec.point.len(), 65);
    }

    #[test]
    fn rsa_md5sha1_sign_and_verify() {
        let key = KEY_PROVIDER.load_private_key(RSA_KEY).unwrap();
        let digest = [0x11u8; 36];
        let mut sig = Buf::new();
        key.sign(SignatureHash::Md5Sha1, &digest, &mut sig).unwrap();
        PUBLIC_KEY_PROVIDER
            .verify(RSA_CERT, SignatureHash::Md5Sha1, &digest, &sig)
            .unwrap();

        let other = [0x12u8; 36];
        assert!(PUBLIC_KEY_PROVIDER
            .verify(RSA_CERT, SignatureHash::Md5Sha1, &other, &sig)
            .is_err());
    }

    #[test]
    fn ecdsa_sha1_digest_is_padded() {
        let key = KEY_PROVIDER.load_private_key(EC_KEY).unwrap();
        let hash = SignatureHash::Hash(HashAlgorithm::SHA1);
        let digest = [0x33u8; 20];
        let mut sig = Buf::new();
        key.sign(hash, &digest, &mut sig).unwrap();
        PUBLIC_KEY_PROVIDER
            .verify(EC_CERT, hash, &digest, &sig)
            .unwrap();
    }

    #[test]
    fn rsa_encrypt_decrypt() {
        let key = KEY_PROVIDER.load_private_key(RSA_KEY).unwrap();
        let mut ct = Buf::new();
        PUBLIC_KEY_PROVIDER
            .rsa_encrypt(RSA_CERT, b"premaster", &mut rng(), &mut ct)
            .unwrap();
        assert_eq!(ct.len(), 256);

        let mut pt = Buf::new();
        key.rsa_decrypt(&ct, &mut pt).unwrap();
        assert_eq!(&*pt, b"premaster");
    }

    #[test]
    fn static_ecdh_matches_ephemeral() {
        let key = KEY_PROVIDER.load_private_key(EC_KEY).unwrap();
        let server_point = PUBLIC_KEY_PROVIDER.peer_key(EC_CERT).unwrap().point;

        let mut rng = rng();
        let eph = rust_crypto::default_provider()
            .kx_group(NamedGroup::Secp256r1)
            .unwrap()
            .start_exchange(&mut rng)
            .unwrap();
        let client_pub = eph.pub_key().to_vec();

        let mut s1 = Buf::new();
        eph.complete(&server_point, &mut s1).unwrap();
        let mut s2 = Buf::new();
        key.agree(&client_pub, &mut s2).unwrap();
        assert_eq!(s1, s2);
    }
}
