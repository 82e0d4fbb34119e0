//! Ephemeral ECDH groups using RustCrypto.

use p256::{ecdh::EphemeralSecret as P256EphemeralSecret, PublicKey as P256PublicKey};
use p384::{ecdh::EphemeralSecret as P384EphemeralSecret, PublicKey as P384PublicKey};
use x25519_dalek::{EphemeralSecret as X25519EphemeralSecret, PublicKey as X25519PublicKey};

use crate::buffer::Buf;
use crate::crypto::provider::{ActiveKeyExchange, SupportedKxGroup};
use crate::types::NamedGroup;
use crate::SeededRng;

/// ECDHE key exchange implementation.
enum EcdhKeyExchange {
    P256 {
        secret: P256EphemeralSecret,
        public_key: Buf,
    },
    P384 {
        secret: P384EphemeralSecret,
        public_key: Buf,
    },
    X25519 {
        secret: X25519EphemeralSecret,
        public_key: Buf,
    },
}

impl std::fmt::Debug for EcdhKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdhKeyExchange")
            .field("group", &self.group())
            .field("public_key_len", &self.pub_key().len())
            .finish_non_exhaustive()
    }
}

impl EcdhKeyExchange {
    fn new(group: NamedGroup, rng: &mut SeededRng) -> Result<Self, String> {
        match group {
            NamedGroup::Secp256r1 => {
                let secret = P256EphemeralSecret::random(rng);
                let public_key = Buf::from_slice(&P256PublicKey::from(&secret).to_sec1_bytes());
                Ok(EcdhKeyExchange::P256 { secret, public_key })
            }
            NamedGroup::Secp384r1 => {
                let secret = P384EphemeralSecret::random(rng);
                let public_key = Buf::from_slice(&P384PublicKey::from(&secret).to_sec1_bytes());
                Ok(EcdhKeyExchange::P384 { secret, public_key })
            }
            NamedGroup::X25519 => {
                let secret = X25519EphemeralSecret::random_from_rng(&mut *rng);
                let public_key = Buf::from_slice(X25519PublicKey::from(&secret).as_bytes());
                Ok(EcdhKeyExchange::X25519 { secret, public_key })
            }
            _ => Err(format!("Unsupported group: {:?}", group)),
        }
    }
}

impl ActiveKeyExchange for EcdhKeyExchange {
    fn pub_key(&self) -> &[u8] {
        match self {
            EcdhKeyExchange::P256 { public_key, .. } => public_key,
            EcdhKeyExchange::P384 { public_key, .. } => public_key,
            EcdhKeyExchange::X25519 { public_key, .. } => public_key,
        }
    }

    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String> {
        match *self {
            EcdhKeyExchange::P256 { secret, .. } => {
                let peer_key = P256PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared_secret = secret.diffie_hellman(&peer_key);
                out.extend_from_slice(shared_secret.raw_secret_bytes().as_slice());
            }
            EcdhKeyExchange::P384 { secret, .. } => {
                let peer_key = P384PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared_secret = secret.diffie_hellman(&peer_key);
                out.extend_from_slice(shared_secret.raw_secret_bytes().as_slice());
            }
            EcdhKeyExchange::X25519 { secret, .. } => {
                let peer: [u8; 32] = peer_pub
                    .try_into()
                    .map_err(|_| "Invalid X25519 public key length".to_string())?;
                let shared_secret = secret.diffie_hellman(&X25519PublicKey::from(peer));
                // All-zero output means a low order peer point (RFC 7748 6.1).
                if !shared_secret.was_contributory() {
                    return Err("X25519 shared secret is all zeroes".to_string());
                }
                out.extend_from_slice(shared_secret.as_bytes());
            }
        }
        Ok(())
    }

    fn group(&self) -> NamedGroup {
        match self {
            EcdhKeyExchange::P256 { .. } => NamedGroup::Secp256r1,
            EcdhKeyExchange::P384 { .. } => NamedGroup::Secp384r1,
            EcdhKeyExchange::X25519 { .. } => NamedGroup::X25519,
        }
    }
}

/// A key exchange group backed by [`EcdhKeyExchange`].
#[derive(Debug)]
struct EcGroup(NamedGroup);

impl SupportedKxGroup for EcGroup {
    fn name(&self) -> NamedGroup {
        self.0
    }

    fn start_exchange(&self, rng: &mut SeededRng) -> Result<Box<dyn ActiveKeyExchange>, String> {
        Ok(Box::new(EcdhKeyExchange::new(self.0, rng)?))
    }
}

static KX_GROUP_X25519: EcGroup = EcGroup(NamedGroup::X25519);
static KX_GROUP_P256: EcGroup = EcGroup(NamedGroup::Secp256r1);
static KX_GROUP_P384: EcGroup = EcGroup(NamedGroup::Secp384r1);

/// All supported key exchange groups.
pub(super) static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] =
    &[&KX_GROUP_X25519, &KX_GROUP_P256, &KX_GROUP_P384];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;

    #[test]
    fn all_groups_agree() {
        let mut rng = SeededRng::new(Some(3), rust_crypto::default_provider().secure_random);
        for g in ALL_KX_GROUPS {
            let a = g.start_exchange(&mut rng).unwrap();
            let b = g.start_exchange(&mut rng).unwrap();
            let a_pub = a.pub_key().to_vec();
            let b_pub = b.pub_key().to_vec();

            let mut s1 = Buf::new();
            let mut s2 = Buf::new();
            a.complete(&b_pub, &mut s1).unwrap();
            b.complete(&a_pub, &mut s2).unwrap();
            assert_eq!(s1, s2, "{:?}", g.name());
        }
    }

    #[test]
    fn rejects_garbage_point() {
        let mut rng = SeededRng::new(Some(3), rust_crypto::default_provider().secure_random);
        let a = KX_GROUP_P256.start_exchange(&mut rng).unwrap();
        let mut out = Buf::new();
        assert!(a.complete(&[4, 1, 2, 3], &mut out).is_err());
    }
}
