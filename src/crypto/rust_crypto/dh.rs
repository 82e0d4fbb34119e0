//! Finite field Diffie-Hellman using num-bigint.

use num_bigint::BigUint;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::crypto::ffdhe2048;
use crate::crypto::provider::{ActiveKeyExchange, DhProvider};
use crate::types::NamedGroup;
use crate::SeededRng;

// Private exponent size. RFC 7919 5.2 asks for at least 225 bits for
// ffdhe2048.
const EXPONENT_LEN: usize = 32;

const MAX_PRIME_BITS: u64 = 4096;

struct DhKeyExchange {
    p: BigUint,
    x: Zeroizing<Vec<u8>>,
    public_key: Buf,
    group: NamedGroup,
}

impl std::fmt::Debug for DhKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhKeyExchange")
            .field("p_bits", &self.p.bits())
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

impl ActiveKeyExchange for DhKeyExchange {
    fn pub_key(&self) -> &[u8] {
        &self.public_key
    }

    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String> {
        let y = BigUint::from_bytes_be(peer_pub);
        let two = BigUint::from(2u32);

        // 1 < Y < p - 1 rejects the trivial subgroup (RFC 7919 5.1)
        if y < two || y > &self.p - &two {
            return Err("DH public value out of range".to_string());
        }

        let x = BigUint::from_bytes_be(&self.x);
        let z = y.modpow(&x, &self.p);

        // Leading zero bytes are stripped (RFC 5246 8.1.2)
        out.extend_from_slice(&z.to_bytes_be());
        Ok(())
    }

    fn group(&self) -> NamedGroup {
        self.group
    }
}

#[derive(Debug)]
pub(super) struct RustCryptoDhProvider;

impl DhProvider for RustCryptoDhProvider {
    fn start_exchange(
        &self,
        p: &[u8],
        g: &[u8],
        rng: &mut SeededRng,
    ) -> Result<Box<dyn ActiveKeyExchange>, String> {
        let p_int = BigUint::from_bytes_be(p);
        let g_int = BigUint::from_bytes_be(g);
        let two = BigUint::from(2u32);

        if p_int.bits() < 512 || !p_int.bit(0) {
            return Err("DH prime is too small or even".to_string());
        }
        if p_int.bits() > MAX_PRIME_BITS {
            return Err(format!("DH prime of {} bits is too large", p_int.bits()));
        }
        if g_int < two || g_int >= &p_int - 1u32 {
            return Err("DH generator out of range".to_string());
        }

        let mut x = Zeroizing::new(vec![0u8; EXPONENT_LEN]);
        rng.fill_bytes(&mut x[..]);
        // Keep the exponent nonzero
        x[0] |= 0x80;

        let y = g_int.modpow(&BigUint::from_bytes_be(&x), &p_int);

        // Public value is padded to the length of p
        let y_bytes = y.to_bytes_be();
        let mut public_key = Buf::with_capacity(p.len());
        let p_len = (p_int.bits() as usize + 7) / 8;
        public_key.resize(p_len - y_bytes.len(), 0);
        public_key.extend_from_slice(&y_bytes);

        let group = if p == &ffdhe2048::P[..] && g == &ffdhe2048::G[..] {
            NamedGroup::Ffdhe2048
        } else {
            NamedGroup::Unknown(0)
        };

        Ok(Box::new(DhKeyExchange {
            p: p_int,
            x,
            public_key,
            group,
        }))
    }
}

pub(super) static DH_PROVIDER: RustCryptoDhProvider = RustCryptoDhProvider;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;

    fn rng() -> SeededRng {
        SeededRng::new(Some(9), rust_crypto::default_provider().secure_random)
    }

    #[test]
    fn ffdhe2048_agreement() {
        let mut rng = rng();
        let a = DH_PROVIDER
            .start_exchange(&ffdhe2048::P, &ffdhe2048::G, &mut rng)
            .unwrap();
        let b = DH_PROVIDER
            .start_exchange(&ffdhe2048::P, &ffdhe2048::G, &mut rng)
            .unwrap();
        assert_eq!(a.group(), NamedGroup::Ffdhe2048);
        assert_eq!(a.pub_key().len(), 256);

        let a_pub = a.pub_key().to_vec();
        let b_pub = b.pub_key().to_vec();
        let mut s1 = Buf::new();
        let mut s2 = Buf::new();
        a.complete(&b_pub, &mut s1).unwrap();
        b.complete(&a_pub, &mut s2).unwrap();
        assert_eq!(s1, s2);
        assert_ne!(s1[0], 0);
    }

    #[test]
    fn prime_size_bounds() {
        let mut rng = rng();
        for p in [vec![0xFF; 32], vec![0xFF; 513]] {
            assert!(DH_PROVIDER.start_exchange(&p, &[2], &mut rng).is_err());
        }
    }

    #[test]
    fn rejects_degenerate_public_values() {
        let mut rng = rng();
        for y in [vec![1u8], vec![0u8], ffdhe2048::P.to_vec()] {
            let a = DH_PROVIDER
                .start_exchange(&ffdhe2048::P, &ffdhe2048::G, &mut rng)
                .unwrap();
            let mut out = Buf::new();
            assert!(a.complete(&y, &mut out).is_err());
        }
    }
}
