//! PRF and key derivation for TLS 1.0 through 1.2 (RFC 2246 5, RFC 5246 5).
//!
//! Before TLS 1.2 the PRF is `P_MD5(S1, label + seed) XOR P_SHA1(S2, label +
//! seed)` where S1 and S2 are the two halves of the secret. From TLS 1.2 it
//! is `P_<hash>(secret, label + seed)` with the suite's PRF hash.

use crate::buffer::Buf;
use crate::crypto::{HmacProvider, Secret};
use crate::suite::CipherSuite;
use crate::types::{HashAlgorithm, ProtocolVersion};
use crate::Error;

pub const MASTER_SECRET_LEN: usize = 48;
pub const VERIFY_DATA_LEN: usize = 12;

/// The PRF for one negotiated version and suite.
#[derive(Clone, Copy)]
pub struct Prf<'a> {
    hmac: &'a dyn HmacProvider,
    tls12_hash: Option<HashAlgorithm>,
}

impl<'a> Prf<'a> {
    pub fn new(hmac: &'a dyn HmacProvider, version: ProtocolVersion, suite: CipherSuite) -> Self {
        let tls12_hash = version.is_tls12().then(|| suite.prf_hash());
        Prf { hmac, tls12_hash }
    }

    /// PRF(secret, label, seed[0] + seed[1] + ...) truncated to `len`.
    pub fn derive(
        &self,
        secret: &[u8],
        label: &[u8],
        seed: &[&[u8]],
        len: usize,
    ) -> Result<Secret, Error> {
        let mut full_seed = Buf::with_capacity(label.len() + 64);
        full_seed.extend_from_slice(label);
        for s in seed {
            full_seed.extend_from_slice(s);
        }

        let mut out = Secret::new();

        match self.tls12_hash {
            Some(hash) => {
                p_hash(self.hmac, hash, secret, &full_seed, len, out.buf_mut())?;
            }
            None => {
                // The halves overlap by one byte for odd length secrets.
                let half = secret.len().div_ceil(2);
                let s1 = &secret[..half];
                let s2 = &secret[secret.len() - half..];

                let md5 = out.buf_mut();
                p_hash(self.hmac, HashAlgorithm::MD5, s1, &full_seed, len, md5)?;

                let mut sha1 = Secret::new();
                p_hash(self.hmac, HashAlgorithm::SHA1, s2, &full_seed, len, sha1.buf_mut())?;

                for (a, b) in md5.iter_mut().zip(sha1.iter()) {
                    *a ^= b;
                }
            }
        }

        full_seed.wipe();
        Ok(out)
    }
}

/// P_hash(secret, seed) (RFC 5246 5).
///
/// A(0) = seed, A(i) = HMAC(secret, A(i-1)),
/// output = HMAC(secret, A(1) + seed) + HMAC(secret, A(2) + seed) + ...
fn p_hash(
    hmac: &dyn HmacProvider,
    hash: HashAlgorithm,
    secret: &[u8],
    seed: &[u8],
    len: usize,
    out: &mut Buf,
) -> Result<(), Error> {
    let mut a = Buf::new();
    hmac.hmac(hash, secret, &[seed], &mut a)
        .map_err(Error::CryptoError)?;

    let mut block = Buf::new();
    while out.len() < len {
        block.clear();
        hmac.hmac(hash, secret, &[&a, seed], &mut block)
            .map_err(Error::CryptoError)?;

        let take = (len - out.len()).min(block.len());
        out.extend_from_slice(&block[..take]);

        if out.len() < len {
            let mut next = Buf::new();
            hmac.hmac(hash, secret, &[&a], &mut next)
                .map_err(Error::CryptoError)?;
            a.wipe();
            a = next;
        }
    }

    a.wipe();
    block.wipe();
    Ok(())
}

/// master_secret = PRF(pre_master_secret, "master secret",
///                     client_random + server_random)[0..47]
pub fn derive_master_secret(
    prf: &Prf,
    premaster: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<Secret, Error> {
    prf.derive(
        premaster,
        b"master secret",
        &[client_random, server_random],
        MASTER_SECRET_LEN,
    )
}

/// RFC 7627: master_secret = PRF(pre_master_secret, "extended master secret",
///                               session_hash)[0..47]
///
/// `session_hash` covers the transcript up to and including
/// ClientKeyExchange.
pub fn derive_extended_master_secret(
    prf: &Prf,
    premaster: &[u8],
    session_hash: &[u8],
) -> Result<Secret, Error> {
    prf.derive(
        premaster,
        b"extended master secret",
        &[session_hash],
        MASTER_SECRET_LEN,
    )
}

/// key_block = PRF(master_secret, "key expansion",
///                 server_random + client_random)
pub fn expand_key_material(
    prf: &Prf,
    master: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    len: usize,
) -> Result<Secret, Error> {
    prf.derive(master, b"key expansion", &[server_random, client_random], len)
}

/// verify_data = PRF(master_secret, finished_label, handshake_hash)[0..11]
pub fn compute_finished_mac(
    prf: &Prf,
    master: &[u8],
    is_server: bool,
    handshake_hash: &[u8],
) -> Result<Secret, Error> {
    let label: &[u8] = if is_server {
        b"server finished"
    } else {
        b"client finished"
    };
    prf.derive(master, label, &[handshake_hash], VERIFY_DATA_LEN)
}

/// Key material for both directions, split out of the key block.
#[derive(Debug, Default)]
pub struct KeyBlock {
    pub client_mac: Secret,
    pub server_mac: Secret,
    pub client_key: Secret,
    pub server_key: Secret,
    pub client_iv: Secret,
    pub server_iv: Secret,
}

impl KeyBlock {
    /// Expand the master secret and split it.
    ///
    /// Export suites take a 5 byte secret key from the key block and derive
    /// the final 8 byte key and the IVs in further PRF passes
    /// (RFC 2246 6.3).
    pub fn derive(
        prf: &Prf,
        suite: CipherSuite,
        master: &[u8],
        client_random: &[u8],
        server_random: &[u8],
    ) -> Result<KeyBlock, Error> {
        let mac_len = suite.mac_algorithm().output_len();
        let cipher = suite.bulk_cipher();
        let key_len = cipher.key_len();
        let iv_len = cipher.fixed_iv_len();

        let total = 2 * (mac_len + key_len + iv_len);
        let material = expand_key_material(prf, master, client_random, server_random, total)?;

        let mut pos = 0;
        let mut take = |n: usize| {
            let s = Secret::from_slice(&material[pos..pos + n]);
            pos += n;
            s
        };

        let mut block = KeyBlock {
            client_mac: take(mac_len),
            server_mac: take(mac_len),
            client_key: take(key_len),
            server_key: take(key_len),
            client_iv: take(iv_len),
            server_iv: take(iv_len),
        };

        if suite.is_export() {
            let final_len = cipher.expanded_key_len();
            let seed: [&[u8]; 2] = [client_random, server_random];

            block.client_key =
                prf.derive(&block.client_key, b"client write key", &seed, final_len)?;
            block.server_key =
                prf.derive(&block.server_key, b"server write key", &seed, final_len)?;

            let block_len = cipher.block_len();
            let ivs = prf.derive(&[], b"IV block", &seed, 2 * block_len)?;
            block.client_iv = Secret::from_slice(&ivs[..block_len]);
            block.server_iv = Secret::from_slice(&ivs[block_len..]);
        }

        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;

    fn prf(version: ProtocolVersion) -> Prf<'static> {
        let hmac = rust_crypto::default_provider().hmac_provider;
        Prf::new(hmac, version, CipherSuite::RSA_WITH_AES_128_CBC_SHA)
    }

    #[test]
    fn tls12_prf_sha256_vector() {
        let secret = [
            0x9b, 0xbe, 0x43, 0x6b, 0xa9, 0x40, 0xf0, 0x17, 0xb1, 0x76, 0x52, 0x84, 0x9a, 0x71,
            0xdb, 0x35,
        ];
        let seed = [
            0xa0, 0xba, 0x9f, 0x93, 0x6c, 0xda, 0x31, 0x18, 0x27, 0xa6, 0xf7, 0x96, 0xff, 0xd5,
            0x19, 0x8c,
        ];
        let out = prf(ProtocolVersion::TLS1_2)
            .derive(&secret, b"test label", &[&seed], 100)
            .unwrap();
        assert_eq!(out.len(), 100);
        assert_eq!(
            &out[..16],
            &[
                0xe3, 0xf2, 0x29, 0xba, 0x72, 0x7b, 0xe1, 0x7b, 0x8d, 0x12, 0x26, 0x20, 0x55, 0x7c,
                0xd4, 0x53,
            ]
        );
        assert_eq!(&out[96..], &[0x87, 0x34, 0x7b, 0x66]);
    }

    #[test]
    fn legacy_prf_odd_secret_shares_middle_byte() {
        let secret = [0xab; 47];
        let out = prf(ProtocolVersion::TLS1_0)
            .derive(&secret, b"test", &[b"seed"], 20)
            .unwrap();
        assert_eq!(
            &*out,
            &[
                0xe4, 0xc1, 0x2c, 0xd0, 0xb0, 0xb7, 0x40, 0x8d, 0x7c, 0xb5, 0xf4, 0xae, 0x9e, 0x70,
                0xff, 0x02, 0xd9, 0x8d, 0xa5, 0x7c,
            ]
        );
    }

    #[test]
    fn legacy_master_secret() {
        let premaster: Vec<u8> = (1..=48).collect();
        let zero = [0u8; 32];
        let master =
            derive_master_secret(&prf(ProtocolVersion::TLS1_1), &premaster, &zero, &zero).unwrap();
        assert_eq!(master.len(), MASTER_SECRET_LEN);
        assert_eq!(&master[..4], &[0x78, 0x73, 0xca, 0xbb]);
    }

    #[test]
    fn derivation_is_deterministic() {
        let p = prf(ProtocolVersion::TLS1_2);
        let a = compute_finished_mac(&p, &[1; 48], false, &[2; 32]).unwrap();
        let b = compute_finished_mac(&p, &[1; 48], false, &[2; 32]).unwrap();
        let c = compute_finished_mac(&p, &[1; 48], true, &[2; 32]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), VERIFY_DATA_LEN);
    }

    #[test]
    fn key_block_split() {
        let p = prf(ProtocolVersion::TLS1_2);
        let suite = CipherSuite::RSA_WITH_AES_128_CBC_SHA;
        let kb = KeyBlock::derive(&p, suite, &[7; 48], &[1; 32], &[2; 32]).unwrap();
        assert_eq!(kb.client_mac.len(), 20);
        assert_eq!(kb.server_key.len(), 16);
        assert_eq!(kb.client_iv.len(), 16);
        assert_ne!(kb.client_key, kb.server_key);

        let gcm = KeyBlock::derive(
            &p,
            CipherSuite::ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            &[7; 48],
            &[1; 32],
            &[2; 32],
        )
        .unwrap();
        assert!(gcm.client_mac.is_empty());
        assert_eq!(gcm.server_iv.len(), 4);
    }

    #[test]
    fn export_key_block() {
        let hmac = rust_crypto::default_provider().hmac_provider;
        let suite = CipherSuite::RSA_EXPORT_WITH_DES40_CBC_SHA;
        let p = Prf::new(hmac, ProtocolVersion::TLS1_0, suite);
        let kb = KeyBlock::derive(&p, suite, &[7; 48], &[1; 32], &[2; 32]).unwrap();
        assert_eq!(kb.client_key.len(), 8);
        assert_eq!(kb.server_key.len(), 8);
        // IV block = PRF("", "IV block", client_random + server_random)
        assert_eq!(
            &*kb.client_iv,
            &[0x31, 0x05, 0x29, 0x7b, 0xea, 0x55, 0x16, 0x0d]
        );
        assert_eq!(
            &*kb.server_iv,
            &[0x9f, 0xfd, 0x4e, 0x65, 0x94, 0xa0, 0x3b, 0x72]
        );
    }
}
