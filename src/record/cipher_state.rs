//! Record protection for one direction.
//!
//! Three shapes of protection exist in TLS 1.0 to 1.2:
//!
//! - null, before the first ChangeCipherSpec
//! - MAC-then-encrypt with a CBC block cipher
//! - AEAD (AES-GCM)
//!
//! CBC records in TLS 1.0 chain the IV from the previous record. TLS 1.1+
//! and DTLS send a fresh IV block in front of every record.

use rand::RngCore;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeGreater};

use crate::buffer::Buf;
use crate::crypto::{AeadCipher, BlockCipher, CryptoProvider, HmacProvider, Secret};
use crate::message::RecordHeader;
use crate::suite::CipherSuite;
use crate::types::{ContentType, HashAlgorithm, ProtocolVersion, Sequence};
use crate::{Error, SeededRng};

/// Largest plaintext in a record.
pub const MAX_PLAINTEXT_LEN: usize = 1 << 14;

/// Largest protected fragment in a record.
pub const MAX_CIPHERTEXT_LEN: usize = MAX_PLAINTEXT_LEN + 2048;

const EXPLICIT_NONCE_LEN: usize = 8;

// Largest sequence number usable on the DTLS wire.
const MAX_DTLS_SEQUENCE: u64 = (1 << 48) - 1;

enum Protection {
    Null,
    Block {
        cipher: Box<dyn BlockCipher>,
        mac_hash: HashAlgorithm,
        mac_key: Secret,
        /// TLS 1.0 only, the last ciphertext block.
        chained_iv: Option<Buf>,
    },
    Aead {
        cipher: Box<dyn AeadCipher>,
        fixed_iv: Secret,
    },
}

/// Keys and counters for one direction of one epoch.
pub struct CipherState {
    dtls: bool,
    version: ProtocolVersion,
    suite: CipherSuite,
    protection: Protection,
    hmac: &'static dyn HmacProvider,
    sequence: Sequence,
}

impl CipherState {
    /// The initial state, records are sent in the clear.
    pub fn null(provider: &CryptoProvider, version: ProtocolVersion, dtls: bool) -> Self {
        CipherState {
            dtls,
            version,
            suite: CipherSuite::NULL_WITH_NULL_NULL,
            protection: Protection::Null,
            hmac: provider.hmac_provider,
            sequence: Sequence::new(0),
        }
    }

    /// Keyed state for `suite`. `iv` is the CBC IV or the AEAD salt.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: &CryptoProvider,
        version: ProtocolVersion,
        dtls: bool,
        suite: CipherSuite,
        epoch: u16,
        mac_key: &Secret,
        key: &Secret,
        iv: &Secret,
    ) -> Result<Self, Error> {
        let bulk = suite.bulk_cipher();

        let protection = if bulk.is_aead() {
            let cipher = provider
                .ciphers
                .create_aead(bulk, key)
                .map_err(Error::CryptoError)?;
            Protection::Aead {
                cipher,
                fixed_iv: iv.clone(),
            }
        } else if bulk.is_block() {
            let mac_hash = suite
                .mac_algorithm()
                .hash()
                .ok_or_else(|| Error::CryptoError(format!("{} has no MAC", suite)))?;
            let cipher = provider
                .ciphers
                .create_block_cipher(bulk, key)
                .map_err(Error::CryptoError)?;
            let chained_iv = (!version.has_explicit_iv()).then(|| Buf::from_slice(iv));
            Protection::Block {
                cipher,
                mac_hash,
                mac_key: mac_key.clone(),
                chained_iv,
            }
        } else {
            Protection::Null
        };

        Ok(CipherState {
            dtls,
            version,
            suite,
            protection,
            hmac: provider.hmac_provider,
            sequence: Sequence::new(epoch),
        })
    }

    pub fn epoch(&self) -> u16 {
        self.sequence.epoch
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// Record version, updated once the version is negotiated.
    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.version = version;
    }

    /// Bytes added to a plaintext of `len` when protected, at most.
    pub fn overhead(&self) -> usize {
        match &self.protection {
            Protection::Null => 0,
            Protection::Block {
                cipher, mac_hash, ..
            } => {
                let block = cipher.block_len();
                let iv = if self.version.has_explicit_iv() { block } else { 0 };
                iv + mac_hash.output_len() + block
            }
            Protection::Aead { cipher, .. } => EXPLICIT_NONCE_LEN + cipher.tag_len(),
        }
    }

    fn next_sequence(&mut self) -> Result<Sequence, Error> {
        let current = self.sequence;
        let limit = if self.dtls {
            MAX_DTLS_SEQUENCE
        } else {
            u64::MAX
        };
        if current.sequence_number >= limit {
            return Err(Error::CryptoError("Sequence number exhausted".into()));
        }
        self.sequence.sequence_number += 1;
        Ok(current)
    }

    /// Protect `plaintext` and append the whole record, header included.
    pub fn encode_record(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
        rng: &mut SeededRng,
        output: &mut Buf,
    ) -> Result<(), Error> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(Error::RecordOverflow(plaintext.len()));
        }

        let sequence = self.next_sequence()?;
        let seq_bytes = sequence.to_bytes(self.dtls);
        let version = self.version;

        let mut fragment = Buf::with_capacity(plaintext.len() + self.overhead());

        match &mut self.protection {
            Protection::Null => fragment.extend_from_slice(plaintext),

            Protection::Block {
                cipher,
                mac_hash,
                mac_key,
                chained_iv,
            } => {
                let block = cipher.block_len();

                let iv = match chained_iv {
                    Some(iv) => iv.to_vec(),
                    None => {
                        let mut iv = vec![0u8; block];
                        rng.fill_bytes(&mut iv);
                        fragment.extend_from_slice(&iv);
                        iv
                    }
                };
                let start = fragment.len();

                fragment.extend_from_slice(plaintext);
                let header = mac_header(&seq_bytes, content_type, version, plaintext.len());
                self.hmac
                    .hmac(*mac_hash, mac_key, &[&header, plaintext], &mut fragment)
                    .map_err(Error::CryptoError)?;

                // Padding bytes and the padding length byte all carry the
                // padding length.
                let content_len = fragment.len() - start;
                let pad = block - (content_len + 1) % block;
                fragment.resize(fragment.len() + pad + 1, pad as u8);

                cipher
                    .encrypt(&iv, &mut fragment[start..])
                    .map_err(Error::CryptoError)?;

                if let Some(chained) = chained_iv {
                    chained.clear();
                    chained.extend_from_slice(&fragment[fragment.len() - block..]);
                }
            }

            Protection::Aead { cipher, fixed_iv } => {
                let nonce = aead_nonce(fixed_iv, &seq_bytes);
                let aad = mac_header(&seq_bytes, content_type, version, plaintext.len());

                let mut sealed = Buf::from_slice(plaintext);
                cipher
                    .seal(&nonce, &aad, &mut sealed)
                    .map_err(Error::CryptoError)?;

                fragment.extend_from_slice(&seq_bytes);
                fragment.extend_from_slice(&sealed);
            }
        }

        let header = RecordHeader {
            content_type,
            version,
            sequence,
            length: fragment.len() as u16,
        };
        header.serialize(self.dtls, output);
        output.extend_from_slice(&fragment);

        trace!(
            "Encoded {:?} record epoch {} seq {} ({} bytes)",
            content_type,
            sequence.epoch,
            sequence.sequence_number,
            plaintext.len()
        );

        Ok(())
    }

    /// Remove protection from a record fragment.
    ///
    /// DTLS takes the sequence from the header; TLS uses the implicit read
    /// counter.
    pub fn decode_record(&mut self, header: &RecordHeader, fragment: &[u8]) -> Result<Buf, Error> {
        if fragment.len() > MAX_CIPHERTEXT_LEN {
            return Err(Error::RecordOverflow(fragment.len()));
        }

        let sequence = if self.dtls {
            header.sequence
        } else {
            self.next_sequence()?
        };
        let seq_bytes = sequence.to_bytes(self.dtls);
        let explicit_iv = self.version.has_explicit_iv();

        let plaintext = match &mut self.protection {
            Protection::Null => Buf::from_slice(fragment),

            Protection::Block {
                cipher,
                mac_hash,
                mac_key,
                chained_iv,
            } => {
                let block = cipher.block_len();
                let mac_len = mac_hash.output_len();

                let (iv, body) = if explicit_iv {
                    if fragment.len() < block {
                        return Err(bad_record("short fragment"));
                    }
                    (fragment[..block].to_vec(), &fragment[block..])
                } else {
                    (chained_iv.as_deref().unwrap_or_default().to_vec(), fragment)
                };

                if body.is_empty() || body.len() % block != 0 || body.len() < mac_len + 1 {
                    return Err(bad_record("fragment length"));
                }

                if let Some(chained) = chained_iv {
                    chained.clear();
                    chained.extend_from_slice(&body[body.len() - block..]);
                }

                let mut data = Buf::from_slice(body);
                cipher
                    .decrypt(&iv, &mut data)
                    .map_err(|_| bad_record("decrypt"))?;

                let (content_len, padding_ok) = check_padding(&data, mac_len);

                let mut expected = Buf::new();
                let mac_header =
                    mac_header(&seq_bytes, header.content_type, header.version, content_len);
                self.hmac
                    .hmac(
                        *mac_hash,
                        mac_key,
                        &[&mac_header, &data[..content_len]],
                        &mut expected,
                    )
                    .map_err(Error::CryptoError)?;

                let received = &data[content_len..content_len + mac_len];
                let mac_ok = expected.ct_eq(received);

                if !bool::from(padding_ok & mac_ok) {
                    data.wipe();
                    return Err(bad_record("padding or MAC"));
                }

                data.truncate(content_len);
                data
            }

            Protection::Aead { cipher, fixed_iv } => {
                let tag_len = cipher.tag_len();
                if fragment.len() < EXPLICIT_NONCE_LEN + tag_len {
                    return Err(bad_record("short fragment"));
                }
                let (explicit, sealed) = fragment.split_at(EXPLICIT_NONCE_LEN);
                let nonce = aead_nonce(fixed_iv, explicit);
                let aad = mac_header(
                    &seq_bytes,
                    header.content_type,
                    header.version,
                    sealed.len() - tag_len,
                );

                let mut data = Buf::from_slice(sealed);
                cipher
                    .open(&nonce, &aad, &mut data)
                    .map_err(|_| bad_record("AEAD open"))?;
                data
            }
        };

        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(Error::RecordOverflow(plaintext.len()));
        }

        Ok(plaintext)
    }
}

impl std::fmt::Debug for CipherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherState")
            .field("suite", &self.suite)
            .field("version", &self.version)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

fn bad_record(reason: &str) -> Error {
    trace!("Record rejected: {}", reason);
    Error::BadRecordMac
}

/// `seq || type || version || length`, the MAC prefix and AEAD additional
/// data.
fn mac_header(
    seq: &[u8; 8],
    content_type: ContentType,
    version: ProtocolVersion,
    len: usize,
) -> [u8; 13] {
    let mut out = [0u8; 13];
    out[..8].copy_from_slice(seq);
    out[8] = content_type.as_u8();
    out[9..11].copy_from_slice(&version.as_u16().to_be_bytes());
    out[11..].copy_from_slice(&(len as u16).to_be_bytes());
    out
}

fn aead_nonce(fixed_iv: &[u8], explicit: &[u8]) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..4].copy_from_slice(fixed_iv);
    nonce[4..].copy_from_slice(explicit);
    nonce
}

/// Validate CBC padding without branching on the padding bytes.
///
/// Returns the content length and whether the padding was good. On bad
/// padding the content length assumes no padding so the MAC is still
/// computed over a plausible range.
fn check_padding(data: &[u8], mac_len: usize) -> (usize, Choice) {
    let len = data.len();
    let pad = data[len - 1];
    let pad_len = pad as usize;

    // pad + 1 + mac_len must fit.
    let room = (len - mac_len - 1) as u64;
    let mut good = !(pad_len as u64).ct_gt(&room);

    // Look at the largest possible padding run, every byte covered by the
    // padding length must equal it.
    let span = len.min(256);
    for i in 0..span {
        let b = data[len - 1 - i];
        let in_padding = !(i as u64).ct_gt(&(pad_len as u64));
        good &= !in_padding | b.ct_eq(&pad);
    }

    let with_padding = (len - mac_len - 1).saturating_sub(pad_len) as u64;
    let without_padding = (len - mac_len - 1) as u64;
    let content_len = u64::conditional_select(&without_padding, &with_padding, good);

    (content_len as usize, good)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;
    use crate::message::Record;

    fn rng() -> SeededRng {
        SeededRng::new(Some(7), rust_crypto::default_provider().secure_random)
    }

    fn pair(
        suite: CipherSuite,
        version: ProtocolVersion,
        dtls: bool,
    ) -> (CipherState, CipherState) {
        let provider = rust_crypto::default_provider();
        let bulk = suite.bulk_cipher();
        let mac = Secret::from_slice(&vec![0x11; suite.mac_algorithm().output_len()]);
        let key = Secret::from_slice(&vec![0x22; bulk.expanded_key_len()]);
        let iv_len = if bulk.is_aead() { 4 } else { bulk.block_len() };
        let iv = Secret::from_slice(&vec![0x33; iv_len]);
        let w = CipherState::new(&provider, version, dtls, suite, 1, &mac, &key, &iv).unwrap();
        let r = CipherState::new(&provider, version, dtls, suite, 1, &mac, &key, &iv).unwrap();
        (w, r)
    }

    fn roundtrip(suite: CipherSuite, version: ProtocolVersion, dtls: bool) {
        let (mut w, mut r) = pair(suite, version, dtls);
        let mut rng = rng();
        for len in [0usize, 1, 15, 16, 17, 1000, MAX_PLAINTEXT_LEN - 1, MAX_PLAINTEXT_LEN] {
            let plaintext: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let mut wire = Buf::new();
            w.encode_record(ContentType::ApplicationData, &plaintext, &mut rng, &mut wire)
                .unwrap();
            let (rest, record) = Record::parse(&wire, dtls).unwrap();
            assert!(rest.is_empty());
            let out = r.decode_record(&record.header, record.fragment).unwrap();
            assert_eq!(&*out, &plaintext[..], "{} {:?} len {}", suite, version, len);
        }
    }

    #[test]
    fn roundtrip_all_suites() {
        for suite in CipherSuite::all() {
            for version in [
                ProtocolVersion::TLS1_0,
                ProtocolVersion::TLS1_1,
                ProtocolVersion::TLS1_2,
                ProtocolVersion::DTLS1_0,
                ProtocolVersion::DTLS1_2,
            ] {
                if suite.supports(version) {
                    roundtrip(*suite, version, version.is_dtls());
                }
            }
        }
    }

    #[test]
    fn sequence_increments() {
        let (mut w, _) = pair(
            CipherSuite::RSA_WITH_AES_128_GCM_SHA256,
            ProtocolVersion::DTLS1_2,
            true,
        );
        let mut rng = rng();
        let mut seqs = vec![];
        for _ in 0..3 {
            let mut wire = Buf::new();
            w.encode_record(ContentType::ApplicationData, b"x", &mut rng, &mut wire)
                .unwrap();
            let (_, record) = Record::parse(&wire, true).unwrap();
            seqs.push(record.header.sequence.sequence_number);
            assert_eq!(record.header.sequence.epoch, 1);
        }
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn tampered_record_is_bad_mac() {
        for suite in [
            CipherSuite::RSA_WITH_AES_128_CBC_SHA,
            CipherSuite::RSA_WITH_AES_128_GCM_SHA256,
        ] {
            let (mut w, mut r) = pair(suite, ProtocolVersion::TLS1_2, false);
            let mut wire = Buf::new();
            w.encode_record(ContentType::ApplicationData, b"hello", &mut rng(), &mut wire)
                .unwrap();
            let last = wire.len() - 1;
            wire[last] ^= 0x80;
            let (_, record) = Record::parse(&wire, false).unwrap();
            let err = r.decode_record(&record.header, record.fragment);
            assert!(matches!(err, Err(Error::BadRecordMac)));
        }
    }

    #[test]
    fn bad_padding_indistinguishable_from_bad_mac() {
        let provider = rust_crypto::default_provider();
        let suite = CipherSuite::RSA_WITH_AES_128_CBC_SHA;
        let (_, mut r) = pair(suite, ProtocolVersion::TLS1_2, false);
        let key = Secret::from_slice(&[0x22; 16]);
        let mut cipher = provider
            .ciphers
            .create_block_cipher(suite.bulk_cipher(), &key)
            .unwrap();

        // 32 byte body: 5 content, 20 MAC (garbage), padding claims 9 but
        // bytes disagree.
        let mut body = vec![0u8; 32];
        body[31] = 9;
        body[30] = 9;
        body[29] = 1;
        let iv = [0u8; 16];
        cipher.encrypt(&iv, &mut body).unwrap();

        let mut fragment = iv.to_vec();
        fragment.extend_from_slice(&body);
        let header = RecordHeader {
            content_type: ContentType::ApplicationData,
            version: ProtocolVersion::TLS1_2,
            sequence: Sequence::default(),
            length: fragment.len() as u16,
        };
        let err = r.decode_record(&header, &fragment);
        assert!(matches!(err, Err(Error::BadRecordMac)));
    }

    #[test]
    fn padding_check() {
        // 4 content, 2 MAC, 2 padding bytes + length
        let data = [1, 2, 3, 4, 9, 9, 2, 2, 2];
        let (len, ok) = check_padding(&data, 2);
        assert!(bool::from(ok));
        assert_eq!(len, 4);

        let data = [1, 2, 3, 4, 9, 9, 2, 3, 2];
        let (_, ok) = check_padding(&data, 2);
        assert!(!bool::from(ok));

        // Padding longer than the record.
        let data = [1, 2, 200];
        let (len, ok) = check_padding(&data, 1);
        assert!(!bool::from(ok));
        assert_eq!(len, 1);
    }

    #[test]
    fn oversized_plaintext() {
        let (mut w, _) = pair(
            CipherSuite::RSA_WITH_AES_128_GCM_SHA256,
            ProtocolVersion::TLS1_2,
            false,
        );
        let big = vec![0u8; MAX_PLAINTEXT_LEN + 1];
        let err = w.encode_record(ContentType::ApplicationData, &big, &mut rng(), &mut Buf::new());
        assert!(matches!(err, Err(Error::RecordOverflow(_))));
    }

    #[test]
    fn oversized_plaintext_received() {
        let provider = rust_crypto::default_provider();
        let mut r = CipherState::null(&provider, ProtocolVersion::TLS1_2, false);
        let big = vec![0u8; MAX_PLAINTEXT_LEN + 1];
        let header = RecordHeader {
            content_type: ContentType::ApplicationData,
            version: ProtocolVersion::TLS1_2,
            sequence: Sequence::default(),
            length: big.len() as u16,
        };
        let err = r.decode_record(&header, &big);
        assert!(matches!(err, Err(Error::RecordOverflow(n)) if n == MAX_PLAINTEXT_LEN + 1));
    }

    #[test]
    fn tls_record_decoded_twice_fails_mac() {
        for suite in [
            CipherSuite::RSA_WITH_AES_128_CBC_SHA,
            CipherSuite::ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        ] {
            let (mut w, mut r) = pair(suite, ProtocolVersion::TLS1_2, false);
            let mut wire = Buf::new();
            w.encode_record(ContentType::ApplicationData, b"once", &mut rng(), &mut wire)
                .unwrap();
            let (_, record) = Record::parse(&wire, false).unwrap();

            assert_eq!(&*r.decode_record(&record.header, record.fragment).unwrap(), b"once");
            // The implicit read sequence has moved on to 1.
            let err = r.decode_record(&record.header, record.fragment);
            assert!(matches!(err, Err(Error::BadRecordMac)), "{}", suite);
        }
    }

    #[test]
    fn tls10_chains_iv() {
        let (mut w, mut r) = pair(
            CipherSuite::RSA_WITH_AES_128_CBC_SHA,
            ProtocolVersion::TLS1_0,
            false,
        );
        let mut rng = rng();
        let mut a = Buf::new();
        let mut b = Buf::new();
        w.encode_record(ContentType::ApplicationData, b"same", &mut rng, &mut a)
            .unwrap();
        w.encode_record(ContentType::ApplicationData, b"same", &mut rng, &mut b)
            .unwrap();
        // No explicit IV: 4 + 20 + padding to 32
        assert_eq!(a.len(), 5 + 32);
        assert_ne!(a[5..], b[5..]);

        for wire in [&a, &b] {
            let (_, record) = Record::parse(wire, false).unwrap();
            assert_eq!(&*r.decode_record(&record.header, record.fragment).unwrap(), b"same");
        }
    }
}
