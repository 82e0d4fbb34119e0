//! Cipher suites and their immutable parameters.

use std::fmt;

use nom::number::complete::be_u16;
use nom::IResult;

use crate::types::{HashAlgorithm, ProtocolVersion, SignatureAlgorithm};

/// Cipher suites known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    /// Initial state before any suite is negotiated. Never offered.
    NULL_WITH_NULL_NULL,
    RSA_EXPORT_WITH_DES40_CBC_SHA,
    RSA_WITH_3DES_EDE_CBC_SHA,
    RSA_WITH_AES_128_CBC_SHA,
    RSA_WITH_AES_256_CBC_SHA,
    RSA_WITH_AES_128_CBC_SHA256,
    RSA_WITH_AES_128_GCM_SHA256,
    RSA_WITH_AES_256_GCM_SHA384,
    DHE_RSA_WITH_AES_128_CBC_SHA,
    DHE_RSA_WITH_AES_128_CBC_SHA256,
    DHE_RSA_WITH_AES_128_GCM_SHA256,
    ECDHE_RSA_WITH_AES_128_CBC_SHA,
    ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
    ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    ECDH_ECDSA_WITH_AES_128_CBC_SHA,
    ECDH_ECDSA_WITH_AES_128_GCM_SHA256,
    ECDH_RSA_WITH_AES_128_CBC_SHA,
    PSK_WITH_AES_128_CBC_SHA,
    PSK_WITH_AES_128_GCM_SHA256,
    PSK_WITH_AES_128_CBC_SHA256,
    /// Secure renegotiation signalling value (RFC 5746), not a real suite.
    EMPTY_RENEGOTIATION_INFO_SCSV,
    Unknown(u16),
}

/// How the premaster secret is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlgorithm {
    Null,
    Rsa,
    RsaExport,
    DheRsa,
    EcdheRsa,
    EcdheEcdsa,
    EcdhEcdsa,
    EcdhRsa,
    Psk,
}

impl KeyExchangeAlgorithm {
    /// Whether the server sends signed parameters in ServerKeyExchange.
    pub fn is_signed_ephemeral(&self) -> bool {
        matches!(
            self,
            KeyExchangeAlgorithm::DheRsa
                | KeyExchangeAlgorithm::EcdheRsa
                | KeyExchangeAlgorithm::EcdheEcdsa
        )
    }

    /// Key type the server certificate must carry, `None` for suites
    /// without a server certificate.
    pub fn server_key_algorithm(&self) -> Option<SignatureAlgorithm> {
        use KeyExchangeAlgorithm::*;
        match self {
            Rsa | RsaExport | DheRsa | EcdheRsa => Some(SignatureAlgorithm::RSA),
            // For ECDH_RSA the certificate holds an EC key signed by an RSA CA.
            EcdheEcdsa | EcdhEcdsa | EcdhRsa => Some(SignatureAlgorithm::ECDSA),
            Null | Psk => None,
        }
    }

    /// Signature algorithm of ServerKeyExchange, when signed.
    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        match self {
            KeyExchangeAlgorithm::DheRsa | KeyExchangeAlgorithm::EcdheRsa => {
                Some(SignatureAlgorithm::RSA)
            }
            KeyExchangeAlgorithm::EcdheEcdsa => Some(SignatureAlgorithm::ECDSA),
            _ => None,
        }
    }
}

/// Bulk encryption algorithm of a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkCipher {
    Null,
    Des40Cbc,
    TripleDesCbc,
    Aes128Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
}

impl BulkCipher {
    /// Key bytes taken from the key block.
    ///
    /// For the export cipher this is the 5 byte secret part; the final 8
    /// byte DES key is derived in a second PRF pass.
    pub fn key_len(&self) -> usize {
        match self {
            BulkCipher::Null => 0,
            BulkCipher::Des40Cbc => 5,
            BulkCipher::TripleDesCbc => 24,
            BulkCipher::Aes128Cbc | BulkCipher::Aes128Gcm => 16,
            BulkCipher::Aes256Cbc | BulkCipher::Aes256Gcm => 32,
        }
    }

    /// Length of the key handed to the cipher.
    pub fn expanded_key_len(&self) -> usize {
        match self {
            BulkCipher::Des40Cbc => 8,
            _ => self.key_len(),
        }
    }

    /// Cipher block length, 0 for stream-like (null, AEAD).
    pub fn block_len(&self) -> usize {
        match self {
            BulkCipher::Des40Cbc | BulkCipher::TripleDesCbc => 8,
            BulkCipher::Aes128Cbc | BulkCipher::Aes256Cbc => 16,
            _ => 0,
        }
    }

    /// IV bytes taken from the key block.
    pub fn fixed_iv_len(&self) -> usize {
        match self {
            BulkCipher::Null => 0,
            // Export IVs come from a separate "IV block" PRF pass.
            BulkCipher::Des40Cbc => 0,
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm => 4,
            _ => self.block_len(),
        }
    }

    pub fn is_aead(&self) -> bool {
        matches!(self, BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm)
    }

    pub fn is_block(&self) -> bool {
        self.block_len() > 0
    }
}

/// Record MAC algorithm of a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAlgorithm {
    Null,
    HmacSha1,
    HmacSha256,
    HmacSha384,
}

impl MacAlgorithm {
    pub fn hash(&self) -> Option<HashAlgorithm> {
        match self {
            MacAlgorithm::Null => None,
            MacAlgorithm::HmacSha1 => Some(HashAlgorithm::SHA1),
            MacAlgorithm::HmacSha256 => Some(HashAlgorithm::SHA256),
            MacAlgorithm::HmacSha384 => Some(HashAlgorithm::SHA384),
        }
    }

    pub fn output_len(&self) -> usize {
        self.hash().map(|h| h.output_len()).unwrap_or(0)
    }
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        use CipherSuite::*;
        match value {
            0x0000 => NULL_WITH_NULL_NULL,
            0x0008 => RSA_EXPORT_WITH_DES40_CBC_SHA,
            0x000A => RSA_WITH_3DES_EDE_CBC_SHA,
            0x002F => RSA_WITH_AES_128_CBC_SHA,
            0x0035 => RSA_WITH_AES_256_CBC_SHA,
            0x003C => RSA_WITH_AES_128_CBC_SHA256,
            0x009C => RSA_WITH_AES_128_GCM_SHA256,
            0x009D => RSA_WITH_AES_256_GCM_SHA384,
            0x0033 => DHE_RSA_WITH_AES_128_CBC_SHA,
            0x0067 => DHE_RSA_WITH_AES_128_CBC_SHA256,
            0x009E => DHE_RSA_WITH_AES_128_GCM_SHA256,
            0xC013 => ECDHE_RSA_WITH_AES_128_CBC_SHA,
            0xC02F => ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            0xC030 => ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            0xC009 => ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
            0xC02B => ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            0xC02C => ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            0xC004 => ECDH_ECDSA_WITH_AES_128_CBC_SHA,
            0xC02D => ECDH_ECDSA_WITH_AES_128_GCM_SHA256,
            0xC00E => ECDH_RSA_WITH_AES_128_CBC_SHA,
            0x008C => PSK_WITH_AES_128_CBC_SHA,
            0x00A8 => PSK_WITH_AES_128_GCM_SHA256,
            0x00AE => PSK_WITH_AES_128_CBC_SHA256,
            0x00FF => EMPTY_RENEGOTIATION_INFO_SCSV,
            _ => Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        use CipherSuite::*;
        match self {
            NULL_WITH_NULL_NULL => 0x0000,
            RSA_EXPORT_WITH_DES40_CBC_SHA => 0x0008,
            RSA_WITH_3DES_EDE_CBC_SHA => 0x000A,
            RSA_WITH_AES_128_CBC_SHA => 0x002F,
            RSA_WITH_AES_256_CBC_SHA => 0x0035,
            RSA_WITH_AES_128_CBC_SHA256 => 0x003C,
            RSA_WITH_AES_128_GCM_SHA256 => 0x009C,
            RSA_WITH_AES_256_GCM_SHA384 => 0x009D,
            DHE_RSA_WITH_AES_128_CBC_SHA => 0x0033,
            DHE_RSA_WITH_AES_128_CBC_SHA256 => 0x0067,
            DHE_RSA_WITH_AES_128_GCM_SHA256 => 0x009E,
            ECDHE_RSA_WITH_AES_128_CBC_SHA => 0xC013,
            ECDHE_RSA_WITH_AES_128_GCM_SHA256 => 0xC02F,
            ECDHE_RSA_WITH_AES_256_GCM_SHA384 => 0xC030,
            ECDHE_ECDSA_WITH_AES_128_CBC_SHA => 0xC009,
            ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 => 0xC02B,
            ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => 0xC02C,
            ECDH_ECDSA_WITH_AES_128_CBC_SHA => 0xC004,
            ECDH_ECDSA_WITH_AES_128_GCM_SHA256 => 0xC02D,
            ECDH_RSA_WITH_AES_128_CBC_SHA => 0xC00E,
            PSK_WITH_AES_128_CBC_SHA => 0x008C,
            PSK_WITH_AES_128_GCM_SHA256 => 0x00A8,
            PSK_WITH_AES_128_CBC_SHA256 => 0x00AE,
            EMPTY_RENEGOTIATION_INFO_SCSV => 0x00FF,
            Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, CipherSuite::from_u16(value)))
    }

    pub fn key_exchange(&self) -> KeyExchangeAlgorithm {
        use CipherSuite::*;
        use KeyExchangeAlgorithm as K;
        match self {
            RSA_EXPORT_WITH_DES40_CBC_SHA => K::RsaExport,
            RSA_WITH_3DES_EDE_CBC_SHA
            | RSA_WITH_AES_128_CBC_SHA
            | RSA_WITH_AES_256_CBC_SHA
            | RSA_WITH_AES_128_CBC_SHA256
            | RSA_WITH_AES_128_GCM_SHA256
            | RSA_WITH_AES_256_GCM_SHA384 => K::Rsa,
            DHE_RSA_WITH_AES_128_CBC_SHA
            | DHE_RSA_WITH_AES_128_CBC_SHA256
            | DHE_RSA_WITH_AES_128_GCM_SHA256 => K::DheRsa,
            ECDHE_RSA_WITH_AES_128_CBC_SHA
            | ECDHE_RSA_WITH_AES_128_GCM_SHA256
            | ECDHE_RSA_WITH_AES_256_GCM_SHA384 => K::EcdheRsa,
            ECDHE_ECDSA_WITH_AES_128_CBC_SHA
            | ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
            | ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => K::EcdheEcdsa,
            ECDH_ECDSA_WITH_AES_128_CBC_SHA | ECDH_ECDSA_WITH_AES_128_GCM_SHA256 => K::EcdhEcdsa,
            ECDH_RSA_WITH_AES_128_CBC_SHA => K::EcdhRsa,
            PSK_WITH_AES_128_CBC_SHA | PSK_WITH_AES_128_GCM_SHA256 | PSK_WITH_AES_128_CBC_SHA256 => {
                K::Psk
            }
            NULL_WITH_NULL_NULL | EMPTY_RENEGOTIATION_INFO_SCSV | Unknown(_) => K::Null,
        }
    }

    pub fn bulk_cipher(&self) -> BulkCipher {
        use CipherSuite::*;
        match self {
            RSA_EXPORT_WITH_DES40_CBC_SHA => BulkCipher::Des40Cbc,
            RSA_WITH_3DES_EDE_CBC_SHA => BulkCipher::TripleDesCbc,
            RSA_WITH_AES_256_CBC_SHA => BulkCipher::Aes256Cbc,
            RSA_WITH_AES_128_CBC_SHA
            | RSA_WITH_AES_128_CBC_SHA256
            | DHE_RSA_WITH_AES_128_CBC_SHA
            | DHE_RSA_WITH_AES_128_CBC_SHA256
            | ECDHE_RSA_WITH_AES_128_CBC_SHA
            | ECDHE_ECDSA_WITH_AES_128_CBC_SHA
            | ECDH_ECDSA_WITH_AES_128_CBC_SHA
            | ECDH_RSA_WITH_AES_128_CBC_SHA
            | PSK_WITH_AES_128_CBC_SHA
            | PSK_WITH_AES_128_CBC_SHA256 => BulkCipher::Aes128Cbc,
            RSA_WITH_AES_128_GCM_SHA256
            | DHE_RSA_WITH_AES_128_GCM_SHA256
            | ECDHE_RSA_WITH_AES_128_GCM_SHA256
            | ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
            | ECDH_ECDSA_WITH_AES_128_GCM_SHA256
            | PSK_WITH_AES_128_GCM_SHA256 => BulkCipher::Aes128Gcm,
            RSA_WITH_AES_256_GCM_SHA384
            | ECDHE_RSA_WITH_AES_256_GCM_SHA384
            | ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => BulkCipher::Aes256Gcm,
            NULL_WITH_NULL_NULL | EMPTY_RENEGOTIATION_INFO_SCSV | Unknown(_) => BulkCipher::Null,
        }
    }

    pub fn mac_algorithm(&self) -> MacAlgorithm {
        use CipherSuite::*;
        if self.bulk_cipher().is_aead() {
            return MacAlgorithm::Null;
        }
        match self {
            RSA_WITH_AES_128_CBC_SHA256
            | DHE_RSA_WITH_AES_128_CBC_SHA256
            | PSK_WITH_AES_128_CBC_SHA256 => MacAlgorithm::HmacSha256,
            NULL_WITH_NULL_NULL | EMPTY_RENEGOTIATION_INFO_SCSV | Unknown(_) => MacAlgorithm::Null,
            _ => MacAlgorithm::HmacSha1,
        }
    }

    /// PRF hash at TLS 1.2. Earlier versions always use MD5+SHA1.
    pub fn prf_hash(&self) -> HashAlgorithm {
        use CipherSuite::*;
        match self {
            RSA_WITH_AES_256_GCM_SHA384
            | ECDHE_RSA_WITH_AES_256_GCM_SHA384
            | ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => HashAlgorithm::SHA384,
            _ => HashAlgorithm::SHA256,
        }
    }

    pub fn is_export(&self) -> bool {
        self.key_exchange() == KeyExchangeAlgorithm::RsaExport
    }

    /// Whether this suite may be negotiated at `version`.
    pub fn supports(&self, version: ProtocolVersion) -> bool {
        if self.key_exchange() == KeyExchangeAlgorithm::Null {
            return false;
        }
        let needs_tls12 = self.bulk_cipher().is_aead()
            || matches!(
                self.mac_algorithm(),
                MacAlgorithm::HmacSha256 | MacAlgorithm::HmacSha384
            );
        if needs_tls12 && !version.is_tls12() {
            return false;
        }
        // Export suites were removed in TLS 1.1.
        if self.is_export() && version != ProtocolVersion::TLS1_0 {
            return false;
        }
        true
    }

    pub fn requires_certificate(&self) -> bool {
        self.key_exchange().server_key_algorithm().is_some()
    }

    pub fn all() -> &'static [CipherSuite] {
        use CipherSuite::*;
        &[
            ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
            ECDHE_RSA_WITH_AES_128_CBC_SHA,
            DHE_RSA_WITH_AES_128_GCM_SHA256,
            DHE_RSA_WITH_AES_128_CBC_SHA256,
            DHE_RSA_WITH_AES_128_CBC_SHA,
            ECDH_ECDSA_WITH_AES_128_GCM_SHA256,
            ECDH_ECDSA_WITH_AES_128_CBC_SHA,
            ECDH_RSA_WITH_AES_128_CBC_SHA,
            RSA_WITH_AES_128_GCM_SHA256,
            RSA_WITH_AES_256_GCM_SHA384,
            RSA_WITH_AES_128_CBC_SHA256,
            RSA_WITH_AES_128_CBC_SHA,
            RSA_WITH_AES_256_CBC_SHA,
            RSA_WITH_3DES_EDE_CBC_SHA,
            PSK_WITH_AES_128_GCM_SHA256,
            PSK_WITH_AES_128_CBC_SHA256,
            PSK_WITH_AES_128_CBC_SHA,
            RSA_EXPORT_WITH_DES40_CBC_SHA,
        ]
    }

    /// Suites enabled unless configured otherwise: everything except
    /// export, PSK and static ECDH.
    pub fn default_suites() -> Vec<CipherSuite> {
        Self::all()
            .iter()
            .copied()
            .filter(|s| {
                !s.is_export()
                    && !matches!(
                        s.key_exchange(),
                        KeyExchangeAlgorithm::Psk
                            | KeyExchangeAlgorithm::EcdhEcdsa
                            | KeyExchangeAlgorithm::EcdhRsa
                    )
            })
            .collect()
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherSuite::Unknown(v) => write!(f, "Unknown({:04x})", v),
            _ => write!(f, "TLS_{:?}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcm_requires_tls12() {
        let s = CipherSuite::ECDHE_RSA_WITH_AES_128_GCM_SHA256;
        assert!(s.supports(ProtocolVersion::TLS1_2));
        assert!(s.supports(ProtocolVersion::DTLS1_2));
        assert!(!s.supports(ProtocolVersion::TLS1_1));
        assert!(!s.supports(ProtocolVersion::DTLS1_0));
    }

    #[test]
    fn export_only_in_tls10() {
        let s = CipherSuite::RSA_EXPORT_WITH_DES40_CBC_SHA;
        assert!(s.supports(ProtocolVersion::TLS1_0));
        assert!(!s.supports(ProtocolVersion::TLS1_1));
        assert_eq!(s.bulk_cipher().key_len(), 5);
        assert_eq!(s.bulk_cipher().expanded_key_len(), 8);
    }

    #[test]
    fn codes_roundtrip_for_all() {
        for s in CipherSuite::all() {
            assert_eq!(CipherSuite::from_u16(s.as_u16()), *s);
        }
    }

    #[test]
    fn scsv_is_never_negotiable() {
        let s = CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV;
        assert!(!s.supports(ProtocolVersion::TLS1_2));
        assert!(!CipherSuite::NULL_WITH_NULL_NULL.supports(ProtocolVersion::TLS1_2));
    }

    #[test]
    fn sha384_suites_use_sha384_prf() {
        assert_eq!(
            CipherSuite::ECDHE_ECDSA_WITH_AES_256_GCM_SHA384.prf_hash(),
            HashAlgorithm::SHA384
        );
        assert_eq!(
            CipherSuite::RSA_WITH_AES_128_CBC_SHA.mac_algorithm().output_len(),
            20
        );
    }
}
