//! Wire level enumerations shared by the record layer and handshake.

use std::cmp::Ordering;
use std::fmt;

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::buffer::Buf;

// ============================================================================
// Protocol Version
// ============================================================================

/// Stream (TLS) or datagram (DTLS) flavour of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// TLS over a reliable byte stream.
    Tls,
    /// DTLS over an unreliable datagram transport.
    Dtls,
}

/// Protocol versions understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ProtocolVersion {
    /// TLS 1.0 (RFC 2246).
    TLS1_0,
    /// TLS 1.1 (RFC 4346).
    TLS1_1,
    /// TLS 1.2 (RFC 5246).
    TLS1_2,
    /// DTLS 1.0 (RFC 4347).
    DTLS1_0,
    /// DTLS 1.2 (RFC 6347).
    DTLS1_2,
    /// Anything else seen on the wire.
    Unknown(u16),
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0301 => ProtocolVersion::TLS1_0,
            0x0302 => ProtocolVersion::TLS1_1,
            0x0303 => ProtocolVersion::TLS1_2,
            0xFEFF => ProtocolVersion::DTLS1_0,
            0xFEFD => ProtocolVersion::DTLS1_2,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::TLS1_0 => 0x0301,
            ProtocolVersion::TLS1_1 => 0x0302,
            ProtocolVersion::TLS1_2 => 0x0303,
            ProtocolVersion::DTLS1_0 => 0xFEFF,
            ProtocolVersion::DTLS1_2 => 0xFEFD,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, version) = be_u16(input)?;
        Ok((input, ProtocolVersion::from_u16(version)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.put_u16(self.as_u16());
    }

    pub fn variant(&self) -> Option<Variant> {
        match self {
            ProtocolVersion::TLS1_0 | ProtocolVersion::TLS1_1 | ProtocolVersion::TLS1_2 => {
                Some(Variant::Tls)
            }
            ProtocolVersion::DTLS1_0 | ProtocolVersion::DTLS1_2 => Some(Variant::Dtls),
            ProtocolVersion::Unknown(_) => None,
        }
    }

    pub fn is_dtls(&self) -> bool {
        self.variant() == Some(Variant::Dtls)
    }

    /// Position in the TLS lineage. DTLS 1.0 corresponds to TLS 1.1 and
    /// DTLS 1.2 to TLS 1.2.
    ///
    /// A version newer than TLS 1.2 or DTLS 1.2 ranks above both so that a
    /// client offering it negotiates down. Every other unknown value ranks
    /// below all known versions.
    pub fn rank(&self) -> u16 {
        match self {
            ProtocolVersion::TLS1_0 => 1,
            ProtocolVersion::TLS1_1 | ProtocolVersion::DTLS1_0 => 2,
            ProtocolVersion::TLS1_2 | ProtocolVersion::DTLS1_2 => 3,
            // DTLS versions count downwards on the wire.
            ProtocolVersion::Unknown(v @ 0xFE00..=0xFEFC) => 3 + (0xFEFD - *v),
            ProtocolVersion::Unknown(v @ 0x0304..=0x03FF) => 3 + (*v - 0x0303),
            ProtocolVersion::Unknown(_) => 0,
        }
    }

    /// TLS 1.2 and DTLS 1.2 use the suite PRF and signature_algorithms.
    pub fn is_tls12(&self) -> bool {
        self.rank() >= 3 && self.variant().is_some()
    }

    /// Whether CBC records carry an explicit IV block (TLS 1.1+ and DTLS).
    pub fn has_explicit_iv(&self) -> bool {
        self.rank() >= 2
    }

    pub fn record_header_len(&self) -> usize {
        if self.is_dtls() {
            13
        } else {
            5
        }
    }

    /// Supported versions of a variant, newest first.
    pub const fn supported(variant: Variant) -> &'static [ProtocolVersion] {
        match variant {
            Variant::Tls => &[
                ProtocolVersion::TLS1_2,
                ProtocolVersion::TLS1_1,
                ProtocolVersion::TLS1_0,
            ],
            Variant::Dtls => &[ProtocolVersion::DTLS1_2, ProtocolVersion::DTLS1_0],
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::TLS1_0 => write!(f, "TLSv1.0"),
            ProtocolVersion::TLS1_1 => write!(f, "TLSv1.1"),
            ProtocolVersion::TLS1_2 => write!(f, "TLSv1.2"),
            ProtocolVersion::DTLS1_0 => write!(f, "DTLSv1.0"),
            ProtocolVersion::DTLS1_2 => write!(f, "DTLSv1.2"),
            ProtocolVersion::Unknown(v) => write!(f, "Unknown({:04x})", v),
        }
    }
}

// ============================================================================
// Content Type
// ============================================================================

/// Record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Unknown(u8),
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ContentType::Unknown(_))
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// Hash and Signature Algorithms
// ============================================================================

/// Hash algorithms (RFC 5246 7.4.1.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum HashAlgorithm {
    None,
    MD5,
    SHA1,
    SHA224,
    SHA256,
    SHA384,
    SHA512,
    Unknown(u8),
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl HashAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HashAlgorithm::None,
            1 => HashAlgorithm::MD5,
            2 => HashAlgorithm::SHA1,
            3 => HashAlgorithm::SHA224,
            4 => HashAlgorithm::SHA256,
            5 => HashAlgorithm::SHA384,
            6 => HashAlgorithm::SHA512,
            _ => HashAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HashAlgorithm::None => 0,
            HashAlgorithm::MD5 => 1,
            HashAlgorithm::SHA1 => 2,
            HashAlgorithm::SHA224 => 3,
            HashAlgorithm::SHA256 => 4,
            HashAlgorithm::SHA384 => 5,
            HashAlgorithm::SHA512 => 6,
            HashAlgorithm::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HashAlgorithm> {
        let (input, value) = be_u8(input)?;
        Ok((input, HashAlgorithm::from_u8(value)))
    }

    /// Digest length in bytes, 0 for unknown algorithms.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::MD5 => 16,
            HashAlgorithm::SHA1 => 20,
            HashAlgorithm::SHA224 => 28,
            HashAlgorithm::SHA256 => 32,
            HashAlgorithm::SHA384 => 48,
            HashAlgorithm::SHA512 => 64,
            _ => 0,
        }
    }
}

/// Signature algorithms (RFC 5246 7.4.1.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum SignatureAlgorithm {
    Anonymous,
    RSA,
    DSA,
    ECDSA,
    Unknown(u8),
}

impl Default for SignatureAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl SignatureAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SignatureAlgorithm::Anonymous,
            1 => SignatureAlgorithm::RSA,
            2 => SignatureAlgorithm::DSA,
            3 => SignatureAlgorithm::ECDSA,
            _ => SignatureAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            SignatureAlgorithm::Anonymous => 0,
            SignatureAlgorithm::RSA => 1,
            SignatureAlgorithm::DSA => 2,
            SignatureAlgorithm::ECDSA => 3,
            SignatureAlgorithm::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAlgorithm> {
        let (input, value) = be_u8(input)?;
        Ok((input, SignatureAlgorithm::from_u8(value)))
    }
}

/// A `(hash, signature)` pair as carried in TLS 1.2 messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignatureAndHashAlgorithm {
    pub hash: HashAlgorithm,
    pub signature: SignatureAlgorithm,
}

impl SignatureAndHashAlgorithm {
    pub const fn new(hash: HashAlgorithm, signature: SignatureAlgorithm) -> Self {
        SignatureAndHashAlgorithm { hash, signature }
    }

    pub fn from_u16(value: u16) -> Self {
        let hash = HashAlgorithm::from_u8((value >> 8) as u8);
        let signature = SignatureAlgorithm::from_u8(value as u8);
        SignatureAndHashAlgorithm { hash, signature }
    }

    pub fn as_u16(&self) -> u16 {
        ((self.hash.as_u8() as u16) << 8) | (self.signature.as_u8() as u16)
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAndHashAlgorithm> {
        let (input, value) = be_u16(input)?;
        Ok((input, SignatureAndHashAlgorithm::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.put_u16(self.as_u16());
    }

    pub fn is_supported(&self) -> bool {
        Self::supported().contains(self)
    }

    /// Supported pairs in preference order.
    pub const fn supported() -> &'static [SignatureAndHashAlgorithm; 6] {
        use HashAlgorithm::*;
        use SignatureAlgorithm::*;
        const SUPPORTED: [SignatureAndHashAlgorithm; 6] = [
            SignatureAndHashAlgorithm::new(SHA256, ECDSA),
            SignatureAndHashAlgorithm::new(SHA384, ECDSA),
            SignatureAndHashAlgorithm::new(SHA256, RSA),
            SignatureAndHashAlgorithm::new(SHA384, RSA),
            SignatureAndHashAlgorithm::new(SHA1, ECDSA),
            SignatureAndHashAlgorithm::new(SHA1, RSA),
        ];
        &SUPPORTED
    }
}

/// How a digest handed to sign/verify was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureHash {
    /// The 36 byte `MD5 || SHA-1` concatenation used by RSA before TLS 1.2.
    /// Signed without a DigestInfo prefix.
    Md5Sha1,
    /// A single hash, DigestInfo prefixed for RSA.
    Hash(HashAlgorithm),
}

// ============================================================================
// Named Groups
// ============================================================================

/// Key exchange groups (RFC 8422, RFC 7919).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedGroup {
    Secp256r1,
    Secp384r1,
    Secp521r1,
    X25519,
    X448,
    Ffdhe2048,
    Ffdhe3072,
    Unknown(u16),
}

impl NamedGroup {
    pub fn from_u16(value: u16) -> Self {
        match value {
            23 => NamedGroup::Secp256r1,
            24 => NamedGroup::Secp384r1,
            25 => NamedGroup::Secp521r1,
            29 => NamedGroup::X25519,
            30 => NamedGroup::X448,
            0x0100 => NamedGroup::Ffdhe2048,
            0x0101 => NamedGroup::Ffdhe3072,
            _ => NamedGroup::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            NamedGroup::Secp256r1 => 23,
            NamedGroup::Secp384r1 => 24,
            NamedGroup::Secp521r1 => 25,
            NamedGroup::X25519 => 29,
            NamedGroup::X448 => 30,
            NamedGroup::Ffdhe2048 => 0x0100,
            NamedGroup::Ffdhe3072 => 0x0101,
            NamedGroup::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedGroup> {
        let (input, value) = be_u16(input)?;
        Ok((input, NamedGroup::from_u16(value)))
    }

    /// Elliptic curve groups usable in ECDHE.
    pub fn is_ec(&self) -> bool {
        matches!(
            self,
            NamedGroup::Secp256r1
                | NamedGroup::Secp384r1
                | NamedGroup::Secp521r1
                | NamedGroup::X25519
                | NamedGroup::X448
        )
    }

    /// Supported EC groups in preference order.
    pub const fn supported() -> &'static [NamedGroup; 3] {
        &[
            NamedGroup::X25519,
            NamedGroup::Secp256r1,
            NamedGroup::Secp384r1,
        ]
    }
}

// ============================================================================
// Compression, Certificate Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Null,
    Deflate,
    Unknown(u8),
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => CompressionMethod::Null,
            0x01 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Null => 0x00,
            CompressionMethod::Deflate => 0x01,
            CompressionMethod::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CompressionMethod> {
        let (input, value) = be_u8(input)?;
        Ok((input, CompressionMethod::from_u8(value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ClientCertificateType {
    RSA_SIGN,
    DSS_SIGN,
    RSA_FIXED_DH,
    DSS_FIXED_DH,
    ECDSA_SIGN,
    RSA_FIXED_ECDH,
    ECDSA_FIXED_ECDH,
    Unknown(u8),
}

impl ClientCertificateType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ClientCertificateType::RSA_SIGN,
            2 => ClientCertificateType::DSS_SIGN,
            3 => ClientCertificateType::RSA_FIXED_DH,
            4 => ClientCertificateType::DSS_FIXED_DH,
            64 => ClientCertificateType::ECDSA_SIGN,
            65 => ClientCertificateType::RSA_FIXED_ECDH,
            66 => ClientCertificateType::ECDSA_FIXED_ECDH,
            _ => ClientCertificateType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ClientCertificateType::RSA_SIGN => 1,
            ClientCertificateType::DSS_SIGN => 2,
            ClientCertificateType::RSA_FIXED_DH => 3,
            ClientCertificateType::DSS_FIXED_DH => 4,
            ClientCertificateType::ECDSA_SIGN => 64,
            ClientCertificateType::RSA_FIXED_ECDH => 65,
            ClientCertificateType::ECDSA_FIXED_ECDH => 66,
            ClientCertificateType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientCertificateType> {
        let (input, value) = be_u8(input)?;
        Ok((input, ClientCertificateType::from_u8(value)))
    }

    /// Signature algorithm a certificate of this type signs with.
    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        match self {
            ClientCertificateType::RSA_SIGN => Some(SignatureAlgorithm::RSA),
            ClientCertificateType::ECDSA_SIGN => Some(SignatureAlgorithm::ECDSA),
            _ => None,
        }
    }
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Fatal,
    Unknown(u8),
}

impl AlertLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => AlertLevel::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
            AlertLevel::Unknown(value) => *value,
        }
    }
}

/// Alert descriptions (RFC 5246 7.2, RFC 4279, RFC 5746).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    DecryptionFailed,
    RecordOverflow,
    DecompressionFailure,
    HandshakeFailure,
    NoCertificate,
    BadCertificate,
    UnsupportedCertificate,
    CertificateRevoked,
    CertificateExpired,
    CertificateUnknown,
    IllegalParameter,
    UnknownCa,
    AccessDenied,
    DecodeError,
    DecryptError,
    ExportRestriction,
    ProtocolVersion,
    InsufficientSecurity,
    InternalError,
    UserCanceled,
    NoRenegotiation,
    UnsupportedExtension,
    UnknownPskIdentity,
    Unknown(u8),
}

impl AlertDescription {
    pub fn from_u8(value: u8) -> Self {
        use AlertDescription::*;
        match value {
            0 => CloseNotify,
            10 => UnexpectedMessage,
            20 => BadRecordMac,
            21 => DecryptionFailed,
            22 => RecordOverflow,
            30 => DecompressionFailure,
            40 => HandshakeFailure,
            41 => NoCertificate,
            42 => BadCertificate,
            43 => UnsupportedCertificate,
            44 => CertificateRevoked,
            45 => CertificateExpired,
            46 => CertificateUnknown,
            47 => IllegalParameter,
            48 => UnknownCa,
            49 => AccessDenied,
            50 => DecodeError,
            51 => DecryptError,
            60 => ExportRestriction,
            70 => ProtocolVersion,
            71 => InsufficientSecurity,
            80 => InternalError,
            90 => UserCanceled,
            100 => NoRenegotiation,
            110 => UnsupportedExtension,
            115 => UnknownPskIdentity,
            _ => Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        use AlertDescription::*;
        match self {
            CloseNotify => 0,
            UnexpectedMessage => 10,
            BadRecordMac => 20,
            DecryptionFailed => 21,
            RecordOverflow => 22,
            DecompressionFailure => 30,
            HandshakeFailure => 40,
            NoCertificate => 41,
            BadCertificate => 42,
            UnsupportedCertificate => 43,
            CertificateRevoked => 44,
            CertificateExpired => 45,
            CertificateUnknown => 46,
            IllegalParameter => 47,
            UnknownCa => 48,
            AccessDenied => 49,
            DecodeError => 50,
            DecryptError => 51,
            ExportRestriction => 60,
            ProtocolVersion => 70,
            InsufficientSecurity => 71,
            InternalError => 80,
            UserCanceled => 90,
            NoRenegotiation => 100,
            UnsupportedExtension => 110,
            UnknownPskIdentity => 115,
            Unknown(value) => *value,
        }
    }
}

// ============================================================================
// Sequence Number
// ============================================================================

/// DTLS record sequence number (epoch + sequence).
///
/// For TLS the epoch is always 0 and the sequence is the implicit 64-bit
/// record counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sequence {
    /// The epoch (incremented on key change).
    pub epoch: u16,
    /// The sequence number within the epoch (48 bits on the DTLS wire).
    pub sequence_number: u64,
}

impl Sequence {
    pub fn new(epoch: u16) -> Self {
        Self {
            epoch,
            sequence_number: 0,
        }
    }

    /// The 8 bytes fed into the MAC and AEAD nonce.
    pub fn to_bytes(&self, dtls: bool) -> [u8; 8] {
        if dtls {
            let v = ((self.epoch as u64) << 48) | (self.sequence_number & 0xFFFF_FFFF_FFFF);
            v.to_be_bytes()
        } else {
            self.sequence_number.to_be_bytes()
        }
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[epoch: {}, sequence_number: {}]",
            self.epoch, self.sequence_number,
        )
    }
}

impl Ord for Sequence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then(self.sequence_number.cmp(&other.sequence_number))
    }
}

impl PartialOrd for Sequence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ranking() {
        assert!(ProtocolVersion::TLS1_2.rank() > ProtocolVersion::TLS1_1.rank());
        assert_eq!(
            ProtocolVersion::DTLS1_0.rank(),
            ProtocolVersion::TLS1_1.rank()
        );
        // A future TLS 1.3 hello compares above 1.2
        assert!(ProtocolVersion::from_u16(0x0304).rank() > ProtocolVersion::TLS1_2.rank());
        assert!(ProtocolVersion::from_u16(0xFEFC).rank() > ProtocolVersion::DTLS1_2.rank());
        // Between DTLS 1.0 and 1.2, SSL 3.0, nonsense
        for v in [0xFEFE, 0x0300, 0x0200, 0xFFFF, 0x1234] {
            assert_eq!(ProtocolVersion::from_u16(v).rank(), 0, "{:#06x}", v);
        }
        assert!(ProtocolVersion::DTLS1_2.is_tls12());
        assert!(!ProtocolVersion::TLS1_0.has_explicit_iv());
    }

    #[test]
    fn supported_signature_pairs() {
        let supported = SignatureAndHashAlgorithm::supported();
        assert_eq!(supported[0].as_u16(), 0x0403);
        assert!(SignatureAndHashAlgorithm::from_u16(0x0201).is_supported());
        // MD5 with RSA is never offered.
        assert!(!SignatureAndHashAlgorithm::from_u16(0x0101).is_supported());
    }

    #[test]
    fn dtls_sequence_bytes() {
        let s = Sequence {
            epoch: 1,
            sequence_number: 5,
        };
        assert_eq!(s.to_bytes(true), [0, 1, 0, 0, 0, 0, 0, 5]);
        assert_eq!(s.to_bytes(false), [0, 0, 0, 0, 0, 0, 0, 5]);
    }
}
