use std::io;

use thiserror::Error;

use crate::handshake::SuspendReason;
use crate::types::AlertDescription;

/// Errors surfaced by the engine.
///
/// Every fatal error maps to the alert that is sent to the peer before the
/// connection closes, see [`Error::alert`].
#[derive(Debug, Error)]
pub enum Error {
    /// A message arrived that is not legal in the current state.
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Input could not be parsed.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Input parsed but carries a value we cannot accept.
    #[error("Illegal parameter: {0}")]
    IllegalParameter(String),

    /// Record authentication failed. Deliberately carries no detail.
    #[error("Bad record MAC")]
    BadRecordMac,

    /// A crypto primitive failed.
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// A signature or Finished verification failed.
    #[error("Decrypt error: {0}")]
    DecryptError(String),

    /// No common version, cipher suite, group or signature algorithm.
    #[error("Negotiation failed: {0}")]
    NegotiationError(String),

    /// The peer asked for a protocol version outside the configured range.
    #[error("Unsupported protocol version {0:04x}")]
    UnsupportedVersion(u16),

    /// The client presented a PSK identity we do not know.
    #[error("Unknown PSK identity")]
    UnknownPskIdentity,

    /// Local configuration cannot satisfy the negotiated parameters.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The peer certificate chain was rejected or unusable.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Record exceeds the protocol size limits.
    #[error("Record overflow: {0} bytes")]
    RecordOverflow(usize),

    /// The handshake is suspended waiting for the application.
    #[error("Would block: {0:?}")]
    WouldBlock(SuspendReason),

    /// The DTLS handshake or flight retransmission timed out.
    #[error("Timeout: {0}")]
    Timeout(&'static str),

    /// The peer sent a fatal alert.
    #[error("Peer sent alert: {0:?}")]
    PeerAlert(AlertDescription),

    /// The connection is closed.
    #[error("Connection closed")]
    Closed,

    /// Too many datagrams queued for reassembly.
    #[error("Receive queue full")]
    ReceiveQueueFull,

    /// Too many datagrams waiting in [`poll_output`](crate::Tls::poll_output).
    #[error("Transmit queue full")]
    TransmitQueueFull,

    /// Transport failure in [`TlsStream`](crate::TlsStream).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Protocol,
    Crypto,
    Negotiation,
    Configuration,
    WouldBlock,
    RecordOverflow,
    Timeout,
    Closed,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnexpectedMessage(_)
            | Error::DecodeError(_)
            | Error::IllegalParameter(_)
            | Error::PeerAlert(_)
            | Error::ReceiveQueueFull
            | Error::TransmitQueueFull => ErrorKind::Protocol,
            Error::BadRecordMac
            | Error::CryptoError(_)
            | Error::DecryptError(_)
            | Error::CertificateError(_) => ErrorKind::Crypto,
            Error::NegotiationError(_)
            | Error::UnsupportedVersion(_)
            | Error::UnknownPskIdentity => ErrorKind::Negotiation,
            Error::ConfigError(_) => ErrorKind::Configuration,
            Error::RecordOverflow(_) => ErrorKind::RecordOverflow,
            Error::WouldBlock(_) => ErrorKind::WouldBlock,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Closed => ErrorKind::Closed,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// The alert to send for this error, if any.
    ///
    /// `None` for conditions where nothing is sent: suspension, the peer
    /// already closed, timeouts and transport failures.
    pub fn alert(&self) -> Option<AlertDescription> {
        let a = match self {
            Error::UnexpectedMessage(_) => AlertDescription::UnexpectedMessage,
            Error::DecodeError(_) => AlertDescription::DecodeError,
            Error::IllegalParameter(_) => AlertDescription::IllegalParameter,
            Error::BadRecordMac => AlertDescription::BadRecordMac,
            Error::CryptoError(_) | Error::ConfigError(_) => AlertDescription::InternalError,
            Error::DecryptError(_) => AlertDescription::DecryptError,
            Error::NegotiationError(_) => AlertDescription::HandshakeFailure,
            Error::UnsupportedVersion(_) => AlertDescription::ProtocolVersion,
            Error::UnknownPskIdentity => AlertDescription::UnknownPskIdentity,
            Error::CertificateError(_) => AlertDescription::BadCertificate,
            Error::RecordOverflow(_) => AlertDescription::RecordOverflow,
            Error::ReceiveQueueFull | Error::TransmitQueueFull => AlertDescription::InternalError,
            Error::WouldBlock(_)
            | Error::Timeout(_)
            | Error::PeerAlert(_)
            | Error::Closed
            | Error::Io(_) => return None,
        };
        Some(a)
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        let reason = match value {
            nom::Err::Incomplete(_) => "incomplete".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("{:?} with {} bytes left", e.code, e.input.len())
            }
        };
        Error::DecodeError(reason)
    }
}
