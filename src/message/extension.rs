//! A single hello extension as it sits on the wire.

use nom::number::complete::be_u16;
use nom::IResult;

use crate::buffer::Buf;
use crate::util::vec_u16;

/// Type code and undecoded body of one extension.
#[derive(Debug, PartialEq, Eq)]
pub struct Extension<'a> {
    pub kind: ExtensionType,
    pub data: &'a [u8],
}

impl<'a> Extension<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Extension<'a>> {
        let (input, kind) = ExtensionType::parse(input)?;
        let (input, data) = vec_u16(input)?;
        Ok((input, Extension { kind, data }))
    }

    /// Write an extension whose body `f` produces, length prefixed.
    pub fn write(output: &mut Buf, kind: ExtensionType, f: impl FnOnce(&mut Buf)) {
        output.put_u16(kind.as_u16());
        output.nested_u16(f);
    }
}

/// Extensions this engine understands. Anything else is carried as
/// `Unknown` and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    ServerName,
    SupportedGroups,
    EcPointFormats,
    SignatureAlgorithms,
    ExtendedMasterSecret,
    SessionTicket,
    RenegotiationInfo,
    Unknown(u16),
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        use ExtensionType::*;
        match value {
            0 => ServerName,
            10 => SupportedGroups,
            11 => EcPointFormats,
            13 => SignatureAlgorithms,
            23 => ExtendedMasterSecret,
            35 => SessionTicket,
            0xFF01 => RenegotiationInfo,
            _ => Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        use ExtensionType::*;
        match self {
            ServerName => 0,
            SupportedGroups => 10,
            EcPointFormats => 11,
            SignatureAlgorithms => 13,
            ExtendedMasterSecret => 23,
            SessionTicket => 35,
            RenegotiationInfo => 0xFF01,
            Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ExtensionType> {
        let (input, value) = be_u16(input)?;
        Ok((input, ExtensionType::from_u16(value)))
    }
}
