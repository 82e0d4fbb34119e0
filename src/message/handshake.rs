use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::IResult;

use crate::buffer::Buf;

/// Handshake message header.
///
/// TLS headers are 4 bytes (type and length). DTLS adds the message
/// sequence and the fragment range for 12 bytes in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub msg_type: MessageType,
    pub length: u32,
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

pub const TLS_HEADER_LEN: usize = 4;
pub const DTLS_HEADER_LEN: usize = 12;

impl Header {
    /// Header of an unfragmented message.
    pub fn new(msg_type: MessageType, length: u32, message_seq: u16) -> Self {
        Header {
            msg_type,
            length,
            message_seq,
            fragment_offset: 0,
            fragment_length: length,
        }
    }

    pub fn len(dtls: bool) -> usize {
        if dtls {
            DTLS_HEADER_LEN
        } else {
            TLS_HEADER_LEN
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment_offset > 0 || self.fragment_length < self.length
    }

    pub fn parse(input: &[u8], dtls: bool) -> IResult<&[u8], Header> {
        let (input, msg_type) = MessageType::parse(input)?;
        let (input, length) = be_u24(input)?;

        if !dtls {
            return Ok((input, Header::new(msg_type, length, 0)));
        }

        let (input, message_seq) = be_u16(input)?;
        let (input, fragment_offset) = be_u24(input)?;
        let (input, fragment_length) = be_u24(input)?;

        Ok((
            input,
            Header {
                msg_type,
                length,
                message_seq,
                fragment_offset,
                fragment_length,
            },
        ))
    }

    pub fn serialize(&self, dtls: bool, output: &mut Buf) {
        output.push(self.msg_type.as_u8());
        output.put_u24(self.length);
        if dtls {
            output.put_u16(self.message_seq);
            output.put_u24(self.fragment_offset);
            output.put_u24(self.fragment_length);
        }
    }
}

/// A complete (reassembled) handshake message.
///
/// The body is kept as raw bytes and parsed by the state machine with the
/// typed parser for the message it expects. This keeps the message
/// available, unchanged, while a handshake is suspended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub header: Header,
    pub body: Buf,
}

impl Handshake {
    pub fn new(msg_type: MessageType, message_seq: u16, body: Buf) -> Self {
        Handshake {
            header: Header::new(msg_type, body.len() as u32, message_seq),
            body,
        }
    }

    pub fn msg_type(&self) -> MessageType {
        self.header.msg_type
    }

    /// Parse one unfragmented message.
    pub fn parse(input: &[u8], dtls: bool) -> IResult<&[u8], Handshake> {
        let (input, header) = Header::parse(input, dtls)?;
        let len = if dtls {
            header.fragment_length
        } else {
            header.length
        };
        let (input, body) = nom::bytes::complete::take(len as usize)(input)?;
        Ok((
            input,
            Handshake {
                header,
                body: Buf::from_slice(body),
            },
        ))
    }

    /// The bytes hashed into the transcript.
    ///
    /// For DTLS this is the logical header (offset 0, fragment length equal
    /// to the total length) regardless of how the message was fragmented.
    pub fn transcript_bytes(&self, dtls: bool, output: &mut Buf) {
        let header = Header::new(self.header.msg_type, self.body.len() as u32, self.header.message_seq);
        header.serialize(dtls, output);
        output.extend_from_slice(&self.body);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    HelloRequest, // empty
    ClientHello,
    ServerHello,
    HelloVerifyRequest,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone, // empty
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    Unknown(u8),
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl MessageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => MessageType::HelloRequest,
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            3 => MessageType::HelloVerifyRequest,
            11 => MessageType::Certificate,
            12 => MessageType::ServerKeyExchange,
            13 => MessageType::CertificateRequest,
            14 => MessageType::ServerHelloDone,
            15 => MessageType::CertificateVerify,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            _ => MessageType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::HelloRequest => 0,
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::HelloVerifyRequest => 3,
            MessageType::Certificate => 11,
            MessageType::ServerKeyExchange => 12,
            MessageType::CertificateRequest => 13,
            MessageType::ServerHelloDone => 14,
            MessageType::CertificateVerify => 15,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], MessageType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}
