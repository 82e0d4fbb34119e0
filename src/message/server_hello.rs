use nom::IResult;

use super::{HelloExtensions, Random, SessionId};
use crate::buffer::Buf;
use crate::suite::CipherSuite;
use crate::types::{CompressionMethod, ProtocolVersion};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: HelloExtensions,
}

impl ServerHello {
    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerHello> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;
        let (input, extensions) = HelloExtensions::parse(input)?;

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        output.put_u16(self.cipher_suite.as_u16());
        output.push(self.compression_method.as_u8());
        self.extensions.serialize(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x03, 0x03, // ProtocolVersion::TLS1_2
        // Random (32 bytes)
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E,
        0x0F, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C,
        0x1D, 0x1E, 0x1F, 0x20, //
        0x01, // SessionId length
        0xAA, // SessionId
        0x00, 0x2F, // RSA_WITH_AES_128_CBC_SHA
        0x00, // CompressionMethod::Null
        0x00, 0x09, // Extensions length
        0x00, 0x17, 0x00, 0x00, // extended_master_secret
        0xFF, 0x01, 0x00, 0x01, 0x00, // renegotiation_info
    ];

    #[test]
    fn roundtrip() {
        let (rest, hello) = ServerHello::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(hello.cipher_suite, CipherSuite::RSA_WITH_AES_128_CBC_SHA);
        assert!(hello.extensions.extended_master_secret);

        let mut out = Buf::new();
        hello.serialize(&mut out);
        assert_eq!(&out[..], MESSAGE);
    }
}
