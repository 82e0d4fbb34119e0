use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use super::{Cookie, HelloExtensions, Random, SessionId};
use crate::buffer::Buf;
use crate::suite::CipherSuite;
use crate::types::{CompressionMethod, ProtocolVersion};
use crate::util::{all_consuming, many1, vec_u16, vec_u8};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    /// Only present on the wire for DTLS.
    pub cookie: Cookie,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<CompressionMethod>,
    pub extensions: HelloExtensions,
}

impl ClientHello {
    pub fn parse(input: &[u8], dtls: bool) -> IResult<&[u8], ClientHello> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cookie) = if dtls {
            Cookie::parse(input)?
        } else {
            (input, Cookie::empty())
        };

        let (input, suites) = vec_u16(input)?;
        if suites.len() % 2 != 0 {
            return Err(Err::Failure(Error::new(suites, ErrorKind::LengthValue)));
        }
        let (_, cipher_suites) = all_consuming(many1(CipherSuite::parse))(suites)?;

        let (input, compression) = vec_u8(input)?;
        let (_, compression_methods) =
            all_consuming(many1(CompressionMethod::parse))(compression)?;

        let (input, extensions) = HelloExtensions::parse(input)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cookie,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, dtls: bool, output: &mut Buf) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        if dtls {
            self.cookie.serialize(output);
        }
        output.nested_u16(|out| {
            for suite in &self.cipher_suites {
                out.put_u16(suite.as_u16());
            }
        });
        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }
        self.extensions.serialize(output);
    }

    /// Whether the client signals secure renegotiation, either through the
    /// extension or the signalling suite.
    pub fn offers_secure_renegotiation(&self) -> bool {
        self.extensions.renegotiation_info.is_some()
            || self
                .cipher_suites
                .contains(&CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0xFE, 0xFD, // ProtocolVersion::DTLS1_2
        // Random (32 bytes)
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E,
        0x0F, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C,
        0x1D, 0x1E, 0x1F, 0x20, //
        0x01, // SessionId length
        0xAA, // SessionId
        0x02, // Cookie length
        0xBB, 0xCC, // Cookie
        0x00, 0x04, // CipherSuites length
        0xC0, 0x2B, // ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
        0x00, 0xFF, // EMPTY_RENEGOTIATION_INFO_SCSV
        0x01, // CompressionMethods length
        0x00, // CompressionMethod::Null
    ];

    #[test]
    fn roundtrip_dtls() {
        let (rest, hello) = ClientHello::parse(MESSAGE, true).unwrap();
        assert!(rest.is_empty());
        assert_eq!(hello.client_version, ProtocolVersion::DTLS1_2);
        assert_eq!(&*hello.cookie, &[0xBB, 0xCC]);
        assert_eq!(
            hello.cipher_suites,
            vec![
                CipherSuite::ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
                CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV
            ]
        );
        assert!(hello.offers_secure_renegotiation());
        assert!(hello.extensions.is_empty());

        let mut out = Buf::new();
        hello.serialize(true, &mut out);
        assert_eq!(&out[..], MESSAGE);
    }

    #[test]
    fn tls_has_no_cookie() {
        let (_, hello) = ClientHello::parse(MESSAGE, true).unwrap();
        let mut out = Buf::new();
        hello.serialize(false, &mut out);
        let (rest, parsed) = ClientHello::parse(&out, false).unwrap();
        assert!(rest.is_empty());
        assert!(parsed.cookie.is_empty());
        assert_eq!(parsed.cipher_suites, hello.cipher_suites);
    }

    #[test]
    fn empty_suite_list_is_rejected() {
        let mut data = MESSAGE[..39].to_vec();
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00]);
        assert!(ClientHello::parse(&data, true).is_err());
    }
}
