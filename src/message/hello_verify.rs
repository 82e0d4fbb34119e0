use nom::IResult;

use super::Cookie;
use crate::buffer::Buf;
use crate::types::ProtocolVersion;

/// DTLS stateless cookie challenge (RFC 6347 4.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub server_version: ProtocolVersion,
    pub cookie: Cookie,
}

impl HelloVerifyRequest {
    pub fn new(server_version: ProtocolVersion, cookie: Cookie) -> Self {
        HelloVerifyRequest {
            server_version,
            cookie,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;
        Ok((
            input,
            HelloVerifyRequest {
                server_version,
                cookie,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        self.server_version.serialize(output);
        self.cookie.serialize(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0xFE, 0xFF, // ProtocolVersion::DTLS1_0
        0x04, // Cookie length
        0x01, 0x02, 0x03, 0x04, // Cookie
    ];

    #[test]
    fn roundtrip() {
        let cookie = Cookie::try_new(&MESSAGE[3..]).unwrap();
        let hvr = HelloVerifyRequest::new(ProtocolVersion::DTLS1_0, cookie);

        let mut out = Buf::new();
        hvr.serialize(&mut out);
        assert_eq!(&out[..], MESSAGE);

        let (rest, parsed) = HelloVerifyRequest::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, hvr);
    }
}
