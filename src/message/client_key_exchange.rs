use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use crate::buffer::Buf;
use crate::suite::KeyExchangeAlgorithm;
use crate::util::{vec_u16, vec_u8};

/// ClientKeyExchange body. The contents are opaque to the codec and
/// interpreted by the key exchange.
#[derive(Debug, PartialEq, Eq)]
pub enum ClientKeyExchange<'a> {
    /// PKCS#1 v1.5 encrypted premaster secret.
    Rsa(&'a [u8]),
    /// Client DH public value Yc.
    Dh(&'a [u8]),
    /// Client EC point.
    Ecdh(&'a [u8]),
    /// PSK identity.
    Psk(&'a [u8]),
}

impl<'a> ClientKeyExchange<'a> {
    pub fn parse(
        input: &'a [u8],
        kx: KeyExchangeAlgorithm,
    ) -> IResult<&'a [u8], ClientKeyExchange<'a>> {
        use KeyExchangeAlgorithm::*;
        match kx {
            Rsa | RsaExport => {
                let (input, data) = vec_u16(input)?;
                Ok((input, ClientKeyExchange::Rsa(data)))
            }
            DheRsa => {
                let (input, data) = vec_u16(input)?;
                Ok((input, ClientKeyExchange::Dh(data)))
            }
            EcdheRsa | EcdheEcdsa | EcdhEcdsa | EcdhRsa => {
                let (input, data) = vec_u8(input)?;
                Ok((input, ClientKeyExchange::Ecdh(data)))
            }
            Psk => {
                let (input, data) = vec_u16(input)?;
                Ok((input, ClientKeyExchange::Psk(data)))
            }
            Null => Err(Err::Failure(Error::new(input, ErrorKind::Switch))),
        }
    }

    pub fn serialize(&self, output: &mut Buf) {
        match self {
            ClientKeyExchange::Rsa(data)
            | ClientKeyExchange::Dh(data)
            | ClientKeyExchange::Psk(data) => output.put_vec_u16(data),
            ClientKeyExchange::Ecdh(data) => output.put_vec_u8(data),
        }
    }
}
