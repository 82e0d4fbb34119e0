use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};

use super::DigitallySigned;
use crate::buffer::Buf;
use crate::suite::KeyExchangeAlgorithm;
use crate::types::NamedGroup;
use crate::util::{vec_u16, vec_u8};

/// ECParameters curve_type for a named curve. Explicit curves are not
/// supported.
pub const CURVE_TYPE_NAMED_CURVE: u8 = 3;

#[derive(Debug, PartialEq, Eq)]
pub struct ServerKeyExchange<'a> {
    pub params: ServerKeyExchangeParams<'a>,
    /// The encoded params, which is what the signature covers (after the
    /// two randoms).
    pub raw_params: &'a [u8],
    pub signature: Option<DigitallySigned<'a>>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ServerKeyExchangeParams<'a> {
    Dh(DhParams<'a>),
    Ecdh(EcdhParams<'a>),
    /// PSK identity hint.
    Psk(&'a [u8]),
}

#[derive(Debug, PartialEq, Eq)]
pub struct DhParams<'a> {
    pub p: &'a [u8],
    pub g: &'a [u8],
    pub public_value: &'a [u8],
}

#[derive(Debug, PartialEq, Eq)]
pub struct EcdhParams<'a> {
    pub group: NamedGroup,
    pub public_point: &'a [u8],
}

impl<'a> ServerKeyExchange<'a> {
    pub fn parse(
        input: &'a [u8],
        kx: KeyExchangeAlgorithm,
        tls12: bool,
    ) -> IResult<&'a [u8], ServerKeyExchange<'a>> {
        let original = input;

        let (input, params) = match kx {
            KeyExchangeAlgorithm::DheRsa => {
                let (input, p) = vec_u16(input)?;
                let (input, g) = vec_u16(input)?;
                let (input, public_value) = vec_u16(input)?;
                (input, ServerKeyExchangeParams::Dh(DhParams { p, g, public_value }))
            }
            KeyExchangeAlgorithm::EcdheRsa | KeyExchangeAlgorithm::EcdheEcdsa => {
                let (input, curve_type) = be_u8(input)?;
                if curve_type != CURVE_TYPE_NAMED_CURVE {
                    return Err(Err::Failure(Error::new(input, ErrorKind::Tag)));
                }
                let (input, group) = NamedGroup::parse(input)?;
                let (input, public_point) = vec_u8(input)?;
                (
                    input,
                    ServerKeyExchangeParams::Ecdh(EcdhParams {
                        group,
                        public_point,
                    }),
                )
            }
            KeyExchangeAlgorithm::Psk => {
                let (input, hint) = vec_u16(input)?;
                (input, ServerKeyExchangeParams::Psk(hint))
            }
            _ => return Err(Err::Failure(Error::new(input, ErrorKind::Switch))),
        };

        let raw_params = &original[..original.len() - input.len()];

        let (input, signature) = if kx.is_signed_ephemeral() {
            let (input, signed) = DigitallySigned::parse(input, tls12)?;
            (input, Some(signed))
        } else {
            (input, None)
        };

        Ok((
            input,
            ServerKeyExchange {
                params,
                raw_params,
                signature,
            },
        ))
    }
}

impl<'a> ServerKeyExchangeParams<'a> {
    pub fn serialize(&self, output: &mut Buf) {
        match self {
            ServerKeyExchangeParams::Dh(dh) => {
                output.put_vec_u16(dh.p);
                output.put_vec_u16(dh.g);
                output.put_vec_u16(dh.public_value);
            }
            ServerKeyExchangeParams::Ecdh(ec) => {
                output.push(CURVE_TYPE_NAMED_CURVE);
                output.put_u16(ec.group.as_u16());
                output.put_vec_u8(ec.public_point);
            }
            ServerKeyExchangeParams::Psk(hint) => {
                output.put_vec_u16(hint);
            }
        }
    }
}
