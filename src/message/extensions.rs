use arrayvec::ArrayVec;
use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::{Extension, ExtensionType};
use crate::buffer::Buf;
use crate::types::{NamedGroup, SignatureAndHashAlgorithm};
use crate::util::{all_consuming, many0, vec_u16, vec_u8};

/// Uncompressed point format, the only one the engine uses.
pub const EC_POINT_FORMAT_UNCOMPRESSED: u8 = 0;

const SERVER_NAME_HOST_NAME: u8 = 0;

/// The hello extensions the engine understands, decoded.
///
/// Unknown extensions are skipped when parsing. Any extension type appearing
/// twice makes the whole block invalid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HelloExtensions {
    /// SNI host name. An empty string is the server's acknowledgement.
    pub server_name: Option<String>,
    pub supported_groups: Option<ArrayVec<NamedGroup, 32>>,
    pub ec_point_formats: Option<ArrayVec<u8, 8>>,
    pub signature_algorithms: Option<ArrayVec<SignatureAndHashAlgorithm, 32>>,
    /// RFC 5746 renegotiated_connection. Empty on an initial handshake.
    pub renegotiation_info: Option<Vec<u8>>,
    pub extended_master_secret: bool,
    pub session_ticket: Option<Vec<u8>>,
}

impl HelloExtensions {
    pub fn is_empty(&self) -> bool {
        *self == HelloExtensions::default()
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloExtensions> {
        let mut out = HelloExtensions::default();

        // The extension block is optional.
        if input.is_empty() {
            return Ok((input, out));
        }

        let (rest, block) = vec_u16(input)?;
        let (_, extensions) = many0(Extension::parse)(block)?;

        let mut seen: Vec<u16> = Vec::with_capacity(extensions.len());

        for ext in extensions {
            let code = ext.kind.as_u16();
            if seen.contains(&code) {
                return Err(Err::Failure(Error::new(
                    ext.data,
                    ErrorKind::Verify,
                )));
            }
            seen.push(code);

            let data = ext.data;
            match ext.kind {
                ExtensionType::ServerName => {
                    let (_, name) = all_consuming(parse_server_name)(data)?;
                    out.server_name = Some(name);
                }
                ExtensionType::SupportedGroups => {
                    let (_, list) = all_consuming(vec_u16)(data)?;
                    let (_, groups) = all_consuming(many0(NamedGroup::parse))(list)?;
                    out.supported_groups = Some(groups.into_iter().take(32).collect());
                }
                ExtensionType::EcPointFormats => {
                    let (_, list) = all_consuming(vec_u8)(data)?;
                    out.ec_point_formats = Some(list.iter().copied().take(8).collect());
                }
                ExtensionType::SignatureAlgorithms => {
                    let (_, list) = all_consuming(vec_u16)(data)?;
                    let (_, algs) =
                        all_consuming(many0(SignatureAndHashAlgorithm::parse))(list)?;
                    out.signature_algorithms = Some(algs.into_iter().take(32).collect());
                }
                ExtensionType::RenegotiationInfo => {
                    let (_, info) = all_consuming(vec_u8)(data)?;
                    out.renegotiation_info = Some(info.to_vec());
                }
                ExtensionType::ExtendedMasterSecret => {
                    if !data.is_empty() {
                        return Err(Err::Failure(Error::new(data, ErrorKind::LengthValue)));
                    }
                    out.extended_master_secret = true;
                }
                ExtensionType::SessionTicket => {
                    out.session_ticket = Some(data.to_vec());
                }
                ExtensionType::Unknown(v) => {
                    trace!("Ignore unknown extension: {:04x}", v);
                }
            }
        }

        Ok((rest, out))
    }

    /// Write the extension block. Nothing is written when there are no
    /// extensions.
    pub fn serialize(&self, output: &mut Buf) {
        if self.is_empty() {
            return;
        }

        output.nested_u16(|out| {
            if let Some(name) = &self.server_name {
                Extension::write(out, ExtensionType::ServerName, |b| {
                    if name.is_empty() {
                        return;
                    }
                    b.nested_u16(|b| {
                        b.push(SERVER_NAME_HOST_NAME);
                        b.put_vec_u16(name.as_bytes());
                    });
                });
            }
            if let Some(groups) = &self.supported_groups {
                Extension::write(out, ExtensionType::SupportedGroups, |b| {
                    b.nested_u16(|b| {
                        for g in groups {
                            b.put_u16(g.as_u16());
                        }
                    });
                });
            }
            if let Some(formats) = &self.ec_point_formats {
                Extension::write(out, ExtensionType::EcPointFormats, |b| {
                    b.put_vec_u8(formats);
                });
            }
            if let Some(algs) = &self.signature_algorithms {
                Extension::write(out, ExtensionType::SignatureAlgorithms, |b| {
                    b.nested_u16(|b| {
                        for a in algs {
                            a.serialize(b);
                        }
                    });
                });
            }
            if let Some(ticket) = &self.session_ticket {
                Extension::write(out, ExtensionType::SessionTicket, |b| {
                    b.extend_from_slice(ticket);
                });
            }
            if self.extended_master_secret {
                Extension::write(out, ExtensionType::ExtendedMasterSecret, |_| {});
            }
            if let Some(info) = &self.renegotiation_info {
                Extension::write(out, ExtensionType::RenegotiationInfo, |b| {
                    b.put_vec_u8(info);
                });
            }
        });
    }
}

/// First host_name entry of a server_name list. Empty data is the server
/// acknowledgement.
fn parse_server_name(input: &[u8]) -> IResult<&[u8], String> {
    if input.is_empty() {
        return Ok((input, String::new()));
    }

    let (rest, mut list) = vec_u16(input)?;
    let mut host = None;

    while !list.is_empty() {
        let (r, name_type) = be_u8(list)?;
        let (r, len) = be_u16(r)?;
        let (r, name) = take(len as usize)(r)?;
        list = r;

        if name_type == SERVER_NAME_HOST_NAME && host.is_none() {
            let Ok(name) = std::str::from_utf8(name) else {
                return Err(Err::Failure(Error::new(name, ErrorKind::Char)));
            };
            host = Some(name.to_string());
        }
    }

    Ok((rest, host.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HashAlgorithm, SignatureAlgorithm};

    const MESSAGE: &[u8] = &[
        0x00, 0x2D, // extensions length
        0x00, 0x00, // server_name
        0x00, 0x0E, // length
        0x00, 0x0C, // server_name_list length
        0x00, // host_name
        0x00, 0x09, // name length
        b'l', b'o', b'c', b'a', b'l', b'h', b'o', b's', b't', // name
        0x00, 0x0A, // supported_groups
        0x00, 0x06, // length
        0x00, 0x04, // list length
        0x00, 0x1D, // x25519
        0x00, 0x17, // secp256r1
        0x00, 0x0D, // signature_algorithms
        0x00, 0x04, // length
        0x00, 0x02, // list length
        0x04, 0x03, // sha256 ecdsa
        0x00, 0x17, // extended_master_secret
        0x00, 0x00, // length
        0xFF, 0x01, // renegotiation_info
        0x00, 0x01, // length
        0x00, // empty renegotiated_connection
    ];

    #[test]
    fn parse_known_extensions() {
        let (rest, ext) = HelloExtensions::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(ext.server_name.as_deref(), Some("localhost"));
        let groups = ext.supported_groups.as_ref().unwrap();
        assert_eq!(&groups[..], &[NamedGroup::X25519, NamedGroup::Secp256r1]);
        assert_eq!(
            ext.signature_algorithms.as_ref().unwrap()[0],
            SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::ECDSA)
        );
        assert!(ext.extended_master_secret);
        assert_eq!(ext.renegotiation_info.as_deref(), Some(&[][..]));

        let mut out = Buf::new();
        ext.serialize(&mut out);
        assert_eq!(&out[..], MESSAGE);
    }

    #[test]
    fn duplicate_extension_is_rejected() {
        let data = [
            0x00, 0x08, // extensions length
            0x00, 0x17, 0x00, 0x00, // extended_master_secret
            0x00, 0x17, 0x00, 0x00, // extended_master_secret again
        ];
        assert!(HelloExtensions::parse(&data).is_err());
    }

    #[test]
    fn unknown_extension_is_skipped() {
        let data = [
            0x00, 0x05, // extensions length
            0x33, 0x74, 0x00, 0x01, 0xAA, // unknown
        ];
        let (_, ext) = HelloExtensions::parse(&data).unwrap();
        assert!(ext.is_empty());
    }

    #[test]
    fn empty_block_writes_nothing() {
        let mut out = Buf::new();
        HelloExtensions::default().serialize(&mut out);
        assert!(out.is_empty());
    }
}
