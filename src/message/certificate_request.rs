use nom::IResult;

use crate::buffer::Buf;
use crate::types::{ClientCertificateType, SignatureAndHashAlgorithm};
use crate::util::{all_consuming, many0, many1, vec_u16, vec_u8};

#[derive(Debug, PartialEq, Eq)]
pub struct CertificateRequest<'a> {
    pub certificate_types: Vec<ClientCertificateType>,
    /// Only on the wire from TLS 1.2.
    pub supported_signature_algorithms: Vec<SignatureAndHashAlgorithm>,
    /// DER encoded distinguished names.
    pub certificate_authorities: Vec<&'a [u8]>,
}

impl<'a> CertificateRequest<'a> {
    pub fn parse(input: &'a [u8], tls12: bool) -> IResult<&'a [u8], CertificateRequest<'a>> {
        let (input, types) = vec_u8(input)?;
        let (_, certificate_types) = all_consuming(many1(ClientCertificateType::parse))(types)?;

        let (input, supported_signature_algorithms) = if tls12 {
            let (input, algs) = vec_u16(input)?;
            let (_, algs) = all_consuming(many0(SignatureAndHashAlgorithm::parse))(algs)?;
            (input, algs)
        } else {
            (input, Vec::new())
        };

        let (input, names) = vec_u16(input)?;
        let (_, certificate_authorities) = all_consuming(many0(vec_u16))(names)?;

        Ok((
            input,
            CertificateRequest {
                certificate_types,
                supported_signature_algorithms,
                certificate_authorities,
            },
        ))
    }

    pub fn serialize(&self, tls12: bool, output: &mut Buf) {
        output.push(self.certificate_types.len() as u8);
        for t in &self.certificate_types {
            output.push(t.as_u8());
        }

        if tls12 {
            output.nested_u16(|out| {
                for alg in &self.supported_signature_algorithms {
                    alg.serialize(out);
                }
            });
        }

        output.nested_u16(|out| {
            for name in &self.certificate_authorities {
                out.put_vec_u16(name);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HashAlgorithm, SignatureAlgorithm};

    const MESSAGE: &[u8] = &[
        0x02, // certificate_types length
        0x01, // RSA_SIGN
        0x40, // ECDSA_SIGN
        0x00, 0x04, // signature algorithms length
        0x04, 0x01, // sha256 rsa
        0x04, 0x03, // sha256 ecdsa
        0x00, 0x05, // certificate_authorities length
        0x00, 0x03, // name length
        0x30, 0x01, 0x00, // name
    ];

    #[test]
    fn roundtrip_tls12() {
        let (rest, req) = CertificateRequest::parse(MESSAGE, true).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            req.certificate_types,
            vec![ClientCertificateType::RSA_SIGN, ClientCertificateType::ECDSA_SIGN]
        );
        assert_eq!(
            req.supported_signature_algorithms[1],
            SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::ECDSA)
        );
        assert_eq!(req.certificate_authorities, vec![&[0x30, 0x01, 0x00][..]]);

        let mut out = Buf::new();
        req.serialize(true, &mut out);
        assert_eq!(&out[..], MESSAGE);
    }

    #[test]
    fn legacy_has_no_algorithms() {
        let data = [
            0x01, // certificate_types length
            0x01, // RSA_SIGN
            0x00, 0x00, // certificate_authorities length
        ];
        let (rest, req) = CertificateRequest::parse(&data, false).unwrap();
        assert!(rest.is_empty());
        assert!(req.supported_signature_algorithms.is_empty());
    }
}
