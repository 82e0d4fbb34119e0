use nom::IResult;

use crate::buffer::Buf;
use crate::types::SignatureAndHashAlgorithm;
use crate::util::vec_u16;

/// A signature, with its algorithm pair from TLS 1.2 on.
#[derive(Debug, PartialEq, Eq)]
pub struct DigitallySigned<'a> {
    pub algorithm: Option<SignatureAndHashAlgorithm>,
    pub signature: &'a [u8],
}

impl<'a> DigitallySigned<'a> {
    pub fn new(algorithm: Option<SignatureAndHashAlgorithm>, signature: &'a [u8]) -> Self {
        DigitallySigned {
            algorithm,
            signature,
        }
    }

    pub fn parse(input: &'a [u8], tls12: bool) -> IResult<&'a [u8], DigitallySigned<'a>> {
        let (input, algorithm) = if tls12 {
            let (input, alg) = SignatureAndHashAlgorithm::parse(input)?;
            (input, Some(alg))
        } else {
            (input, None)
        };
        let (input, signature) = vec_u16(input)?;
        Ok((
            input,
            DigitallySigned {
                algorithm,
                signature,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Buf) {
        if let Some(alg) = &self.algorithm {
            alg.serialize(output);
        }
        output.put_vec_u16(self.signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HashAlgorithm, SignatureAlgorithm};

    const MESSAGE: &[u8] = &[
        0x04, 0x01, // SignatureAndHashAlgorithm (SHA256 + RSA)
        0x00, 0x04, // Signature length
        0x01, 0x02, 0x03, 0x04, // Signature data
    ];

    #[test]
    fn roundtrip() {
        let algorithm =
            SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, SignatureAlgorithm::RSA);
        let signed = DigitallySigned::new(Some(algorithm), &MESSAGE[4..8]);

        let mut serialized = Buf::new();
        signed.serialize(&mut serialized);
        assert_eq!(&serialized[..], MESSAGE);

        let (rest, parsed) = DigitallySigned::parse(&serialized, true).unwrap();
        assert_eq!(parsed, signed);
        assert!(rest.is_empty());
    }

    #[test]
    fn legacy_has_no_algorithm() {
        let (rest, parsed) = DigitallySigned::parse(&MESSAGE[2..], false).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed.algorithm, None);
        assert_eq!(parsed.signature, &[1, 2, 3, 4]);
    }
}
