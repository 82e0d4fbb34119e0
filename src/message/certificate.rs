use nom::IResult;

use crate::buffer::Buf;
use crate::util::{all_consuming, many0, vec_u24};

/// Certificate chain, leaf first. Entries are opaque DER.
#[derive(Debug, PartialEq, Eq)]
pub struct Certificate<'a> {
    pub certificate_list: Vec<&'a [u8]>,
}

impl<'a> Certificate<'a> {
    pub fn new(certificate_list: Vec<&'a [u8]>) -> Self {
        Certificate { certificate_list }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Certificate<'a>> {
        let (input, list) = vec_u24(input)?;
        let (_, certificate_list) = all_consuming(many0(vec_u24))(list)?;
        Ok((input, Certificate { certificate_list }))
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.nested_u24(|out| {
            for cert in &self.certificate_list {
                out.put_vec_u24(cert);
            }
        });
    }

    pub fn to_chain(&self) -> Vec<Vec<u8>> {
        self.certificate_list.iter().map(|c| c.to_vec()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x00, 0x00, 0x0C, // Total length
        0x00, 0x00, 0x04, // Certificate 1 length
        0x01, 0x02, 0x03, 0x04, // Certificate 1 data
        0x00, 0x00, 0x02, // Certificate 2 length
        0x05, 0x06, // Certificate 2 data
    ];

    #[test]
    fn roundtrip() {
        let certificate = Certificate::new(vec![&MESSAGE[6..10], &MESSAGE[13..15]]);

        let mut serialized = Buf::new();
        certificate.serialize(&mut serialized);
        assert_eq!(&serialized[..], MESSAGE);

        let (rest, parsed) = Certificate::parse(&serialized).unwrap();
        assert_eq!(parsed, certificate);
        assert!(rest.is_empty());
    }

    #[test]
    fn empty_chain() {
        let (rest, parsed) = Certificate::parse(&[0, 0, 0]).unwrap();
        assert!(rest.is_empty());
        assert!(parsed.certificate_list.is_empty());
    }

    #[test]
    fn inner_length_overrun() {
        let data = [
            0x00, 0x00, 0x04, // Total length
            0x00, 0x00, 0x05, // Certificate length exceeds the list
            0x01,
        ];
        assert!(Certificate::parse(&data).is_err());
    }
}
