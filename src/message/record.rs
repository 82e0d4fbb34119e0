use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::buffer::Buf;
use crate::types::{ContentType, ProtocolVersion, Sequence};
use crate::util::be_u48;

pub const TLS_RECORD_HEADER_LEN: usize = 5;
pub const DTLS_RECORD_HEADER_LEN: usize = 13;

/// Record header. TLS records carry no explicit sequence; `sequence` is then
/// always zero on the wire side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub sequence: Sequence,
    pub length: u16,
}

impl RecordHeader {
    pub fn len(dtls: bool) -> usize {
        if dtls {
            DTLS_RECORD_HEADER_LEN
        } else {
            TLS_RECORD_HEADER_LEN
        }
    }

    pub fn parse(input: &[u8], dtls: bool) -> IResult<&[u8], RecordHeader> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, sequence) = if dtls {
            let (input, epoch) = be_u16(input)?;
            let (input, sequence_number) = be_u48(input)?;
            (
                input,
                Sequence {
                    epoch,
                    sequence_number,
                },
            )
        } else {
            (input, Sequence::default())
        };
        let (input, length) = be_u16(input)?;

        Ok((
            input,
            RecordHeader {
                content_type,
                version,
                sequence,
                length,
            },
        ))
    }

    pub fn serialize(&self, dtls: bool, output: &mut Buf) {
        output.push(self.content_type.as_u8());
        self.version.serialize(output);
        if dtls {
            output.put_u16(self.sequence.epoch);
            output.put_u48(self.sequence.sequence_number);
        }
        output.put_u16(self.length);
    }
}

/// One record as read off the wire, fragment still protected.
#[derive(Debug, PartialEq, Eq)]
pub struct Record<'a> {
    pub header: RecordHeader,
    pub fragment: &'a [u8],
}

impl<'a> Record<'a> {
    pub fn parse(input: &'a [u8], dtls: bool) -> IResult<&'a [u8], Record<'a>> {
        let (input, header) = RecordHeader::parse(input, dtls)?;
        let (input, fragment) = take(header.length as usize)(input)?;
        Ok((input, Record { header, fragment }))
    }
}
