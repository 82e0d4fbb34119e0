//! Splitting a TLS byte stream into records.

use crate::buffer::Buf;
use crate::message::{RecordHeader, TLS_RECORD_HEADER_LEN};
use crate::record::MAX_CIPHERTEXT_LEN;
use crate::Error;

/// Append-only receive buffer for the TLS stream.
#[derive(Debug)]
pub struct Deframer {
    buf: Buf,
    limit: usize,
}

impl Deframer {
    /// `limit` bounds the bytes buffered but not yet consumed.
    pub fn new(limit: usize) -> Self {
        Deframer {
            buf: Buf::new(),
            limit,
        }
    }

    pub fn push(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.buf.len() + data.len() > self.limit {
            warn!(
                "Receive buffer full ({} + {} > {})",
                self.buf.len(),
                data.len(),
                self.limit
            );
            return Err(Error::ReceiveQueueFull);
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// The next complete record, `None` if more bytes are needed.
    pub fn next_record(&mut self) -> Result<Option<(RecordHeader, Buf)>, Error> {
        if self.buf.len() < TLS_RECORD_HEADER_LEN {
            return Ok(None);
        }

        let (_, header) = RecordHeader::parse(&self.buf, false)?;
        let len = header.length as usize;
        if len > MAX_CIPHERTEXT_LEN {
            return Err(Error::RecordOverflow(len));
        }
        if !header.content_type.is_known() {
            return Err(Error::UnexpectedMessage(format!(
                "Unknown content type {:?}",
                header.content_type
            )));
        }

        let total = TLS_RECORD_HEADER_LEN + len;
        if self.buf.len() < total {
            return Ok(None);
        }

        let fragment = Buf::from_slice(&self.buf[TLS_RECORD_HEADER_LEN..total]);
        self.buf.drain_front(total);
        Ok(Some((header, fragment)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentType;

    #[test]
    fn needs_more_bytes() {
        let mut d = Deframer::new(1 << 16);
        d.push(&[0x16, 0x03, 0x03]).unwrap();
        assert!(d.next_record().unwrap().is_none());
        d.push(&[0x00, 0x02, 0xAA]).unwrap();
        assert!(d.next_record().unwrap().is_none());
        d.push(&[0xBB, 0x17, 0x03, 0x03, 0x00, 0x00]).unwrap();

        let (h, f) = d.next_record().unwrap().unwrap();
        assert_eq!(h.content_type, ContentType::Handshake);
        assert_eq!(&*f, &[0xAA, 0xBB]);

        let (h, f) = d.next_record().unwrap().unwrap();
        assert_eq!(h.content_type, ContentType::ApplicationData);
        assert!(f.is_empty());
        assert_eq!(d.buffered(), 0);
    }

    #[test]
    fn oversized_record() {
        let mut d = Deframer::new(1 << 16);
        d.push(&[0x17, 0x03, 0x03, 0xFF, 0xFF]).unwrap();
        assert!(matches!(d.next_record(), Err(Error::RecordOverflow(_))));
    }

    #[test]
    fn limit_enforced() {
        let mut d = Deframer::new(4);
        assert!(matches!(d.push(&[0; 5]), Err(Error::ReceiveQueueFull)));
    }
}
