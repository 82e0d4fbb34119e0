//! Handshake message framing across records.
//!
//! In TLS a handshake message may span several records and a record may
//! hold several messages; [`HandshakeJoiner`] takes care of that. DTLS
//! messages carry explicit fragment ranges and arrive in any order;
//! [`Reassembler`] collects fragments keyed by `(message_seq, offset)` and
//! releases messages strictly in sequence.

use std::collections::BTreeMap;

use crate::buffer::Buf;
use crate::message::{Handshake, Header, DTLS_HEADER_LEN, TLS_HEADER_LEN};
use crate::Error;

/// Largest handshake message accepted, certificate chains included.
pub const MAX_MESSAGE_LEN: usize = 1 << 17;

/// Most fragments held for reassembly at once.
const MAX_FRAGMENTS: usize = 256;

/// How far ahead of the expected message_seq fragments are kept.
const MAX_SEQ_AHEAD: u16 = 16;

/// Joins TLS handshake records into messages.
#[derive(Debug, Default)]
pub struct HandshakeJoiner {
    buf: Buf,
}

impl HandshakeJoiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// True when no partial message is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The next complete message, `None` if more bytes are needed.
    pub fn pop(&mut self) -> Result<Option<Handshake>, Error> {
        if self.buf.len() < TLS_HEADER_LEN {
            return Ok(None);
        }
        let len = u32::from_be_bytes([0, self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > MAX_MESSAGE_LEN {
            return Err(Error::DecodeError(format!(
                "Handshake message of {} bytes too large",
                len
            )));
        }
        if self.buf.len() < TLS_HEADER_LEN + len {
            return Ok(None);
        }

        let (_, handshake) = Handshake::parse(&self.buf[..TLS_HEADER_LEN + len], false)?;
        self.buf.drain_front(TLS_HEADER_LEN + len);
        Ok(Some(handshake))
    }
}

#[derive(Debug)]
struct Fragment {
    header: Header,
    data: Buf,
}

/// DTLS handshake reassembly.
#[derive(Debug, Default)]
pub struct Reassembler {
    next_seq: u16,
    fragments: BTreeMap<(u16, u32), Fragment>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// message_seq of the next message to be released.
    pub fn next_seq(&self) -> u16 {
        self.next_seq
    }

    /// Whether `header` belongs to a message already released.
    pub fn is_old(&self, header: &Header) -> bool {
        header.message_seq < self.next_seq
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    /// Parse the handshake fragments in a plaintext record and store them.
    ///
    /// Returns the headers of fragments belonging to already released
    /// messages, a hint that the peer is retransmitting.
    pub fn push_record(&mut self, plaintext: &[u8]) -> Result<Vec<Header>, Error> {
        let mut input = plaintext;
        let mut old = Vec::new();

        while !input.is_empty() {
            if input.len() < DTLS_HEADER_LEN {
                debug!("Dropping {} trailing handshake bytes", input.len());
                break;
            }
            let (rest, header) = Header::parse(input, true)?;
            let len = header.fragment_length as usize;
            if rest.len() < len {
                debug!("Dropping truncated handshake fragment");
                break;
            }
            let (data, rest) = rest.split_at(len);
            input = rest;

            if self.is_old(&header) {
                old.push(header);
                continue;
            }
            self.insert(header, data)?;
        }

        Ok(old)
    }

    /// Store one fragment. Inconsistent fragments are dropped.
    pub fn insert(&mut self, header: Header, data: &[u8]) -> Result<(), Error> {
        if header.message_seq < self.next_seq {
            return Ok(());
        }
        if header.message_seq - self.next_seq > MAX_SEQ_AHEAD {
            debug!("Dropping fragment of message_seq {} too far ahead", header.message_seq);
            return Ok(());
        }

        let end = header.fragment_offset as u64 + header.fragment_length as u64;
        if header.length as usize > MAX_MESSAGE_LEN || end > header.length as u64 {
            debug!("Dropping out of range fragment {:?}", header);
            return Ok(());
        }

        // All fragments of a message must agree on type and length.
        let same_message = self
            .fragments
            .range((header.message_seq, 0)..=(header.message_seq, u32::MAX))
            .next();
        if let Some((_, f)) = same_message {
            if f.header.msg_type != header.msg_type || f.header.length != header.length {
                debug!("Dropping fragment disagreeing with reassembly {:?}", header);
                return Ok(());
            }
        }

        let key = (header.message_seq, header.fragment_offset);
        if let Some(existing) = self.fragments.get(&key) {
            if existing.header.fragment_length >= header.fragment_length {
                return Ok(());
            }
        }

        if self.fragments.len() >= MAX_FRAGMENTS {
            // Make room for an earlier message at the expense of the latest one.
            match self.fragments.keys().next_back().copied() {
                Some(last) if last.0 > header.message_seq => {
                    debug!("Reassembly buffer full, evicting fragment {:?}", last);
                    self.fragments.remove(&last);
                }
                _ => {
                    debug!("Reassembly buffer full, dropping fragment {:?}", header);
                    return Ok(());
                }
            }
        }

        self.fragments.insert(
            key,
            Fragment {
                header,
                data: Buf::from_slice(data),
            },
        );
        Ok(())
    }

    /// The next message in sequence if all its bytes have arrived.
    pub fn pop(&mut self) -> Option<Handshake> {
        let seq = self.next_seq;
        let mut range = self.fragments.range((seq, 0)..=(seq, u32::MAX));
        let (_, first) = range.next()?;
        let header = first.header;
        let total = header.length as usize;

        let mut body = Buf::with_capacity(total);
        for (_, f) in self.fragments.range((seq, 0)..=(seq, u32::MAX)) {
            let offset = f.header.fragment_offset as usize;
            if offset > body.len() {
                return None;
            }
            let skip = body.len() - offset;
            if skip < f.data.len() {
                body.extend_from_slice(&f.data[skip..]);
            }
            if body.len() == total {
                break;
            }
        }
        if body.len() != total {
            return None;
        }

        self.fragments.retain(|(s, _), _| *s != seq);
        self.next_seq = seq.wrapping_add(1);

        Some(Handshake {
            header: Header::new(header.msg_type, header.length, seq),
            body,
        })
    }

    /// Restart numbering, used when a server answered with a
    /// HelloVerifyRequest.
    pub fn reset_to(&mut self, next_seq: u16) {
        self.next_seq = next_seq;
        self.fragments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;

    fn fragment(seq: u16, total: u32, offset: u32, data: &[u8]) -> (Header, Vec<u8>) {
        (
            Header {
                msg_type: MessageType::Certificate,
                length: total,
                message_seq: seq,
                fragment_offset: offset,
                fragment_length: data.len() as u32,
            },
            data.to_vec(),
        )
    }

    #[test]
    fn tls_joiner_spans_records() {
        let mut j = HandshakeJoiner::new();
        j.push(&[0x0E, 0x00]);
        assert!(j.pop().unwrap().is_none());
        j.push(&[0x00, 0x00, 0x14, 0x00, 0x00, 0x02]);
        let hello_done = j.pop().unwrap().unwrap();
        assert_eq!(hello_done.msg_type(), MessageType::ServerHelloDone);
        assert!(j.pop().unwrap().is_none());
        j.push(&[0xAA, 0xBB]);
        let other = j.pop().unwrap().unwrap();
        assert_eq!(other.msg_type(), MessageType::Finished);
        assert_eq!(&*other.body, &[0xAA, 0xBB]);
        assert!(j.is_empty());
    }

    #[test]
    fn out_of_order_fragments() {
        let mut r = Reassembler::new();
        let (h, d) = fragment(0, 6, 4, &[5, 6]);
        r.insert(h, &d).unwrap();
        assert!(r.pop().is_none());
        let (h, d) = fragment(0, 6, 0, &[1, 2, 3]);
        r.insert(h, &d).unwrap();
        assert!(r.pop().is_none());
        // Overlaps the first fragment.
        let (h, d) = fragment(0, 6, 2, &[3, 4]);
        r.insert(h, &d).unwrap();

        let m = r.pop().unwrap();
        assert_eq!(&*m.body, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(m.header.fragment_length, 6);
        assert_eq!(r.next_seq(), 1);
    }

    #[test]
    fn messages_released_in_order() {
        let mut r = Reassembler::new();
        let (h, d) = fragment(1, 1, 0, &[2]);
        r.insert(h, &d).unwrap();
        assert!(r.pop().is_none());
        let (h, d) = fragment(0, 1, 0, &[1]);
        r.insert(h, &d).unwrap();
        assert_eq!(&*r.pop().unwrap().body, &[1]);
        assert_eq!(&*r.pop().unwrap().body, &[2]);
    }

    #[test]
    fn inconsistent_fragments_dropped() {
        let mut r = Reassembler::new();
        let (h, d) = fragment(0, 4, 0, &[1, 2]);
        r.insert(h, &d).unwrap();
        // Different total length
        let (h, d) = fragment(0, 5, 2, &[3, 4, 5]);
        r.insert(h, &d).unwrap();
        // Beyond the end
        let (h, d) = fragment(0, 4, 3, &[4, 5]);
        r.insert(h, &d).unwrap();
        assert!(r.pop().is_none());

        let (h, d) = fragment(0, 4, 2, &[3, 4]);
        r.insert(h, &d).unwrap();
        assert_eq!(&*r.pop().unwrap().body, &[1, 2, 3, 4]);
    }

    #[test]
    fn old_fragments_reported() {
        let mut r = Reassembler::new();
        let mut record = Buf::new();
        Header::new(MessageType::ServerHelloDone, 0, 0).serialize(true, &mut record);
        assert!(r.push_record(&record).unwrap().is_empty());
        assert!(r.pop().is_some());

        let old = r.push_record(&record).unwrap();
        assert_eq!(old.len(), 1);
        assert!(r.pop().is_none());
    }

    #[test]
    fn fragment_flood_is_dropped() {
        let mut r = Reassembler::new();
        for offset in 0..300 {
            let (h, d) = fragment(1, 4000, offset, &[0xFF]);
            r.insert(h, &d).unwrap();
        }
        assert_eq!(r.fragments.len(), MAX_FRAGMENTS);

        // The message actually due still gets through.
        let (h, d) = fragment(0, 2, 0, &[1, 2]);
        r.insert(h, &d).unwrap();
        assert_eq!(r.fragments.len(), MAX_FRAGMENTS);
        assert_eq!(&*r.pop().unwrap().body, &[1, 2]);
    }

    #[test]
    fn empty_message() {
        let mut r = Reassembler::new();
        let (h, d) = fragment(0, 0, 0, &[]);
        r.insert(h, &d).unwrap();
        assert!(r.pop().unwrap().body.is_empty());
    }
}
