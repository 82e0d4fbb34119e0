//! Record layer.
//!
//! Holds the read and write [`CipherState`]s plus the pending states
//! installed by the key exchange, and promotes them on ChangeCipherSpec.
//! For DTLS it also applies the replay window, holds back records of the
//! next epoch that overtook the ChangeCipherSpec, and keeps the previous
//! write epoch alive so a flight can be resent with the keys it was first
//! sent under.

use std::collections::VecDeque;

use crate::buffer::Buf;
use crate::crypto::CryptoProvider;
use crate::message::{Record, RecordHeader};
use crate::types::{ContentType, ProtocolVersion};
use crate::window::ReplayWindow;
use crate::{Error, SeededRng};

mod cipher_state;
mod deframer;
mod fragment;

pub use cipher_state::{CipherState, MAX_CIPHERTEXT_LEN, MAX_PLAINTEXT_LEN};
pub use deframer::Deframer;
pub use fragment::{HandshakeJoiner, Reassembler};

/// Records of the next epoch held back before ChangeCipherSpec.
const MAX_EARLY_RECORDS: usize = 32;

/// Outcome of reading one DTLS record.
#[derive(Debug)]
pub enum DtlsRead {
    /// Authenticated plaintext.
    Plaintext(ContentType, Buf),
    /// A record of an epoch we already left. Peers retransmitting their
    /// previous flight look like this.
    Stale(ContentType),
    /// Replayed, forged, buffered for later or otherwise not for us now.
    Dropped,
}

#[derive(Debug)]
pub struct RecordLayer {
    dtls: bool,
    read: CipherState,
    write: CipherState,
    read_pending: Option<CipherState>,
    write_pending: Option<CipherState>,
    write_previous: Option<CipherState>,
    replay: ReplayWindow,
    early: VecDeque<Buf>,
}

impl RecordLayer {
    pub fn new(provider: &CryptoProvider, version: ProtocolVersion) -> Self {
        let dtls = version.is_dtls();
        RecordLayer {
            dtls,
            read: CipherState::null(provider, version, dtls),
            write: CipherState::null(provider, version, dtls),
            read_pending: None,
            write_pending: None,
            write_previous: None,
            replay: ReplayWindow::new(),
            early: VecDeque::new(),
        }
    }

    pub fn is_dtls(&self) -> bool {
        self.dtls
    }

    /// Record version once negotiated.
    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.read.set_version(version);
        self.write.set_version(version);
    }

    pub fn read_epoch(&self) -> u16 {
        self.read.epoch()
    }

    pub fn write_epoch(&self) -> u16 {
        self.write.epoch()
    }

    /// Install freshly derived keys, activated by ChangeCipherSpec.
    pub fn set_pending(&mut self, read: CipherState, write: CipherState) {
        debug!(
            "Pending cipher states installed for {} (epoch {})",
            read.suite(),
            read.epoch()
        );
        self.read_pending = Some(read);
        self.write_pending = Some(write);
    }

    /// Received ChangeCipherSpec.
    pub fn activate_read(&mut self) -> Result<(), Error> {
        let pending = self.read_pending.take().ok_or_else(|| {
            Error::UnexpectedMessage("ChangeCipherSpec without pending keys".into())
        })?;
        debug!("Read epoch {} active", pending.epoch());
        // The old state drops here and its keys are zeroized.
        self.read = pending;
        self.replay = ReplayWindow::new();
        Ok(())
    }

    /// Sent ChangeCipherSpec.
    pub fn activate_write(&mut self) -> Result<(), Error> {
        let pending = self.write_pending.take().ok_or_else(|| {
            Error::UnexpectedMessage("ChangeCipherSpec without pending keys".into())
        })?;
        debug!("Write epoch {} active", pending.epoch());
        let previous = std::mem::replace(&mut self.write, pending);
        if self.dtls {
            self.write_previous = Some(previous);
        }
        Ok(())
    }

    /// Forget the previous write epoch once no flight can be resent.
    pub fn drop_previous_write(&mut self) {
        self.write_previous = None;
    }

    /// Largest protection overhead of the current write state.
    pub fn write_overhead(&self, epoch: u16) -> usize {
        match &self.write_previous {
            Some(p) if p.epoch() == epoch => p.overhead(),
            _ => self.write.overhead(),
        }
    }

    /// Protect and append one record. `epoch` selects an earlier write epoch
    /// for DTLS retransmissions.
    pub fn encrypt(
        &mut self,
        content_type: ContentType,
        epoch: Option<u16>,
        plaintext: &[u8],
        rng: &mut SeededRng,
        output: &mut Buf,
    ) -> Result<(), Error> {
        let state = match epoch {
            None => &mut self.write,
            Some(e) if e == self.write.epoch() => &mut self.write,
            Some(e) => match &mut self.write_previous {
                Some(p) if p.epoch() == e => p,
                _ => {
                    return Err(Error::CryptoError(format!(
                        "No write state for epoch {}",
                        e
                    )))
                }
            },
        };
        state.encode_record(content_type, plaintext, rng, output)
    }

    /// Unprotect one TLS record.
    pub fn decrypt_tls(&mut self, header: &RecordHeader, fragment: &[u8]) -> Result<Buf, Error> {
        self.read.decode_record(header, fragment)
    }

    /// Unprotect one DTLS record.
    ///
    /// Records failing authentication are dropped rather than failing the
    /// connection (RFC 6347 4.1.2.7).
    pub fn decrypt_dtls(&mut self, record: &Record) -> Result<DtlsRead, Error> {
        let header = &record.header;
        let epoch = header.sequence.epoch;
        let current = self.read.epoch();

        if !header.content_type.is_known() {
            debug!("Dropping record of unknown type {:?}", header.content_type);
            return Ok(DtlsRead::Dropped);
        }

        if epoch < current {
            trace!("Stale record from epoch {}", epoch);
            return Ok(DtlsRead::Stale(header.content_type));
        }

        if epoch == current.wrapping_add(1) {
            if self.early.len() >= MAX_EARLY_RECORDS {
                debug!("Dropping early record of epoch {}, buffer full", epoch);
                return Ok(DtlsRead::Dropped);
            }
            trace!("Holding back record of epoch {}", epoch);
            let mut raw = Buf::new();
            header.serialize(true, &mut raw);
            raw.extend_from_slice(record.fragment);
            self.early.push_back(raw);
            return Ok(DtlsRead::Dropped);
        }

        if epoch != current {
            debug!("Dropping record of unexpected epoch {}", epoch);
            return Ok(DtlsRead::Dropped);
        }

        let seqno = header.sequence.sequence_number;
        if !self.replay.is_fresh(seqno) {
            trace!("Dropping replayed record {}", seqno);
            return Ok(DtlsRead::Dropped);
        }

        match self.read.decode_record(header, record.fragment) {
            Ok(plaintext) => {
                self.replay.update(seqno);
                Ok(DtlsRead::Plaintext(header.content_type, plaintext))
            }
            Err(Error::BadRecordMac) => {
                debug!("Dropping record {} failing authentication", seqno);
                Ok(DtlsRead::Dropped)
            }
            Err(e) => Err(e),
        }
    }

    /// Records of the now current epoch held back earlier.
    pub fn take_early_records(&mut self) -> Vec<Buf> {
        self.early.drain(..).collect()
    }
}
