//! Shared machinery under both handshake state machines.
//!
//! The [`Engine`] owns everything that is not a decision of the state
//! machine: the record layer, the byte and datagram queues, handshake
//! framing and reassembly, the transcript, the retained flight and the
//! timers. The client and server machines call into it to send messages
//! and to derive keys.

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::buffer::{Buf, BufferPool};
use crate::config::Config;
use crate::crypto::{CryptoProvider, PrivateKey, Secret};
use crate::event::LocalEvent;
use crate::key_schedule::{self, KeyBlock, Prf};
use crate::kx::KxContext;
use crate::message::{Alert, Cookie, Handshake, Header, HelloVerifyRequest, MessageType, Record};
use crate::message::{CHANGE_CIPHER_SPEC, DTLS_HEADER_LEN, DTLS_RECORD_HEADER_LEN};
use crate::message::{RecordHeader, TLS_RECORD_HEADER_LEN};
use crate::record::{CipherState, Deframer, DtlsRead, HandshakeJoiner, Reassembler, RecordLayer};
use crate::record::{MAX_CIPHERTEXT_LEN, MAX_PLAINTEXT_LEN};
use crate::session::{Role, SessionContext};
use crate::suite::CipherSuite;
use crate::timer::Timeout;
use crate::transcript::Transcript;
use crate::types::{AlertDescription, ContentType, HashAlgorithm, ProtocolVersion};
use crate::types::SignatureAndHashAlgorithm;
use crate::{Error, Output, SeededRng};

use super::flight::Flight;
use super::Message;

/// Largest chunk of TLS output handed out as one packet.
const TLS_PACKET_LIMIT: usize = TLS_RECORD_HEADER_LEN + MAX_CIPHERTEXT_LEN;

pub(crate) struct Engine {
    pub config: Arc<Config>,
    pub provider: CryptoProvider,
    pub rng: SeededRng,
    buffers_free: BufferPool,
    dtls: bool,

    /// What the handshake negotiated so far.
    pub ctx: SessionContext,
    pub transcript: Transcript,

    records: RecordLayer,

    /// TLS byte stream input.
    deframer: Deframer,
    joiner: HandshakeJoiner,

    /// DTLS records waiting to be read, header included.
    queue_rx: VecDeque<Buf>,
    reassembler: Reassembler,

    /// Datagrams (or TLS chunks) waiting to be polled.
    queue_tx: VecDeque<Buf>,

    /// Complete messages for the state machine.
    incoming: VecDeque<Message>,

    /// Decrypted application data waiting to be polled.
    app_data: VecDeque<Buf>,

    events: VecDeque<LocalEvent>,

    /// message_seq of the next handshake message we send.
    next_handshake_seq_no: u16,

    flight: Flight,

    /// Overall limit for the DTLS handshake.
    connect_timeout: Timeout,

    last_now: Instant,

    /// The peer retransmitted something telling us our flight got lost.
    resend_requested: bool,

    /// Set when the handshake completes.
    release_app_data: bool,

    peer_closed: bool,

    /// A DTLS server restarts on any ClientHello until it sends ServerHello.
    accept_any_client_hello: bool,
}

impl Engine {
    pub fn new(config: Arc<Config>, role: Role, now: Instant) -> Result<Self, Error> {
        let provider = *config.crypto_provider();
        let mut rng = SeededRng::new(config.rng_seed(), provider.secure_random);
        let dtls = config.is_dtls();

        let flight = Flight::new(config.flight_start_rto(), config.flight_retries(), &mut rng);
        let transcript = Transcript::new(provider.hash_provider)?;
        let records = RecordLayer::new(&provider, config.min_version());
        let deframer = Deframer::new(
            config.max_queue_rx() * (TLS_RECORD_HEADER_LEN + MAX_CIPHERTEXT_LEN),
        );
        let ctx = SessionContext::new(role, config.min_version(), config.max_version());

        Ok(Engine {
            provider,
            rng,
            buffers_free: BufferPool::default(),
            dtls,
            ctx,
            transcript,
            records,
            deframer,
            joiner: HandshakeJoiner::new(),
            queue_rx: VecDeque::new(),
            reassembler: Reassembler::new(),
            queue_tx: VecDeque::new(),
            incoming: VecDeque::new(),
            app_data: VecDeque::new(),
            events: VecDeque::new(),
            next_handshake_seq_no: 0,
            flight,
            connect_timeout: if dtls {
                Timeout::Unarmed
            } else {
                Timeout::Disabled
            },
            last_now: now,
            resend_requested: false,
            release_app_data: false,
            peer_closed: false,
            accept_any_client_hello: dtls && role == Role::Server,
            config,
        })
    }

    pub fn is_dtls(&self) -> bool {
        self.dtls
    }

    pub fn is_peer_closed(&self) -> bool {
        self.peer_closed
    }

    pub fn is_released(&self) -> bool {
        self.release_app_data
    }

    /// Fix the record version once ServerHello settled it.
    pub fn set_version(&mut self, version: ProtocolVersion) {
        self.ctx.version = Some(version);
        self.records.set_version(version);
    }

    /// A DTLS server answers with the message_seq of the ClientHello.
    pub fn set_next_handshake_seq(&mut self, seq: u16) {
        self.next_handshake_seq_no = seq;
    }

    pub fn push_event(&mut self, event: LocalEvent) {
        self.events.push_back(event);
    }

    pub fn pop_incoming(&mut self) -> Option<Message> {
        self.incoming.pop_front()
    }

    /// Put back a message the state machine suspended on.
    pub fn unpop_incoming(&mut self, message: Message) {
        self.incoming.push_front(message);
    }

    // Input

    /// Take bytes (TLS) or one datagram (DTLS) from the transport.
    pub fn handle_input(&mut self, data: &[u8]) -> Result<(), Error> {
        if !self.dtls {
            return self.deframer.push(data);
        }

        let mut input = data;
        while !input.is_empty() {
            let (rest, record) = match Record::parse(input, true) {
                Ok(v) => v,
                Err(_) => {
                    debug!("Dropping {} unparseable bytes of datagram", input.len());
                    break;
                }
            };
            let bytes = &input[..input.len() - rest.len()];

            if self.queue_rx.len() >= self.config.max_queue_rx() {
                warn!(
                    "Receive queue full (max {}), dropping {:?} record",
                    self.config.max_queue_rx(),
                    record.header.content_type
                );
            } else {
                let mut raw = self.buffers_free.pop();
                raw.extend_from_slice(bytes);
                self.queue_rx.push_back(raw);
            }
            input = rest;
        }

        Ok(())
    }

    /// Read and dispatch one record. Returns `false` when nothing is left.
    pub fn read_record(&mut self) -> Result<bool, Error> {
        if self.dtls {
            let Some(raw) = self.queue_rx.pop_front() else {
                return Ok(false);
            };
            let result = self.read_dtls_record(&raw);
            self.buffers_free.push(raw);
            result?;
            return Ok(true);
        }

        let Some((header, fragment)) = self.deframer.next_record()? else {
            return Ok(false);
        };
        let plaintext = self.records.decrypt_tls(&header, &fragment)?;
        self.buffers_free.push(fragment);
        self.dispatch(header.content_type, plaintext)?;
        Ok(true)
    }

    fn read_dtls_record(&mut self, raw: &[u8]) -> Result<(), Error> {
        let (_, record) = Record::parse(raw, true)?;

        match self.records.decrypt_dtls(&record)? {
            DtlsRead::Plaintext(content_type, plaintext) => self.dispatch(content_type, plaintext),
            DtlsRead::Stale(ContentType::Handshake) => {
                trace!("Peer retransmits handshake from a previous epoch");
                self.resend_requested = true;
                Ok(())
            }
            DtlsRead::Stale(_) | DtlsRead::Dropped => Ok(()),
        }
    }

    fn dispatch(&mut self, content_type: ContentType, plaintext: Buf) -> Result<(), Error> {
        match content_type {
            ContentType::Handshake => {
                let result = self.receive_handshake(&plaintext);
                self.buffers_free.push(plaintext);
                result
            }
            ContentType::ChangeCipherSpec => {
                let result = self.receive_change_cipher_spec(&plaintext);
                self.buffers_free.push(plaintext);
                result
            }
            ContentType::Alert => {
                let result = self.receive_alert(&plaintext);
                self.buffers_free.push(plaintext);
                result
            }
            ContentType::ApplicationData => self.receive_application_data(plaintext),
            ContentType::Unknown(v) => Err(Error::UnexpectedMessage(format!(
                "Record of unknown content type {}",
                v
            ))),
        }
    }

    fn receive_handshake(&mut self, plaintext: &[u8]) -> Result<(), Error> {
        if !self.dtls {
            self.joiner.push(plaintext);
            while let Some(handshake) = self.joiner.pop()? {
                trace!("Received {:?}", handshake.msg_type());
                self.incoming.push_back(Message::Handshake(handshake));
            }
            return Ok(());
        }

        let old = self.reassembler.push_record(plaintext)?;
        for header in old {
            if self.accept_any_client_hello && header.msg_type == MessageType::ClientHello {
                debug!(
                    "Restarting at retransmitted ClientHello, message_seq {}",
                    header.message_seq
                );
                self.reassembler.reset_to(header.message_seq);
                self.reassembler.push_record(plaintext)?;
                break;
            }
            if triggers_resend(&header) {
                trace!("Duplicate {:?} from peer", header.msg_type);
                self.resend_requested = true;
            }
        }

        while let Some(handshake) = self.reassembler.pop() {
            trace!(
                "Received {:?} message_seq {}",
                handshake.msg_type(),
                handshake.header.message_seq
            );
            self.incoming.push_back(Message::Handshake(handshake));
        }
        Ok(())
    }

    fn receive_change_cipher_spec(&mut self, plaintext: &[u8]) -> Result<(), Error> {
        if plaintext != CHANGE_CIPHER_SPEC {
            return Err(Error::DecodeError("Malformed ChangeCipherSpec".into()));
        }
        if !self.dtls && !self.joiner.is_empty() {
            return Err(Error::UnexpectedMessage(
                "ChangeCipherSpec inside a handshake message".into(),
            ));
        }
        self.incoming.push_back(Message::ChangeCipherSpec);
        Ok(())
    }

    fn receive_alert(&mut self, plaintext: &[u8]) -> Result<(), Error> {
        let (rest, alert) = Alert::parse(plaintext)?;
        if !rest.is_empty() {
            return Err(Error::DecodeError("Trailing bytes after alert".into()));
        }

        if alert.description == AlertDescription::CloseNotify {
            debug!("Peer sent close_notify");
            if !self.peer_closed {
                self.peer_closed = true;
                self.events.push_back(LocalEvent::Closed);
            }
            return Ok(());
        }

        if alert.is_fatal() {
            warn!("Peer sent fatal alert {:?}", alert.description);
            return Err(Error::PeerAlert(alert.description));
        }

        debug!("Ignoring warning alert {:?}", alert.description);
        Ok(())
    }

    fn receive_application_data(&mut self, plaintext: Buf) -> Result<(), Error> {
        if !self.release_app_data {
            self.buffers_free.push(plaintext);
            if self.dtls {
                debug!("Dropping application data before the handshake completed");
                return Ok(());
            }
            return Err(Error::UnexpectedMessage(
                "Application data before the handshake completed".into(),
            ));
        }

        if self.dtls && !self.flight.is_empty() {
            // The peer has our last flight.
            debug!("Peer sends application data, forget flight {}", self.flight.number());
            self.flight.clear(&mut self.buffers_free);
            self.records.drop_previous_write();
        }

        if self.peer_closed || plaintext.is_empty() {
            self.buffers_free.push(plaintext);
            return Ok(());
        }

        self.app_data.push_back(plaintext);
        Ok(())
    }

    /// Hash a received message into the transcript.
    pub fn hash_received(&mut self, handshake: &Handshake) {
        let mut buf = self.buffers_free.pop();
        handshake.transcript_bytes(self.dtls, &mut buf);
        self.transcript.update(&buf);
        self.buffers_free.push(buf);
    }

    // Output

    pub fn poll_output<'a>(&mut self, buf: &'a mut [u8]) -> Output<'a> {
        if let Some(event) = self.events.pop_front() {
            return event.into_output(buf, &self.ctx.peer_certificates);
        }

        let buf = match self.poll_app_data(buf) {
            Ok(p) => return Output::ApplicationData(p),
            Err(b) => b,
        };

        if let Ok(p) = self.poll_packet_tx(buf) {
            return Output::Packet(p);
        }

        Output::Timeout(self.poll_timeout())
    }

    /// Application data larger than `buf` is handed out in pieces.
    fn poll_app_data<'a>(&mut self, buf: &'a mut [u8]) -> Result<&'a [u8], &'a mut [u8]> {
        let Some(mut data) = self.app_data.pop_front() else {
            return Err(buf);
        };

        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);

        if len < data.len() {
            data.drain_front(len);
            self.app_data.push_front(data);
        } else {
            self.buffers_free.push(data);
        }

        Ok(&buf[..len])
    }

    /// A DTLS datagram is never split. One that does not fit `buf` is
    /// dropped like a lost packet.
    fn poll_packet_tx<'a>(&mut self, buf: &'a mut [u8]) -> Result<&'a [u8], &'a mut [u8]> {
        let mut p = loop {
            let Some(p) = self.queue_tx.pop_front() else {
                return Err(buf);
            };
            if self.dtls && p.len() > buf.len() {
                warn!("Dropping datagram of {} bytes, output buffer holds {}", p.len(), buf.len());
                self.buffers_free.push(p);
                continue;
            }
            break p;
        };

        let len = p.len().min(buf.len());
        buf[..len].copy_from_slice(&p[..len]);

        if len < p.len() {
            p.drain_front(len);
            self.queue_tx.push_front(p);
        } else {
            self.buffers_free.push(p);
        }

        Ok(&buf[..len])
    }

    fn poll_timeout(&self) -> Instant {
        let flight = self.flight.deadline();
        let connect = self.connect_timeout.deadline();

        // Unarmed timers want a handle_timeout right away.
        if self.connect_timeout == Timeout::Unarmed || (flight.is_none() && !self.flight.is_disabled()) {
            return self.last_now;
        }

        match (connect, flight) {
            (Some(c), Some(f)) => c.min(f),
            (Some(c), None) => c,
            (None, Some(f)) => f,
            (None, None) => {
                const DISTANT_FUTURE: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);
                self.last_now + DISTANT_FUTURE
            }
        }
    }

    // Timers

    pub fn handle_timeout(&mut self, now: Instant) -> Result<(), Error> {
        self.last_now = now;

        if self.connect_timeout == Timeout::Unarmed {
            debug!(
                "Connect timeout in: {:.03}s",
                self.config.handshake_timeout().as_secs_f32()
            );
        }
        self.connect_timeout
            .arm_if_unarmed(now, self.config.handshake_timeout());
        self.flight.arm_if_unarmed(now);

        // The connect timeout is the overall limit for the handshake.
        if self.connect_timeout.expired(now) {
            return Err(Error::Timeout("connect"));
        }

        match self.flight.poll_expired(now, &mut self.rng) {
            Some(true) => self.flight_resend("flight timeout"),
            Some(false) => Err(Error::Timeout("handshake")),
            None => Ok(()),
        }
    }

    /// Start our next flight. Records created from now on are kept for
    /// retransmission.
    pub fn flight_begin(&mut self, number: u8) {
        self.flight
            .begin(number, self.dtls, &mut self.rng, &mut self.buffers_free);
    }

    /// Begin the last flight of the handshake. It is only resent when the
    /// peer shows it did not arrive.
    pub fn flight_begin_final(&mut self, number: u8) {
        self.flight
            .begin(number, false, &mut self.rng, &mut self.buffers_free);
    }

    fn flight_resend(&mut self, reason: &str) -> Result<(), Error> {
        if self.flight.is_empty() {
            return Ok(());
        }
        debug!("Resending flight {} due to {}", self.flight.number(), reason);

        // Taken out of self for the borrow of create_record.
        let entries = self.flight.take();

        let mut result = Ok(());
        for entry in &entries {
            result = self.create_record(entry.content_type, entry.epoch, false, |fragment| {
                fragment.extend_from_slice(&entry.fragment);
            });
            if result.is_err() {
                break;
            }
        }

        self.flight.restore(entries);
        result
    }

    /// Resend our flight if the peer's retransmissions asked for it.
    pub fn resend_if_requested(&mut self) -> Result<(), Error> {
        if mem::take(&mut self.resend_requested) {
            self.flight_resend("peer retransmission")
        } else {
            Ok(())
        }
    }

    /// The handshake is done. Stop the timers and let application data
    /// through.
    pub fn handshake_complete(&mut self) {
        debug!("Stop connect and flight timeouts");
        self.connect_timeout = Timeout::Disabled;
        self.flight.stop_timer();
        self.release_app_data = true;
        self.events.push_back(LocalEvent::Connected);
    }

    // Records

    pub fn create_record<F>(
        &mut self,
        content_type: ContentType,
        epoch: u16,
        save_fragment: bool,
        f: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut Buf),
    {
        let mut fragment = self.buffers_free.pop();
        f(&mut fragment);

        if save_fragment && self.dtls {
            let mut clone = self.buffers_free.pop();
            clone.extend_from_slice(&fragment);
            self.flight.save(content_type, epoch, clone);
        }

        let record_wire_len = RecordHeader::len(self.dtls)
            + fragment.len()
            + self.records.write_overhead(epoch);
        let limit = self.packet_limit();

        // Append to the last datagram if the record fits.
        let can_append = self
            .queue_tx
            .back()
            .map(|b| b.len() + record_wire_len <= limit)
            .unwrap_or(false);

        if self.dtls && !can_append && self.queue_tx.len() >= self.config.max_queue_tx() {
            warn!(
                "Transmit queue full (max {}), {} datagrams queued",
                self.config.max_queue_tx(),
                self.queue_tx.len()
            );
            self.buffers_free.push(fragment);
            return Err(Error::TransmitQueueFull);
        }

        let reuse = if can_append {
            self.queue_tx.pop_back()
        } else {
            None
        };
        let mut datagram = reuse.unwrap_or_else(|| self.buffers_free.pop());

        let epoch = self.dtls.then_some(epoch);
        let result = self
            .records
            .encrypt(content_type, epoch, &fragment, &mut self.rng, &mut datagram);

        if datagram.is_empty() {
            self.buffers_free.push(datagram);
        } else {
            self.queue_tx.push_back(datagram);
        }
        self.buffers_free.push(fragment);

        result
    }

    fn packet_limit(&self) -> usize {
        if self.dtls {
            self.config.mtu()
        } else {
            TLS_PACKET_LIMIT
        }
    }

    /// Create a handshake message, hash it and send it in as many records
    /// as it takes.
    ///
    /// The closure writes the message body.
    pub fn create_handshake<F>(&mut self, msg_type: MessageType, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Buf, &mut Self) -> Result<(), Error>,
    {
        let mut body = self.buffers_free.pop();
        f(&mut body, self)?;

        let header = Header::new(msg_type, body.len() as u32, self.next_handshake_seq_no);

        // The transcript sees the message unfragmented.
        let mut full = self.buffers_free.pop();
        header.serialize(self.dtls, &mut full);
        full.extend_from_slice(&body);
        self.transcript.update(&full);

        self.next_handshake_seq_no = self.next_handshake_seq_no.wrapping_add(1);
        if msg_type == MessageType::ServerHello {
            self.accept_any_client_hello = false;
        }

        debug!("Send {:?} ({} bytes)", msg_type, body.len());

        let epoch = self.records.write_epoch();
        let result = if self.dtls {
            self.fragment_handshake(header, &body, epoch)
        } else {
            let mut result = Ok(());
            for chunk in full.chunks(MAX_PLAINTEXT_LEN) {
                result = self.create_record(ContentType::Handshake, epoch, true, |fragment| {
                    fragment.extend_from_slice(chunk);
                });
                if result.is_err() {
                    break;
                }
            }
            result
        };

        self.buffers_free.push(full);
        self.buffers_free.push(body);
        result
    }

    fn fragment_handshake(&mut self, header: Header, body: &[u8], epoch: u16) -> Result<(), Error> {
        let mtu = self.config.mtu();
        let fixed_overhead =
            DTLS_RECORD_HEADER_LEN + DTLS_HEADER_LEN + self.records.write_overhead(epoch);
        let total = body.len();

        let mut offset = 0;
        loop {
            let used = self.queue_tx.back().map(|b| b.len()).unwrap_or(0);
            let available = mtu.saturating_sub(used);

            // Fill the current datagram, or start a fresh one when even the
            // headers do not fit.
            let room = if available > fixed_overhead {
                available - fixed_overhead
            } else {
                mtu.saturating_sub(fixed_overhead)
            };

            let chunk = (total - offset).min(room);
            if chunk == 0 && total > 0 {
                return Err(Error::ConfigError(format!(
                    "MTU {} leaves no room for handshake data",
                    mtu
                )));
            }

            let fragment_header = Header {
                fragment_offset: offset as u32,
                fragment_length: chunk as u32,
                ..header
            };
            let data = &body[offset..offset + chunk];

            self.create_record(ContentType::Handshake, epoch, true, |fragment| {
                fragment_header.serialize(true, fragment);
                fragment.extend_from_slice(data);
            })?;

            offset += chunk;
            if offset >= total {
                break;
            }
        }

        Ok(())
    }

    /// HelloVerifyRequest is stateless: not hashed, not kept for resends.
    pub fn send_hello_verify_request(&mut self, message_seq: u16, cookie: Cookie) -> Result<(), Error> {
        let mut body = self.buffers_free.pop();
        HelloVerifyRequest::new(ProtocolVersion::DTLS1_0, cookie).serialize(&mut body);
        let header = Header::new(MessageType::HelloVerifyRequest, body.len() as u32, message_seq);

        debug!("Send HelloVerifyRequest ({} bytes)", body.len());

        let epoch = self.records.write_epoch();
        let result = self.create_record(ContentType::Handshake, epoch, false, |fragment| {
            header.serialize(true, fragment);
            fragment.extend_from_slice(&body);
        });
        self.buffers_free.push(body);
        result
    }

    /// Send ChangeCipherSpec and switch writing to the pending keys.
    pub fn send_change_cipher_spec(&mut self) -> Result<(), Error> {
        debug!("Send ChangeCipherSpec");
        let epoch = self.records.write_epoch();
        self.create_record(ContentType::ChangeCipherSpec, epoch, true, |fragment| {
            fragment.extend_from_slice(&CHANGE_CIPHER_SPEC);
        })?;
        self.records.activate_write()
    }

    pub fn send_alert(&mut self, alert: Alert) -> Result<(), Error> {
        debug!("Send alert {:?} {:?}", alert.level, alert.description);
        let epoch = self.records.write_epoch();
        self.create_record(ContentType::Alert, epoch, false, |fragment| {
            alert.serialize(fragment);
        })
    }

    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        if !self.release_app_data {
            return Err(Error::UnexpectedMessage(
                "Application data before the handshake completed".into(),
            ));
        }

        let epoch = self.records.write_epoch();
        let chunk_len = if self.dtls {
            let room = self
                .config
                .mtu()
                .saturating_sub(DTLS_RECORD_HEADER_LEN + self.records.write_overhead(epoch));
            room.clamp(1, MAX_PLAINTEXT_LEN)
        } else {
            MAX_PLAINTEXT_LEN
        };

        for chunk in data.chunks(chunk_len) {
            self.create_record(ContentType::ApplicationData, epoch, false, |fragment| {
                fragment.extend_from_slice(chunk);
            })?;
        }
        Ok(())
    }

    // Keys

    /// Switch reading to the pending keys. Records of the new epoch that
    /// arrived early are read next.
    pub fn activate_read(&mut self) -> Result<(), Error> {
        self.records.activate_read()?;
        for raw in self.records.take_early_records().into_iter().rev() {
            self.queue_rx.push_front(raw);
        }
        Ok(())
    }

    fn prf(&self) -> Result<(Prf<'static>, ProtocolVersion, CipherSuite), Error> {
        let (version, suite) = self.ctx.negotiated()?;
        Ok((Prf::new(self.provider.hmac_provider, version, suite), version, suite))
    }

    fn tls12_hash(&self) -> Result<Option<HashAlgorithm>, Error> {
        let (version, suite) = self.ctx.negotiated()?;
        Ok(version.is_tls12().then(|| suite.prf_hash()))
    }

    /// Derive the master secret from the premaster secret. With the
    /// extended master secret the transcript up to now is bound in.
    pub fn compute_master_secret(&mut self, premaster: &[u8]) -> Result<(), Error> {
        let (prf, _, _) = self.prf()?;
        let master = if self.ctx.extended_master_secret {
            let session_hash = self.transcript.handshake_hash(self.tls12_hash()?)?;
            key_schedule::derive_extended_master_secret(&prf, premaster, &session_hash)?
        } else {
            key_schedule::derive_master_secret(
                &prf,
                premaster,
                &self.ctx.client_random,
                &self.ctx.server_random,
            )?
        };
        self.ctx.master_secret = Some(master);
        Ok(())
    }

    /// Expand the master secret into the pending read and write states.
    pub fn install_pending_keys(&mut self) -> Result<(), Error> {
        let (prf, version, suite) = self.prf()?;
        let block = KeyBlock::derive(
            &prf,
            suite,
            self.ctx.master_secret()?,
            &self.ctx.client_random,
            &self.ctx.server_random,
        )?;

        let read_epoch = self.records.read_epoch().wrapping_add(1);
        let write_epoch = self.records.write_epoch().wrapping_add(1);

        let client = |epoch: u16| {
            CipherState::new(
                &self.provider,
                version,
                self.dtls,
                suite,
                epoch,
                &block.client_mac,
                &block.client_key,
                &block.client_iv,
            )
        };
        let server = |epoch: u16| {
            CipherState::new(
                &self.provider,
                version,
                self.dtls,
                suite,
                epoch,
                &block.server_mac,
                &block.server_key,
                &block.server_iv,
            )
        };

        let (read, write) = match self.ctx.role {
            Role::Client => (server(read_epoch)?, client(write_epoch)?),
            Role::Server => (client(read_epoch)?, server(write_epoch)?),
        };

        debug!("Pending keys for {} ({})", suite, version);
        self.records.set_pending(read, write);
        Ok(())
    }

    /// verify_data of a Finished over the transcript so far.
    pub fn verify_data(&self, is_server: bool) -> Result<Secret, Error> {
        let (prf, _, _) = self.prf()?;
        let hash = self.transcript.handshake_hash(self.tls12_hash()?)?;
        key_schedule::compute_finished_mac(&prf, self.ctx.master_secret()?, is_server, &hash)
    }

    /// Borrow what the key exchange handlers need.
    pub fn kx_context<'a>(
        &'a mut self,
        client_version: ProtocolVersion,
        private_key: Option<&'a dyn PrivateKey>,
        peer_signature_algorithms: Option<&'a [SignatureAndHashAlgorithm]>,
    ) -> Result<KxContext<'a>, Error> {
        let version = self
            .ctx
            .version
            .ok_or_else(|| Error::UnexpectedMessage("No version negotiated".into()))?;

        Ok(KxContext {
            provider: &self.provider,
            rng: &mut self.rng,
            version,
            client_version,
            client_random: self.ctx.client_random,
            server_random: self.ctx.server_random,
            server_certificate: match self.ctx.role {
                Role::Client => self.ctx.peer_certificates.first().map(|c| c.as_slice()),
                Role::Server => None,
            },
            private_key,
            peer_signature_algorithms,
            signature_algorithms: self.config.signature_algorithms(),
            groups: self.config.groups(),
            credentials: self.config.credentials(),
        })
    }
}

/// Duplicates of the message closing a flight the peer answers tell us
/// our answer got lost.
fn triggers_resend(header: &Header) -> bool {
    header.fragment_offset == 0
        && matches!(
            header.msg_type,
            MessageType::ClientHello
                | MessageType::HelloVerifyRequest
                | MessageType::ServerHello
                | MessageType::ServerHelloDone
                | MessageType::ClientKeyExchange
        )
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("dtls", &self.dtls)
            .field("role", &self.ctx.role)
            .field("version", &self.ctx.version)
            .field("suite", &self.ctx.suite)
            .field("records", &self.records)
            .field("queue_rx", &self.queue_rx.len())
            .field("queue_tx", &self.queue_tx.len())
            .field("incoming", &self.incoming.len())
            .field("flight", &self.flight.number())
            .field("release_app_data", &self.release_app_data)
            .finish()
    }
}
