//! tlsengine: a Sans-IO TLS 1.0-1.2 and DTLS 1.0-1.2 protocol engine.
//!
//! The engine never touches a socket. Ciphertext goes in through
//! [`Tls::handle_input`], and everything the application needs to act on
//! comes out of [`Tls::poll_output`]: packets to put on the wire, decrypted
//! application data, handshake events and the next instant
//! [`Tls::handle_timeout`] wants to be called at.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use tlsengine::{Config, Output, Tls};
//!
//! let config = Arc::new(Config::builder().build().unwrap());
//! let mut tls = Tls::new_client(config, Some("example.com"), Instant::now()).unwrap();
//!
//! let mut buf = vec![0; 16 * 1024];
//! loop {
//!     match tls.poll_output(&mut buf) {
//!         Output::Packet(p) => { /* write p to the transport */ }
//!         Output::Timeout(_) => break,
//!         _ => {}
//!     }
//! }
//! ```
//!
//! [`TlsStream`] drives a TLS connection over a blocking transport for
//! callers that do not need the Sans-IO surface.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

use std::sync::Arc;
use std::time::Instant;

pub mod auth;
mod buffer;
pub mod certificate;
mod config;
pub mod crypto;
mod error;
mod event;
mod handshake;
mod key_schedule;
mod kx;
mod message;
mod record;
mod rng;
mod session;
mod stream;
mod suite;
mod timer;
mod transcript;
mod types;
mod util;
mod window;

pub use auth::{ClientCertificateRequest, Credential, CredentialProvider, CredentialResult};
pub use auth::{TrustDecision, TrustEvaluator};
pub use config::{ClientAuth, Config, ConfigBuilder};
pub use error::{Error, ErrorKind};
pub use handshake::{ClientState, ServerState, SuspendReason};
pub use message::SessionId;
pub use rng::SeededRng;
pub use session::{MemorySessionCache, Role, Session, SessionCache, SessionContext, SessionData};
pub use stream::{TlsStream, Transport};
pub use suite::{CipherSuite, KeyExchangeAlgorithm};
pub use types::{AlertDescription, HashAlgorithm, NamedGroup, ProtocolVersion};
pub use types::{SignatureAlgorithm, SignatureAndHashAlgorithm, Variant};

use handshake::engine::Engine;
use handshake::{Advance, ClientHandshake, Machine, Resolution, ServerHandshake};
use message::Alert;

/// Output from [`Tls::poll_output`].
#[derive(Debug)]
pub enum Output<'a> {
    /// Bytes to send to the peer. One datagram for DTLS.
    Packet(&'a [u8]),
    /// Call [`Tls::handle_timeout`] at this instant.
    ///
    /// Also means there is nothing more to poll right now.
    Timeout(Instant),
    /// The handshake completed.
    Connected,
    /// The peer's leaf certificate, DER encoded.
    PeerCert(&'a [u8]),
    /// The handshake waits for the application. Answer with
    /// [`Tls::resolve_trust`] or [`Tls::provide_client_credential`].
    Suspended(SuspendReason),
    /// Decrypted application data.
    ApplicationData(&'a [u8]),
    /// The peer closed the connection with close_notify.
    Closed,
}

/// A TLS or DTLS connection, client or server.
pub struct Tls {
    engine: Engine,
    machine: Machine,
    suspended: Option<SuspendReason>,
    /// A fatal error happened. Only output is still served.
    failed: bool,
    /// We sent close_notify.
    closed: bool,
}

impl Tls {
    /// Start a client handshake. The ClientHello is ready to poll at once.
    pub fn new_client(config: Arc<Config>, server_name: Option<&str>, now: Instant) -> Result<Tls, Error> {
        Self::client(config, server_name, None, now)
    }

    /// Start a client handshake offering to resume `session`.
    ///
    /// Falls back to a full handshake when the server does not agree.
    pub fn resume_client(
        config: Arc<Config>,
        server_name: Option<&str>,
        session: Session,
        now: Instant,
    ) -> Result<Tls, Error> {
        Self::client(config, server_name, Some(session), now)
    }

    fn client(
        config: Arc<Config>,
        server_name: Option<&str>,
        session: Option<Session>,
        now: Instant,
    ) -> Result<Tls, Error> {
        let mut engine = Engine::new(config, Role::Client, now)?;
        let mut client = ClientHandshake::new(server_name, session);
        client.start(&mut engine)?;

        Ok(Tls {
            engine,
            machine: Machine::Client(client),
            suspended: None,
            failed: false,
            closed: false,
        })
    }

    /// Create a server waiting for a ClientHello.
    pub fn new_server(config: Arc<Config>, now: Instant) -> Result<Tls, Error> {
        let mut engine = Engine::new(config, Role::Server, now)?;
        let server = ServerHandshake::new(&mut engine);

        Ok(Tls {
            engine,
            machine: Machine::Server(server),
            suspended: None,
            failed: false,
            closed: false,
        })
    }

    pub fn is_dtls(&self) -> bool {
        self.engine.is_dtls()
    }

    /// Handshake completed and the connection is usable.
    pub fn is_connected(&self) -> bool {
        !self.failed && self.machine.is_ready()
    }

    /// Either side closed the connection, or it failed.
    pub fn is_closed(&self) -> bool {
        self.failed || self.closed || self.engine.is_peer_closed()
    }

    /// What the handshake is waiting for, if suspended.
    pub fn suspended(&self) -> Option<SuspendReason> {
        self.suspended
    }

    /// Parameters negotiated so far.
    pub fn context(&self) -> &SessionContext {
        &self.engine.ctx
    }

    /// The session to offer in [`Tls::resume_client`] for a later
    /// connection. `None` before the handshake completed, or if the server
    /// assigned no session id.
    pub fn session(&self) -> Option<Session> {
        if self.failed || !self.engine.is_released() || self.engine.ctx.session_id.is_empty() {
            return None;
        }
        Some(Session {
            id: self.engine.ctx.session_id,
            data: self.engine.ctx.to_session_data()?,
        })
    }

    /// Feed bytes from the transport. For DTLS one call per datagram.
    pub fn handle_input(&mut self, data: &[u8]) -> Result<(), Error> {
        self.check_usable()?;
        if let Err(e) = self.engine.handle_input(data) {
            return Err(self.fail(e));
        }
        self.process()
    }

    /// Drive the timers. Call at the instant of the last
    /// [`Output::Timeout`], or earlier.
    pub fn handle_timeout(&mut self, now: Instant) -> Result<(), Error> {
        self.check_usable()?;
        if let Err(e) = self.engine.handle_timeout(now) {
            return Err(self.fail(e));
        }
        Ok(())
    }

    /// Poll until [`Output::Timeout`] after every input, timeout or send.
    ///
    /// For DTLS, `buf` must hold at least [`Config::mtu`] bytes. A datagram
    /// that does not fit is dropped and left to retransmission.
    pub fn poll_output<'a>(&mut self, buf: &'a mut [u8]) -> Output<'a> {
        self.engine.poll_output(buf)
    }

    /// Encrypt and queue application data.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.check_usable()?;
        if self.closed {
            return Err(Error::Closed);
        }
        if let Some(reason) = self.suspended {
            return Err(Error::WouldBlock(reason));
        }
        self.engine.send_application_data(data)
    }

    /// Answer a [`SuspendReason::ServerAuth`] or
    /// [`SuspendReason::ClientAuth`] suspension.
    pub fn resolve_trust(&mut self, trusted: bool) -> Result<(), Error> {
        match self.suspended {
            Some(SuspendReason::ServerAuth | SuspendReason::ClientAuth) => {}
            other => {
                return Err(Error::ConfigError(format!(
                    "Not waiting for a trust decision ({:?})",
                    other
                )))
            }
        }
        self.resume(Resolution::Trust(trusted))
    }

    /// Answer a [`SuspendReason::ClientCertificateRequested`] suspension.
    /// `None` continues without a client certificate.
    pub fn provide_client_credential(&mut self, credential: Option<Credential>) -> Result<(), Error> {
        if self.suspended != Some(SuspendReason::ClientCertificateRequested) {
            return Err(Error::ConfigError(format!(
                "Not waiting for a client credential ({:?})",
                self.suspended
            )));
        }
        self.resume(Resolution::Credential(credential))
    }

    /// Send close_notify. Further sends fail, received data is still
    /// delivered.
    pub fn close(&mut self) -> Result<(), Error> {
        self.check_usable()?;
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.machine.close(true);
        self.engine
            .send_alert(Alert::warning(AlertDescription::CloseNotify))
    }

    fn resume(&mut self, resolution: Resolution) -> Result<(), Error> {
        self.check_usable()?;
        self.machine.resolve(resolution);
        self.suspended = None;
        self.process()
    }

    fn check_usable(&self) -> Result<(), Error> {
        if self.failed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Feed queued messages to the state machine, reading records as
    /// needed, until input runs out or the machine suspends.
    fn process(&mut self) -> Result<(), Error> {
        while self.suspended.is_none() {
            if let Some(message) = self.engine.pop_incoming() {
                match self.machine.advance(&mut self.engine, &message) {
                    Advance::Continue => {}
                    Advance::Suspend(reason) => {
                        debug!("Suspend at {} for {:?}", message.describe(), reason);
                        self.engine.unpop_incoming(message);
                        self.suspended = Some(reason);
                        self.engine.push_event(event::LocalEvent::Suspended(reason));
                    }
                    Advance::Fatal(e) => return Err(self.fail(e)),
                }
                continue;
            }

            match self.engine.read_record() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Err(self.fail(e)),
            }
        }

        if self.engine.is_peer_closed() && !self.closed {
            // Answer close_notify with our own.
            self.closed = true;
            self.machine.close(true);
            if let Err(e) = self
                .engine
                .send_alert(Alert::warning(AlertDescription::CloseNotify))
            {
                return Err(self.fail(e));
            }
        }

        if let Err(e) = self.engine.resend_if_requested() {
            return Err(self.fail(e));
        }
        Ok(())
    }

    /// Send the alert for `error`, if it has one, and stop the connection.
    fn fail(&mut self, error: Error) -> Error {
        warn!("Connection failed: {}", error);
        if let Some(description) = error.alert() {
            if let Err(e) = self.engine.send_alert(Alert::fatal(description)) {
                debug!("Could not queue alert: {}", e);
            }
        }
        self.machine.close(false);
        self.failed = true;
        error
    }
}

impl std::fmt::Debug for Tls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tls")
            .field("machine", &self.machine)
            .field("suspended", &self.suspended)
            .field("failed", &self.failed)
            .field("closed", &self.closed)
            .finish()
    }
}
