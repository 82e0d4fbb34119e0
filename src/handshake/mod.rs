//! Handshake state machines.
//!
//! The client and server machines are driven one message at a time through
//! `advance`. Each call checks the message is legal in the current state,
//! acts on it, hashes it into the transcript and, when the peer's flight is
//! complete, builds our next flight through the [`Engine`](engine::Engine).
//!
//! ```text
//! Client                                               Server
//!
//! ClientHello                  -------->
//!                              <--------      HelloVerifyRequest (DTLS)
//! ClientHello (cookie)         -------->
//!                                                     ServerHello
//!                                                    Certificate*
//!                                              ServerKeyExchange*
//!                                             CertificateRequest*
//!                              <--------          ServerHelloDone
//! Certificate*
//! ClientKeyExchange
//! CertificateVerify*
//! [ChangeCipherSpec]
//! Finished                     -------->
//!                                              [ChangeCipherSpec]
//!                              <--------                 Finished
//! ```

use crate::message::Handshake;
use crate::Error;

mod client;
pub(crate) mod engine;
pub(crate) mod flight;
mod server;

pub(crate) use client::ClientHandshake;
pub use client::ClientState;
pub(crate) use server::ServerHandshake;
pub use server::ServerState;

/// Why the handshake stopped to wait for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    /// The client waits for a decision on the server certificate chain.
    ServerAuth,
    /// The server waits for a decision on the client certificate chain.
    ClientAuth,
    /// The client waits for a certificate to answer a CertificateRequest.
    ClientCertificateRequested,
}

/// Result of feeding one message to a state machine.
#[derive(Debug)]
pub enum Advance {
    Continue,
    /// Nothing was committed. Feed the same message again once the
    /// application has answered.
    Suspend(SuspendReason),
    Fatal(Error),
}

impl From<Result<Option<SuspendReason>, Error>> for Advance {
    fn from(value: Result<Option<SuspendReason>, Error>) -> Self {
        match value {
            Ok(None) => Advance::Continue,
            Ok(Some(reason)) => Advance::Suspend(reason),
            Err(e) => Advance::Fatal(e),
        }
    }
}

/// A unit of input for the state machines.
#[derive(Debug)]
pub(crate) enum Message {
    Handshake(Handshake),
    ChangeCipherSpec,
}

impl Message {
    pub fn describe(&self) -> String {
        match self {
            Message::Handshake(h) => format!("{:?}", h.msg_type()),
            Message::ChangeCipherSpec => "ChangeCipherSpec".into(),
        }
    }
}

/// Answer from the application to a suspension.
#[derive(Debug)]
pub(crate) enum Resolution {
    Trust(bool),
    Credential(Option<crate::auth::Credential>),
}

/// Either side's state machine.
#[derive(Debug)]
pub(crate) enum Machine {
    Client(ClientHandshake),
    Server(ServerHandshake),
}

impl Machine {
    pub fn advance(&mut self, engine: &mut engine::Engine, message: &Message) -> Advance {
        match self {
            Machine::Client(c) => c.advance(engine, message),
            Machine::Server(s) => s.advance(engine, message),
        }
    }

    pub fn resolve(&mut self, resolution: Resolution) {
        match self {
            Machine::Client(c) => c.resolve(resolution),
            Machine::Server(s) => s.resolve(resolution),
        }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            Machine::Client(c) => c.state() == ClientState::Ready,
            Machine::Server(s) => s.state() == ServerState::Ready,
        }
    }

    /// Move to a terminal state.
    pub fn close(&mut self, graceful: bool) {
        match self {
            Machine::Client(c) => c.close(graceful),
            Machine::Server(s) => s.close(graceful),
        }
    }
}
