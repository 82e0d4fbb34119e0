//! Shared helpers for the integration tests.

#![allow(unused)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use tlsengine::auth::{PinnedCertificates, StaticCredentials};
use tlsengine::{Config, ConfigBuilder, Credential, Error, Output, SuspendReason, Tls};

pub const RSA_CERT: &[u8] = include_bytes!("../data/rsa2048.cert.der");
pub const RSA_KEY: &[u8] = include_bytes!("../data/rsa2048.key.der");
pub const P256_CERT: &[u8] = include_bytes!("../data/p256.cert.der");
pub const P256_KEY: &[u8] = include_bytes!("../data/p256.key.der");

/// Handshake message types.
pub const CLIENT_HELLO: u8 = 1;
pub const SERVER_HELLO: u8 = 2;
pub const HELLO_VERIFY_REQUEST: u8 = 3;
pub const CERTIFICATE: u8 = 11;
pub const SERVER_KEY_EXCHANGE: u8 = 12;
pub const CERTIFICATE_REQUEST: u8 = 13;
pub const SERVER_HELLO_DONE: u8 = 14;
pub const CERTIFICATE_VERIFY: u8 = 15;
pub const CLIENT_KEY_EXCHANGE: u8 = 16;

pub const CHANGE_CIPHER_SPEC: u8 = 20;
pub const ALERT: u8 = 21;
pub const HANDSHAKE: u8 = 22;
pub const APPLICATION_DATA: u8 = 23;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn rsa_credential() -> Credential {
    Credential::new(RSA_CERT.to_vec(), RSA_KEY.to_vec())
}

pub fn p256_credential() -> Credential {
    Credential::new(P256_CERT.to_vec(), P256_KEY.to_vec())
}

/// Server config presenting `credential`.
pub fn server_config(builder: ConfigBuilder, credential: Credential) -> Arc<Config> {
    let credentials = StaticCredentials::new().with_server(credential);
    Arc::new(
        builder
            .credentials(Arc::new(credentials))
            .build()
            .expect("server config"),
    )
}

/// Client config trusting exactly `trusted`.
pub fn client_config(builder: ConfigBuilder, trusted: &[u8]) -> Arc<Config> {
    let pinned = PinnedCertificates::new().with_certificate(trusted);
    Arc::new(
        builder
            .trust_evaluator(Arc::new(pinned))
            .build()
            .expect("client config"),
    )
}

/// Everything one endpoint produced while pumping.
#[derive(Debug, Default)]
pub struct Drained {
    pub packets: Vec<Vec<u8>>,
    pub app_data: Vec<Vec<u8>>,
    pub connected: bool,
    pub closed: bool,
    pub peer_cert: Option<Vec<u8>>,
    pub suspended: Vec<SuspendReason>,
    /// Errors returned while this endpoint was fed input or timeouts.
    pub errors: Vec<Error>,
    pub timeout: Option<Instant>,
}

impl Drained {
    pub fn handshake_types(&self, dtls: bool) -> Vec<u8> {
        handshake_types(&self.packets, dtls)
    }

    /// Any alert record was sent.
    pub fn has_alert(&self, dtls: bool) -> bool {
        self.packets
            .iter()
            .flat_map(|p| parse_records(p, dtls))
            .any(|r| r.ctype == ALERT)
    }
}

/// Poll `tls` until it reports a timeout, collecting into `into`. Returns
/// the packets of this round.
pub fn drain(tls: &mut Tls, into: &mut Drained) -> Vec<Vec<u8>> {
    let mut buf = vec![0; 20 * 1024];
    let mut packets = Vec::new();
    loop {
        match tls.poll_output(&mut buf) {
            Output::Packet(p) => packets.push(p.to_vec()),
            Output::Timeout(t) => {
                into.timeout = Some(t);
                break;
            }
            Output::Connected => into.connected = true,
            Output::PeerCert(c) => into.peer_cert = Some(c.to_vec()),
            Output::Suspended(reason) => into.suspended.push(reason),
            Output::ApplicationData(d) => into.app_data.push(d.to_vec()),
            Output::Closed => into.closed = true,
        }
    }
    into.packets.extend(packets.iter().cloned());
    packets
}

fn deliver(packets: &[Vec<u8>], to: &mut Tls, record: &mut Drained) {
    for p in packets {
        if let Err(e) = to.handle_input(p) {
            if !matches!(e, Error::Closed) {
                record.errors.push(e);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

/// Exchange packets until neither side has anything to say.
pub fn pump(client: &mut Tls, server: &mut Tls, now: Instant) -> (Drained, Drained) {
    pump_with(client, server, now, |_, _| true)
}

/// Like [`pump`], delivering only the packets `keep` accepts.
pub fn pump_with(
    client: &mut Tls,
    server: &mut Tls,
    now: Instant,
    mut keep: impl FnMut(Side, &[u8]) -> bool,
) -> (Drained, Drained) {
    let mut c = Drained::default();
    let mut s = Drained::default();

    for _ in 0..64 {
        for (tls, d) in [(&mut *client, &mut c), (&mut *server, &mut s)] {
            if let Err(e) = tls.handle_timeout(now) {
                if !matches!(e, Error::Closed) {
                    d.errors.push(e);
                }
            }
        }

        let from_client = drain(client, &mut c);
        let from_server = drain(server, &mut s);
        if from_client.is_empty() && from_server.is_empty() {
            break;
        }

        let from_client: Vec<_> = from_client
            .into_iter()
            .filter(|p| keep(Side::Client, p))
            .collect();
        let from_server: Vec<_> = from_server
            .into_iter()
            .filter(|p| keep(Side::Server, p))
            .collect();

        deliver(&from_client, server, &mut s);
        deliver(&from_server, client, &mut c);
    }

    (c, s)
}

/// Run a full handshake and assert both sides connected.
pub fn connect(client: &mut Tls, server: &mut Tls, now: Instant) -> (Drained, Drained) {
    let (c, s) = pump(client, server, now);
    assert!(c.errors.is_empty(), "client errors: {:?}", c.errors);
    assert!(s.errors.is_empty(), "server errors: {:?}", s.errors);
    assert!(c.connected, "client not connected");
    assert!(s.connected, "server not connected");
    (c, s)
}

/// Send `data` both ways and check it arrives intact.
pub fn exchange_data(client: &mut Tls, server: &mut Tls, now: Instant) {
    client.send_application_data(b"ping").expect("client send");
    server.send_application_data(b"pong").expect("server send");
    let (c, s) = pump(client, server, now);
    assert_eq!(s.app_data, vec![b"ping".to_vec()]);
    assert_eq!(c.app_data, vec![b"pong".to_vec()]);
}

/// Record header as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub ctype: u8,
    pub epoch: u16,
    pub seq: u64,
    pub fragment: Vec<u8>,
}

/// Split a TLS packet or DTLS datagram into records.
pub fn parse_records(packet: &[u8], dtls: bool) -> Vec<Record> {
    let header_len = if dtls { 13 } else { 5 };
    let mut out = Vec::new();
    let mut i = 0;
    while i + header_len <= packet.len() {
        let ctype = packet[i];
        let (epoch, seq) = if dtls {
            let epoch = u16::from_be_bytes([packet[i + 3], packet[i + 4]]);
            let mut seq = [0u8; 8];
            seq[2..].copy_from_slice(&packet[i + 5..i + 11]);
            (epoch, u64::from_be_bytes(seq))
        } else {
            (0, 0)
        };
        let len = u16::from_be_bytes([packet[i + header_len - 2], packet[i + header_len - 1]]) as usize;
        let end = (i + header_len + len).min(packet.len());
        out.push(Record {
            ctype,
            epoch,
            seq,
            fragment: packet[i + header_len..end].to_vec(),
        });
        i += header_len + len;
    }
    out
}

/// Handshake message types sent in the clear, in order. Stops at the first
/// ChangeCipherSpec. DTLS fragments are counted once, at offset zero.
pub fn handshake_types(packets: &[Vec<u8>], dtls: bool) -> Vec<u8> {
    let mut out = Vec::new();
    for record in packets.iter().flat_map(|p| parse_records(p, dtls)) {
        if record.ctype == CHANGE_CIPHER_SPEC {
            break;
        }
        if record.ctype != HANDSHAKE || record.fragment.is_empty() {
            continue;
        }
        if dtls {
            let offset = &record.fragment[6..9];
            if offset != [0, 0, 0] {
                continue;
            }
        }
        out.push(record.fragment[0]);
    }
    out
}

pub fn count(types: &[u8], t: u8) -> usize {
    types.iter().filter(|x| **x == t).count()
}
