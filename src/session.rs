//! Negotiated connection parameters and session resumption.
//!
//! [`SessionContext`] is what one handshake negotiated. Once a full
//! handshake completes, the resumable part of it is kept as
//! [`SessionData`], encoded into a [`SessionCache`] by a server and handed
//! to the application as a [`Session`] by a client.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::buffer::Buf;
use crate::crypto::Secret;
use crate::key_schedule::MASTER_SECRET_LEN;
use crate::message::SessionId;
use crate::suite::CipherSuite;
use crate::types::ProtocolVersion;
use crate::util::{many0, vec_u24};
use crate::Error;

/// Side of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Parameters negotiated by the handshake.
///
/// Read only to the application. The handshake fills it in as messages are
/// processed, so fields are only meaningful once the connection is up.
#[derive(Debug)]
pub struct SessionContext {
    pub(crate) role: Role,
    pub(crate) min_version: ProtocolVersion,
    pub(crate) max_version: ProtocolVersion,
    pub(crate) version: Option<ProtocolVersion>,
    pub(crate) suite: Option<CipherSuite>,
    pub(crate) client_random: [u8; 32],
    pub(crate) server_random: [u8; 32],
    pub(crate) session_id: SessionId,
    pub(crate) resumed: bool,
    pub(crate) extended_master_secret: bool,
    pub(crate) secure_renegotiation: bool,
    pub(crate) master_secret: Option<Secret>,
    pub(crate) peer_certificates: Vec<Vec<u8>>,
    pub(crate) local_certificates: Vec<Vec<u8>>,
    pub(crate) client_verify_data: Vec<u8>,
    pub(crate) server_verify_data: Vec<u8>,
    pub(crate) server_name: Option<String>,
    pub(crate) psk_identity: Option<Vec<u8>>,
}

impl SessionContext {
    pub(crate) fn new(role: Role, min_version: ProtocolVersion, max_version: ProtocolVersion) -> Self {
        SessionContext {
            role,
            min_version,
            max_version,
            version: None,
            suite: None,
            client_random: [0; 32],
            server_random: [0; 32],
            session_id: SessionId::empty(),
            resumed: false,
            extended_master_secret: false,
            secure_renegotiation: false,
            master_secret: None,
            peer_certificates: Vec::new(),
            local_certificates: Vec::new(),
            client_verify_data: Vec::new(),
            server_verify_data: Vec::new(),
            server_name: None,
            psk_identity: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn min_version(&self) -> ProtocolVersion {
        self.min_version
    }

    pub fn max_version(&self) -> ProtocolVersion {
        self.max_version
    }

    /// Negotiated version, once ServerHello is through.
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.suite
    }

    pub fn client_random(&self) -> &[u8; 32] {
        &self.client_random
    }

    pub fn server_random(&self) -> &[u8; 32] {
        &self.server_random
    }

    /// Empty when the server does not cache sessions.
    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    /// Whether the handshake was abbreviated.
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }

    /// Whether the peer indicated RFC 5746 support.
    pub fn secure_renegotiation(&self) -> bool {
        self.secure_renegotiation
    }

    /// Peer chain, leaf first.
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.peer_certificates
    }

    pub fn local_certificates(&self) -> &[Vec<u8>] {
        &self.local_certificates
    }

    pub fn client_verify_data(&self) -> &[u8] {
        &self.client_verify_data
    }

    pub fn server_verify_data(&self) -> &[u8] {
        &self.server_verify_data
    }

    /// The SNI name, sent by a client or received by a server.
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// The PSK identity used, for PSK suites.
    pub fn psk_identity(&self) -> Option<&[u8]> {
        self.psk_identity.as_deref()
    }

    pub(crate) fn master_secret(&self) -> Result<&Secret, Error> {
        self.master_secret
            .as_ref()
            .ok_or_else(|| Error::UnexpectedMessage("No master secret".into()))
    }

    pub(crate) fn negotiated(&self) -> Result<(ProtocolVersion, CipherSuite), Error> {
        match (self.version, self.suite) {
            (Some(v), Some(s)) => Ok((v, s)),
            _ => Err(Error::UnexpectedMessage("Nothing negotiated yet".into())),
        }
    }

    /// The resumable part, after a completed handshake.
    pub(crate) fn to_session_data(&self) -> Option<SessionData> {
        let (version, suite) = self.negotiated().ok()?;
        Some(SessionData {
            version,
            suite,
            master_secret: self.master_secret.clone()?,
            extended_master_secret: self.extended_master_secret,
            peer_certificates: self.peer_certificates.clone(),
        })
    }
}

/// Resumable state of a session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionData {
    pub version: ProtocolVersion,
    pub suite: CipherSuite,
    pub master_secret: Secret,
    pub extended_master_secret: bool,
    pub peer_certificates: Vec<Vec<u8>>,
}

impl SessionData {
    /// `u16 version || u16 suite || u8 len || master || u8 ems ||
    /// u24 len || (u24 len || cert)*`
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Buf::new();
        self.version.serialize(&mut out);
        out.put_u16(self.suite.as_u16());
        out.put_vec_u8(&self.master_secret);
        out.push(self.extended_master_secret as u8);
        out.nested_u24(|out| {
            for cert in &self.peer_certificates {
                out.put_vec_u24(cert);
            }
        });
        out.into_vec()
    }

    pub fn decode(input: &[u8]) -> Result<SessionData, Error> {
        let (rest, data) = Self::parse(input)?;
        if !rest.is_empty() {
            return Err(Error::DecodeError(format!(
                "{} trailing bytes in session entry",
                rest.len()
            )));
        }
        if data.master_secret.len() != MASTER_SECRET_LEN {
            return Err(Error::DecodeError(format!(
                "Session master secret of {} bytes",
                data.master_secret.len()
            )));
        }
        Ok(data)
    }

    fn parse(input: &[u8]) -> IResult<&[u8], SessionData> {
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, suite) = be_u16(input)?;
        let (input, master) = crate::util::vec_u8(input)?;
        let (input, ems) = be_u8(input)?;
        let (input, certs) = vec_u24(input)?;
        let (_, certs) = many0(vec_u24)(certs)?;

        Ok((
            input,
            SessionData {
                version,
                suite: CipherSuite::from_u16(suite),
                master_secret: Secret::from_slice(master),
                extended_master_secret: ems != 0,
                peer_certificates: certs.into_iter().map(|c| c.to_vec()).collect(),
            },
        ))
    }
}

impl fmt::Debug for SessionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionData")
            .field("version", &self.version)
            .field("suite", &self.suite)
            .field("extended_master_secret", &self.extended_master_secret)
            .field("peer_certificates", &self.peer_certificates.len())
            .finish()
    }
}

/// A session a client can offer for resumption.
///
/// Obtained from [`Tls::session`](crate::Tls::session) after a handshake
/// with a server that assigned a session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub data: SessionData,
}

/// Server side store of resumable sessions.
///
/// Entries are opaque [`SessionData::encode`] blobs keyed by session id.
/// Shared between connections, so implementations lock internally.
pub trait SessionCache: Send + Sync + fmt::Debug {
    fn get(&self, id: &[u8]) -> Option<Vec<u8>>;
    fn put(&self, id: &[u8], entry: Vec<u8>);
    fn delete(&self, id: &[u8]);
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<Vec<u8>, Vec<u8>>,
    order: VecDeque<Vec<u8>>,
}

/// In-memory [`SessionCache`] evicting the oldest entry when full.
#[derive(Debug)]
pub struct MemorySessionCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl MemorySessionCache {
    pub fn new(capacity: usize) -> Self {
        MemorySessionCache {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionCache for MemorySessionCache {
    fn get(&self, id: &[u8]) -> Option<Vec<u8>> {
        let inner = self.inner.lock().ok()?;
        inner.entries.get(id).cloned()
    }

    fn put(&self, id: &[u8], entry: Vec<u8>) {
        let Ok(mut inner) = self.inner.lock() else {
            warn!("Session cache lock poisoned");
            return;
        };
        if inner.entries.insert(id.to_vec(), entry).is_none() {
            inner.order.push_back(id.to_vec());
        }
        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
    }

    fn delete(&self, id: &[u8]) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.entries.remove(id).is_some() {
            inner.order.retain(|k| k != id);
        }
    }
}
