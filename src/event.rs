//! Local events for the handshake state machines.
//!
//! Queued by the client and server machines for delivery via `poll_output`.

use crate::handshake::SuspendReason;
use crate::Output;

/// Events queued by the state machine for delivery to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocalEvent {
    /// Peer certificate is available for inspection.
    PeerCert,
    /// Handshake completed successfully.
    Connected,
    /// Handshake waits for the application.
    Suspended(SuspendReason),
    /// Peer sent close_notify.
    Closed,
}

impl LocalEvent {
    /// Convert this event into an `Output` for delivery to the application.
    ///
    /// * `buf` - Buffer to copy the certificate into.
    /// * `peer_certs` - Peer certificates received during handshake.
    pub(crate) fn into_output<'a>(self, buf: &'a mut [u8], peer_certs: &[Vec<u8>]) -> Output<'a> {
        match self {
            LocalEvent::PeerCert => match peer_certs.first() {
                Some(leaf) => {
                    let l = leaf.len();
                    assert!(l <= buf.len(), "Buffer too small for peer certificate");
                    buf[..l].copy_from_slice(leaf);
                    Output::PeerCert(&buf[..l])
                }
                None => Output::PeerCert(&[]),
            },
            LocalEvent::Connected => Output::Connected,
            LocalEvent::Suspended(reason) => Output::Suspended(reason),
            LocalEvent::Closed => Output::Closed,
        }
    }
}
