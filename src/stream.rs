//! Blocking driver for TLS over a byte stream.
//!
//! [`TlsStream`] pumps a [`Tls`] against a [`Transport`] and exposes the
//! connection as [`std::io::Read`] and [`std::io::Write`]. DTLS needs timers
//! and is left to the Sans-IO surface.

use std::io::{self, Read, Write};

use crate::{Error, Output, SuspendReason, Tls};

/// Size of the buffer polled for outgoing packets.
const POLL_BUF_LEN: usize = 18 * 1024;

/// Blocking byte transport under a [`TlsStream`].
///
/// Implemented for anything that is [`Read`] and [`Write`], such as a
/// `TcpStream`.
pub trait Transport {
    /// Read some bytes. `Ok(0)` is end of stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Read + Write> Transport for T {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self)
    }
}

/// A TLS connection over a blocking transport.
///
/// The handshake runs on the first read or write, or explicitly through
/// [`TlsStream::handshake`]. A suspended handshake surfaces as
/// [`Error::WouldBlock`]; answer through [`TlsStream::tls_mut`] and call
/// `handshake` again.
pub struct TlsStream<T: Transport> {
    tls: Tls,
    transport: T,
    /// Decrypted data not yet read by the caller.
    plaintext: Vec<u8>,
    read_buf: Vec<u8>,
    poll_buf: Vec<u8>,
    peer_closed: bool,
}

impl<T: Transport> TlsStream<T> {
    pub fn new(tls: Tls, transport: T) -> Result<Self, Error> {
        if tls.is_dtls() {
            return Err(Error::ConfigError(
                "TlsStream runs over a byte stream, not DTLS".into(),
            ));
        }
        Ok(TlsStream {
            tls,
            transport,
            plaintext: Vec::new(),
            read_buf: vec![0; POLL_BUF_LEN],
            poll_buf: vec![0; POLL_BUF_LEN],
            peer_closed: false,
        })
    }

    pub fn tls(&self) -> &Tls {
        &self.tls
    }

    pub fn tls_mut(&mut self) -> &mut Tls {
        &mut self.tls
    }

    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> (Tls, T) {
        (self.tls, self.transport)
    }

    /// Run the handshake to completion.
    pub fn handshake(&mut self) -> Result<(), Error> {
        loop {
            self.flush_output()?;

            if self.tls.is_connected() {
                return Ok(());
            }
            if let Some(reason) = self.tls.suspended() {
                return Err(Error::WouldBlock(reason));
            }
            if self.tls.is_closed() {
                return Err(Error::Closed);
            }

            if !self.fill()? {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Transport closed during handshake",
                )));
            }
        }
    }

    /// Send close_notify.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        self.tls.close()?;
        self.flush_output()
    }

    /// Read once from the transport into the engine. `false` at end of
    /// stream.
    fn fill(&mut self) -> Result<bool, Error> {
        let n = self.transport.read(&mut self.read_buf)?;
        if n == 0 {
            return Ok(false);
        }
        trace!("Transport read {} bytes", n);
        let result = self.tls.handle_input(&self.read_buf[..n]);
        // Alerts queued by a failure still go out.
        self.flush_output()?;
        result.map(|_| true)
    }

    /// Write every queued packet and collect decrypted data.
    fn flush_output(&mut self) -> Result<(), Error> {
        loop {
            match self.tls.poll_output(&mut self.poll_buf) {
                Output::Packet(p) => self.transport.write_all(p)?,
                Output::ApplicationData(data) => self.plaintext.extend_from_slice(data),
                Output::Closed => self.peer_closed = true,
                Output::Suspended(reason) => log_suspended(reason),
                Output::Connected => debug!("Stream connected"),
                Output::PeerCert(_) => {}
                Output::Timeout(_) => break,
            }
        }
        self.transport.flush()?;
        Ok(())
    }

    fn read_plaintext(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if !self.tls.is_connected() && !self.tls.is_closed() {
            self.handshake()?;
        }

        loop {
            if !self.plaintext.is_empty() {
                let n = buf.len().min(self.plaintext.len());
                buf[..n].copy_from_slice(&self.plaintext[..n]);
                self.plaintext.drain(..n);
                return Ok(n);
            }
            if self.peer_closed {
                return Ok(0);
            }
            if !self.fill()? {
                // No close_notify: the data may have been cut short.
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Transport closed without close_notify",
                )));
            }
        }
    }

    fn write_plaintext(&mut self, data: &[u8]) -> Result<usize, Error> {
        if !self.tls.is_connected() {
            self.handshake()?;
        }
        self.tls.send_application_data(data)?;
        self.flush_output()?;
        Ok(data.len())
    }
}

fn log_suspended(reason: SuspendReason) {
    debug!("Stream handshake suspended: {:?}", reason);
}

fn to_io(error: Error) -> io::Error {
    match error {
        Error::Io(e) => e,
        Error::WouldBlock(_) => io::Error::new(io::ErrorKind::WouldBlock, error),
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

impl<T: Transport> Read for TlsStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_plaintext(buf).map_err(to_io)
    }
}

impl<T: Transport> Write for TlsStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_plaintext(buf).map_err(to_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_output().map_err(to_io)
    }
}

impl<T: Transport> std::fmt::Debug for TlsStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsStream")
            .field("tls", &self.tls)
            .field("buffered", &self.plaintext.len())
            .field("peer_closed", &self.peer_closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::Config;

    #[test]
    fn refuses_dtls() {
        let config = Arc::new(Config::builder().dtls().build().unwrap());
        let tls = Tls::new_client(config, None, Instant::now()).unwrap();
        let err = TlsStream::new(tls, Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn eof_during_handshake() {
        let config = Arc::new(Config::builder().build().unwrap());
        let tls = Tls::new_client(config, None, Instant::now()).unwrap();
        let mut stream = TlsStream::new(tls, Cursor::new(Vec::new())).unwrap();

        let err = stream.handshake().unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));

        // The ClientHello went out before the transport ran dry.
        let (_, transport) = stream.into_inner();
        let written = transport.into_inner();
        assert_eq!(written[0], 22);
        assert_eq!(written[5], 1);
    }
}
