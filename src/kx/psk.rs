//! Plain pre-shared key exchange (RFC 4279 2).

use super::{consumed, no_premaster, KxContext};
use crate::buffer::Buf;
use crate::crypto::Secret;
use crate::message::{ClientKeyExchange, ServerKeyExchange, ServerKeyExchangeParams};
use crate::suite::KeyExchangeAlgorithm;
use crate::Error;

/// Largest PSK identity and identity hint.
const MAX_IDENTITY_LEN: usize = 128;

#[derive(Debug, Default)]
pub struct PskKx {
    hint: Option<Vec<u8>>,
    identity: Option<Vec<u8>>,
    premaster: Option<Secret>,
}

/// `u16 N || N zero bytes || u16 N || psk`
fn premaster(psk: &[u8]) -> Secret {
    let mut out = Secret::new();
    let buf = out.buf_mut();
    buf.put_u16(psk.len() as u16);
    buf.resize(2 + psk.len(), 0);
    buf.put_vec_u16(psk);
    out
}

impl PskKx {
    /// `hint` is what a server sends in ServerKeyExchange.
    pub fn new(hint: Option<&[u8]>) -> Self {
        PskKx {
            hint: hint.map(|h| h.to_vec()),
            ..Default::default()
        }
    }

    pub fn has_hint(&self) -> bool {
        self.hint.is_some()
    }

    /// The identity the client presented.
    pub fn identity(&self) -> Option<&[u8]> {
        self.identity.as_deref()
    }

    pub(super) fn encode_server_params(&mut self, output: &mut Buf) -> Result<(), Error> {
        let hint = self
            .hint
            .as_deref()
            .ok_or_else(|| Error::UnexpectedMessage("No PSK identity hint".into()))?;
        ServerKeyExchangeParams::Psk(hint).serialize(output);
        Ok(())
    }

    pub(super) fn decode_server_params(&mut self, body: &[u8]) -> Result<(), Error> {
        let (rest, ske) = ServerKeyExchange::parse(body, KeyExchangeAlgorithm::Psk, false)?;
        let ske = consumed(rest, ske)?;
        let ServerKeyExchangeParams::Psk(hint) = ske.params else {
            return Err(Error::DecodeError("Expected PSK identity hint".into()));
        };
        if hint.len() > MAX_IDENTITY_LEN {
            return Err(Error::IllegalParameter("PSK identity hint too long".into()));
        }
        self.hint = Some(hint.to_vec());
        Ok(())
    }

    pub(super) fn encode_client_params(
        &mut self,
        ctx: &mut KxContext,
        output: &mut Buf,
    ) -> Result<(), Error> {
        let (identity, psk) = ctx
            .credentials
            .and_then(|c| c.psk_identity(self.hint.as_deref()))
            .ok_or_else(|| Error::ConfigError("No PSK configured".into()))?;
        if identity.len() > MAX_IDENTITY_LEN {
            return Err(Error::ConfigError("PSK identity too long".into()));
        }

        ClientKeyExchange::Psk(&identity).serialize(output);
        self.premaster = Some(premaster(&psk));
        self.identity = Some(identity);
        Ok(())
    }

    pub(super) fn decode_client_params(
        &mut self,
        ctx: &mut KxContext,
        body: &[u8],
    ) -> Result<(), Error> {
        let (rest, cke) = ClientKeyExchange::parse(body, KeyExchangeAlgorithm::Psk)?;
        let ClientKeyExchange::Psk(identity) = consumed(rest, cke)? else {
            return Err(Error::DecodeError("Expected PSK ClientKeyExchange".into()));
        };
        if identity.len() > MAX_IDENTITY_LEN {
            return Err(Error::IllegalParameter("PSK identity too long".into()));
        }

        let psk = ctx
            .credentials
            .and_then(|c| c.psk_for_identity(identity))
            .ok_or(Error::UnknownPskIdentity)?;

        self.premaster = Some(premaster(&psk));
        self.identity = Some(identity.to_vec());
        Ok(())
    }

    pub(super) fn compute_premaster_secret(&mut self) -> Result<Secret, Error> {
        self.premaster.take().ok_or_else(no_premaster)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use crate::auth::StaticCredentials;
    use crate::types::ProtocolVersion;

    #[test]
    fn premaster_layout() {
        let pms = premaster(&[0xAA, 0xBB]);
        assert_eq!(&*pms, &[0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0xAA, 0xBB]);
    }

    #[test]
    fn with_hint() {
        let provider = provider();
        let creds = StaticCredentials::new().with_psk(b"client1", b"secret-key");

        let mut server = PskKx::new(Some(&b"hint"[..]));
        assert!(server.has_hint());
        let mut ske = Buf::new();
        server.encode_server_params(&mut ske).unwrap();

        let mut client_rng = rng(40);
        let mut client_ctx = context(&provider, &mut client_rng, ProtocolVersion::TLS1_2);
        client_ctx.credentials = Some(&creds);
        let mut client = PskKx::new(None);
        client.decode_server_params(&ske).unwrap();
        let mut cke = Buf::new();
        client.encode_client_params(&mut client_ctx, &mut cke).unwrap();

        let mut server_rng = rng(41);
        let mut server_ctx = context(&provider, &mut server_rng, ProtocolVersion::TLS1_2);
        server_ctx.credentials = Some(&creds);
        server.decode_client_params(&mut server_ctx, &cke).unwrap();

        assert_eq!(server.identity(), Some(&b"client1"[..]));
        assert_eq!(
            client.compute_premaster_secret().unwrap(),
            server.compute_premaster_secret().unwrap()
        );
    }

    #[test]
    fn unknown_identity() {
        let provider = provider();
        let client_creds = StaticCredentials::new().with_psk(b"mallory", b"x");
        let server_creds = StaticCredentials::new().with_psk(b"client1", b"y");

        let mut client_rng = rng(42);
        let mut client_ctx = context(&provider, &mut client_rng, ProtocolVersion::TLS1_2);
        client_ctx.credentials = Some(&client_creds);
        let mut cke = Buf::new();
        PskKx::new(None)
            .encode_client_params(&mut client_ctx, &mut cke)
            .unwrap();

        let mut server_rng = rng(43);
        let mut server_ctx = context(&provider, &mut server_rng, ProtocolVersion::TLS1_2);
        server_ctx.credentials = Some(&server_creds);
        let err = PskKx::new(None).decode_client_params(&mut server_ctx, &cke);
        assert!(matches!(err, Err(Error::UnknownPskIdentity)));
    }

    #[test]
    fn client_without_psk() {
        let provider = provider();
        let mut client_rng = rng(44);
        let mut ctx = context(&provider, &mut client_rng, ProtocolVersion::TLS1_2);
        let err = PskKx::new(None).encode_client_params(&mut ctx, &mut Buf::new());
        assert!(matches!(err, Err(Error::ConfigError(_))));
    }
}
