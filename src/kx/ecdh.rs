//! Static ECDH with the server certificate key (ECDH_ECDSA, ECDH_RSA).
//!
//! There is no ServerKeyExchange. The client generates an ephemeral key on
//! the curve of the certificate and agrees with the certificate's point.

use super::{consumed, crypto, no_premaster, KxContext};
use crate::buffer::Buf;
use crate::crypto::Secret;
use crate::message::ClientKeyExchange;
use crate::suite::KeyExchangeAlgorithm;
use crate::Error;

#[derive(Debug, Default)]
pub struct EcdhStaticKx {
    client_point: Option<Vec<u8>>,
    premaster: Option<Secret>,
}

impl EcdhStaticKx {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn encode_client_params(
        &mut self,
        ctx: &mut KxContext,
        output: &mut Buf,
    ) -> Result<(), Error> {
        let cert = ctx.server_certificate()?;
        let peer = ctx
            .provider
            .public_keys
            .peer_key(cert)
            .map_err(Error::CertificateError)?;
        let group = peer.group.ok_or_else(|| {
            Error::CertificateError("Static ECDH needs an EC certificate".into())
        })?;
        let kx_group = ctx
            .provider
            .kx_group(group)
            .ok_or_else(|| Error::CertificateError(format!("Curve {:?} not supported", group)))?;

        let ephemeral = kx_group.start_exchange(ctx.rng).map_err(crypto)?;
        ClientKeyExchange::Ecdh(ephemeral.pub_key()).serialize(output);

        let mut premaster = Secret::new();
        ephemeral
            .complete(&peer.point, premaster.buf_mut())
            .map_err(Error::IllegalParameter)?;
        self.premaster = Some(premaster);
        Ok(())
    }

    pub(super) fn decode_client_params(&mut self, body: &[u8]) -> Result<(), Error> {
        let (rest, cke) = ClientKeyExchange::parse(body, KeyExchangeAlgorithm::EcdhEcdsa)?;
        let ClientKeyExchange::Ecdh(point) = consumed(rest, cke)? else {
            return Err(Error::DecodeError("Expected ECDH ClientKeyExchange".into()));
        };
        // Implicit encoding (empty point) needs a client certificate key
        // we never ask for.
        if point.is_empty() {
            return Err(Error::IllegalParameter("Implicit ECDH public value".into()));
        }
        self.client_point = Some(point.to_vec());
        Ok(())
    }

    pub(super) fn compute_premaster_secret(
        &mut self,
        ctx: &mut KxContext,
    ) -> Result<Secret, Error> {
        if let Some(premaster) = self.premaster.take() {
            return Ok(premaster);
        }
        let point = self.client_point.take().ok_or_else(no_premaster)?;
        let key = ctx.private_key()?;

        let mut premaster = Secret::new();
        key.agree(&point, premaster.buf_mut())
            .map_err(Error::IllegalParameter)?;
        Ok(premaster)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use crate::types::ProtocolVersion;

    #[test]
    fn client_and_server_agree() {
        let provider = provider();
        let key = load_key(EC_KEY);

        let mut client_rng = rng(30);
        let mut client_ctx = context(&provider, &mut client_rng, ProtocolVersion::TLS1_2);
        client_ctx.server_certificate = Some(EC_CERT);
        let mut client = EcdhStaticKx::new();
        let mut cke = Buf::new();
        client.encode_client_params(&mut client_ctx, &mut cke).unwrap();
        let c = client.compute_premaster_secret(&mut client_ctx).unwrap();

        let mut server_rng = rng(31);
        let mut server_ctx = context(&provider, &mut server_rng, ProtocolVersion::TLS1_2);
        server_ctx.private_key = Some(&*key);
        let mut server = EcdhStaticKx::new();
        server.decode_client_params(&cke).unwrap();
        let s = server.compute_premaster_secret(&mut server_ctx).unwrap();

        assert_eq!(c, s);
        assert_eq!(c.len(), 32);
    }

    #[test]
    fn rsa_certificate_rejected() {
        let provider = provider();
        let mut client_rng = rng(32);
        let mut ctx = context(&provider, &mut client_rng, ProtocolVersion::TLS1_2);
        ctx.server_certificate = Some(RSA_CERT);
        let err = EcdhStaticKx::new().encode_client_params(&mut ctx, &mut Buf::new());
        assert!(matches!(err, Err(Error::CertificateError(_))));
    }

    #[test]
    fn invalid_point_rejected() {
        let provider = provider();
        let key = load_key(EC_KEY);
        let mut body = Buf::new();
        ClientKeyExchange::Ecdh(&[0x04, 1, 2, 3]).serialize(&mut body);

        let mut server_rng = rng(33);
        let mut ctx = context(&provider, &mut server_rng, ProtocolVersion::TLS1_2);
        ctx.private_key = Some(&*key);
        let mut server = EcdhStaticKx::new();
        server.decode_client_params(&body).unwrap();
        let err = server.compute_premaster_secret(&mut ctx);
        assert!(matches!(err, Err(Error::IllegalParameter(_))));
    }
}
