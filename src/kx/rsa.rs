//! RSA key transport.
//!
//! The client encrypts `client_version || 46 random bytes` to the server
//! certificate key. The server never reveals whether decryption worked:
//! any failure, a wrong length or a wrong version silently turns into a
//! random premaster, so the handshake fails later at Finished (RFC 5246
//! 7.4.7.1).

use rand::RngCore;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

use super::{consumed, crypto, no_premaster, KxContext};
use crate::buffer::Buf;
use crate::crypto::Secret;
use crate::message::ClientKeyExchange;
use crate::suite::KeyExchangeAlgorithm;
use crate::Error;

const PREMASTER_LEN: usize = 48;

#[derive(Debug, Default)]
pub struct RsaKx {
    premaster: Option<Secret>,
    encrypted: Option<Vec<u8>>,
}

impl RsaKx {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn encode_client_params(
        &mut self,
        ctx: &mut KxContext,
        output: &mut Buf,
    ) -> Result<(), Error> {
        let cert = ctx.server_certificate()?;

        let mut premaster = [0u8; PREMASTER_LEN];
        premaster[..2].copy_from_slice(&ctx.client_version.as_u16().to_be_bytes());
        ctx.rng.fill_bytes(&mut premaster[2..]);

        let mut encrypted = Buf::new();
        let result = ctx
            .provider
            .public_keys
            .rsa_encrypt(cert, &premaster, ctx.rng, &mut encrypted)
            .map_err(crypto);

        self.premaster = Some(Secret::from_slice(&premaster));
        premaster.fill(0);
        result?;

        ClientKeyExchange::Rsa(&encrypted).serialize(output);
        Ok(())
    }

    pub(super) fn decode_client_params(&mut self, body: &[u8]) -> Result<(), Error> {
        let (rest, cke) = ClientKeyExchange::parse(body, KeyExchangeAlgorithm::Rsa)?;
        let ClientKeyExchange::Rsa(encrypted) = consumed(rest, cke)? else {
            return Err(Error::DecodeError("Expected RSA ClientKeyExchange".into()));
        };
        self.encrypted = Some(encrypted.to_vec());
        Ok(())
    }

    pub(super) fn compute_premaster_secret(
        &mut self,
        ctx: &mut KxContext,
    ) -> Result<Secret, Error> {
        if let Some(premaster) = self.premaster.take() {
            return Ok(premaster);
        }
        let encrypted = self.encrypted.take().ok_or_else(no_premaster)?;
        let key = ctx.private_key()?;

        // Generated before decrypting so both outcomes do the same work.
        let mut fake = [0u8; PREMASTER_LEN];
        fake[..2].copy_from_slice(&ctx.client_version.as_u16().to_be_bytes());
        ctx.rng.fill_bytes(&mut fake[2..]);

        let mut decrypted = Buf::new();
        let decrypt_ok = key.rsa_decrypt(&encrypted, &mut decrypted).is_ok();
        let length_ok = decrypted.len() == PREMASTER_LEN;

        let mut candidate = [0u8; PREMASTER_LEN];
        let n = decrypted.len().min(PREMASTER_LEN);
        candidate[..n].copy_from_slice(&decrypted[..n]);
        decrypted.wipe();

        let valid =
            Choice::from((decrypt_ok & length_ok) as u8) & candidate[..2].ct_eq(&fake[..2]);

        let mut premaster = [0u8; PREMASTER_LEN];
        for i in 0..PREMASTER_LEN {
            premaster[i] = u8::conditional_select(&fake[i], &candidate[i], valid);
        }

        let secret = Secret::from_slice(&premaster);
        premaster.fill(0);
        candidate.fill(0);
        fake.fill(0);
        Ok(secret)
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
        let key = load_key(RSA_KEY);

        let mut client_rng = rng(1);
        let mut client_ctx = context(&provider, &mut client_rng, ProtocolVersion::TLS1_2);
        client_ctx.server_certificate = Some(RSA_CERT);
        let mut client = RsaKx::new();
        let mut cke = Buf::new();
        client.encode_client_params(&mut client_ctx, &mut cke).unwrap();
        let client_pms = client.compute_premaster_secret(&mut client_ctx).unwrap();

        assert_eq!(client_pms.len(), 48);
        assert_eq!(&client_pms[..2], &[0x03, 0x03]);

        let mut server_rng = rng(2);
        let mut server_ctx = context(&provider, &mut server_rng, ProtocolVersion::TLS1_2);
        server_ctx.private_key = Some(&*key);
        let mut server = RsaKx::new();
        server.decode_client_params(&cke).unwrap();
        let server_pms = server.compute_premaster_secret(&mut server_ctx).unwrap();

        assert_eq!(client_pms, server_pms);
    }

    #[test]
    fn version_mismatch_yields_random_premaster() {
        let provider = provider();
        let key = load_key(RSA_KEY);

        let mut client_rng = rng(3);
        let mut client_ctx = context(&provider, &mut client_rng, ProtocolVersion::TLS1_2);
        client_ctx.server_certificate = Some(RSA_CERT);
        client_ctx.client_version = ProtocolVersion::TLS1_1;
        let mut client = RsaKx::new();
        let mut cke = Buf::new();
        client.encode_client_params(&mut client_ctx, &mut cke).unwrap();
        let client_pms = client.compute_premaster_secret(&mut client_ctx).unwrap();

        let mut server_rng = rng(4);
        let mut server_ctx = context(&provider, &mut server_rng, ProtocolVersion::TLS1_2);
        server_ctx.private_key = Some(&*key);
        let mut server = RsaKx::new();
        server.decode_client_params(&cke).unwrap();
        let server_pms = server.compute_premaster_secret(&mut server_ctx).unwrap();

        // No error, but the secrets differ.
        assert_eq!(server_pms.len(), 48);
        assert_ne!(client_pms, server_pms);
        assert_eq!(&server_pms[..2], &[0x03, 0x03]);
    }

    #[test]
    fn garbage_ciphertext_is_not_an_error() {
        let provider = provider();
        let key = load_key(RSA_KEY);

        let mut body = Buf::new();
        ClientKeyExchange::Rsa(&[0xAB; 256]).serialize(&mut body);

        let mut server_rng = rng(5);
        let mut ctx = context(&provider, &mut server_rng, ProtocolVersion::TLS1_0);
        ctx.private_key = Some(&*key);
        let mut server = RsaKx::new();
        server.decode_client_params(&body).unwrap();
        let pms = server.compute_premaster_secret(&mut ctx).unwrap();
        assert_eq!(&pms[..2], &[0x03, 0x01]);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut body = Buf::new();
        ClientKeyExchange::Rsa(&[1, 2, 3]).serialize(&mut body);
        body.push(0);
        let err = RsaKx::new().decode_client_params(&body);
        assert!(matches!(err, Err(Error::DecodeError(_))));
    }
}
