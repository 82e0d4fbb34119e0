//! Ephemeral finite field Diffie-Hellman, signed with RSA.
//!
//! A server always offers the RFC 7919 ffdhe2048 group. A client accepts any
//! group with a prime between [`MIN_DH_BITS`] and [`MAX_DH_BITS`].

use super::{consumed, crypto, no_premaster, KxContext};
use crate::buffer::Buf;
use crate::crypto::{ffdhe2048, ActiveKeyExchange, Secret};
use crate::message::{ClientKeyExchange, DhParams, ServerKeyExchange, ServerKeyExchangeParams};
use crate::suite::KeyExchangeAlgorithm;
use crate::types::SignatureAlgorithm;
use crate::Error;

/// Smallest DH prime a client accepts.
pub const MIN_DH_BITS: usize = 1024;

/// Largest DH prime a client accepts. Bounds the modular exponentiation a
/// server can make us do.
pub const MAX_DH_BITS: usize = 4096;

#[derive(Debug, Default)]
pub struct DheKx {
    ephemeral: Option<Box<dyn ActiveKeyExchange>>,
    /// Server `(p, g, Ys)`.
    server_params: Option<(Vec<u8>, Vec<u8>, Vec<u8>)>,
    premaster: Option<Secret>,
}

fn bit_len(n: &[u8]) -> usize {
    let Some(pos) = n.iter().position(|b| *b != 0) else {
        return 0;
    };
    (n.len() - pos - 1) * 8 + (8 - n[pos].leading_zeros() as usize)
}

impl DheKx {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn encode_server_params(
        &mut self,
        ctx: &mut KxContext,
        output: &mut Buf,
    ) -> Result<(), Error> {
        let ephemeral = ctx
            .provider
            .dh
            .start_exchange(&ffdhe2048::P, &ffdhe2048::G, ctx.rng)
            .map_err(crypto)?;

        let mut params = Buf::new();
        ServerKeyExchangeParams::Dh(DhParams {
            p: &ffdhe2048::P,
            g: &ffdhe2048::G,
            public_value: ephemeral.pub_key(),
        })
        .serialize(&mut params);

        output.extend_from_slice(&params);
        ctx.sign_params(&params, output)?;

        self.ephemeral = Some(ephemeral);
        Ok(())
    }

    pub(super) fn decode_and_verify_server_params(
        &mut self,
        ctx: &mut KxContext,
        body: &[u8],
    ) -> Result<(), Error> {
        let (rest, ske) =
            ServerKeyExchange::parse(body, KeyExchangeAlgorithm::DheRsa, ctx.version.is_tls12())?;
        let ske = consumed(rest, ske)?;
        let ServerKeyExchangeParams::Dh(dh) = &ske.params else {
            return Err(Error::DecodeError("Expected DH params".into()));
        };

        let bits = bit_len(dh.p);
        if !(MIN_DH_BITS..=MAX_DH_BITS).contains(&bits) {
            return Err(Error::IllegalParameter(format!(
                "DH prime of {} bits is out of range",
                bits
            )));
        }
        if bit_len(dh.g) < 2 || bit_len(dh.public_value) < 2 {
            return Err(Error::IllegalParameter("Degenerate DH parameters".into()));
        }

        ctx.verify_params(SignatureAlgorithm::RSA, ske.raw_params, ske.signature.as_ref())?;

        self.server_params = Some((dh.p.to_vec(), dh.g.to_vec(), dh.public_value.to_vec()));
        Ok(())
    }

    pub(super) fn encode_client_params(
        &mut self,
        ctx: &mut KxContext,
        output: &mut Buf,
    ) -> Result<(), Error> {
        let (p, g, ys) = self.server_params.take().ok_or_else(|| {
            Error::UnexpectedMessage("ClientKeyExchange before ServerKeyExchange".into())
        })?;

        let ephemeral = ctx
            .provider
            .dh
            .start_exchange(&p, &g, ctx.rng)
            .map_err(Error::IllegalParameter)?;
        ClientKeyExchange::Dh(ephemeral.pub_key()).serialize(output);

        let mut premaster = Secret::new();
        ephemeral
            .complete(&ys, premaster.buf_mut())
            .map_err(Error::IllegalParameter)?;
        self.premaster = Some(premaster);
        Ok(())
    }

    pub(super) fn decode_client_params(&mut self, body: &[u8]) -> Result<(), Error> {
        let (rest, cke) = ClientKeyExchange::parse(body, KeyExchangeAlgorithm::DheRsa)?;
        let ClientKeyExchange::Dh(yc) = consumed(rest, cke)? else {
            return Err(Error::DecodeError("Expected DH ClientKeyExchange".into()));
        };
        let ephemeral = self.ephemeral.take().ok_or_else(|| {
            Error::UnexpectedMessage("ClientKeyExchange before ServerKeyExchange".into())
        })?;

        let mut premaster = Secret::new();
        ephemeral
            .complete(yc, premaster.buf_mut())
            .map_err(Error::IllegalParameter)?;
        self.premaster = Some(premaster);
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
    use crate::types::ProtocolVersion;

    fn exchange(version: ProtocolVersion) -> (Secret, Secret) {
        let provider = provider();
        let key = load_key(RSA_KEY);

        let mut server_rng = rng(10);
        let mut server_ctx = context(&provider, &mut server_rng, version);
        server_ctx.private_key = Some(&*key);
        let mut server = DheKx::new();
        let mut ske = Buf::new();
        server.encode_server_params(&mut server_ctx, &mut ske).unwrap();

        let mut client_rng = rng(11);
        let mut client_ctx = context(&provider, &mut client_rng, version);
        client_ctx.server_certificate = Some(RSA_CERT);
        let mut client = DheKx::new();
        client
            .decode_and_verify_server_params(&mut client_ctx, &ske)
            .unwrap();
        let mut cke = Buf::new();
        client.encode_client_params(&mut client_ctx, &mut cke).unwrap();

        server.decode_client_params(&cke).unwrap();
        (
            client.compute_premaster_secret().unwrap(),
            server.compute_premaster_secret().unwrap(),
        )
    }

    #[test]
    fn agreement_tls12() {
        let (c, s) = exchange(ProtocolVersion::TLS1_2);
        assert_eq!(c, s);
        assert_ne!(c[0], 0);
    }

    #[test]
    fn agreement_tls10() {
        let (c, s) = exchange(ProtocolVersion::TLS1_0);
        assert_eq!(c, s);
    }

    #[test]
    fn tampered_params_fail_verification() {
        let provider = provider();
        let key = load_key(RSA_KEY);

        let mut server_rng = rng(12);
        let mut server_ctx = context(&provider, &mut server_rng, ProtocolVersion::TLS1_2);
        server_ctx.private_key = Some(&*key);
        let mut ske = Buf::new();
        DheKx::new()
            .encode_server_params(&mut server_ctx, &mut ske)
            .unwrap();

        // Flip a bit inside Ys.
        ske[2 + 256 + 2 + 1 + 2 + 100] ^= 0x01;

        let mut client_rng = rng(13);
        let mut client_ctx = context(&provider, &mut client_rng, ProtocolVersion::TLS1_2);
        client_ctx.server_certificate = Some(RSA_CERT);
        let err = DheKx::new().decode_and_verify_server_params(&mut client_ctx, &ske);
        assert!(matches!(err, Err(Error::DecryptError(_))));
    }

    fn server_params_with_prime(p: &[u8]) -> Buf {
        let mut params = Buf::new();
        ServerKeyExchangeParams::Dh(DhParams {
            p,
            g: &[2],
            public_value: &[0x10; 64],
        })
        .serialize(&mut params);
        // Signature is never looked at.
        params.put_u16(0x0401);
        params.put_vec_u16(&[0; 4]);
        params
    }

    #[test]
    fn small_prime_rejected() {
        let provider = provider();
        let params = server_params_with_prime(&[0xFF; 64]);

        let mut client_rng = rng(14);
        let mut ctx = context(&provider, &mut client_rng, ProtocolVersion::TLS1_2);
        ctx.server_certificate = Some(RSA_CERT);
        let err = DheKx::new().decode_and_verify_server_params(&mut ctx, &params);
        assert!(matches!(err, Err(Error::IllegalParameter(_))));
    }

    #[test]
    fn huge_prime_rejected() {
        let provider = provider();
        // 8192 bits
        let params = server_params_with_prime(&[0xFF; 1024]);

        let mut client_rng = rng(15);
        let mut ctx = context(&provider, &mut client_rng, ProtocolVersion::TLS1_2);
        ctx.server_certificate = Some(RSA_CERT);
        let err = DheKx::new().decode_and_verify_server_params(&mut ctx, &params);
        assert!(matches!(err, Err(Error::IllegalParameter(_))));
    }

    #[test]
    fn bit_lengths() {
        assert_eq!(bit_len(&[]), 0);
        assert_eq!(bit_len(&[0, 0]), 0);
        assert_eq!(bit_len(&[0, 1]), 1);
        assert_eq!(bit_len(&[0x80, 0]), 16);
        assert_eq!(bit_len(&ffdhe2048::P), 2048);
    }
}
