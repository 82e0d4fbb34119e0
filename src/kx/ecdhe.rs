//! Ephemeral elliptic curve Diffie-Hellman over named groups (RFC 4492).

use super::{consumed, crypto, no_premaster, KxContext};
use crate::buffer::Buf;
use crate::crypto::{ActiveKeyExchange, CryptoProvider, Secret};
use crate::message::{ClientKeyExchange, EcdhParams, ServerKeyExchange, ServerKeyExchangeParams};
use crate::suite::KeyExchangeAlgorithm;
use crate::types::{NamedGroup, SignatureAlgorithm};
use crate::Error;

/// Server side group choice.
///
/// Walks `configured` in order and takes the first group the client offered
/// and the provider implements. A client that sent no supported_groups
/// extension is assumed to support secp256r1 (RFC 4492 4).
pub fn select_group(
    provider: &CryptoProvider,
    configured: &[NamedGroup],
    offered: Option<&[NamedGroup]>,
) -> Option<NamedGroup> {
    let usable = |g: &&NamedGroup| provider.kx_group(**g).is_some();
    match offered {
        Some(offered) => configured
            .iter()
            .filter(usable)
            .find(|g| offered.contains(*g))
            .copied(),
        None => configured
            .iter()
            .filter(usable)
            .find(|g| **g == NamedGroup::Secp256r1)
            .copied(),
    }
}

#[derive(Debug)]
pub struct EcdheKx {
    /// Signature algorithm of the server key.
    auth: SignatureAlgorithm,
    group: Option<NamedGroup>,
    ephemeral: Option<Box<dyn ActiveKeyExchange>>,
    server_point: Option<Vec<u8>>,
    premaster: Option<Secret>,
}

impl EcdheKx {
    /// `group` is the server's choice. A client learns it from the
    /// ServerKeyExchange.
    pub fn new(auth: SignatureAlgorithm, group: Option<NamedGroup>) -> Self {
        EcdheKx {
            auth,
            group,
            ephemeral: None,
            server_point: None,
            premaster: None,
        }
    }

    pub fn group(&self) -> Option<NamedGroup> {
        self.group
    }

    fn algorithm(&self) -> KeyExchangeAlgorithm {
        match self.auth {
            SignatureAlgorithm::ECDSA => KeyExchangeAlgorithm::EcdheEcdsa,
            _ => KeyExchangeAlgorithm::EcdheRsa,
        }
    }

    pub(super) fn encode_server_params(
        &mut self,
        ctx: &mut KxContext,
        output: &mut Buf,
    ) -> Result<(), Error> {
        let group = self
            .group
            .ok_or_else(|| Error::NegotiationError("No common ECDHE group".into()))?;
        let kx_group = ctx
            .provider
            .kx_group(group)
            .ok_or_else(|| Error::ConfigError(format!("Group {:?} not supported", group)))?;
        let ephemeral = kx_group.start_exchange(ctx.rng).map_err(crypto)?;

        let mut params = Buf::new();
        ServerKeyExchangeParams::Ecdh(EcdhParams {
            group,
            public_point: ephemeral.pub_key(),
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
        let (rest, ske) = ServerKeyExchange::parse(body, self.algorithm(), ctx.version.is_tls12())?;
        let ske = consumed(rest, ske)?;
        let ServerKeyExchangeParams::Ecdh(ec) = &ske.params else {
            return Err(Error::DecodeError("Expected ECDH params".into()));
        };

        if !ctx.groups.contains(&ec.group) || ctx.provider.kx_group(ec.group).is_none() {
            return Err(Error::IllegalParameter(format!(
                "Server chose group {:?} we did not offer",
                ec.group
            )));
        }
        if ec.public_point.is_empty() {
            return Err(Error::IllegalParameter("Empty ECDH point".into()));
        }

        ctx.verify_params(self.auth, ske.raw_params, ske.signature.as_ref())?;

        self.group = Some(ec.group);
        self.server_point = Some(ec.public_point.to_vec());
        Ok(())
    }

    pub(super) fn encode_client_params(
        &mut self,
        ctx: &mut KxContext,
        output: &mut Buf,
    ) -> Result<(), Error> {
        let (Some(group), Some(point)) = (self.group, self.server_point.take()) else {
            return Err(Error::UnexpectedMessage(
                "ClientKeyExchange before ServerKeyExchange".into(),
            ));
        };
        let kx_group = ctx
            .provider
            .kx_group(group)
            .ok_or_else(|| Error::IllegalParameter(format!("Group {:?} not supported", group)))?;

        let ephemeral = kx_group.start_exchange(ctx.rng).map_err(crypto)?;
        ClientKeyExchange::Ecdh(ephemeral.pub_key()).serialize(output);

        let mut premaster = Secret::new();
        ephemeral
            .complete(&point, premaster.buf_mut())
            .map_err(Error::IllegalParameter)?;
        self.premaster = Some(premaster);
        Ok(())
    }

    pub(super) fn decode_client_params(&mut self, body: &[u8]) -> Result<(), Error> {
        let (rest, cke) = ClientKeyExchange::parse(body, self.algorithm())?;
        let ClientKeyExchange::Ecdh(point) = consumed(rest, cke)? else {
            return Err(Error::DecodeError("Expected ECDH ClientKeyExchange".into()));
        };
        let ephemeral = self.ephemeral.take().ok_or_else(|| {
            Error::UnexpectedMessage("ClientKeyExchange before ServerKeyExchange".into())
        })?;

        let mut premaster = Secret::new();
        ephemeral
            .complete(point, premaster.buf_mut())
            .map_err(Error::IllegalParameter)?;
        self.premaster = Some(premaster);
        Ok(())
    }

    pub(super) fn compute_premaster_secret(&mut self) -> Result<Secret, Error> {
        self.premaster.take().ok_or_else(no_premaster)
    }
}
