// Server Handshake Flow:
//
// 1. Receive ClientHello
// 2. DTLS: without a valid cookie, answer with a stateless
//    HelloVerifyRequest and wait for the ClientHello to come back
// 3. A session id found in the cache resumes: ServerHello,
//    ChangeCipherSpec and Finished, then wait for the client's
// 4. Otherwise send ServerHello, Certificate, ServerKeyExchange,
//    CertificateRequest and ServerHelloDone, each as the suite dictates
// 5. Receive Certificate, ClientKeyExchange, CertificateVerify,
//    ChangeCipherSpec and Finished
// 6. Send ChangeCipherSpec and Finished

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::engine::Engine;
use super::{Advance, Message, Resolution, SuspendReason};
use crate::auth::TrustDecision;
use crate::buffer::Buf;
use crate::crypto::PrivateKey;
use crate::event::LocalEvent;
use crate::kx::{self, signature, KeyExchange};
use crate::message::{Alert, Certificate, CertificateRequest, ClientHello, Cookie, DigitallySigned};
use crate::message::{Finished, Handshake, HelloExtensions, MessageType, Random, ServerHello};
use crate::message::{SessionId, EC_POINT_FORMAT_UNCOMPRESSED};
use crate::session::SessionData;
use crate::suite::{CipherSuite, KeyExchangeAlgorithm};
use crate::types::{AlertDescription, ClientCertificateType, CompressionMethod};
use crate::types::{NamedGroup, ProtocolVersion, SignatureAndHashAlgorithm, Variant};
use crate::util::all_consuming;
use crate::{ClientAuth, Config, Error};

type HmacSha256 = Hmac<Sha256>;

/// Length of session ids we assign.
const SESSION_ID_LEN: usize = 32;

/// Current state of the server handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Await a ClientHello (with or without cookie).
    AwaitClientHello,
    /// Await the client Certificate after a CertificateRequest.
    AwaitCertificate,
    AwaitClientKeyExchange,
    /// The client sent a certificate, so it must prove the key.
    AwaitCertificateVerify,
    AwaitChangeCipherSpec,
    AwaitFinished,
    /// Send and receive application data.
    Ready,
    GracefulClose,
    ErrorClose,
}

pub(crate) struct ServerHandshake {
    state: ServerState,

    /// Key for the stateless cookie.
    cookie_secret: [u8; 32],

    /// Version the client offered, bound into the RSA premaster.
    client_version: ProtocolVersion,

    /// Signature algorithms the client advertised.
    client_signature_algorithms: Option<Vec<SignatureAndHashAlgorithm>>,

    private_key: Option<Box<dyn PrivateKey>>,

    kx: Option<KeyExchange>,

    /// Answer to a ClientAuth suspension.
    trust: Option<bool>,

    peer_cert_announced: bool,
}

impl ServerHandshake {
    pub fn new(engine: &mut Engine) -> Self {
        ServerHandshake {
            state: ServerState::AwaitClientHello,
            cookie_secret: engine.rng.array(),
            client_version: ProtocolVersion::TLS1_2,
            client_signature_algorithms: None,
            private_key: None,
            kx: None,
            trust: None,
            peer_cert_announced: false,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn close(&mut self, graceful: bool) {
        self.state = if graceful {
            ServerState::GracefulClose
        } else {
            ServerState::ErrorClose
        };
    }

    pub fn resolve(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Trust(trusted) => self.trust = Some(trusted),
            Resolution::Credential(_) => {
                debug!("Server ignores a client credential");
            }
        }
    }

    fn transition(&mut self, next: ServerState) {
        debug!("Server {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub fn advance(&mut self, engine: &mut Engine, message: &Message) -> Advance {
        let result = match message {
            Message::Handshake(handshake) => self.handle_handshake(engine, handshake),
            Message::ChangeCipherSpec => self.handle_change_cipher_spec(engine),
        };

        if let Err(e) = &result {
            debug!("Server handshake failed in {:?}: {}", self.state, e);
            self.state = ServerState::ErrorClose;
        }

        result.into()
    }

    fn handle_handshake(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        use MessageType as M;
        use ServerState as S;

        match (self.state, handshake.msg_type()) {
            (S::AwaitClientHello, M::ClientHello) => self.on_client_hello(engine, handshake),
            (S::Ready, M::ClientHello) => {
                debug!("Refusing renegotiation");
                engine.send_alert(Alert::warning(AlertDescription::NoRenegotiation))?;
                Ok(None)
            }

            (S::AwaitCertificate, M::Certificate) => self.on_certificate(engine, handshake),
            (S::AwaitClientKeyExchange, M::ClientKeyExchange) => {
                self.on_client_key_exchange(engine, handshake)
            }
            (S::AwaitCertificateVerify, M::CertificateVerify) => {
                self.on_certificate_verify(engine, handshake)
            }
            (S::AwaitFinished, M::Finished) => self.on_finished(engine, handshake),

            (state, msg_type) => Err(Error::UnexpectedMessage(format!(
                "{:?} in server state {:?}",
                msg_type, state
            ))),
        }
    }

    fn handle_change_cipher_spec(&mut self, engine: &mut Engine) -> Result<Option<SuspendReason>, Error> {
        if self.state != ServerState::AwaitChangeCipherSpec {
            if engine.is_dtls() {
                debug!("Ignoring ChangeCipherSpec in {:?}", self.state);
                return Ok(None);
            }
            return Err(Error::UnexpectedMessage(format!(
                "ChangeCipherSpec in server state {:?}",
                self.state
            )));
        }

        engine.activate_read()?;
        self.transition(ServerState::AwaitFinished);
        Ok(None)
    }

    fn on_client_hello(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        let dtls = engine.is_dtls();
        let (_, ch) = all_consuming(|i| ClientHello::parse(i, dtls))(&handshake.body)?;
        let config = engine.config.clone();

        if dtls && config.dtls_cookies() && !verify_cookie(&self.cookie_secret, ch.random, ch.cookie) {
            debug!("Invalid or missing cookie, sending HelloVerifyRequest");
            let cookie = compute_cookie(&self.cookie_secret, ch.random)?;
            engine.send_hello_verify_request(handshake.header.message_seq, cookie)?;
            return Ok(None);
        }

        let version = select_version(&config, ch.client_version)?;
        self.client_version = ch.client_version;

        if !ch.compression_methods.contains(&CompressionMethod::Null) {
            return Err(Error::IllegalParameter("Client does not offer null compression".into()));
        }

        if let Some(info) = &ch.extensions.renegotiation_info {
            if !info.is_empty() {
                return Err(Error::NegotiationError(
                    "Non-empty renegotiation_info on initial handshake".into(),
                ));
            }
        }
        let secure_renegotiation = ch.offers_secure_renegotiation();
        let ems = config.extended_master_secret() && ch.extensions.extended_master_secret;

        engine.set_version(version);
        engine.ctx.client_random = ch.random.to_bytes();
        engine.ctx.server_random = Random::new(&mut engine.rng).to_bytes();
        engine.ctx.secure_renegotiation = secure_renegotiation;
        engine.ctx.extended_master_secret = ems;
        engine.ctx.server_name = ch.extensions.server_name.clone();
        self.client_signature_algorithms = ch
            .extensions
            .signature_algorithms
            .as_ref()
            .map(|a| a.to_vec());

        if let Some(data) = self.find_resumable(&config, &ch, version, ems) {
            return self.resume(engine, handshake, &ch, data);
        }

        self.full_handshake(engine, handshake, &ch, version)
    }

    fn find_resumable(
        &self,
        config: &Config,
        ch: &ClientHello,
        version: ProtocolVersion,
        ems: bool,
    ) -> Option<SessionData> {
        if ch.session_id.is_empty() {
            return None;
        }
        let cache = config.session_cache()?;
        let entry = cache.get(&ch.session_id)?;

        let data = match SessionData::decode(&entry) {
            Ok(d) => d,
            Err(e) => {
                warn!("Dropping corrupt session cache entry: {}", e);
                cache.delete(&ch.session_id);
                return None;
            }
        };

        let usable = data.version == version
            && ch.cipher_suites.contains(&data.suite)
            && config.suites_for(version).any(|s| s == data.suite)
            && data.extended_master_secret == ems;
        if !usable {
            debug!("Cached session does not fit this ClientHello");
            return None;
        }
        Some(data)
    }

    fn resume(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
        ch: &ClientHello,
        data: SessionData,
    ) -> Result<Option<SuspendReason>, Error> {
        debug!("Resuming session with {}", data.suite);

        engine.ctx.suite = Some(data.suite);
        engine.ctx.session_id = ch.session_id;
        engine.ctx.resumed = true;
        engine.ctx.master_secret = Some(data.master_secret);
        engine.ctx.peer_certificates = data.peer_certificates;

        engine.hash_received(handshake);
        engine.set_next_handshake_seq(handshake.header.message_seq);

        engine.flight_begin(4);
        self.send_server_hello(engine, ch, data.suite)?;
        engine.install_pending_keys()?;
        engine.send_change_cipher_spec()?;
        self.send_finished(engine)?;

        self.transition(ServerState::AwaitChangeCipherSpec);
        Ok(None)
    }

    fn full_handshake(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
        ch: &ClientHello,
        version: ProtocolVersion,
    ) -> Result<Option<SuspendReason>, Error> {
        let config = engine.config.clone();

        let credential = config
            .credentials()
            .and_then(|c| c.server_credential(ch.extensions.server_name.as_deref()));
        let private_key = match &credential {
            Some(c) => Some(
                engine
                    .provider
                    .key_provider
                    .load_private_key(&c.private_key)
                    .map_err(Error::ConfigError)?,
            ),
            None => None,
        };

        let offered_groups = ch.extensions.supported_groups.as_ref().map(|g| g.as_slice());
        let (suite, group) = select_suite(
            engine,
            version,
            ch,
            private_key.as_deref(),
            offered_groups,
            self.client_signature_algorithms.as_deref(),
        )?;
        debug!("Selected {} for {}", suite, version);

        engine.ctx.suite = Some(suite);
        engine.ctx.session_id = if config.session_cache().is_some() {
            SessionId::random(SESSION_ID_LEN, &mut engine.rng)
        } else {
            SessionId::empty()
        };

        let hint = config.psk_identity_hint();
        self.kx = Some(KeyExchange::for_suite(suite, group, hint)?);
        self.private_key = private_key;

        engine.hash_received(handshake);
        engine.set_next_handshake_seq(handshake.header.message_seq);

        engine.flight_begin(4);
        self.send_server_hello(engine, ch, suite)?;

        if suite.requires_certificate() {
            let chain = credential
                .map(|c| c.certificate_chain)
                .unwrap_or_default();
            engine.create_handshake(MessageType::Certificate, |body, _| {
                Certificate::new(chain.iter().map(|c| c.as_slice()).collect()).serialize(body);
                Ok(())
            })?;
            engine.ctx.local_certificates = chain;
        }

        self.send_server_key_exchange(engine)?;

        let request_certificate =
            config.client_auth() != ClientAuth::None && suite.requires_certificate();
        if request_certificate {
            let tls12 = version.is_tls12();
            let request = CertificateRequest {
                certificate_types: vec![
                    ClientCertificateType::RSA_SIGN,
                    ClientCertificateType::ECDSA_SIGN,
                ],
                supported_signature_algorithms: config.signature_algorithms().to_vec(),
                certificate_authorities: Vec::new(),
            };
            engine.create_handshake(MessageType::CertificateRequest, |body, _| {
                request.serialize(tls12, body);
                Ok(())
            })?;
        }

        engine.create_handshake(MessageType::ServerHelloDone, |_, _| Ok(()))?;

        if request_certificate {
            self.transition(ServerState::AwaitCertificate);
        } else {
            self.transition(ServerState::AwaitClientKeyExchange);
        }
        Ok(None)
    }

    fn send_server_hello(
        &mut self,
        engine: &mut Engine,
        ch: &ClientHello,
        suite: CipherSuite,
    ) -> Result<(), Error> {
        let (version, _) = engine.ctx.negotiated()?;

        let ec_suite = matches!(
            suite.key_exchange(),
            KeyExchangeAlgorithm::EcdheRsa
                | KeyExchangeAlgorithm::EcdheEcdsa
                | KeyExchangeAlgorithm::EcdhEcdsa
                | KeyExchangeAlgorithm::EcdhRsa
        );

        let extensions = HelloExtensions {
            // Empty server_name acknowledges the client's.
            server_name: ch
                .extensions
                .server_name
                .as_ref()
                .filter(|_| !engine.ctx.resumed)
                .map(|_| String::new()),
            supported_groups: None,
            ec_point_formats: (ec_suite && ch.extensions.ec_point_formats.is_some())
                .then(|| [EC_POINT_FORMAT_UNCOMPRESSED].into_iter().collect()),
            signature_algorithms: None,
            renegotiation_info: engine.ctx.secure_renegotiation.then(Vec::new),
            extended_master_secret: engine.ctx.extended_master_secret,
            session_ticket: None,
        };

        let hello = ServerHello {
            server_version: version,
            random: Random::from_bytes(engine.ctx.server_random),
            session_id: engine.ctx.session_id,
            cipher_suite: suite,
            compression_method: CompressionMethod::Null,
            extensions,
        };

        engine.create_handshake(MessageType::ServerHello, |body, _| {
            hello.serialize(body);
            Ok(())
        })
    }

    fn send_server_key_exchange(&mut self, engine: &mut Engine) -> Result<(), Error> {
        let Some(kx) = self.kx.as_mut() else {
            return Err(Error::UnexpectedMessage("No key exchange".into()));
        };
        if !kx.sends_server_params() {
            return Ok(());
        }

        let mut params = Buf::new();
        {
            let mut cx = engine.kx_context(
                self.client_version,
                self.private_key.as_deref(),
                self.client_signature_algorithms.as_deref(),
            )?;
            kx.encode_server_params(&mut cx, &mut params)?;
        }

        engine.create_handshake(MessageType::ServerKeyExchange, |body, _| {
            body.extend_from_slice(&params);
            Ok(())
        })
    }

    fn on_certificate(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        let (_, certificate) = all_consuming(Certificate::parse)(&handshake.body)?;
        let chain = certificate.to_chain();
        let config = engine.config.clone();

        if chain.is_empty() {
            if config.client_auth() == ClientAuth::Required {
                return Err(Error::NegotiationError("Client certificate required".into()));
            }
            debug!("Client declined to send a certificate");
            engine.hash_received(handshake);
            self.transition(ServerState::AwaitClientKeyExchange);
            return Ok(None);
        }

        let leaf = &chain[0];
        engine
            .provider
            .public_keys
            .peer_key(leaf)
            .map_err(Error::CertificateError)?;

        // Recorded once; a resumed suspension replays this message.
        if !self.peer_cert_announced {
            self.peer_cert_announced = true;
            engine.ctx.peer_certificates = chain;
            engine.push_event(LocalEvent::PeerCert);
        }

        let trusted = match self.trust.take() {
            Some(trusted) => trusted,
            None => {
                let Some(evaluator) = config.trust_evaluator() else {
                    return Ok(Some(SuspendReason::ClientAuth));
                };
                match evaluator.evaluate(&engine.ctx.peer_certificates, None) {
                    TrustDecision::Trusted => true,
                    TrustDecision::Rejected(reason) => {
                        return Err(Error::CertificateError(reason));
                    }
                    TrustDecision::Deferred => return Ok(Some(SuspendReason::ClientAuth)),
                }
            }
        };
        if !trusted {
            return Err(Error::CertificateError("Client certificate rejected".into()));
        }

        engine.hash_received(handshake);
        self.transition(ServerState::AwaitClientKeyExchange);
        Ok(None)
    }

    fn on_client_key_exchange(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        let Some(kx) = self.kx.as_mut() else {
            return Err(Error::UnexpectedMessage("No key exchange".into()));
        };

        let premaster = {
            let mut cx = engine.kx_context(self.client_version, self.private_key.as_deref(), None)?;
            kx.decode_client_params(&mut cx, &handshake.body)?;
            kx.compute_premaster_secret(&mut cx)?
        };
        if let KeyExchange::Psk(psk) = kx {
            engine.ctx.psk_identity = psk.identity().map(|i| i.to_vec());
        }

        engine.hash_received(handshake);
        engine.compute_master_secret(&premaster)?;
        drop(premaster);
        engine.install_pending_keys()?;

        if engine.ctx.peer_certificates.is_empty() {
            self.transition(ServerState::AwaitChangeCipherSpec);
        } else {
            self.transition(ServerState::AwaitCertificateVerify);
        }
        Ok(None)
    }

    fn on_certificate_verify(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        let (version, _) = engine.ctx.negotiated()?;
        let tls12 = version.is_tls12();
        let (_, signed) = all_consuming(|i| DigitallySigned::parse(i, tls12))(&handshake.body)?;

        let Some(leaf) = engine.ctx.peer_certificates.first() else {
            return Err(Error::UnexpectedMessage("CertificateVerify without certificate".into()));
        };
        let peer_key = engine
            .provider
            .public_keys
            .peer_key(leaf)
            .map_err(Error::CertificateError)?;

        let hash = signature::accept_scheme(
            version,
            peer_key.algorithm,
            signed.algorithm,
            engine.config.signature_algorithms(),
        )?;

        // Covers everything up to, not including, this message.
        let digest = engine.transcript.signature_digest(hash)?;
        signature::verify(
            engine.provider.public_keys,
            leaf,
            hash,
            &digest,
            signed.signature,
        )?;

        engine.hash_received(handshake);
        self.transition(ServerState::AwaitChangeCipherSpec);
        Ok(None)
    }

    fn send_finished(&mut self, engine: &mut Engine) -> Result<(), Error> {
        let verify_data = engine.verify_data(true)?;
        engine.create_handshake(MessageType::Finished, |body, _| {
            Finished::new(&verify_data).serialize(body);
            Ok(())
        })?;
        engine.ctx.server_verify_data = verify_data.to_vec();
        Ok(())
    }

    fn on_finished(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        let (_, finished) = all_consuming(Finished::parse)(&handshake.body)?;

        let expected = engine.verify_data(false)?;
        if !bool::from(expected.ct_eq(finished.verify_data)) {
            return Err(Error::DecryptError("Client Finished does not verify".into()));
        }
        engine.ctx.client_verify_data = expected.to_vec();
        engine.hash_received(handshake);

        if !engine.ctx.resumed {
            engine.flight_begin_final(6);
            engine.send_change_cipher_spec()?;
            self.send_finished(engine)?;
            store_session(engine);
        }

        engine.handshake_complete();
        self.transition(ServerState::Ready);
        Ok(None)
    }
}

fn store_session(engine: &Engine) {
    let Some(cache) = engine.config.session_cache() else {
        return;
    };
    if engine.ctx.session_id.is_empty() {
        return;
    }
    if let Some(data) = engine.ctx.to_session_data() {
        debug!("Caching session");
        cache.put(&engine.ctx.session_id, data.encode());
    }
}

/// Highest configured version not above what the client offered.
fn select_version(config: &Config, offered: ProtocolVersion) -> Result<ProtocolVersion, Error> {
    // A newer version than we know still tells us the variant.
    let variant = offered.variant().unwrap_or(if offered.as_u16() >= 0xFE00 {
        Variant::Dtls
    } else {
        Variant::Tls
    });
    if variant != config.variant() {
        return Err(Error::UnsupportedVersion(offered.as_u16()));
    }
    config
        .versions()
        .find(|v| v.rank() <= offered.rank())
        .ok_or(Error::UnsupportedVersion(offered.as_u16()))
}

/// First suite in our preference the client offered and we can serve.
///
/// Returns the ECDHE group alongside. A suite only unusable for lack of a
/// suitable key is a configuration problem rather than a failed negotiation.
fn select_suite(
    engine: &Engine,
    version: ProtocolVersion,
    ch: &ClientHello,
    key: Option<&dyn PrivateKey>,
    offered_groups: Option<&[NamedGroup]>,
    client_signature_algorithms: Option<&[SignatureAndHashAlgorithm]>,
) -> Result<(CipherSuite, Option<NamedGroup>), Error> {
    let config = &engine.config;
    let mut missing_key = false;

    for suite in config.suites_for(version) {
        if !ch.cipher_suites.contains(&suite) {
            continue;
        }

        let kx_alg = suite.key_exchange();
        if let Some(needed) = kx_alg.server_key_algorithm() {
            match key {
                Some(k) if k.algorithm() == needed => {}
                _ => {
                    missing_key = true;
                    continue;
                }
            }
        }

        let group = match kx_alg {
            KeyExchangeAlgorithm::EcdheRsa | KeyExchangeAlgorithm::EcdheEcdsa => {
                match kx::select_group(&engine.provider, config.groups(), offered_groups) {
                    Some(g) => Some(g),
                    None => continue,
                }
            }
            KeyExchangeAlgorithm::EcdhEcdsa | KeyExchangeAlgorithm::EcdhRsa => {
                let Some(curve) = key.and_then(|k| k.group()) else {
                    missing_key = true;
                    continue;
                };
                if offered_groups.is_some_and(|g| !g.contains(&curve)) {
                    continue;
                }
                None
            }
            KeyExchangeAlgorithm::Psk => {
                if config.credentials().is_none() {
                    missing_key = true;
                    continue;
                }
                None
            }
            _ => None,
        };

        if kx_alg.is_signed_ephemeral() {
            let Some(k) = key else {
                continue;
            };
            let scheme = signature::select_scheme(
                version,
                k.algorithm(),
                client_signature_algorithms,
                config.signature_algorithms(),
            );
            if scheme.is_err() {
                continue;
            }
        }

        return Ok((suite, group));
    }

    if missing_key {
        Err(Error::ConfigError(
            "No credential for any offered cipher suite".into(),
        ))
    } else {
        Err(Error::NegotiationError("No common cipher suite".into()))
    }
}

fn compute_cookie(secret: &[u8], client_random: Random) -> Result<Cookie, Error> {
    // cookie = trunc_32(HMAC(secret, client_random))
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| Error::CryptoError("Invalid HMAC key".to_string()))?;
    let mut buf = Buf::new();
    client_random.serialize(&mut buf);
    mac.update(&buf);
    let tag = mac.finalize().into_bytes();
    Cookie::try_new(&tag[..32])
        .map_err(|_| Error::CryptoError("Failed to build cookie from HMAC output".to_string()))
}

fn verify_cookie(secret: &[u8], client_random: Random, cookie: Cookie) -> bool {
    if cookie.len() != 32 {
        return false;
    }
    match compute_cookie(secret, client_random) {
        Ok(expected) => bool::from(expected.ct_eq(&cookie)),
        Err(_) => false,
    }
}

impl std::fmt::Debug for ServerHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandshake")
            .field("state", &self.state)
            .field("client_version", &self.client_version)
            .field("has_key", &self.private_key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::message::HelloVerifyRequest;
    use crate::session::Role;
    use crate::Output;

    fn server(config: Config) -> (ServerHandshake, Engine) {
        let mut engine = Engine::new(Arc::new(config), Role::Server, Instant::now()).unwrap();
        let server = ServerHandshake::new(&mut engine);
        (server, engine)
    }

    fn sent(engine: &mut Engine) -> Vec<Vec<u8>> {
        let mut buf = vec![0; 4096];
        let mut out = Vec::new();
        while let Output::Packet(p) = engine.poll_output(&mut buf) {
            out.push(p.to_vec());
        }
        out
    }

    fn client_hello(engine: &mut Engine, version: ProtocolVersion, suites: &[CipherSuite]) -> ClientHello {
        ClientHello {
            client_version: version,
            random: Random::new(&mut engine.rng),
            session_id: SessionId::empty(),
            cookie: Cookie::empty(),
            cipher_suites: suites.to_vec(),
            compression_methods: vec![CompressionMethod::Null],
            extensions: HelloExtensions::default(),
        }
    }

    fn message(ch: &ClientHello, dtls: bool, seq: u16) -> Message {
        let mut body = Buf::new();
        ch.serialize(dtls, &mut body);
        Message::Handshake(Handshake::new(MessageType::ClientHello, seq, body))
    }

    #[test]
    fn cookie_roundtrip() {
        let secret = [3; 32];
        let random = Random::from_bytes([9; 32]);
        let cookie = compute_cookie(&secret, random).unwrap();
        assert_eq!(cookie.len(), 32);
        assert!(verify_cookie(&secret, random, cookie));
        assert!(!verify_cookie(&[4; 32], random, cookie));
        assert!(!verify_cookie(&secret, random, Cookie::empty()));
    }

    #[test]
    fn hello_verify_request_without_cookie() {
        let (mut server, mut engine) = server(Config::builder().dtls().build().unwrap());
        let ch = client_hello(&mut engine, ProtocolVersion::DTLS1_2, CipherSuite::all());

        let advance = server.advance(&mut engine, &message(&ch, true, 0));
        assert!(matches!(advance, Advance::Continue));
        assert_eq!(server.state(), ServerState::AwaitClientHello);
        assert_eq!(engine.transcript.message_count(), 0);

        let packets = sent(&mut engine);
        assert_eq!(packets.len(), 1);
        let record = &packets[0];
        assert_eq!(record[13], 3); // HelloVerifyRequest
        assert_eq!(&record[17..19], &[0, 0]); // message_seq of the ClientHello
        let (_, hvr) = HelloVerifyRequest::parse(&record[25..]).unwrap();
        assert_eq!(hvr.server_version, ProtocolVersion::DTLS1_0);
        assert!(verify_cookie(&server.cookie_secret, ch.random, hvr.cookie));
    }

    #[test]
    fn version_selection() {
        let config = Config::builder()
            .versions(ProtocolVersion::TLS1_0, ProtocolVersion::TLS1_2)
            .build()
            .unwrap();
        assert_eq!(
            select_version(&config, ProtocolVersion::TLS1_1).unwrap(),
            ProtocolVersion::TLS1_1
        );
        assert_eq!(
            select_version(&config, ProtocolVersion::from_u16(0x0304)).unwrap(),
            ProtocolVersion::TLS1_2
        );
        assert!(matches!(
            select_version(&config, ProtocolVersion::DTLS1_2),
            Err(Error::UnsupportedVersion(_))
        ));

        let config = Config::builder()
            .versions(ProtocolVersion::TLS1_2, ProtocolVersion::TLS1_2)
            .build()
            .unwrap();
        assert!(matches!(
            select_version(&config, ProtocolVersion::TLS1_0),
            Err(Error::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn no_credential_is_config_error() {
        let (mut server, mut engine) = server(Config::builder().build().unwrap());
        let ch = client_hello(
            &mut engine,
            ProtocolVersion::TLS1_2,
            &[CipherSuite::RSA_WITH_AES_128_CBC_SHA],
        );
        let advance = server.advance(&mut engine, &message(&ch, false, 0));
        assert!(matches!(advance, Advance::Fatal(Error::ConfigError(_))));
        assert_eq!(server.state(), ServerState::ErrorClose);
    }

    #[test]
    fn no_common_suite() {
        let (mut server, mut engine) = server(Config::builder().build().unwrap());
        let ch = client_hello(&mut engine, ProtocolVersion::TLS1_2, &[CipherSuite::Unknown(0x1301)]);
        let advance = server.advance(&mut engine, &message(&ch, false, 0));
        assert!(matches!(advance, Advance::Fatal(Error::NegotiationError(_))));
    }

    #[test]
    fn finished_before_hello() {
        let (mut server, mut engine) = server(Config::builder().build().unwrap());
        let finished = Handshake::new(MessageType::Finished, 0, Buf::from_slice(&[0; 12]));
        let advance = server.advance(&mut engine, &Message::Handshake(finished));
        assert!(matches!(advance, Advance::Fatal(Error::UnexpectedMessage(_))));
        assert!(sent(&mut engine).is_empty());
    }
}
