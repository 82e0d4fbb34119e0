// Client Handshake Flow:
//
// 1. Send ClientHello, offering a cached session id when resuming
// 2. DTLS: a HelloVerifyRequest restarts the transcript, ClientHello is
//    sent again with the cookie
// 3. ServerHello either accepts the session id (abbreviated handshake,
//    straight to ChangeCipherSpec and Finished) or starts a full handshake
// 4. Receive Certificate, ServerKeyExchange, CertificateRequest and
//    ServerHelloDone, each optional as the suite dictates
// 5. Send Certificate, ClientKeyExchange, CertificateVerify,
//    ChangeCipherSpec and Finished
// 6. Receive ChangeCipherSpec and Finished

use subtle::ConstantTimeEq;

use super::engine::Engine;
use super::{Advance, Message, Resolution, SuspendReason};
use crate::auth::{ClientCertificateRequest, Credential, CredentialResult, TrustDecision};
use crate::buffer::Buf;
use crate::crypto::PrivateKey;
use crate::event::LocalEvent;
use crate::kx::{signature, KeyExchange};
use crate::message::{Alert, Certificate, CertificateRequest, ClientHello, Cookie, Finished};
use crate::message::{Handshake, HelloExtensions, HelloVerifyRequest, MessageType, Random};
use crate::message::{ServerHello, SessionId, EC_POINT_FORMAT_UNCOMPRESSED};
use crate::session::Session;
use crate::suite::{CipherSuite, KeyExchangeAlgorithm};
use crate::types::{AlertDescription, CompressionMethod, ProtocolVersion};
use crate::util::all_consuming;
use crate::{Config, Error};

/// Current state of the client handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// ClientHello not sent yet.
    Start,
    /// Await ServerHello, or a HelloVerifyRequest for DTLS.
    AwaitServerHello,
    AwaitCertificate,
    /// ServerKeyExchange is optional for PSK suites.
    AwaitServerKeyExchange,
    /// CertificateRequest is optional.
    AwaitCertificateRequest,
    AwaitServerHelloDone,
    AwaitChangeCipherSpec,
    AwaitFinished,
    /// Send and receive application data.
    Ready,
    GracefulClose,
    ErrorClose,
}

pub(crate) struct ClientHandshake {
    state: ClientState,

    server_name: Option<String>,

    /// Session offered for resumption.
    resume: Option<Session>,

    /// What we sent, kept to resend with a cookie.
    hello: Option<ClientHello>,

    /// Highest version offered, bound into the RSA premaster.
    client_version: ProtocolVersion,

    kx: Option<KeyExchange>,

    /// ServerKeyExchange may be left out (PSK without hint).
    ske_optional: bool,

    /// PeerCert has been announced.
    peer_cert_announced: bool,

    /// Answer to a ServerAuth suspension.
    trust: Option<bool>,

    certificate_request: Option<ClientCertificateRequest>,

    /// Outer `Some` once decided.
    client_credential: Option<Option<Credential>>,
}

impl ClientHandshake {
    pub fn new(server_name: Option<&str>, resume: Option<Session>) -> Self {
        ClientHandshake {
            state: ClientState::Start,
            server_name: server_name.map(|s| s.to_string()),
            resume,
            hello: None,
            client_version: ProtocolVersion::TLS1_2,
            kx: None,
            ske_optional: false,
            peer_cert_announced: false,
            trust: None,
            certificate_request: None,
            client_credential: None,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn close(&mut self, graceful: bool) {
        self.state = if graceful {
            ClientState::GracefulClose
        } else {
            ClientState::ErrorClose
        };
    }

    pub fn resolve(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Trust(trusted) => self.trust = Some(trusted),
            Resolution::Credential(credential) => self.client_credential = Some(credential),
        }
    }

    fn transition(&mut self, next: ClientState) {
        debug!("Client {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Send the first flight.
    pub fn start(&mut self, engine: &mut Engine) -> Result<(), Error> {
        if self.state != ClientState::Start {
            return Err(Error::UnexpectedMessage("Client already started".into()));
        }

        let config = engine.config.clone();
        self.client_version = config.max_version();
        engine.ctx.server_name = self.server_name.clone();

        let random = Random::new(&mut engine.rng);
        engine.ctx.client_random = random.to_bytes();

        let mut cipher_suites: Vec<CipherSuite> = config
            .cipher_suites()
            .iter()
            .copied()
            .filter(|s| config.versions().any(|v| s.supports(v)))
            .collect();

        // Only offer a session we could agree to resume.
        let usable = self
            .resume
            .as_ref()
            .map(|s| Self::resumable(&config, s, &cipher_suites));
        if usable == Some(false) {
            debug!("Cached session not usable with this configuration");
            self.resume = None;
        }
        let session_id = self
            .resume
            .as_ref()
            .map(|s| s.id)
            .unwrap_or_else(SessionId::empty);

        let uses_ec = cipher_suites.iter().any(|s| {
            matches!(
                s.key_exchange(),
                KeyExchangeAlgorithm::EcdheRsa
                    | KeyExchangeAlgorithm::EcdheEcdsa
                    | KeyExchangeAlgorithm::EcdhEcdsa
                    | KeyExchangeAlgorithm::EcdhRsa
            )
        });

        // RFC 5746 signalling on the initial handshake.
        cipher_suites.push(CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV);

        let extensions = HelloExtensions {
            server_name: self.server_name.clone(),
            supported_groups: uses_ec.then(|| config.groups().iter().copied().take(32).collect()),
            ec_point_formats: uses_ec.then(|| [EC_POINT_FORMAT_UNCOMPRESSED].into_iter().collect()),
            signature_algorithms: self.client_version.is_tls12().then(|| {
                config
                    .signature_algorithms()
                    .iter()
                    .copied()
                    .take(32)
                    .collect()
            }),
            renegotiation_info: None,
            extended_master_secret: config.extended_master_secret(),
            session_ticket: None,
        };

        let hello = ClientHello {
            client_version: self.client_version,
            random,
            session_id,
            cookie: Cookie::empty(),
            cipher_suites,
            compression_methods: vec![CompressionMethod::Null],
            extensions,
        };

        engine.flight_begin(1);
        engine.create_handshake(MessageType::ClientHello, |body, engine| {
            hello.serialize(engine.is_dtls(), body);
            Ok(())
        })?;

        self.hello = Some(hello);
        self.transition(ClientState::AwaitServerHello);
        Ok(())
    }

    fn resumable(config: &Config, session: &Session, offered: &[CipherSuite]) -> bool {
        !session.id.is_empty()
            && offered.contains(&session.data.suite)
            && config.versions().any(|v| v == session.data.version)
            && session.data.suite.supports(session.data.version)
    }

    pub fn advance(&mut self, engine: &mut Engine, message: &Message) -> Advance {
        let result = match message {
            Message::Handshake(handshake) => self.handle_handshake(engine, handshake),
            Message::ChangeCipherSpec => self.handle_change_cipher_spec(engine),
        };

        if let Err(e) = &result {
            debug!("Client handshake failed in {:?}: {}", self.state, e);
            self.state = ClientState::ErrorClose;
        }

        result.into()
    }

    fn handle_handshake(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        use ClientState as S;
        use MessageType as M;

        match (self.state, handshake.msg_type()) {
            (S::Ready, M::HelloRequest) => {
                debug!("Refusing renegotiation");
                engine.send_alert(Alert::warning(AlertDescription::NoRenegotiation))?;
                Ok(None)
            }
            // Ignored while a handshake is in progress.
            (S::AwaitServerHello, M::HelloRequest) => Ok(None),

            (S::AwaitServerHello, M::HelloVerifyRequest) if engine.is_dtls() => {
                self.on_hello_verify_request(engine, handshake)
            }
            (S::AwaitServerHello, M::ServerHello) => self.on_server_hello(engine, handshake),
            (S::AwaitCertificate, M::Certificate) => self.on_certificate(engine, handshake),

            (S::AwaitServerKeyExchange, M::ServerKeyExchange) => {
                self.on_server_key_exchange(engine, handshake)
            }
            (S::AwaitServerKeyExchange, M::CertificateRequest | M::ServerHelloDone)
                if self.ske_optional =>
            {
                self.transition(S::AwaitCertificateRequest);
                self.handle_handshake(engine, handshake)
            }

            (S::AwaitCertificateRequest, M::CertificateRequest) => {
                self.on_certificate_request(engine, handshake)
            }
            (S::AwaitCertificateRequest, M::ServerHelloDone) => {
                self.transition(S::AwaitServerHelloDone);
                self.handle_handshake(engine, handshake)
            }

            (S::AwaitServerHelloDone, M::ServerHelloDone) => {
                self.on_server_hello_done(engine, handshake)
            }
            (S::AwaitFinished, M::Finished) => self.on_finished(engine, handshake),

            (state, msg_type) => Err(Error::UnexpectedMessage(format!(
                "{:?} in client state {:?}",
                msg_type, state
            ))),
        }
    }

    fn handle_change_cipher_spec(&mut self, engine: &mut Engine) -> Result<Option<SuspendReason>, Error> {
        if self.state != ClientState::AwaitChangeCipherSpec {
            if engine.is_dtls() {
                debug!("Ignoring ChangeCipherSpec in {:?}", self.state);
                return Ok(None);
            }
            return Err(Error::UnexpectedMessage(format!(
                "ChangeCipherSpec in client state {:?}",
                self.state
            )));
        }

        engine.activate_read()?;
        self.transition(ClientState::AwaitFinished);
        Ok(None)
    }

    fn on_hello_verify_request(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        let (_, hvr) = all_consuming(HelloVerifyRequest::parse)(&handshake.body)?;

        let Some(hello) = self.hello.as_mut() else {
            return Err(Error::UnexpectedMessage("HelloVerifyRequest before ClientHello".into()));
        };
        if !hello.cookie.is_empty() {
            return Err(Error::UnexpectedMessage("Second HelloVerifyRequest".into()));
        }
        if hvr.cookie.is_empty() {
            return Err(Error::IllegalParameter("Empty cookie".into()));
        }

        debug!("Received HelloVerifyRequest with {} byte cookie", hvr.cookie.len());
        hello.cookie = hvr.cookie;

        // HelloVerifyRequest and the first ClientHello are not part of the
        // handshake hash.
        engine.transcript.reset()?;

        let hello = hello.clone();
        engine.flight_begin(3);
        engine.create_handshake(MessageType::ClientHello, |body, engine| {
            hello.serialize(engine.is_dtls(), body);
            Ok(())
        })?;

        Ok(None)
    }

    fn on_server_hello(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        let (_, sh) = all_consuming(ServerHello::parse)(&handshake.body)?;
        let config = engine.config.clone();

        let version = sh.server_version;
        let in_range = version.variant() == Some(config.variant())
            && version.rank() >= config.min_version().rank()
            && version.rank() <= self.client_version.rank();
        if !in_range {
            return Err(Error::UnsupportedVersion(version.as_u16()));
        }

        let suite = sh.cipher_suite;
        let offered = self
            .hello
            .as_ref()
            .map(|h| h.cipher_suites.contains(&suite))
            .unwrap_or(false);
        if !offered || suite == CipherSuite::EMPTY_RENEGOTIATION_INFO_SCSV || !suite.supports(version) {
            return Err(Error::IllegalParameter(format!("Server selected {}", suite)));
        }
        if sh.compression_method != CompressionMethod::Null {
            return Err(Error::IllegalParameter("Server selected compression".into()));
        }

        match &sh.extensions.renegotiation_info {
            Some(info) if !info.is_empty() => {
                return Err(Error::NegotiationError(
                    "Non-empty renegotiation_info on initial handshake".into(),
                ));
            }
            Some(_) => engine.ctx.secure_renegotiation = true,
            None => engine.ctx.secure_renegotiation = false,
        }

        if sh.extensions.extended_master_secret && !config.extended_master_secret() {
            return Err(Error::IllegalParameter(
                "Unsolicited extended_master_secret".into(),
            ));
        }
        let ems = sh.extensions.extended_master_secret;

        debug!("Negotiated {} with {}", version, suite);
        engine.set_version(version);
        engine.ctx.suite = Some(suite);
        engine.ctx.server_random = sh.random.to_bytes();
        engine.ctx.session_id = sh.session_id;
        engine.ctx.extended_master_secret = ems;
        engine.hash_received(handshake);

        let resumed = match &self.resume {
            Some(s) => !sh.session_id.is_empty() && *sh.session_id == *s.id,
            None => false,
        };

        if resumed {
            let Some(session) = self.resume.take() else {
                return Err(Error::UnexpectedMessage("No session to resume".into()));
            };
            if session.data.version != version || session.data.suite != suite {
                return Err(Error::IllegalParameter(
                    "Resumed session with different parameters".into(),
                ));
            }
            if session.data.extended_master_secret != ems {
                return Err(Error::NegotiationError(
                    "extended_master_secret changed on resumption".into(),
                ));
            }

            debug!("Resuming session");
            engine.ctx.resumed = true;
            engine.ctx.master_secret = Some(session.data.master_secret);
            engine.ctx.peer_certificates = session.data.peer_certificates;
            engine.install_pending_keys()?;
            self.transition(ClientState::AwaitChangeCipherSpec);
            return Ok(None);
        }

        let kx = KeyExchange::for_suite(suite, None, None)?;
        self.ske_optional = matches!(kx, KeyExchange::Psk(_));
        self.kx = Some(kx);

        if suite.requires_certificate() {
            self.transition(ClientState::AwaitCertificate);
        } else {
            self.transition(ClientState::AwaitServerKeyExchange);
        }
        Ok(None)
    }

    fn on_certificate(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        let (_, certificate) = all_consuming(Certificate::parse)(&handshake.body)?;
        let chain = certificate.to_chain();
        let Some(leaf) = chain.first() else {
            return Err(Error::CertificateError("Empty server certificate chain".into()));
        };

        let (_, suite) = engine.ctx.negotiated()?;
        let peer_key = engine
            .provider
            .public_keys
            .peer_key(leaf)
            .map_err(Error::CertificateError)?;
        if Some(peer_key.algorithm) != suite.key_exchange().server_key_algorithm() {
            return Err(Error::CertificateError(format!(
                "{:?} certificate does not fit {}",
                peer_key.algorithm, suite
            )));
        }

        // Recorded once; a resumed suspension replays this message.
        if !self.peer_cert_announced {
            self.peer_cert_announced = true;
            engine.ctx.peer_certificates = chain;
            engine.push_event(LocalEvent::PeerCert);
        }

        let trusted = match self.trust.take() {
            Some(trusted) => trusted,
            None => {
                let config = engine.config.clone();
                let Some(evaluator) = config.trust_evaluator() else {
                    return Ok(Some(SuspendReason::ServerAuth));
                };
                let name = self.server_name.as_deref();
                match evaluator.evaluate(&engine.ctx.peer_certificates, name) {
                    TrustDecision::Trusted => true,
                    TrustDecision::Rejected(reason) => {
                        return Err(Error::CertificateError(reason));
                    }
                    TrustDecision::Deferred => return Ok(Some(SuspendReason::ServerAuth)),
                }
            }
        };
        if !trusted {
            return Err(Error::CertificateError("Server certificate rejected".into()));
        }

        engine.hash_received(handshake);

        let sends_params = self.kx.as_ref().map(|k| k.sends_server_params()).unwrap_or(false);
        if sends_params {
            self.transition(ClientState::AwaitServerKeyExchange);
        } else {
            self.transition(ClientState::AwaitCertificateRequest);
        }
        Ok(None)
    }

    fn on_server_key_exchange(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        let Some(kx) = self.kx.as_mut() else {
            return Err(Error::UnexpectedMessage("ServerKeyExchange without a key exchange".into()));
        };

        {
            let mut cx = engine.kx_context(self.client_version, None, None)?;
            kx.decode_and_verify_server_params(&mut cx, &handshake.body)?;
        }

        engine.hash_received(handshake);
        self.transition(ClientState::AwaitCertificateRequest);
        Ok(None)
    }

    fn on_certificate_request(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        let (version, suite) = engine.ctx.negotiated()?;
        if !suite.requires_certificate() {
            return Err(Error::UnexpectedMessage(
                "CertificateRequest in a suite without certificates".into(),
            ));
        }

        let tls12 = version.is_tls12();
        let (_, request) =
            all_consuming(|i| CertificateRequest::parse(i, tls12))(&handshake.body)?;

        self.certificate_request = Some(ClientCertificateRequest {
            certificate_types: request.certificate_types,
            signature_algorithms: request.supported_signature_algorithms,
            authorities: request
                .certificate_authorities
                .iter()
                .map(|a| a.to_vec())
                .collect(),
        });

        engine.hash_received(handshake);
        self.transition(ClientState::AwaitServerHelloDone);
        Ok(None)
    }

    fn on_server_hello_done(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        if !handshake.body.is_empty() {
            return Err(Error::DecodeError("ServerHelloDone with a body".into()));
        }

        if let Some(request) = &self.certificate_request {
            if self.client_credential.is_none() {
                let config = engine.config.clone();
                let answer = match config.credentials() {
                    Some(provider) => provider.client_credential(request),
                    None => CredentialResult::Ready(None),
                };
                match answer {
                    CredentialResult::Ready(credential) => {
                        self.client_credential = Some(credential)
                    }
                    CredentialResult::Deferred => {
                        return Ok(Some(SuspendReason::ClientCertificateRequested));
                    }
                }
            }
        }

        engine.hash_received(handshake);
        self.send_client_flight(engine)?;
        self.transition(ClientState::AwaitChangeCipherSpec);
        Ok(None)
    }

    fn send_client_flight(&mut self, engine: &mut Engine) -> Result<(), Error> {
        let (version, _) = engine.ctx.negotiated()?;
        engine.flight_begin(5);

        // Certificate, when asked. An empty list declines.
        let mut signing_key: Option<Box<dyn PrivateKey>> = None;
        if self.certificate_request.is_some() {
            let credential = self.client_credential.take().flatten();
            let chain = match credential {
                Some(c) => {
                    let key = engine
                        .provider
                        .key_provider
                        .load_private_key(&c.private_key)
                        .map_err(Error::ConfigError)?;
                    signing_key = Some(key);
                    c.certificate_chain
                }
                None => {
                    debug!("Declining the certificate request");
                    Vec::new()
                }
            };

            engine.create_handshake(MessageType::Certificate, |body, _| {
                Certificate::new(chain.iter().map(|c| c.as_slice()).collect()).serialize(body);
                Ok(())
            })?;
            engine.ctx.local_certificates = chain;
        }

        let Some(kx) = self.kx.as_mut() else {
            return Err(Error::UnexpectedMessage("No key exchange".into()));
        };

        let mut params = Buf::new();
        let premaster = {
            let mut cx = engine.kx_context(self.client_version, None, None)?;
            kx.encode_client_params(&mut cx, &mut params)?;
            kx.compute_premaster_secret(&mut cx)?
        };
        if let KeyExchange::Psk(psk) = kx {
            engine.ctx.psk_identity = psk.identity().map(|i| i.to_vec());
        }

        engine.create_handshake(MessageType::ClientKeyExchange, |body, _| {
            body.extend_from_slice(&params);
            Ok(())
        })?;

        // The session hash covers ClientKeyExchange.
        engine.compute_master_secret(&premaster)?;
        drop(premaster);

        if let Some(key) = &signing_key {
            let peer_algorithms = self
                .certificate_request
                .as_ref()
                .map(|r| r.signature_algorithms.as_slice())
                .filter(|a| !a.is_empty());
            let (algorithm, hash) = signature::select_scheme(
                version,
                key.algorithm(),
                peer_algorithms,
                engine.config.signature_algorithms(),
            )?;
            let digest = engine.transcript.signature_digest(hash)?;

            engine.create_handshake(MessageType::CertificateVerify, |body, _| {
                signature::sign_into(key.as_ref(), algorithm, hash, &digest, body)
            })?;
        }

        engine.install_pending_keys()?;
        engine.send_change_cipher_spec()?;
        self.send_finished(engine)
    }

    fn send_finished(&mut self, engine: &mut Engine) -> Result<(), Error> {
        let verify_data = engine.verify_data(false)?;
        engine.create_handshake(MessageType::Finished, |body, _| {
            Finished::new(&verify_data).serialize(body);
            Ok(())
        })?;
        engine.ctx.client_verify_data = verify_data.to_vec();
        Ok(())
    }

    fn on_finished(
        &mut self,
        engine: &mut Engine,
        handshake: &Handshake,
    ) -> Result<Option<SuspendReason>, Error> {
        let (_, finished) = all_consuming(Finished::parse)(&handshake.body)?;

        let expected = engine.verify_data(true)?;
        if !bool::from(expected.ct_eq(finished.verify_data)) {
            return Err(Error::DecryptError("Server Finished does not verify".into()));
        }
        engine.ctx.server_verify_data = expected.to_vec();
        engine.hash_received(handshake);

        if engine.ctx.resumed {
            // Our ChangeCipherSpec and Finished close the abbreviated
            // handshake.
            engine.flight_begin_final(5);
            engine.send_change_cipher_spec()?;
            self.send_finished(engine)?;
        }

        engine.handshake_complete();
        self.transition(ClientState::Ready);
        Ok(None)
    }
}

impl std::fmt::Debug for ClientHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandshake")
            .field("state", &self.state)
            .field("server_name", &self.server_name)
            .field("resume", &self.resume.is_some())
            .field("client_version", &self.client_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::session::Role;
    use crate::Output;

    fn client(config: Config) -> (ClientHandshake, Engine) {
        let mut engine = Engine::new(Arc::new(config), Role::Client, Instant::now()).unwrap();
        let mut client = ClientHandshake::new(Some("example.com"), None);
        client.start(&mut engine).unwrap();
        (client, engine)
    }

    fn sent(engine: &mut Engine) -> Vec<Vec<u8>> {
        let mut buf = vec![0; 4096];
        let mut out = Vec::new();
        while let Output::Packet(p) = engine.poll_output(&mut buf) {
            out.push(p.to_vec());
        }
        out
    }

    #[test]
    fn client_hello_offers() {
        let (client, mut engine) = client(Config::builder().build().unwrap());
        assert_eq!(client.state(), ClientState::AwaitServerHello);

        let packets = sent(&mut engine);
        assert_eq!(packets.len(), 1);
        let record = &packets[0];
        assert_eq!(record[0], 22); // handshake
        assert_eq!(record[5], 1); // ClientHello

        let (_, hello) = ClientHello::parse(&record[9..], false).unwrap();
        assert_eq!(hello.client_version, ProtocolVersion::TLS1_2);
        assert!(hello.offers_secure_renegotiation());
        assert!(hello.extensions.extended_master_secret);
        assert_eq!(hello.extensions.server_name.as_deref(), Some("example.com"));
        assert!(hello.extensions.signature_algorithms.is_some());
        assert!(hello.session_id.is_empty());
        assert_eq!(&engine.ctx.client_random, &hello.random.to_bytes());
    }

    #[test]
    fn illegal_transition_sends_nothing() {
        let (mut client, mut engine) = client(Config::builder().build().unwrap());
        sent(&mut engine);

        let finished = Handshake::new(MessageType::Finished, 0, Buf::from_slice(&[0; 12]));
        let advance = client.advance(&mut engine, &Message::Handshake(finished));

        assert!(matches!(advance, Advance::Fatal(Error::UnexpectedMessage(_))));
        assert_eq!(client.state(), ClientState::ErrorClose);
        assert!(sent(&mut engine).is_empty());
    }

    #[test]
    fn change_cipher_spec_out_of_place() {
        let (mut tls, mut engine) = client(Config::builder().build().unwrap());
        let advance = tls.advance(&mut engine, &Message::ChangeCipherSpec);
        assert!(matches!(advance, Advance::Fatal(Error::UnexpectedMessage(_))));

        let (mut dtls, mut engine) = client(Config::builder().dtls().build().unwrap());
        let advance = dtls.advance(&mut engine, &Message::ChangeCipherSpec);
        assert!(matches!(advance, Advance::Continue));
        assert_eq!(dtls.state(), ClientState::AwaitServerHello);
    }

    #[test]
    fn hello_verify_request_resends_with_cookie() {
        let (mut client, mut engine) = client(Config::builder().dtls().build().unwrap());
        assert_eq!(sent(&mut engine).len(), 1);

        let mut body = Buf::new();
        let cookie = Cookie::try_new(&[7; 20]).unwrap();
        HelloVerifyRequest::new(ProtocolVersion::DTLS1_0, cookie).serialize(&mut body);
        let hvr = Handshake::new(MessageType::HelloVerifyRequest, 0, body);

        let advance = client.advance(&mut engine, &Message::Handshake(hvr));
        assert!(matches!(advance, Advance::Continue));

        let packets = sent(&mut engine);
        assert_eq!(packets.len(), 1);
        let record = &packets[0];
        // Record header (13), handshake header (12)
        assert_eq!(record[13], 1);
        assert_eq!(&record[17..19], &[0, 1]); // message_seq
        let (_, hello) = ClientHello::parse(&record[25..], true).unwrap();
        assert_eq!(&*hello.cookie, &[7; 20]);

        // Only the second ClientHello is in the transcript.
        assert_eq!(engine.transcript.message_count(), 1);
    }

    #[test]
    fn hello_request_ignored_during_handshake() {
        let (mut client, mut engine) = client(Config::builder().build().unwrap());
        sent(&mut engine);
        let hr = Handshake::new(MessageType::HelloRequest, 0, Buf::new());
        let advance = client.advance(&mut engine, &Message::Handshake(hr));
        assert!(matches!(advance, Advance::Continue));
        assert!(sent(&mut engine).is_empty());
    }
}
