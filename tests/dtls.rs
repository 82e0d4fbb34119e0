//! DTLS handshakes over a lossy datagram pipe.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use tlsengine::{CipherSuite, Config, ConfigBuilder, Credential, Error, ProtocolVersion, Tls};

fn dtls_pair(
    configure: impl Fn(ConfigBuilder) -> ConfigBuilder,
    credential: Credential,
) -> (Tls, Tls, Instant) {
    let now = Instant::now();
    let server = server_config(configure(Config::builder().dtls()), credential);
    let client = client_config(configure(Config::builder().dtls()), RSA_CERT);
    let client = Tls::new_client(client, None, now).unwrap();
    let server = Tls::new_server(server, now).unwrap();
    (client, server, now)
}

#[test]
fn cookie_exchange() {
    init_logging();
    let (mut client, mut server, now) = dtls_pair(|b| b, rsa_credential());

    let (c, s) = connect(&mut client, &mut server, now);
    assert_eq!(
        c.handshake_types(true),
        vec![CLIENT_HELLO, CLIENT_HELLO, CLIENT_KEY_EXCHANGE]
    );
    assert_eq!(
        s.handshake_types(true),
        vec![
            HELLO_VERIFY_REQUEST,
            SERVER_HELLO,
            CERTIFICATE,
            SERVER_KEY_EXCHANGE,
            SERVER_HELLO_DONE
        ]
    );
    assert_eq!(client.context().version(), Some(ProtocolVersion::DTLS1_2));
    assert_eq!(
        client.context().server_verify_data(),
        server.context().server_verify_data()
    );

    exchange_data(&mut client, &mut server, now);
}

#[test]
fn without_cookies() {
    init_logging();
    let (mut client, mut server, now) = dtls_pair(|b| b.dtls_cookies(false), rsa_credential());

    let (c, s) = connect(&mut client, &mut server, now);
    assert_eq!(count(&c.handshake_types(true), CLIENT_HELLO), 1);
    assert_eq!(count(&s.handshake_types(true), HELLO_VERIFY_REQUEST), 0);
}

#[test]
fn dtls10() {
    init_logging();
    let v = ProtocolVersion::DTLS1_0;
    let (mut client, mut server, now) = dtls_pair(
        |b| {
            b.versions(v, v)
                .cipher_suites(&[CipherSuite::ECDHE_RSA_WITH_AES_128_CBC_SHA])
        },
        rsa_credential(),
    );

    connect(&mut client, &mut server, now);
    assert_eq!(server.context().version(), Some(v));
    exchange_data(&mut client, &mut server, now);
}

#[test]
fn small_mtu_fragments_large_certificate() {
    init_logging();
    let filler = vec![0x5a; 2400];
    let credential = Credential {
        certificate_chain: vec![RSA_CERT.to_vec(), filler],
        private_key: RSA_KEY.to_vec(),
    };
    let (mut client, mut server, now) = dtls_pair(
        |b| b.mtu(200).max_queue_tx(64).max_queue_rx(64),
        credential.clone(),
    );

    let (c, s) = connect(&mut client, &mut server, now);
    for p in c.packets.iter().chain(s.packets.iter()) {
        assert!(p.len() <= 200, "datagram of {} bytes", p.len());
    }
    assert!(s.packets.len() > 15);
    assert_eq!(client.context().peer_certificates(), &credential.certificate_chain[..]);

    exchange_data(&mut client, &mut server, now);
}

#[test]
fn lost_client_hello_is_retransmitted() {
    init_logging();
    let (mut client, mut server, now) = dtls_pair(|b| b, rsa_credential());

    let mut lost = Drained::default();
    let first = drain(&mut client, &mut lost);
    assert_eq!(handshake_types(&first, true), vec![CLIENT_HELLO]);

    client.handle_timeout(now).unwrap();
    let mut idle = Drained::default();
    drain(&mut client, &mut idle);
    assert!(idle.packets.is_empty());
    let deadline = idle.timeout.unwrap();
    assert!(deadline > now);

    client.handle_timeout(deadline).unwrap();
    let mut again = Drained::default();
    let resent = drain(&mut client, &mut again);
    assert_eq!(handshake_types(&resent, true), vec![CLIENT_HELLO]);

    let a = &parse_records(&first[0], true)[0];
    let b = &parse_records(&resent[0], true)[0];
    assert_eq!(a.fragment, b.fragment);
    assert_eq!(a.epoch, b.epoch);
    assert!(b.seq > a.seq);

    for p in &resent {
        server.handle_input(p).unwrap();
    }
    connect(&mut client, &mut server, deadline);
}

#[test]
fn lost_final_flight_recovers() {
    init_logging();
    let (mut client, mut server, mut now) = dtls_pair(|b| b, rsa_credential());

    // Drop the client's first datagram carrying ChangeCipherSpec.
    let mut dropped = false;
    pump_with(&mut client, &mut server, now, |side, packet| {
        let ccs = parse_records(packet, true)
            .iter()
            .any(|r| r.ctype == CHANGE_CIPHER_SPEC);
        if side == Side::Client && ccs && !dropped {
            dropped = true;
            return false;
        }
        true
    });
    assert!(dropped);
    assert!(!server.is_connected());

    for _ in 0..6 {
        now += Duration::from_secs(3);
        let (c, s) = pump(&mut client, &mut server, now);
        assert!(c.errors.is_empty(), "{:?}", c.errors);
        assert!(s.errors.is_empty(), "{:?}", s.errors);
        if client.is_connected() && server.is_connected() {
            break;
        }
    }
    assert!(client.is_connected());
    assert!(server.is_connected());
    exchange_data(&mut client, &mut server, now);
}

#[test]
fn unanswered_handshake_times_out() {
    init_logging();
    let now = Instant::now();
    let config = client_config(
        Config::builder().dtls().flight_retries(2),
        RSA_CERT,
    );
    let mut client = Tls::new_client(config, None, now).unwrap();

    let mut out = Drained::default();
    drain(&mut client, &mut out);
    client.handle_timeout(now).unwrap();

    let mut result = Ok(());
    for _ in 0..10 {
        drain(&mut client, &mut out);
        let deadline = out.timeout.unwrap();
        result = client.handle_timeout(deadline);
        if result.is_err() {
            break;
        }
    }
    assert!(matches!(result, Err(Error::Timeout(_))));
    assert_eq!(count(&out.handshake_types(true), CLIENT_HELLO), 3);
    assert!(matches!(client.handle_timeout(now), Err(Error::Closed)));
}

#[test]
fn application_data_survives_loss_and_replay() {
    init_logging();
    let (mut client, mut server, now) = dtls_pair(|b| b, rsa_credential());
    connect(&mut client, &mut server, now);

    // Lost.
    client.send_application_data(b"one").unwrap();
    let mut lost = Drained::default();
    drain(&mut client, &mut lost);

    client.send_application_data(b"two").unwrap();
    let mut out = Drained::default();
    let packets = drain(&mut client, &mut out);
    assert_eq!(packets.len(), 1);

    // Replayed.
    server.handle_input(&packets[0]).unwrap();
    server.handle_input(&packets[0]).unwrap();

    // Tampered records are dropped without an alert.
    client.send_application_data(b"three").unwrap();
    let mut tampered = drain(&mut client, &mut out).remove(0);
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    server.handle_input(&tampered).unwrap();

    let mut received = Drained::default();
    drain(&mut server, &mut received);
    assert_eq!(received.app_data, vec![b"two".to_vec()]);
    assert!(received.packets.is_empty());
    assert!(server.is_connected());
}

#[test]
fn large_message_is_split_across_records() {
    init_logging();
    let (mut client, mut server, now) = dtls_pair(|b| b, rsa_credential());
    connect(&mut client, &mut server, now);

    let payload: Vec<u8> = (0..3000).map(|i| i as u8).collect();
    client.send_application_data(&payload).unwrap();
    let (c, s) = pump(&mut client, &mut server, now);
    assert!(c.packets.iter().all(|p| p.len() <= 1150));
    assert_eq!(s.app_data.concat(), payload);
}

#[test]
fn config_shared_between_connections() {
    init_logging();
    let now = Instant::now();
    let server_cfg = server_config(Config::builder().dtls(), rsa_credential());
    let client_cfg = client_config(Config::builder().dtls(), RSA_CERT);

    for _ in 0..2 {
        let mut client = Tls::new_client(Arc::clone(&client_cfg), None, now).unwrap();
        let mut server = Tls::new_server(Arc::clone(&server_cfg), now).unwrap();
        connect(&mut client, &mut server, now);
    }
}
