#![no_main]

//! Feeds arbitrary bytes to fresh servers and to clients that have sent
//! their ClientHello, over both TLS and DTLS.

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use std::time::Instant;

use tlsengine::auth::StaticCredentials;
use tlsengine::certificate::generate_self_signed;
use tlsengine::{Config, Output, Tls};

fuzz_target!(|data: &[u8]| {
    let Ok(cert) = generate_self_signed("fuzz") else {
        return;
    };
    let now = Instant::now();

    for dtls in [false, true] {
        let mut builder = Config::builder()
            .rng_seed(1)
            .credentials(Arc::new(StaticCredentials::new().with_server(cert.to_credential())));
        if dtls {
            builder = builder.dtls();
        }
        let Ok(config) = builder.build() else {
            return;
        };
        let config = Arc::new(config);

        if let Ok(mut server) = Tls::new_server(Arc::clone(&config), now) {
            let _ = server.handle_input(data);
        }

        if let Ok(mut client) = Tls::new_client(config, None, now) {
            let mut buf = vec![0u8; 2048];
            // Bounded, the ClientHello is a handful of packets at most.
            for _ in 0..10 {
                if let Output::Timeout(_) = client.poll_output(&mut buf) {
                    break;
                }
            }
            let _ = client.handle_input(data);
        }
    }
});
