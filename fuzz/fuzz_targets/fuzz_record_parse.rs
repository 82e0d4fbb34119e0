#![no_main]

//! Wraps the input in plausible handshake record headers so the fuzzer
//! gets past the record layer into the handshake parsers.

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use std::time::Instant;

use tlsengine::{Config, Tls};

const MAX_FRAGMENT_LEN: usize = 16384;

fuzz_target!(|data: &[u8]| {
    let now = Instant::now();
    let frag_len = data.len().min(MAX_FRAGMENT_LEN);

    let Ok(config) = Config::builder().dtls().rng_seed(1).build() else {
        return;
    };
    if let Ok(mut dtls) = Tls::new_server(Arc::new(config), now) {
        let mut record = Vec::with_capacity(13 + frag_len);
        record.push(22); // handshake
        record.extend_from_slice(&[0xFE, 0xFD]);
        record.extend_from_slice(&[0, 0]); // epoch
        record.extend_from_slice(&[0, 0, 0, 0, 0, 1]);
        record.extend_from_slice(&(frag_len as u16).to_be_bytes());
        record.extend_from_slice(&data[..frag_len]);
        let _ = dtls.handle_input(&record);
    }

    let Ok(config) = Config::builder().rng_seed(1).build() else {
        return;
    };
    if let Ok(mut tls) = Tls::new_server(Arc::new(config), now) {
        let mut record = Vec::with_capacity(5 + frag_len);
        record.push(22);
        record.extend_from_slice(&[0x03, 0x03]);
        record.extend_from_slice(&(frag_len as u16).to_be_bytes());
        record.extend_from_slice(&data[..frag_len]);
        let _ = tls.handle_input(&record);
    }
});
