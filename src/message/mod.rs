//! Wire codec for records and handshake messages.
//!
//! Every message has a nom `parse` and a `serialize` writing into a
//! [`Buf`](crate::buffer::Buf). Parsers are given the context they need
//! (DTLS or not, TLS 1.2 or not, the key exchange of the suite) rather
//! than guessing from the bytes.
//!
//! CertificateVerify is a bare [`DigitallySigned`].

mod alert;
mod certificate;
mod certificate_request;
mod client_hello;
mod client_key_exchange;
mod digitally_signed;
mod extension;
mod extensions;
mod finished;
mod handshake;
mod hello_verify;
mod id;
mod random;
mod record;
mod server_hello;
mod server_key_exchange;

pub use alert::Alert;
pub use certificate::Certificate;
pub use certificate_request::CertificateRequest;
pub use client_hello::ClientHello;
pub use client_key_exchange::ClientKeyExchange;
pub use digitally_signed::DigitallySigned;
pub use extension::{Extension, ExtensionType};
pub use extensions::{HelloExtensions, EC_POINT_FORMAT_UNCOMPRESSED};
pub use finished::Finished;
pub use handshake::{Handshake, Header, MessageType, DTLS_HEADER_LEN, TLS_HEADER_LEN};
pub use hello_verify::HelloVerifyRequest;
pub use id::{Cookie, SessionId};
pub use random::Random;
pub use record::{Record, RecordHeader, DTLS_RECORD_HEADER_LEN, TLS_RECORD_HEADER_LEN};
pub use server_hello::ServerHello;
pub use server_key_exchange::{DhParams, EcdhParams, ServerKeyExchange, ServerKeyExchangeParams};

/// ChangeCipherSpec record body.
pub const CHANGE_CIPHER_SPEC: [u8; 1] = [1];
