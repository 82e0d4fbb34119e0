//! HMAC using RustCrypto.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

use crate::buffer::Buf;
use crate::crypto::provider::HmacProvider;
use crate::types::HashAlgorithm;

fn compute<M: Mac + hmac::digest::KeyInit>(
    key: &[u8],
    parts: &[&[u8]],
    out: &mut Buf,
) -> Result<(), String> {
    let mut mac =
        <M as Mac>::new_from_slice(key).map_err(|_| "Invalid HMAC key length".to_string())?;
    for p in parts {
        mac.update(p);
    }
    out.extend_from_slice(&mac.finalize().into_bytes());
    Ok(())
}

/// HMAC provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHmacProvider;

impl HmacProvider for RustCryptoHmacProvider {
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        parts: &[&[u8]],
        out: &mut Buf,
    ) -> Result<(), String> {
        match hash {
            HashAlgorithm::MD5 => compute::<Hmac<Md5>>(key, parts, out),
            HashAlgorithm::SHA1 => compute::<Hmac<Sha1>>(key, parts, out),
            HashAlgorithm::SHA256 => compute::<Hmac<Sha256>>(key, parts, out),
            HashAlgorithm::SHA384 => compute::<Hmac<Sha384>>(key, parts, out),
            HashAlgorithm::SHA512 => compute::<Hmac<Sha512>>(key, parts, out),
            _ => Err(format!("Unsupported HMAC hash algorithm: {:?}", hash)),
        }
    }
}

/// Static instance of the HMAC provider.
pub(super) static HMAC_PROVIDER: RustCryptoHmacProvider = RustCryptoHmacProvider;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc2202_md5_case_2() {
        let mut out = Buf::new();
        HMAC_PROVIDER
            .hmac(
                HashAlgorithm::MD5,
                b"Jefe",
                &[b"what do ya want ", b"for nothing?"],
                &mut out,
            )
            .unwrap();
        assert_eq!(
            &*out,
            &[
                0x75, 0x0c, 0x78, 0x3e, 0x6a, 0xb0, 0xb5, 0x03, 0xea, 0xa8, 0x6e, 0x31, 0x0a, 0x5d,
                0xb7, 0x38,
            ]
        );
    }
}
