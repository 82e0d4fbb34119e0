//! Running handshake hashes.

use crate::buffer::Buf;
use crate::crypto::{HashContext, HashProvider};
use crate::types::{HashAlgorithm, SignatureHash};
use crate::Error;

/// Hash contexts over every handshake message sent or received.
///
/// The version and suite are not known until ServerHello, so all digests a
/// handshake may need are kept running from the first message on.
pub struct Transcript {
    provider: &'static dyn HashProvider,
    md5: Box<dyn HashContext>,
    sha1: Box<dyn HashContext>,
    sha256: Box<dyn HashContext>,
    sha384: Box<dyn HashContext>,
    bytes: usize,
    messages: usize,
}

impl Transcript {
    pub fn new(provider: &'static dyn HashProvider) -> Result<Self, Error> {
        let create = |h| provider.create_hash(h).map_err(Error::CryptoError);
        Ok(Transcript {
            provider,
            md5: create(HashAlgorithm::MD5)?,
            sha1: create(HashAlgorithm::SHA1)?,
            sha256: create(HashAlgorithm::SHA256)?,
            sha384: create(HashAlgorithm::SHA384)?,
            bytes: 0,
            messages: 0,
        })
    }

    /// Start over. Used by a DTLS client when a HelloVerifyRequest arrives.
    pub fn reset(&mut self) -> Result<(), Error> {
        *self = Transcript::new(self.provider)?;
        Ok(())
    }

    /// Add one complete handshake message including its header.
    pub fn update(&mut self, message: &[u8]) {
        self.md5.update(message);
        self.sha1.update(message);
        self.sha256.update(message);
        self.sha384.update(message);
        self.bytes += message.len();
        self.messages += 1;
    }

    /// Number of bytes hashed so far.
    pub fn len(&self) -> usize {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    pub fn message_count(&self) -> usize {
        self.messages
    }

    /// Current digest with a single hash.
    pub fn digest(&self, hash: HashAlgorithm) -> Result<Buf, Error> {
        let mut out = Buf::new();
        match hash {
            HashAlgorithm::MD5 => self.md5.clone_and_finalize(&mut out),
            HashAlgorithm::SHA1 => self.sha1.clone_and_finalize(&mut out),
            HashAlgorithm::SHA256 => self.sha256.clone_and_finalize(&mut out),
            HashAlgorithm::SHA384 => self.sha384.clone_and_finalize(&mut out),
            _ => {
                return Err(Error::NegotiationError(format!(
                    "Transcript hash {:?} not supported",
                    hash
                )))
            }
        }
        Ok(out)
    }

    /// Current digest as used for signatures, see [`SignatureHash`].
    pub fn signature_digest(&self, hash: SignatureHash) -> Result<Buf, Error> {
        match hash {
            SignatureHash::Md5Sha1 => {
                let mut out = Buf::new();
                self.md5.clone_and_finalize(&mut out);
                self.sha1.clone_and_finalize(&mut out);
                Ok(out)
            }
            SignatureHash::Hash(h) => self.digest(h),
        }
    }

    /// The handshake hash for Finished and the extended master secret.
    ///
    /// `MD5 + SHA1` before TLS 1.2, the suite PRF hash from 1.2.
    pub fn handshake_hash(&self, tls12_hash: Option<HashAlgorithm>) -> Result<Buf, Error> {
        match tls12_hash {
            Some(h) => self.digest(h),
            None => self.signature_digest(SignatureHash::Md5Sha1),
        }
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("bytes", &self.bytes)
            .field("messages", &self.messages)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;

    fn transcript() -> Transcript {
        Transcript::new(rust_crypto::default_provider().hash_provider).unwrap()
    }

    #[test]
    fn legacy_hash_is_md5_then_sha1() {
        let mut t = transcript();
        t.update(b"abc");
        let h = t.handshake_hash(None).unwrap();
        assert_eq!(h.len(), 36);
        // md5("abc") = 900150983cd24fb0...
        assert_eq!(&h[..4], &[0x90, 0x01, 0x50, 0x98]);
        // sha1("abc") = a9993e36...
        assert_eq!(&h[16..20], &[0xa9, 0x99, 0x3e, 0x36]);
    }

    #[test]
    fn split_updates_equal_single_update() {
        let mut a = transcript();
        a.update(b"hello ");
        a.update(b"world");
        let mut b = transcript();
        b.update(b"hello world");
        assert_eq!(
            a.digest(HashAlgorithm::SHA384).unwrap(),
            b.digest(HashAlgorithm::SHA384).unwrap()
        );
        assert_eq!(a.message_count(), 2);
        assert_eq!(a.len(), 11);
    }

    #[test]
    fn reset_clears() {
        let mut t = transcript();
        let empty = t.digest(HashAlgorithm::SHA256).unwrap();
        t.update(b"x");
        t.reset().unwrap();
        assert!(t.is_empty());
        assert_eq!(t.digest(HashAlgorithm::SHA256).unwrap(), empty);
    }
}
