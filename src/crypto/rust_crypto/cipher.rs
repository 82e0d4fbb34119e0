//! Record protection ciphers using RustCrypto.

use aes::{Aes128, Aes256};
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Key, Nonce};
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockCipher as CipherCore, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use des::{Des, TdesEde3};
use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::crypto::provider::{AeadCipher, BlockCipher, CipherProvider};
use crate::suite::BulkCipher;

const GCM_NONCE_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;

/// AES-GCM cipher.
enum AesGcm {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl std::fmt::Debug for AesGcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AesGcm::Aes128(_) => f.debug_tuple("AesGcm::Aes128").finish(),
            AesGcm::Aes256(_) => f.debug_tuple("AesGcm::Aes256").finish(),
        }
    }
}

impl AesGcm {
    fn new(cipher: BulkCipher, key: &[u8]) -> Result<Self, String> {
        if key.len() != cipher.key_len() {
            return Err(format!("Invalid key size for {:?}: {}", cipher, key.len()));
        }
        match cipher {
            BulkCipher::Aes128Gcm => {
                let key = Key::<Aes128Gcm>::from_slice(key);
                Ok(AesGcm::Aes128(Box::new(Aes128Gcm::new(key))))
            }
            BulkCipher::Aes256Gcm => {
                let key = Key::<Aes256Gcm>::from_slice(key);
                Ok(AesGcm::Aes256(Box::new(Aes256Gcm::new(key))))
            }
            _ => Err(format!("Not an AEAD cipher: {:?}", cipher)),
        }
    }
}

impl AeadCipher for AesGcm {
    fn tag_len(&self) -> usize {
        GCM_TAG_LEN
    }

    fn seal(&mut self, nonce: &[u8], aad: &[u8], data: &mut Buf) -> Result<(), String> {
        if nonce.len() != GCM_NONCE_LEN {
            return Err(format!("Invalid nonce length: {}", nonce.len()));
        }
        let nonce = Nonce::from_slice(nonce);
        match self {
            AesGcm::Aes128(c) => c.encrypt_in_place(nonce, aad, data),
            AesGcm::Aes256(c) => c.encrypt_in_place(nonce, aad, data),
        }
        .map_err(|_| "AES-GCM encryption failed".to_string())
    }

    fn open(&mut self, nonce: &[u8], aad: &[u8], data: &mut Buf) -> Result<(), String> {
        if nonce.len() != GCM_NONCE_LEN {
            return Err(format!("Invalid nonce length: {}", nonce.len()));
        }
        if data.len() < GCM_TAG_LEN {
            return Err(format!("Ciphertext too short: {}", data.len()));
        }
        let nonce = Nonce::from_slice(nonce);
        // decrypt_in_place removes the tag and shortens the buffer
        match self {
            AesGcm::Aes128(c) => c.decrypt_in_place(nonce, aad, data),
            AesGcm::Aes256(c) => c.decrypt_in_place(nonce, aad, data),
        }
        .map_err(|_| "AES-GCM decryption failed".to_string())
    }
}

/// CBC mode over one of the supported block ciphers.
///
/// The cbc crate binds the IV at construction, so the key is kept and a
/// mode instance is built per record.
struct Cbc {
    cipher: BulkCipher,
    key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for Cbc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cbc").field("cipher", &self.cipher).finish()
    }
}

fn cbc_encrypt<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), String>
where
    C: BlockEncryptMut + CipherCore + KeyInit,
{
    let len = data.len();
    cbc::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| "Invalid CBC key or IV length".to_string())?
        .encrypt_padded_mut::<NoPadding>(data, len)
        .map_err(|_| "CBC data is not block aligned".to_string())?;
    Ok(())
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), String>
where
    C: BlockDecryptMut + CipherCore + KeyInit,
{
    cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|_| "Invalid CBC key or IV length".to_string())?
        .decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| "CBC data is not block aligned".to_string())?;
    Ok(())
}

impl BlockCipher for Cbc {
    fn block_len(&self) -> usize {
        self.cipher.block_len()
    }

    fn encrypt(&mut self, iv: &[u8], data: &mut [u8]) -> Result<(), String> {
        match self.cipher {
            BulkCipher::Des40Cbc => cbc_encrypt::<Des>(&self.key, iv, data),
            BulkCipher::TripleDesCbc => cbc_encrypt::<TdesEde3>(&self.key, iv, data),
            BulkCipher::Aes128Cbc => cbc_encrypt::<Aes128>(&self.key, iv, data),
            BulkCipher::Aes256Cbc => cbc_encrypt::<Aes256>(&self.key, iv, data),
            _ => Err(format!("Not a block cipher: {:?}", self.cipher)),
        }
    }

    fn decrypt(&mut self, iv: &[u8], data: &mut [u8]) -> Result<(), String> {
        match self.cipher {
            BulkCipher::Des40Cbc => cbc_decrypt::<Des>(&self.key, iv, data),
            BulkCipher::TripleDesCbc => cbc_decrypt::<TdesEde3>(&self.key, iv, data),
            BulkCipher::Aes128Cbc => cbc_decrypt::<Aes128>(&self.key, iv, data),
            BulkCipher::Aes256Cbc => cbc_decrypt::<Aes256>(&self.key, iv, data),
            _ => Err(format!("Not a block cipher: {:?}", self.cipher)),
        }
    }
}

#[derive(Debug)]
pub(super) struct RustCryptoCipherProvider;

impl CipherProvider for RustCryptoCipherProvider {
    fn create_block_cipher(
        &self,
        cipher: BulkCipher,
        key: &[u8],
    ) -> Result<Box<dyn BlockCipher>, String> {
        if !cipher.is_block() {
            return Err(format!("Not a block cipher: {:?}", cipher));
        }
        if key.len() != cipher.expanded_key_len() {
            return Err(format!("Invalid key size for {:?}: {}", cipher, key.len()));
        }
        Ok(Box::new(Cbc {
            cipher,
            key: Zeroizing::new(key.to_vec()),
        }))
    }

    fn create_aead(&self, cipher: BulkCipher, key: &[u8]) -> Result<Box<dyn AeadCipher>, String> {
        Ok(Box::new(AesGcm::new(cipher, key)?))
    }
}

pub(super) static CIPHER_PROVIDER: RustCryptoCipherProvider = RustCryptoCipherProvider;
