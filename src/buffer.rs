//! Byte buffers used for wire encoding and record processing.
//!
//! [`Buf`] wraps `Vec<u8>` and adds the big-endian and length-prefixed
//! writers the TLS wire format needs. [`BufferPool`] recycles buffers for
//! outgoing packets so steady-state record traffic does not allocate.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};

use zeroize::Zeroize;

/// Pool of reusable [`Buf`] instances.
#[derive(Default)]
pub struct BufferPool {
    free: VecDeque<Buf>,
}

impl BufferPool {
    /// Take a buffer from the pool, allocating when none is free.
    pub fn pop(&mut self) -> Buf {
        self.free.pop_front().unwrap_or_default()
    }

    /// Return a buffer to the pool. The contents are wiped first since
    /// buffers may have carried plaintext.
    pub fn push(&mut self, mut buffer: Buf) {
        buffer.wipe();
        self.free.push_front(buffer);
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("free", &self.free.len())
            .finish()
    }
}

/// Growable byte buffer.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Buf(Vec<u8>);

impl Buf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Buf(Vec::with_capacity(capacity))
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Buf(data.to_vec())
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Overwrite the contents with zeroes and clear.
    pub fn wipe(&mut self) {
        self.0.zeroize();
    }

    pub fn extend_from_slice(&mut self, other: &[u8]) {
        self.0.extend_from_slice(other);
    }

    pub fn push(&mut self, byte: u8) {
        self.0.push(byte);
    }

    pub fn resize(&mut self, len: usize, value: u8) {
        self.0.resize(len, value);
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Remove `n` bytes from the front.
    pub fn drain_front(&mut self, n: usize) {
        self.0.drain(..n);
    }

    /// Insert bytes at the front.
    pub fn prepend(&mut self, data: &[u8]) {
        self.0.splice(0..0, data.iter().copied());
    }

    pub fn put_u16(&mut self, v: u16) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u24(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_be_bytes()[1..]);
    }

    pub fn put_u48(&mut self, v: u64) {
        self.0.extend_from_slice(&v.to_be_bytes()[2..]);
    }

    /// Write a vector with a one byte length prefix.
    pub fn put_vec_u8(&mut self, data: &[u8]) {
        debug_assert!(data.len() <= u8::MAX as usize);
        self.0.push(data.len() as u8);
        self.0.extend_from_slice(data);
    }

    /// Write a vector with a two byte length prefix.
    pub fn put_vec_u16(&mut self, data: &[u8]) {
        debug_assert!(data.len() <= u16::MAX as usize);
        self.put_u16(data.len() as u16);
        self.0.extend_from_slice(data);
    }

    /// Write a vector with a three byte length prefix.
    pub fn put_vec_u24(&mut self, data: &[u8]) {
        debug_assert!(data.len() < (1 << 24));
        self.put_u24(data.len() as u32);
        self.0.extend_from_slice(data);
    }

    /// Write a two byte length prefix around whatever `f` writes.
    pub fn nested_u16(&mut self, f: impl FnOnce(&mut Buf)) {
        let start = self.0.len();
        self.put_u16(0);
        f(self);
        let len = (self.0.len() - start - 2) as u16;
        self.0[start..start + 2].copy_from_slice(&len.to_be_bytes());
    }

    /// Write a three byte length prefix around whatever `f` writes.
    pub fn nested_u24(&mut self, f: impl FnOnce(&mut Buf)) {
        let start = self.0.len();
        self.put_u24(0);
        f(self);
        let len = (self.0.len() - start - 3) as u32;
        self.0[start..start + 3].copy_from_slice(&len.to_be_bytes()[1..]);
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.0)
    }
}

impl<'a> Extend<&'a u8> for Buf {
    fn extend<T: IntoIterator<Item = &'a u8>>(&mut self, iter: T) {
        self.0.extend(iter.into_iter().copied());
    }
}

impl Deref for Buf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Buf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<[u8]> for Buf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Buf {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

// Contents may be secret, only show the length.
impl fmt::Debug for Buf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buf").field("len", &self.0.len()).finish()
    }
}

/// In-place AEAD operations append and strip the tag directly in the buffer.
impl aes_gcm::aead::Buffer for Buf {
    fn extend_from_slice(&mut self, other: &[u8]) -> Result<(), aes_gcm::aead::Error> {
        self.0.extend_from_slice(other);
        Ok(())
    }

    fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }
}

/// Conversion into a [`Buf`].
pub trait ToBuf {
    fn to_buf(self) -> Buf;
}

impl ToBuf for Vec<u8> {
    fn to_buf(self) -> Buf {
        Buf(self)
    }
}

impl ToBuf for &[u8] {
    fn to_buf(self) -> Buf {
        self.to_vec().to_buf()
    }
}
