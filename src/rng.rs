//! Seedable random number generator.
//!
//! When a seed is provided via [`Config::rng_seed`](crate::Config::rng_seed),
//! every random value the engine draws (hello randoms, premaster secrets,
//! ephemeral keys, explicit IVs, retransmit jitter) is deterministic. This
//! makes handshakes reproducible in tests. Without a seed, bytes come from
//! the crypto provider's [`SecureRandom`].

use rand::distributions::{Distribution, Standard};
use rand::rngs::StdRng;
use rand::{CryptoRng, Rng, RngCore, SeedableRng};

use crate::crypto::SecureRandom;

/// Random source for one connection.
pub struct SeededRng {
    inner: Option<StdRng>,
    secure: &'static dyn SecureRandom,
}

impl SeededRng {
    /// Create a new RNG.
    ///
    /// With `Some(seed)` the output is deterministic. With `None` all bytes
    /// are drawn from `secure`.
    pub fn new(seed: Option<u64>, secure: &'static dyn SecureRandom) -> Self {
        let inner = seed.map(StdRng::seed_from_u64);
        Self { inner, secure }
    }

    /// Generate a random value of type T.
    pub fn random<T>(&mut self) -> T
    where
        Standard: Distribution<T>,
    {
        self.gen()
    }

    /// Fill a fixed size array.
    pub fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        self.fill_bytes(&mut out);
        out
    }
}

impl RngCore for SeededRng {
    fn next_u32(&mut self) -> u32 {
        u32::from_be_bytes(self.array())
    }

    fn next_u64(&mut self) -> u64 {
        u64::from_be_bytes(self.array())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(e) = self.try_fill_bytes(dest) {
            // The provider is expected to never fail. Fall back on the OS.
            warn!("Secure random failed ({}), using thread rng", e);
            rand::thread_rng().fill_bytes(dest);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        match self.inner.as_mut() {
            Some(rng) => {
                rng.fill_bytes(dest);
                Ok(())
            }
            None => self.secure.fill(dest).map_err(rand::Error::new),
        }
    }
}

// Either a CSPRNG seeded for tests or the provider's secure random.
impl CryptoRng for SeededRng {}

impl std::fmt::Debug for SeededRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let is_seeded = self.inner.is_some();
        f.debug_struct("SeededRng")
            .field("seeded", &is_seeded)
            .finish()
    }
}
