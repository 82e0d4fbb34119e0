//! Retained outgoing flights for DTLS retransmission.

use std::mem;
use std::time::{Duration, Instant};

use crate::buffer::{Buf, BufferPool};
use crate::timer::{ExponentialBackoff, Timeout};
use crate::types::ContentType;
use crate::SeededRng;

/// One record of a flight, kept as plaintext.
#[derive(Debug)]
pub struct Entry {
    pub content_type: ContentType,
    /// Write epoch the record was first sent in.
    pub epoch: u16,
    pub fragment: Buf,
}

/// The records of our last flight and its retransmit timer.
#[derive(Debug)]
pub struct Flight {
    number: u8,
    entries: Vec<Entry>,
    backoff: ExponentialBackoff,
    timeout: Timeout,
}

impl Flight {
    pub fn new(start_rto: Duration, retries: usize, rng: &mut SeededRng) -> Self {
        Flight {
            number: 0,
            entries: Vec::new(),
            backoff: ExponentialBackoff::new(start_rto, retries, rng),
            timeout: Timeout::Disabled,
        }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start a new flight, forgetting the previous one.
    ///
    /// The timer is armed at the next `handle_timeout` when `retransmit`.
    pub fn begin(&mut self, number: u8, retransmit: bool, rng: &mut SeededRng, pool: &mut BufferPool) {
        debug!("Begin flight {}", number);
        self.number = number;
        self.backoff.reset(rng);
        self.clear(pool);
        self.timeout = if retransmit {
            Timeout::Unarmed
        } else {
            Timeout::Disabled
        };
    }

    pub fn save(&mut self, content_type: ContentType, epoch: u16, fragment: Buf) {
        self.entries.push(Entry {
            content_type,
            epoch,
            fragment,
        });
    }

    pub fn clear(&mut self, pool: &mut BufferPool) {
        for entry in self.entries.drain(..) {
            pool.push(entry.fragment);
        }
    }

    /// Take the entries out for resending. Hand them back with
    /// [`restore`](Self::restore).
    pub fn take(&mut self) -> Vec<Entry> {
        mem::take(&mut self.entries)
    }

    pub fn restore(&mut self, entries: Vec<Entry>) {
        self.entries = entries;
    }

    /// Keep the records for peer triggered resends but stop the timer.
    pub fn stop_timer(&mut self) {
        self.timeout = Timeout::Disabled;
    }

    pub fn arm_if_unarmed(&mut self, now: Instant) {
        if self.timeout == Timeout::Unarmed {
            debug!(
                "Flight {} timeout in: {:.03}s",
                self.number,
                self.backoff.rto().as_secs_f32()
            );
        }
        self.timeout.arm_if_unarmed(now, self.backoff.rto());
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timeout.deadline()
    }

    pub fn is_disabled(&self) -> bool {
        self.timeout == Timeout::Disabled
    }

    /// Check the timer. `Some(true)` means resend now, `Some(false)` that
    /// the retries are exhausted.
    pub fn poll_expired(&mut self, now: Instant, rng: &mut SeededRng) -> Option<bool> {
        if !self.timeout.expired(now) {
            return None;
        }
        if !self.backoff.can_retry() {
            return Some(false);
        }
        self.backoff.attempt(rng);
        debug!(
            "Re-arm flight {} timeout due to resend in {:.03}s",
            self.number,
            self.backoff.rto().as_secs_f32()
        );
        self.timeout = Timeout::Armed(now + self.backoff.rto());
        Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;

    fn rng() -> SeededRng {
        SeededRng::new(Some(9), rust_crypto::default_provider().secure_random)
    }

    #[test]
    fn retries_then_gives_up() {
        let mut rng = rng();
        let mut pool = BufferPool::default();
        let mut flight = Flight::new(Duration::from_secs(1), 2, &mut rng);
        flight.begin(1, true, &mut rng, &mut pool);
        flight.save(ContentType::Handshake, 0, Buf::from_slice(b"hello"));

        let start = Instant::now();
        flight.arm_if_unarmed(start);
        let first = flight.deadline().unwrap();
        assert_eq!(flight.poll_expired(start, &mut rng), None);

        assert_eq!(flight.poll_expired(first, &mut rng), Some(true));
        let second = flight.deadline().unwrap();
        assert!(second - first > Duration::from_millis(1500));

        assert_eq!(flight.poll_expired(second, &mut rng), Some(true));
        let third = flight.deadline().unwrap();
        assert_eq!(flight.poll_expired(third, &mut rng), Some(false));
    }

    #[test]
    fn entries_survive_resend_and_stop() {
        let mut rng = rng();
        let mut pool = BufferPool::default();
        let mut flight = Flight::new(Duration::from_secs(1), 4, &mut rng);
        flight.begin(4, true, &mut rng, &mut pool);
        flight.save(ContentType::Handshake, 0, Buf::from_slice(b"a"));
        flight.save(ContentType::ChangeCipherSpec, 0, Buf::from_slice(&[1]));

        let entries = flight.take();
        assert_eq!(entries.len(), 2);
        assert!(flight.is_empty());
        flight.restore(entries);
        assert!(!flight.is_empty());

        flight.stop_timer();
        assert!(flight.is_disabled());
        flight.arm_if_unarmed(Instant::now());
        assert_eq!(flight.deadline(), None);
        assert!(!flight.is_empty());

        flight.begin(6, false, &mut rng, &mut pool);
        assert!(flight.is_empty());
        assert!(flight.is_disabled());
    }
}
