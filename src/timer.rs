//! DTLS retransmission timing.

use std::time::{Duration, Instant};

use crate::SeededRng;

// Total jitter span in seconds, centered on zero.
const JITTER_RANGE: f32 = 0.5;

// RFC 6347 4.2.4.1 caps the retransmit timer at 60 seconds.
const MAX_RTO: Duration = Duration::from_secs(60);

const MIN_RTO: Duration = Duration::from_millis(50);

/// Exponential backoff for flight retransmissions.
///
/// Starts at the configured RTO and doubles for every attempt, with a small
/// random jitter so that two peers that lost the same packet do not resend
/// in lock step. After `retries` attempts [`can_retry`](Self::can_retry)
/// returns false and the handshake fails.
#[derive(Debug)]
pub struct ExponentialBackoff {
    start_rto: Duration,
    retries: usize,
    rto: Duration,
    jitter: f32,
    left: usize,
}

impl ExponentialBackoff {
    pub fn new(start_rto: Duration, retries: usize, rng: &mut SeededRng) -> Self {
        Self {
            start_rto,
            retries,
            rto: start_rto,
            jitter: Self::jitter(rng),
            left: retries,
        }
    }

    /// Restart from the initial RTO. Called for every new flight.
    pub fn reset(&mut self, rng: &mut SeededRng) {
        self.rto = self.start_rto;
        self.jitter = Self::jitter(rng);
        self.left = self.retries;
    }

    pub fn rto(&self) -> Duration {
        if self.jitter < 0.0 {
            let duration = Duration::from_secs_f32(self.jitter.abs());
            self.rto.saturating_sub(duration)
        } else {
            self.rto + Duration::from_secs_f32(self.jitter)
        }
        .clamp(MIN_RTO, MAX_RTO)
    }

    fn jitter(rng: &mut SeededRng) -> f32 {
        rng.random::<f32>() * JITTER_RANGE - (JITTER_RANGE / 2.0)
    }

    /// Consume one retry, doubling the RTO.
    pub fn attempt(&mut self, rng: &mut SeededRng) {
        let Some(n) = self.left.checked_sub(1) else {
            return;
        };

        self.left = n;
        self.jitter = Self::jitter(rng);
        self.rto = (self.rto * 2).min(MAX_RTO);
    }

    pub fn can_retry(&self) -> bool {
        self.left > 0
    }
}

/// State of a timer that is armed lazily on the next `handle_timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Not running, and will not be armed.
    Disabled,
    /// Should be armed at the next opportunity.
    Unarmed,
    /// Fires at the given instant.
    Armed(Instant),
}

impl Timeout {
    pub fn arm_if_unarmed(&mut self, now: Instant, after: Duration) {
        if *self == Timeout::Unarmed {
            *self = Timeout::Armed(now + after);
        }
    }

    pub fn expired(&self, now: Instant) -> bool {
        matches!(self, Timeout::Armed(at) if now >= *at)
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Timeout::Armed(at) => Some(*at),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::rust_crypto;

    #[test]
    fn attempts() {
        let mut rng = SeededRng::new(Some(42), rust_crypto::default_provider().secure_random);
        let mut exp = ExponentialBackoff::new(Duration::from_secs(1), 3, &mut rng);

        let n1 = exp.rto().as_millis();
        assert!(exp.can_retry());

        exp.attempt(&mut rng);
        let n2 = exp.rto().as_millis();
        assert!(n2 > n1);

        exp.attempt(&mut rng);
        let n3 = exp.rto().as_millis();
        assert!(n3 > n2);
        assert!(exp.can_retry());

        exp.attempt(&mut rng);
        let n4 = exp.rto().as_millis();
        assert!(n4 > n3);
        assert!(!exp.can_retry());

        exp.attempt(&mut rng);
        assert_eq!(exp.rto().as_millis(), n4);
        assert!(!exp.can_retry());

        exp.reset(&mut rng);
        assert!(exp.can_retry());
        assert!(exp.rto() < Duration::from_millis(1300));
    }

    #[test]
    fn rto_is_capped() {
        let mut rng = SeededRng::new(Some(1), rust_crypto::default_provider().secure_random);
        let mut exp = ExponentialBackoff::new(Duration::from_secs(40), 5, &mut rng);
        for _ in 0..5 {
            exp.attempt(&mut rng);
        }
        assert!(exp.rto() <= MAX_RTO);
    }

    #[test]
    fn timeout_arming() {
        let now = Instant::now();
        let mut t = Timeout::Unarmed;
        assert!(!t.expired(now));
        t.arm_if_unarmed(now, Duration::from_secs(1));
        assert_eq!(t.deadline(), Some(now + Duration::from_secs(1)));
        assert!(t.expired(now + Duration::from_secs(2)));

        let mut d = Timeout::Disabled;
        d.arm_if_unarmed(now, Duration::from_secs(1));
        assert_eq!(d, Timeout::Disabled);
    }
}
