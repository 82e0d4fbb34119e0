/// Sliding replay window for DTLS record sequence numbers (RFC 6347 4.1.2.6).
///
/// Tracks the highest authenticated sequence number and a 64-bit bitmap of
/// the records just below it. Checking and marking are separate steps: a
/// record is only marked once its MAC has been verified, so forged records
/// cannot advance the window.
///
/// Each read epoch has its own window.
#[derive(Debug, Default)]
pub struct ReplayWindow {
    max_seq: Option<u64>,
    window: u64,
}

impl ReplayWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `seqno` has not been seen and is not too old.
    pub fn is_fresh(&self, seqno: u64) -> bool {
        let Some(max_seq) = self.max_seq else {
            return true;
        };

        if seqno > max_seq {
            return true;
        }

        let offset = max_seq - seqno;
        if offset >= 64 {
            return false;
        }

        self.window & (1u64 << offset) == 0
    }

    /// Mark `seqno` as received. Call after the record authenticated.
    pub fn update(&mut self, seqno: u64) {
        let Some(max_seq) = self.max_seq else {
            self.max_seq = Some(seqno);
            self.window = 1;
            return;
        };

        if seqno > max_seq {
            let delta = seqno - max_seq;
            self.window = if delta >= 64 { 0 } else { self.window << delta };
            self.window |= 1;
            self.max_seq = Some(seqno);
        } else {
            let offset = max_seq - seqno;
            if offset < 64 {
                self.window |= 1u64 << offset;
            }
        }
    }

    #[cfg(test)]
    fn check_and_update(&mut self, seqno: u64) -> bool {
        if !self.is_fresh(seqno) {
            return false;
        }
        self.update(seqno);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_fresh_and_rejects_duplicate() {
        let mut w = ReplayWindow::new();
        assert!(w.check_and_update(0));
        assert!(!w.check_and_update(0)); // duplicate
        assert!(w.check_and_update(1));
        assert!(w.check_and_update(2));
    }

    #[test]
    fn accepts_out_of_order_within_window() {
        let mut w = ReplayWindow::new();
        assert!(w.check_and_update(10));
        assert!(w.check_and_update(8));
        assert!(!w.check_and_update(8));
        assert!(w.check_and_update(9));
    }

    #[test]
    fn rejects_too_old() {
        let mut w = ReplayWindow::new();
        assert!(w.check_and_update(100));
        // offset 64
        assert!(!w.check_and_update(36));
        // offset 63
        assert!(w.check_and_update(37));
    }

    #[test]
    fn large_jump_clears_bitmap() {
        let mut w = ReplayWindow::new();
        assert!(w.check_and_update(1));
        assert!(w.check_and_update(200));
        assert!(w.check_and_update(199));
        assert!(!w.check_and_update(1));
    }

    #[test]
    fn checking_does_not_mark() {
        let mut w = ReplayWindow::new();
        w.update(5);
        assert!(w.is_fresh(6));
        assert!(w.is_fresh(6));
        w.update(6);
        assert!(!w.is_fresh(6));
    }
}
