//! Sync-pattern framing of the decoded bit stream.
//!
//! Frames are delimited on the wire by a run of fifteen one bits followed by
//! a zero. The framer shifts every data bit into a 64-bit register; when the
//! top sixteen bits read 0xFFFE, the register holds one complete frame.

/// Top sixteen bits of the register.
pub const SYNC_MASK: u64 = 0xFFFF_0000_0000_0000;

/// Fifteen ones and a zero.
pub const SYNC_PATTERN: u64 = 0xFFFE_0000_0000_0000;

/// 64-bit sliding shift register.
#[derive(Debug, Default)]
pub struct Framer {
    register: u64,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift one data bit in. Returns the completed frame when the sync
    /// pattern lands in the top bits; the register is zeroed afterwards so
    /// the frame's own bits can never participate in a second match.
    pub fn shift(&mut self, bit: bool) -> Option<u64> {
        self.register = (self.register << 1) | bit as u64;
        if self.register & SYNC_MASK == SYNC_PATTERN {
            let frame = self.register;
            self.register = 0;
            Some(frame)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_bits(framer: &mut Framer, value: u64, count: u32) -> Vec<u64> {
        let mut frames = Vec::new();
        for i in (0..count).rev() {
            if let Some(frame) = framer.shift((value >> i) & 1 == 1) {
                frames.push(frame);
            }
        }
        frames
    }

    #[test]
    fn sync_followed_by_zero_payload_yields_one_frame() {
        let mut framer = Framer::new();
        let frames = push_bits(&mut framer, SYNC_PATTERN, 64);
        assert_eq!(frames, vec![SYNC_PATTERN]);

        // Register was zeroed on emission: 48 more zero bits produce nothing.
        let frames = push_bits(&mut framer, 0, 48);
        assert!(frames.is_empty());
    }

    #[test]
    fn frame_emitted_only_when_sync_reaches_top() {
        let mut framer = Framer::new();
        let frame = SYNC_PATTERN | 0x0000_A123_4580_1234;
        // Leading zeros keep earlier register states from matching.
        push_bits(&mut framer, 0, 8);
        let frames = push_bits(&mut framer, frame, 64);
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn long_one_run_matches_only_after_a_zero_delimits_it() {
        let mut framer = Framer::new();
        // Sixteen ones followed by zeros: no match while the run still fills
        // the whole sync window.
        let frames = push_bits(&mut framer, 0xFFFF_0000_0000_0000, 64);
        assert!(frames.is_empty());
        // One more zero shifts the oldest one out, leaving fifteen ones and a
        // zero on top: the sync suffix of the run.
        assert!(framer.shift(false).is_some());
    }
}
