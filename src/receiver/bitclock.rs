//! Chip recovery from the oversampled binary envelope.
//!
//! The envelope is sampled at several times the chip rate (8x at the default
//! 1 MS/s and 125 kchip/s). Every level transition re-centers the phase, so
//! moderate clock drift within a burst is tolerated; one chip is emitted at
//! the midpoint of each chip-wide stretch of a constant-level run.

/// Edge-aligned chip recoverer.
#[derive(Debug)]
pub struct BitClock {
    samples_per_chip: u64,
    last_level: bool,
    samples_since_edge: u64,
}

impl BitClock {
    /// `samples_per_chip` is the oversampling factor (sample rate divided by
    /// chip rate). Must be at least 2 for the midpoint to exist.
    pub fn new(samples_per_chip: u32) -> Self {
        assert!(samples_per_chip >= 2, "oversampling factor must be >= 2");
        Self {
            samples_per_chip: samples_per_chip as u64,
            last_level: false,
            samples_since_edge: 0,
        }
    }

    /// Feed one envelope sample; returns a recovered chip when the sample
    /// sits at the midpoint of a chip period.
    pub fn recover(&mut self, level: bool) -> Option<bool> {
        let mut chip = None;
        if level == self.last_level {
            self.samples_since_edge += 1;
            if self.samples_since_edge % self.samples_per_chip == self.samples_per_chip / 2 {
                chip = Some(level);
            }
        } else {
            self.samples_since_edge = 1;
        }
        self.last_level = level;
        chip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(clock: &mut BitClock, level: bool, count: usize) -> Vec<bool> {
        (0..count).filter_map(|_| clock.recover(level)).collect()
    }

    #[test]
    fn one_chip_per_period_in_a_constant_run() {
        let mut clock = BitClock::new(8);
        // Force an edge so the phase is aligned to the run's start.
        feed(&mut clock, true, 1);
        let chips = feed(&mut clock, true, 15);
        assert_eq!(chips, vec![true, true]);
    }

    #[test]
    fn edge_realigns_the_phase() {
        let mut clock = BitClock::new(8);
        feed(&mut clock, true, 6);
        // Transition mid-period: no chip was lost, and the next run is
        // measured from the edge.
        let chips = feed(&mut clock, false, 8);
        assert_eq!(chips, vec![false]);
        let chips = feed(&mut clock, true, 8);
        assert_eq!(chips, vec![true]);
    }

    #[test]
    fn emission_sits_at_the_midpoint() {
        let mut clock = BitClock::new(8);
        clock.recover(true);
        for n in 2..=16 {
            let got = clock.recover(true);
            if n == 4 || n == 12 {
                assert_eq!(got, Some(true), "expected chip at sample {n}");
            } else {
                assert_eq!(got, None, "unexpected chip at sample {n}");
            }
        }
    }
}
