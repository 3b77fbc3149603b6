//! Adaptive envelope slicing.
//!
//! Converts the magnitude stream into binary samples for the receiver.
//! The threshold adapts to the signal's dynamic range: separate exponential
//! estimates track the high and low levels, the slice point sits at their
//! midpoint, and a Schmitt-trigger hysteresis band around it prevents
//! chattering on noise near the threshold.

/// Samples of fast threshold adaptation after startup, before the estimates
/// settle and the update rate drops.
const CALIBRATION_SAMPLES: u64 = 10_000;

/// Magnitude smoothing factor. At 8 samples per chip the time constant must
/// stay well under one chip or the smoothing rounds off pulse edges.
const MAG_ALPHA: f32 = 0.25;

/// One 0/1 output per input magnitude sample.
pub struct EnvelopeSlicer {
    /// Current slice point between the level estimates.
    threshold: f32,
    /// Adaptive estimate of the carrier-on magnitude.
    high_level: f32,
    /// Adaptive estimate of the noise-floor magnitude.
    low_level: f32,
    /// Half-width of the dead zone around the threshold.
    hysteresis: f32,
    /// Exponentially smoothed magnitude.
    mag_smooth: f32,
    /// Current confirmed output level.
    current_level: bool,
    /// Total samples processed, for the calibration window.
    total_samples: u64,
}

impl EnvelopeSlicer {
    pub fn new() -> Self {
        Self {
            // Start low so weak signals are not missed while the estimates
            // converge.
            threshold: 0.08,
            high_level: 0.15,
            low_level: 0.02,
            hysteresis: 0.02,
            mag_smooth: 0.0,
            current_level: false,
            total_samples: 0,
        }
    }

    /// Slice one magnitude sample into a 0/1 envelope sample.
    pub fn slice(&mut self, magnitude: f32) -> u8 {
        self.mag_smooth = self.mag_smooth * (1.0 - MAG_ALPHA) + magnitude * MAG_ALPHA;

        let alpha = if self.total_samples < CALIBRATION_SAMPLES {
            0.01
        } else {
            0.001
        };
        self.update_levels(alpha);
        self.total_samples += 1;

        // Schmitt trigger: leaving a level requires crossing the far side of
        // the hysteresis band.
        self.current_level = if self.current_level {
            self.mag_smooth > (self.threshold - self.hysteresis)
        } else {
            self.mag_smooth > (self.threshold + self.hysteresis)
        };

        self.current_level as u8
    }

    fn update_levels(&mut self, alpha: f32) {
        if self.mag_smooth > self.threshold {
            self.high_level = self.high_level * (1.0 - alpha) + self.mag_smooth * alpha;
        } else {
            self.low_level = self.low_level * (1.0 - alpha) + self.mag_smooth * alpha;
        }

        self.threshold = ((self.low_level + self.high_level) / 2.0).clamp(0.02, 0.5);

        // Hysteresis scales with the estimated signal-noise gap; the clamps
        // keep it useful for both strong and weak signals.
        self.hysteresis = ((self.high_level - self.low_level) * 0.10).clamp(0.01, 0.08);
    }
}

impl Default for EnvelopeSlicer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(slicer: &mut EnvelopeSlicer, magnitude: f32, count: usize) -> u8 {
        let mut last = 0;
        for _ in 0..count {
            last = slicer.slice(magnitude);
        }
        last
    }

    #[test]
    fn strong_carrier_slices_high() {
        let mut slicer = EnvelopeSlicer::new();
        assert_eq!(feed(&mut slicer, 0.8, 50), 1);
    }

    #[test]
    fn noise_floor_slices_low() {
        let mut slicer = EnvelopeSlicer::new();
        feed(&mut slicer, 0.8, 50);
        assert_eq!(feed(&mut slicer, 0.01, 200), 0);
    }

    #[test]
    fn output_is_always_binary() {
        let mut slicer = EnvelopeSlicer::new();
        for n in 0..2_000 {
            let magnitude = if (n / 8) % 2 == 0 { 0.6 } else { 0.02 };
            assert!(slicer.slice(magnitude) <= 1);
        }
    }

    #[test]
    fn small_wiggles_inside_the_band_do_not_toggle() {
        let mut slicer = EnvelopeSlicer::new();
        feed(&mut slicer, 0.5, 2_000);
        let threshold = slicer.threshold;
        // Nudge just below the slice point: hysteresis holds the level.
        assert_eq!(feed(&mut slicer, threshold - 0.005, 3), 1);
    }
}
