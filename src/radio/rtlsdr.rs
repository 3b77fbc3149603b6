//! RTL-SDR device control (receive-only).
//!
//! Opens the tuner, applies the configured frequency, sample rate and gain,
//! then runs the blocking read loop: every I/Q byte pair goes through the
//! magnitude LUT and the envelope slicer into the receiver, and the receiver
//! gets a tick between buffers so its watchdog and sweeper run on time.

use anyhow::{anyhow, bail, Result};
use rtl_sdr_rs::{DeviceId, RtlSdr, TunerGain, DEFAULT_BUF_LENGTH};

use crate::clock::Clock;
use crate::config::RadioConfig;
use crate::mqtt::EventSink;
use crate::receiver::Receiver;

use super::magnitude::MagnitudeLut;
use super::slicer::EnvelopeSlicer;

/// Consecutive read failures tolerated before the device is declared dead.
const MAX_READ_ERRORS: u32 = 10;

/// Open, configure and drain the device on the calling thread. Returns only
/// on a persistent device failure.
pub fn run<S: EventSink, C: Clock>(
    config: &RadioConfig,
    receiver: &mut Receiver<S, C>,
) -> Result<()> {
    let mut sdr = RtlSdr::open(DeviceId::Index(config.device_index))
        .map_err(|e| anyhow!("Failed to open RTL-SDR device: {}", e))?;

    sdr.reset_buffer()
        .map_err(|e| anyhow!("Failed to reset RTL-SDR buffer: {}", e))?;
    sdr.set_center_freq(config.frequency)
        .map_err(|e| anyhow!("Failed to set RTL-SDR frequency: {}", e))?;
    sdr.set_sample_rate(config.sample_rate)
        .map_err(|e| anyhow!("Failed to set RTL-SDR sample rate: {}", e))?;
    sdr.set_bias_tee(false)
        .map_err(|e| anyhow!("Failed to set bias-tee: {}", e))?;

    if config.agc {
        sdr.set_tuner_gain(TunerGain::Auto)
            .map_err(|e| anyhow!("Failed to enable AGC: {}", e))?;
    } else {
        sdr.set_tuner_gain(TunerGain::Manual(config.gain_tenths_db))
            .map_err(|e| anyhow!("Failed to set RTL-SDR gain: {}", e))?;
    }

    tracing::info!(
        "RTL-SDR configured: freq={} Hz, sample_rate={} Hz, gain={}",
        config.frequency,
        config.sample_rate,
        if config.agc {
            "auto".to_string()
        } else {
            format!("{:.1} dB", config.gain_tenths_db as f32 / 10.0)
        }
    );

    let lut = MagnitudeLut::new();
    let mut slicer = EnvelopeSlicer::new();
    let mut buf = vec![0u8; DEFAULT_BUF_LENGTH];
    let mut read_errors = 0u32;

    loop {
        match sdr.read_sync(&mut buf) {
            Ok(n) => {
                read_errors = 0;
                for pair in buf[..n].chunks_exact(2) {
                    let sample = slicer.slice(lut.magnitude(pair[0], pair[1]));
                    receiver.push_sample(sample);
                }
            }
            Err(e) => {
                read_errors += 1;
                tracing::warn!(
                    "RTL-SDR read error ({}/{}): {:?}",
                    read_errors,
                    MAX_READ_ERRORS,
                    e
                );
                if read_errors >= MAX_READ_ERRORS {
                    let _ = sdr.close();
                    bail!("RTL-SDR stopped delivering samples");
                }
            }
        }
        receiver.tick();
    }
}
