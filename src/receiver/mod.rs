//! The receive pipeline.
//!
//! One owned [`Receiver`] carries the whole chain from sliced envelope
//! samples to MQTT publishes:
//!
//! ```text
//! 0/1 samples -> chip recovery -> Manchester -> framing -> CRC + routing
//!             -> device state deltas -> publishes
//! ```
//!
//! The host feeds every sample through [`Receiver::push_sample`] and calls
//! [`Receiver::tick`] between sample buffers; the rx watchdog and the
//! supervision sweeper both run from `tick`, so no timers or signal handlers
//! are involved and the device store needs no locking.

pub mod bitclock;
pub mod crc;
pub mod devices;
pub mod events;
pub mod framer;
pub mod manchester;
pub mod packet;

use crate::clock::Clock;
use crate::mqtt::EventSink;
use bitclock::BitClock;
use crc::Brand;
use devices::{DeviceStore, KeypadState, SensorState, MAX_PHRASE_LEN};
use events::{Messages, Topics};
use framer::Framer;
use manchester::ManchesterDecoder;
use packet::Packet;

/// No valid packet for this long means the receive chain (antenna, tuner,
/// gain) has a common-mode problem. Supervisory check-ins arrive roughly
/// hourly from every sensor, so ninety quiet minutes is never legitimate.
const RX_TIMEOUT_SECS: u64 = 90 * 60;

/// Deadline armed at construction, before the controller marks the receiver
/// good; covers a host that stalls before the first buffer.
const STARTUP_RX_TIMEOUT_SECS: u64 = 3;

/// Unchanged rx status is refreshed at most this often.
const RX_STATUS_REFRESH_SECS: u64 = 60;

/// Give each sensor five supervisory intervals before flagging it lost.
const SENSOR_TIMEOUT_SECS: u64 = 90 * 5 * 60;

/// The supervision sweep runs at most once a minute.
const SWEEP_INTERVAL_SECS: u64 = 60;

/// Sensors burst several supervisory frames back to back; only the first
/// one within this window is treated as a refresh.
const SUPERVISORY_DEBOUNCE_SECS: u64 = 2;

/// Key presses this close together accumulate into a phrase.
const PHRASE_WINDOW_SECS: u64 = 2;

/// Pipeline construction parameters.
#[derive(Debug, Clone)]
pub struct ReceiverSettings {
    /// Oversampling factor: envelope samples per Manchester chip.
    pub samples_per_chip: u32,
    /// Root of the published topic tree.
    pub base_topic: String,
    /// Payload strings for the per-field sensor topics.
    pub messages: Messages,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            samples_per_chip: 8,
            base_topic: "security/sensors345".to_string(),
            messages: Messages::default(),
        }
    }
}

/// The owned receive pipeline.
pub struct Receiver<S: EventSink, C: Clock> {
    sink: S,
    clock: C,
    bit_clock: BitClock,
    manchester: ManchesterDecoder,
    framer: Framer,
    devices: DeviceStore,
    topics: Topics,
    messages: Messages,

    rx_good: bool,
    rx_status_published_at: u64,
    rx_deadline: u64,
    last_sweep: u64,

    packet_count: u64,
    error_count: u64,
}

impl<S: EventSink, C: Clock> Receiver<S, C> {
    pub fn new(sink: S, clock: C, settings: ReceiverSettings) -> Self {
        let now = clock.now();
        Self {
            sink,
            clock,
            bit_clock: BitClock::new(settings.samples_per_chip),
            manchester: ManchesterDecoder::new(),
            framer: Framer::new(),
            devices: DeviceStore::new(),
            topics: Topics::new(&settings.base_topic),
            messages: settings.messages,
            rx_good: false,
            rx_status_published_at: 0,
            rx_deadline: now + STARTUP_RX_TIMEOUT_SECS,
            last_sweep: now,
            packet_count: 0,
            error_count: 0,
        }
    }

    /// Feed one sliced envelope sample. Anything but 0 or 1 is dropped.
    pub fn push_sample(&mut self, sample: u8) {
        let level = match sample {
            0 => false,
            1 => true,
            _ => return,
        };
        if let Some(chip) = self.bit_clock.recover(level) {
            if let Some(bit) = self.manchester.decode(chip) {
                if let Some(frame) = self.framer.shift(bit) {
                    self.handle_frame(frame);
                }
            }
        }
    }

    /// Run the timed work: the rx watchdog deadline and the once-a-minute
    /// supervision sweep. Call between sample buffers.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        if now >= self.rx_deadline {
            self.set_rx_good(false);
        }
        if now.saturating_sub(self.last_sweep) >= SWEEP_INTERVAL_SECS {
            self.last_sweep = now;
            self.sweep_supervision(now);
        }
    }

    /// Publish the receiver health state and rearm the watchdog. Publishes
    /// only on a state change or when the retained value is a minute stale.
    pub fn set_rx_good(&mut self, state: bool) {
        let now = self.clock.now();
        if state != self.rx_good
            || now.saturating_sub(self.rx_status_published_at) > RX_STATUS_REFRESH_SECS
        {
            let message = if state { "OK" } else { "FAILED" };
            self.sink
                .publish(&self.topics.rx_status(), message, events::QOS_STATE_CHANGE, true);
        }
        self.rx_deadline = now + RX_TIMEOUT_SECS;
        self.rx_good = state;
        self.rx_status_published_at = now;
    }

    #[allow(dead_code)]
    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    #[allow(dead_code)]
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Classify and route one complete frame.
    ///
    /// A frame routes to the sensor path only when no keypad or key-fob
    /// interpretation validates and its serial is not a known keypad, so a
    /// keypad serial can never shadow itself with phantom sensor updates.
    fn handle_frame(&mut self, frame: u64) {
        let packet = Packet::from_frame(frame);

        let sensor_ok = crc::validate(frame, Brand::from_sof(packet.sof).polynomial());
        let keypad_ok = crc::validate(frame, crc::POLY_2GIG) && packet.is_keypad();
        let keyfob_ok = crc::validate(frame, crc::POLY_2GIG) && packet.is_keyfob();
        let any_ok = sensor_ok || keypad_ok || keyfob_ok;

        self.packet_count += 1;
        tracing::debug!(
            "{} payload {:016X} (serial {}/{:05X}, status {:02X})",
            if any_ok { "Valid" } else { "Invalid" },
            frame,
            packet.serial,
            packet.serial,
            packet.status,
        );

        if !any_ok {
            self.error_count += 1;
            tracing::warn!("{}/{} packets failed CRC", self.error_count, self.packet_count);
            return;
        }

        // A valid packet of any kind proves the receive chain works.
        self.set_rx_good(true);

        if sensor_ok && !keypad_ok && !keyfob_ok && !self.devices.is_keypad(packet.serial) {
            self.update_sensor(&packet);
        } else if keypad_ok {
            self.update_keypad(&packet);
        } else if keyfob_ok {
            self.update_keyfob(&packet);
        }
    }

    fn update_sensor(&mut self, packet: &Packet) {
        let now = self.clock.now();
        let current = SensorState {
            last_update: now,
            lost_supervision: false,
            loop1: packet.loop1(),
            loop2: packet.loop2(),
            loop3: packet.loop3(),
            tamper: packet.tamper(),
            low_battery: packet.low_battery(),
        };
        let prior = self
            .devices
            .sensor(packet.serial)
            .cloned()
            .unwrap_or_else(|| current.inverted_prior());

        // Sensors burst the supervisory bit several times in a row; treat
        // only the first frame after the debounce window as a refresh.
        let supervised = packet.supervisory()
            && now.saturating_sub(prior.last_update) > SUPERVISORY_DEBOUNCE_SECS;

        events::publish_sensor_delta(
            &self.sink,
            &self.topics,
            &self.messages,
            packet.serial,
            &prior,
            &current,
            supervised,
        );
        self.devices.insert_sensor(packet.serial, current);
    }

    fn update_keypad(&mut self, packet: &Packet) {
        // Keypads repeat their state in supervisory frames; only key presses
        // are actionable.
        if packet.supervisory() {
            return;
        }

        let now = self.clock.now();
        let mut current = KeypadState {
            last_update: now,
            lost_supervision: false,
            sequence: packet.sequence(),
            low_battery: packet.keypad_low_battery(),
            phrase: String::new(),
        };
        let prior = self
            .devices
            .keypad(packet.serial)
            .cloned()
            .unwrap_or_else(|| KeypadState::first_contact(&current));

        if current.sequence != prior.sequence {
            let nibble = packet.key_nibble();
            let label = events::keypad_key_label(nibble);
            self.sink
                .publish(&self.topics.keypad_keypress(packet.serial), label, 1, false);

            if (0x1..=0xC).contains(&nibble)
                && now.saturating_sub(prior.last_update) <= PHRASE_WINDOW_SECS
                && prior.phrase.len() < MAX_PHRASE_LEN
            {
                current.phrase = format!("{}{}", prior.phrase, label);
            } else if nibble == 0xB || (0x1..=0x9).contains(&nibble) {
                current.phrase = label.to_string();
            }
            if !current.phrase.is_empty() {
                self.sink.publish(
                    &self.topics.keypad_keyphrase(packet.serial, current.phrase.len()),
                    &current.phrase,
                    1,
                    false,
                );
            }
        } else {
            // Retransmission of the same press: keep the phrase as it is.
            current.phrase = prior.phrase;
        }

        self.devices.insert_keypad(packet.serial, current);
    }

    fn update_keyfob(&mut self, packet: &Packet) {
        // Fobs retransmit one frame dozens of times per press.
        if packet.raw == self.devices.last_keyfob_payload() {
            return;
        }
        let label = events::keyfob_key_label(packet.key_nibble());
        self.sink
            .publish(&self.topics.keyfob_keypress(packet.serial), label, 1, false);
        self.devices.set_last_keyfob_payload(packet.raw);
    }

    fn sweep_supervision(&mut self, now: u64) {
        for (serial, state) in self.devices.sensors_mut() {
            if !state.lost_supervision
                && now.saturating_sub(state.last_update) > SENSOR_TIMEOUT_SECS
            {
                state.lost_supervision = true;
                self.sink
                    .publish(&self.topics.device_status(serial), "TIMEOUT", 1, true);
            }
        }
    }
}
