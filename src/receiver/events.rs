//! Topic formatting and event emission.
//!
//! Topic tree under the configurable base (serials are decimal):
//!
//! ```text
//! <base>/rx_status
//! <base>/<serial>/status
//! <base>/sensor/<serial>/{loop1,loop2,loop3,tamper,battery}
//! <base>/keypad/<serial>/keypress
//! <base>/keypad/<serial>/keyphrase/<length>
//! <base>/keyfob/<serial>/keypress
//! ```

use crate::mqtt::EventSink;
use crate::receiver::devices::SensorState;

/// QoS for edge-triggered state changes.
pub const QOS_STATE_CHANGE: u8 = 1;
/// QoS for periodic supervisory refreshes, which subscribers may miss
/// without consequence.
pub const QOS_SUPERVISORY: u8 = 0;

/// Topic builder rooted at the configured base.
#[derive(Debug, Clone)]
pub struct Topics {
    base: String,
}

impl Topics {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn rx_status(&self) -> String {
        format!("{}/rx_status", self.base)
    }

    pub fn device_status(&self, serial: u32) -> String {
        format!("{}/{}/status", self.base, serial)
    }

    pub fn sensor_field(&self, serial: u32, field: &str) -> String {
        format!("{}/sensor/{}/{}", self.base, serial, field)
    }

    pub fn keypad_keypress(&self, serial: u32) -> String {
        format!("{}/keypad/{}/keypress", self.base, serial)
    }

    pub fn keypad_keyphrase(&self, serial: u32, length: usize) -> String {
        format!("{}/keypad/{}/keyphrase/{}", self.base, serial, length)
    }

    pub fn keyfob_keypress(&self, serial: u32) -> String {
        format!("{}/keyfob/{}/keypress", self.base, serial)
    }
}

/// Payload strings for the per-field sensor topics. Configurable so
/// subscribers like home-automation bridges can match their own vocabulary.
#[derive(Debug, Clone)]
pub struct Messages {
    pub open: String,
    pub closed: String,
    pub tamper: String,
    pub tamper_ok: String,
    pub battery_low: String,
    pub battery_ok: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            open: "OPEN".to_string(),
            closed: "CLOSED".to_string(),
            tamper: "TAMPER".to_string(),
            tamper_ok: "OK".to_string(),
            battery_low: "LOW".to_string(),
            battery_ok: "OK".to_string(),
        }
    }
}

/// Key labels for keypad frames.
pub fn keypad_key_label(nibble: u8) -> &'static str {
    match nibble {
        0x0 => "POLICE",
        0x1 => "1",
        0x2 => "2",
        0x3 => "3",
        0x4 => "4",
        0x5 => "5",
        0x6 => "6",
        0x7 => "7",
        0x8 => "8",
        0x9 => "9",
        0xA => "*",
        0xB => "0",
        0xC => "#",
        0xD => "STAY",
        0xE => "AWAY",
        _ => "FIRE",
    }
}

/// Key labels for key-fob frames. Fobs use one-hot button codes.
pub fn keyfob_key_label(nibble: u8) -> &'static str {
    match nibble {
        0x1 => "AWAY",
        0x2 => "DISARM",
        0x4 => "STAY",
        0x8 => "AUX",
        _ => "UNK",
    }
}

/// Publish every sensor field that changed, plus all of them on a debounced
/// supervisory check-in. Field order is fixed (loop1, loop2, loop3, tamper,
/// battery); downstream automations rely on it.
pub fn publish_sensor_delta<S: EventSink>(
    sink: &S,
    topics: &Topics,
    messages: &Messages,
    serial: u32,
    prior: &SensorState,
    current: &SensorState,
    supervised: bool,
) {
    let qos = if supervised { QOS_SUPERVISORY } else { QOS_STATE_CHANGE };

    let loops = [
        ("loop1", current.loop1, prior.loop1),
        ("loop2", current.loop2, prior.loop2),
        ("loop3", current.loop3, prior.loop3),
    ];
    for (field, now, before) in loops {
        if now != before || supervised {
            let message = if now { &messages.open } else { &messages.closed };
            sink.publish(&topics.sensor_field(serial, field), message, qos, true);
        }
    }

    if current.tamper != prior.tamper || supervised {
        let message = if current.tamper { &messages.tamper } else { &messages.tamper_ok };
        sink.publish(&topics.sensor_field(serial, "tamper"), message, qos, true);
    }

    if current.low_battery != prior.low_battery || supervised {
        let message = if current.low_battery {
            &messages.battery_low
        } else {
            &messages.battery_ok
        };
        sink.publish(&topics.sensor_field(serial, "battery"), message, qos, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_use_decimal_serials() {
        let topics = Topics::new("security/sensors345/");
        assert_eq!(
            topics.sensor_field(0x12345, "loop1"),
            "security/sensors345/sensor/74565/loop1"
        );
        assert_eq!(topics.rx_status(), "security/sensors345/rx_status");
        assert_eq!(topics.device_status(7), "security/sensors345/7/status");
        assert_eq!(
            topics.keypad_keyphrase(99, 3),
            "security/sensors345/keypad/99/keyphrase/3"
        );
    }

    #[test]
    fn keypad_labels_cover_all_sixteen_keys() {
        assert_eq!(keypad_key_label(0x0), "POLICE");
        assert_eq!(keypad_key_label(0x5), "5");
        assert_eq!(keypad_key_label(0xA), "*");
        assert_eq!(keypad_key_label(0xB), "0");
        assert_eq!(keypad_key_label(0xC), "#");
        assert_eq!(keypad_key_label(0xD), "STAY");
        assert_eq!(keypad_key_label(0xE), "AWAY");
        assert_eq!(keypad_key_label(0xF), "FIRE");
    }

    #[test]
    fn keyfob_labels_are_one_hot() {
        assert_eq!(keyfob_key_label(0x1), "AWAY");
        assert_eq!(keyfob_key_label(0x2), "DISARM");
        assert_eq!(keyfob_key_label(0x4), "STAY");
        assert_eq!(keyfob_key_label(0x8), "AUX");
        assert_eq!(keyfob_key_label(0x3), "UNK");
        assert_eq!(keyfob_key_label(0x0), "UNK");
    }
}
