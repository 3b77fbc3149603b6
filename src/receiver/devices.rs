//! Per-device state tracking.
//!
//! One map keyed by 20-bit serial holds a tagged entry per device, so a
//! serial can never be a sensor and a keypad at the same time. Entries are
//! created lazily on the first valid frame and never removed; the timeout
//! sweeper only flips supervision flags. The key-fob slot is global and
//! single-valued since fobs retransmit one frame many times.

use std::collections::HashMap;

/// Longest accumulated keypad phrase.
pub const MAX_PHRASE_LEN: usize = 10;

/// Last-known state of a door/window/motion sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorState {
    pub last_update: u64,
    pub lost_supervision: bool,
    pub loop1: bool,
    pub loop2: bool,
    pub loop3: bool,
    pub tamper: bool,
    pub low_battery: bool,
}

impl SensorState {
    /// Synthetic prior for a serial seen for the first time: the complement
    /// of the current state, so every field reads as changed and gets
    /// published.
    pub fn inverted_prior(&self) -> SensorState {
        SensorState {
            last_update: 0,
            lost_supervision: !self.lost_supervision,
            loop1: !self.loop1,
            loop2: !self.loop2,
            loop3: !self.loop3,
            tamper: !self.tamper,
            low_battery: !self.low_battery,
        }
    }
}

/// Last-known state of a wireless keypad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypadState {
    pub last_update: u64,
    pub lost_supervision: bool,
    /// 4-bit rolling counter; repeated transmissions of one key press carry
    /// the same value.
    pub sequence: u8,
    pub low_battery: bool,
    /// Digits typed in quick succession, capped at [`MAX_PHRASE_LEN`].
    pub phrase: String,
}

impl KeypadState {
    /// Synthetic prior for a keypad seen for the first time. The sequence
    /// value is outside the 4-bit range so the first frame always registers
    /// as a new key press.
    pub fn first_contact(current: &KeypadState) -> KeypadState {
        KeypadState {
            last_update: 0,
            lost_supervision: false,
            sequence: 0xFF,
            low_battery: !current.low_battery,
            phrase: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DeviceEntry {
    Sensor(SensorState),
    Keypad(KeypadState),
}

/// Serial-keyed store for all tracked devices plus the key-fob slot.
#[derive(Debug, Default)]
pub struct DeviceStore {
    devices: HashMap<u32, DeviceEntry>,
    last_keyfob_payload: u64,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_keypad(&self, serial: u32) -> bool {
        matches!(self.devices.get(&serial), Some(DeviceEntry::Keypad(_)))
    }

    pub fn sensor(&self, serial: u32) -> Option<&SensorState> {
        match self.devices.get(&serial) {
            Some(DeviceEntry::Sensor(state)) => Some(state),
            _ => None,
        }
    }

    pub fn keypad(&self, serial: u32) -> Option<&KeypadState> {
        match self.devices.get(&serial) {
            Some(DeviceEntry::Keypad(state)) => Some(state),
            _ => None,
        }
    }

    pub fn insert_sensor(&mut self, serial: u32, state: SensorState) {
        self.devices.insert(serial, DeviceEntry::Sensor(state));
    }

    pub fn insert_keypad(&mut self, serial: u32, state: KeypadState) {
        self.devices.insert(serial, DeviceEntry::Keypad(state));
    }

    /// All sensor entries, for the supervision sweep.
    pub fn sensors_mut(&mut self) -> impl Iterator<Item = (u32, &mut SensorState)> {
        self.devices.iter_mut().filter_map(|(serial, entry)| match entry {
            DeviceEntry::Sensor(state) => Some((*serial, state)),
            DeviceEntry::Keypad(_) => None,
        })
    }

    pub fn last_keyfob_payload(&self) -> u64 {
        self.last_keyfob_payload
    }

    pub fn set_last_keyfob_payload(&mut self, payload: u64) {
        self.last_keyfob_payload = payload;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_serial_holds_one_entry_at_a_time() {
        let mut store = DeviceStore::new();
        store.insert_sensor(
            42,
            SensorState {
                last_update: 10,
                lost_supervision: false,
                loop1: true,
                loop2: false,
                loop3: false,
                tamper: false,
                low_battery: false,
            },
        );
        assert!(store.sensor(42).is_some());
        assert!(!store.is_keypad(42));

        store.insert_keypad(
            42,
            KeypadState {
                last_update: 20,
                lost_supervision: false,
                sequence: 3,
                low_battery: false,
                phrase: String::new(),
            },
        );
        assert!(store.sensor(42).is_none());
        assert!(store.is_keypad(42));
    }

    #[test]
    fn inverted_prior_flips_every_field() {
        let current = SensorState {
            last_update: 99,
            lost_supervision: false,
            loop1: true,
            loop2: false,
            loop3: true,
            tamper: false,
            low_battery: true,
        };
        let prior = current.inverted_prior();
        assert_eq!(prior.last_update, 0);
        assert!(prior.lost_supervision);
        assert!(!prior.loop1);
        assert!(prior.loop2);
        assert!(!prior.loop3);
        assert!(prior.tamper);
        assert!(!prior.low_battery);
    }
}
