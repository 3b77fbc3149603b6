//! Configuration management.
//!
//! All settings live in `~/.config/sentry345/config.ini`. A fully commented
//! default file is written on first run. After the file loads, the
//! environment variables `MQTT_HOST`, `MQTT_PORT`, `MQTT_USERNAME` and
//! `MQTT_PASSWORD` override the matching `[mqtt]` keys, which keeps broker
//! credentials out of the on-disk file in containerized setups.

use anyhow::{Context, Result};
use configparser::ini::Ini;
use std::fs;
use std::path::{Path, PathBuf};

use crate::receiver::events::Messages;

/// MQTT broker settings.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Empty string disables authentication.
    pub username: String,
    pub password: String,
    pub client_id: String,
    /// Root of the published topic tree.
    pub base_topic: String,
}

/// Tuner settings.
#[derive(Debug, Clone)]
pub struct RadioConfig {
    pub device_index: usize,
    /// Center frequency in Hz.
    pub frequency: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Manual tuner gain in tenths of a dB; ignored when agc is on.
    pub gain_tenths_db: i32,
    pub agc: bool,
}

/// Demodulator settings.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Manchester chip rate in chips per second.
    pub chip_rate: u32,
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub radio: RadioConfig,
    pub decoder: DecoderConfig,
    pub messages: Messages,
}

impl Config {
    fn defaults() -> Self {
        Self {
            mqtt: MqttConfig {
                host: "localhost".to_string(),
                port: 1883,
                username: String::new(),
                password: String::new(),
                client_id: "sentry345".to_string(),
                base_topic: "security/sensors345".to_string(),
            },
            radio: RadioConfig {
                device_index: 0,
                frequency: 345_000_000,
                sample_rate: 1_000_000,
                // R820T gain step closest to full sensitivity without
                // saturating on a nearby panel.
                gain_tenths_db: 364,
                agc: false,
            },
            decoder: DecoderConfig { chip_rate: 125_000 },
            messages: Messages::default(),
        }
    }

    /// Envelope samples per Manchester chip at the configured rates.
    pub fn samples_per_chip(&self) -> u32 {
        (self.radio.sample_rate / self.decoder.chip_rate).max(2)
    }

    /// Load the configuration:
    ///
    /// 1. Resolve `~/.config/sentry345/` and create it if missing.
    /// 2. Load `config.ini` if present, otherwise write the default file.
    /// 3. Apply `MQTT_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_dir =
            resolve_config_dir().context("Could not determine home directory (is $HOME set?)")?;
        let config_path = config_dir.join("config.ini");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config dir: {:?}", config_dir))?;
            tracing::info!("Created config directory: {:?}", config_dir);
        }

        let mut config = if config_path.exists() {
            tracing::info!("Loading config from {:?}", config_path);
            match Config::load_from_ini(&config_path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("Failed to parse config.ini, using defaults: {}", e);
                    Config::defaults()
                }
            }
        } else {
            tracing::info!("No config.ini found, creating default at {:?}", config_path);
            let config = Config::defaults();
            if let Err(e) = config.save_to_ini(&config_path) {
                tracing::warn!("Could not write default config.ini: {}", e);
            }
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an INI file, falling back to defaults for missing keys.
    fn load_from_ini(path: &Path) -> Result<Self> {
        let mut ini = Ini::new();
        ini.load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        let defaults = Config::defaults();

        let mqtt = MqttConfig {
            host: ini.get("mqtt", "host").unwrap_or(defaults.mqtt.host),
            port: ini
                .getuint("mqtt", "port")
                .ok()
                .flatten()
                .map(|v| v as u16)
                .unwrap_or(defaults.mqtt.port),
            username: ini.get("mqtt", "username").unwrap_or(defaults.mqtt.username),
            password: ini.get("mqtt", "password").unwrap_or(defaults.mqtt.password),
            client_id: ini
                .get("mqtt", "client_id")
                .unwrap_or(defaults.mqtt.client_id),
            base_topic: ini
                .get("mqtt", "base_topic")
                .unwrap_or(defaults.mqtt.base_topic),
        };

        let radio = RadioConfig {
            device_index: ini
                .getuint("radio", "device_index")
                .ok()
                .flatten()
                .map(|v| v as usize)
                .unwrap_or(defaults.radio.device_index),
            frequency: ini
                .getuint("radio", "frequency")
                .ok()
                .flatten()
                .map(|v| v as u32)
                .unwrap_or(defaults.radio.frequency),
            sample_rate: ini
                .getuint("radio", "sample_rate")
                .ok()
                .flatten()
                .map(|v| v as u32)
                .unwrap_or(defaults.radio.sample_rate),
            gain_tenths_db: ini
                .getint("radio", "gain_tenths_db")
                .ok()
                .flatten()
                .map(|v| v as i32)
                .unwrap_or(defaults.radio.gain_tenths_db),
            agc: ini
                .getbool("radio", "agc")
                .ok()
                .flatten()
                .unwrap_or(defaults.radio.agc),
        };

        let decoder = DecoderConfig {
            chip_rate: ini
                .getuint("decoder", "chip_rate")
                .ok()
                .flatten()
                .map(|v| v as u32)
                .unwrap_or(defaults.decoder.chip_rate),
        };

        let messages = Messages {
            open: ini.get("messages", "open").unwrap_or(defaults.messages.open),
            closed: ini
                .get("messages", "closed")
                .unwrap_or(defaults.messages.closed),
            tamper: ini
                .get("messages", "tamper")
                .unwrap_or(defaults.messages.tamper),
            tamper_ok: ini
                .get("messages", "tamper_ok")
                .unwrap_or(defaults.messages.tamper_ok),
            battery_low: ini
                .get("messages", "battery_low")
                .unwrap_or(defaults.messages.battery_low),
            battery_ok: ini
                .get("messages", "battery_ok")
                .unwrap_or(defaults.messages.battery_ok),
        };

        Ok(Self {
            mqtt,
            radio,
            decoder,
            messages,
        })
    }

    /// Write the configuration as an INI file with comments explaining each
    /// field.
    fn save_to_ini(&self, path: &Path) -> Result<()> {
        let content = format!(
            r#"; sentry345 configuration
; Location: {path}
;
; Edit this file to change settings. Lines starting with ; or # are comments.
; MQTT_HOST, MQTT_PORT, MQTT_USERNAME and MQTT_PASSWORD in the environment
; override the matching keys below.

[mqtt]
; Broker hostname or IP.
host = {host}

; Broker port (1883 plain, 8883 TLS terminators in front).
port = {port}

; Credentials; leave both empty for anonymous access.
username = {username}
password = {password}

; Client identifier presented to the broker.
client_id = {client_id}

; Root of the published topic tree.
base_topic = {base_topic}

[radio]
; RTL-SDR device index (for multi-dongle hosts).
device_index = {device_index}

; Center frequency in Hz. The 2GIG / Honeywell / Vivint sensor families
; transmit at 345 MHz.
frequency = {frequency}

; Sample rate in Hz.
sample_rate = {sample_rate}

; Manual tuner gain in tenths of a dB (R820T steps: 0, 9, ..., 364, ..., 496).
; Ignored when agc is on.
gain_tenths_db = {gain}

; Use the tuner's automatic gain control instead of the manual gain.
agc = {agc}

[decoder]
; Manchester chip rate in chips per second. The oversampling factor is
; sample_rate / chip_rate and must come out to at least 2.
chip_rate = {chip_rate}

[messages]
; Payload strings for the per-field sensor topics.
open = {open}
closed = {closed}
tamper = {tamper}
tamper_ok = {tamper_ok}
battery_low = {battery_low}
battery_ok = {battery_ok}
"#,
            path = path.display(),
            host = self.mqtt.host,
            port = self.mqtt.port,
            username = self.mqtt.username,
            password = self.mqtt.password,
            client_id = self.mqtt.client_id,
            base_topic = self.mqtt.base_topic,
            device_index = self.radio.device_index,
            frequency = self.radio.frequency,
            sample_rate = self.radio.sample_rate,
            gain = self.radio.gain_tenths_db,
            agc = self.radio.agc,
            chip_rate = self.decoder.chip_rate,
            open = self.messages.open,
            closed = self.messages.closed,
            tamper = self.messages.tamper,
            tamper_ok = self.messages.tamper_ok,
            battery_low = self.messages.battery_low,
            battery_ok = self.messages.battery_ok,
        );

        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(host) = non_empty_env("MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = non_empty_env("MQTT_PORT") {
            match port.parse() {
                Ok(port) => self.mqtt.port = port,
                Err(_) => tracing::warn!("Ignoring unparseable MQTT_PORT: {:?}", port),
            }
        }
        if let Some(username) = non_empty_env("MQTT_USERNAME") {
            self.mqtt.username = username;
        }
        if let Some(password) = non_empty_env("MQTT_PASSWORD") {
            self.mqtt.password = password;
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve the config directory to `~/.config/sentry345/` regardless of OS.
pub fn resolve_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("sentry345"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rates_give_eight_samples_per_chip() {
        assert_eq!(Config::defaults().samples_per_chip(), 8);
    }

    #[test]
    fn samples_per_chip_is_floored_at_two() {
        let mut config = Config::defaults();
        config.radio.sample_rate = 250_000;
        assert_eq!(config.samples_per_chip(), 2);
        config.decoder.chip_rate = 500_000;
        assert_eq!(config.samples_per_chip(), 2);
    }
}
