//! sentry345 - RTL-SDR to MQTT gateway for 345 MHz security sensors.
//!
//! Listens to the 2GIG / Honeywell / Vivint wireless sensor band, decodes
//! the OOK / Manchester air protocol and republishes sensor, keypad and
//! key-fob events over MQTT. The demodulation chain runs single-threaded on
//! the SDR read loop; the only other thread drives the MQTT connection.

mod clock;
mod config;
mod mqtt;
mod radio;
mod receiver;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clock::WallClock;
use config::Config;
use mqtt::MqttPublisher;
use receiver::events::Topics;
use receiver::{Receiver, ReceiverSettings};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentry345=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::info!("Starting sentry345 v{}", VERSION);

    let config = Config::load()?;

    // The last will makes a disconnected gateway read as down.
    let will_topic = Topics::new(&config.mqtt.base_topic).rx_status();
    let (publisher, _mqtt_thread) = MqttPublisher::connect(&config.mqtt, &will_topic);

    let settings = ReceiverSettings {
        samples_per_chip: config.samples_per_chip(),
        base_topic: config.mqtt.base_topic.clone(),
        messages: config.messages.clone(),
    };
    let mut receiver = Receiver::new(publisher, WallClock, settings);

    // Mark the receiver healthy before the first buffer; if the device goes
    // quiet the watchdog walks it back to FAILED.
    receiver.set_rx_good(true);

    radio::rtlsdr::run(&config.radio, &mut receiver)
}
