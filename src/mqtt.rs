//! MQTT publish sink.
//!
//! The receiver publishes through the [`EventSink`] trait; the production
//! implementation wraps a rumqttc client with a bounded request queue. A
//! last will on the rx-status topic makes a disconnected gateway show up as
//! down to subscribers.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use rumqttc::{Client, Connection, Event, LastWill, MqttOptions, Packet, QoS};

use crate::config::MqttConfig;

/// Where decoded events go. QoS is the MQTT level (0 or 1 in practice);
/// implementations must not block the caller.
pub trait EventSink {
    fn publish(&self, topic: &str, payload: &str, qos: u8, retain: bool);
}

/// rumqttc-backed publisher. Cloning shares the underlying client.
#[derive(Clone)]
pub struct MqttPublisher {
    client: Client,
}

impl MqttPublisher {
    /// Create the client and spawn the connection driver thread. The broker
    /// connection itself is established asynchronously; publishes issued
    /// before it comes up queue in the client.
    pub fn connect(config: &MqttConfig, will_topic: &str) -> (Self, JoinHandle<()>) {
        let mut options =
            MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_last_will(LastWill::new(will_topic, "FAILED", QoS::AtLeastOnce, true));
        if !config.username.is_empty() {
            options.set_credentials(&config.username, &config.password);
        }

        let (client, connection) = Client::new(options, 64);
        let host = config.host.clone();
        let handle = thread::spawn(move || drive_connection(connection, &host));

        (Self { client }, handle)
    }
}

impl EventSink for MqttPublisher {
    fn publish(&self, topic: &str, payload: &str, qos: u8, retain: bool) {
        let qos = match qos {
            0 => QoS::AtMostOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtLeastOnce,
        };
        // try_publish keeps the demodulation path non-blocking. A dropped
        // publish is not retried; the next state change republishes.
        if let Err(e) = self.client.try_publish(topic, qos, retain, payload) {
            tracing::warn!("Dropped publish to {}: {}", topic, e);
        }
    }
}

/// Drain the connection event loop forever. rumqttc reconnects on its own;
/// errors are logged and paced so a dead broker does not spin the thread.
fn drive_connection(mut connection: Connection, host: &str) {
    for event in connection.iter() {
        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("Connected to MQTT broker at {}", host);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("MQTT connection error: {}", e);
                thread::sleep(Duration::from_secs(5));
            }
        }
    }
}
