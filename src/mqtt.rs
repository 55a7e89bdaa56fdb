use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info};
use mac_address::MacAddress;
use rumqttc::{MqttOptions, QoS};
use serde_derive::Serialize;

use crate::codec::Telemetry;
use crate::config;
use crate::decision::FanState;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Publishes every evaluation as JSON. Purely informational: nothing here
/// feeds back into the fan decision.
#[derive(Debug, Clone)]
pub struct MqttClient {
    client: rumqttc::AsyncClient,
    publisher_id: String,
    topic_path: String,
}

#[derive(Debug, Serialize)]
struct EvaluationMqttMessage {
    #[serde(rename = "id")]
    mac_address: String,
    battery_volts: f64,
    temperature_celsius: f64,
    fan_requested: bool,
    fan_on: bool,
}

impl MqttClient {
    pub fn new(config: &config::MqttConfig) -> (Self, rumqttc::EventLoop) {
        let publisher_id = config
            .publisher_id
            .clone()
            .unwrap_or_else(|| "fan-beacon".to_string());

        let mut mqttoptions = MqttOptions::new(
            publisher_id.clone(),
            config.host.clone(),
            config.port.unwrap_or(1883),
        );

        mqttoptions.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.unwrap_or(5)));

        if let (Some(username), Some(password)) =
            (config.username.as_ref(), config.password.as_ref())
        {
            mqttoptions.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = rumqttc::AsyncClient::new(mqttoptions, 10);

        (
            MqttClient {
                client,
                publisher_id,
                topic_path: config
                    .topic_path
                    .clone()
                    .unwrap_or_else(|| "fan-beacon".to_string()),
            },
            eventloop,
        )
    }

    /// Drive the connection. Must be polled for publishes to go out.
    pub async fn event_loop(mut eventloop: rumqttc::EventLoop) {
        loop {
            match eventloop.poll().await {
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                    debug!("Connection acknowledged");
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Error polling MQTT event loop: {:?}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    fn topic(&self, address: &MacAddress) -> String {
        format!(
            "{}/{}/{}",
            self.topic_path,
            self.publisher_id,
            sanitize_name(&address.to_string())
        )
    }

    /// Queue an evaluation without waiting on the broker.
    pub fn publish_evaluation(
        &self,
        address: &MacAddress,
        telemetry: &Telemetry,
        fan: FanState,
    ) -> Result<()> {
        let message = EvaluationMqttMessage {
            mac_address: address.to_string(),
            battery_volts: telemetry.battery_volts(),
            temperature_celsius: telemetry.temperature_celsius(),
            fan_requested: telemetry.fan_requested,
            fan_on: fan.is_on(),
        };
        self.client.try_publish(
            self.topic(address),
            QoS::AtMostOnce,
            false,
            serde_json::to_string(&message)?,
        )?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), rumqttc::ClientError> {
        info!("Disconnecting MQTT client");
        self.client.disconnect().await
    }
}

fn sanitize_name(name: &str) -> String {
    // Replace anything that is not alphanumeric with underscores
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("AA:BB:CC:DD:EE:01"), "aa_bb_cc_dd_ee_01");
    }

    #[test]
    fn test_topic_and_payload() {
        let config = config::MqttConfig {
            host: "localhost".to_string(),
            port: None,
            username: None,
            password: None,
            publisher_id: Some("kitchen".to_string()),
            topic_path: None,
            keep_alive_seconds: None,
        };
        let (client, _eventloop) = MqttClient::new(&config);
        let address = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x01]);
        assert_eq!(client.topic(&address), "fan-beacon/kitchen/aa_bb_cc_dd_ee_01");

        let message = EvaluationMqttMessage {
            mac_address: address.to_string(),
            battery_volts: 3.0,
            temperature_celsius: 24.5,
            fan_requested: true,
            fan_on: true,
        };
        let json: serde_json::Value = serde_json::to_value(&message).unwrap();
        assert_eq!(json["id"], "AA:BB:CC:DD:EE:01");
        assert_eq!(json["temperature_celsius"], 24.5);
        assert_eq!(json["fan_on"], true);
    }
}
