use std::path::Path;

use anyhow::{Context as _, Result, bail};
use mac_address::MacAddress;
use serde_derive::Deserialize;

use crate::codec::ESPRUINO_COMPANY_ID;
use crate::decision::DEFAULT_THRESHOLD_CELSIUS;

const DEFAULT_WEBHOOK_BASE_URL: &str = "https://maker.ifttt.com";
const DEFAULT_ON_EVENT: &str = "kitchen_fan_on";
const DEFAULT_OFF_EVENT: &str = "kitchen_fan_off";
const DEFAULT_WEBHOOK_TIMEOUT_SECONDS: u64 = 10;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    pub device: Option<DeviceConfig>,
    pub webhook: Option<WebhookConfig>,
    pub policy: Option<PolicyConfig>,
    pub mqtt: Option<MqttConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct DeviceConfig {
    pub address: Option<MacAddress>,
    pub company_id: Option<u16>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct WebhookConfig {
    pub key: Option<String>,
    pub base_url: Option<String>,
    pub on_event: Option<String>,
    pub off_event: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct PolicyConfig {
    pub temperature_threshold: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub publisher_id: Option<String>,
    pub topic_path: Option<String>,
    pub keep_alive_seconds: Option<u64>,
}

/// Webhook settings with defaults filled in.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub key: String,
    pub base_url: String,
    pub on_event: String,
    pub off_event: String,
    pub timeout_seconds: u64,
}

/// Values given on the command line or through the environment. These win
/// over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub address: Option<MacAddress>,
    pub webhook_key: Option<String>,
    pub temperature_threshold: Option<f64>,
}

impl AppConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::de::from_str(contents)?)
    }

    /// Load `path`. A missing file is only an error when `required` is set.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if !required && !path.exists() {
            return Ok(AppConfig::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(address) = overrides.address {
            self.device.get_or_insert_with(Default::default).address = Some(address);
        }
        if let Some(key) = overrides.webhook_key {
            self.webhook.get_or_insert_with(Default::default).key = Some(key);
        }
        if let Some(threshold) = overrides.temperature_threshold {
            self.policy
                .get_or_insert_with(Default::default)
                .temperature_threshold = Some(threshold);
        }
    }

    pub fn target_address(&self) -> Option<MacAddress> {
        self.device.as_ref().and_then(|d| d.address)
    }

    pub fn company_id(&self) -> u16 {
        self.device
            .as_ref()
            .and_then(|d| d.company_id)
            .unwrap_or(ESPRUINO_COMPANY_ID)
    }

    pub fn temperature_threshold(&self) -> f64 {
        self.policy
            .as_ref()
            .and_then(|p| p.temperature_threshold)
            .unwrap_or(DEFAULT_THRESHOLD_CELSIUS)
    }

    /// `None` until a webhook key has been provided.
    pub fn webhook(&self) -> Option<WebhookSettings> {
        let webhook = self.webhook.as_ref()?;
        let key = webhook.key.clone().filter(|k| !k.is_empty())?;
        Some(WebhookSettings {
            key,
            base_url: webhook
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_WEBHOOK_BASE_URL.to_string()),
            on_event: webhook
                .on_event
                .clone()
                .unwrap_or_else(|| DEFAULT_ON_EVENT.to_string()),
            off_event: webhook
                .off_event
                .clone()
                .unwrap_or_else(|| DEFAULT_OFF_EVENT.to_string()),
            timeout_seconds: webhook
                .timeout_seconds
                .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_SECONDS),
        })
    }

    /// Everything the always-on scanner cannot run without.
    pub fn require_scan(&self) -> Result<(MacAddress, WebhookSettings)> {
        match (self.target_address(), self.webhook()) {
            (Some(address), Some(webhook)) => Ok((address, webhook)),
            (address, webhook) => {
                let mut missing = Vec::new();
                if address.is_none() {
                    missing.push(
                        "  beacon address: set PUCK_ADDRESS=xx:xx:xx:xx:xx:xx, pass --address, \
                         or add `address` under [device] in the config file",
                    );
                }
                if webhook.is_none() {
                    missing.push(
                        "  webhook key: set IFTTT_API_KEY=xxxxxxxx, pass --webhook-key, \
                         or add `key` under [webhook] in the config file",
                    );
                }
                bail!("missing required configuration:\n{}", missing.join("\n"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config() {
        let config_str = r#"
            [device]
            address = "AA:BB:CC:DD:EE:FF"
            company_id = 0x0590

            [webhook]
            key = "abc123"
            on_event = "fan_on"

            [policy]
            temperature_threshold = 25.0

            [mqtt]
            host = "localhost"
            port = 1883
        "#;
        let config = AppConfig::from_toml(config_str).unwrap();
        assert_eq!(
            config.target_address(),
            Some(MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]))
        );
        assert_eq!(config.company_id(), 0x0590);
        assert_eq!(config.temperature_threshold(), 25.0);
        assert!(config.mqtt.map(|m| m.host) == Some("localhost".to_string()));

        let webhook = config.webhook.clone();
        let settings = AppConfig {
            webhook,
            ..Default::default()
        }
        .webhook()
        .unwrap();
        assert_eq!(settings.on_event, "fan_on");
        assert_eq!(settings.off_event, DEFAULT_OFF_EVENT);
        assert_eq!(settings.base_url, DEFAULT_WEBHOOK_BASE_URL);
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.company_id(), ESPRUINO_COMPANY_ID);
        assert_eq!(config.temperature_threshold(), DEFAULT_THRESHOLD_CELSIUS);
        assert!(config.webhook().is_none());
        assert!(config.target_address().is_none());
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AppConfig::from_toml(
            r#"
            [device]
            address = "AA:BB:CC:DD:EE:FF"
            "#,
        )
        .unwrap();
        let address = MacAddress::new([1, 2, 3, 4, 5, 6]);
        config.apply(Overrides {
            address: Some(address),
            webhook_key: Some("from-env".to_string()),
            temperature_threshold: Some(20.5),
        });

        let (target, webhook) = config.require_scan().unwrap();
        assert_eq!(target, address);
        assert_eq!(webhook.key, "from-env");
        assert_eq!(config.temperature_threshold(), 20.5);
    }

    #[test]
    fn test_missing_requirements_are_listed() {
        let err = AppConfig::default().require_scan().unwrap_err().to_string();
        assert!(err.contains("PUCK_ADDRESS"));
        assert!(err.contains("IFTTT_API_KEY"));

        let mut config = AppConfig::default();
        config.apply(Overrides {
            webhook_key: Some(String::new()),
            address: Some(MacAddress::new([1, 2, 3, 4, 5, 6])),
            ..Default::default()
        });
        let err = config.require_scan().unwrap_err().to_string();
        assert!(!err.contains("PUCK_ADDRESS"));
        assert!(err.contains("IFTTT_API_KEY"));
    }
}
