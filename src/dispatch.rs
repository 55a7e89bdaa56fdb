//! Fire-and-forget fan triggers.

use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info};
use reqwest::StatusCode;

use crate::config::WebhookSettings;
use crate::messages::FanCommand;

/// Performs one outbound action per call. Implementations must return
/// without waiting for the action to complete.
pub trait Actuator {
    fn trigger(&self, command: FanCommand);
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn trigger(&self, command: FanCommand) {
        (**self).trigger(command)
    }
}

/// IFTTT Maker-style webhook: `GET {base_url}/trigger/{event}/with/key/{key}`.
#[derive(Clone)]
pub struct WebhookActuator {
    client: reqwest::Client,
    base_url: String,
    key: String,
    on_event: String,
    off_event: String,
}

impl WebhookActuator {
    pub fn new(settings: &WebhookSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        WebhookActuator {
            client,
            base_url: settings.base_url.clone(),
            key: settings.key.clone(),
            on_event: settings.on_event.clone(),
            off_event: settings.off_event.clone(),
        }
    }

    fn event(&self, command: FanCommand) -> &str {
        match command {
            FanCommand::On => &self.on_event,
            FanCommand::Off => &self.off_event,
        }
    }

    fn trigger_url(&self, command: FanCommand) -> String {
        format!(
            "{}/trigger/{}/with/key/{}",
            self.base_url.trim_end_matches('/'),
            self.event(command),
            self.key
        )
    }

    /// Send the request and wait for the response status.
    pub async fn send(&self, command: FanCommand) -> Result<StatusCode> {
        let response = self
            .client
            .get(self.trigger_url(command))
            .send()
            .await
            // The URL carries the webhook key.
            .map_err(reqwest::Error::without_url)?;
        let status = response.status();
        match response.text().await {
            Ok(body) => debug!("Webhook {} response: {}", self.event(command), body),
            Err(err) => debug!("Could not read webhook response body: {}", err.without_url()),
        }
        Ok(status)
    }
}

impl Actuator for WebhookActuator {
    fn trigger(&self, command: FanCommand) {
        let actuator = self.clone();
        tokio::spawn(async move {
            match actuator.send(command).await {
                Ok(status) => info!(
                    "Fan {} webhook sent ({}), status code: {}",
                    command,
                    actuator.event(command),
                    status
                ),
                Err(err) => error!("Fan {} webhook failed: {:?}", command, err),
            }
        });
    }
}

/// Logs commands without sending them anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogActuator;

impl Actuator for LogActuator {
    fn trigger(&self, command: FanCommand) {
        info!("Fan {} (no webhook configured)", command);
    }
}
