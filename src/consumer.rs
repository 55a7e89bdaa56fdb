use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::decision::{Decision, FanController};
use crate::dispatch::Actuator;
use crate::messages::Sighting;
use crate::mqtt::MqttClient;
use crate::scanner::Scanner;

/// Per-sighting pipeline: filter, decode, compare, decide, dispatch.
///
/// Owns all consumer-side state. Sightings are handled one at a time, to
/// completion, so no locking is needed.
pub struct Consumer<A> {
    scanner: Scanner,
    controller: FanController,
    actuator: A,
    diagnostics: Option<MqttClient>,
}

impl<A: Actuator> Consumer<A> {
    pub fn new(scanner: Scanner, controller: FanController, actuator: A) -> Self {
        Consumer {
            scanner,
            controller,
            actuator,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, mqtt: MqttClient) -> Self {
        self.diagnostics = Some(mqtt);
        self
    }

    pub fn controller(&self) -> &FanController {
        &self.controller
    }

    /// Returns the decision when the sighting reached the decision engine.
    pub fn handle_sighting(&mut self, sighting: &Sighting) -> Option<Decision> {
        let telemetry = self.scanner.on_sighting(sighting)?;
        let decision = self.controller.evaluate(&telemetry);

        debug!(
            "battery: {:.1}v, fan on: {}, temp: {:.1}",
            telemetry.battery_volts(),
            decision.desired.is_on(),
            telemetry.temperature_celsius()
        );
        if let Some(mqtt) = &self.diagnostics {
            if let Err(err) = mqtt.publish_evaluation(&sighting.address, &telemetry, decision.desired)
            {
                warn!("Could not publish diagnostics: {:?}", err);
            }
        }

        if let Some(command) = decision.command {
            info!("Switching fan {}", command);
            self.actuator.trigger(command);
        }
        Some(decision)
    }

    pub async fn run(mut self, mut sightings: mpsc::Receiver<Sighting>) {
        info!("Watching for beacon {}", self.scanner.target());
        while let Some(sighting) = sightings.recv().await {
            self.handle_sighting(&sighting);
        }
        info!("Sighting stream closed");
    }
}
