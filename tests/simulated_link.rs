//! Beacon agent and consumer joined by the simulated medium.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fan_beacon::beacon::{BeaconAgent, OrientationSample};
use fan_beacon::codec::ESPRUINO_COMPANY_ID;
use fan_beacon::consumer::Consumer;
use fan_beacon::decision::{FanController, FanPolicy};
use fan_beacon::dispatch::Actuator;
use fan_beacon::messages::FanCommand;
use fan_beacon::scanner::Scanner;
use fan_beacon::simulate::{LogIndicator, MediumAdvertiser, SharedSensors, simulated_address};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

#[derive(Clone, Default)]
struct RecordingActuator(Arc<Mutex<Vec<FanCommand>>>);

impl Actuator for RecordingActuator {
    fn trigger(&self, command: FanCommand) {
        self.0.lock().unwrap().push(command);
    }
}

struct Link {
    samples: mpsc::Sender<OrientationSample>,
    sensors: SharedSensors,
    commands: RecordingActuator,
    tasks: Vec<JoinHandle<()>>,
}

impl Link {
    fn start(temperature_celsius: f32) -> Self {
        let (sighting_tx, sighting_rx) = mpsc::channel(32);
        let (sample_tx, sample_rx) = mpsc::channel(32);
        let sensors = SharedSensors::new(3.0, temperature_celsius);
        let commands = RecordingActuator::default();

        let consumer = Consumer::new(
            Scanner::new(simulated_address(), ESPRUINO_COMPANY_ID),
            FanController::new(FanPolicy::new(23.9)),
            commands.clone(),
        );
        let agent = BeaconAgent::new(
            MediumAdvertiser::new(simulated_address(), sighting_tx),
            sensors.clone(),
            LogIndicator,
        );

        let tasks = vec![
            tokio::spawn(consumer.run(sighting_rx)),
            tokio::spawn(agent.run(sample_rx)),
        ];
        Link {
            samples: sample_tx,
            sensors,
            commands,
            tasks,
        }
    }

    async fn sample(&self, z: f32, then_wait_ms: u64) {
        self.samples.send(OrientationSample::new(z)).await.unwrap();
        sleep(Duration::from_millis(then_wait_ms)).await;
    }

    fn commands(&self) -> Vec<FanCommand> {
        self.commands.0.lock().unwrap().clone()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[tokio::test(start_paused = true)]
async fn face_up_when_warm_turns_fan_on_once() {
    let link = Link::start(24.5);

    link.sample(1.0, 200).await;
    assert_eq!(link.commands(), vec![FanCommand::On]);

    // Periodic re-advertisements of the same state do not re-fire.
    sleep(Duration::from_secs(180)).await;
    assert_eq!(link.commands(), vec![FanCommand::On]);

    link.sample(-1.0, 200).await;
    assert_eq!(link.commands(), vec![FanCommand::On, FanCommand::Off]);
}

#[tokio::test(start_paused = true)]
async fn jitter_settles_on_last_orientation() {
    let link = Link::start(24.5);

    for z in [1.0, -1.0, 1.0, -1.0, 1.0, -1.0] {
        link.sample(z, 30).await;
    }
    sleep(Duration::from_millis(200)).await;

    assert!(link.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cool_room_keeps_fan_off_until_it_warms() {
    let link = Link::start(20.0);

    link.sample(1.0, 200).await;
    assert!(link.commands().is_empty());

    // The warmer reading goes out with the next periodic advertisement.
    link.sensors.set_temperature_celsius(25.0);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(link.commands(), vec![FanCommand::On]);
}
