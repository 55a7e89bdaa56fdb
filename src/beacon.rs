//! Beacon agent: debounces orientation into the fan-request flag and keeps
//! the advertisement current.
//!
//! ```text
//!   motion samples ──▶ DeferredTask (100 ms quiet) ──▶ commit flag ─┐
//!                                                                   ├──▶ encode ──▶ Advertiser
//!   60 s interval ───────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one task; timers are `select!` branches, so a new
//! sample and an expiring commit can never interleave.

use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};

use crate::codec::{ESPRUINO_COMPANY_ID, PAYLOAD_LEN, Telemetry};
use crate::debounce::DeferredTask;

pub const QUIET_PERIOD: Duration = Duration::from_millis(100);
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(60);

const BLINK_STEP: Duration = Duration::from_millis(30);
const BLINK_STEPS: u8 = 25;
const LED_COUNT: u8 = 3;

// ───────────────────────────────────────────────────────────────
// Ports
// ───────────────────────────────────────────────────────────────

/// Puts a payload on the air, replacing the previous advertisement.
pub trait Advertiser {
    fn advertise(&mut self, payload: [u8; PAYLOAD_LEN]) -> Result<()>;
}

/// Synchronous sensor reads in native units.
pub trait Sensors {
    fn battery_volts(&mut self) -> f32;
    fn temperature_celsius(&mut self) -> f32;
}

/// LED bank. Bit `n` of `leds` lights LED `n + 1`.
pub trait Indicator {
    fn show(&mut self, leds: u8);
}

// ───────────────────────────────────────────────────────────────
// Samples
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
    /// Vertical-axis acceleration; positive when the beacon faces up.
    pub z: f32,
    pub taken_at: Instant,
}

impl OrientationSample {
    pub fn new(z: f32) -> Self {
        OrientationSample {
            z,
            taken_at: Instant::now(),
        }
    }

    /// Exactly zero counts as face up.
    pub fn is_face_up(&self) -> bool {
        self.z >= 0.0
    }
}

/// Startup acknowledgment: one LED at a time in rotation, then all off.
#[derive(Debug, Default)]
pub struct StartupBlink {
    step: u8,
}

impl StartupBlink {
    pub fn is_done(&self) -> bool {
        self.step > BLINK_STEPS
    }
}

impl Iterator for StartupBlink {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let leds = match self.step {
            s if s < BLINK_STEPS => 1 << (s % LED_COUNT),
            s if s == BLINK_STEPS => 0,
            _ => return None,
        };
        self.step += 1;
        Some(leds)
    }
}

// ───────────────────────────────────────────────────────────────
// Agent
// ───────────────────────────────────────────────────────────────

pub struct BeaconAgent<A, S, I> {
    advertiser: A,
    sensors: S,
    indicator: I,
    company_id: u16,
    fan_requested: bool,
    orientation: DeferredTask<OrientationSample>,
    broadcast_interval: Duration,
}

impl<A: Advertiser, S: Sensors, I: Indicator> BeaconAgent<A, S, I> {
    pub fn new(advertiser: A, sensors: S, indicator: I) -> Self {
        BeaconAgent {
            advertiser,
            sensors,
            indicator,
            company_id: ESPRUINO_COMPANY_ID,
            fan_requested: false,
            orientation: DeferredTask::new(QUIET_PERIOD),
            broadcast_interval: BROADCAST_INTERVAL,
        }
    }

    pub fn with_company_id(mut self, company_id: u16) -> Self {
        self.company_id = company_id;
        self
    }

    pub fn with_timing(mut self, quiet_period: Duration, broadcast_interval: Duration) -> Self {
        self.orientation = DeferredTask::new(quiet_period);
        self.broadcast_interval = broadcast_interval;
        self
    }

    pub fn fan_requested(&self) -> bool {
        self.fan_requested
    }

    /// Restart the quiet period with `sample` as the candidate orientation.
    pub fn on_orientation_sample(&mut self, sample: OrientationSample) {
        self.orientation.schedule(sample);
    }

    pub fn encode(&mut self) -> [u8; PAYLOAD_LEN] {
        Telemetry::from_readings(
            self.sensors.battery_volts(),
            self.fan_requested,
            self.sensors.temperature_celsius(),
        )
        .encode(self.company_id)
    }

    /// Advertise the current readings. Failures wait for the next tick.
    pub fn broadcast_tick(&mut self) {
        let payload = self.encode();
        match self.advertiser.advertise(payload) {
            Ok(()) => debug!("Advertising {:02x?}", payload),
            Err(err) => warn!("Advertising failed, retrying on next update: {:?}", err),
        }
    }

    fn commit(&mut self, sample: OrientationSample) {
        self.fan_requested = sample.is_face_up();
        info!(
            "Orientation settled (z = {}), fan requested: {}",
            sample.z, self.fan_requested
        );
        self.broadcast_tick();
    }

    /// Run until the task is dropped. A closed motion channel only stops
    /// orientation updates; periodic advertising carries on.
    pub async fn run(mut self, mut samples: mpsc::Receiver<OrientationSample>) {
        let mut blink = StartupBlink::default();
        let mut blink_tick = interval(BLINK_STEP);
        let mut broadcast_tick = interval_at(
            Instant::now() + self.broadcast_interval,
            self.broadcast_interval,
        );
        broadcast_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut samples_open = true;

        self.broadcast_tick();

        loop {
            tokio::select! {
                sample = samples.recv(), if samples_open => match sample {
                    Some(sample) => self.on_orientation_sample(sample),
                    None => {
                        debug!("Motion source closed");
                        samples_open = false;
                    }
                },
                sample = self.orientation.expired() => self.commit(sample),
                _ = broadcast_tick.tick() => self.broadcast_tick(),
                _ = blink_tick.tick(), if !blink.is_done() => {
                    if let Some(leds) = blink.next() {
                        self.indicator.show(leds);
                    }
                }
            }
        }
    }
}
