//! In-process stand-ins for the beacon hardware and the radio link.
//!
//! Commands, one per line on stdin:
//!
//! | Input          | Effect                                   |
//! |----------------|------------------------------------------|
//! | `up` / `down`  | orientation sample with z = 1.0 / -1.0   |
//! | `<number>`     | orientation sample with that z           |
//! | `temp <°C>`    | set the temperature reading              |
//! | `battery <V>`  | set the battery reading                  |

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context as _, Result, anyhow};
use log::{info, trace, warn};
use mac_address::MacAddress;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};
use tokio::sync::mpsc;

use crate::beacon::{Advertiser, Indicator, OrientationSample, Sensors};
use crate::codec::PAYLOAD_LEN;
use crate::messages::Sighting;

pub const DEFAULT_BATTERY_VOLTS: f32 = 3.0;
pub const DEFAULT_TEMPERATURE_CELSIUS: f32 = 22.0;

/// Address used for the simulated beacon when none is configured.
pub fn simulated_address() -> MacAddress {
    MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x05, 0x90])
}

/// Delivers every advertisement straight to the consumer as a sighting.
pub struct MediumAdvertiser {
    address: MacAddress,
    sightings: mpsc::Sender<Sighting>,
}

impl MediumAdvertiser {
    pub fn new(address: MacAddress, sightings: mpsc::Sender<Sighting>) -> Self {
        MediumAdvertiser { address, sightings }
    }
}

impl Advertiser for MediumAdvertiser {
    fn advertise(&mut self, payload: [u8; PAYLOAD_LEN]) -> Result<()> {
        self.sightings
            .try_send(Sighting::new(self.address, payload))
            .map_err(|err| anyhow!("simulated medium rejected advertisement: {err}"))
    }
}

#[derive(Debug, Clone, Copy)]
struct Readings {
    battery_volts: f32,
    temperature_celsius: f32,
}

/// Sensor readings that can be changed while the agent runs.
#[derive(Debug, Clone)]
pub struct SharedSensors(Arc<Mutex<Readings>>);

impl SharedSensors {
    pub fn new(battery_volts: f32, temperature_celsius: f32) -> Self {
        SharedSensors(Arc::new(Mutex::new(Readings {
            battery_volts,
            temperature_celsius,
        })))
    }

    fn update(&self, f: impl FnOnce(&mut Readings)) {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn read(&self) -> Readings {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_battery_volts(&self, volts: f32) {
        self.update(|r| r.battery_volts = volts);
    }

    pub fn set_temperature_celsius(&self, celsius: f32) {
        self.update(|r| r.temperature_celsius = celsius);
    }
}

impl Sensors for SharedSensors {
    fn battery_volts(&mut self) -> f32 {
        self.read().battery_volts
    }

    fn temperature_celsius(&mut self) -> f32 {
        self.read().temperature_celsius
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn show(&mut self, leds: u8) {
        trace!("LEDs {:03b}", leds);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimCommand {
    Sample(f32),
    Temperature(f32),
    Battery(f32),
}

pub fn parse_command(line: &str) -> Result<SimCommand> {
    let mut words = line.split_whitespace();
    let command = match (words.next(), words.next()) {
        (Some("up"), None) => SimCommand::Sample(1.0),
        (Some("down"), None) => SimCommand::Sample(-1.0),
        (Some("temp"), Some(value)) => SimCommand::Temperature(value.parse()?),
        (Some("battery"), Some(value)) => SimCommand::Battery(value.parse()?),
        (Some(value), None) => SimCommand::Sample(
            value
                .parse()
                .with_context(|| format!("unknown command {value:?}"))?,
        ),
        _ => return Err(anyhow!("could not parse {line:?}")),
    };
    if words.next().is_some() {
        return Err(anyhow!("trailing input in {line:?}"));
    }
    Ok(command)
}

/// Feed commands from `input` into the running agent until end of input.
pub async fn read_commands<R: AsyncBufRead + Unpin>(
    input: R,
    sensors: SharedSensors,
    samples: mpsc::Sender<OrientationSample>,
) -> Result<()> {
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(SimCommand::Sample(z)) => {
                if samples.send(OrientationSample::new(z)).await.is_err() {
                    break;
                }
            }
            Ok(SimCommand::Temperature(celsius)) => {
                info!("Temperature now {celsius} °C");
                sensors.set_temperature_celsius(celsius);
            }
            Ok(SimCommand::Battery(volts)) => {
                info!("Battery now {volts} V");
                sensors.set_battery_volts(volts);
            }
            Err(err) => warn!("{err:#}"),
        }
    }
    info!("End of input");
    Ok(())
}
