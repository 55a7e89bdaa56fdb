use std::fmt;

use mac_address::MacAddress;

/// One observed advertisement: who sent it and the raw manufacturer data,
/// identity prefix included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sighting {
    pub address: MacAddress,
    pub manufacturer_data: Vec<u8>,
}

impl Sighting {
    pub fn new(address: MacAddress, manufacturer_data: impl Into<Vec<u8>>) -> Self {
        Sighting {
            address,
            manufacturer_data: manufacturer_data.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FanCommand {
    On,
    Off,
}

impl FanCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            FanCommand::On => "on",
            FanCommand::Off => "off",
        }
    }
}

impl fmt::Display for FanCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
