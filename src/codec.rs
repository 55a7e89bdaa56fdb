//! Advertisement wire format shared by the beacon and the scanner.
//!
//! Manufacturer data, 5 bytes:
//!
//! | Offset | Field         | Encoding                            |
//! |--------|---------------|-------------------------------------|
//! | 0..2   | company id    | little-endian `u16`                 |
//! | 2      | battery       | volts × 10, truncated, clamped      |
//! | 3      | fan requested | `1` face up, `0` face down          |
//! | 4      | temperature   | °C × 10, truncated, clamped         |

/// Espruino's Bluetooth SIG company identifier.
/// https://bitbucket.org/bluetooth-SIG/public/src/main/assigned_numbers/company_identifiers/company_identifiers.yaml
pub const ESPRUINO_COMPANY_ID: u16 = 0x0590;

pub const IDENTITY_LEN: usize = 2;
pub const PAYLOAD_LEN: usize = IDENTITY_LEN + 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    pub battery_deci_volts: u8,
    pub fan_requested: bool,
    pub temp_deci_celsius: u8,
}

impl Telemetry {
    /// Build telemetry from native sensor units.
    pub fn from_readings(battery_volts: f32, fan_requested: bool, temperature_celsius: f32) -> Self {
        Telemetry {
            battery_deci_volts: scale_to_byte(battery_volts),
            fan_requested,
            temp_deci_celsius: scale_to_byte(temperature_celsius),
        }
    }

    pub fn battery_volts(&self) -> f64 {
        f64::from(self.battery_deci_volts) / 10.0
    }

    pub fn temperature_celsius(&self) -> f64 {
        f64::from(self.temp_deci_celsius) / 10.0
    }

    pub fn encode(&self, company_id: u16) -> [u8; PAYLOAD_LEN] {
        let [lo, hi] = company_id.to_le_bytes();
        [
            lo,
            hi,
            self.battery_deci_volts,
            u8::from(self.fan_requested),
            self.temp_deci_celsius,
        ]
    }
}

/// Multiply by ten, truncate toward zero and clamp into a byte.
///
/// Readings below zero encode as 0 and readings above 25.5 encode as 255.
/// NaN encodes as 0.
pub fn scale_to_byte(value: f32) -> u8 {
    let scaled = (value * 10.0).trunc();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, f32::from(u8::MAX)) as u8
}

/// Returns the bytes following the identity prefix, or `None` when the
/// payload is too short or carries another manufacturer's identity.
pub fn strip_identity(company_id: u16, raw: &[u8]) -> Option<&[u8]> {
    if raw.len() < PAYLOAD_LEN {
        return None;
    }
    let (identity, fields) = raw.split_at(IDENTITY_LEN);
    (identity == company_id.to_le_bytes().as_slice()).then_some(fields)
}

pub fn decode(company_id: u16, raw: &[u8]) -> Option<Telemetry> {
    strip_identity(company_id, raw).map(decode_fields)
}

/// Decode the three telemetry bytes that follow a verified identity prefix.
pub(crate) fn decode_fields(fields: &[u8]) -> Telemetry {
    Telemetry {
        battery_deci_volts: fields[0],
        fan_requested: fields[1] == 1,
        temp_deci_celsius: fields[2],
    }
}
