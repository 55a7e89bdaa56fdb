use std::collections::HashMap;

use log::trace;
use mac_address::MacAddress;

use crate::codec::{self, Telemetry};
use crate::messages::Sighting;

/// Scan lifecycle: start once, on the first powered-on signal, and never stop.
#[derive(Debug, Default)]
pub struct ScanSession {
    started: bool,
}

impl ScanSession {
    /// Returns true when the caller should start scanning now.
    pub fn on_medium_state(&mut self, powered_on: bool) -> bool {
        if powered_on && !self.started {
            self.started = true;
            return true;
        }
        false
    }

    pub fn is_scanning(&self) -> bool {
        self.started
    }
}

/// Filters sightings down to the target beacon and suppresses repeats.
#[derive(Debug)]
pub struct Scanner {
    target: MacAddress,
    company_id: u16,
    last_seen: HashMap<MacAddress, Vec<u8>>,
}

impl Scanner {
    pub fn new(target: MacAddress, company_id: u16) -> Self {
        Scanner {
            target,
            company_id,
            last_seen: HashMap::new(),
        }
    }

    pub fn target(&self) -> MacAddress {
        self.target
    }

    /// Returns telemetry only for target sightings whose bytes differ from
    /// the previous sighting of the same address.
    ///
    /// The comparison is byte-for-byte, so battery drift alone still counts
    /// as a change.
    pub fn on_sighting(&mut self, sighting: &Sighting) -> Option<Telemetry> {
        if sighting.address != self.target {
            return None;
        }
        let Some(fields) = codec::strip_identity(self.company_id, &sighting.manufacturer_data)
        else {
            trace!("Ignoring foreign payload from {}", sighting.address);
            return None;
        };

        let changed = self
            .last_seen
            .get(&sighting.address)
            .is_none_or(|previous| previous.as_slice() != fields);
        self.last_seen.insert(sighting.address, fields.to_vec());

        changed.then(|| codec::decode_fields(fields))
    }

    pub fn last_seen(&self, address: &MacAddress) -> Option<&[u8]> {
        self.last_seen.get(address).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ESPRUINO_COMPANY_ID;

    const TARGET: [u8; 6] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x01];

    fn scanner() -> Scanner {
        Scanner::new(MacAddress::new(TARGET), ESPRUINO_COMPANY_ID)
    }

    fn sighting(data: &[u8]) -> Sighting {
        Sighting::new(MacAddress::new(TARGET), data)
    }

    #[test]
    fn test_session_starts_once() {
        let mut session = ScanSession::default();
        assert!(!session.on_medium_state(false));
        assert!(!session.is_scanning());
        assert!(session.on_medium_state(true));
        assert!(!session.on_medium_state(false));
        assert!(!session.on_medium_state(true));
        assert!(session.is_scanning());
    }

    #[test]
    fn test_ignores_other_addresses() {
        let mut scanner = scanner();
        let other = Sighting::new(
            MacAddress::new([0, 0, 0, 0, 0, 1]),
            [0x90, 0x05, 30, 1, 240],
        );
        assert_eq!(scanner.on_sighting(&other), None);
        assert_eq!(scanner.last_seen(&other.address), None);
    }

    #[test]
    fn test_ignores_foreign_identity() {
        let mut scanner = scanner();
        assert_eq!(scanner.on_sighting(&sighting(&[0x4C, 0x00, 30, 1, 240])), None);
        assert_eq!(scanner.on_sighting(&sighting(&[0x90, 0x05])), None);
        assert_eq!(scanner.last_seen(&MacAddress::new(TARGET)), None);
    }

    #[test]
    fn test_repeats_are_suppressed() {
        let mut scanner = scanner();
        let first = scanner.on_sighting(&sighting(&[0x90, 0x05, 30, 1, 240]));
        assert!(first.is_some());
        assert_eq!(scanner.on_sighting(&sighting(&[0x90, 0x05, 30, 1, 240])), None);
        assert_eq!(scanner.on_sighting(&sighting(&[0x90, 0x05, 30, 1, 240])), None);
    }

    #[test]
    fn test_battery_drift_counts_as_change() {
        let mut scanner = scanner();
        scanner.on_sighting(&sighting(&[0x90, 0x05, 30, 1, 240]));
        let drifted = scanner.on_sighting(&sighting(&[0x90, 0x05, 29, 1, 240]));
        assert_eq!(drifted.map(|t| t.battery_deci_volts), Some(29));
    }

    #[test]
    fn test_compares_against_latest_sighting() {
        let mut scanner = scanner();
        scanner.on_sighting(&sighting(&[0x90, 0x05, 30, 1, 240]));
        scanner.on_sighting(&sighting(&[0x90, 0x05, 30, 0, 240]));
        assert!(scanner.on_sighting(&sighting(&[0x90, 0x05, 30, 1, 240])).is_some());
        assert_eq!(
            scanner.last_seen(&MacAddress::new(TARGET)),
            Some(&[30, 1, 240][..])
        );
    }
}
