//! Fan policy and the on/off transition machine.

use crate::codec::Telemetry;
use crate::messages::FanCommand;

pub const DEFAULT_THRESHOLD_CELSIUS: f64 = 23.9;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FanState {
    #[default]
    Off,
    On,
}

impl FanState {
    pub fn is_on(&self) -> bool {
        *self == FanState::On
    }
}

impl From<bool> for FanState {
    fn from(on: bool) -> Self {
        if on { FanState::On } else { FanState::Off }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FanPolicy {
    pub threshold_celsius: f64,
}

impl Default for FanPolicy {
    fn default() -> Self {
        FanPolicy {
            threshold_celsius: DEFAULT_THRESHOLD_CELSIUS,
        }
    }
}

impl FanPolicy {
    pub fn new(threshold_celsius: f64) -> Self {
        FanPolicy { threshold_celsius }
    }

    /// The fan runs only while the beacon is face up and it is strictly
    /// warmer than the threshold.
    pub fn desired(&self, telemetry: &Telemetry) -> FanState {
        FanState::from(
            telemetry.fan_requested && telemetry.temperature_celsius() > self.threshold_celsius,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub desired: FanState,
    /// Set only when `desired` differs from the previous evaluation.
    pub command: Option<FanCommand>,
}

#[derive(Debug)]
pub struct FanController {
    policy: FanPolicy,
    last_dispatched: FanState,
}

impl FanController {
    pub fn new(policy: FanPolicy) -> Self {
        FanController {
            policy,
            last_dispatched: FanState::Off,
        }
    }

    pub fn policy(&self) -> &FanPolicy {
        &self.policy
    }

    pub fn last_dispatched(&self) -> FanState {
        self.last_dispatched
    }

    pub fn evaluate(&mut self, telemetry: &Telemetry) -> Decision {
        let desired = self.policy.desired(telemetry);
        let command = match (self.last_dispatched, desired) {
            (FanState::Off, FanState::On) => Some(FanCommand::On),
            (FanState::On, FanState::Off) => Some(FanCommand::Off),
            _ => None,
        };
        self.last_dispatched = desired;
        Decision { desired, command }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(fan_requested: bool, temp_deci_celsius: u8) -> Telemetry {
        Telemetry {
            battery_deci_volts: 30,
            fan_requested,
            temp_deci_celsius,
        }
    }

    #[test]
    fn test_policy_requires_both_conditions() {
        let policy = FanPolicy::default();
        assert_eq!(policy.desired(&telemetry(true, 240)), FanState::On);
        assert_eq!(policy.desired(&telemetry(false, 240)), FanState::Off);
        assert_eq!(policy.desired(&telemetry(true, 200)), FanState::Off);
    }

    #[test]
    fn test_threshold_is_strict() {
        let policy = FanPolicy::default();
        assert_eq!(policy.desired(&telemetry(true, 239)), FanState::Off);
        assert_eq!(policy.desired(&telemetry(true, 240)), FanState::On);
    }

    #[test]
    fn test_transitions_fire_once() {
        let mut controller = FanController::new(FanPolicy::default());
        assert_eq!(controller.last_dispatched(), FanState::Off);

        let first = controller.evaluate(&telemetry(true, 240));
        assert_eq!(first.command, Some(FanCommand::On));

        let repeat = controller.evaluate(&telemetry(true, 245));
        assert_eq!(repeat.desired, FanState::On);
        assert_eq!(repeat.command, None);

        let off = controller.evaluate(&telemetry(false, 245));
        assert_eq!(off.command, Some(FanCommand::Off));
        assert_eq!(controller.last_dispatched(), FanState::Off);
    }

    #[test]
    fn test_initial_off_does_not_fire() {
        let mut controller = FanController::new(FanPolicy::new(30.0));
        for temp in [100, 240, 250] {
            assert_eq!(controller.evaluate(&telemetry(true, temp)).command, None);
        }
    }
}
