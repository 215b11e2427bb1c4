use crate::control::Mode;
use crate::driver::{MicroSeconds, MAX_PULSE, MIN_PULSE, NEUTRAL_PULSE};
use crate::navigation::{Degrees, Position};

enum_from_primitive! {
/// Operating request carried in the `start` field of binary command records.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StartCommand {
    Stop = 0,
    Manual = 1,
    Auto = 2,
}
}

/// Everything the ground station commands. A decoded frame replaces the previous
/// parameters as a whole.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlParameters {
    /// Raw `start` field; text frames don't carry one.
    pub start: Option<i16>,
    pub max_speed: Option<MicroSeconds>,
    pub cruise_speed: i32,
    pub desired_heading: Option<Degrees>,
    pub target: Option<Position>,
    pub kp: f64,
    /// Accepted and stored, but the steering law is proportional only.
    pub ki: f64,
    /// Accepted and stored, but the steering law is proportional only.
    pub kd: f64,
}

impl Default for ControlParameters {
    fn default() -> ControlParameters {
        ControlParameters {
            start: None,
            max_speed: None,
            cruise_speed: MIN_PULSE as i32,
            desired_heading: None,
            target: None,
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
        }
    }
}

impl ControlParameters {
    /// Upper pulse bound for the steering law.
    pub fn ceiling(&self) -> MicroSeconds {
        self.max_speed.unwrap_or(MAX_PULSE)
    }
}

/// A received speed ceiling always applies. Values above MAX_PULSE are capped there and
/// values below MIN_PULSE hold the thrusters at minimum.
pub fn max_speed_from_wire(value: i32) -> MicroSeconds {
    num::clamp(value, 0, MAX_PULSE as i32) as MicroSeconds
}

/// Snapshot of the vehicle sent back to the ground station.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TelemetryFrame {
    pub throttle: MicroSeconds,
    pub rudder: MicroSeconds,
    pub left_speed: MicroSeconds,
    pub right_speed: MicroSeconds,
    pub current_heading: Degrees,
    pub desired_heading: Degrees,
    pub position: Option<Position>,
    pub mode: Mode,
}

impl Default for TelemetryFrame {
    fn default() -> TelemetryFrame {
        TelemetryFrame {
            throttle: MIN_PULSE,
            rudder: NEUTRAL_PULSE,
            left_speed: MIN_PULSE,
            right_speed: MIN_PULSE,
            current_heading: 0.0,
            desired_heading: 0.0,
            position: None,
            mode: Mode::Idle,
        }
    }
}
