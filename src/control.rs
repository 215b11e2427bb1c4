use std::time::Duration;

use enum_primitive::FromPrimitive;

use crate::config::NavigationConfig;
use crate::driver::{MicroSeconds, MotorCommand, PulseReader, RcChannel, MAX_PULSE, MIN_PULSE,
                    NEUTRAL_PULSE};
use crate::navigation::{heading_error, initial_bearing, wrap_degrees, Degrees, Position};
use crate::steering::{mix_manual, steer};
use crate::telemetry_message::{ControlParameters, StartCommand, TelemetryFrame};
use crate::waypoint::WaypointTarget;

enum_from_primitive! {
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    Idle = 0,
    Manual = 1,
    AutoHeading = 2,
    AutoWaypoint = 3,
}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleState {
    pub position: Option<Position>,
    pub current_heading: Degrees,
    pub left_speed: MicroSeconds,
    pub right_speed: MicroSeconds,
    /// Last RC throttle pulse, only refreshed in manual mode.
    pub throttle: MicroSeconds,
    /// Last RC rudder pulse, only refreshed in manual mode.
    pub rudder: MicroSeconds,
    pub mode: Mode,
    pub target_active: bool,
}

impl Default for VehicleState {
    fn default() -> VehicleState {
        VehicleState {
            position: None,
            current_heading: 0.0,
            left_speed: MIN_PULSE,
            right_speed: MIN_PULSE,
            throttle: MIN_PULSE,
            rudder: NEUTRAL_PULSE,
            mode: Mode::Idle,
            target_active: false,
        }
    }
}


/// Navigation state machine. Owns everything the control loop mutates.
pub struct Control {
    config: NavigationConfig,
    state: VehicleState,
    parameters: ControlParameters,
    target: WaypointTarget,
    desired_heading: Option<Degrees>,
}


impl Control {
    pub fn new(config: NavigationConfig) -> Control {
        Control {
            config: config,
            state: VehicleState::default(),
            parameters: ControlParameters::default(),
            target: WaypointTarget::inactive(),
            desired_heading: None,
        }
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn parameters(&self) -> &ControlParameters {
        &self.parameters
    }

    pub fn target(&self) -> &WaypointTarget {
        &self.target
    }

    pub fn desired_heading(&self) -> Option<Degrees> {
        self.desired_heading
    }

    /**
     * Replaces the control parameters with a freshly decoded frame and switches to the
     * mode it asks for.
     */
    pub fn apply(&mut self, parameters: ControlParameters) {
        let mode = requested_mode(&parameters);
        self.parameters = parameters;

        match (mode, parameters.target) {
            (Mode::AutoWaypoint, Some(target)) => {
                self.target.activate(target);
                self.desired_heading = self.state.position.map(|here| initial_bearing(&here, &target));
            },
            _ => self.target.deactivate(),
        }
        match mode {
            Mode::AutoHeading => {
                self.desired_heading = Some(wrap_degrees(parameters.desired_heading.unwrap_or(0.0)));
            },
            Mode::Idle | Mode::Manual => self.desired_heading = None,
            Mode::AutoWaypoint => (),
        }
        self.state.target_active = self.target.active;
        self.set_mode(mode);
    }

    pub fn update_heading(&mut self, heading: Degrees) {
        self.state.current_heading = wrap_degrees(heading);
    }

    /**
     * Records the latest position. A new fix re-aims the vehicle at the active target.
     */
    pub fn update_position(&mut self, position: Option<Position>, new_fix: bool) {
        self.state.position = position;
        if !new_fix || !self.target.active {
            return;
        }
        if let Some(here) = position {
            let bearing = initial_bearing(&here, &self.target.position);
            if self.desired_heading != Some(bearing) {
                debug!("Bearing to waypoint {}", bearing);
            }
            self.desired_heading = Some(bearing);
        }
    }

    /**
     * Decides what the thrusters should do for this time slice.
     */
    pub fn tick(&mut self, rc: &mut dyn PulseReader) -> MotorCommand {
        let command = match self.state.mode {
            Mode::Idle => MotorCommand::stopped(),
            Mode::Manual => self.manual(rc),
            Mode::AutoHeading => self.auto_heading(),
            Mode::AutoWaypoint => self.auto_waypoint(),
        };

        if command.left != self.state.left_speed || command.right != self.state.right_speed {
            debug!("Motors left {} right {}", command.left, command.right);
        }
        self.state.left_speed = command.left;
        self.state.right_speed = command.right;
        command
    }

    pub fn telemetry(&self) -> TelemetryFrame {
        TelemetryFrame {
            throttle: self.state.throttle,
            rudder: self.state.rudder,
            left_speed: self.state.left_speed,
            right_speed: self.state.right_speed,
            current_heading: self.state.current_heading,
            desired_heading: self.desired_heading.unwrap_or(0.0),
            position: self.state.position,
            mode: self.state.mode,
        }
    }

    fn manual(&mut self, rc: &mut dyn PulseReader) -> MotorCommand {
        let timeout = self.config.rc_timeout;
        self.state.throttle = read_rc(rc, RcChannel::Throttle, timeout).unwrap_or(MIN_PULSE);
        self.state.rudder = read_rc(rc, RcChannel::Rudder, timeout).unwrap_or(NEUTRAL_PULSE);
        mix_manual(self.state.throttle, self.state.rudder)
    }

    fn auto_heading(&self) -> MotorCommand {
        match self.desired_heading {
            Some(desired) => self.steer_toward(desired),
            None => MotorCommand::stopped(),
        }
    }

    fn auto_waypoint(&mut self) -> MotorCommand {
        if let Some(here) = self.state.position {
            if self.target.reached(&here, self.config.stop_distance_m) {
                info!(
                    "Reached waypoint {}, {}",
                    self.target.position.latitude,
                    self.target.position.longitude);
                self.target.deactivate();
                self.state.target_active = false;
                self.desired_heading = None;
                self.set_mode(Mode::Idle);
                return MotorCommand::stopped();
            }
        }
        // Without a fix there is no bearing to follow yet
        match self.desired_heading {
            Some(desired) => self.steer_toward(desired),
            None => MotorCommand::stopped(),
        }
    }

    fn steer_toward(&self, desired: Degrees) -> MotorCommand {
        let error = heading_error(self.state.current_heading, desired, self.config.error_limit);
        steer(
            self.parameters.cruise_speed,
            self.parameters.kp,
            error.error,
            error.turn_direction,
            self.parameters.ceiling())
    }

    fn set_mode(&mut self, mode: Mode) {
        if mode != self.state.mode {
            info!("Mode {:?} -> {:?}", self.state.mode, mode);
        }
        self.state.mode = mode;
    }
}


/// Mode asked for by a command frame.
pub fn requested_mode(parameters: &ControlParameters) -> Mode {
    match parameters.start {
        Some(start) => match StartCommand::from_i16(start) {
            Some(StartCommand::Stop) => Mode::Idle,
            Some(StartCommand::Manual) => Mode::Manual,
            Some(StartCommand::Auto) => if parameters.target.is_some() {
                Mode::AutoWaypoint
            } else {
                Mode::AutoHeading
            },
            None => {
                warn!("Unknown start command {}, stopping", start);
                Mode::Idle
            },
        },
        None => if parameters.target.is_some() {
            Mode::AutoWaypoint
        } else if parameters.desired_heading.is_some() {
            Mode::AutoHeading
        } else {
            Mode::Idle
        },
    }
}


/// Reads an RC pulse, discarding timeouts and widths outside the servo range.
fn read_rc(rc: &mut dyn PulseReader, channel: RcChannel, timeout: Duration) -> Option<MicroSeconds> {
    let pulse = rc.read_pulse(channel, timeout)?;
    let micros = pulse.as_micros();
    if micros >= MIN_PULSE as u128 && micros <= MAX_PULSE as u128 {
        Some(micros as MicroSeconds)
    } else {
        None
    }
}
