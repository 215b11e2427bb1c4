use std::time::Duration;

pub type MicroSeconds = u16;

pub const MIN_PULSE: MicroSeconds = 1000;
pub const NEUTRAL_PULSE: MicroSeconds = 1500;
pub const MAX_PULSE: MicroSeconds = 2000;

/// Thrust actuator channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

/// RC receiver inputs, only read in manual mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RcChannel {
    Throttle,
    Rudder,
}

/// A pair of motor pulse widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotorCommand {
    pub left: MicroSeconds,
    pub right: MicroSeconds,
}

impl MotorCommand {
    pub fn stopped() -> MotorCommand {
        MotorCommand {
            left: MIN_PULSE,
            right: MIN_PULSE,
        }
    }
}

/// Provides an interface to drive the thrusters.
pub trait Driver {
    fn drive(&mut self, channel: Channel, pulse: MicroSeconds);
    fn get_pulse(&self, channel: Channel) -> MicroSeconds;
}

/// Measures a pulse on an RC input, waiting no longer than `timeout`.
pub trait PulseReader {
    fn read_pulse(&mut self, channel: RcChannel, timeout: Duration) -> Option<Duration>;

    /// False when no receiver is wired up at all.
    fn connected(&self) -> bool {
        true
    }
}

/// Stands in for an RC receiver when none is wired up; every read times out.
pub struct NoRcInput;

impl PulseReader for NoRcInput {
    fn read_pulse(&mut self, _channel: RcChannel, _timeout: Duration) -> Option<Duration> {
        None
    }

    fn connected(&self) -> bool {
        false
    }
}

/// Remembers and logs the commanded pulses instead of driving hardware.
pub struct LoggingDriver {
    left: MicroSeconds,
    right: MicroSeconds,
}

impl LoggingDriver {
    pub fn new() -> LoggingDriver {
        LoggingDriver {
            left: MIN_PULSE,
            right: MIN_PULSE,
        }
    }
}

impl Driver for LoggingDriver {
    fn drive(&mut self, channel: Channel, pulse: MicroSeconds) {
        let previous = match channel {
            Channel::Left => &mut self.left,
            Channel::Right => &mut self.right,
        };
        if *previous != pulse {
            info!("{:?} motor {} us", channel, pulse);
        }
        *previous = pulse;
    }

    fn get_pulse(&self, channel: Channel) -> MicroSeconds {
        match channel {
            Channel::Left => self.left,
            Channel::Right => self.right,
        }
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Channel, Driver, LoggingDriver, NoRcInput, PulseReader, RcChannel, MIN_PULSE};

    #[test]
    fn test_logging_driver_remembers_pulses() {
        let mut driver = LoggingDriver::new();
        assert_eq!(driver.get_pulse(Channel::Left), MIN_PULSE);
        driver.drive(Channel::Left, 1600);
        driver.drive(Channel::Right, 1400);
        assert_eq!(driver.get_pulse(Channel::Left), 1600);
        assert_eq!(driver.get_pulse(Channel::Right), 1400);
    }

    #[test]
    fn test_no_rc_input_times_out() {
        let mut rc = NoRcInput;
        assert!(rc.read_pulse(RcChannel::Throttle, Duration::from_millis(25)).is_none());
        assert!(!rc.connected());
    }
}
