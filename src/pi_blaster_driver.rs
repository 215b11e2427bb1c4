use std::fs::OpenOptions;
use std::io::{self, Write};

use crate::driver::{Channel, Driver, MicroSeconds, MIN_PULSE};

pub const PI_BLASTER_DEVICE: &str = "/dev/pi-blaster";
/// pi-blaster expresses a pulse as a fraction of its 10 ms period.
const PERIOD_FRACTION_PER_US: f64 = 0.0001;

/// Sends pulse widths to the pi-blaster PWM daemon.
pub struct PiBlasterDriver {
    left_pin: u8,
    right_pin: u8,
    left: MicroSeconds,
    right: MicroSeconds,
    blaster: Box<dyn Write>,
}

impl PiBlasterDriver {
    pub fn open(left_pin: u8, right_pin: u8) -> io::Result<PiBlasterDriver> {
        let blaster = OpenOptions::new().write(true).open(PI_BLASTER_DEVICE)?;
        info!("Driving pins {} and {} through {}", left_pin, right_pin, PI_BLASTER_DEVICE);
        Ok(PiBlasterDriver::with_writer(left_pin, right_pin, Box::new(blaster)))
    }

    pub fn with_writer(left_pin: u8, right_pin: u8, blaster: Box<dyn Write>) -> PiBlasterDriver {
        PiBlasterDriver {
            left_pin: left_pin,
            right_pin: right_pin,
            left: MIN_PULSE,
            right: MIN_PULSE,
            blaster: blaster,
        }
    }

    fn format_pulse(pulse: MicroSeconds) -> f64 {
        pulse as f64 * PERIOD_FRACTION_PER_US
    }
}

impl Driver for PiBlasterDriver {
    fn drive(&mut self, channel: Channel, pulse: MicroSeconds) {
        let pin = match channel {
            Channel::Left => {
                self.left = pulse;
                self.left_pin
            },
            Channel::Right => {
                self.right = pulse;
                self.right_pin
            },
        };
        let message = format!("{}={:.4}\n", pin, PiBlasterDriver::format_pulse(pulse));
        let status = self.blaster.write_all(message.as_bytes())
            .and_then(|_| self.blaster.flush());
        match status {
            Ok(_) => (),
            Err(err) => error!("Unable to send {:?} drive command: {}", channel, err),
        }
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
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use num::Float;

    use crate::driver::{Channel, Driver, MIN_PULSE};
    use super::PiBlasterDriver;

    macro_rules! assert_approx_eq {
        ( $value_1:expr, $value_2:expr ) => {
            assert!(approx_eq($value_1, $value_2, 0.0000001));
        }
    }
    fn approx_eq<T: Float>(value_1: T, value_2: T, tolerance: T) -> bool {
        (value_1 - value_2).abs() < tolerance
    }

    #[derive(Clone)]
    struct SharedWriter {
        written: Rc<RefCell<Vec<u8>>>,
    }

    impl Write for SharedWriter {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.written.borrow_mut().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_format_pulse() {
        assert_approx_eq!(PiBlasterDriver::format_pulse(1000), 0.1000);
        assert_approx_eq!(PiBlasterDriver::format_pulse(1500), 0.1500);
        assert_approx_eq!(PiBlasterDriver::format_pulse(2000), 0.2000);
    }

    #[test]
    fn test_drive_writes_pins() {
        let writer = SharedWriter { written: Rc::new(RefCell::new(Vec::new())) };
        let mut driver = PiBlasterDriver::with_writer(18, 4, Box::new(writer.clone()));
        assert_eq!(driver.get_pulse(Channel::Left), MIN_PULSE);

        driver.drive(Channel::Left, 1500);
        driver.drive(Channel::Right, 1000);
        assert_eq!(driver.get_pulse(Channel::Left), 1500);
        assert_eq!(driver.get_pulse(Channel::Right), 1000);

        let written = String::from_utf8(writer.written.borrow().clone()).unwrap();
        assert_eq!(written, "18=0.1500\n4=0.1000\n");

        driver.drive(Channel::Right, 1523);
        let written = String::from_utf8(writer.written.borrow().clone()).unwrap();
        assert!(written.ends_with("\n4=0.1523\n"));
    }
}
