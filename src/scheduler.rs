/**
 * The cooperative control loop: sensors, commands, navigation and telemetry on one thread.
 */
use std::thread;
use std::time::{Duration, Instant};

use crate::config::ControllerConfig;
use crate::control::{Control, Mode};
use crate::driver::{Channel, Driver, PulseReader};
use crate::protocol::{encode_telemetry, CommandDecoder, Framing};
use crate::telemetry_provider::Sensors;
use crate::transport::Transport;

/// Largest chunk read from the link per pass.
const LINK_READ_SIZE: usize = 64;
const IDLE_SLEEP: Duration = Duration::from_millis(1);


/// Millisecond counter that wraps around at u32::MAX.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock { start: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the wraparound
        self.start.elapsed().as_millis() as u32
    }
}


/// Fires at most once per period, surviving counter wraparound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    period_ms: u32,
    last_ms: u32,
}

impl Interval {
    pub fn new(period_ms: u32, now_ms: u32) -> Interval {
        Interval {
            period_ms: period_ms,
            last_ms: now_ms,
        }
    }

    pub fn elapsed(&mut self, now_ms: u32) -> bool {
        if now_ms.wrapping_sub(self.last_ms) >= self.period_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }
}


pub struct Scheduler {
    control: Control,
    sensors: Box<dyn Sensors>,
    driver: Box<dyn Driver>,
    rc: Box<dyn PulseReader>,
    link: Box<dyn Transport>,
    clock: Box<dyn Clock>,
    decoder: CommandDecoder,
    navigation_interval: Interval,
    telemetry_interval: Interval,
    reply_on_command: bool,
}


impl Scheduler {
    pub fn new(
        config: &ControllerConfig,
        sensors: Box<dyn Sensors>,
        driver: Box<dyn Driver>,
        rc: Box<dyn PulseReader>,
        link: Box<dyn Transport>,
        clock: Box<dyn Clock>,
    ) -> Scheduler {
        let now = clock.now_ms();
        Scheduler {
            control: Control::new(config.navigation),
            sensors: sensors,
            driver: driver,
            rc: rc,
            link: link,
            clock: clock,
            decoder: CommandDecoder::new(config.framing),
            navigation_interval: Interval::new(config.nav_interval_ms, now),
            telemetry_interval: Interval::new(config.telemetry_interval_ms, now),
            reply_on_command: config.reply_on_command,
        }
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    /// Runs until the process is killed.
    pub fn run(&mut self) {
        info!("Control loop starting");
        loop {
            self.run_once();
            thread::sleep(IDLE_SLEEP);
        }
    }

    /**
     * One pass of the loop. Takes in sensor data, applies at most one command frame, then
     * drives the thrusters and sends telemetry when their intervals are due.
     */
    pub fn run_once(&mut self) {
        let new_fix = self.sensors.poll();
        self.control.update_heading(self.sensors.current_heading());
        self.control.update_position(self.sensors.current_position(), new_fix);

        self.read_link();
        if let Some(parameters) = self.decoder.next_frame() {
            self.control.apply(parameters);
            if self.control.state().mode == Mode::Manual && !self.rc.connected() {
                warn!("Manual mode without an RC receiver, thrusters stay at minimum");
            }
            if self.reply_on_command && self.decoder.framing() == Framing::Binary {
                self.send_telemetry();
            }
        }

        let now = self.clock.now_ms();
        if self.navigation_interval.elapsed(now) {
            let command = self.control.tick(self.rc.as_mut());
            self.driver.drive(Channel::Left, command.left);
            self.driver.drive(Channel::Right, command.right);
        }
        if self.telemetry_interval.elapsed(now) {
            self.send_telemetry();
        }
    }

    fn read_link(&mut self) {
        let mut buffer = [0u8; LINK_READ_SIZE];
        match self.link.read_available(&mut buffer) {
            Ok(0) => (),
            Ok(count) => self.decoder.push(&buffer[..count]),
            Err(e) => warn!("Unable to read from link: {}", e),
        }
    }

    fn send_telemetry(&mut self) {
        let bytes = encode_telemetry(&self.control.telemetry(), self.decoder.framing());
        match self.link.write_all(&bytes) {
            Ok(_) => (),
            Err(e) => warn!("Unable to send telemetry: {}", e),
        }
    }
}


#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    use crate::config::ControllerConfig;
    use crate::control::Mode;
    use crate::driver::{Channel, Driver, MicroSeconds, NoRcInput, MIN_PULSE};
    use crate::navigation::{Degrees, Position};
    use crate::protocol::{decode_telemetry, encode_command, Framing, TextLayout,
                          COMMAND_RECORD_SIZE, TELEMETRY_RECORD_SIZE};
    use crate::telemetry_message::ControlParameters;
    use crate::telemetry_provider::Sensors;
    use crate::transport::Transport;
    use super::{Clock, Interval, Scheduler};

    struct FakeClock {
        now: Rc<Cell<u32>>,
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> u32 {
            self.now.get()
        }
    }

    #[derive(Default)]
    struct Link {
        inbound: VecDeque<u8>,
        outbound: Vec<u8>,
        fail_reads: bool,
    }

    struct FakeLink {
        link: Rc<RefCell<Link>>,
    }

    impl Transport for FakeLink {
        fn read_available(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
            let mut link = self.link.borrow_mut();
            if link.fail_reads {
                return Err(io::Error::new(io::ErrorKind::Other, "unplugged"));
            }
            let count = buffer.len().min(link.inbound.len());
            for slot in buffer[..count].iter_mut() {
                *slot = link.inbound.pop_front().unwrap();
            }
            Ok(count)
        }

        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.link.borrow_mut().outbound.extend_from_slice(bytes);
            Ok(())
        }
    }

    struct FakeSensors {
        heading: Degrees,
        position: Option<Position>,
    }

    impl Sensors for FakeSensors {
        fn poll(&mut self) -> bool {
            self.position.is_some()
        }

        fn current_heading(&self) -> Degrees {
            self.heading
        }

        fn current_position(&self) -> Option<Position> {
            self.position
        }
    }

    struct RecordingDriver {
        pulses: Rc<RefCell<Vec<(Channel, MicroSeconds)>>>,
    }

    impl Driver for RecordingDriver {
        fn drive(&mut self, channel: Channel, pulse: MicroSeconds) {
            self.pulses.borrow_mut().push((channel, pulse));
        }

        fn get_pulse(&self, channel: Channel) -> MicroSeconds {
            self.pulses.borrow().iter().rev()
                .find(|&&(c, _)| c == channel)
                .map(|&(_, pulse)| pulse)
                .unwrap_or(MIN_PULSE)
        }
    }

    struct Harness {
        scheduler: Scheduler,
        now: Rc<Cell<u32>>,
        link: Rc<RefCell<Link>>,
        pulses: Rc<RefCell<Vec<(Channel, MicroSeconds)>>>,
    }

    impl Harness {
        fn new(config: ControllerConfig, heading: Degrees, position: Option<Position>) -> Harness {
            let now = Rc::new(Cell::new(0));
            let link = Rc::new(RefCell::new(Link::default()));
            let pulses = Rc::new(RefCell::new(Vec::new()));
            let scheduler = Scheduler::new(
                &config,
                Box::new(FakeSensors { heading: heading, position: position }),
                Box::new(RecordingDriver { pulses: pulses.clone() }),
                Box::new(NoRcInput),
                Box::new(FakeLink { link: link.clone() }),
                Box::new(FakeClock { now: now.clone() }));
            Harness {
                scheduler: scheduler,
                now: now,
                link: link,
                pulses: pulses,
            }
        }

        fn send(&self, bytes: &[u8]) {
            self.link.borrow_mut().inbound.extend(bytes.iter().cloned());
        }

        fn take_outbound(&self) -> Vec<u8> {
            let mut link = self.link.borrow_mut();
            let bytes = link.outbound.clone();
            link.outbound.clear();
            bytes
        }

        fn last_pulses(&self) -> (MicroSeconds, MicroSeconds) {
            let pulses = self.pulses.borrow();
            let len = pulses.len();
            assert!(len >= 2);
            assert_eq!(pulses[len - 2].0, Channel::Left);
            assert_eq!(pulses[len - 1].0, Channel::Right);
            (pulses[len - 2].1, pulses[len - 1].1)
        }
    }

    fn every_pass() -> ControllerConfig {
        let mut config = ControllerConfig::default();
        config.nav_interval_ms = 0;
        config.telemetry_interval_ms = 1000;
        config
    }

    fn heading_command(start: i16, heading: Degrees) -> Vec<u8> {
        let parameters = ControlParameters {
            start: Some(start),
            cruise_speed: 1500,
            desired_heading: Some(heading),
            kp: 2.0,
            ..ControlParameters::default()
        };
        encode_command(&parameters, Framing::Binary)
    }

    #[test]
    fn test_interval_wraparound() {
        let mut interval = Interval::new(100, u32::max_value() - 50);
        assert!(!interval.elapsed(u32::max_value() - 10));
        assert!(!interval.elapsed(48));
        assert!(interval.elapsed(49));
        assert!(!interval.elapsed(50));
        assert!(interval.elapsed(149));
    }

    #[test]
    fn test_zero_interval_fires_every_pass() {
        let mut interval = Interval::new(0, 7);
        assert!(interval.elapsed(7));
        assert!(interval.elapsed(7));
        assert!(interval.elapsed(8));
    }

    #[test]
    fn test_heading_command_steers() {
        let mut harness = Harness::new(every_pass(), 80.0, None);
        harness.send(&heading_command(2, 90.0));
        harness.scheduler.run_once();
        assert_eq!(harness.scheduler.control().state().mode, Mode::AutoHeading);
        assert_eq!(harness.last_pulses(), (1520, 1480));
    }

    #[test]
    fn test_one_frame_per_pass() {
        let mut harness = Harness::new(every_pass(), 80.0, None);
        let mut bytes = heading_command(2, 90.0);
        bytes.extend(heading_command(0, 90.0));
        assert_eq!(bytes.len(), 2 * COMMAND_RECORD_SIZE);
        harness.send(&bytes);

        harness.scheduler.run_once();
        assert_eq!(harness.scheduler.control().state().mode, Mode::AutoHeading);
        harness.scheduler.run_once();
        assert_eq!(harness.scheduler.control().state().mode, Mode::Idle);
        assert_eq!(harness.last_pulses(), (MIN_PULSE, MIN_PULSE));
    }

    #[test]
    fn test_navigation_interval_gates_actuators() {
        let mut config = every_pass();
        config.nav_interval_ms = 1000;
        let mut harness = Harness::new(config, 80.0, None);
        harness.send(&heading_command(2, 90.0));
        harness.scheduler.run_once();
        assert!(harness.pulses.borrow().is_empty());

        harness.now.set(999);
        harness.scheduler.run_once();
        assert!(harness.pulses.borrow().is_empty());

        harness.now.set(1000);
        harness.scheduler.run_once();
        assert_eq!(harness.last_pulses(), (1520, 1480));
    }

    #[test]
    fn test_telemetry_interval() {
        let mut config = every_pass();
        config.telemetry_interval_ms = 100;
        let mut harness = Harness::new(config, 45.0, None);

        harness.scheduler.run_once();
        assert!(harness.take_outbound().is_empty());

        harness.now.set(100);
        harness.scheduler.run_once();
        let bytes = harness.take_outbound();
        assert_eq!(bytes.len(), TELEMETRY_RECORD_SIZE);
        let frame = decode_telemetry(&bytes, Framing::Binary).unwrap();
        assert_eq!(frame.current_heading, 45.0);
        // No fix is reported as the (0, 0) sentinel, which decodes back to no position
        assert_eq!(&bytes[10..], &[0u8; 8][..]);
        assert_eq!(frame.position, None);

        harness.now.set(150);
        harness.scheduler.run_once();
        assert!(harness.take_outbound().is_empty());

        harness.now.set(200);
        harness.scheduler.run_once();
        assert_eq!(harness.take_outbound().len(), TELEMETRY_RECORD_SIZE);
    }

    #[test]
    fn test_reply_on_command() {
        let mut config = every_pass();
        config.reply_on_command = true;
        let mut harness = Harness::new(config, 80.0, None);
        harness.scheduler.run_once();
        assert!(harness.take_outbound().is_empty());

        harness.send(&heading_command(1, 0.0));
        harness.scheduler.run_once();
        let reply = harness.take_outbound();
        assert_eq!(reply.len(), TELEMETRY_RECORD_SIZE);
        assert_eq!(harness.scheduler.control().state().mode, Mode::Manual);
        // Without a receiver manual mode can only hold the thrusters at minimum
        assert_eq!(harness.last_pulses(), (MIN_PULSE, MIN_PULSE));
    }

    #[test]
    fn test_text_waypoint_arrival() {
        let mut config = every_pass();
        config.framing = Framing::Text(TextLayout::Waypoint);
        config.telemetry_interval_ms = 0;
        let here = Position::new(21.0285, 105.8048);
        let mut harness = Harness::new(config, 10.0, Some(here));
        harness.send(b"1500,21.0285,105.8048,2,0,0\n");
        harness.scheduler.run_once();

        let control = harness.scheduler.control();
        assert_eq!(control.state().mode, Mode::Idle);
        assert!(!control.target().active);
        assert_eq!(harness.last_pulses(), (MIN_PULSE, MIN_PULSE));

        let text = String::from_utf8(harness.take_outbound()).unwrap();
        assert!(text.starts_with("21.028500,105.804800,10.0,"));
        assert!(text.ends_with(",1000,1000,0\n"));
    }

    #[test]
    fn test_link_errors_do_not_stop_the_loop() {
        let mut config = every_pass();
        config.telemetry_interval_ms = 0;
        let mut harness = Harness::new(config, 0.0, None);
        harness.link.borrow_mut().fail_reads = true;
        harness.scheduler.run_once();
        assert_eq!(harness.take_outbound().len(), TELEMETRY_RECORD_SIZE);
        assert_eq!(harness.last_pulses(), (MIN_PULSE, MIN_PULSE));
    }
}
