use crate::navigation::{Degrees, Position};
use crate::nmea::NmeaMessage;
use crate::protocol::MAX_LINE_LENGTH;
use crate::transport::Transport;

/// Most reads drained from the device in one poll, so a chatty receiver can't stall the loop.
const MAX_READS_PER_POLL: usize = 16;


/// Supplies the latest heading and position to the control loop.
pub trait Sensors {
    /// Drains buffered sensor input. Returns true when a new position fix arrived.
    fn poll(&mut self) -> bool;
    /// Degrees clockwise from north, in [0, 360).
    fn current_heading(&self) -> Degrees;
    fn current_position(&self) -> Option<Position>;
}


/**
 * Reads GPS and compass NMEA sentences from a serial device.
 */
pub struct NmeaSensors<T: Transport> {
    transport: T,
    line: Vec<u8>,
    heading: Degrees,
    position: Option<Position>,
    // Once a compass reports, course over ground no longer stands in for heading
    compass_seen: bool,
}


impl<T: Transport> NmeaSensors<T> {
    pub fn new(transport: T) -> NmeaSensors<T> {
        NmeaSensors {
            transport: transport,
            line: Vec::with_capacity(MAX_LINE_LENGTH),
            heading: 0.0,
            position: None,
            compass_seen: false,
        }
    }

    fn handle_line(&mut self) -> bool {
        let text = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        if text.trim().is_empty() {
            return false;
        }
        match NmeaMessage::parse(&text) {
            Ok(NmeaMessage::Gga(gga)) => {
                self.position = gga.position;
                gga.position.is_some()
            },
            Ok(NmeaMessage::Rmc(rmc)) => {
                if !self.compass_seen {
                    if let Some(course) = rmc.course_d {
                        self.heading = course;
                    }
                }
                match rmc.position {
                    Some(position) => {
                        self.position = Some(position);
                        true
                    },
                    None => false,
                }
            },
            Ok(NmeaMessage::Heading(heading)) => {
                self.compass_seen = true;
                self.heading = heading.heading_d;
                false
            },
            Err(e) => {
                trace!("Ignoring NMEA line {:?}: {}", text.trim(), e);
                false
            },
        }
    }
}


impl<T: Transport> Sensors for NmeaSensors<T> {
    fn poll(&mut self) -> bool {
        let mut buffer = [0u8; 128];
        let mut new_fix = false;
        for _ in 0..MAX_READS_PER_POLL {
            let count = match self.transport.read_available(&mut buffer) {
                Ok(0) => break,
                Ok(count) => count,
                Err(e) => {
                    warn!("Unable to read from GPS: {}", e);
                    break;
                },
            };
            for &byte in &buffer[..count] {
                if byte == b'\n' {
                    new_fix |= self.handle_line();
                } else if self.line.len() < MAX_LINE_LENGTH {
                    self.line.push(byte);
                } else {
                    warn!("Dropping overlong NMEA line");
                    self.line.clear();
                }
            }
        }
        new_fix
    }

    fn current_heading(&self) -> Degrees {
        self.heading
    }

    fn current_position(&self) -> Option<Position> {
        self.position
    }
}
