/**
 * Command and telemetry codec for the ground station link.
 *
 * Binary framing exchanges fixed-size little-endian records with no delimiter and no
 * checksum; a dropped or inserted byte misaligns every following record. Text framing
 * exchanges newline terminated lines of comma separated fields.
 */
use enum_primitive::FromPrimitive;

use crate::control::Mode;
use crate::driver::MicroSeconds;
use crate::navigation::{wrap_degrees, Position};
use crate::telemetry_message::{max_speed_from_wire, ControlParameters, TelemetryFrame};
use crate::util::{finite_or_zero, parse_float, parse_int};

/// start, max_speed, cruise_speed, desired_heading as i16 then kp, ki, kd, target_lat,
/// target_lon as f32.
pub const COMMAND_RECORD_SIZE: usize = 4 * 2 + 5 * 4;
/// throttle, rudder, left, right, current_heading as i16 then lat, lon as f32.
pub const TELEMETRY_RECORD_SIZE: usize = 5 * 2 + 2 * 4;
pub const TEXT_FIELD_COUNT: usize = 6;
/// Most text kept buffered, complete lines included.
pub const MAX_LINE_LENGTH: usize = 256;
/// Most binary records kept buffered while waiting to be applied.
pub const MAX_BUFFERED_RECORDS: usize = 4;

/// Positional order of the six fields in a text command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextLayout {
    /// cruise_speed,target_lat,target_lon,kp,ki,kd
    Waypoint,
    /// max_speed,cruise_speed,desired_heading,kp,ki,kd
    Heading,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Framing {
    Binary,
    Text(TextLayout),
}


/// Accumulates link bytes and cuts them into command frames.
pub struct CommandDecoder {
    framing: Framing,
    buffer: Vec<u8>,
}

impl CommandDecoder {
    pub fn new(framing: Framing) -> CommandDecoder {
        CommandDecoder {
            framing: framing,
            buffer: Vec::with_capacity(MAX_LINE_LENGTH),
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /**
     * Buffers link bytes. When commands arrive faster than they are applied, the oldest
     * whole frames are dropped so the newest command is never stuck behind a backlog.
     */
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        match self.framing {
            Framing::Binary => {
                let limit = MAX_BUFFERED_RECORDS * COMMAND_RECORD_SIZE;
                if self.buffer.len() > limit {
                    // Whole records only, so the record boundaries stay where they were
                    let excess = self.buffer.len() - limit;
                    let records = (excess + COMMAND_RECORD_SIZE - 1) / COMMAND_RECORD_SIZE;
                    warn!("Dropping {} stale command records", records);
                    self.buffer.drain(..records * COMMAND_RECORD_SIZE);
                }
            },
            Framing::Text(_) => {
                let mut dropped_lines = 0;
                while self.buffer.len() > MAX_LINE_LENGTH {
                    match self.buffer.iter().position(|&b| b == b'\n') {
                        Some(end) => {
                            self.buffer.drain(..end + 1);
                            dropped_lines += 1;
                        },
                        None => {
                            warn!("Dropping {} bytes of unterminated command text", self.buffer.len());
                            self.buffer.clear();
                        },
                    }
                }
                if dropped_lines > 0 {
                    warn!("Dropping {} stale command lines", dropped_lines);
                }
            },
        }
    }

    /**
     * Consumes at most one frame. Returns None when no complete frame is buffered or the
     * frame consumed was unusable, in which case the previous parameters stay in force.
     */
    pub fn next_frame(&mut self) -> Option<ControlParameters> {
        match self.framing {
            Framing::Binary => {
                if self.buffer.len() < COMMAND_RECORD_SIZE {
                    return None;
                }
                let record: Vec<u8> = self.buffer.drain(..COMMAND_RECORD_SIZE).collect();
                let parameters = decode_command_record(&record);
                trace!("Binary command {:?}", parameters);
                parameters
            },
            Framing::Text(layout) => {
                let end = self.buffer.iter().position(|&b| b == b'\n')?;
                let line: Vec<u8> = self.buffer.drain(..end + 1).collect();
                let text = String::from_utf8_lossy(&line);
                trace!("Text command {:?}", text.trim());
                decode_command_line(&text, layout)
            },
        }
    }
}


/// Decodes one binary command record. Non-finite floats become 0.
pub fn decode_command_record(record: &[u8]) -> Option<ControlParameters> {
    if record.len() < COMMAND_RECORD_SIZE {
        return None;
    }
    let mut reader = RecordReader { record: record, offset: 0 };
    let start = reader.i16();
    let max_speed = reader.i16();
    let cruise_speed = reader.i16();
    let desired_heading = reader.i16();
    let kp = reader.f32();
    let ki = reader.f32();
    let kd = reader.f32();
    let target_lat = reader.f32();
    let target_lon = reader.f32();

    Some(ControlParameters {
        start: Some(start),
        max_speed: Some(max_speed_from_wire(max_speed as i32)),
        cruise_speed: cruise_speed as i32,
        desired_heading: Some(desired_heading as f64),
        target: Position::from_wire(target_lat, target_lon),
        kp: kp,
        ki: ki,
        kd: kd,
    })
}

/// Decodes one text command line. Returns None for a blank line.
pub fn decode_command_line(line: &str, layout: TextLayout) -> Option<ControlParameters> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut fields = [""; TEXT_FIELD_COUNT];
    for (slot, field) in fields.iter_mut().zip(trimmed.split(',')) {
        *slot = field;
    }

    let parameters = match layout {
        TextLayout::Waypoint => ControlParameters {
            start: None,
            max_speed: None,
            cruise_speed: parse_int(fields[0]),
            desired_heading: None,
            target: Position::from_wire(parse_float(fields[1]), parse_float(fields[2])),
            kp: parse_float(fields[3]),
            ki: parse_float(fields[4]),
            kd: parse_float(fields[5]),
        },
        TextLayout::Heading => ControlParameters {
            start: None,
            max_speed: Some(max_speed_from_wire(parse_int(fields[0]))),
            cruise_speed: parse_int(fields[1]),
            desired_heading: Some(parse_int(fields[2]) as f64),
            target: None,
            kp: parse_float(fields[3]),
            ki: parse_float(fields[4]),
            kd: parse_float(fields[5]),
        },
    };
    Some(parameters)
}


/// Serializes a telemetry frame for the link, terminated the way the framing expects.
pub fn encode_telemetry(frame: &TelemetryFrame, framing: Framing) -> Vec<u8> {
    let (latitude, longitude) = Position::to_wire(frame.position);
    match framing {
        Framing::Binary => {
            let mut record = Vec::with_capacity(TELEMETRY_RECORD_SIZE);
            record.extend_from_slice(&(frame.throttle as i16).to_le_bytes());
            record.extend_from_slice(&(frame.rudder as i16).to_le_bytes());
            record.extend_from_slice(&(frame.left_speed as i16).to_le_bytes());
            record.extend_from_slice(&(frame.right_speed as i16).to_le_bytes());
            let heading = wrap_degrees(frame.current_heading.round()) as i16;
            record.extend_from_slice(&heading.to_le_bytes());
            record.extend_from_slice(&(latitude as f32).to_le_bytes());
            record.extend_from_slice(&(longitude as f32).to_le_bytes());
            record
        },
        Framing::Text(_) => format!(
            "{:.6},{:.6},{:.1},{:.1},{},{},{}\n",
            latitude,
            longitude,
            frame.current_heading,
            frame.desired_heading,
            frame.left_speed,
            frame.right_speed,
            frame.mode as u8,
        ).into_bytes(),
    }
}

/**
 * Parses telemetry produced by `encode_telemetry`. Fields the framing doesn't carry keep
 * their defaults.
 */
pub fn decode_telemetry(bytes: &[u8], framing: Framing) -> Option<TelemetryFrame> {
    let mut frame = TelemetryFrame::default();
    match framing {
        Framing::Binary => {
            if bytes.len() < TELEMETRY_RECORD_SIZE {
                return None;
            }
            let mut reader = RecordReader { record: bytes, offset: 0 };
            frame.throttle = pulse_from_wire(reader.i16());
            frame.rudder = pulse_from_wire(reader.i16());
            frame.left_speed = pulse_from_wire(reader.i16());
            frame.right_speed = pulse_from_wire(reader.i16());
            frame.current_heading = reader.i16() as f64;
            frame.position = Position::from_wire(reader.f32(), reader.f32());
        },
        Framing::Text(_) => {
            let text = String::from_utf8_lossy(bytes);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            let fields: Vec<&str> = trimmed.split(',').collect();
            let field = |index: usize| fields.get(index).cloned().unwrap_or("");
            frame.position = Position::from_wire(parse_float(field(0)), parse_float(field(1)));
            frame.current_heading = parse_float(field(2));
            frame.desired_heading = parse_float(field(3));
            frame.left_speed = pulse_from_wire(parse_int(field(4)) as i16);
            frame.right_speed = pulse_from_wire(parse_int(field(5)) as i16);
            frame.mode = Mode::from_i32(parse_int(field(6))).unwrap_or(Mode::Idle);
        },
    }
    Some(frame)
}

/// Serializes a command the way the ground station sends it.
pub fn encode_command(parameters: &ControlParameters, framing: Framing) -> Vec<u8> {
    let (target_lat, target_lon) = Position::to_wire(parameters.target);
    let max_speed = parameters.ceiling() as i32;
    let desired_heading = parameters.desired_heading.unwrap_or(0.0).round() as i32;
    match framing {
        Framing::Binary => {
            let mut record = Vec::with_capacity(COMMAND_RECORD_SIZE);
            record.extend_from_slice(&parameters.start.unwrap_or(0).to_le_bytes());
            record.extend_from_slice(&(max_speed as i16).to_le_bytes());
            record.extend_from_slice(&(parameters.cruise_speed as i16).to_le_bytes());
            record.extend_from_slice(&(desired_heading as i16).to_le_bytes());
            for value in [parameters.kp, parameters.ki, parameters.kd, target_lat, target_lon].iter() {
                record.extend_from_slice(&(*value as f32).to_le_bytes());
            }
            record
        },
        Framing::Text(TextLayout::Waypoint) => format!(
            "{},{:.6},{:.6},{},{},{}\n",
            parameters.cruise_speed,
            target_lat,
            target_lon,
            parameters.kp,
            parameters.ki,
            parameters.kd,
        ).into_bytes(),
        Framing::Text(TextLayout::Heading) => format!(
            "{},{},{},{},{},{}\n",
            max_speed,
            parameters.cruise_speed,
            desired_heading,
            parameters.kp,
            parameters.ki,
            parameters.kd,
        ).into_bytes(),
    }
}


struct RecordReader<'a> {
    record: &'a [u8],
    offset: usize,
}

impl<'a> RecordReader<'a> {
    fn i16(&mut self) -> i16 {
        let bytes = [self.record[self.offset], self.record[self.offset + 1]];
        self.offset += 2;
        i16::from_le_bytes(bytes)
    }

    fn f32(&mut self) -> f64 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.record[self.offset..self.offset + 4]);
        self.offset += 4;
        finite_or_zero(f32::from_le_bytes(bytes))
    }
}

fn pulse_from_wire(value: i16) -> MicroSeconds {
    if value < 0 {
        0
    } else {
        value as MicroSeconds
    }
}
