/**
 * Parses the NMEA sentences that carry position and heading.
 */
use crate::navigation::{wrap_degrees, Degrees, Position};


/**
 * GGA: Global positioning system fix data.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GgaMessage {
    /// None when the receiver reports fix quality 0.
    pub position: Option<Position>,
    pub fix_quality: u8,
    pub satellites: u8,
    pub horizontal_dilution_of_precision: f32,
}


/**
 * RMC: Recommended minimum navigation information.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RmcMessage {
    /// None unless the status field is A (valid).
    pub position: Option<Position>,
    pub course_d: Option<Degrees>,
}


/**
 * HDG or HDT: heading from a compass.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadingMessage {
    pub heading_d: Degrees,
    pub true_north: bool,
}


#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NmeaMessage {
    Gga(GgaMessage),
    Rmc(RmcMessage),
    Heading(HeadingMessage),
}


macro_rules! bail_err {
    ($result:expr) => (
        match $result {
            Ok(s) => s,
            Err(e) => return Err(e.to_string()),
        }
    );
}
macro_rules! bail_none {
    ($option:expr) => (
        match $option {
            Some(s) => s,
            None => return Err("Message too short".to_string()),
        }
    );
}


impl NmeaMessage {
    pub fn parse(message: &str) -> Result<NmeaMessage, String> {
        let body = checked_body(message.trim())?;
        let mut iterator = body.split(',');
        let address = bail_none!(iterator.next());
        // Two talker characters then the sentence type, e.g. GPGGA or HCHDG
        let sentence = bail_none!(address.get(2..));
        match sentence {
            "GGA" => {
                // $GPGGA,hhmmss.sss,ddmm.mmmm,a,dddmm.mmmm,a,x,xx,x.x,x.x,M,,,,xxxx*hh
                iterator.next();  // Skip the timestamp since midnight UTC
                let latitude = bail_none!(iterator.next());
                let north_indicator = bail_none!(iterator.next());
                let longitude = bail_none!(iterator.next());
                let east_indicator = bail_none!(iterator.next());
                let fix_quality: u8 = bail_err!(bail_none!(iterator.next()).parse());
                let satellites: u8 = bail_none!(iterator.next()).parse().unwrap_or(0);
                let hdop: f32 = bail_none!(iterator.next()).parse().unwrap_or(0.0);

                let position = if fix_quality > 0 {
                    Some(Position::new(
                        parse_coordinate(latitude, north_indicator)?,
                        parse_coordinate(longitude, east_indicator)?))
                } else {
                    None
                };
                Ok(NmeaMessage::Gga(GgaMessage {
                    position: position,
                    fix_quality: fix_quality,
                    satellites: satellites,
                    horizontal_dilution_of_precision: hdop,
                }))
            },
            "RMC" => {
                // $GPRMC,hhmmss.sss,A,ddmm.mmmm,a,dddmm.mmmm,a,x.x,x.x,ddmmyy,,,a*hh
                iterator.next();  // Skip the timestamp
                let status = bail_none!(iterator.next());
                let latitude = bail_none!(iterator.next());
                let north_indicator = bail_none!(iterator.next());
                let longitude = bail_none!(iterator.next());
                let east_indicator = bail_none!(iterator.next());
                iterator.next();  // Skip speed over ground in knots
                let course_d = iterator.next()
                    .and_then(|course| course.parse::<Degrees>().ok())
                    .filter(|course| course.is_finite())
                    .map(wrap_degrees);

                let position = if status == "A" {
                    Some(Position::new(
                        parse_coordinate(latitude, north_indicator)?,
                        parse_coordinate(longitude, east_indicator)?))
                } else {
                    None
                };
                Ok(NmeaMessage::Rmc(RmcMessage {
                    position: position,
                    course_d: course_d,
                }))
            },
            "HDG" | "HDT" => {
                // $HCHDG,x.x,x.x,a,x.x,a*hh or $HEHDT,x.x,T*hh
                let heading: Degrees = bail_err!(bail_none!(iterator.next()).parse());
                if !heading.is_finite() {
                    return Err("Heading is not finite".to_string());
                }
                Ok(NmeaMessage::Heading(HeadingMessage {
                    heading_d: wrap_degrees(heading),
                    true_north: sentence == "HDT",
                }))
            },
            _ => Err("Unknown NMEA message type".to_string()),
        }
    }
}


/**
 * Strips the leading $ and, when present, verifies and strips the *hh checksum.
 */
fn checked_body(message: &str) -> Result<&str, String> {
    if !message.starts_with('$') {
        return Err("Missing $ start delimiter".to_string());
    }
    let message = &message[1..];
    match message.find('*') {
        Some(star) => {
            let body = &message[..star];
            let expected = bail_err!(u8::from_str_radix(&message[star + 1..], 16));
            let computed = body.bytes().fold(0u8, |sum, b| sum ^ b);
            if computed != expected {
                return Err(format!("Checksum mismatch: {:02X} != {:02X}", computed, expected));
            }
            Ok(body)
        },
        None => Ok(message),
    }
}


/**
 * Converts ddmm.mmmm (latitude) or dddmm.mmmm (longitude) into signed decimal degrees.
 */
pub fn parse_coordinate(value: &str, direction: &str) -> Result<Degrees, String> {
    let degree_digits = match direction {
        "N" | "S" => 2,
        "E" | "W" => 3,
        _ => return Err(format!("Unknown direction: {}", direction)),
    };
    if value.len() < degree_digits + 2 {
        return Err(format!("Invalid NMEA coordinate: {}", value));
    }
    let degrees: f64 = bail_err!(bail_none!(value.get(..degree_digits)).parse());
    let minutes: f64 = bail_err!(bail_none!(value.get(degree_digits..)).parse());
    let decimal = degrees + minutes / 60.0;
    if direction == "S" || direction == "W" {
        Ok(-decimal)
    } else {
        Ok(decimal)
    }
}
