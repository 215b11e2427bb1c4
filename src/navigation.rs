/**
 * Geographic and heading math used by the navigation state machine.
 */

pub type Degrees = f64;
pub type Meter = f64;

pub const EARTH_RADIUS_M: Meter = 6_371_000.0;

/// A latitude/longitude fix in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub latitude: Degrees,
    pub longitude: Degrees,
}

impl Position {
    pub fn new(latitude: Degrees, longitude: Degrees) -> Position {
        Position {
            latitude: latitude,
            longitude: longitude,
        }
    }

    /// Interprets wire coordinates, where (0, 0) means there is no fix.
    pub fn from_wire(latitude: Degrees, longitude: Degrees) -> Option<Position> {
        if latitude == 0.0 && longitude == 0.0 {
            None
        } else {
            Some(Position::new(latitude, longitude))
        }
    }

    /// Inverse of `from_wire`.
    pub fn to_wire(position: Option<Position>) -> (Degrees, Degrees) {
        match position {
            Some(p) => (p.latitude, p.longitude),
            None => (0.0, 0.0),
        }
    }
}

/// Direction and size of the correction needed to reach a desired heading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadingError {
    pub turn_angle: Degrees,
    pub turn_direction: i8,
    pub error: Degrees,
}

/// Wraps any angle into [0, 360).
pub fn wrap_degrees(degrees: Degrees) -> Degrees {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Clockwise angle from the current heading to the desired one, in [0, 360).
pub fn turn_angle(current: Degrees, desired: Degrees) -> Degrees {
    wrap_degrees(desired - current + 360.0)
}

/// Signed error toward the shorter turn, in (-180, 180], optionally clamped to
/// [-limit, limit].
pub fn heading_error(current: Degrees, desired: Degrees, limit: Option<Degrees>) -> HeadingError {
    let angle = turn_angle(current, desired);
    let (turn_direction, mut error) = if angle > 180.0 {
        (-1, angle - 360.0)
    } else {
        (1, angle)
    };
    if let Some(limit) = limit {
        error = num::clamp(error, -limit, limit);
    }
    HeadingError {
        turn_angle: angle,
        turn_direction: turn_direction,
        error: error,
    }
}

/// Great circle distance between two fixes.
pub fn haversine_distance(from: &Position, to: &Position) -> Meter {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial great circle bearing from one fix toward another, rounded to a whole degree
/// in [0, 360).
pub fn initial_bearing(from: &Position, to: &Position) -> Degrees {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
    wrap_degrees(wrap_degrees(y.atan2(x).to_degrees()).round())
}
