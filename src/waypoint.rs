/**
 * The single waypoint the vehicle is tracking.
 */
use crate::navigation::{haversine_distance, Meter, Position};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaypointTarget {
    pub position: Position,
    pub active: bool,
}

impl WaypointTarget {
    pub fn inactive() -> WaypointTarget {
        WaypointTarget {
            position: Position::new(0.0, 0.0),
            active: false,
        }
    }

    /**
     * Starts tracking a new position.
     */
    pub fn activate(&mut self, position: Position) {
        self.position = position;
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /**
     * Returns true if the target is active and `point` is closer than `stop_distance`.
     */
    pub fn reached(&self, point: &Position, stop_distance: Meter) -> bool {
        self.active && haversine_distance(point, &self.position) < stop_distance
    }
}
