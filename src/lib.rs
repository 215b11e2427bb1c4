#[macro_use]
extern crate log;
#[macro_use]
extern crate enum_primitive;

pub mod config;
pub mod control;
pub mod driver;
pub mod navigation;
pub mod nmea;
pub mod pi_blaster_driver;
pub mod protocol;
pub mod scheduler;
pub mod steering;
pub mod telemetry_message;
pub mod telemetry_provider;
pub mod termios;
pub mod transport;
pub mod util;
pub mod waypoint;
