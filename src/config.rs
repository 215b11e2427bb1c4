/**
 * Run-time settings, filled in from the command line.
 */
use std::str::FromStr;
use std::time::Duration;

use enum_primitive::FromPrimitive;
use getopts::{Matches, Options};

use crate::navigation::{Degrees, Meter};
use crate::protocol::{Framing, TextLayout};
use crate::termios::BaudRate;

pub const DEFAULT_LINK_DEVICE: &str = "/dev/ttyUSB0";
pub const DEFAULT_GPS_DEVICE: &str = "/dev/ttyAMA0";

/// Settings for the navigation state machine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavigationConfig {
    pub stop_distance_m: Meter,
    /// Symmetric bound on the heading error fed to the steering law.
    pub error_limit: Option<Degrees>,
    pub rc_timeout: Duration,
}

impl Default for NavigationConfig {
    fn default() -> NavigationConfig {
        NavigationConfig {
            stop_distance_m: 2.0,
            error_limit: None,
            rc_timeout: Duration::from_millis(25),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    pub link_device: String,
    pub link_baud: BaudRate,
    pub gps_device: String,
    pub gps_baud: BaudRate,
    pub framing: Framing,
    /// 0 runs navigation on every pass.
    pub nav_interval_ms: u32,
    pub telemetry_interval_ms: u32,
    /// Answer every accepted binary command with a telemetry record.
    pub reply_on_command: bool,
    pub navigation: NavigationConfig,
    pub left_pin: u8,
    pub right_pin: u8,
    pub dry_run: bool,
    pub verbose: bool,
    pub log_file: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> ControllerConfig {
        ControllerConfig {
            link_device: DEFAULT_LINK_DEVICE.to_string(),
            link_baud: BaudRate::B9600,
            gps_device: DEFAULT_GPS_DEVICE.to_string(),
            gps_baud: BaudRate::B9600,
            framing: Framing::Binary,
            nav_interval_ms: 1000,
            telemetry_interval_ms: 100,
            reply_on_command: false,
            navigation: NavigationConfig::default(),
            left_pin: 18,
            right_pin: 4,
            dry_run: false,
            verbose: false,
            log_file: None,
        }
    }
}

impl ControllerConfig {
    pub fn options() -> Options {
        let mut opts = Options::new();
        opts.optflag("v", "verbose", "Prints extra logging.");
        opts.optflag("h", "help", "Print this help menu.");
        opts.optopt("", "link", "Serial device for the ground station link.", "DEVICE");
        opts.optopt("", "link-baud", "Baud rate of the ground station link.", "BAUD");
        opts.optopt("", "gps", "Serial device carrying GPS and compass NMEA.", "DEVICE");
        opts.optopt("", "gps-baud", "Baud rate of the NMEA device.", "BAUD");
        opts.optopt(
            "",
            "framing",
            "Command framing: binary, text-waypoint or text-heading.",
            "FRAMING");
        opts.optopt("", "nav-interval", "Milliseconds between navigation ticks.", "MS");
        opts.optopt("", "telemetry-interval", "Milliseconds between telemetry frames.", "MS");
        opts.optopt("", "stop-distance", "Meters from the waypoint that count as arrived.", "M");
        opts.optopt("", "error-limit", "Clamp the heading error to +-DEG.", "DEG");
        opts.optflag("", "reply", "Answer every binary command with telemetry.");
        opts.optopt("", "left-pin", "GPIO pin of the left thruster.", "PIN");
        opts.optopt("", "right-pin", "GPIO pin of the right thruster.", "PIN");
        opts.optflag("", "dry-run", "Log thruster pulses instead of driving them.");
        opts.optflagopt("", "log-file", "Also write debug logging to a file.", "PATH");
        opts
    }

    pub fn from_matches(matches: &Matches) -> Result<ControllerConfig, String> {
        let mut config = ControllerConfig::default();
        if let Some(device) = matches.opt_str("link") {
            config.link_device = device;
        }
        if let Some(device) = matches.opt_str("gps") {
            config.gps_device = device;
        }
        if let Some(baud) = parse_opt::<u32>(matches, "link-baud")? {
            config.link_baud = baud_rate(baud)?;
        }
        if let Some(baud) = parse_opt::<u32>(matches, "gps-baud")? {
            config.gps_baud = baud_rate(baud)?;
        }
        if let Some(framing) = matches.opt_str("framing") {
            config.framing = parse_framing(&framing)?;
        }
        if let Some(interval) = parse_opt(matches, "nav-interval")? {
            config.nav_interval_ms = interval;
        }
        if let Some(interval) = parse_opt(matches, "telemetry-interval")? {
            config.telemetry_interval_ms = interval;
        }
        if let Some(distance) = parse_opt::<Meter>(matches, "stop-distance")? {
            if !(distance > 0.0) {
                return Err(format!("Stop distance must be positive: {}", distance));
            }
            config.navigation.stop_distance_m = distance;
        }
        if let Some(limit) = parse_opt::<Degrees>(matches, "error-limit")? {
            if !(limit >= 0.0 && limit <= 180.0) {
                return Err(format!("Error limit must be within [0, 180]: {}", limit));
            }
            config.navigation.error_limit = Some(limit);
        }
        if let Some(pin) = parse_opt(matches, "left-pin")? {
            config.left_pin = pin;
        }
        if let Some(pin) = parse_opt(matches, "right-pin")? {
            config.right_pin = pin;
        }
        config.reply_on_command = matches.opt_present("reply");
        config.dry_run = matches.opt_present("dry-run");
        config.verbose = matches.opt_present("v");
        if matches.opt_present("log-file") {
            config.log_file = Some(
                matches.opt_str("log-file").unwrap_or_else(default_log_file_name));
        }
        Ok(config)
    }
}

/// Log file name stamped with the local start time.
pub fn default_log_file_name() -> String {
    chrono::Local::now().format("asv-control-%Y%m%d-%H%M%S.log").to_string()
}

pub fn parse_framing(name: &str) -> Result<Framing, String> {
    match name {
        "binary" => Ok(Framing::Binary),
        "text-waypoint" => Ok(Framing::Text(TextLayout::Waypoint)),
        "text-heading" => Ok(Framing::Text(TextLayout::Heading)),
        _ => Err(format!("Unknown framing: {}", name)),
    }
}

fn baud_rate(baud: u32) -> Result<BaudRate, String> {
    match BaudRate::from_u32(baud) {
        Some(rate) => Ok(rate),
        None => Err(format!("Unsupported baud rate: {}", baud)),
    }
}

fn parse_opt<T: FromStr>(matches: &Matches, name: &str) -> Result<Option<T>, String> {
    match matches.opt_str(name) {
        Some(value) => match value.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(format!("Invalid value for --{}: {}", name, value)),
        },
        None => Ok(None),
    }
}


#[cfg(test)]
mod tests {
    use crate::protocol::{Framing, TextLayout};
    use crate::termios::BaudRate;
    use super::{default_log_file_name, ControllerConfig};

    fn parse(args: &[&str]) -> Result<ControllerConfig, String> {
        let matches = match ControllerConfig::options().parse(args) {
            Ok(m) => m,
            Err(e) => return Err(e.to_string()),
        };
        ControllerConfig::from_matches(&matches)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.nav_interval_ms, 1000);
        assert_eq!(config.telemetry_interval_ms, 100);
        assert_eq!(config.navigation.stop_distance_m, 2.0);
        assert_eq!(config.navigation.error_limit, None);
        assert_eq!(config.framing, Framing::Binary);
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--link", "/dev/ttyS1",
            "--link-baud", "115200",
            "--framing", "text-heading",
            "--nav-interval", "0",
            "--error-limit", "90",
            "--stop-distance", "3.5",
            "--reply",
            "--dry-run",
            "-v",
        ]).unwrap();
        assert_eq!(config.link_device, "/dev/ttyS1");
        assert_eq!(config.link_baud, BaudRate::B115200);
        assert_eq!(config.framing, Framing::Text(TextLayout::Heading));
        assert_eq!(config.nav_interval_ms, 0);
        assert_eq!(config.navigation.error_limit, Some(90.0));
        assert_eq!(config.navigation.stop_distance_m, 3.5);
        assert!(config.reply_on_command);
        assert!(config.dry_run);
        assert!(config.verbose);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse(&["--framing", "json"]).is_err());
        assert!(parse(&["--link-baud", "12345"]).is_err());
        assert!(parse(&["--nav-interval", "soon"]).is_err());
        assert!(parse(&["--error-limit", "-5"]).is_err());
        assert!(parse(&["--stop-distance", "0"]).is_err());
    }

    #[test]
    fn test_log_file() {
        let config = parse(&["--log-file=run.log"]).unwrap();
        assert_eq!(config.log_file, Some("run.log".to_string()));
        let name = default_log_file_name();
        assert!(name.starts_with("asv-control-"));
        assert!(name.ends_with(".log"));
    }
}
