#[macro_use]
extern crate log;

use std::fs::File;
use std::process;

use getopts::Options;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode,
                WriteLogger};

use asv_control::config::ControllerConfig;
use asv_control::driver::{Driver, LoggingDriver, NoRcInput};
use asv_control::pi_blaster_driver::PiBlasterDriver;
use asv_control::scheduler::{Scheduler, SystemClock};
use asv_control::telemetry_provider::NmeaSensors;
use asv_control::termios::Tty;


fn main() {
    let config = match handle_opts() {
        Some(config) => config,
        None => return,
    };
    info!("Starting up");
    debug!("{:?}", config);

    let link = match Tty::open(&config.link_device, config.link_baud) {
        Ok(tty) => tty,
        Err(e) => {
            error!("Unable to open link {}: {}", config.link_device, e);
            process::exit(1);
        }
    };
    let gps = match Tty::open(&config.gps_device, config.gps_baud) {
        Ok(tty) => tty,
        Err(e) => {
            error!("Unable to open GPS {}: {}", config.gps_device, e);
            process::exit(1);
        }
    };

    let driver: Box<dyn Driver> = if config.dry_run {
        Box::new(LoggingDriver::new())
    } else {
        match PiBlasterDriver::open(config.left_pin, config.right_pin) {
            Ok(driver) => Box::new(driver),
            Err(e) => {
                error!("Unable to open pi-blaster: {}", e);
                process::exit(1);
            }
        }
    };

    let mut scheduler = Scheduler::new(
        &config,
        Box::new(NmeaSensors::new(gps)),
        driver,
        Box::new(NoRcInput),
        Box::new(link),
        Box::new(SystemClock::new()));
    scheduler.run();
}


fn handle_opts() -> Option<ControllerConfig> {
    let opts = ControllerConfig::options();
    let mut args = std::env::args();
    args.next();  // Skip the program name
    let matches = match opts.parse(args) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Unable to parse options: {}", e);
            print_usage(&opts);
            process::exit(2);
        }
    };
    if matches.opt_present("h") {
        print_usage(&opts);
        return None;
    }

    let config = match ControllerConfig::from_matches(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    let level = if config.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![
        TermLogger::new(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
    ];
    if let Some(ref path) = config.log_file {
        match File::create(path) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file)),
            Err(e) => eprintln!("Unable to create log file {}: {}", path, e),
        }
    }
    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Unable to initialize logger: {}", e);
    }
    Some(config)
}


fn print_usage(opts: &Options) {
    let brief = "Usage: asv-control [options]";
    print!("{}", opts.usage(brief));
}
