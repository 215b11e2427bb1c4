/**
 * Proportional differential-thrust steering.
 */

use crate::driver::{MotorCommand, MicroSeconds, MAX_PULSE, MIN_PULSE, NEUTRAL_PULSE};
use crate::navigation::Degrees;

/// Maps a heading error onto left and right thruster pulses. Only the proportional gain
/// takes part; there is no memory between calls.
pub fn steer(
    cruise_speed: i32,
    kp: f64,
    error: Degrees,
    turn_direction: i8,
    ceiling: MicroSeconds,
) -> MotorCommand {
    let correction = kp * error * turn_direction as f64;
    MotorCommand {
        left: clamp_pulse(cruise_speed as f64 + correction, ceiling),
        right: clamp_pulse(cruise_speed as f64 - correction, ceiling),
    }
}

/// Mixes RC throttle and rudder pulses into thruster pulses for manual control.
pub fn mix_manual(throttle: MicroSeconds, rudder: MicroSeconds) -> MotorCommand {
    let offset = rudder as f64 - NEUTRAL_PULSE as f64;
    MotorCommand {
        left: clamp_pulse(throttle as f64 - offset, MAX_PULSE),
        right: clamp_pulse(throttle as f64 + offset, MAX_PULSE),
    }
}

fn clamp_pulse(pulse: f64, ceiling: MicroSeconds) -> MicroSeconds {
    let ceiling = ceiling.max(MIN_PULSE);
    if !pulse.is_finite() {
        return MIN_PULSE;
    }
    // Fractions truncate toward zero like the firmware's int16 store
    num::clamp(pulse.trunc(), MIN_PULSE as f64, ceiling as f64) as MicroSeconds
}
