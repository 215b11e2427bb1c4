/**
 * Parse a float from a protocol field. Anything that isn't a finite number becomes 0 so
 * that one bad field never discards the rest of a frame.
 */
pub fn parse_float(float_str: &str) -> f64 {
    match float_str.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}


/**
 * Parse an integer from a protocol field. Decimal input is truncated toward zero and
 * anything unparseable becomes 0.
 */
pub fn parse_int(int_str: &str) -> i32 {
    let trimmed = int_str.trim();
    match trimmed.parse::<i32>() {
        Ok(value) => value,
        Err(_) => {
            let value = parse_float(trimmed);
            if value >= i32::MIN as f64 && value <= i32::MAX as f64 {
                value.trunc() as i32
            } else {
                0
            }
        }
    }
}


/// Replaces non-finite floats decoded from binary records with 0.
pub fn finite_or_zero(value: f32) -> f64 {
    if value.is_finite() {
        value as f64
    } else {
        0.0
    }
}
