use std::f32::consts::PI;

/// Carrier wavelength of a 60 GHz pulse.
pub const WAVELENGTH_M: f32 = 0.005;

/// Half-power width of the transmitted pulse.
pub const PULSE_WIDTH_M: f32 = 0.03;

/// Gaussian pulse amplitude at `offset_m` from the reflector.
pub fn pulse_envelope(offset_m: f32) -> f32 {
    let normalized = offset_m / PULSE_WIDTH_M;
    (-normalized * normalized * 2.0_f32.ln()).exp()
}

/// Round-trip carrier phase for a reflector at `distance_m`.
pub fn carrier_phase(distance_m: f32) -> f32 {
    (4.0 * PI * distance_m / WAVELENGTH_M) % (2.0 * PI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_halves_at_one_pulse_width() {
        assert!((pulse_envelope(0.0) - 1.0).abs() < 1e-6);
        assert!((pulse_envelope(PULSE_WIDTH_M) - 0.5).abs() < 1e-6);
        assert!(pulse_envelope(10.0 * PULSE_WIDTH_M) < 1e-6);
    }
}
