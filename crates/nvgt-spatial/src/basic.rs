//! Non-HRTF positioning: a cheap distance/pan model applied after decode,
//! exactly the formulas a source without HRTF enabled (or without the dataset
//! available) falls back to.

/// `10^((value*100-100)/20)` — the linear-to-dB-ish conversion both volume and
/// pan-derived channel gains route through.
pub fn db_convert(value: f32) -> f32 {
    10f32.powf((value * 100.0 - 100.0) / 20.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Rotates the (x, y) pair by `radians` around the z axis, leaving z alone.
    pub fn rotated(self, radians: f32) -> Vec3 {
        let (sin, cos) = radians.sin_cos();
        Vec3::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos, self.z)
    }
}

/// The result of basic positioning: an overall distance-derived amplitude and
/// a pan value in `[-1, 1]`.
pub struct BasicPosition {
    pub distance: f32,
    pub pan: f32,
    pub distance_amplitude: f32,
}

/// Computes distance/pan for a source relative to a listener, per the
/// non-HRTF fallback model: distance falls off linearly over 125 units scaled
/// by `volume_step`; pan is the relative offset's x component scaled by
/// `pan_step` over the same 125-unit span, clamped to `[-1, 1]`.
pub fn compute_basic_position(
    source: Vec3,
    listener: Vec3,
    rotation: f32,
    pan_step: f32,
    volume_step: f32,
) -> BasicPosition {
    let relative = source.sub(listener).rotated(rotation);
    let distance = relative.magnitude();
    let pan = (relative.x * pan_step / 125.0).clamp(-1.0, 1.0);
    let distance_volume = (1.0 - (distance / 125.0) * volume_step).clamp(0.0, 1.0);
    BasicPosition {
        distance,
        pan,
        distance_amplitude: db_convert(distance_volume),
    }
}

/// Applies a computed position to a mono input sample, producing `(left,
/// right)`. The right channel is the left scaled by the pan-derived relative
/// gain `db_convert(1 - (pan + 1))`, matching the documented boundary
/// behaviour for a source panned away from center.
pub fn apply_basic_position(input: f32, position: &BasicPosition) -> (f32, f32) {
    let left = input * position.distance_amplitude;
    let right = left * db_convert(1.0 - (position.pan + 1.0));
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn source_at_ten_units_with_unit_steps_matches_documented_example() {
        let listener = Vec3::new(0.0, 0.0, 0.0);
        let source = Vec3::new(10.0, 0.0, 0.0);
        let position = compute_basic_position(source, listener, 0.0, 1.0, 1.0);

        assert_relative_eq!(position.pan, 0.08, epsilon = 1e-6);
        let expected_distance_volume = 1.0 - 10.0 / 125.0;
        assert_relative_eq!(
            position.distance_amplitude,
            db_convert(expected_distance_volume),
            epsilon = 1e-6
        );

        let (left, right) = apply_basic_position(1.0, &position);
        assert_relative_eq!(left, db_convert(0.92), epsilon = 1e-5);
        assert_relative_eq!(right, left * db_convert(1.0 - (0.08 + 1.0)), epsilon = 1e-6);
    }

    #[test]
    fn coincident_source_and_listener_has_no_pan_and_full_amplitude() {
        let listener = Vec3::new(0.0, 0.0, 0.0);
        let position = compute_basic_position(listener, listener, 0.0, 1.0, 1.0);
        assert_relative_eq!(position.pan, 0.0);
        assert_relative_eq!(position.distance_amplitude, db_convert(1.0), epsilon = 1e-6);
    }

    #[test]
    fn distance_volume_never_goes_negative_past_the_falloff_edge() {
        let listener = Vec3::new(0.0, 0.0, 0.0);
        let source = Vec3::new(1000.0, 0.0, 0.0);
        let position = compute_basic_position(source, listener, 0.0, 1.0, 1.0);
        assert!(position.distance_amplitude >= 0.0);
    }
}
