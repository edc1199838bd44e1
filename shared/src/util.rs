use once_cell::sync::Lazy;
use std::f32::consts::{PI, TAU};

const LOOKUP_TABLE_SIZE: usize = 720;

/// Precomputed sine and cosine values for equally spaced angles around the circle.
static SIN_COS_TABLE: Lazy<[(f32, f32); LOOKUP_TABLE_SIZE]> = Lazy::new(|| {
    let mut arr = [(0.0f32, 0.0f32); LOOKUP_TABLE_SIZE];
    let step = TAU / LOOKUP_TABLE_SIZE as f32;
    for (i, slot) in arr.iter_mut().enumerate() {
        let angle = i as f32 * step;
        *slot = (angle.sin(), angle.cos());
    }
    arr
});

/// Fast sine and cosine using lookup table. Angle normalized via rem_euclid.
#[inline(always)]
pub fn fast_sin_cos(angle: f32) -> (f32, f32) {
    if !angle.is_finite() {
        return (0.0, 1.0);
    }
    let frac = angle.rem_euclid(TAU) / TAU;
    let idx = ((frac * LOOKUP_TABLE_SIZE as f32).round() as usize) % LOOKUP_TABLE_SIZE;
    SIN_COS_TABLE[idx]
}

/// Normalizes an angle into (-PI, PI]. NaN and infinities map to 0.
pub fn wrap_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let mut a = angle.rem_euclid(TAU);
    if a > PI {
        a -= TAU;
    }
    if a <= -PI {
        a += TAU;
    }
    a
}

#[inline]
pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
