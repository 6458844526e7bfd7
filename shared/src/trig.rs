/*!
Tenths-of-degree trigonometry lookup table.

Rotation angles arrive in tenths of a degree, so sine is served from a
3600-entry table indexed directly by the angle; cosine is the same table
offset by 90 degrees with wraparound.
*/

use crate::protocol::DEG10_PER_REV;
use std::sync::OnceLock;

/// Offset applied to the sine index to obtain cosine (90 degrees)
const COS_OFFSET_DEG10: u16 = 900;

static SIN_TABLE: OnceLock<Vec<f32>> = OnceLock::new();

fn sin_table() -> &'static [f32] {
    SIN_TABLE.get_or_init(|| {
        (0..DEG10_PER_REV)
            .map(|i| (f32::from(i) * 0.1).to_radians().sin())
            .collect()
    })
}

/// Normalize an axis angle in tenths of a degree.
/// Out-of-range values are treated as 0, not reduced modulo.
pub fn normalize_angle(angle: u16) -> u16 {
    if angle >= DEG10_PER_REV {
        0
    } else {
        angle
    }
}

/// Sine of an angle given in tenths of a degree
pub fn sin_deg10(angle: u16) -> f32 {
    sin_table()[(angle % DEG10_PER_REV) as usize]
}

/// Cosine of an angle given in tenths of a degree, via the 90-degree offset
pub fn cos_deg10(angle: u16) -> f32 {
    let index = (u32::from(angle) + u32::from(COS_OFFSET_DEG10)) % u32::from(DEG10_PER_REV);
    sin_table()[index as usize]
}
