/*!
Per-point geometry and intensity transform.

Callers describe a transform with [`TransformUpdate`] (angles, scale,
offsets, intensity, lookahead); [`Transform`] is the applied form with the
3x3 rotation matrix already derived. The scan engine reads one `Transform`
per tick and promotes a staged update only at the frame boundary.
*/

use crate::trig::{cos_deg10, normalize_angle, sin_deg10};
use serde::{Deserialize, Serialize};

/// Caller-facing transform parameters; the matrix is derived on application
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformUpdate {
    /// Output position offset, applied after rotation
    pub position: (i16, i16),

    /// Rotation center offset, applied before rotation
    pub rotation_center: (i16, i16, i16),

    /// Signed index shift for color/blank resolution
    pub lookahead: i16,

    /// Output intensity scalar in [0, 1]
    pub intensity: f32,

    /// Per-axis scale factors
    pub scale: [f32; 3],

    /// Axis rotation angles in tenths of a degree
    pub angles: [u16; 3],
}

impl Default for TransformUpdate {
    fn default() -> Self {
        Self {
            position: (0, 0),
            rotation_center: (0, 0, 0),
            lookahead: 0,
            intensity: 1.0,
            scale: [1.0, 1.0, 1.0],
            angles: [0, 0, 0],
        }
    }
}

/// Fully derived transform read by the scan engine every tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: (i16, i16),
    pub rotation_center: (i16, i16, i16),
    pub lookahead: i16,
    pub intensity: f32,
    pub scale: [f32; 3],
    pub angles: [u16; 3],
    /// Row-major rotation matrix, composed as Rx * Ry * Rz
    pub matrix: [[f32; 3]; 3],
}

impl Transform {
    /// The no-op transform: identity rotation, unit scale, full intensity
    pub fn identity() -> Self {
        Self::from_update(&TransformUpdate::default())
    }

    /// Derive the rotation matrix and build the applied transform
    pub fn from_update(update: &TransformUpdate) -> Self {
        let angles = [
            normalize_angle(update.angles[0]),
            normalize_angle(update.angles[1]),
            normalize_angle(update.angles[2]),
        ];

        Self {
            position: update.position,
            rotation_center: update.rotation_center,
            lookahead: update.lookahead,
            intensity: update.intensity.clamp(0.0, 1.0),
            scale: update.scale,
            angles,
            matrix: rotation_matrix(angles),
        }
    }
}

/// Compose the row-major rotation matrix Rx * Ry * Rz from tenths-of-degree
/// axis angles
pub fn rotation_matrix(angles: [u16; 3]) -> [[f32; 3]; 3] {
    let (sx, cx) = (sin_deg10(angles[0]), cos_deg10(angles[0]));
    let (sy, cy) = (sin_deg10(angles[1]), cos_deg10(angles[1]));
    let (sz, cz) = (sin_deg10(angles[2]), cos_deg10(angles[2]));

    let rx = [[1.0, 0.0, 0.0], [0.0, cx, -sx], [0.0, sx, cx]];
    let ry = [[cy, 0.0, sy], [0.0, 1.0, 0.0], [-sy, 0.0, cy]];
    let rz = [[cz, -sz, 0.0], [sz, cz, 0.0], [0.0, 0.0, 1.0]];

    mat_mul(&rx, &mat_mul(&ry, &rz))
}

fn mat_mul(a: &[[f32; 3]; 3], b: &[[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut out = [[0.0f32; 3]; 3];
    for (row, out_row) in out.iter_mut().enumerate() {
        for (col, cell) in out_row.iter_mut().enumerate() {
            *cell = a[row][0] * b[0][col] + a[row][1] * b[1][col] + a[row][2] * b[2][col];
        }
    }
    out
}
