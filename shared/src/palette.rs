/*!
Built-in indexed color palette.

The two legacy wire formats carry a palette index instead of explicit
color. This fixed 64-entry table resolves those indices; it is never
replaced at runtime (palette groups in a stream are skipped, not applied).
*/

use crate::protocol::PALETTE_SIZE;
use tracing::debug;

/// The fixed (red, green, blue) lookup table for palette-indexed records.
/// Laid out as the classic indexed ramp: reds through yellows, greens,
/// cyans, blues, magentas, then white fading to pink.
pub const DEFAULT_PALETTE: [(u8, u8, u8); PALETTE_SIZE] = [
    (255, 0, 0),
    (255, 16, 0),
    (255, 32, 0),
    (255, 48, 0),
    (255, 64, 0),
    (255, 80, 0),
    (255, 96, 0),
    (255, 112, 0),
    (255, 128, 0),
    (255, 144, 0),
    (255, 160, 0),
    (255, 176, 0),
    (255, 192, 0),
    (255, 208, 0),
    (255, 224, 0),
    (255, 240, 0),
    (255, 255, 0),
    (224, 255, 0),
    (192, 255, 0),
    (160, 255, 0),
    (128, 255, 0),
    (96, 255, 0),
    (64, 255, 0),
    (32, 255, 0),
    (0, 255, 0),
    (0, 255, 36),
    (0, 255, 73),
    (0, 255, 109),
    (0, 255, 146),
    (0, 255, 182),
    (0, 255, 219),
    (0, 255, 255),
    (0, 227, 255),
    (0, 198, 255),
    (0, 170, 255),
    (0, 142, 255),
    (0, 113, 255),
    (0, 85, 255),
    (0, 56, 255),
    (0, 28, 255),
    (0, 0, 255),
    (32, 0, 255),
    (64, 0, 255),
    (96, 0, 255),
    (128, 0, 255),
    (160, 0, 255),
    (192, 0, 255),
    (224, 0, 255),
    (255, 0, 255),
    (255, 32, 255),
    (255, 64, 255),
    (255, 96, 255),
    (255, 128, 255),
    (255, 160, 255),
    (255, 192, 255),
    (255, 224, 255),
    (255, 255, 255),
    (255, 224, 224),
    (255, 192, 192),
    (255, 160, 160),
    (255, 128, 128),
    (255, 96, 96),
    (255, 64, 64),
    (255, 32, 32),
];

/// Resolve a palette index to its (red, green, blue) triple.
/// Indices past the table end clamp to the last entry.
pub fn lookup(index: u8) -> (u8, u8, u8) {
    let i = index as usize;
    if i >= DEFAULT_PALETTE.len() {
        debug!("palette index {} out of range, clamping", index);
        return DEFAULT_PALETTE[DEFAULT_PALETTE.len() - 1];
    }
    DEFAULT_PALETTE[i]
}
