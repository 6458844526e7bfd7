/*!
# Shared Types and Utilities

This crate contains common types and utilities shared between all Rust components
in the galvo projector control system.

## Core Types

- [`Point`] - normalized laser point (position, status, color)
- [`Frame`] - one displayable image as an ordered point sequence
- [`FrameTable`] - all frames decoded from one interchange file
- [`Transform`] - per-point geometry and intensity transform

## Modules

- [`point`] - point, frame and frame-table data structures
- [`wire`] - interchange-format headers and records
- [`palette`] - built-in indexed color palette
- [`transform`] - transform model and rotation matrix
- [`trig`] - tenths-of-degree sine lookup table
- [`error`] - common error types
*/

pub mod error;
pub mod palette;
pub mod point;
pub mod transform;
pub mod trig;
pub mod wire;

// Re-export commonly used types
pub use error::{ProjectorError, Result};
pub use point::{Frame, FrameTable, Point};
pub use transform::{Transform, TransformUpdate};
pub use wire::{Format, GroupHeader, RecordError};

/// Version information for the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol constants
pub mod protocol {
    /// Magic tag opening every group header
    pub const MAGIC: [u8; 4] = *b"ILDA";

    /// Size of a group header in bytes
    pub const HEADER_SIZE_BYTES: usize = 32;

    /// Status bit: laser off while traversing this point
    pub const STATUS_BLANKED: u8 = 0x40;

    /// Status bit: final point of the frame
    pub const STATUS_LAST: u8 = 0x80;

    /// Fixed point-arena capacity for one loaded file
    pub const ARENA_POINT_CAPACITY: usize = 65_536;

    /// Maximum number of frames per loaded file
    pub const MAX_FRAMES: usize = 512;

    /// Number of entries in the built-in indexed palette
    pub const PALETTE_SIZE: usize = 64;

    /// Sine table resolution: entries per full revolution (tenths of a degree)
    pub const DEG10_PER_REV: u16 = 3600;
}
