/*!
Interchange wire-format parsing and encoding.

This module provides the group header and per-format point record layouts
used throughout the decode pipeline. All multi-byte fields are big-endian
on the wire and are converted through explicit byte-slice functions.
*/

use crate::point::Point;
use crate::protocol::{HEADER_SIZE_BYTES, MAGIC};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Format selector values according to the interchange specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Format {
    /// 3D coordinates with a palette color index
    Indexed3d = 0,
    /// 2D coordinates with a palette color index
    Indexed2d = 1,
    /// One palette table entry (r, g, b)
    PaletteEntry = 2,
    /// 3D coordinates with explicit color
    TrueColor3d = 4,
    /// 2D coordinates with explicit color
    TrueColor2d = 5,
}

impl Format {
    /// Parse a format selector from a header byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Indexed3d),
            1 => Some(Self::Indexed2d),
            2 => Some(Self::PaletteEntry),
            4 => Some(Self::TrueColor3d),
            5 => Some(Self::TrueColor2d),
            _ => None,
        }
    }

    /// Size of one record of this format, in bytes
    pub fn record_size(self) -> usize {
        match self {
            Self::Indexed3d => 8,
            Self::Indexed2d => 6,
            Self::PaletteEntry => 3,
            Self::TrueColor3d => 10,
            Self::TrueColor2d => 8,
        }
    }

    /// Check if this is a palette table group
    pub fn is_palette(self) -> bool {
        matches!(self, Self::PaletteEntry)
    }

    /// Check if records of this format carry a Z coordinate
    pub fn has_z(self) -> bool {
        matches!(self, Self::Indexed3d | Self::TrueColor3d)
    }

    /// Check if records of this format reference the color palette
    pub fn is_indexed(self) -> bool {
        matches!(self, Self::Indexed3d | Self::Indexed2d)
    }
}

/// Errors that can occur during wire-format parsing
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("invalid magic tag: {0:02X?}")]
    BadMagic([u8; 4]),

    #[error("unknown format selector: {0}")]
    UnknownFormat(u8),

    #[error("truncated header: expected {expected} bytes, got {got}")]
    TruncatedHeader { expected: usize, got: usize },

    #[error("truncated record group: expected {expected} bytes, got {got}")]
    TruncatedGroup { expected: usize, got: usize },
}

/// A 32-byte group header as defined by the interchange format
#[derive(Debug, Clone, PartialEq)]
pub struct GroupHeader {
    pub format: Format,
    pub name: String,
    pub company: String,
    pub record_count: u16,
    pub frame_number: u16,
    pub total_frames: u16,
    pub projector: u8,
}

impl GroupHeader {
    /// Parse a group header from 32 bytes of raw data
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE_BYTES]) -> Result<Self, RecordError> {
        if bytes[0..4] != MAGIC {
            return Err(RecordError::BadMagic([bytes[0], bytes[1], bytes[2], bytes[3]]));
        }

        let format = Format::from_u8(bytes[7]).ok_or(RecordError::UnknownFormat(bytes[7]))?;

        Ok(GroupHeader {
            format,
            name: read_fixed_string(&bytes[8..16]),
            company: read_fixed_string(&bytes[16..24]),
            record_count: u16::from_be_bytes([bytes[24], bytes[25]]),
            frame_number: u16::from_be_bytes([bytes[26], bytes[27]]),
            total_frames: u16::from_be_bytes([bytes[28], bytes[29]]),
            projector: bytes[30],
        })
    }

    /// Convert the header back to its 32-byte wire image
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE_BYTES] {
        let mut bytes = [0u8; HEADER_SIZE_BYTES];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[7] = self.format as u8;
        write_fixed_string(&mut bytes[8..16], &self.name);
        write_fixed_string(&mut bytes[16..24], &self.company);
        bytes[24..26].copy_from_slice(&self.record_count.to_be_bytes());
        bytes[26..28].copy_from_slice(&self.frame_number.to_be_bytes());
        bytes[28..30].copy_from_slice(&self.total_frames.to_be_bytes());
        bytes[30] = self.projector;
        bytes
    }
}

/// A palette-indexed record before palette resolution (formats 0 and 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedRecord {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub status: u8,
    pub color_index: u8,
}

/// Decode a format 0 record: 3D position plus palette index
pub fn decode_indexed_3d(bytes: &[u8; 8]) -> IndexedRecord {
    IndexedRecord {
        x: i16::from_be_bytes([bytes[0], bytes[1]]),
        y: i16::from_be_bytes([bytes[2], bytes[3]]),
        z: i16::from_be_bytes([bytes[4], bytes[5]]),
        status: bytes[6],
        color_index: bytes[7],
    }
}

/// Decode a format 1 record: 2D position plus palette index, Z forced to 0
pub fn decode_indexed_2d(bytes: &[u8; 6]) -> IndexedRecord {
    IndexedRecord {
        x: i16::from_be_bytes([bytes[0], bytes[1]]),
        y: i16::from_be_bytes([bytes[2], bytes[3]]),
        z: 0,
        status: bytes[4],
        color_index: bytes[5],
    }
}

/// Decode a format 2 record: one palette table entry
pub fn decode_palette_entry(bytes: &[u8; 3]) -> (u8, u8, u8) {
    (bytes[0], bytes[1], bytes[2])
}

/// Decode a format 4 record: 3D position with explicit color.
/// Color bytes are ordered blue, green, red on the wire.
pub fn decode_true_color_3d(bytes: &[u8; 10]) -> Point {
    Point {
        x: i16::from_be_bytes([bytes[0], bytes[1]]),
        y: i16::from_be_bytes([bytes[2], bytes[3]]),
        z: i16::from_be_bytes([bytes[4], bytes[5]]),
        status: bytes[6],
        blue: bytes[7],
        green: bytes[8],
        red: bytes[9],
    }
}

/// Decode a format 5 record: 2D position with explicit color, Z forced to 0
pub fn decode_true_color_2d(bytes: &[u8; 8]) -> Point {
    Point {
        x: i16::from_be_bytes([bytes[0], bytes[1]]),
        y: i16::from_be_bytes([bytes[2], bytes[3]]),
        z: 0,
        status: bytes[4],
        blue: bytes[5],
        green: bytes[6],
        red: bytes[7],
    }
}

/// Encode a point as a format 4 record
pub fn encode_true_color_3d(point: &Point) -> [u8; 10] {
    let mut bytes = [0u8; 10];
    bytes[0..2].copy_from_slice(&point.x.to_be_bytes());
    bytes[2..4].copy_from_slice(&point.y.to_be_bytes());
    bytes[4..6].copy_from_slice(&point.z.to_be_bytes());
    bytes[6] = point.status;
    bytes[7] = point.blue;
    bytes[8] = point.green;
    bytes[9] = point.red;
    bytes
}

/// Encode a point as a format 5 record; the Z coordinate is discarded
pub fn encode_true_color_2d(point: &Point) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes[0..2].copy_from_slice(&point.x.to_be_bytes());
    bytes[2..4].copy_from_slice(&point.y.to_be_bytes());
    bytes[4] = point.status;
    bytes[5] = point.blue;
    bytes[6] = point.green;
    bytes[7] = point.red;
    bytes
}

/// Read a fixed-length name field, stopping at the first NUL
fn read_fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

/// Write a fixed-length name field, padded with zeros
fn write_fixed_string(field: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    let copy_len = bytes.len().min(field.len());
    field[..copy_len].copy_from_slice(&bytes[..copy_len]);
    for slot in field[copy_len..].iter_mut() {
        *slot = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!(Format::from_u8(0), Some(Format::Indexed3d));
        assert_eq!(Format::from_u8(2), Some(Format::PaletteEntry));
        assert_eq!(Format::from_u8(5), Some(Format::TrueColor2d));
        assert_eq!(Format::from_u8(3), None);
        assert_eq!(Format::from_u8(6), None);
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(Format::Indexed3d.record_size(), 8);
        assert_eq!(Format::Indexed2d.record_size(), 6);
        assert_eq!(Format::PaletteEntry.record_size(), 3);
        assert_eq!(Format::TrueColor3d.record_size(), 10);
        assert_eq!(Format::TrueColor2d.record_size(), 8);
    }

    #[test]
    fn test_header_roundtrip() {
        let header = GroupHeader {
            format: Format::TrueColor3d,
            name: "TESTFRM".to_string(),
            company: "SCANENG".to_string(),
            record_count: 1234,
            frame_number: 7,
            total_frames: 42,
            projector: 3,
        };

        let bytes = header.to_bytes();
        let parsed = GroupHeader::from_bytes(&bytes).unwrap();

        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_wire_layout() {
        let header = GroupHeader {
            format: Format::Indexed3d,
            name: "A".to_string(),
            company: String::new(),
            record_count: 0x0102,
            frame_number: 0x0304,
            total_frames: 0x0506,
            projector: 9,
        };

        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"ILDA");
        assert_eq!(bytes[4..7], [0, 0, 0]);
        assert_eq!(bytes[7], 0);
        assert_eq!(bytes[8], b'A');
        assert_eq!(bytes[24..26], [0x01, 0x02]);
        assert_eq!(bytes[26..28], [0x03, 0x04]);
        assert_eq!(bytes[28..30], [0x05, 0x06]);
        assert_eq!(bytes[30], 9);
        assert_eq!(bytes[31], 0);
    }

    #[test]
    fn test_header_bad_magic() {
        let mut bytes = GroupHeader {
            format: Format::Indexed3d,
            name: String::new(),
            company: String::new(),
            record_count: 1,
            frame_number: 0,
            total_frames: 1,
            projector: 0,
        }
        .to_bytes();
        bytes[0] = b'X';

        assert!(matches!(
            GroupHeader::from_bytes(&bytes),
            Err(RecordError::BadMagic(_))
        ));
    }

    #[test]
    fn test_header_unknown_format() {
        let mut bytes = [0u8; HEADER_SIZE_BYTES];
        bytes[0..4].copy_from_slice(b"ILDA");
        bytes[7] = 3;

        assert!(matches!(
            GroupHeader::from_bytes(&bytes),
            Err(RecordError::UnknownFormat(3))
        ));
    }

    #[test]
    fn test_indexed_3d_big_endian() {
        // x = 0x1234, y = -2 (0xFFFE), z = 0x0100
        let record = decode_indexed_3d(&[0x12, 0x34, 0xFF, 0xFE, 0x01, 0x00, 0x40, 7]);
        assert_eq!(record.x, 0x1234);
        assert_eq!(record.y, -2);
        assert_eq!(record.z, 0x0100);
        assert_eq!(record.status, 0x40);
        assert_eq!(record.color_index, 7);
    }

    #[test]
    fn test_indexed_2d_forces_z() {
        let record = decode_indexed_2d(&[0x00, 0x64, 0xFF, 0x9C, 0x80, 1]);
        assert_eq!(record.x, 100);
        assert_eq!(record.y, -100);
        assert_eq!(record.z, 0);
        assert_eq!(record.status, 0x80);
        assert_eq!(record.color_index, 1);
    }

    #[test]
    fn test_true_color_wire_order_is_bgr() {
        // status 0, then blue=1, green=2, red=3 on the wire
        let point = decode_true_color_3d(&[0, 0, 0, 0, 0, 0, 0, 1, 2, 3]);
        assert_eq!(point.blue, 1);
        assert_eq!(point.green, 2);
        assert_eq!(point.red, 3);
    }

    #[test]
    fn test_true_color_roundtrip() {
        let point = Point {
            x: -12345,
            y: 6789,
            z: 321,
            status: 0x80,
            red: 10,
            green: 20,
            blue: 30,
        };

        assert_eq!(decode_true_color_3d(&encode_true_color_3d(&point)), point);

        let flat = Point { z: 0, ..point };
        assert_eq!(decode_true_color_2d(&encode_true_color_2d(&flat)), flat);
    }
}
