/*!
# Interchange Frame Decoder

Decodes the binary laser-graphics interchange format into a [`FrameTable`]:
a byte stream is walked as a sequence of (header, point-records) groups,
each supported wire variant is converted into the normalized point model,
and successful groups are appended until the stream terminates or a stop
condition is hit.

## Stop conditions

The walk stops on the first of: a record count of 0 (clean end of stream),
a magic-tag mismatch, an unknown format selector, a short read, or arena
exhaustion. Groups decoded before the stop are kept; the decode fails only
when no frame at all was produced.

## Usage

```no_run
let table = ilda_decoder::decode_file("show.ild").unwrap();
println!("{} frames, {} points", table.frame_count(), table.points_used());
```
*/

pub mod writer;

use shared::error::{ProjectorError, Result};
use shared::palette;
use shared::point::{Frame, FrameTable, Point};
use shared::protocol::HEADER_SIZE_BYTES;
use shared::wire::{self, Format, GroupHeader, IndexedRecord, RecordError};
use std::path::Path;
use tracing::{debug, warn};

/// Decode an interchange file from disk
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<FrameTable> {
    let data = std::fs::read(path.as_ref())?;
    decode_bytes(&data)
}

/// Decode an interchange byte stream into a frame table
pub fn decode_bytes(data: &[u8]) -> Result<FrameTable> {
    decode_into_table(data, FrameTable::new())
}

/// Inner group walk with a caller-supplied arena, so capacity limits stay
/// testable without a 64k-point fixture
fn decode_into_table(data: &[u8], mut table: FrameTable) -> Result<FrameTable> {
    let mut offset = 0usize;
    let mut palette_groups = 0u32;

    loop {
        let remaining = &data[offset..];
        if remaining.is_empty() {
            debug!("stream ended without terminator after {} frames", table.frame_count());
            break;
        }
        if remaining.len() < HEADER_SIZE_BYTES {
            warn!(
                "{}",
                RecordError::TruncatedHeader {
                    expected: HEADER_SIZE_BYTES,
                    got: remaining.len(),
                }
            );
            break;
        }

        let header_bytes: [u8; HEADER_SIZE_BYTES] = remaining[..HEADER_SIZE_BYTES]
            .try_into()
            .expect("header slice is exactly 32 bytes");

        let header = match GroupHeader::from_bytes(&header_bytes) {
            Ok(header) => header,
            Err(error) => {
                // A stream that never presented a valid group is "no data";
                // garbage after valid groups just ends the walk.
                if table.is_empty() && palette_groups == 0 {
                    return Err(error.into());
                }
                warn!("stopping at offset {}: {}", offset, error);
                break;
            }
        };
        offset += HEADER_SIZE_BYTES;

        if header.record_count == 0 {
            debug!("end-of-stream header after {} frames", table.frame_count());
            break;
        }

        let record_size = header.format.record_size();
        let group_bytes = header.record_count as usize * record_size;
        let Some(records) = data.get(offset..offset + group_bytes) else {
            warn!(
                "{}",
                RecordError::TruncatedGroup {
                    expected: group_bytes,
                    got: data.len() - offset,
                }
            );
            break;
        };
        offset += group_bytes;

        if header.format.is_palette() {
            // Palette groups are consumed but never enter the table, and
            // never replace the built-in palette
            palette_groups += 1;
            debug!(
                "skipping palette group \"{}\" ({} entries)",
                header.name, header.record_count
            );
            continue;
        }

        if table.is_empty() {
            table.set_names(&header.name, &header.company);
        }

        let points = decode_points(header.format, records);
        let frame = match Frame::new(points) {
            Ok(frame) => frame,
            Err(error) => {
                warn!("dropping group at offset {}: {}", offset, error);
                break;
            }
        };

        match table.push_frame(frame) {
            Ok(()) => {
                debug!(
                    "frame {} decoded: {} points, format {:?}",
                    table.frame_count() - 1,
                    header.record_count,
                    header.format
                );
            }
            Err(error) => {
                if table.is_empty() {
                    return Err(error);
                }
                warn!("arena exhausted, keeping {} frames: {}", table.frame_count(), error);
                break;
            }
        }
    }

    if table.is_empty() {
        return Err(ProjectorError::empty_result(
            "stream contained no point groups",
        ));
    }

    debug!(
        "decode complete: {} frames, {} points, {} palette groups skipped",
        table.frame_count(),
        table.points_used(),
        palette_groups
    );
    Ok(table)
}

/// Convert one group's records into normalized points
fn decode_points(format: Format, records: &[u8]) -> Vec<Point> {
    let record_size = format.record_size();
    let mut points = Vec::with_capacity(records.len() / record_size);

    for chunk in records.chunks_exact(record_size) {
        let point = match format {
            Format::Indexed3d => {
                let record: &[u8; 8] = chunk.try_into().expect("chunk matches record size");
                resolve_indexed(wire::decode_indexed_3d(record))
            }
            Format::Indexed2d => {
                let record: &[u8; 6] = chunk.try_into().expect("chunk matches record size");
                resolve_indexed(wire::decode_indexed_2d(record))
            }
            Format::TrueColor3d => {
                let record: &[u8; 10] = chunk.try_into().expect("chunk matches record size");
                wire::decode_true_color_3d(record)
            }
            Format::TrueColor2d => {
                let record: &[u8; 8] = chunk.try_into().expect("chunk matches record size");
                wire::decode_true_color_2d(record)
            }
            Format::PaletteEntry => unreachable!("palette groups are skipped before point decode"),
        };
        points.push(point);
    }

    points
}

/// Resolve a palette-indexed record through the built-in palette
fn resolve_indexed(record: IndexedRecord) -> Point {
    let (red, green, blue) = palette::lookup(record.color_index);
    Point {
        x: record.x,
        y: record.y,
        z: record.z,
        status: record.status,
        red,
        green,
        blue,
    }
}
