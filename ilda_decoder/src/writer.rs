/*!
Interchange true-color writer.

Encodes a frame table back into the wire format using the explicit-RGB
record layouts: format 5 for flat frames, format 4 otherwise, closed by a
zero-record terminator header. The decoder reproduces the written table
exactly, which the round-trip tests lean on.
*/

use shared::point::{Frame, FrameTable};
use shared::wire::{self, Format, GroupHeader};

/// Encode a full frame table as a true-color interchange stream
pub fn write_frame_table(table: &FrameTable) -> Vec<u8> {
    let mut output = Vec::new();
    let total_frames = table.frame_count().min(u16::MAX as usize) as u16;

    for (index, frame) in table.frames().iter().enumerate() {
        write_frame(
            &mut output,
            frame,
            table.name(),
            table.company(),
            index.min(u16::MAX as usize) as u16,
            total_frames,
        );
    }

    write_terminator(&mut output, table.name(), table.company());
    output
}

/// Encode one frame group; format 5 when the frame is flat, format 4 otherwise
fn write_frame(
    output: &mut Vec<u8>,
    frame: &Frame,
    name: &str,
    company: &str,
    frame_number: u16,
    total_frames: u16,
) {
    let flat = frame.points().iter().all(|p| p.z == 0);
    let format = if flat {
        Format::TrueColor2d
    } else {
        Format::TrueColor3d
    };

    // The record count is a u16 on the wire
    let count = frame.len().min(u16::MAX as usize);

    let header = GroupHeader {
        format,
        name: name.to_string(),
        company: company.to_string(),
        record_count: count as u16,
        frame_number,
        total_frames,
        projector: 0,
    };
    output.extend_from_slice(&header.to_bytes());

    for point in &frame.points()[..count] {
        match format {
            Format::TrueColor3d => output.extend_from_slice(&wire::encode_true_color_3d(point)),
            Format::TrueColor2d => output.extend_from_slice(&wire::encode_true_color_2d(point)),
            _ => unreachable!("writer only emits true-color formats"),
        }
    }
}

/// Append the zero-record header that terminates the stream
fn write_terminator(output: &mut Vec<u8>, name: &str, company: &str) {
    let header = GroupHeader {
        format: Format::TrueColor2d,
        name: name.to_string(),
        company: company.to_string(),
        record_count: 0,
        frame_number: 0,
        total_frames: 0,
        projector: 0,
    };
    output.extend_from_slice(&header.to_bytes());
}
