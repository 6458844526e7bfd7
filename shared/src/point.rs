/*!
Point, frame and frame-table data structures.

This module provides the normalized in-memory point representation the wire
formats decode into, and the frame table that owns everything decoded from
one interchange file.
*/

use crate::error::{ProjectorError, Result};
use crate::protocol::{ARENA_POINT_CAPACITY, MAX_FRAMES, STATUS_BLANKED, STATUS_LAST};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One normalized laser point: signed 16-bit position, status flags, color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub status: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Point {
    /// Create a lit point with explicit color
    pub fn lit(x: i16, y: i16, z: i16, red: u8, green: u8, blue: u8) -> Self {
        Self {
            x,
            y,
            z,
            status: 0,
            red,
            green,
            blue,
        }
    }

    /// Create a blanked traversal point
    pub fn blanked(x: i16, y: i16, z: i16) -> Self {
        Self {
            x,
            y,
            z,
            status: STATUS_BLANKED,
            red: 0,
            green: 0,
            blue: 0,
        }
    }

    /// Check the blanking flag
    pub fn is_blanked(&self) -> bool {
        self.status & STATUS_BLANKED != 0
    }

    /// Check the last-point flag
    pub fn is_last(&self) -> bool {
        self.status & STATUS_LAST != 0
    }

    /// Set or clear the last-point flag
    pub fn set_last(&mut self, last: bool) {
        if last {
            self.status |= STATUS_LAST;
        } else {
            self.status &= !STATUS_LAST;
        }
    }
}

/// One displayable image: an ordered point sequence whose final point
/// carries the last-point flag. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    points: Vec<Point>,
}

impl Frame {
    /// Build a frame from a point sequence, enforcing the last-point
    /// invariant: exactly one LAST flag, on the final point.
    pub fn new(mut points: Vec<Point>) -> Result<Self> {
        if points.is_empty() {
            return Err(ProjectorError::invalid_frame(
                "frame must contain at least one point",
            ));
        }

        let last = points.len() - 1;
        for point in &mut points[..last] {
            point.set_last(false);
        }
        points[last].set_last(true);

        Ok(Self { points })
    }

    /// The built-in stand-in frame scanned when no file is loaded:
    /// a single blanked point at the origin.
    pub fn placeholder() -> Self {
        let mut point = Point::blanked(0, 0, 0);
        point.set_last(true);
        Self {
            points: vec![point],
        }
    }

    /// Get the point sequence
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Get the number of points (always at least 1)
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// A frame is never empty; provided for completeness
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// All frames decoded from one interchange file, packed behind a fixed
/// point budget. Rebuilt in full on every load.
#[derive(Debug, Clone)]
pub struct FrameTable {
    name: String,
    company: String,
    frames: Vec<Arc<Frame>>,
    points_used: usize,
    point_capacity: usize,
}

impl FrameTable {
    /// Create an empty table with the fixed protocol arena capacity
    pub fn new() -> Self {
        Self::with_capacity(ARENA_POINT_CAPACITY)
    }

    /// Create an empty table with an explicit point budget
    pub fn with_capacity(point_capacity: usize) -> Self {
        Self {
            name: String::new(),
            company: String::new(),
            frames: Vec::new(),
            points_used: 0,
            point_capacity,
        }
    }

    /// Record the display names carried by the group headers
    pub fn set_names(&mut self, name: &str, company: &str) {
        self.name = name.to_string();
        self.company = company.to_string();
    }

    /// Append a frame, charging its points against the arena budget
    pub fn push_frame(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(ProjectorError::capacity(format!(
                "frame limit reached ({} frames)",
                MAX_FRAMES
            )));
        }

        if self.points_used + frame.len() > self.point_capacity {
            return Err(ProjectorError::capacity(format!(
                "{} points used, {} more requested, capacity {}",
                self.points_used,
                frame.len(),
                self.point_capacity
            )));
        }

        self.points_used += frame.len();
        self.frames.push(Arc::new(frame));
        Ok(())
    }

    /// Short display name (frame name field)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Long display name (company name field)
    pub fn company(&self) -> &str {
        &self.company
    }

    /// Get the number of frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Check if the table holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Get a shared handle to one frame
    pub fn frame(&self, index: usize) -> Option<Arc<Frame>> {
        self.frames.get(index).cloned()
    }

    /// Get all frames
    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    /// Total points charged against the arena
    pub fn points_used(&self) -> usize {
        self.points_used
    }
}

impl Default for FrameTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_flags() {
        let mut point = Point::lit(1, 2, 3, 255, 0, 0);
        assert!(!point.is_blanked());
        assert!(!point.is_last());

        point.set_last(true);
        assert!(point.is_last());
        point.set_last(false);
        assert!(!point.is_last());

        assert!(Point::blanked(0, 0, 0).is_blanked());
    }

    #[test]
    fn test_frame_enforces_last_invariant() {
        let mut mid = Point::lit(1, 1, 0, 0, 255, 0);
        mid.set_last(true); // wire lied; the frame must normalize it away

        let frame = Frame::new(vec![Point::lit(0, 0, 0, 255, 0, 0), mid, Point::lit(2, 2, 0, 0, 0, 255)])
            .unwrap();

        let last_flags: Vec<bool> = frame.points().iter().map(Point::is_last).collect();
        assert_eq!(last_flags, vec![false, false, true]);
    }

    #[test]
    fn test_frame_rejects_empty() {
        assert!(Frame::new(Vec::new()).is_err());
    }

    #[test]
    fn test_placeholder_frame() {
        let frame = Frame::placeholder();
        assert_eq!(frame.len(), 1);
        let point = frame.points()[0];
        assert!(point.is_blanked());
        assert!(point.is_last());
        assert_eq!((point.x, point.y, point.z), (0, 0, 0));
    }

    #[test]
    fn test_table_capacity_check() {
        let mut table = FrameTable::with_capacity(5);
        let points = vec![Point::blanked(0, 0, 0); 3];

        assert!(table.push_frame(Frame::new(points.clone()).unwrap()).is_ok());
        assert_eq!(table.points_used(), 3);

        // 3 + 3 > 5: must fail and leave the table untouched
        let result = table.push_frame(Frame::new(points).unwrap());
        assert!(matches!(result, Err(ProjectorError::Capacity(_))));
        assert_eq!(table.frame_count(), 1);
        assert_eq!(table.points_used(), 3);
    }
}
