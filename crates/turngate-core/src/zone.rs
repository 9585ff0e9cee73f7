//! Zone geometry — which side of the monitored area a face occupies.

use crate::types::{DoorState, Rect};
use serde::Deserialize;

/// Zone membership policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneMode {
    /// The box's center point must fall strictly inside the zone.
    Center,
    /// The whole box must fall strictly inside the zone.
    Containment,
}

/// Zone rectangle configured as fractions of the frame size:
/// `x`/`y` top-left corner, `w`/`h` extent, all in `[0, 1]`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FractionalRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl FractionalRect {
    /// Resolve to pixel coordinates for a known frame size.
    pub fn resolve(&self, frame_width: u32, frame_height: u32) -> Rect {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        Rect::new(
            self.x * fw,
            self.y * fh,
            (self.x + self.w) * fw,
            (self.y + self.h) * fh,
        )
    }

    /// Whether the rectangle lies within the unit square.
    pub fn in_bounds(&self) -> bool {
        (0.0..=1.0).contains(&self.x)
            && (0.0..=1.0).contains(&self.y)
            && self.w > 0.0
            && self.h > 0.0
            && self.x + self.w <= 1.0
            && self.y + self.h <= 1.0
    }
}

/// Pixel-resolved zones, fixed once the first frame's size is known
/// and unchanged for the rest of the session.
#[derive(Debug, Clone, Copy)]
pub struct Zones {
    pub exit: Rect,
    pub entrance: Rect,
}

impl Zones {
    pub fn resolve(
        exit: &FractionalRect,
        entrance: &FractionalRect,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            exit: exit.resolve(frame_width, frame_height),
            entrance: entrance.resolve(frame_width, frame_height),
        }
    }

    /// Classify a face box. The exit zone is checked first, so when the
    /// configured zones overlap, exit wins; this precedence is a
    /// deliberate tie-break, the zones are not required to be disjoint.
    pub fn classify(&self, bbox: &Rect, mode: ZoneMode) -> DoorState {
        if in_zone(bbox, &self.exit, mode) {
            DoorState::Exit
        } else if in_zone(bbox, &self.entrance, mode) {
            DoorState::Entrance
        } else {
            DoorState::Closed
        }
    }
}

fn in_zone(bbox: &Rect, zone: &Rect, mode: ZoneMode) -> bool {
    match mode {
        ZoneMode::Center => {
            let (cx, cy) = bbox.center();
            zone.x1 < cx && cx < zone.x2 && zone.y1 < cy && cy < zone.y2
        }
        ZoneMode::Containment => {
            zone.x1 < bbox.x1 && bbox.x2 < zone.x2 && zone.y1 < bbox.y1 && bbox.y2 < zone.y2
        }
    }
}
