use serde::Serialize;

use crate::fingers::{Finger, FingerVector};
use crate::landmark::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Index and middle up: the cursor moves without drawing.
    Navigate,
    /// A navigate frame whose cursor is over a header button.
    Select,
    /// Only the index finger up.
    Draw,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectionEvent {
    pub region: usize,
}

/// The button strip along the top edge of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    pub frame_width: i32,
    pub height: i32,
    pub region_width: i32,
    pub regions: usize,
}

impl HeaderLayout {
    /// Splits the frame width evenly into `regions` buttons.
    pub fn new(frame_width: u32, height: u32, regions: usize) -> Self {
        let region_width = (frame_width / regions.max(1) as u32).max(1);
        Self {
            frame_width: frame_width as i32,
            height: height as i32,
            region_width: region_width as i32,
            regions,
        }
    }

    /// Returns the button under `cursor`, if any.
    ///
    /// The integer-division remainder at the right edge belongs to the last button.
    pub fn hit(&self, (x, y): Point) -> Option<usize> {
        if self.regions == 0
            || !(0..self.height).contains(&y)
            || !(0..self.frame_width).contains(&x)
        {
            return None;
        }
        Some(((x / self.region_width) as usize).min(self.regions - 1))
    }
}

/// Maps a finger vector to an interaction mode; the first matching rule wins.
pub fn resolve_mode(fingers: &FingerVector) -> Mode {
    let index = fingers.is_up(Finger::Index);
    let middle = fingers.is_up(Finger::Middle);
    if index && middle {
        Mode::Navigate
    } else if index {
        Mode::Draw
    } else {
        Mode::Idle
    }
}

#[derive(Debug, Clone)]
pub struct GestureModeResolver {
    header: HeaderLayout,
}

impl GestureModeResolver {
    pub fn new(header: HeaderLayout) -> Self {
        Self { header }
    }

    /// Resolves the mode of the primary hand and hit-tests the header while navigating.
    pub fn resolve(&self, fingers: &FingerVector, cursor: Point) -> (Mode, Option<SelectionEvent>) {
        match resolve_mode(fingers) {
            Mode::Navigate => match self.header.hit(cursor) {
                Some(region) => (Mode::Select, Some(SelectionEvent { region })),
                None => (Mode::Navigate, None),
            },
            mode => (mode, None),
        }
    }
}
