//! Per-instance landmark sets as reported by the hand/pose detector.

use serde::Serialize;
use thiserror::Error;

/// Pixel position in frame coordinates (origin top-left, y grows downward).
pub type Point = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub id: usize,
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(id: usize, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }

    /// Truncates to the pixel grid.
    pub fn pixel(&self) -> Point {
        (self.x as i32, self.y as i32)
    }

    pub fn xy(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Handedness {
    Left,
    Right,
    #[default]
    Unknown,
}

impl Handedness {
    /// Maps a detector classification label; anything unrecognized is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case("right") {
            Handedness::Right
        } else if label.eq_ignore_ascii_case("left") {
            Handedness::Left
        } else {
            Handedness::Unknown
        }
    }
}

/// Names for the 21 hand landmarks, in detector id order.
///
/// - **CMC**: carpometacarpal joint, the lowest thumb joint near the wrist.
/// - **MCP**: metacarpophalangeal joint (the knuckles).
/// - **IP** / **PIP**: the (proximal) interphalangeal joint above the MCP.
/// - **DIP**: distal interphalangeal joint, just below the tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    pub const COUNT: usize = 21;

    pub fn id(self) -> usize {
        self as usize
    }
}

/// The arm points of the 33-point body pose model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseLandmark {
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
}

impl PoseLandmark {
    pub const COUNT: usize = 33;

    pub fn id(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LandmarkError {
    #[error("landmark {0} missing from set")]
    Missing(usize),
}

/// Axis-aligned bounds of a landmark set, serialized as `[x_min, y_min, x_max, y_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "[f32; 4]")]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x_min, b.y_min, b.x_max, b.y_max]
    }
}

/// Landmarks of exactly one detected hand or body, in detection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
    handedness: Handedness,
}

impl LandmarkSet {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self {
            landmarks,
            handedness: Handedness::Unknown,
        }
    }

    /// Builds a set whose ids are the positions in `points`.
    pub fn from_points(points: &[(f32, f32)]) -> Self {
        Self::new(
            points
                .iter()
                .enumerate()
                .map(|(id, &(x, y))| Landmark::new(id, x, y))
                .collect(),
        )
    }

    pub fn with_handedness(mut self, handedness: Handedness) -> Self {
        self.handedness = handedness;
        self
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    pub fn get(&self, id: usize) -> Option<&Landmark> {
        // full sets are stored in id order, so try the direct slot first
        match self.landmarks.get(id) {
            Some(lm) if lm.id == id => Some(lm),
            _ => self.landmarks.iter().find(|lm| lm.id == id),
        }
    }

    pub fn require(&self, id: usize) -> Result<&Landmark, LandmarkError> {
        self.get(id).ok_or(LandmarkError::Missing(id))
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        let first = self.landmarks.first()?;
        let init = BoundingBox {
            x_min: first.x,
            y_min: first.y,
            x_max: first.x,
            y_max: first.y,
        };
        Some(self.landmarks.iter().fold(init, |b, lm| BoundingBox {
            x_min: b.x_min.min(lm.x),
            y_min: b.y_min.min(lm.y),
            x_max: b.x_max.max(lm.x),
            y_max: b.y_max.max(lm.y),
        }))
    }

    /// Maps normalized `[0,1]` coordinates onto a `width`×`height` pixel grid.
    pub fn to_pixels(&self, width: u32, height: u32) -> LandmarkSet {
        let (w, h) = (width as f32, height as f32);
        LandmarkSet {
            landmarks: self
                .landmarks
                .iter()
                .map(|lm| Landmark::new(lm.id, (lm.x * w).trunc(), (lm.y * h).trunc()))
                .collect(),
            handedness: self.handedness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handedness_labels() {
        assert_eq!(Handedness::from_label("Right"), Handedness::Right);
        assert_eq!(Handedness::from_label(" left "), Handedness::Left);
        assert_eq!(Handedness::from_label("both"), Handedness::Unknown);
        assert_eq!(Handedness::from_label(""), Handedness::Unknown);
    }

    #[test]
    fn lookup_falls_back_to_scan() {
        let set = LandmarkSet::new(vec![Landmark::new(8, 1.0, 2.0), Landmark::new(6, 3.0, 4.0)]);
        assert_eq!(set.get(6).map(|lm| lm.x), Some(3.0));
        assert_eq!(set.get(8).map(|lm| lm.y), Some(2.0));
        assert!(set.get(0).is_none());
        assert_eq!(set.require(4), Err(LandmarkError::Missing(4)));
    }

    #[test]
    fn bbox_spans_all_points() {
        let set = LandmarkSet::from_points(&[(10.0, 40.0), (30.0, 5.0), (20.0, 25.0)]);
        let b = set.bbox().unwrap();
        assert_eq!((b.x_min, b.y_min, b.x_max, b.y_max), (10.0, 5.0, 30.0, 40.0));
        assert!(LandmarkSet::default().bbox().is_none());
    }

    #[test]
    fn pixel_conversion_truncates() {
        let set = LandmarkSet::from_points(&[(0.5, 0.25), (0.9999, 0.001)])
            .with_handedness(Handedness::Left);
        let px = set.to_pixels(1280, 720);
        assert_eq!(px.get(0).unwrap().pixel(), (640, 180));
        assert_eq!(px.get(1).unwrap().pixel(), (1279, 0));
        assert_eq!(px.handedness(), Handedness::Left);
    }

    #[test]
    fn named_ids_match_detector_convention() {
        assert_eq!(HandLandmark::ThumbIp.id(), 3);
        assert_eq!(HandLandmark::IndexFingerTip.id(), 8);
        assert_eq!(HandLandmark::PinkyTip.id(), HandLandmark::COUNT - 1);
        assert_eq!(PoseLandmark::RightElbow.id(), 14);
    }
}
