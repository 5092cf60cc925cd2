//! Finger up/down classification from hand landmarks.

use serde::Serialize;

use crate::landmark::{HandLandmark, Handedness, LandmarkSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    pub fn tip(self) -> HandLandmark {
        match self {
            Finger::Thumb => HandLandmark::ThumbTip,
            Finger::Index => HandLandmark::IndexFingerTip,
            Finger::Middle => HandLandmark::MiddleFingerTip,
            Finger::Ring => HandLandmark::RingFingerTip,
            Finger::Pinky => HandLandmark::PinkyTip,
        }
    }

    /// The joint the tip is compared against: IP for the thumb, PIP otherwise.
    pub fn reference_joint(self) -> HandLandmark {
        match self {
            Finger::Thumb => HandLandmark::ThumbIp,
            Finger::Index => HandLandmark::IndexFingerPip,
            Finger::Middle => HandLandmark::MiddleFingerPip,
            Finger::Ring => HandLandmark::RingFingerPip,
            Finger::Pinky => HandLandmark::PinkyPip,
        }
    }
}

/// Up/down state of `[thumb, index, middle, ring, pinky]`; serializes as five 0/1 values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "[u8; 5]")]
pub struct FingerVector([bool; 5]);

impl FingerVector {
    /// Any nonzero entry counts as up.
    pub fn from_bits(bits: [u8; 5]) -> Self {
        Self(bits.map(|b| b != 0))
    }

    pub fn is_up(&self, finger: Finger) -> bool {
        self.0[finger as usize]
    }

    pub fn bits(&self) -> [u8; 5] {
        self.0.map(u8::from)
    }

    pub fn total(&self) -> u8 {
        self.0.iter().filter(|&&up| up).count() as u8
    }
}

impl From<FingerVector> for [u8; 5] {
    fn from(v: FingerVector) -> Self {
        v.bits()
    }
}

/// Classifies each finger of one hand as up or down.
///
/// The thumb moves sideways, so it is judged on x against its IP joint, with the
/// comparison mirrored for right hands. The other fingers are up when the tip sits
/// strictly above (smaller y than) the PIP joint. A finger whose landmarks are
/// missing is reported down.
pub fn classify_fingers(hand: &LandmarkSet) -> (FingerVector, u8) {
    let mut up = [false; 5];
    for finger in Finger::ALL {
        let (Some(tip), Some(joint)) = (
            hand.get(finger.tip().id()),
            hand.get(finger.reference_joint().id()),
        ) else {
            continue;
        };
        up[finger as usize] = match finger {
            Finger::Thumb => match hand.handedness() {
                Handedness::Right => tip.x < joint.x,
                Handedness::Left | Handedness::Unknown => tip.x > joint.x,
            },
            _ => tip.y < joint.y,
        };
    }
    let v = FingerVector(up);
    (v, v.total())
}
