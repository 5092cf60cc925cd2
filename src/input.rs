//! Detector output as a JSON-lines frame feed.
//!
//! Each non-blank line is one detection result:
//!
//! ```json
//! {"width":1280,"height":720,"hands":[{"handedness":"Right","landmarks":[[0,0.5,0.8]]}]}
//! ```
//!
//! Landmarks are `[id, x, y]`. Coordinates are normalized unless the line sets
//! `"normalized": false`, in which case they are taken as pixels.

use serde::Deserialize;
use std::{
    collections::HashSet,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};
use thiserror::Error;

use crate::landmark::{HandLandmark, Handedness, Landmark, LandmarkSet, PoseLandmark};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read frame feed: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: malformed frame: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: landmark id {id} appears twice in one instance")]
    DuplicateId { line: usize, id: usize },
    #[error("line {line}: landmark id {id} out of range (expected < {max})")]
    IdOutOfRange { line: usize, id: usize, max: usize },
    #[error("line {line}: frame size {width}x{height} outside 1..={max}", max = MAX_FRAME_SIDE)]
    FrameSize { line: usize, width: u32, height: u32 },
}

impl FeedError {
    /// Whether the feed can carry on with the next line.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FeedError::Io(_))
    }
}

/// Largest accepted frame width or height, in pixels.
pub const MAX_FRAME_SIDE: u32 = 8192;

pub fn frame_size_ok(width: u32, height: u32) -> bool {
    (1..=MAX_FRAME_SIDE).contains(&width) && (1..=MAX_FRAME_SIDE).contains(&height)
}

/// One frame of detector output, in pixel coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub width: u32,
    pub height: u32,
    /// In detector ranking order; index 0 is not guaranteed to be the same hand
    /// from one frame to the next.
    pub hands: Vec<LandmarkSet>,
    pub poses: Vec<LandmarkSet>,
}

impl Detection {
    pub fn primary_hand(&self) -> Option<&LandmarkSet> {
        self.hands.first()
    }

    pub fn primary_pose(&self) -> Option<&LandmarkSet> {
        self.poses.first()
    }
}

/// Anything that can hand out detections frame by frame.
pub trait FrameSource {
    /// `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Detection>, FeedError>;
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default = "default_normalized")]
    normalized: bool,
    #[serde(default)]
    hands: Vec<WireInstance>,
    #[serde(default)]
    poses: Vec<WireInstance>,
}

fn default_normalized() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct WireInstance {
    #[serde(default)]
    handedness: Option<String>,
    landmarks: Vec<(usize, f32, f32)>,
}

pub struct JsonLinesSource<R> {
    reader: R,
    line_no: usize,
    default_size: (u32, u32),
    buf: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    /// `width`/`height` apply to lines that do not carry their own frame size.
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        Self {
            reader,
            line_no: 0,
            default_size: (width, height),
            buf: String::new(),
        }
    }

    fn decode(&self, line: &str) -> Result<Detection, FeedError> {
        let wire: WireFrame = serde_json::from_str(line).map_err(|source| FeedError::Decode {
            line: self.line_no,
            source,
        })?;
        let width = wire.width.unwrap_or(self.default_size.0);
        let height = wire.height.unwrap_or(self.default_size.1);
        if !frame_size_ok(width, height) {
            return Err(FeedError::FrameSize {
                line: self.line_no,
                width,
                height,
            });
        }

        let convert = |inst: WireInstance, max: usize| -> Result<LandmarkSet, FeedError> {
            let mut seen = HashSet::with_capacity(inst.landmarks.len());
            let mut landmarks = Vec::with_capacity(inst.landmarks.len());
            for (id, x, y) in inst.landmarks {
                if id >= max {
                    return Err(FeedError::IdOutOfRange {
                        line: self.line_no,
                        id,
                        max,
                    });
                }
                if !seen.insert(id) {
                    return Err(FeedError::DuplicateId {
                        line: self.line_no,
                        id,
                    });
                }
                landmarks.push(Landmark::new(id, x, y));
            }
            let handedness = inst
                .handedness
                .as_deref()
                .map(Handedness::from_label)
                .unwrap_or_default();
            let set = LandmarkSet::new(landmarks).with_handedness(handedness);
            Ok(if wire.normalized {
                set.to_pixels(width, height)
            } else {
                set
            })
        };

        let hands = wire
            .hands
            .into_iter()
            .map(|h| convert(h, HandLandmark::COUNT))
            .collect::<Result<Vec<_>, _>>()?;
        let poses = wire
            .poses
            .into_iter()
            .map(|p| convert(p, PoseLandmark::COUNT))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Detection {
            width,
            height,
            hands,
            poses,
        })
    }
}

impl<R: BufRead> FrameSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<Detection>, FeedError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }
            return self.decode(line).map(Some);
        }
    }
}

/// Opens `path`, or stdin when no path (or `-`) is given.
pub fn open_feed(path: Option<&Path>) -> io::Result<Box<dyn BufRead>> {
    match path {
        Some(p) if p != Path::new("-") => Ok(Box::new(BufReader::new(File::open(p)?))),
        _ => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(text: &str) -> JsonLinesSource<Cursor<Vec<u8>>> {
        JsonLinesSource::new(Cursor::new(text.as_bytes().to_vec()), 1280, 720)
    }

    #[test]
    fn decodes_and_scales_hands() {
        let mut src = source(
            r#"{"hands":[{"handedness":"Right","landmarks":[[4,0.5,0.5],[3,0.25,0.1]]}]}"#,
        );
        let det = src.next_frame().unwrap().unwrap();
        assert_eq!((det.width, det.height), (1280, 720));
        let hand = det.primary_hand().unwrap();
        assert_eq!(hand.handedness(), Handedness::Right);
        assert_eq!(hand.get(4).unwrap().pixel(), (640, 360));
        assert_eq!(hand.get(3).unwrap().pixel(), (320, 72));
        assert!(det.primary_pose().is_none());
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn pixel_feeds_and_frame_size_override() {
        let mut src = source(
            "\n{\"width\":640,\"height\":480,\"normalized\":false,\"poses\":[{\"landmarks\":[[12,100.5,200.0]]}]}\n\n",
        );
        let det = src.next_frame().unwrap().unwrap();
        assert_eq!((det.width, det.height), (640, 480));
        let pose = det.primary_pose().unwrap();
        assert_eq!(pose.get(12).unwrap().x, 100.5);
        assert_eq!(pose.handedness(), Handedness::Unknown);
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn empty_detection_line() {
        let mut src = source("{}\n");
        let det = src.next_frame().unwrap().unwrap();
        assert!(det.hands.is_empty() && det.poses.is_empty());
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let mut src = source("{}\n\n{\"hands\": 3}\n");
        assert!(src.next_frame().unwrap().is_some());
        let err = src.next_frame().unwrap_err();
        assert!(matches!(err, FeedError::Decode { line: 3, .. }), "{err}");
    }

    #[test]
    fn rejects_bad_ids() {
        let mut src = source(r#"{"hands":[{"landmarks":[[4,0.1,0.1],[4,0.2,0.2]]}]}"#);
        assert!(matches!(
            src.next_frame(),
            Err(FeedError::DuplicateId { line: 1, id: 4 })
        ));
        let mut src = source(r#"{"hands":[{"landmarks":[[21,0.1,0.1]]}]}"#);
        assert!(matches!(
            src.next_frame(),
            Err(FeedError::IdOutOfRange { id: 21, max: 21, .. })
        ));
        // pose ids go up to 32
        let mut src = source(r#"{"poses":[{"landmarks":[[32,0.1,0.1]]}]}"#);
        assert!(src.next_frame().unwrap().is_some());
    }

    #[test]
    fn rejects_unusable_frame_sizes() {
        let mut src = source(
            "{\"width\":4294967295,\"height\":4294967295}\n{\"width\":0}\n{\"width\":100000,\"height\":100000}\n{\"width\":8192,\"height\":8192}\n",
        );
        let err = src.next_frame().unwrap_err();
        assert!(matches!(err, FeedError::FrameSize { line: 1, .. }), "{err}");
        assert!(err.is_recoverable());
        assert!(matches!(
            src.next_frame(),
            Err(FeedError::FrameSize { line: 2, width: 0, height: 720 })
        ));
        assert!(matches!(src.next_frame(), Err(FeedError::FrameSize { line: 3, .. })));
        // the source keeps going after a rejected line
        let det = src.next_frame().unwrap().unwrap();
        assert_eq!((det.width, det.height), (8192, 8192));
    }

    #[test]
    fn only_io_errors_are_fatal() {
        let io = FeedError::Io(io::Error::other("gone"));
        assert!(!io.is_recoverable());
        let mut src = source(r#"{"hands":[{"landmarks":[[4,0.1,0.1],[4,0.2,0.2]]}]}"#);
        assert!(src.next_frame().unwrap_err().is_recoverable());
    }
}
