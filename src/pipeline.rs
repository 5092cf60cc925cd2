use anyhow::Result;
use image::RgbImage;
use log::{debug, info, warn};
use serde::Serialize;
use std::{
    io::Write,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::config::Profile;
use crate::fingers::{FingerVector, classify_fingers};
use crate::gestures::{GestureModeResolver, HeaderLayout, Mode, SelectionEvent};
use crate::input::{Detection, FrameSource};
use crate::landmark::{BoundingBox, HandLandmark, Handedness};
use crate::paint::{PaintStrokeAccumulator, Segment, composite};
use crate::trainer::{AngleRepCounter, ArmJoints, RepCounterState, RepSink, Stage};

#[derive(Debug, Serialize)]
struct HandReport {
    handedness: Handedness,
    fingers: FingerVector,
    total: u8,
    bbox: Option<BoundingBox>,
}

#[derive(Debug, Serialize)]
struct CounterRecord {
    frame: usize,
    hands: Vec<HandReport>,
}

#[derive(Debug, Serialize)]
struct PainterRecord<'a> {
    frame: usize,
    mode: Mode,
    selection: Option<SelectionEvent>,
    tool: Option<&'a str>,
    segment: Option<Segment>,
}

#[derive(Debug, Serialize)]
struct TrainerRecord {
    frame: usize,
    angle: Option<f32>,
    stage: Option<Stage>,
    count: f32,
}

fn emit<W: Write, T: Serialize>(out: &mut W, record: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Drives `step` over every frame until the source runs dry or `stop` is raised.
///
/// A rejected feed line becomes an empty detection of the last accepted frame
/// size. Rejected lines ahead of the first accepted frame are skipped.
fn drive<S, F>(source: &mut S, stop: &AtomicBool, mut step: F) -> Result<usize>
where
    S: FrameSource,
    F: FnMut(usize, Detection) -> Result<()>,
{
    let mut frames = 0;
    let mut last_size: Option<(u32, u32)> = None;
    while !stop.load(Ordering::Relaxed) {
        let det = match source.next_frame() {
            Ok(Some(det)) => {
                last_size = Some((det.width, det.height));
                det
            }
            Ok(None) => break,
            Err(e) if e.is_recoverable() => {
                warn!("{e}; treating frame as empty");
                let Some((width, height)) = last_size else {
                    continue;
                };
                Detection {
                    width,
                    height,
                    ..Detection::default()
                }
            }
            Err(e) => return Err(e.into()),
        };
        step(frames, det)?;
        frames += 1;
    }
    if stop.load(Ordering::Relaxed) {
        info!("stop requested after {frames} frames");
    }
    Ok(frames)
}

/// Finger counter: reports the finger vector of every detected hand.
pub fn run_counter<S: FrameSource, W: Write>(
    source: &mut S,
    out: &mut W,
    stop: &AtomicBool,
) -> Result<usize> {
    let frames = drive(source, stop, |n, det| {
        let hands = det
            .hands
            .iter()
            .map(|hand| {
                let (fingers, total) = classify_fingers(hand);
                HandReport {
                    handedness: hand.handedness(),
                    fingers,
                    total,
                    bbox: hand.bbox(),
                }
            })
            .collect::<Vec<_>>();
        if let Some(h) = hands.first() {
            debug!("frame {n}: fingers {:?} total {}", h.fingers.bits(), h.total);
        }
        emit(out, &CounterRecord { frame: n, hands })
    })?;
    info!("counter: processed {frames} frames");
    Ok(frames)
}

/// Virtual painter: index finger draws, index+middle navigates and picks tools
/// from the header strip. Returns the final accumulator (and canvas).
pub fn run_painter<S: FrameSource, W: Write>(
    source: &mut S,
    profile: &Profile,
    out: &mut W,
    stop: &AtomicBool,
) -> Result<Option<PaintStrokeAccumulator>> {
    let painter = &profile.painter;
    // canvas and header are sized from the first frame
    let mut state: Option<(PaintStrokeAccumulator, GestureModeResolver)> = None;

    let frames = drive(source, stop, |n, det| {
        let (acc, resolver) = state.get_or_insert_with(|| {
            info!("painter: canvas {}x{}", det.width, det.height);
            let header = HeaderLayout::new(det.width, painter.header_height, painter.palette.len());
            (
                PaintStrokeAccumulator::new(det.width, det.height, painter),
                GestureModeResolver::new(header),
            )
        });

        let cursor = det
            .primary_hand()
            .and_then(|hand| hand.get(HandLandmark::IndexFingerTip.id()))
            .map(|tip| tip.pixel());
        let (mode, selection) = match (det.primary_hand(), cursor) {
            (Some(hand), Some(cursor)) => resolver.resolve(&classify_fingers(hand).0, cursor),
            _ => (Mode::Idle, None),
        };

        if let Some(sel) = selection {
            if !acc.select_tool(sel.region) {
                warn!("painter: no tool for header region {}", sel.region);
            }
        }
        let segment = match cursor {
            Some(c) => acc.on_frame(mode, c),
            None => {
                acc.lift();
                None
            }
        };

        emit(
            out,
            &PainterRecord {
                frame: n,
                mode,
                selection,
                tool: acc.active_tool().map(|t| t.name.as_str()),
                segment,
            },
        )
    })?;
    info!("painter: processed {frames} frames");
    Ok(state.map(|(acc, _)| acc))
}

/// The canvas as saved by `paint --out`: alone, or composited over `background`.
pub fn render_canvas(
    acc: &PaintStrokeAccumulator,
    background: Option<RgbImage>,
    profile: &Profile,
) -> Result<RgbImage> {
    match background {
        Some(mut frame) => {
            composite(&mut frame, acc.canvas(), profile.thresholds.ink_darkness)?;
            Ok(frame)
        }
        None => Ok(acc.canvas().clone()),
    }
}

/// Rep counter over the configured arm joint of the primary pose.
pub fn run_trainer<S: FrameSource, W: Write>(
    source: &mut S,
    profile: &Profile,
    sink: &mut dyn RepSink,
    out: &mut W,
    stop: &AtomicBool,
) -> Result<RepCounterState> {
    let joints = ArmJoints::from(&profile.trainer);
    let mut counter = AngleRepCounter::new(profile.thresholds.rep());

    let frames = drive(source, stop, |n, det| {
        let reading = det
            .primary_pose()
            .and_then(|pose| match counter.update_from(pose, joints, sink) {
                Ok(r) => Some(r),
                Err(e) => {
                    debug!("frame {n}: skipped ({e})");
                    None
                }
            });
        emit(
            out,
            &TrainerRecord {
                frame: n,
                angle: reading.map(|r| r.angle),
                stage: reading.map(|r| r.stage),
                count: counter.state().count,
            },
        )
    })?;
    let state = counter.state();
    info!("trainer: {frames} frames, curls {}", state.count);
    Ok(state)
}
