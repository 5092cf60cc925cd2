//! Joint-angle repetition counting (arm curls).
//!
//! The stage machine is a pure function of the previous [`RepCounterState`] and the
//! latest angle. Every sample produces a [`RepEvent`] which the caller routes to a
//! [`RepSink`]; [`AngleRepCounter`] bundles the two for the common case.

use log::{debug, info};
use serde::Serialize;
use std::fmt;

use crate::config::Trainer;
use crate::landmark::{LandmarkError, LandmarkSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Down,
    Up,
    Middle,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Down => "Down",
            Stage::Up => "Up",
            Stage::Middle => "Middle",
        })
    }
}

/// Which end of the movement was reached last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepThresholds {
    /// Arm counts as extended above this angle.
    pub down_above_deg: f32,
    /// Arm counts as curled below this angle.
    pub up_below_deg: f32,
}

impl Default for RepThresholds {
    fn default() -> Self {
        Self {
            down_above_deg: 160.0,
            up_below_deg: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepCounterState {
    pub stage: Stage,
    pub direction: Direction,
    /// Grows in steps of 0.5, never shrinks.
    pub count: f32,
}

impl Default for RepCounterState {
    fn default() -> Self {
        Self {
            stage: Stage::Middle,
            direction: Direction::Down,
            count: 0.0,
        }
    }
}

/// One processed angle sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepEvent {
    pub angle: f32,
    pub stage: Stage,
    pub count: f32,
    /// Whether this sample added to the count.
    pub counted: bool,
}

/// Receives every sample the counter processes.
pub trait RepSink {
    fn record(&mut self, event: &RepEvent);
}

impl RepSink for Vec<RepEvent> {
    fn record(&mut self, event: &RepEvent) {
        self.push(*event);
    }
}

/// Writes samples to the log: counted reps at info, the rest at debug.
#[derive(Debug, Default)]
pub struct LogSink;

impl RepSink for LogSink {
    fn record(&mut self, ev: &RepEvent) {
        if ev.counted {
            info!("rep counted: count={} angle={:.0}", ev.count, ev.angle);
        } else {
            debug!("angle={:.0} stage={} count={}", ev.angle, ev.stage, ev.count);
        }
    }
}

/// Folds an `atan2` difference in degrees into `[0, 180]`.
pub fn normalize_angle(raw_deg: f32) -> f32 {
    let mut angle = raw_deg;
    if angle < 0.0 {
        angle += 360.0;
    }
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    angle
}

/// Angle at `p2` between the rays towards `p1` and `p3`, in degrees.
pub fn joint_angle(p1: (f32, f32), p2: (f32, f32), p3: (f32, f32)) -> f32 {
    let raw = (p3.1 - p2.1).atan2(p3.0 - p2.0) - (p1.1 - p2.1).atan2(p1.0 - p2.0);
    normalize_angle(raw.to_degrees())
}

pub fn transition(
    prev: RepCounterState,
    angle: f32,
    th: &RepThresholds,
) -> (RepCounterState, RepEvent) {
    let mut next = RepCounterState {
        stage: Stage::Middle,
        ..prev
    };
    let mut counted = false;

    if angle > th.down_above_deg {
        next.direction = Direction::Down;
        next.stage = Stage::Down;
    }
    if angle < th.up_below_deg && next.direction == Direction::Down {
        next.direction = Direction::Up;
        next.count += 0.5;
        next.stage = Stage::Up;
        counted = true;
    }

    let event = RepEvent {
        angle,
        stage: next.stage,
        count: next.count,
        counted,
    };
    (next, event)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepReading {
    pub angle: f32,
    pub stage: Stage,
    pub count: f32,
}

/// The landmark ids of the tracked joint triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmJoints {
    pub shoulder: usize,
    pub elbow: usize,
    pub wrist: usize,
}

impl From<&Trainer> for ArmJoints {
    fn from(t: &Trainer) -> Self {
        Self {
            shoulder: t.shoulder,
            elbow: t.elbow,
            wrist: t.wrist,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AngleRepCounter {
    state: RepCounterState,
    thresholds: RepThresholds,
}

impl AngleRepCounter {
    pub fn new(thresholds: RepThresholds) -> Self {
        Self {
            state: RepCounterState::default(),
            thresholds,
        }
    }

    pub fn state(&self) -> RepCounterState {
        self.state
    }

    pub fn update(&mut self, p1: (f32, f32), p2: (f32, f32), p3: (f32, f32)) -> RepReading {
        self.update_with(p1, p2, p3, &mut LogSink)
    }

    pub fn update_with(
        &mut self,
        p1: (f32, f32),
        p2: (f32, f32),
        p3: (f32, f32),
        sink: &mut dyn RepSink,
    ) -> RepReading {
        self.push_angle(joint_angle(p1, p2, p3), sink)
    }

    /// Feeds an already computed angle through the stage machine.
    pub fn push_angle(&mut self, angle: f32, sink: &mut dyn RepSink) -> RepReading {
        let (next, event) = transition(self.state, angle, &self.thresholds);
        self.state = next;
        sink.record(&event);
        RepReading {
            angle,
            stage: next.stage,
            count: next.count,
        }
    }

    /// Samples the joint from a pose; a missing landmark skips the sample and
    /// leaves the state untouched.
    pub fn update_from(
        &mut self,
        pose: &LandmarkSet,
        joints: ArmJoints,
        sink: &mut dyn RepSink,
    ) -> Result<RepReading, LandmarkError> {
        let p1 = pose.require(joints.shoulder)?.xy();
        let p2 = pose.require(joints.elbow)?.xy();
        let p3 = pose.require(joints.wrist)?.xy();
        Ok(self.update_with(p1, p2, p3, sink))
    }
}
