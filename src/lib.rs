//! Hand and pose gesture classification over detector landmarks.
//!
//! The landmark detector itself is external; everything here consumes its per-frame
//! output. [`fingers`] turns a hand into a finger-up vector, [`gestures`] maps that
//! vector to an interaction mode, [`paint`] accumulates strokes for the virtual
//! painter and [`trainer`] counts arm curls from a joint angle. [`pipeline`] wires
//! them into the three demo loops over a [`input::FrameSource`].

pub mod cli;
pub mod config;
pub mod fingers;
pub mod gestures;
pub mod input;
pub mod landmark;
pub mod logging;
pub mod paint;
pub mod pipeline;
pub mod trainer;
