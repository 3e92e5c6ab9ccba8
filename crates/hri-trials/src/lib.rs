//! HRI Trials: human-robot interaction studies on a walled grid world.
//!
//! A human walks from the bottom row to a goal on the top row while a robot
//! with one of several behaviours shares the corridor. This crate:
//! - Generates the trial layouts and wires the two agents into a turn-based episode
//! - Feeds button presses from stdin to the human's input adapter
//! - Ships finished episode logs to stdout or an HTTP endpoint
//! - Runs unattended batches with a scripted human and summarizes the outcomes

pub mod experiment;
pub mod input;
pub mod render;
pub mod results;
pub mod scenario;
pub mod sink;
pub mod trial;
