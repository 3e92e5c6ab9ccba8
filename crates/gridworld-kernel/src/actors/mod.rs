//! Actor-based driver for episodes, built on acton-reactive.
//!
//! ```text
//! EpisodeHandle ──Query*──▶ EpisodeClient ──new_envelope──▶ EpisodeActor (owns Environment)
//!               ◀─oneshot── EpisodeClient ◀─reply_envelope─      │
//! MoveSubmitter ──Submission──▶ inbox pump ──Submission────▶      ├─ commits staged rounds
//!                               (turn pause) ─ResumeTurns──▶      ├─ paces turns (turn_delay)
//! EpisodeHandle::finished ◀──────────────EpisodeLog───────────────┘  on the first end trigger
//! ```
//!
//! Deferred policies (manual input, remote decisions) share the same inbox
//! as handle submissions, so the environment sees every move through one
//! acceptance path.

mod episode_actor;
mod episode_client;

pub use episode_actor::{EpisodeActor, EpisodeHandle};
