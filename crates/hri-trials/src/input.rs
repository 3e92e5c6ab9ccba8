//! Line-based button input: each line of text is one key press.
//!
//! Stdin is read on a plain thread; [`InputAdapter::press`] never blocks, and
//! a pending terminal read must not hold up runtime shutdown.

use std::io::BufRead;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use gridworld_kernel::policy::{InputAdapter, KeyMap};
use gridworld_kernel::Action;

/// Keys a trial participant can use: the numbered buttons plus `w/a/s/d`.
pub fn trial_keys() -> KeyMap {
    KeyMap::buttons()
        .bind("w", Action::NORTH)
        .bind("a", Action::WEST)
        .bind("s", Action::SOUTH)
        .bind("d", Action::EAST)
}

/// Press one key per non-empty line until the reader is exhausted.
///
/// Returns the number of presses that reached the environment.
pub fn forward_lines<R: BufRead>(reader: R, adapter: &InputAdapter) -> Result<usize> {
    let mut accepted = 0;

    for line in reader.lines() {
        let line = line.context("Failed to read input")?;
        let key = line.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        if adapter.press(&key) {
            accepted += 1;
        } else {
            debug!(key = %key, "Key press ignored");
        }
    }
    Ok(accepted)
}

/// Forward stdin to `adapter` on a background thread.
pub fn spawn_stdin(adapter: InputAdapter) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("stdin-input".to_string())
        .spawn(move || {
            if let Err(e) = forward_lines(std::io::stdin().lock(), &adapter) {
                warn!(error = %e, "Input forwarding stopped");
            }
        })
        .context("Failed to start input thread")
}
