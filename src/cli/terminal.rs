//! In-place progress rendering for long-running commands.

use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Instant;

use crate::tracker::{Phase, Progress};

struct State {
    phase: Option<Phase>,
    phase_started: Instant,
}

/// Renders `(phase, current, total)` updates on one stderr line with a
/// rough ETA. The ETA clock resets on every phase transition. Safe to
/// call from concurrent progress callbacks.
pub struct ProgressRenderer {
    state: Mutex<State>,
}

impl ProgressRenderer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                phase: None,
                phase_started: Instant::now(),
            }),
        }
    }

    pub fn update(&self, progress: Progress) {
        let mut state = self.state.lock().expect("progress lock poisoned");

        if state.phase != Some(progress.phase) {
            if state.phase.is_some() {
                eprintln!();
            }
            state.phase = Some(progress.phase);
            state.phase_started = Instant::now();
        }

        let mut line = format!("  {} {}", progress.description, counter(&progress));
        if let Some(eta) = eta_seconds(&progress, state.phase_started) {
            line.push_str(&format!(" (~{}s left)", eta));
        }

        // Pad to blot out the previous, possibly longer, line.
        eprint!("\r{:<70}", line);
        let _ = io::stderr().flush();
    }

    /// End the in-place line.
    pub fn finish(&self) {
        let state = self.state.lock().expect("progress lock poisoned");
        if state.phase.is_some() {
            eprintln!();
        }
    }
}

fn counter(progress: &Progress) -> String {
    if progress.total == 0 {
        String::new()
    } else {
        format!("{}/{}", progress.current, progress.total)
    }
}

fn eta_seconds(progress: &Progress, started: Instant) -> Option<u64> {
    if progress.current == 0 || progress.total == 0 || progress.current >= progress.total {
        return None;
    }

    let elapsed = started.elapsed().as_secs_f64();
    if elapsed < 1.0 {
        return None;
    }

    let per_item = elapsed / progress.current as f64;
    Some((per_item * (progress.total - progress.current) as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_hidden_for_unbounded_phases() {
        let p = Progress {
            phase: Phase::UpdatingStatus,
            current: 0,
            total: 0,
            description: "Updating",
        };
        assert_eq!(counter(&p), "");
    }

    #[test]
    fn eta_needs_some_history() {
        let p = Progress {
            phase: Phase::Fetching,
            current: 0,
            total: 10,
            description: "Fetching",
        };
        assert!(eta_seconds(&p, Instant::now()).is_none());

        let done = Progress {
            phase: Phase::Fetching,
            current: 10,
            total: 10,
            description: "Fetching",
        };
        assert!(eta_seconds(&done, Instant::now()).is_none());
    }
}
