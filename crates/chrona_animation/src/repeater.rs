//! Endless replay
//!
//! Playables have a finite loop count. A [`Repeater`] replays one every time a
//! driven playback completes, until stopped. The replay is deferred to the end
//! of the scheduler frame, so it never runs inside the playable's own
//! evaluation.

use crate::error::Result;
use crate::phase::{ListenerId, Phase};
use crate::playable::{PlayState, Playable};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Default)]
struct RepeatState {
    running: Cell<bool>,
    repeats: Cell<u32>,
}

/// Replays a playable whenever it completes
pub struct Repeater {
    playable: Playable,
    listener: ListenerId,
    state: Rc<RepeatState>,
}

impl Repeater {
    /// Play `playable` and keep replaying it
    pub fn start(playable: impl Into<Playable>) -> Result<Self> {
        let playable = playable.into();
        let state = Rc::new(RepeatState::default());
        state.running.set(true);

        let scheduler = playable.context().scheduler().clone();
        let target = playable.downgrade();
        let listener_state = state.clone();
        let listener = playable.on(Phase::Completed, move |_| {
            if !listener_state.running.get() {
                return;
            }
            let state = listener_state.clone();
            let target = target.clone();
            scheduler.defer(move || {
                if !state.running.get() {
                    return;
                }
                let Some(playable) = target.upgrade() else {
                    return;
                };
                // Manual seeks also complete; only driven completions repeat
                if playable.state() != PlayState::Completed {
                    return;
                }
                match playable.play() {
                    Ok(()) => state.repeats.set(state.repeats.get() + 1),
                    Err(err) => tracing::warn!(%err, "repeat failed"),
                }
            });
        })?;

        if let Err(err) = playable.play() {
            playable.remove_listener(listener)?;
            return Err(err);
        }

        tracing::debug!("repeater started");
        Ok(Self {
            playable,
            listener,
            state,
        })
    }

    /// Stop replaying. The current playback runs to its end.
    pub fn stop(&self) -> Result<()> {
        if !self.state.running.replace(false) {
            return Ok(());
        }
        self.playable.remove_listener(self.listener)?;
        tracing::debug!(repeats = self.state.repeats.get(), "repeater stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state.running.get()
    }

    /// Number of replays so far, not counting the first playback
    pub fn repeats(&self) -> u32 {
        self.state.repeats.get()
    }

    pub fn playable(&self) -> &Playable {
        &self.playable
    }
}
