//! Playback state machine for the dialog queue.
//!
//! The sequencer decides; it never touches the graph or the loader. Every
//! transition that starts a load hands out a [`LoadTicket`], and every
//! transition bumps the generation so tickets issued earlier stop matching.

use crate::scene::{Scene, Segment};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum PlaybackState {
    /// No scene loaded
    #[default]
    Idle,
    /// Scene loaded, nothing playing
    Ready,
    Loading(usize),
    Playing(usize),
    Paused(usize),
}

impl PlaybackState {
    pub fn index(&self) -> Option<usize> {
        match *self {
            PlaybackState::Loading(i) | PlaybackState::Playing(i) | PlaybackState::Paused(i) => {
                Some(i)
            }
            PlaybackState::Idle | PlaybackState::Ready => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PlaybackState::Loading(_))
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing(_))
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Loading(i) => write!(f, "loading #{}", i),
            PlaybackState::Playing(i) => write!(f, "playing #{}", i),
            PlaybackState::Paused(i) => write!(f, "paused #{}", i),
        }
    }
}

/// Identifies one segment load. Only the ticket matching the current
/// `Loading` state may complete it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub index: usize,
    pub generation: u64,
}

/// What happens when the playing segment runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next(LoadTicket),
    Finished,
    /// Nothing was playing
    Ignored,
}

#[derive(Debug, Default)]
pub struct TrackSequencer {
    scene: Option<Arc<Scene>>,
    state: PlaybackState,
    generation: u64,
    /// Length of the segment now playing
    duration: Option<Duration>,
    started_at: Option<Instant>,
}

impl TrackSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.index()
    }

    pub fn scene(&self) -> Option<&Arc<Scene>> {
        self.scene.as_ref()
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.scene.as_ref()?.segment(index)
    }

    /// Replaces the scene and returns to `Ready`.
    pub fn load(&mut self, scene: Arc<Scene>) {
        self.invalidate();
        self.scene = Some(scene);
        self.state = PlaybackState::Ready;
    }

    /// Drops the scene entirely.
    pub fn unload(&mut self) {
        self.invalidate();
        self.scene = None;
        self.state = PlaybackState::Idle;
    }

    /// Starts the current segment, or the first one when there is none.
    /// No-op while loading or playing, and without a scene.
    pub fn play(&mut self) -> Option<LoadTicket> {
        match self.state {
            PlaybackState::Idle | PlaybackState::Loading(_) | PlaybackState::Playing(_) => None,
            PlaybackState::Ready => self.skip_to(0),
            PlaybackState::Paused(i) => self.skip_to(i),
        }
    }

    /// Jumps to `index`, interrupting whatever plays. Out of range is a no-op.
    pub fn skip_to(&mut self, index: usize) -> Option<LoadTicket> {
        let len = self.scene.as_ref()?.len();
        if index >= len {
            return None;
        }

        self.invalidate();
        self.state = PlaybackState::Loading(index);
        Some(LoadTicket {
            index,
            generation: self.generation,
        })
    }

    pub fn skip_next(&mut self) -> Option<LoadTicket> {
        let next = self.current_index().map_or(0, |i| i + 1);
        self.skip_to(next)
    }

    pub fn skip_prev(&mut self) -> Option<LoadTicket> {
        let prev = self.current_index()?.checked_sub(1)?;
        self.skip_to(prev)
    }

    /// Whether `ticket` is still the load the sequencer waits for.
    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.state == PlaybackState::Loading(ticket.index) && self.generation == ticket.generation
    }

    /// Completes a load: `Loading(i)` becomes `Playing(i)` for `duration`.
    /// Returns false, changing nothing, when the ticket is stale.
    pub fn resolve(&mut self, ticket: LoadTicket, duration: Duration, now: Instant) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.state = PlaybackState::Playing(ticket.index);
        self.duration = Some(duration);
        self.started_at = Some(now);
        true
    }

    /// `Playing(i)` or `Loading(i)` becomes `Paused(i)`. Returns the index.
    pub fn pause(&mut self) -> Option<usize> {
        match self.state {
            PlaybackState::Playing(i) | PlaybackState::Loading(i) => {
                self.invalidate();
                self.state = PlaybackState::Paused(i);
                Some(i)
            }
            _ => None,
        }
    }

    /// Back to `Ready` with no index, or `Idle` without a scene.
    pub fn stop(&mut self) {
        self.invalidate();
        self.state = if self.scene.is_some() {
            PlaybackState::Ready
        } else {
            PlaybackState::Idle
        };
    }

    /// The playing segment ended: move on, or finish the queue.
    pub fn advance(&mut self) -> Advance {
        let PlaybackState::Playing(i) = self.state else {
            return Advance::Ignored;
        };
        match self.skip_to(i + 1) {
            Some(ticket) => Advance::Next(ticket),
            None => {
                self.stop();
                Advance::Finished
            }
        }
    }

    /// When the playing segment is due to end.
    pub fn deadline(&self) -> Option<Instant> {
        if !self.state.is_playing() {
            return None;
        }
        Some(self.started_at? + self.duration?)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        if !self.state.is_playing() {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.started_at?);
        Some(elapsed.min(self.duration?))
    }

    /// Segment worth warming up while `index` plays.
    pub fn following(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        (next < self.scene.as_ref()?.len()).then_some(next)
    }

    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.duration = None;
        self.started_at = None;
    }
}
