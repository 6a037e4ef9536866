use super::sequencer::PlaybackState;
use crate::audio::Bus;
use crate::scene::{EmitterPositions, ListenerPose, Scene, Speaker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Where the audio of a started segment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentSource {
    /// The decoded asset
    Decoded,
    /// The speech-like fallback
    Synthesized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbientSource {
    Asset,
    Synthesized,
}

/// Commands processed by the engine task, in order.
#[derive(Debug)]
pub enum EngineCommand {
    LoadScene(Arc<Scene>),
    Play,
    Pause,
    Stop,
    SkipNext,
    SkipPrev,
    SkipTo(usize),
    StartAmbient,
    StopAmbient,
    Snapshot(oneshot::Sender<EngineSnapshot>),
    Shutdown,
}

/// Everything the engine reports to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    SceneLoaded {
        scene_id: String,
        segments: usize,
        /// Pose the presentation should put the listener at, if the scene has one
        listener_start: Option<ListenerPose>,
    },
    SegmentLoading {
        index: usize,
    },
    /// Loading finished and the segment is audible
    SegmentStarted {
        index: usize,
        segment_id: String,
        speaker: Speaker,
        label: String,
        duration_ms: u64,
        source: SegmentSource,
    },
    Paused {
        index: usize,
    },
    Stopped,
    QueueFinished,
    Progress {
        index: usize,
        elapsed_ms: u64,
        duration_ms: u64,
    },
    PoseChanged {
        pose: ListenerPose,
    },
    EmittersMoved {
        emitters: EmitterPositions,
    },
    BusLevelChanged {
        bus: Bus,
        level: f32,
    },
    AmbientStarted {
        source: AmbientSource,
        nodes: usize,
    },
    AmbientStopped {
        released: usize,
    },
    /// The output device could not be opened; user interaction is needed
    OutputUnavailable {
        reason: String,
    },
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub state: PlaybackState,
    pub index: Option<usize>,
    pub loading: bool,
    pub scene_id: Option<String>,
    pub pose: ListenerPose,
    pub emitters: EmitterPositions,
    pub ambient_level: f32,
    pub dialog_level: f32,
    pub active_dialog: Option<Speaker>,
    pub ambient_nodes: usize,
    pub elapsed_ms: Option<u64>,
    pub duration_ms: Option<u64>,
}
