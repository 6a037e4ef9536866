//! The mixing graph: two speaker emitters on the dialog bus, loop/noise/drone
//! nodes on the ambient bus, a stereo-linked limiter and the master gain.
//!
//! Setters take effect on the next rendered block. The output device pulls
//! interleaved stereo through [`SpatialGraph::render`].

use super::buffer::AudioBuffer;
use super::dynamics::{Limiter, LimiterSettings};
use super::spatial::{BinauralPanner, EqualPowerPanner, StereoGains};
use super::synth::{AmbientBed, DroneSpec};
use crate::scene::{EmitterPositions, ListenerPose, Position, Speaker};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::sync::{Arc, Mutex};

/// Graph shared between the engine task, the handle and the output callback.
pub type SharedGraph = Arc<Mutex<SpatialGraph>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bus {
    Ambient,
    Dialog,
}

impl std::fmt::Display for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bus::Ambient => write!(f, "ambient"),
            Bus::Dialog => write!(f, "dialog"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphSettings {
    pub sample_rate: u32,
    pub master_gain: f32,
    pub ambient_gain: f32,
    pub dialog_gain: f32,
    /// Height of the listener's ears above the floor plane
    pub listener_height: f32,
    pub emitters: EmitterPositions,
    pub limiter: LimiterSettings,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            master_gain: 0.8,
            ambient_gain: 0.25,
            dialog_gain: 0.7,
            listener_height: 1.7,
            emitters: EmitterPositions::default(),
            limiter: LimiterSettings::default(),
        }
    }
}

struct DialogVoice {
    speaker: Speaker,
    buffer: AudioBuffer,
    /// Read position in source frames
    cursor: f64,
}

enum AmbientNode {
    Loop { buffer: AudioBuffer, cursor: f64 },
    Noise { buffer: AudioBuffer, gain: f32, cursor: f64 },
    Drone { spec: DroneSpec, phase: f64 },
}

pub struct SpatialGraph {
    sample_rate: u32,
    master_gain: f32,
    ambient_gain: f32,
    dialog_gain: f32,
    listener_height: f32,
    listener: ListenerPose,
    emitters: EmitterPositions,
    panner: Box<dyn BinauralPanner>,
    limiter: Limiter,
    dialog: Option<DialogVoice>,
    ambient: Vec<AmbientNode>,
    /// Seconds of ambient rendered since the bed started, drives drone LFOs
    ambient_clock: f64,
}

impl SpatialGraph {
    pub fn new(settings: GraphSettings, panner: Box<dyn BinauralPanner>) -> Self {
        Self {
            sample_rate: settings.sample_rate.max(1),
            master_gain: settings.master_gain,
            ambient_gain: clamp_level(settings.ambient_gain),
            dialog_gain: clamp_level(settings.dialog_gain),
            listener_height: settings.listener_height,
            listener: ListenerPose::default(),
            emitters: settings.emitters,
            panner,
            limiter: Limiter::new(settings.limiter, settings.sample_rate),
            dialog: None,
            ambient: Vec::new(),
            ambient_clock: 0.0,
        }
    }

    /// Graph with default levels and the built-in panner.
    pub fn with_defaults(sample_rate: u32) -> Self {
        Self::new(
            GraphSettings {
                sample_rate,
                ..GraphSettings::default()
            },
            Box::new(EqualPowerPanner::default()),
        )
    }

    pub fn into_shared(self) -> SharedGraph {
        Arc::new(Mutex::new(self))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Called once the device rate is known.
    pub fn set_output_rate(&mut self, sample_rate: u32) {
        if sample_rate == 0 || sample_rate == self.sample_rate {
            return;
        }
        debug!("Graph output rate {} -> {} Hz", self.sample_rate, sample_rate);
        self.sample_rate = sample_rate;
        self.limiter.set_sample_rate(sample_rate);
    }

    /// Ignores poses with non-finite fields and keeps the last good one.
    /// Returns whether the pose was applied.
    pub fn set_listener_pose(&mut self, pose: ListenerPose) -> bool {
        if !pose.is_finite() {
            debug!("Ignoring non-finite listener pose {:?}", pose);
            return false;
        }
        self.listener = pose;
        true
    }

    pub fn listener_pose(&self) -> ListenerPose {
        self.listener
    }

    /// Same rule as [`Self::set_listener_pose`]: both positions must be
    /// finite or neither is applied.
    pub fn set_emitter_positions(&mut self, a: Position, b: Position) -> bool {
        if !(a.is_finite() && b.is_finite()) {
            debug!("Ignoring non-finite emitter positions {:?}, {:?}", a, b);
            return false;
        }
        self.emitters = EmitterPositions { a, b };
        true
    }

    pub fn emitter_positions(&self) -> EmitterPositions {
        self.emitters
    }

    pub fn emitter_position(&self, speaker: Speaker) -> Position {
        self.emitters.get(speaker)
    }

    /// Sets a bus level, clamped to 0.0-1.0. Returns the level applied.
    pub fn set_bus_gain(&mut self, bus: Bus, level: f32) -> f32 {
        let level = clamp_level(level);
        match bus {
            Bus::Ambient => self.ambient_gain = level,
            Bus::Dialog => self.dialog_gain = level,
        }
        level
    }

    pub fn bus_gain(&self, bus: Bus) -> f32 {
        match bus {
            Bus::Ambient => self.ambient_gain,
            Bus::Dialog => self.dialog_gain,
        }
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    /// Ear gains currently applied to a speaker's emitter.
    pub fn emitter_gains(&self, speaker: Speaker) -> StereoGains {
        self.panner.gains(
            self.emitters.get(speaker),
            &self.listener,
            self.listener_height,
        )
    }

    /// Plays `buffer` from the speaker's emitter, replacing any dialog source.
    pub fn start_dialog(&mut self, speaker: Speaker, buffer: AudioBuffer) {
        if let Some(previous) = self.dialog.take() {
            trace!("Dialog source for {} replaced", previous.speaker);
        }
        self.dialog = Some(DialogVoice {
            speaker,
            buffer,
            cursor: 0.0,
        });
    }

    /// Returns whether a source was playing.
    pub fn stop_dialog(&mut self) -> bool {
        self.dialog.take().is_some()
    }

    pub fn active_dialog(&self) -> Option<Speaker> {
        self.dialog.as_ref().map(|voice| voice.speaker)
    }

    /// Loops a decoded ambient asset, replacing whatever ambient was running.
    pub fn start_ambient_loop(&mut self, buffer: AudioBuffer) {
        self.stop_ambient();
        self.ambient.push(AmbientNode::Loop {
            buffer,
            cursor: 0.0,
        });
    }

    /// Starts a synthesized bed: one noise node plus one node per drone.
    pub fn start_ambient_bed(&mut self, bed: AmbientBed) {
        self.stop_ambient();
        self.ambient.push(AmbientNode::Noise {
            buffer: bed.noise,
            gain: bed.noise_gain,
            cursor: 0.0,
        });
        for spec in bed.drones {
            self.ambient.push(AmbientNode::Drone { spec, phase: 0.0 });
        }
    }

    /// Releases every ambient node. Returns how many were running.
    pub fn stop_ambient(&mut self) -> usize {
        let released = self.ambient.len();
        self.ambient.clear();
        self.ambient_clock = 0.0;
        released
    }

    pub fn active_ambient_nodes(&self) -> usize {
        self.ambient.len()
    }

    /// Fill `out` with interleaved stereo frames.
    pub fn render(&mut self, out: &mut [f32]) {
        let rate = self.sample_rate as f64;
        let dt = 1.0 / rate;

        let dialog_gains = self
            .dialog
            .as_ref()
            .map(|voice| self.emitter_gains(voice.speaker))
            .unwrap_or_default();

        for frame in out.chunks_exact_mut(2) {
            let (mut ambient_l, mut ambient_r) = (0.0_f32, 0.0_f32);
            let t = self.ambient_clock;
            for node in self.ambient.iter_mut() {
                let (l, r) = node.next(rate, t);
                ambient_l += l;
                ambient_r += r;
            }
            if !self.ambient.is_empty() {
                self.ambient_clock += dt;
            }

            let (mut dialog_l, mut dialog_r) = (0.0_f32, 0.0_f32);
            let mut finished = false;
            if let Some(voice) = self.dialog.as_mut() {
                match voice.next(rate) {
                    Some(sample) => (dialog_l, dialog_r) = dialog_gains.apply(sample),
                    None => finished = true,
                }
            }
            if finished {
                self.dialog = None;
            }

            let left = ambient_l * self.ambient_gain + dialog_l * self.dialog_gain;
            let right = ambient_r * self.ambient_gain + dialog_r * self.dialog_gain;
            let (left, right) = self.limiter.process(left, right);

            frame[0] = left * self.master_gain;
            frame[1] = right * self.master_gain;
        }
    }
}

impl DialogVoice {
    /// Next mono sample, `None` once the buffer is exhausted.
    fn next(&mut self, output_rate: f64) -> Option<f32> {
        if self.cursor >= self.buffer.frames() as f64 {
            return None;
        }
        let (l, r) = interpolate(&self.buffer, self.cursor, false);
        self.cursor += self.buffer.sample_rate() as f64 / output_rate;
        Some(if self.buffer.channels() == 1 { l } else { (l + r) * 0.5 })
    }
}

impl AmbientNode {
    fn next(&mut self, output_rate: f64, t: f64) -> (f32, f32) {
        match self {
            AmbientNode::Loop { buffer, cursor } => {
                let frame = interpolate(buffer, *cursor, true);
                advance_looped(cursor, buffer, output_rate);
                frame
            }
            AmbientNode::Noise {
                buffer,
                gain,
                cursor,
            } => {
                let (sample, _) = interpolate(buffer, *cursor, true);
                advance_looped(cursor, buffer, output_rate);
                (sample * *gain, sample * *gain)
            }
            AmbientNode::Drone { spec, phase } => {
                let sample = phase.sin() as f32 * spec.gain_at(t as f32);
                *phase = (*phase + TAU * spec.frequency as f64 / output_rate) % TAU;
                (sample, sample)
            }
        }
    }
}

fn advance_looped(cursor: &mut f64, buffer: &AudioBuffer, output_rate: f64) {
    let frames = buffer.frames() as f64;
    if frames == 0.0 {
        return;
    }
    *cursor += buffer.sample_rate() as f64 / output_rate;
    if *cursor >= frames {
        *cursor %= frames;
    }
}

/// Linear interpolation between neighbouring frames. When `wrap` is set the
/// frame after the last one is the first.
fn interpolate(buffer: &AudioBuffer, cursor: f64, wrap: bool) -> (f32, f32) {
    let frames = buffer.frames();
    if frames == 0 {
        return (0.0, 0.0);
    }
    let index = cursor.floor() as usize;
    let frac = (cursor - cursor.floor()) as f32;

    let (l0, r0) = buffer.stereo_frame(index);
    let next = if index + 1 < frames {
        index + 1
    } else if wrap {
        0
    } else {
        return (l0, r0);
    };
    let (l1, r1) = buffer.stereo_frame(next);

    (l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac)
}

fn clamp_level(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spatial::measure_stereo_levels;
    use crate::audio::synth::ambient_bed;

    const RATE: u32 = 8000;

    fn tone(frames: usize, rate: u32) -> AudioBuffer {
        AudioBuffer::mono(
            (0..frames).map(|i| (i as f32 * 0.07).sin() * 0.5).collect(),
            rate,
        )
    }

    fn graph() -> SpatialGraph {
        let mut graph = SpatialGraph::with_defaults(RATE);
        graph.set_listener_pose(ListenerPose::new(0.0, 4.0, 0.0));
        graph
    }

    fn render(graph: &mut SpatialGraph, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        graph.render(&mut out);
        out
    }

    #[test]
    fn defaults() {
        let graph = graph();
        assert_eq!(graph.bus_gain(Bus::Ambient), 0.25);
        assert_eq!(graph.bus_gain(Bus::Dialog), 0.7);
        assert_eq!(graph.master_gain(), 0.8);
        assert_eq!(graph.emitter_position(Speaker::A), Position::on_floor(-3.0, -3.0));
        assert_eq!(graph.emitter_position(Speaker::B), Position::on_floor(3.0, -3.0));
    }

    #[test]
    fn bus_levels_are_clamped() {
        let mut graph = graph();
        assert_eq!(graph.set_bus_gain(Bus::Ambient, 1.7), 1.0);
        assert_eq!(graph.set_bus_gain(Bus::Dialog, -0.2), 0.0);
        assert_eq!(graph.set_bus_gain(Bus::Dialog, f32::NAN), 0.0);
        assert_eq!(graph.bus_gain(Bus::Ambient), 1.0);
    }

    #[test]
    fn speakers_come_from_their_side() {
        let mut graph = graph();

        graph.start_dialog(Speaker::A, tone(800, RATE));
        let (left, right) = measure_stereo_levels(&render(&mut graph, 400));
        assert!(left > right);

        graph.start_dialog(Speaker::B, tone(800, RATE));
        let (left, right) = measure_stereo_levels(&render(&mut graph, 400));
        assert!(right > left);
    }

    #[test]
    fn pose_changes_apply_on_next_block() {
        let mut graph = graph();
        graph.start_dialog(Speaker::B, tone(8000, RATE));

        let (left, right) = measure_stereo_levels(&render(&mut graph, 400));
        assert!(right > left);

        // Turn around: speaker B is now on the left
        graph.set_listener_pose(ListenerPose::new(0.0, 4.0, std::f32::consts::PI));
        let (left, right) = measure_stereo_levels(&render(&mut graph, 400));
        assert!(left > right);
    }

    #[test]
    fn only_one_dialog_source() {
        let mut graph = graph();
        graph.start_dialog(Speaker::A, tone(800, RATE));
        graph.start_dialog(Speaker::B, tone(800, RATE));
        assert_eq!(graph.active_dialog(), Some(Speaker::B));

        assert!(graph.stop_dialog());
        assert!(!graph.stop_dialog());
        assert_eq!(graph.active_dialog(), None);
    }

    #[test]
    fn dialog_ends_with_its_buffer() {
        let mut graph = graph();
        graph.start_dialog(Speaker::A, tone(100, RATE));
        render(&mut graph, 99);
        assert!(graph.active_dialog().is_some());
        render(&mut graph, 2);
        assert!(graph.active_dialog().is_none());
    }

    #[test]
    fn slower_buffers_are_resampled() {
        let mut graph = graph();
        // 100 frames at 4 kHz last 200 output frames at 8 kHz
        graph.start_dialog(Speaker::A, tone(100, RATE / 2));
        render(&mut graph, 190);
        assert!(graph.active_dialog().is_some());
        render(&mut graph, 20);
        assert!(graph.active_dialog().is_none());
    }

    #[test]
    fn ambient_bed_nodes_are_all_released() {
        let mut graph = graph();
        graph.start_ambient_bed(ambient_bed(0, RATE));
        assert_eq!(graph.active_ambient_nodes(), 5);

        let out = render(&mut graph, 800);
        assert!(out.iter().any(|s| s.abs() > 0.0));

        assert_eq!(graph.stop_ambient(), 5);
        assert_eq!(graph.stop_ambient(), 0);
        assert_eq!(graph.active_ambient_nodes(), 0);
        assert!(render(&mut graph, 100).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn ambient_loop_replaces_bed_and_keeps_looping() {
        let mut graph = graph();
        graph.start_ambient_bed(ambient_bed(1, RATE));
        graph.start_ambient_loop(tone(50, RATE));
        assert_eq!(graph.active_ambient_nodes(), 1);

        // Well past the end of the buffer, still sounding
        render(&mut graph, 500);
        let out = render(&mut graph, 50);
        assert!(out.iter().any(|s| s.abs() > 0.001));
        assert_eq!(graph.active_ambient_nodes(), 1);
    }

    #[test]
    fn stopping_ambient_leaves_dialog_alone() {
        let mut graph = graph();
        graph.start_ambient_bed(ambient_bed(0, RATE));
        graph.start_dialog(Speaker::A, tone(800, RATE));

        graph.stop_ambient();
        assert_eq!(graph.active_dialog(), Some(Speaker::A));

        graph.start_ambient_bed(ambient_bed(0, RATE));
        graph.stop_dialog();
        assert_eq!(graph.active_ambient_nodes(), 5);
    }

    #[test]
    fn muted_dialog_bus_is_silent() {
        let mut graph = graph();
        graph.set_bus_gain(Bus::Dialog, 0.0);
        graph.start_dialog(Speaker::A, tone(800, RATE));
        assert!(render(&mut graph, 400).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn non_finite_geometry_keeps_last_good_values() {
        let mut graph = graph();
        let good = graph.listener_pose();
        let emitters = graph.emitter_positions();

        assert!(!graph.set_listener_pose(ListenerPose::new(f32::NAN, 4.0, 0.0)));
        assert!(!graph.set_listener_pose(ListenerPose::new(0.0, 4.0, f32::INFINITY)));
        assert_eq!(graph.listener_pose(), good);

        assert!(!graph.set_emitter_positions(Position::on_floor(1.0, 1.0), Position::new(0.0, f32::NAN, 0.0)));
        assert_eq!(graph.emitter_positions(), emitters);
    }

    #[test]
    fn output_survives_a_bad_pose() {
        let mut graph = graph();
        graph.start_ambient_bed(ambient_bed(0, RATE));
        graph.start_dialog(Speaker::A, tone(4000, RATE));

        graph.set_listener_pose(ListenerPose::new(f32::NAN, 4.0, 0.0));
        assert!(render(&mut graph, 500).iter().all(|s| s.is_finite()));

        graph.set_listener_pose(ListenerPose::new(0.0, 4.0, 0.0));
        graph.stop_dialog();
        let out = render(&mut graph, 1000);
        assert!(out.iter().all(|s| s.is_finite()));
        assert!(out.iter().any(|s| s.abs() > 0.0));
    }
}
