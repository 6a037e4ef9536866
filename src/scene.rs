//! Scene model shared by the engine and the presentation layer.
//!
//! A scene always has exactly two speakers. The graph keeps one emitter per
//! [`Speaker`] variant, and the sequencer routes each segment to the emitter
//! of its speaker, so adding a third voice means changing both.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Ambient filename used when a scene does not name one.
pub const DEFAULT_AMBIENT_FILE: &str = "ambient.wav";

/// Longest segment a catalog may declare. Also the cap on synthesized
/// stand-ins, which are held in memory whole.
pub const MAX_SEGMENT_DURATION_MS: u64 = 30 * 60 * 1000;

/// One of the two fixed voices of an interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    A,
    B,
}

impl Speaker {
    /// Carrier frequency of the synthesized stand-in voice
    pub fn base_frequency(self) -> f32 {
        match self {
            Speaker::A => 150.0,
            Speaker::B => 110.0,
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::A => write!(f, "A"),
            Speaker::B => write!(f, "B"),
        }
    }
}

/// Point in scene space. `y` is up; the scene floor is the `y = 0` plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// A point on the floor plane.
    pub const fn on_floor(x: f32, z: f32) -> Self {
        Self { x, y: 0.0, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Where the listener stands and which way they face.
///
/// `heading` is in radians measured from scene north (−z), clockwise when
/// seen from above.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerPose {
    pub x: f32,
    pub z: f32,
    pub heading: f32,
}

impl ListenerPose {
    pub const fn new(x: f32, z: f32, heading: f32) -> Self {
        Self { x, z, heading }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.z.is_finite() && self.heading.is_finite()
    }

    /// Unit vector the listener faces, as `(x, z)`.
    pub fn forward(&self) -> (f32, f32) {
        (self.heading.sin(), -self.heading.cos())
    }

    /// Unit vector pointing out of the listener's right ear, as `(x, z)`.
    pub fn right(&self) -> (f32, f32) {
        (self.heading.cos(), self.heading.sin())
    }
}

/// Positions of the two speaker emitters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmitterPositions {
    pub a: Position,
    pub b: Position,
}

impl EmitterPositions {
    pub fn get(&self, speaker: Speaker) -> Position {
        match speaker {
            Speaker::A => self.a,
            Speaker::B => self.b,
        }
    }
}

impl Default for EmitterPositions {
    fn default() -> Self {
        Self {
            a: Position::on_floor(-3.0, -3.0),
            b: Position::on_floor(3.0, -3.0),
        }
    }
}

/// How the scene's ambient asset is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbientFormat {
    #[default]
    Binaural,
    Ambisonic,
}

/// One dialog segment of an interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub speaker: Speaker,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub label: String,
    /// Asset filename relative to the scene's base path
    #[serde(default)]
    pub filename: String,
    /// Length of the synthesized stand-in when the asset can't be loaded
    pub duration_ms: u64,
}

impl Segment {
    pub fn fallback_duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Everything the engine needs to play one interview.
///
/// Built once when an interview is selected and shared read-only from then on;
/// selecting another interview replaces it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub id: String,
    /// Position in the catalog; picks the synthesized ambient palette
    pub index: usize,
    /// Prefix every asset filename is appended to, e.g. `assets/interviews/interview_1/`
    pub base_path: String,
    pub segments: Arc<[Segment]>,
    pub ambient_file: Option<String>,
    pub ambient_format: AmbientFormat,
    pub emitters: EmitterPositions,
    pub listener_start: Option<ListenerPose>,
}

impl Scene {
    pub fn new(id: impl Into<String>, base_path: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            id: id.into(),
            index: 0,
            base_path: base_path.into(),
            segments: segments.into(),
            ambient_file: None,
            ambient_format: AmbientFormat::default(),
            emitters: EmitterPositions::default(),
            listener_start: None,
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_ambient_file(mut self, filename: impl Into<String>) -> Self {
        self.ambient_file = Some(filename.into());
        self
    }

    pub fn with_ambient_format(mut self, format: AmbientFormat) -> Self {
        self.ambient_format = format;
        self
    }

    pub fn with_emitters(mut self, emitters: EmitterPositions) -> Self {
        self.emitters = emitters;
        self
    }

    pub fn with_listener_start(mut self, pose: ListenerPose) -> Self {
        self.listener_start = Some(pose);
        self
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Asset URL of a segment, `None` when out of range or without a filename.
    pub fn segment_url(&self, index: usize) -> Option<String> {
        self.segment(index)
            .filter(|segment| !segment.filename.is_empty())
            .map(|segment| format!("{}{}", self.base_path, segment.filename))
    }

    pub fn ambient_url(&self) -> String {
        let filename = self
            .ambient_file
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_AMBIENT_FILE);
        format!("{}{}", self.base_path, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: &str, speaker: Speaker, filename: &str) -> Segment {
        Segment {
            id: id.to_string(),
            speaker,
            order: 1,
            label: String::new(),
            filename: filename.to_string(),
            duration_ms: 1000,
        }
    }

    #[test]
    fn forward_vector_follows_heading() {
        let north = ListenerPose::new(0.0, 0.0, 0.0);
        let (fx, fz) = north.forward();
        assert!(fx.abs() < 1e-6);
        assert!((fz + 1.0).abs() < 1e-6);

        let east = ListenerPose::new(0.0, 0.0, std::f32::consts::FRAC_PI_2);
        let (fx, fz) = east.forward();
        assert!((fx - 1.0).abs() < 1e-6);
        assert!(fz.abs() < 1e-6);

        // Facing north, the right ear points to +x
        let (rx, rz) = north.right();
        assert!((rx - 1.0).abs() < 1e-6);
        assert!(rz.abs() < 1e-6);
    }

    #[test]
    fn urls_are_base_path_plus_filename() {
        let scene = Scene::new(
            "interview_1",
            "assets/interviews/interview_1/",
            vec![
                segment("1-1", Speaker::A, "01_A_opening.webm"),
                segment("1-2", Speaker::B, ""),
            ],
        );

        assert_eq!(
            scene.segment_url(0).as_deref(),
            Some("assets/interviews/interview_1/01_A_opening.webm")
        );
        assert_eq!(scene.segment_url(1), None);
        assert_eq!(scene.segment_url(2), None);
        assert_eq!(scene.ambient_url(), "assets/interviews/interview_1/ambient.wav");

        let scene = scene.with_ambient_file("street_foa.wav");
        assert_eq!(
            scene.ambient_url(),
            "assets/interviews/interview_1/street_foa.wav"
        );
    }

    #[test]
    fn emitters_are_looked_up_by_speaker() {
        let emitters = EmitterPositions {
            a: Position::on_floor(-4.0, -2.0),
            b: Position::on_floor(4.0, -2.0),
        };
        assert_eq!(emitters.get(Speaker::A).x, -4.0);
        assert_eq!(emitters.get(Speaker::B).x, 4.0);
        assert_eq!(emitters.get(Speaker::B).y, 0.0);
    }
}
