//! Interview catalog: the static list of scenes a user can pick from.
//!
//! Read from TOML (`[[scene]]` tables) or JSON (`{"scenes": [...]}`), picked
//! by file extension.

use super::config::EngineConfig;
use crate::error::{Error, Result};
use crate::scene::{
    AmbientFormat, EmitterPositions, ListenerPose, Position, Scene, Segment, Speaker,
    MAX_SEGMENT_DURATION_MS,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// A point on the floor plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorPoint {
    pub x: f32,
    pub z: f32,
}

impl From<FloorPoint> for Position {
    fn from(point: FloorPoint) -> Self {
        Position::on_floor(point.x, point.z)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default)]
    pub role: String,
}

/// One interview as described in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub ambient_description: String,
    pub ambient_file: Option<String>,
    /// `false` marks the ambient file as an ambisonic field
    #[serde(default = "default_binaural")]
    pub binaural: bool,
    pub speaker_a_pos: Option<FloorPoint>,
    pub speaker_b_pos: Option<FloorPoint>,
    pub listener_start: Option<ListenerPose>,
    #[serde(default)]
    pub speaker_a: Person,
    #[serde(default)]
    pub speaker_b: Person,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

fn default_binaural() -> bool {
    true
}

impl CatalogEntry {
    pub fn speaker(&self, speaker: Speaker) -> &Person {
        match speaker {
            Speaker::A => &self.speaker_a,
            Speaker::B => &self.speaker_b,
        }
    }

    /// Nominal length of the whole interview, from fallback durations.
    pub fn nominal_duration_ms(&self) -> u64 {
        self.segments.iter().map(|s| s.duration_ms).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "scene", alias = "scenes", default)]
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        let catalog = Self { entries };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Catalog(format!("Failed to read {}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let catalog = if is_json {
            Self::from_json_str(&contents)?
        } else {
            Self::from_toml_str(&contents)?
        };

        debug!("Loaded {} scenes from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(contents)
            .map_err(|e| Error::Catalog(format!("Failed to parse catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(contents)
            .map_err(|e| Error::Catalog(format!("Failed to parse catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry and its position in the catalog.
    pub fn get(&self, id: &str) -> Option<(usize, &CatalogEntry)> {
        self.entries.iter().enumerate().find(|(_, entry)| entry.id == id)
    }

    /// Build the engine scene for `id`. Segments are ordered by their
    /// `order` field; anything the entry leaves out comes from `config`.
    pub fn scene(&self, id: &str, config: &EngineConfig) -> Result<Scene> {
        let (index, entry) = self
            .get(id)
            .ok_or_else(|| Error::Catalog(format!("No scene named {}", id)))?;

        let mut segments = entry.segments.clone();
        segments.sort_by_key(|segment| segment.order);

        let emitters = EmitterPositions {
            a: entry.speaker_a_pos.map(Position::from).unwrap_or(config.emitters.a),
            b: entry.speaker_b_pos.map(Position::from).unwrap_or(config.emitters.b),
        };
        let format = if entry.binaural {
            AmbientFormat::Binaural
        } else {
            AmbientFormat::Ambisonic
        };
        let ambient_file = entry
            .ambient_file
            .clone()
            .unwrap_or_else(|| config.ambient_file.clone());

        Ok(Scene::new(&entry.id, config.scene_base_path(&entry.id), segments)
            .with_index(index)
            .with_ambient_file(ambient_file)
            .with_ambient_format(format)
            .with_emitters(emitters)
            .with_listener_start(entry.listener_start.unwrap_or(config.listener_start)))
    }

    fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for entry in &self.entries {
            if entry.id.is_empty() {
                return Err(Error::Catalog("Scene with empty id".to_string()));
            }
            if !ids.insert(entry.id.as_str()) {
                return Err(Error::Catalog(format!("Duplicate scene id {}", entry.id)));
            }
            if let Some(segment) = entry
                .segments
                .iter()
                .find(|segment| segment.duration_ms > MAX_SEGMENT_DURATION_MS)
            {
                return Err(Error::Catalog(format!(
                    "Segment {} of {} lasts {} ms, the limit is {} ms",
                    segment.id, entry.id, segment.duration_ms, MAX_SEGMENT_DURATION_MS
                )));
            }
        }
        Ok(())
    }
}
