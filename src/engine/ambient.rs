//! Ambient bed lifecycle, independent of dialog playback.

use super::events::AmbientSource;
use crate::audio::synth::{self, AmbientBed};
use crate::audio::{AudioBuffer, SpatialGraph};
use crate::scene::{AmbientFormat, Scene};
use log::{debug, info};

/// Identifies one ambient load; restarting or stopping makes it stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbientTicket {
    pub generation: u64,
    pub url: String,
    pub scene_index: usize,
    pub format: AmbientFormat,
}

/// Ready-to-play ambient material, built away from the graph lock.
#[derive(Debug, Clone)]
pub enum AmbientFill {
    Asset(AudioBuffer),
    Bed(AmbientBed),
}

impl AmbientFill {
    /// The loaded asset when it is playable, otherwise the synthesized bed.
    /// Bed synthesis is slow; call this from a blocking task.
    pub fn prepare(ticket: &AmbientTicket, buffer: Option<AudioBuffer>, sample_rate: u32) -> Self {
        match buffer.and_then(|b| playable(b, ticket.format)) {
            Some(buffer) => AmbientFill::Asset(buffer),
            None => AmbientFill::Bed(synth::ambient_bed(ticket.scene_index, sample_rate)),
        }
    }
}

#[derive(Debug, Default)]
pub struct AmbientController {
    generation: u64,
    running: Option<AmbientSource>,
}

impl AmbientController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidates any load in flight and returns the ticket for a new one.
    pub fn request(&mut self, scene: &Scene) -> AmbientTicket {
        self.generation = self.generation.wrapping_add(1);
        AmbientTicket {
            generation: self.generation,
            url: scene.ambient_url(),
            scene_index: scene.index,
            format: scene.ambient_format,
        }
    }

    pub fn is_current(&self, ticket: &AmbientTicket) -> bool {
        ticket.generation == self.generation
    }

    pub fn running(&self) -> Option<AmbientSource> {
        self.running
    }

    /// Swaps the prepared fill into the graph. Returns `None` for a stale
    /// ticket.
    pub fn apply(
        &mut self,
        ticket: &AmbientTicket,
        fill: AmbientFill,
        graph: &mut SpatialGraph,
    ) -> Option<AmbientSource> {
        if !self.is_current(ticket) {
            debug!("Discarding stale ambient load for {}", ticket.url);
            return None;
        }

        let source = match fill {
            AmbientFill::Asset(buffer) => {
                info!("Ambient loop from {}", ticket.url);
                graph.start_ambient_loop(buffer);
                AmbientSource::Asset
            }
            AmbientFill::Bed(bed) => {
                info!("Ambient asset unavailable, playing synthesized bed");
                graph.start_ambient_bed(bed);
                AmbientSource::Synthesized
            }
        };
        self.running = Some(source);
        Some(source)
    }

    /// Releases every ambient node and invalidates any load in flight.
    pub fn stop(&mut self, graph: &mut SpatialGraph) -> usize {
        self.generation = self.generation.wrapping_add(1);
        self.running = None;
        graph.stop_ambient()
    }
}

/// Ambisonic fields are decoded elsewhere; here the omni channel stands in.
fn playable(buffer: AudioBuffer, format: AmbientFormat) -> Option<AudioBuffer> {
    if buffer.is_empty() {
        return None;
    }
    match format {
        AmbientFormat::Ambisonic if buffer.channels() >= 4 => buffer.channel(0),
        _ => Some(buffer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 8000;

    fn scene(index: usize) -> Scene {
        Scene::new("street", "assets/street/", Vec::new()).with_index(index)
    }

    fn bed(ticket: &AmbientTicket) -> AmbientFill {
        AmbientFill::prepare(ticket, None, RATE)
    }

    #[test]
    fn asset_loops_when_loaded() {
        let mut graph = SpatialGraph::with_defaults(RATE);
        let mut ambient = AmbientController::new();

        let ticket = ambient.request(&scene(0));
        assert_eq!(ticket.url, "assets/street/ambient.wav");

        let buffer = AudioBuffer::from_interleaved(vec![0.1; 800], 2, RATE);
        let fill = AmbientFill::prepare(&ticket, Some(buffer), RATE);
        assert_eq!(ambient.apply(&ticket, fill, &mut graph), Some(AmbientSource::Asset));
        assert_eq!(graph.active_ambient_nodes(), 1);
        assert_eq!(ambient.running(), Some(AmbientSource::Asset));
    }

    #[test]
    fn failed_load_synthesizes_bed() {
        let mut graph = SpatialGraph::with_defaults(RATE);
        let mut ambient = AmbientController::new();

        let ticket = ambient.request(&scene(3));
        let fill = bed(&ticket);
        assert!(matches!(fill, AmbientFill::Bed(_)));
        assert_eq!(ambient.apply(&ticket, fill, &mut graph), Some(AmbientSource::Synthesized));
        // Noise plus four drones
        assert_eq!(graph.active_ambient_nodes(), 5);
    }

    #[test]
    fn empty_asset_prepares_bed() {
        let ticket = AmbientController::new().request(&scene(0));
        let empty = AudioBuffer::mono(Vec::new(), RATE);
        assert!(matches!(
            AmbientFill::prepare(&ticket, Some(empty), RATE),
            AmbientFill::Bed(_)
        ));
    }

    #[test]
    fn apply_installs_the_prepared_bed_as_is() {
        let mut graph = SpatialGraph::with_defaults(RATE);
        let mut ambient = AmbientController::new();
        let ticket = ambient.request(&scene(0));

        // A hand-built bed with one drone; a fresh synthesis would carry four
        let AmbientFill::Bed(mut prepared) = bed(&ticket) else {
            unreachable!()
        };
        prepared.drones.truncate(1);
        prepared.noise = AudioBuffer::mono(vec![0.0; 16], RATE);

        assert_eq!(
            ambient.apply(&ticket, AmbientFill::Bed(prepared), &mut graph),
            Some(AmbientSource::Synthesized)
        );
        assert_eq!(graph.active_ambient_nodes(), 2);
    }

    #[test]
    fn stop_invalidates_pending_load() {
        let mut graph = SpatialGraph::with_defaults(RATE);
        let mut ambient = AmbientController::new();

        let ticket = ambient.request(&scene(0));
        assert_eq!(ambient.stop(&mut graph), 0);
        assert_eq!(ambient.apply(&ticket, bed(&ticket), &mut graph), None);
        assert_eq!(graph.active_ambient_nodes(), 0);
    }

    #[test]
    fn restart_invalidates_previous_request() {
        let mut graph = SpatialGraph::with_defaults(RATE);
        let mut ambient = AmbientController::new();

        let first = ambient.request(&scene(0));
        let second = ambient.request(&scene(1));
        assert!(!ambient.is_current(&first));
        assert!(ambient.is_current(&second));
        assert!(ambient.apply(&first, bed(&first), &mut graph).is_none());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut graph = SpatialGraph::with_defaults(RATE);
        let mut ambient = AmbientController::new();
        let ticket = ambient.request(&scene(0));
        ambient.apply(&ticket, bed(&ticket), &mut graph);

        assert_eq!(ambient.stop(&mut graph), 5);
        assert_eq!(ambient.stop(&mut graph), 0);
        assert_eq!(ambient.running(), None);
    }

    #[test]
    fn ambisonic_plays_omni_channel() {
        let foa = AudioBuffer::from_interleaved(vec![0.5, 0.1, 0.2, 0.3, 0.4, 0.1, 0.2, 0.3], 4, RATE);
        let omni = playable(foa, AmbientFormat::Ambisonic).unwrap();
        assert_eq!(omni.channels(), 1);
        assert_eq!(omni.samples(), &[0.5, 0.4]);

        let stereo = AudioBuffer::from_interleaved(vec![0.5, 0.1], 2, RATE);
        assert_eq!(playable(stereo, AmbientFormat::Ambisonic).unwrap().channels(), 2);

        assert!(playable(AudioBuffer::mono(Vec::new(), RATE), AmbientFormat::Binaural).is_none());
    }
}
