//! The playback engine.
//!
//! One tokio task owns the sequencer and the ambient controller and processes
//! commands, load completions and timers strictly one at a time. Loads run as
//! separate tasks and report back as ordinary messages; a completion that no
//! longer matches the sequencer's state is dropped.
//!
//! Pose, emitter and bus-level updates skip the task entirely and go straight
//! to the shared graph through [`EngineHandle`].

pub mod ambient;
pub mod events;
pub mod sequencer;

pub use ambient::{AmbientController, AmbientFill, AmbientTicket};
pub use events::{AmbientSource, EngineCommand, EngineEvent, EngineSnapshot, SegmentSource};
pub use sequencer::{Advance, LoadTicket, PlaybackState, TrackSequencer};

use crate::audio::{synth, AudioBuffer, BufferLoader, Bus, SharedGraph, SpatialGraph};
use crate::error::{Error, Result};
use crate::scene::{ListenerPose, Position, Scene, Speaker, MAX_SEGMENT_DURATION_MS};
use log::{debug, error, info, trace, warn};
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Segments fetched in the background when a scene loads
    pub preload_count: usize,
    /// How often `Progress` is emitted while playing; `None` disables it
    pub progress_interval: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            preload_count: 3,
            progress_interval: Some(Duration::from_millis(250)),
        }
    }
}

/// Results coming back from load tasks.
enum Completion {
    Segment {
        ticket: LoadTicket,
        speaker: Speaker,
        buffer: AudioBuffer,
        /// Duration that drives the auto-advance timer
        duration: Duration,
        source: SegmentSource,
    },
    Ambient {
        ticket: AmbientTicket,
        fill: AmbientFill,
    },
}

pub struct Engine {
    /// Dialog queue state machine
    sequencer: TrackSequencer,
    /// Ambient bed lifecycle
    ambient: AmbientController,
    /// Graph shared with the handle and the output device
    graph: SharedGraph,
    loader: Arc<BufferLoader>,
    options: EngineOptions,
    /// Channel for receiving commands from handles
    command_rx: mpsc::UnboundedReceiver<EngineCommand>,
    /// Load tasks report back here
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    /// Channel for sending events to the presentation layer
    event_tx: mpsc::UnboundedSender<EngineEvent>,
}

impl Engine {
    /// Start the engine task. Returns the handle, the event stream and the
    /// task itself, which ends after [`EngineHandle::shutdown`] or once every
    /// handle is dropped.
    pub fn spawn(
        graph: SharedGraph,
        loader: Arc<BufferLoader>,
        options: EngineOptions,
    ) -> (
        EngineHandle,
        mpsc::UnboundedReceiver<EngineEvent>,
        JoinHandle<()>,
    ) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let handle = EngineHandle {
            command_tx,
            event_tx: event_tx.clone(),
            graph: Arc::clone(&graph),
        };

        let engine = Engine {
            sequencer: TrackSequencer::new(),
            ambient: AmbientController::new(),
            graph,
            loader,
            options,
            command_rx,
            completion_tx,
            completion_rx,
            event_tx,
        };

        let task = tokio::spawn(engine.run());
        (handle, event_rx, task)
    }

    /// Process commands, completions and timers until shutdown
    pub async fn run(mut self) {
        let mut progress = self.options.progress_interval.map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            let deadline = self.sequencer.deadline();

            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(EngineCommand::Shutdown) => {
                            info!("Received shutdown command, stopping engine");
                            break;
                        }
                        Some(command) => self.handle_command(command),
                        // Every handle is gone
                        None => break,
                    }
                }

                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.handle_segment_end();
                }

                _ = next_tick(&mut progress) => {
                    self.emit_progress();
                }
            }
        }

        self.teardown();
    }

    fn handle_command(&mut self, command: EngineCommand) {
        trace!("Engine command {:?}", command);
        match command {
            EngineCommand::LoadScene(scene) => self.load_scene(scene),
            EngineCommand::Play => {
                if let Some(ticket) = self.sequencer.play() {
                    self.begin_segment(ticket);
                }
            }
            EngineCommand::Pause => {
                if let Some(index) = self.sequencer.pause() {
                    self.lock_graph().stop_dialog();
                    self.emit(EngineEvent::Paused { index });
                }
            }
            EngineCommand::Stop => self.stop(),
            EngineCommand::SkipNext => {
                if let Some(ticket) = self.sequencer.skip_next() {
                    self.begin_segment(ticket);
                }
            }
            EngineCommand::SkipPrev => {
                if let Some(ticket) = self.sequencer.skip_prev() {
                    self.begin_segment(ticket);
                }
            }
            EngineCommand::SkipTo(index) => match self.sequencer.skip_to(index) {
                Some(ticket) => self.begin_segment(ticket),
                None => debug!("Ignoring skip to {}, out of range", index),
            },
            EngineCommand::StartAmbient => match self.sequencer.scene().cloned() {
                Some(scene) => self.start_ambient(&scene),
                None => debug!("No scene loaded, ambient not started"),
            },
            EngineCommand::StopAmbient => self.stop_ambient(),
            EngineCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop
            EngineCommand::Shutdown => {}
        }
    }

    fn load_scene(&mut self, scene: Arc<Scene>) {
        info!("Loading scene {} ({} segments)", scene.id, scene.len());

        self.lock_graph().stop_dialog();
        self.sequencer.load(Arc::clone(&scene));

        let emitters = {
            let mut graph = self.lock_graph();
            if !graph.set_emitter_positions(scene.emitters.a, scene.emitters.b) {
                warn!("Scene {} has non-finite speaker positions, keeping the previous ones", scene.id);
            }
            graph.emitter_positions()
        };

        self.emit(EngineEvent::SceneLoaded {
            scene_id: scene.id.clone(),
            segments: scene.len(),
            listener_start: scene.listener_start,
        });
        self.emit(EngineEvent::EmittersMoved { emitters });

        self.start_ambient(&scene);

        let urls = (0..scene.len().min(self.options.preload_count))
            .filter_map(|i| scene.segment_url(i))
            .collect::<Vec<_>>();
        self.loader.preload(urls);
    }

    fn stop(&mut self) {
        self.sequencer.stop();
        self.lock_graph().stop_dialog();
        self.stop_ambient();
        self.emit(EngineEvent::Stopped);
    }

    /// Tear down whatever dialog plays and fetch segment `ticket.index`.
    fn begin_segment(&mut self, ticket: LoadTicket) {
        let Some(scene) = self.sequencer.scene().cloned() else {
            return;
        };
        let Some(segment) = scene.segment(ticket.index) else {
            return;
        };

        self.lock_graph().stop_dialog();
        self.emit(EngineEvent::SegmentLoading {
            index: ticket.index,
        });

        let url = scene.segment_url(ticket.index);
        let speaker = segment.speaker;
        let fallback = segment.fallback_duration();
        let sample_rate = self.lock_graph().sample_rate();
        let loader = Arc::clone(&self.loader);
        let completion_tx = self.completion_tx.clone();

        tokio::spawn(async move {
            let decoded = match url {
                Some(url) => loader.fetch_buffer(&url).await,
                None => None,
            };

            let completion = match decoded.filter(|buffer| !buffer.is_empty()) {
                Some(buffer) => Completion::Segment {
                    ticket,
                    speaker,
                    duration: buffer.duration(),
                    buffer,
                    source: SegmentSource::Decoded,
                },
                None => {
                    let buffer = synthesize(speaker, fallback, sample_rate).await;
                    // Without a stand-in there is nothing to wait for
                    let duration = if buffer.is_empty() {
                        Duration::ZERO
                    } else {
                        fallback
                    };
                    Completion::Segment {
                        ticket,
                        speaker,
                        buffer,
                        duration,
                        source: SegmentSource::Synthesized,
                    }
                }
            };

            let _ = completion_tx.send(completion);
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Segment {
                ticket,
                speaker,
                buffer,
                duration,
                source,
            } => {
                if !self.sequencer.resolve(ticket, duration, Instant::now()) {
                    debug!(
                        "Discarding stale load of segment {} (generation {})",
                        ticket.index, ticket.generation
                    );
                    return;
                }

                self.lock_graph().start_dialog(speaker, buffer);

                let Some(segment) = self.sequencer.segment(ticket.index).cloned() else {
                    return;
                };
                info!(
                    "Playing segment {} ({}, {:.1}s, {:?})",
                    ticket.index,
                    segment.speaker,
                    duration.as_secs_f32(),
                    source
                );
                self.emit(EngineEvent::SegmentStarted {
                    index: ticket.index,
                    segment_id: segment.id,
                    speaker: segment.speaker,
                    label: segment.label,
                    duration_ms: duration.as_millis() as u64,
                    source,
                });

                let next_url = self
                    .sequencer
                    .following(ticket.index)
                    .and_then(|next| self.sequencer.scene()?.segment_url(next));
                if let Some(url) = next_url {
                    self.loader.preload([url]);
                }
            }
            Completion::Ambient { ticket, fill } => {
                let started = {
                    let mut graph = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
                    self.ambient
                        .apply(&ticket, fill, &mut graph)
                        .map(|source| (source, graph.active_ambient_nodes()))
                };
                if let Some((source, nodes)) = started {
                    self.emit(EngineEvent::AmbientStarted { source, nodes });
                }
            }
        }
    }

    fn handle_segment_end(&mut self) {
        match self.sequencer.advance() {
            Advance::Next(ticket) => self.begin_segment(ticket),
            Advance::Finished => {
                info!("Reached end of queue");
                self.lock_graph().stop_dialog();
                self.emit(EngineEvent::QueueFinished);
            }
            Advance::Ignored => {}
        }
    }

    fn start_ambient(&mut self, scene: &Scene) {
        // Whatever ran for the previous scene goes first
        let released = {
            let mut graph = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
            self.ambient.stop(&mut graph)
        };
        if released > 0 {
            self.emit(EngineEvent::AmbientStopped { released });
        }

        let ticket = self.ambient.request(scene);
        let sample_rate = self.lock_graph().sample_rate();
        let loader = Arc::clone(&self.loader);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let buffer = loader.fetch_buffer(&ticket.url).await;

            // The bed takes a while to synthesize; keep it off the engine task
            let prepared = {
                let ticket = ticket.clone();
                tokio::task::spawn_blocking(move || AmbientFill::prepare(&ticket, buffer, sample_rate))
                    .await
            };
            match prepared {
                Ok(fill) => {
                    let _ = completion_tx.send(Completion::Ambient { ticket, fill });
                }
                Err(e) => error!("Ambient preparation task failed: {}", e),
            }
        });
    }

    fn stop_ambient(&mut self) {
        let released = {
            let mut graph = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
            self.ambient.stop(&mut graph)
        };
        self.emit(EngineEvent::AmbientStopped { released });
    }

    fn emit_progress(&self) {
        let PlaybackState::Playing(index) = self.sequencer.state() else {
            return;
        };
        let now = Instant::now();
        if let (Some(elapsed), Some(duration)) =
            (self.sequencer.elapsed(now), self.sequencer.duration())
        {
            self.emit(EngineEvent::Progress {
                index,
                elapsed_ms: elapsed.as_millis() as u64,
                duration_ms: duration.as_millis() as u64,
            });
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        let state = self.sequencer.state();
        let now = Instant::now();
        let graph = self.lock_graph();
        EngineSnapshot {
            state,
            index: state.index(),
            loading: state.is_loading(),
            scene_id: self.sequencer.scene().map(|scene| scene.id.clone()),
            pose: graph.listener_pose(),
            emitters: graph.emitter_positions(),
            ambient_level: graph.bus_gain(Bus::Ambient),
            dialog_level: graph.bus_gain(Bus::Dialog),
            active_dialog: graph.active_dialog(),
            ambient_nodes: graph.active_ambient_nodes(),
            elapsed_ms: self
                .sequencer
                .elapsed(now)
                .map(|elapsed| elapsed.as_millis() as u64),
            duration_ms: self
                .sequencer
                .duration()
                .filter(|_| state.is_playing())
                .map(|duration| duration.as_millis() as u64),
        }
    }

    fn teardown(&mut self) {
        self.sequencer.unload();
        let mut graph = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
        graph.stop_dialog();
        self.ambient.stop(&mut graph);
        debug!("Engine task finished");
    }

    fn emit(&self, event: EngineEvent) {
        if self.event_tx.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }

    fn lock_graph(&self) -> MutexGuard<'_, SpatialGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Speech stand-in built on the blocking pool. Empty when the duration is
/// out of range or synthesis fails.
async fn synthesize(speaker: Speaker, duration: Duration, sample_rate: u32) -> AudioBuffer {
    if duration > Duration::from_millis(MAX_SEGMENT_DURATION_MS) {
        warn!(
            "Refusing to synthesize {:.0}s of speech",
            duration.as_secs_f64()
        );
        return AudioBuffer::mono(Vec::new(), sample_rate);
    }

    match tokio::task::spawn_blocking(move || synth::speech_buffer(speaker, duration, sample_rate)).await {
        Ok(buffer) => buffer,
        Err(e) => {
            error!("Speech synthesis task failed: {}", e);
            AudioBuffer::mono(Vec::new(), sample_rate)
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Cloneable front of the engine.
///
/// Transport calls are queued to the engine task and return immediately.
/// Pose, emitter and level setters apply to the graph synchronously.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::UnboundedSender<EngineCommand>,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    graph: SharedGraph,
}

impl EngineHandle {
    /// Returns `false`, with no event, when the graph rejected the pose.
    pub fn set_listener_pose(&self, pose: ListenerPose) -> bool {
        if !self.lock_graph().set_listener_pose(pose) {
            return false;
        }
        let _ = self.event_tx.send(EngineEvent::PoseChanged { pose });
        true
    }

    pub fn set_emitter_positions(&self, a: Position, b: Position) -> bool {
        let emitters = {
            let mut graph = self.lock_graph();
            if !graph.set_emitter_positions(a, b) {
                return false;
            }
            graph.emitter_positions()
        };
        let _ = self.event_tx.send(EngineEvent::EmittersMoved { emitters });
        true
    }

    /// Returns the level actually applied after clamping.
    pub fn set_bus_level(&self, bus: Bus, level: f32) -> f32 {
        let level = self.lock_graph().set_bus_gain(bus, level);
        let _ = self
            .event_tx
            .send(EngineEvent::BusLevelChanged { bus, level });
        level
    }

    pub fn load_scene(&self, scene: Scene) -> Result<()> {
        self.send(EngineCommand::LoadScene(Arc::new(scene)))
    }

    pub fn play(&self) -> Result<()> {
        self.send(EngineCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(EngineCommand::Pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(EngineCommand::Stop)
    }

    pub fn skip_next(&self) -> Result<()> {
        self.send(EngineCommand::SkipNext)
    }

    pub fn skip_prev(&self) -> Result<()> {
        self.send(EngineCommand::SkipPrev)
    }

    pub fn skip_to(&self, index: usize) -> Result<()> {
        self.send(EngineCommand::SkipTo(index))
    }

    pub fn start_ambient(&self) -> Result<()> {
        self.send(EngineCommand::StartAmbient)
    }

    pub fn stop_ambient(&self) -> Result<()> {
        self.send(EngineCommand::StopAmbient)
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineCommand::Snapshot(reply_tx))?;
        reply_rx.await.map_err(|_| Error::EngineClosed)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(EngineCommand::Shutdown)
    }

    /// Tell the presentation layer the output device could not be opened.
    pub fn report_output_unavailable(&self, reason: impl Into<String>) {
        let _ = self.event_tx.send(EngineEvent::OutputUnavailable {
            reason: reason.into(),
        });
    }

    pub fn graph(&self) -> SharedGraph {
        Arc::clone(&self.graph)
    }

    fn send(&self, command: EngineCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| Error::EngineClosed)
    }

    fn lock_graph(&self) -> MutexGuard<'_, SpatialGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::tests::wav_bytes;
    use crate::audio::fetch::MockAssetFetcher;
    use crate::audio::SymphoniaDecoder;
    use crate::error::LoadError;
    use crate::scene::Segment;

    const RATE: u32 = 8000;

    fn missing_assets() -> MockAssetFetcher {
        let mut fetcher = MockAssetFetcher::new();
        fetcher.expect_fetch().returning(|url| {
            Err(LoadError::Status {
                url: url.to_string(),
                status: 404,
            })
        });
        fetcher
    }

    fn start(fetcher: MockAssetFetcher) -> (EngineHandle, mpsc::UnboundedReceiver<EngineEvent>) {
        let graph = SpatialGraph::with_defaults(RATE).into_shared();
        let loader = Arc::new(BufferLoader::new(
            Arc::new(fetcher),
            Arc::new(SymphoniaDecoder::new()),
        ));
        let options = EngineOptions {
            preload_count: 0,
            progress_interval: None,
        };
        let (handle, events, _task) = Engine::spawn(graph, loader, options);
        (handle, events)
    }

    fn scene() -> Scene {
        let segment = |i: u32, speaker| Segment {
            id: format!("s{}", i),
            speaker,
            order: i,
            label: format!("Part {}", i),
            filename: format!("{:02}.wav", i),
            duration_ms: 500,
        };
        Scene::new(
            "interview_1",
            "assets/interview_1/",
            vec![segment(1, Speaker::A), segment(2, Speaker::B)],
        )
    }

    async fn wait_for<F>(events: &mut mpsc::UnboundedReceiver<EngineEvent>, mut pred: F) -> EngineEvent
    where
        F: FnMut(&EngineEvent) -> bool,
    {
        loop {
            let event = events.recv().await.expect("engine stopped early");
            if pred(&event) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn scene_load_reports_listener_start() {
        let (handle, mut events) = start(missing_assets());
        let pose = ListenerPose::new(0.0, 4.0, 0.0);

        handle.load_scene(scene().with_listener_start(pose)).unwrap();
        let event = wait_for(&mut events, |e| matches!(e, EngineEvent::SceneLoaded { .. })).await;
        assert_eq!(
            event,
            EngineEvent::SceneLoaded {
                scene_id: "interview_1".to_string(),
                segments: 2,
                listener_start: Some(pose),
            }
        );

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, PlaybackState::Ready);
        assert_eq!(snapshot.index, None);
        // The engine leaves the pose to the presentation layer
        assert_eq!(snapshot.pose, ListenerPose::default());
    }

    #[tokio::test]
    async fn missing_ambient_falls_back_to_bed() {
        let (handle, mut events) = start(missing_assets());
        handle.load_scene(scene()).unwrap();

        let event = wait_for(&mut events, |e| matches!(e, EngineEvent::AmbientStarted { .. })).await;
        assert_eq!(
            event,
            EngineEvent::AmbientStarted {
                source: AmbientSource::Synthesized,
                nodes: 5,
            }
        );
    }

    #[tokio::test]
    async fn decoded_segment_reports_real_duration() {
        let mut fetcher = MockAssetFetcher::new();
        let body = wav_bytes(&[0.25; 2000], RATE);
        fetcher.expect_fetch().returning(move |url| {
            if url.ends_with("01.wav") {
                Ok(body.clone())
            } else {
                Err(LoadError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            }
        });

        let (handle, mut events) = start(fetcher);
        handle.load_scene(scene()).unwrap();
        handle.play().unwrap();

        let started = wait_for(&mut events, |e| matches!(e, EngineEvent::SegmentStarted { .. })).await;
        let EngineEvent::SegmentStarted {
            index,
            speaker,
            duration_ms,
            source,
            ..
        } = started
        else {
            unreachable!()
        };
        assert_eq!(index, 0);
        assert_eq!(speaker, Speaker::A);
        assert_eq!(source, SegmentSource::Decoded);
        // 2000 frames at 8 kHz, not the 500 ms fallback
        assert_eq!(duration_ms, 250);

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.active_dialog, Some(Speaker::A));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_fallback_does_not_stall_the_queue() {
        let (handle, mut events) = start(missing_assets());
        let segment = Segment {
            id: "s1".to_string(),
            speaker: Speaker::A,
            order: 1,
            label: "Endless".to_string(),
            filename: "01.wav".to_string(),
            duration_ms: u64::MAX,
        };
        handle
            .load_scene(Scene::new("interview_1", "assets/interview_1/", vec![segment]))
            .unwrap();
        handle.play().unwrap();

        let started = wait_for(&mut events, |e| matches!(e, EngineEvent::SegmentStarted { .. })).await;
        assert!(matches!(
            started,
            EngineEvent::SegmentStarted {
                duration_ms: 0,
                source: SegmentSource::Synthesized,
                ..
            }
        ));

        wait_for(&mut events, |e| *e == EngineEvent::QueueFinished).await;
        assert_eq!(handle.snapshot().await.unwrap().state, PlaybackState::Ready);
    }

    #[tokio::test]
    async fn pose_updates_go_straight_to_the_graph() {
        let (handle, mut events) = start(missing_assets());
        let pose = ListenerPose::new(1.0, 2.0, 0.5);

        assert!(handle.set_listener_pose(pose));
        assert_eq!(handle.graph().lock().unwrap().listener_pose(), pose);
        assert_eq!(events.recv().await, Some(EngineEvent::PoseChanged { pose }));

        // Rejected outright, nothing echoed
        assert!(!handle.set_listener_pose(ListenerPose::new(f32::NAN, 0.0, 0.0)));
        assert!(!handle.set_emitter_positions(Position::new(f32::INFINITY, 0.0, 0.0), Position::default()));
        assert_eq!(handle.graph().lock().unwrap().listener_pose(), pose);

        assert_eq!(handle.set_bus_level(Bus::Dialog, 2.0), 1.0);
        assert_eq!(
            events.recv().await,
            Some(EngineEvent::BusLevelChanged {
                bus: Bus::Dialog,
                level: 1.0
            })
        );
    }

    #[tokio::test]
    async fn commands_fail_after_shutdown() {
        let graph = SpatialGraph::with_defaults(RATE).into_shared();
        let loader = Arc::new(BufferLoader::new(
            Arc::new(missing_assets()),
            Arc::new(SymphoniaDecoder::new()),
        ));
        let (handle, _events, task) = Engine::spawn(graph, loader, EngineOptions::default());

        handle.shutdown().unwrap();
        task.await.unwrap();

        assert!(matches!(handle.play(), Err(Error::EngineClosed)));
        assert!(matches!(handle.snapshot().await, Err(Error::EngineClosed)));
    }
}
