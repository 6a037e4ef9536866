//! Wiring of one playback session: transport, decoder, loader, graph, engine
//! task and (once enabled) the output device.

use super::config::EngineConfig;
use crate::audio::{
    fetcher_for, AssetFetcher, AudioDecoder, AudioOutput, BufferLoader, EqualPowerPanner,
    SpatialGraph, SymphoniaDecoder,
};
use crate::engine::{Engine, EngineEvent, EngineHandle};
use crate::error::{Error, Result};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Owns everything a running engine needs. Must be created inside a tokio
/// runtime.
pub struct Session {
    handle: EngineHandle,
    /// Taken once by whoever renders events
    events: Option<mpsc::UnboundedReceiver<EngineEvent>>,
    task: Option<JoinHandle<()>>,
    loader: Arc<BufferLoader>,
    /// `None` until audio is enabled; the engine runs headless meanwhile
    output: Option<AudioOutput>,
    output_device: Option<String>,
}

impl Session {
    /// Start a session fetching from the configured asset root.
    pub fn start(config: &EngineConfig) -> Self {
        Self::with_parts(
            config,
            fetcher_for(&config.asset_root),
            Arc::new(SymphoniaDecoder::new()),
        )
    }

    pub fn with_parts(
        config: &EngineConfig,
        fetcher: Arc<dyn AssetFetcher>,
        decoder: Arc<dyn AudioDecoder>,
    ) -> Self {
        let loader = Arc::new(BufferLoader::new(fetcher, decoder));
        let graph = SpatialGraph::new(
            config.graph_settings(),
            Box::new(EqualPowerPanner::new(config.distance)),
        )
        .into_shared();

        let (handle, events, task) =
            Engine::spawn(graph, Arc::clone(&loader), config.engine_options());
        debug!("Session started, assets from {}", config.asset_root);

        Self {
            handle,
            events: Some(events),
            task: Some(task),
            loader,
            output: None,
            output_device: config.output_device().map(str::to_string),
        }
    }

    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    pub fn loader(&self) -> &Arc<BufferLoader> {
        &self.loader
    }

    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<EngineEvent>> {
        self.events.take()
    }

    pub fn audio_enabled(&self) -> bool {
        self.output.is_some()
    }

    /// The open output device, once audio is enabled.
    pub fn output(&self) -> Option<&AudioOutput> {
        self.output.as_ref()
    }

    /// Open the output device. Failure is reported both as the returned error
    /// and as an `OutputUnavailable` event; it is not retried.
    pub fn enable_audio(&mut self) -> Result<()> {
        if self.output.is_some() {
            return Ok(());
        }

        match AudioOutput::open(self.handle.graph(), self.output_device.as_deref()) {
            Ok(output) => {
                self.output = Some(output);
                Ok(())
            }
            Err(Error::OutputUnavailable(reason)) => {
                warn!("Audio output unavailable: {}", reason);
                self.handle.report_output_unavailable(reason.clone());
                Err(Error::OutputUnavailable(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Close the device and stop the engine task.
    pub async fn shutdown(mut self) -> Result<()> {
        self.output = None;

        // The task may already be gone; that is fine
        let _ = self.handle.shutdown();
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| Error::Other(anyhow::anyhow!("engine task failed: {}", e)))?;
        }

        info!(
            "Session closed ({} buffers cached)",
            self.loader.cache_len()
        );
        Ok(())
    }
}
