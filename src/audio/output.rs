//! Output device: a cpal stream pulling from the shared graph.
//!
//! `cpal::Stream` is not `Send`, so an [`AudioOutput`] stays on the thread that
//! opened it. Dropping it closes the device.

use super::graph::SharedGraph;
use crate::error::{Error, Result};
use cpal::{
    self,
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, Sample, SizedSample,
};
use log::{error, info};
use std::sync::PoisonError;

pub struct AudioOutput {
    _stream: cpal::Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

impl AudioOutput {
    /// Opens `preferred_device` if present, the host default otherwise, and
    /// starts pulling from `graph`.
    pub fn open(graph: SharedGraph, preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let device = preferred_device
            .and_then(|wanted| {
                host.output_devices()
                    .ok()?
                    .find(|d| d.name().map(|name| name == wanted).unwrap_or(false))
            })
            .or_else(|| host.default_output_device())
            .ok_or_else(|| Error::OutputUnavailable("no output device found".to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let config = device.default_output_config().map_err(|e| {
            Error::OutputUnavailable(format!("default config not supported: {}", e))
        })?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        graph
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_output_rate(sample_rate);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), graph)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), graph)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), graph)?,
            other => {
                return Err(Error::OutputUnavailable(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| Error::OutputUnavailable(format!("failed to start stream: {}", e)))?;

        info!(
            "Audio output on {} ({} Hz, {} ch)",
            device_name, sample_rate, channels
        );

        Ok(Self {
            _stream: stream,
            device_name,
            sample_rate,
            channels,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Names of every output device on the default host.
pub fn output_device_names() -> Vec<String> {
    cpal::default_host()
        .output_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    graph: SharedGraph,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    let err_fn = |err| error!("Audio output stream error: {}", err);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                scratch.resize(frames * 2, 0.0);
                graph
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .render(&mut scratch);
                spread_stereo(&scratch, data, channels);
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::OutputUnavailable(format!("failed to build output stream: {}", e)))
}

/// Map interleaved stereo onto a device layout. Mono devices get the average,
/// channels past the second get silence.
fn spread_stereo<T>(stereo: &[f32], out: &mut [T], channels: usize)
where
    T: Sample + FromSample<f32>,
{
    if channels == 0 {
        return;
    }
    for (frame, lr) in out.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
        if channels == 1 {
            frame[0] = T::from_sample((lr[0] + lr[1]) * 0.5);
            continue;
        }
        for (channel, sample) in frame.iter_mut().enumerate() {
            let value = lr.get(channel).copied().unwrap_or(0.0);
            *sample = T::from_sample(value);
        }
    }
}
