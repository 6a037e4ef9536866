//! Decoding primitive.
//!
//! The engine treats decoding as a black box behind [`AudioDecoder`]; the
//! default implementation accepts whatever container/codec symphonia's default
//! registry knows (wav, flac, mp3, ogg/vorbis, aac, ...).

use super::buffer::AudioBuffer;
use log::trace;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Turns an encoded payload into PCM. Errors are human-readable reasons.
pub trait AudioDecoder: Send + Sync {
    /// `extension` is the asset's file extension, used as a probing hint.
    fn decode(&self, bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioBuffer, String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioBuffer, String> {
        let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| format!("unrecognised container: {}", e))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| "no audio track".to_string())?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| format!("unsupported codec: {}", e))?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(format!("read error: {}", e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;

                    let mut interleaved = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    interleaved.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(interleaved.samples());
                }
                // A corrupt packet is skipped, the rest of the stream may still be fine
                Err(SymphoniaError::DecodeError(e)) => {
                    trace!("Skipping undecodable packet: {}", e);
                }
                Err(e) => return Err(format!("decode error: {}", e)),
            }
        }

        if samples.is_empty() || sample_rate == 0 || channels == 0 {
            return Err("stream contained no audio".to_string());
        }

        Ok(AudioBuffer::from_interleaved(samples, channels, sample_rate))
    }
}

/// File extension of an asset URL, ignoring any query string.
pub fn extension_of(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        None
    } else {
        Some(extension)
    }
}
