//! Synthesized stand-ins for assets that could not be loaded.
//!
//! Both generators are infallible. Shapes are deterministic; noise and LFO
//! rates come from the supplied RNG.

use super::buffer::AudioBuffer;
use crate::scene::Speaker;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::time::Duration;

/// Drone frequencies per scene, picked with `scene_index % 5`.
pub const AMBIENT_PALETTES: [[f32; 4]; 5] = [
    [60.0, 120.0, 180.0, 440.0],
    [220.0, 330.0, 880.0, 1200.0],
    [80.0, 160.0, 300.0, 500.0],
    [100.0, 200.0, 400.0, 600.0],
    [130.0, 260.0, 520.0, 780.0],
];

pub const AMBIENT_NOISE_SECONDS: f32 = 10.0;
pub const AMBIENT_NOISE_GAIN: f32 = 0.3;
pub const DRONE_GAIN: f32 = 0.02;
pub const DRONE_LFO_DEPTH: f32 = 0.01;

const FIRST_FORMANT: f32 = 3.2;
const SECOND_FORMANT: f32 = 5.5;
const SPEECH_FADE_IN: f32 = 0.3;
const SPEECH_FADE_OUT: f32 = 0.5;

/// One sine drone of the synthesized ambient bed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DroneSpec {
    pub frequency: f32,
    pub gain: f32,
    /// LFO rate in Hz, modulating `gain` by ±`lfo_depth`
    pub lfo_rate: f32,
    pub lfo_depth: f32,
}

impl DroneSpec {
    /// Instantaneous gain at `t` seconds.
    pub fn gain_at(&self, t: f32) -> f32 {
        self.gain + self.lfo_depth * (TAU * self.lfo_rate * t).sin()
    }
}

/// Looping noise plus a handful of drones.
#[derive(Debug, Clone)]
pub struct AmbientBed {
    pub noise: AudioBuffer,
    pub noise_gain: f32,
    pub drones: Vec<DroneSpec>,
}

/// Speech-like placeholder for a segment whose asset is missing.
pub fn speech_buffer(speaker: Speaker, duration: Duration, sample_rate: u32) -> AudioBuffer {
    speech_buffer_with_rng(speaker, duration, sample_rate, &mut StdRng::from_entropy())
}

pub fn speech_buffer_with_rng<R: Rng + ?Sized>(
    speaker: Speaker,
    duration: Duration,
    sample_rate: u32,
    rng: &mut R,
) -> AudioBuffer {
    let seconds = duration.as_secs_f32();
    let frames = (seconds * sample_rate as f32) as usize;
    let rate = sample_rate.max(1) as f32;

    let base = speaker.base_frequency();
    let f1 = base * FIRST_FORMANT;
    let f2 = base * SECOND_FORMANT;

    let samples = (0..frames)
        .map(|n| {
            let t = n as f32 / rate;

            // Syllable-rate envelope with a slower wobble on its phase
            let amp = 0.5 + 0.5 * (TAU * 3.5 * t + (TAU * 0.7 * t).sin() * 2.0).sin();
            let pitch = 1.0 + 0.05 * (TAU * 1.3 * t).sin();

            let voiced = (TAU * base * pitch * t).sin() * 0.4
                + (TAU * f1 * pitch * t).sin() * 0.2
                + (TAU * f2 * pitch * t).sin() * 0.1;
            let breath = rng.gen_range(-1.0_f32..1.0) * 0.08;

            let fade_in = (t / SPEECH_FADE_IN).min(1.0);
            let fade_out = ((seconds - t) / SPEECH_FADE_OUT).clamp(0.0, 1.0);

            (voiced + breath) * amp * fade_in * fade_out * 0.5
        })
        .collect();

    AudioBuffer::mono(samples, sample_rate)
}

/// Brown noise from a leaky integrator over white noise.
pub fn brown_noise<R: Rng + ?Sized>(duration: Duration, sample_rate: u32, rng: &mut R) -> AudioBuffer {
    let frames = (duration.as_secs_f32() * sample_rate as f32) as usize;
    let mut last = 0.0_f32;

    let samples = (0..frames)
        .map(|_| {
            let white: f32 = rng.gen_range(-1.0..1.0);
            last = (last + 0.02 * white) / 1.02;
            last * 3.5
        })
        .collect();

    AudioBuffer::mono(samples, sample_rate)
}

pub fn drone_frequencies(scene_index: usize) -> [f32; 4] {
    AMBIENT_PALETTES[scene_index % AMBIENT_PALETTES.len()]
}

/// Fallback ambient bed for the scene at `scene_index`.
pub fn ambient_bed(scene_index: usize, sample_rate: u32) -> AmbientBed {
    ambient_bed_with_rng(scene_index, sample_rate, &mut StdRng::from_entropy())
}

pub fn ambient_bed_with_rng<R: Rng + ?Sized>(
    scene_index: usize,
    sample_rate: u32,
    rng: &mut R,
) -> AmbientBed {
    let noise = brown_noise(
        Duration::from_secs_f32(AMBIENT_NOISE_SECONDS),
        sample_rate,
        rng,
    );

    let drones = drone_frequencies(scene_index)
        .iter()
        .map(|&frequency| DroneSpec {
            frequency,
            gain: DRONE_GAIN,
            lfo_rate: 0.1 + rng.gen::<f32>() * 0.3,
            lfo_depth: DRONE_LFO_DEPTH,
        })
        .collect();

    AmbientBed {
        noise,
        noise_gain: AMBIENT_NOISE_GAIN,
        drones,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 8000;

    fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len().max(1) as f32).sqrt()
    }

    #[test]
    fn speech_length_matches_requested_duration() {
        let buffer = speech_buffer(Speaker::A, Duration::from_millis(2500), RATE);
        assert_eq!(buffer.frames(), 20000);
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.duration(), Duration::from_millis(2500));
    }

    #[test]
    fn speech_fades_in_and_out() {
        let buffer = speech_buffer_with_rng(Speaker::B, Duration::from_secs(2), RATE, &mut seeded(7));
        let samples = buffer.samples();

        assert_eq!(samples[0], 0.0);
        assert!(samples.last().unwrap().abs() < 1e-3);

        // The middle carries energy, the first 10 ms barely any
        let head = rms(&samples[..80]);
        let middle = rms(&samples[7000..9000]);
        assert!(middle > 0.05, "middle rms {}", middle);
        assert!(head < middle);
        assert!(buffer.peak() <= 0.5);
    }

    #[test]
    fn speakers_sound_different() {
        let a = speech_buffer_with_rng(Speaker::A, Duration::from_secs(1), RATE, &mut seeded(1));
        let b = speech_buffer_with_rng(Speaker::B, Duration::from_secs(1), RATE, &mut seeded(1));
        assert_ne!(a.samples(), b.samples());
    }

    #[test]
    fn seeded_speech_is_reproducible() {
        let a = speech_buffer_with_rng(Speaker::A, Duration::from_secs(1), RATE, &mut seeded(3));
        let b = speech_buffer_with_rng(Speaker::A, Duration::from_secs(1), RATE, &mut seeded(3));
        assert_eq!(a.samples(), b.samples());
    }

    #[test]
    fn zero_duration_is_an_empty_buffer() {
        let buffer = speech_buffer(Speaker::A, Duration::ZERO, RATE);
        assert!(buffer.is_empty());
    }

    #[test]
    fn drone_palette_is_stable_per_scene() {
        let first = ambient_bed(2, RATE);
        let second = ambient_bed(2, RATE);

        let freqs = |bed: &AmbientBed| bed.drones.iter().map(|d| d.frequency).collect::<Vec<_>>();
        assert_eq!(freqs(&first), vec![80.0, 160.0, 300.0, 500.0]);
        assert_eq!(freqs(&first), freqs(&second));

        // Palette wraps around
        assert_eq!(drone_frequencies(7), drone_frequencies(2));
        assert_ne!(drone_frequencies(0), drone_frequencies(1));

        // Noise is random each time
        assert_ne!(first.noise.samples(), second.noise.samples());
    }

    #[test]
    fn ambient_bed_levels() {
        let bed = ambient_bed_with_rng(0, RATE, &mut seeded(11));

        assert_eq!(bed.noise.frames(), 10 * RATE as usize);
        assert_eq!(bed.noise_gain, AMBIENT_NOISE_GAIN);
        assert_eq!(bed.drones.len(), 4);
        for drone in &bed.drones {
            assert_eq!(drone.gain, DRONE_GAIN);
            assert!((0.1..0.4).contains(&drone.lfo_rate));
            assert!(drone.gain_at(1.234) >= DRONE_GAIN - DRONE_LFO_DEPTH - 1e-6);
            assert!(drone.gain_at(1.234) <= DRONE_GAIN + DRONE_LFO_DEPTH + 1e-6);
        }
    }

    #[test]
    fn brown_noise_stays_bounded() {
        let noise = brown_noise(Duration::from_secs(2), RATE, &mut seeded(5));
        assert!(noise.peak() <= 3.5);
        assert!(rms(noise.samples()) > 0.0);
    }
}
