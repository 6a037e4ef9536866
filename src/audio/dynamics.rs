//! Stereo-linked limiter in front of the master gain.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    /// Seconds
    pub attack: f32,
    /// Seconds
    pub release: f32,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            threshold_db: -6.0,
            knee_db: 10.0,
            ratio: 4.0,
            attack: 0.003,
            release: 0.25,
        }
    }
}

#[inline]
pub fn amplitude_to_db(amp: f32) -> f32 {
    if amp <= 0.0 {
        -96.0
    } else {
        20.0 * amp.log10()
    }
}

#[inline]
pub fn db_to_amplitude(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// One-pole smoothing coefficient for a time constant. Zero time is instant.
#[inline]
fn time_to_coeff(time_seconds: f32, sample_rate: u32) -> f32 {
    if time_seconds <= 0.0 || sample_rate == 0 {
        0.0
    } else {
        (-1.0 / (time_seconds * sample_rate as f32)).exp()
    }
}

/// Soft-knee compressor applied to both channels with one shared gain.
#[derive(Debug, Clone)]
pub struct Limiter {
    settings: LimiterSettings,
    gain_reduction: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl Limiter {
    pub fn new(settings: LimiterSettings, sample_rate: u32) -> Self {
        let mut limiter = Self {
            settings: LimiterSettings {
                ratio: settings.ratio.max(1.0),
                knee_db: settings.knee_db.max(0.0),
                ..settings
            },
            gain_reduction: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
        };
        limiter.set_sample_rate(sample_rate);
        limiter
    }

    pub fn settings(&self) -> &LimiterSettings {
        &self.settings
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.attack_coeff = time_to_coeff(self.settings.attack, sample_rate);
        self.release_coeff = time_to_coeff(self.settings.release, sample_rate);
    }

    pub fn reset(&mut self) {
        self.gain_reduction = 0.0;
    }

    /// Current reduction in dB, positive when limiting.
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction
    }

    /// Static curve: how many dB to take off a signal at `input_db`.
    pub fn compute_gain_reduction(&self, input_db: f32) -> f32 {
        let LimiterSettings {
            threshold_db: threshold,
            knee_db: knee,
            ratio,
            ..
        } = self.settings;

        if knee <= 0.0 {
            return (input_db - threshold).max(0.0) * (1.0 - 1.0 / ratio);
        }

        let half_knee = knee / 2.0;
        let below = threshold - half_knee;
        let above = threshold + half_knee;

        if input_db <= below {
            0.0
        } else if input_db >= above {
            (input_db - threshold) * (1.0 - 1.0 / ratio)
        } else {
            let x = input_db - below;
            let slope = (1.0 - 1.0 / ratio) / (2.0 * knee);
            slope * x * x
        }
    }

    /// Non-finite frames come out silent and leave the envelope untouched.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        if !(left.is_finite() && right.is_finite()) {
            return (0.0, 0.0);
        }

        let level = left.abs().max(right.abs());
        let target = self.compute_gain_reduction(amplitude_to_db(level));

        let coeff = if target > self.gain_reduction {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.gain_reduction = coeff * self.gain_reduction + (1.0 - coeff) * target;

        let gain = db_to_amplitude(-self.gain_reduction);
        (left * gain, right * gain)
    }
}
