use crate::scene::{ListenerPose, Position};
use serde::{Deserialize, Serialize};

/// Per-ear gains for one mono source.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StereoGains {
    pub left: f32,
    pub right: f32,
}

impl StereoGains {
    #[inline]
    pub fn apply(&self, sample: f32) -> (f32, f32) {
        (sample * self.left, sample * self.right)
    }
}

/// Binaural panning primitive.
///
/// Given where a source sits and where the listener's head is, returns the
/// gains for each ear, distance attenuation included. The graph only supplies
/// positions.
pub trait BinauralPanner: Send + Sync {
    fn gains(&self, source: Position, listener: &ListenerPose, listener_height: f32) -> StereoGains;
}

/// Inverse-distance attenuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceModel {
    pub ref_distance: f32,
    pub max_distance: f32,
    pub rolloff: f32,
}

impl Default for DistanceModel {
    fn default() -> Self {
        Self {
            ref_distance: 1.0,
            max_distance: 50.0,
            rolloff: 1.5,
        }
    }
}

impl DistanceModel {
    pub fn gain(&self, distance: f32) -> f32 {
        let reference = self.ref_distance.max(f32::EPSILON);
        let max = self.max_distance.max(reference);
        let d = distance.clamp(reference, max);
        reference / (reference + self.rolloff * (d - reference))
    }
}

/// Equal-power azimuth panning with inverse-distance attenuation and a mild
/// level drop for sources behind the listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualPowerPanner {
    pub distance: DistanceModel,
    /// Gain loss for a source directly behind, 0.0-1.0
    pub rear_shading: f32,
}

impl EqualPowerPanner {
    pub fn new(distance: DistanceModel) -> Self {
        Self {
            distance,
            rear_shading: 0.3,
        }
    }
}

impl Default for EqualPowerPanner {
    fn default() -> Self {
        Self::new(DistanceModel::default())
    }
}

impl BinauralPanner for EqualPowerPanner {
    fn gains(&self, source: Position, listener: &ListenerPose, listener_height: f32) -> StereoGains {
        let dx = source.x - listener.x;
        let dy = source.y - listener_height;
        let dz = source.z - listener.z;

        let horizontal = (dx * dx + dz * dz).sqrt();
        let distance = (horizontal * horizontal + dy * dy).sqrt();
        let attenuation = self.distance.gain(distance);

        // Directly above or below: centred
        if horizontal < 1e-4 {
            let g = attenuation * std::f32::consts::FRAC_1_SQRT_2;
            return StereoGains { left: g, right: g };
        }

        let (rx, rz) = listener.right();
        let (fx, fz) = listener.forward();
        let lateral = (dx * rx + dz * rz) / horizontal;
        let frontal = (dx * fx + dz * fz) / horizontal;

        // Pan value between -1.0 (full left) and 1.0 (full right)
        let pan = lateral.clamp(-1.0, 1.0);
        let angle = (pan + 1.0) * std::f32::consts::PI / 4.0;

        let shading = if frontal < 0.0 {
            1.0 - self.rear_shading.clamp(0.0, 1.0) * -frontal
        } else {
            1.0
        };

        let gain = attenuation * shading;
        StereoGains {
            left: angle.cos() * gain,
            right: angle.sin() * gain,
        }
    }
}

/// Mean absolute level per channel of interleaved stereo.
pub fn measure_stereo_levels(stereo_audio: &[f32]) -> (f32, f32) {
    if stereo_audio.len() < 2 {
        return (0.0, 0.0);
    }

    let mut left_sum = 0.0;
    let mut right_sum = 0.0;
    for frame in stereo_audio.chunks_exact(2) {
        left_sum += frame[0].abs();
        right_sum += frame[1].abs();
    }

    let count = (stereo_audio.len() / 2) as f32;
    (left_sum / count, right_sum / count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    const EAR: f32 = 0.0;

    fn render(panner: &EqualPowerPanner, source: Position, listener: &ListenerPose) -> Vec<f32> {
        let gains = panner.gains(source, listener, EAR);
        (0..480)
            .map(|i| (i as f32 * 0.05).sin())
            .flat_map(|s| {
                let (l, r) = gains.apply(s);
                [l, r]
            })
            .collect()
    }

    #[test]
    fn test_spatial_positioning() {
        let panner = EqualPowerPanner::default();
        let listener = ListenerPose::default();

        let right_biased = render(&panner, Position::on_floor(1.0, 0.0), &listener);
        let left_biased = render(&panner, Position::on_floor(-1.0, 0.0), &listener);

        let (left_level_when_right, right_level_when_right) = measure_stereo_levels(&right_biased);
        let (left_level_when_left, right_level_when_left) = measure_stereo_levels(&left_biased);

        assert!(right_level_when_right > left_level_when_right);
        assert!(left_level_when_left > right_level_when_left);
    }

    #[test]
    fn turning_around_swaps_ears() {
        let panner = EqualPowerPanner::default();
        let source = Position::on_floor(3.0, -3.0);

        let facing_north = panner.gains(source, &ListenerPose::new(0.0, 0.0, 0.0), EAR);
        let facing_south = panner.gains(source, &ListenerPose::new(0.0, 0.0, PI), EAR);

        assert!(facing_north.right > facing_north.left);
        assert!(facing_south.left > facing_south.right);
    }

    #[test]
    fn source_ahead_is_centred_and_behind_is_quieter() {
        let panner = EqualPowerPanner::default();
        let listener = ListenerPose::default();

        let ahead = panner.gains(Position::on_floor(0.0, -2.0), &listener, EAR);
        let behind = panner.gains(Position::on_floor(0.0, 2.0), &listener, EAR);

        assert!((ahead.left - ahead.right).abs() < 1e-5);
        assert!((behind.left - behind.right).abs() < 1e-5);
        assert!(behind.left < ahead.left);
    }

    #[test]
    fn heading_east_puts_north_on_the_left() {
        let panner = EqualPowerPanner::default();
        let gains = panner.gains(
            Position::on_floor(0.0, -5.0),
            &ListenerPose::new(0.0, 0.0, FRAC_PI_2),
            EAR,
        );
        assert!(gains.left > gains.right);
    }

    #[test]
    fn inverse_distance_law() {
        let model = DistanceModel::default();

        assert_eq!(model.gain(0.2), 1.0);
        assert_eq!(model.gain(1.0), 1.0);
        // 1 / (1 + 1.5 * (3 - 1))
        assert!((model.gain(3.0) - 0.25).abs() < 1e-6);
        // Clamped at max distance
        assert_eq!(model.gain(50.0), model.gain(500.0));
        assert!(model.gain(10.0) > model.gain(20.0));
    }

    #[test]
    fn listener_height_counts_towards_distance() {
        let panner = EqualPowerPanner::default();
        let listener = ListenerPose::default();
        let source = Position::on_floor(0.0, -1.0);

        let at_floor = panner.gains(source, &listener, 0.0);
        let standing = panner.gains(source, &listener, 1.7);
        assert!(standing.left < at_floor.left);
    }

    #[test]
    fn levels_of_silence_are_zero() {
        assert_eq!(measure_stereo_levels(&[]), (0.0, 0.0));
        assert_eq!(measure_stereo_levels(&[0.0; 8]), (0.0, 0.0));
    }
}
