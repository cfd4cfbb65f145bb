//! Per-clip loudness estimate and the gain factor derived from it.
//!
//! The loudness proxy is a trimmed mean of the positive half of the sample
//! distribution: silence and negative-going samples are dropped, the sorted
//! remainder loses its bottom and top `percentile`, and the middle is
//! averaged. That volume is mapped to a gain through a [`GainCurve`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audio::types::SampleBuffer;
use crate::config::VolumeConfig;
use crate::error::{AudioError, Result};

/// Maps a measured volume to a linear gain factor
pub trait GainCurve: Send + Sync {
    fn factor(&self, volume: f64) -> f64;
}

impl<F> GainCurve for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn factor(&self, volume: f64) -> f64 {
        self(volume)
    }
}

/// `linear * v + inverse / v + offset`, optionally floored
///
/// Both empirically fit curves are instances of this shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RationalCurve {
    pub linear: f64,
    pub inverse: f64,
    pub offset: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<f64>,
}

impl RationalCurve {
    /// `10.3 * v + 0.0997 / v + 0.41`
    pub const fn reference() -> Self {
        Self {
            linear: 10.3,
            inverse: 0.0997,
            offset: 0.41,
            floor: None,
        }
    }

    /// `max(0.1, 10.3 * v + 0.1597 / v - 0.41)`
    pub const fn clamped() -> Self {
        Self {
            linear: 10.3,
            inverse: 0.1597,
            offset: -0.41,
            floor: Some(0.1),
        }
    }
}

impl Default for RationalCurve {
    fn default() -> Self {
        Self::reference()
    }
}

impl GainCurve for RationalCurve {
    fn factor(&self, volume: f64) -> f64 {
        let raw = self.linear * volume + self.inverse / volume + self.offset;
        match self.floor {
            Some(floor) => raw.max(floor),
            None => raw,
        }
    }
}

/// What to do with a clip that has no positive samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilentClipPolicy {
    /// Abort with [`AudioError::EmptySampleBuffer`]
    #[default]
    Fail,
    /// Leave the clip at unity gain
    Neutral,
}

/// Result of measuring one clip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeMeasurement {
    /// Trimmed-mean amplitude, `None` when the clip was silent
    pub volume: Option<f64>,
    pub gain: f64,
    pub positive_samples: usize,
}

pub struct VolumeEstimator {
    percentile: f64,
    curve: Box<dyn GainCurve>,
    on_silent: SilentClipPolicy,
}

impl VolumeEstimator {
    pub fn new<C: GainCurve + 'static>(percentile: f64, curve: C) -> Self {
        Self {
            percentile,
            curve: Box::new(curve),
            on_silent: SilentClipPolicy::Fail,
        }
    }

    pub fn from_config(config: &VolumeConfig) -> Self {
        Self::new(config.percentile, config.curve).with_silent_policy(config.on_silent_clip)
    }

    pub fn with_silent_policy(mut self, policy: SilentClipPolicy) -> Self {
        self.on_silent = policy;
        self
    }

    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// Trimmed mean of the positive samples, `None` if there are none
    ///
    /// Indices follow `floor(p * n)..floor((1 - p) * n)`. A buffer too short
    /// to survive the trim is averaged whole.
    pub fn trimmed_mean(&self, samples: &[f32]) -> Option<f64> {
        let mut positive: Vec<f64> = samples
            .iter()
            .filter(|s| is_measurable(**s))
            .map(|s| *s as f64)
            .collect();

        if positive.is_empty() {
            return None;
        }
        positive.sort_by(f64::total_cmp);

        let n = positive.len();
        let low = (self.percentile * n as f64) as usize;
        let high = ((1.0 - self.percentile) * n as f64) as usize;
        let window = if low < high && high <= n {
            &positive[low..high]
        } else {
            &positive[..]
        };

        let mean = window.iter().sum::<f64>() / window.len() as f64;
        // summation error must not push the mean outside the window
        Some(mean.clamp(window[0], window[window.len() - 1]))
    }

    /// Gain for a measured volume
    pub fn gain_for(&self, volume: f64) -> Result<f64> {
        let factor = self.curve.factor(volume);
        if !factor.is_finite() || factor <= 0.0 {
            return Err(AudioError::InvalidGain { volume, factor }.into());
        }
        Ok(factor)
    }

    /// Measure a clip's buffer and derive its gain
    pub fn measure(&self, clip_name: &str, buffer: &SampleBuffer) -> Result<VolumeMeasurement> {
        let positive_samples = buffer.samples.iter().filter(|s| is_measurable(**s)).count();

        match self.trimmed_mean(&buffer.samples) {
            Some(volume) => {
                let gain = self.gain_for(volume)?;
                debug!(
                    "{}: {} samples ({} positive), volume {:.5} -> gain {:.3}",
                    clip_name,
                    buffer.len(),
                    positive_samples,
                    volume,
                    gain
                );
                Ok(VolumeMeasurement {
                    volume: Some(volume),
                    gain,
                    positive_samples,
                })
            }
            None => match self.on_silent {
                SilentClipPolicy::Fail => Err(AudioError::EmptySampleBuffer {
                    clip: clip_name.to_string(),
                }
                .into()),
                SilentClipPolicy::Neutral => {
                    warn!("{} has no positive samples, keeping unity gain", clip_name);
                    Ok(VolumeMeasurement {
                        volume: None,
                        gain: 1.0,
                        positive_samples: 0,
                    })
                }
            },
        }
    }
}

/// Samples that take part in the volume estimate
fn is_measurable(sample: f32) -> bool {
    sample.is_finite() && sample > 0.0
}

impl Default for VolumeEstimator {
    fn default() -> Self {
        Self::new(0.1, RationalCurve::reference())
    }
}
