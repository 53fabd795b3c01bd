use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

pub const BELL_FREQUENCY_HZ: f32 = 440.0;
const SAMPLE_RATE: u32 = 44100;
const ATTACK_SECS: f32 = 0.1;
const TOTAL_SECS: f32 = 1.0;
const PEAK_GAIN: f32 = 0.3;
/// Exponential decays never reach zero; this is where the tail is cut.
const FLOOR_GAIN: f32 = 0.01;

/// Synthesized bell used when no recorded sound is available for a cue.
/// Rises linearly to its peak, then decays exponentially to near silence.
pub struct BellTone {
    frequency: f32,
    num_sample: u32,
    total_samples: u32,
}

impl BellTone {
    pub fn new() -> Self {
        Self::with_frequency(BELL_FREQUENCY_HZ)
    }

    pub fn with_frequency(frequency: f32) -> Self {
        Self {
            frequency,
            num_sample: 0,
            total_samples: (SAMPLE_RATE as f32 * TOTAL_SECS) as u32,
        }
    }

    pub fn envelope(t: f32) -> f32 {
        if t <= 0.0 {
            0.0
        } else if t < ATTACK_SECS {
            PEAK_GAIN * t / ATTACK_SECS
        } else if t < TOTAL_SECS {
            let progress = (t - ATTACK_SECS) / (TOTAL_SECS - ATTACK_SECS);
            PEAK_GAIN * (FLOOR_GAIN / PEAK_GAIN).powf(progress)
        } else {
            0.0
        }
    }
}

impl Default for BellTone {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for BellTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        self.num_sample += 1;

        Some(Self::envelope(t) * (2.0 * PI * self.frequency * t).sin())
    }
}

impl Source for BellTone {
    fn current_frame_len(&self) -> Option<usize> {
        Some((self.total_samples - self.num_sample) as usize)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(TOTAL_SECS))
    }
}
