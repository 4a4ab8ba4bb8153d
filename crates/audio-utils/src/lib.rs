mod error;
mod samples;
mod wav;

pub use error::*;
pub use samples::*;
pub use wav::*;

const I16_SCALE: f32 = 32767.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioMetadata {
    pub sample_rate: u32,
    pub channels: u16,
}

pub fn f32_to_i16_samples(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&sample| f32_to_i16(sample)).collect()
}

pub fn f64_to_i16_samples(samples: &[f64]) -> Vec<i16> {
    samples.iter().map(|&sample| f32_to_i16(sample as f32)).collect()
}

fn f32_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * I16_SCALE) as i16
}

/// Number of samples covering `secs` at `sample_rate`, truncated.
pub fn samples_for_duration(sample_rate: u32, secs: f64) -> usize {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (sample_rate as f64 * secs) as usize
}

pub fn silence(sample_rate: u32, secs: f64) -> Vec<i16> {
    vec![0; samples_for_duration(sample_rate, secs)]
}

pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    sample_count as f64 / sample_rate as f64
}
