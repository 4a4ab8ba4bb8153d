use std::f32::consts::TAU;
use std::time::Duration;

use duet_assembler::{AssemblerHandle, AudioFragment, SegmentCompletion, SynthesisRequest};
use duet_audio_utils::{Samples, samples_for_duration};
use duet_script::Speaker;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TONE_SAMPLE_RATE: u32 = 24000;
const FRAGMENTS_PER_SEGMENT: usize = 4;
const AMPLITUDE: f32 = 0.3;
const FADE_SECS: f64 = 0.01;
const FALLBACK_SECS_PER_CHAR: f64 = 0.2;
const MAX_JITTER_MS: u64 = 80;

/// Renders each segment as a sine tone whose length follows the text.
pub struct ToneSynth {
    lane: Speaker,
    chars_per_second: f64,
    rng: StdRng,
}

impl ToneSynth {
    pub fn new(lane: Speaker, chars_per_second: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            lane,
            chars_per_second,
            rng,
        }
    }

    fn frequency(&self) -> f32 {
        match self.lane {
            Speaker::A => 220.0,
            Speaker::B => 330.0,
        }
    }

    fn duration_secs(&self, text: &str) -> f64 {
        let chars = text.chars().count().max(1) as f64;
        if self.chars_per_second > 0.0 {
            chars / self.chars_per_second
        } else {
            chars * FALLBACK_SECS_PER_CHAR
        }
    }

    pub fn render(&self, text: &str) -> Vec<f32> {
        let len = samples_for_duration(TONE_SAMPLE_RATE, self.duration_secs(text)).max(1);
        let fade = samples_for_duration(TONE_SAMPLE_RATE, FADE_SECS).max(1);
        let step = TAU * self.frequency() / TONE_SAMPLE_RATE as f32;

        (0..len)
            .map(|i| {
                let edge = i.min(len - 1 - i);
                let gain = (edge as f32 / fade as f32).min(1.0);
                AMPLITUDE * gain * (step * i as f32).sin()
            })
            .collect()
    }

    fn jitter(&mut self) -> Duration {
        Duration::from_millis(self.rng.random_range(0..=MAX_JITTER_MS))
    }

    pub async fn stream(&mut self, request: &SynthesisRequest, handle: &AssemblerHandle) {
        let samples = Samples::F32(self.render(&request.text));
        let chunk_len = samples.len().div_ceil(FRAGMENTS_PER_SEGMENT);

        for (sequence, chunk) in samples.chunks(chunk_len).into_iter().enumerate() {
            tokio::time::sleep(self.jitter()).await;
            handle.send(
                AudioFragment::new(self.lane, chunk)
                    .segment(request.segment_index)
                    .sequence(sequence as u32)
                    .sample_rate(TONE_SAMPLE_RATE),
            );
        }

        tokio::time::sleep(self.jitter()).await;
        handle.send(SegmentCompletion::new(self.lane).segment(request.segment_index));
        tracing::debug!(segment_index = request.segment_index, "tone_streamed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_follows_text_and_rate() {
        let tone = ToneSynth::new(Speaker::A, 4.0, Some(1));
        assert_eq!(tone.render("abcd").len(), TONE_SAMPLE_RATE as usize);
        assert_eq!(tone.render("你好你好你好你好").len(), 2 * TONE_SAMPLE_RATE as usize);
    }

    #[test]
    fn stays_within_amplitude_and_fades_in() {
        let tone = ToneSynth::new(Speaker::B, 4.5, Some(1));
        let samples = tone.render("hello there");

        assert!(samples.iter().all(|s| s.abs() <= AMPLITUDE));
        assert_eq!(samples[0], 0.0);
    }

    #[test]
    fn zero_rate_falls_back_to_fixed_pace() {
        let tone = ToneSynth::new(Speaker::A, 0.0, Some(1));
        assert_eq!(tone.render("abcde").len(), TONE_SAMPLE_RATE as usize);
    }
}
