use std::ops::RangeInclusive;

use duet_audio_utils::{duration_secs, silence};
use duet_script::Speaker;
use rand::Rng;
use rand::rngs::StdRng;

use crate::reorder::ReadySegment;

#[derive(Debug, Clone, PartialEq)]
pub enum TimelineBlock {
    Speech {
        index: u64,
        speaker: Speaker,
        samples: Vec<i16>,
    },
    Silence {
        samples: Vec<i16>,
    },
}

impl TimelineBlock {
    pub fn len(&self) -> usize {
        match self {
            TimelineBlock::Speech { samples, .. } | TimelineBlock::Silence { samples } => {
                samples.len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppendOutcome {
    pub samples: usize,
    pub silence_before_secs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StitchedAudio {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl StitchedAudio {
    pub fn duration_secs(&self) -> f64 {
        duration_secs(self.samples.len(), self.sample_rate)
    }
}

/// Append-only timeline of speech and silence blocks.
///
/// The output sample rate is adopted from the first appended segment. Later
/// segments with a different rate are kept as-is (no resampling) and logged.
pub struct AudioStitcher<R = StdRng> {
    rng: R,
    silence_secs: RangeInclusive<f64>,
    default_sample_rate: u32,
    output_sample_rate: Option<u32>,
    last_speaker: Option<Speaker>,
    last_index: Option<u64>,
    blocks: Vec<TimelineBlock>,
    silences_inserted: usize,
}

impl<R: Rng> AudioStitcher<R> {
    /// Non-finite or negative silence bounds disable silence instead of
    /// reaching the random draw.
    pub fn new(rng: R, silence_secs: RangeInclusive<f64>, default_sample_rate: u32) -> Self {
        let (min, max) = (*silence_secs.start(), *silence_secs.end());
        let silence_secs = if min.is_finite() && max.is_finite() && min >= 0.0 && max >= 0.0 {
            silence_secs
        } else {
            tracing::warn!(min, max, "invalid_silence_bounds_ignored");
            0.0..=0.0
        };

        Self {
            rng,
            silence_secs,
            default_sample_rate,
            output_sample_rate: None,
            last_speaker: None,
            last_index: None,
            blocks: Vec::new(),
            silences_inserted: 0,
        }
    }

    /// The adopted rate, or the configured default before any segment.
    pub fn output_sample_rate(&self) -> u32 {
        self.output_sample_rate.unwrap_or(self.default_sample_rate)
    }

    pub fn timeline(&self) -> &[TimelineBlock] {
        &self.blocks
    }

    pub fn silences_inserted(&self) -> usize {
        self.silences_inserted
    }

    /// Returns `None` when the segment was rejected.
    pub fn append(&mut self, segment: ReadySegment) -> Option<AppendOutcome> {
        let ReadySegment {
            index,
            speaker,
            sample_rate,
            samples,
        } = segment;

        if let Some(last) = self.last_index
            && index <= last
        {
            tracing::error!(segment_index = index, last_index = last, "out_of_order_append_rejected");
            return None;
        }

        match self.output_sample_rate {
            None => {
                self.output_sample_rate = Some(sample_rate);
                tracing::info!(sample_rate, "output_sample_rate_adopted");
            }
            Some(output) if output != sample_rate => {
                tracing::warn!(
                    segment_index = index,
                    sample_rate,
                    output_sample_rate = output,
                    "sample_rate_mismatch"
                );
            }
            Some(_) => {}
        }

        let samples = samples.into_i16();

        let silence_before_secs = match self.last_speaker {
            Some(previous) if previous != speaker => {
                let secs = self.draw_silence_secs();
                let block = TimelineBlock::Silence {
                    samples: silence(self.output_sample_rate(), secs),
                };
                if block.is_empty() {
                    None
                } else {
                    tracing::info!(
                        from = %previous,
                        to = %speaker,
                        secs,
                        samples = block.len(),
                        "silence_inserted"
                    );
                    self.blocks.push(block);
                    self.silences_inserted += 1;
                    Some(secs)
                }
            }
            _ => None,
        };

        let len = samples.len();
        self.blocks.push(TimelineBlock::Speech {
            index,
            speaker,
            samples,
        });
        self.last_speaker = Some(speaker);
        self.last_index = Some(index);

        tracing::info!(segment_index = index, lane = %speaker, samples = len, "segment_appended");

        Some(AppendOutcome {
            samples: len,
            silence_before_secs,
        })
    }

    fn draw_silence_secs(&mut self) -> f64 {
        let (min, max) = (*self.silence_secs.start(), *self.silence_secs.end());
        if max <= min {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    /// Concatenate all blocks in append order.
    pub fn finalize(self) -> crate::Result<StitchedAudio> {
        if self.blocks.is_empty() {
            return Err(crate::Error::EmptyTimeline);
        }

        let sample_rate = self.output_sample_rate();
        let total = self.blocks.iter().map(TimelineBlock::len).sum();
        let mut samples = Vec::with_capacity(total);
        for block in self.blocks {
            match block {
                TimelineBlock::Speech { samples: s, .. } | TimelineBlock::Silence { samples: s } => {
                    samples.extend(s)
                }
            }
        }

        Ok(StitchedAudio {
            sample_rate,
            samples,
        })
    }
}
