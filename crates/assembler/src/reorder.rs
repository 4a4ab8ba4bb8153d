//! Reorder buffer between out-of-order synthesis and the in-order timeline.
//!
//! Fragments are buffered per segment index as they arrive. A segment becomes
//! eligible only after an explicit completion, and `flush` releases eligible
//! segments strictly from `next_to_flush` upward, stopping at the first gap.
//! That single cursor is what makes output order equal script order no matter
//! how the two lanes interleave.

use std::collections::{BTreeSet, HashMap};

use duet_audio_utils::Samples;
use duet_script::Speaker;

/// A complete segment, released in script order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadySegment {
    pub index: u64,
    pub speaker: Speaker,
    pub sample_rate: u32,
    pub samples: Samples,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Flushed {
    Segment(ReadySegment),
    /// Marked ready with nothing buffered; the cursor moved past it.
    Skipped { index: u64 },
}

#[derive(Debug)]
pub struct FragmentReorderBuffer {
    fragments: HashMap<u64, Vec<Samples>>,
    speakers: HashMap<u64, Speaker>,
    sample_rates: HashMap<u64, u32>,
    ready: BTreeSet<u64>,
    next_to_flush: u64,
}

impl FragmentReorderBuffer {
    pub fn new(first_index: u64) -> Self {
        Self {
            fragments: HashMap::new(),
            speakers: HashMap::new(),
            sample_rates: HashMap::new(),
            ready: BTreeSet::new(),
            next_to_flush: first_index,
        }
    }

    pub fn next_to_flush(&self) -> u64 {
        self.next_to_flush
    }

    /// Append a fragment to its segment in arrival order. The first speaker
    /// and sample rate seen for an index win.
    pub fn add_fragment(&mut self, index: u64, speaker: Speaker, sample_rate: u32, pcm: Samples) {
        if index < self.next_to_flush {
            tracing::warn!(segment_index = index, lane = %speaker, "fragment_for_flushed_segment_dropped");
            return;
        }
        if self.ready.contains(&index) {
            tracing::warn!(segment_index = index, lane = %speaker, "fragment_after_completion");
        }

        let len = pcm.len();
        self.fragments.entry(index).or_default().push(pcm);
        self.speakers.entry(index).or_insert(speaker);
        let declared = *self.sample_rates.entry(index).or_insert(sample_rate);
        if declared != sample_rate {
            tracing::debug!(
                segment_index = index,
                declared,
                ignored = sample_rate,
                "later_sample_rate_hint_ignored"
            );
        }

        tracing::debug!(segment_index = index, lane = %speaker, samples = len, "fragment_buffered");
    }

    /// Mark a segment complete. Without an index, fall back to the lowest
    /// buffered, not-yet-ready index recorded for `speaker`.
    ///
    /// The fallback is a best-effort shim for producers that omit metadata.
    /// It is only reliable while a lane has a single incomplete segment
    /// buffered, which the one-in-flight dispatcher normally guarantees.
    pub fn mark_ready(&mut self, index: Option<u64>, speaker: Speaker) -> Option<u64> {
        let index = match index {
            Some(index) => index,
            None => {
                let resolved = self.resolve_missing_index(speaker);
                tracing::warn!(lane = %speaker, ?resolved, "completion_index_resolved_heuristically");
                match resolved {
                    Some(index) => index,
                    None => {
                        tracing::error!(lane = %speaker, "completion_unresolvable");
                        return None;
                    }
                }
            }
        };

        if index < self.next_to_flush {
            tracing::warn!(segment_index = index, lane = %speaker, "completion_for_flushed_segment_ignored");
            return None;
        }

        self.ready.insert(index);
        tracing::debug!(segment_index = index, lane = %speaker, "segment_ready");
        Some(index)
    }

    fn resolve_missing_index(&self, speaker: Speaker) -> Option<u64> {
        self.speakers
            .iter()
            .filter(|&(index, &label)| label == speaker && !self.ready.contains(index))
            .map(|(&index, _)| index)
            .min()
    }

    /// Release ready segments in index order until the first index that is
    /// not ready yet.
    pub fn flush(&mut self) -> Vec<Flushed> {
        let mut out = Vec::new();

        while self.ready.remove(&self.next_to_flush) {
            let index = self.next_to_flush;
            self.next_to_flush += 1;

            let fragments = self.fragments.remove(&index).unwrap_or_default();
            let speaker = self.speakers.remove(&index);
            let sample_rate = self.sample_rates.remove(&index);

            let (Some(speaker), Some(sample_rate)) = (speaker, sample_rate) else {
                tracing::warn!(segment_index = index, "segment_ready_without_audio");
                out.push(Flushed::Skipped { index });
                continue;
            };

            let samples = Samples::concat(fragments);
            if samples.is_empty() {
                tracing::warn!(segment_index = index, "segment_ready_without_audio");
                out.push(Flushed::Skipped { index });
                continue;
            }

            out.push(Flushed::Segment(ReadySegment {
                index,
                speaker,
                sample_rate,
                samples,
            }));
        }

        out
    }

    /// Indices still holding audio or a ready mark, for shutdown diagnostics.
    pub fn pending(&self) -> Vec<u64> {
        let mut indices: BTreeSet<u64> = self.fragments.keys().copied().collect();
        indices.extend(self.ready.iter().copied());
        indices.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.ready.is_empty()
    }
}
