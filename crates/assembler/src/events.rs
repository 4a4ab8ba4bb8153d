use std::path::PathBuf;

use duet_audio_utils::Samples;
use duet_script::{Segment, Speaker};

/// One piece of streamed audio from a lane's synthesis producer.
///
/// Only the lane and the payload are required. A missing `segment_index`
/// is attributed to the lane's in-flight segment; a missing `sample_rate`
/// falls back to the current output rate. `sequence` is informational:
/// fragments of one segment are assembled in arrival order.
#[derive(Debug, Clone)]
pub struct AudioFragment {
    pub lane: Speaker,
    pub segment_index: Option<u64>,
    pub sequence: Option<u32>,
    pub sample_rate: Option<u32>,
    pub samples: Samples,
}

impl AudioFragment {
    pub fn new(lane: Speaker, samples: impl Into<Samples>) -> Self {
        Self {
            lane,
            segment_index: None,
            sequence: None,
            sample_rate: None,
            samples: samples.into(),
        }
    }

    pub fn segment(mut self, index: u64) -> Self {
        self.segment_index = Some(index);
        self
    }

    pub fn sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        if sample_rate == 0 {
            tracing::warn!(lane = %self.lane, "ignoring_zero_sample_rate_hint");
            self.sample_rate = None;
        } else {
            self.sample_rate = Some(sample_rate);
        }
        self
    }
}

/// Signals that no more fragments will arrive for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentCompletion {
    pub lane: Speaker,
    pub segment_index: Option<u64>,
}

impl SegmentCompletion {
    pub fn new(lane: Speaker) -> Self {
        Self {
            lane,
            segment_index: None,
        }
    }

    pub fn segment(mut self, index: u64) -> Self {
        self.segment_index = Some(index);
        self
    }
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Fragment(AudioFragment),
    Completed(SegmentCompletion),
    Stop,
}

impl From<AudioFragment> for PipelineEvent {
    fn from(value: AudioFragment) -> Self {
        PipelineEvent::Fragment(value)
    }
}

impl From<SegmentCompletion> for PipelineEvent {
    fn from(value: SegmentCompletion) -> Self {
        PipelineEvent::Completed(value)
    }
}

/// Text released to a lane's synthesis producer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SynthesisRequest {
    pub lane: Speaker,
    pub segment_index: u64,
    pub text: String,
}

impl From<Segment> for SynthesisRequest {
    fn from(segment: Segment) -> Self {
        Self {
            lane: segment.speaker,
            segment_index: segment.index,
            text: segment.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AssemblyReport {
    pub output_path: PathBuf,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub segments_appended: usize,
    pub segments_skipped: usize,
    pub silences_inserted: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum AssemblerEvent {
    #[serde(rename = "segmentDispatched")]
    SegmentDispatched {
        session_id: String,
        segment_index: u64,
        lane: Speaker,
    },
    #[serde(rename = "segmentAppended")]
    SegmentAppended {
        session_id: String,
        segment_index: u64,
        lane: Speaker,
        samples: usize,
        silence_before_secs: Option<f64>,
    },
    #[serde(rename = "segmentSkipped")]
    SegmentSkipped {
        session_id: String,
        segment_index: u64,
    },
    #[serde(rename = "scriptComplete")]
    ScriptComplete {
        session_id: String,
        total_segments: usize,
    },
    #[serde(rename = "finished")]
    Finished {
        session_id: String,
        report: AssemblyReport,
    },
    #[serde(rename = "failed")]
    Failed { session_id: String, error: String },
}
