//! Stand-in synthesis producers, one task per lane.
//!
//! Each lane task handles one request at a time: it streams the segment's
//! fragments to the assembler and then signals completion. The assembler
//! never has more than one request outstanding per lane.

mod clips;
mod tone;

use std::path::PathBuf;

use duet_assembler::{AssemblerHandle, SynthesisRequest};
use duet_script::Speaker;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

pub use clips::ClipSource;
pub use tone::ToneSynth;

use crate::error::{Error, Result};
use crate::runtime::LaneReceivers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SynthKind {
    /// Sine tones sized to the text, streamed with jitter.
    Tone,
    /// Pre-rendered `<segment_index>.wav` files.
    Clips,
}

pub enum Synth {
    Tone {
        chars_per_second: f64,
        seed: Option<u64>,
    },
    Clips {
        dir: PathBuf,
    },
}

impl Synth {
    pub fn from_args(
        kind: SynthKind,
        clips_dir: Option<PathBuf>,
        chars_per_second: f64,
        seed: Option<u64>,
    ) -> Result<Self> {
        match kind {
            SynthKind::Tone => Ok(Synth::Tone {
                chars_per_second,
                seed,
            }),
            SynthKind::Clips => {
                let dir = clips_dir.ok_or(Error::MissingClipsDir)?;
                if !dir.is_dir() {
                    return Err(Error::ClipsDirNotFound(dir));
                }
                Ok(Synth::Clips { dir })
            }
        }
    }

    fn producer(&self, lane: Speaker) -> LaneProducer {
        match self {
            Synth::Tone {
                chars_per_second,
                seed,
            } => {
                let lane_seed = seed.map(|s| s.wrapping_add(lane as u64 + 1));
                LaneProducer::Tone(ToneSynth::new(lane, *chars_per_second, lane_seed))
            }
            Synth::Clips { dir } => LaneProducer::Clips(ClipSource::new(lane, dir.clone())),
        }
    }

    pub fn spawn_lanes(self, lanes: LaneReceivers, handle: AssemblerHandle) -> Vec<JoinHandle<()>> {
        let LaneReceivers { a, b } = lanes;

        [(Speaker::A, a), (Speaker::B, b)]
            .into_iter()
            .map(|(lane, requests)| {
                let producer = self.producer(lane);
                tokio::spawn(run_lane(lane, requests, producer, handle.clone()))
            })
            .collect()
    }
}

enum LaneProducer {
    Tone(ToneSynth),
    Clips(ClipSource),
}

async fn run_lane(
    lane: Speaker,
    mut requests: mpsc::UnboundedReceiver<SynthesisRequest>,
    mut producer: LaneProducer,
    handle: AssemblerHandle,
) {
    let span = tracing::info_span!("lane", %lane);

    async move {
        while let Some(request) = requests.recv().await {
            tracing::debug!(segment_index = request.segment_index, "synthesis_started");
            match &mut producer {
                LaneProducer::Tone(tone) => tone.stream(&request, &handle).await,
                LaneProducer::Clips(clips) => clips.stream(&request, &handle).await,
            }
        }
        tracing::debug!("lane_closed");
    }
    .instrument(span)
    .await
}
