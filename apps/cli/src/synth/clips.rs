use std::path::PathBuf;

use duet_assembler::{AssemblerHandle, AudioFragment, SegmentCompletion, SynthesisRequest};
use duet_audio_utils::{Samples, read_wav_mono};
use duet_script::Speaker;

const FRAGMENT_LEN: usize = 4096;

/// Streams `<dir>/<segment_index>.wav` as if it were being synthesized.
pub struct ClipSource {
    lane: Speaker,
    dir: PathBuf,
}

impl ClipSource {
    pub fn new(lane: Speaker, dir: PathBuf) -> Self {
        Self { lane, dir }
    }

    pub fn clip_path(&self, segment_index: u64) -> PathBuf {
        self.dir.join(format!("{segment_index}.wav"))
    }

    /// Load a clip as fragments. `None` when the clip is missing or unreadable.
    pub async fn load(&self, segment_index: u64) -> Option<(u32, Vec<Samples>)> {
        let path = self.clip_path(segment_index);
        let loaded = tokio::task::spawn_blocking({
            let path = path.clone();
            move || read_wav_mono(&path)
        })
        .await;

        match loaded {
            Ok(Ok((metadata, samples))) => {
                Some((metadata.sample_rate, samples.chunks(FRAGMENT_LEN)))
            }
            Ok(Err(error)) => {
                tracing::warn!(segment_index, path = %path.display(), %error, "clip_unavailable");
                None
            }
            Err(error) => {
                tracing::error!(segment_index, %error, "clip_loader_failed");
                None
            }
        }
    }

    pub async fn stream(&mut self, request: &SynthesisRequest, handle: &AssemblerHandle) {
        if let Some((sample_rate, fragments)) = self.load(request.segment_index).await {
            for (sequence, fragment) in fragments.into_iter().enumerate() {
                handle.send(
                    AudioFragment::new(self.lane, fragment)
                        .segment(request.segment_index)
                        .sequence(sequence as u32)
                        .sample_rate(sample_rate),
                );
            }
        }

        handle.send(SegmentCompletion::new(self.lane).segment(request.segment_index));
    }
}
