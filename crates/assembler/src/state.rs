use duet_script::{Segment, Speaker};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::AssemblyConfig;
use crate::dispatcher::SegmentDispatcher;
use crate::events::{AudioFragment, PipelineEvent, SegmentCompletion, SynthesisRequest};
use crate::reorder::{FragmentReorderBuffer, Flushed};
use crate::stitcher::{AudioStitcher, StitchedAudio};

/// Side effects requested by the pipeline, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Synthesize(SynthesisRequest),
    Appended {
        segment_index: u64,
        lane: Speaker,
        samples: usize,
        silence_before_secs: Option<f64>,
    },
    Skipped {
        segment_index: u64,
    },
    ScriptComplete {
        total_segments: usize,
    },
}

#[derive(Debug)]
pub struct Finished {
    pub audio: StitchedAudio,
    pub segments_appended: usize,
    pub segments_skipped: usize,
    pub silences_inserted: usize,
}

/// Sole owner of dispatcher lanes, reorder buffer and timeline. Every
/// inbound event goes through `handle`, one at a time.
pub struct PipelineState<R = StdRng> {
    dispatcher: SegmentDispatcher,
    reorder: FragmentReorderBuffer,
    stitcher: AudioStitcher<R>,
    segments_appended: usize,
    segments_skipped: usize,
    script_complete: bool,
    stopped: bool,
}

impl PipelineState<StdRng> {
    pub fn new(segments: Vec<Segment>, config: &AssemblyConfig) -> Self {
        Self::with_rng(segments, config, StdRng::from_os_rng())
    }
}

impl<R: Rng> PipelineState<R> {
    pub fn with_rng(segments: Vec<Segment>, config: &AssemblyConfig, rng: R) -> Self {
        let first_index = segments.iter().map(|s| s.index).min().unwrap_or(0);

        Self {
            dispatcher: SegmentDispatcher::new(segments),
            reorder: FragmentReorderBuffer::new(first_index),
            stitcher: AudioStitcher::new(
                rng,
                config.silence_min_secs..=config.silence_max_secs,
                config.default_sample_rate,
            ),
            segments_appended: 0,
            segments_skipped: 0,
            script_complete: false,
            stopped: false,
        }
    }

    pub fn is_script_complete(&self) -> bool {
        self.script_complete
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn active_segments(&self) -> Vec<u64> {
        self.dispatcher.active_segments()
    }

    pub fn stitcher(&self) -> &AudioStitcher<R> {
        &self.stitcher
    }

    /// Prime both lanes. An empty script completes immediately.
    pub fn start(&mut self) -> Vec<Effect> {
        let mut effects: Vec<Effect> = Speaker::ALL
            .iter()
            .filter_map(|&lane| self.dispatcher.dispatch_next(lane))
            .map(|segment| Effect::Synthesize(segment.into()))
            .collect();
        self.check_script_complete(&mut effects);
        effects
    }

    pub fn handle(&mut self, event: PipelineEvent) -> Vec<Effect> {
        if self.stopped || self.script_complete {
            tracing::debug!(?event, "event_after_shutdown_ignored");
            return Vec::new();
        }

        match event {
            PipelineEvent::Fragment(fragment) => {
                self.on_fragment(fragment);
                Vec::new()
            }
            PipelineEvent::Completed(completion) => self.on_completion(completion),
            PipelineEvent::Stop => {
                tracing::info!(pending = ?self.reorder.pending(), "pipeline_stopped");
                self.stopped = true;
                Vec::new()
            }
        }
    }

    fn on_fragment(&mut self, fragment: AudioFragment) {
        let AudioFragment {
            lane,
            segment_index,
            sequence,
            sample_rate,
            samples,
        } = fragment;

        let active = self.dispatcher.active_segment(lane);
        let Some(index) = segment_index.or(active) else {
            tracing::error!(%lane, ?sequence, "fragment_without_segment_on_idle_lane_dropped");
            return;
        };
        if segment_index.is_none() {
            tracing::warn!(%lane, segment_index = index, "fragment_attributed_to_active_segment");
        } else if active != Some(index) {
            tracing::debug!(%lane, segment_index = index, ?active, "fragment_for_inactive_segment");
        }

        if samples.is_empty() {
            tracing::warn!(%lane, segment_index = index, ?sequence, "empty_fragment_dropped");
            return;
        }

        let sample_rate = sample_rate.unwrap_or_else(|| self.stitcher.output_sample_rate());
        self.reorder.add_fragment(index, lane, sample_rate, samples);
    }

    fn on_completion(&mut self, completion: SegmentCompletion) -> Vec<Effect> {
        let SegmentCompletion {
            lane,
            segment_index,
        } = completion;

        // The dispatcher knows which segment is in flight even when the lane
        // produced no audio; the buffer heuristic only covers the rest.
        let active = self.dispatcher.active_segment(lane);
        let ready_index = segment_index.or(active);
        if segment_index.is_none()
            && let Some(resolved) = active
        {
            tracing::warn!(%lane, segment_index = resolved, "completion_index_resolved_heuristically");
        }
        self.reorder.mark_ready(ready_index, lane);

        let mut effects = Vec::new();
        if let Some(next) = self.dispatcher.complete(lane, segment_index) {
            effects.push(Effect::Synthesize(next.into()));
        }

        let flushed = self.reorder.flush();
        self.apply_flushed(flushed, &mut effects);
        self.check_script_complete(&mut effects);
        effects
    }

    fn apply_flushed(&mut self, flushed: Vec<Flushed>, effects: &mut Vec<Effect>) {
        for item in flushed {
            match item {
                Flushed::Segment(segment) => {
                    let segment_index = segment.index;
                    let lane = segment.speaker;
                    let Some(outcome) = self.stitcher.append(segment) else {
                        continue;
                    };
                    self.segments_appended += 1;
                    effects.push(Effect::Appended {
                        segment_index,
                        lane,
                        samples: outcome.samples,
                        silence_before_secs: outcome.silence_before_secs,
                    });
                }
                Flushed::Skipped { index } => {
                    self.segments_skipped += 1;
                    effects.push(Effect::Skipped {
                        segment_index: index,
                    });
                }
            }
        }
    }

    fn check_script_complete(&mut self, effects: &mut Vec<Effect>) {
        if self.dispatcher.take_script_complete() {
            self.script_complete = true;
            effects.push(Effect::ScriptComplete {
                total_segments: self.dispatcher.total(),
            });
        }
    }

    /// Final flush, then concatenate the timeline.
    pub fn finish(mut self) -> crate::Result<(Finished, Vec<Effect>)> {
        let mut effects = Vec::new();
        let flushed = self.reorder.flush();
        self.apply_flushed(flushed, &mut effects);

        if !self.reorder.is_empty() {
            tracing::warn!(
                pending = ?self.reorder.pending(),
                next_to_flush = self.reorder.next_to_flush(),
                "segments_left_in_buffer_at_finish"
            );
        }

        let silences_inserted = self.stitcher.silences_inserted();
        let audio = self.stitcher.finalize()?;

        Ok((
            Finished {
                audio,
                segments_appended: self.segments_appended,
                segments_skipped: self.segments_skipped,
                silences_inserted,
            },
            effects,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stitcher::TimelineBlock;

    fn config() -> AssemblyConfig {
        AssemblyConfig {
            silence_min_secs: 0.5,
            silence_max_secs: 3.0,
            default_sample_rate: 1000,
            ..Default::default()
        }
    }

    fn seg(index: u64, speaker: Speaker, text: &str) -> Segment {
        Segment {
            index,
            speaker,
            text: text.to_string(),
        }
    }

    fn pipeline(segments: Vec<Segment>) -> PipelineState {
        PipelineState::with_rng(segments, &config(), StdRng::seed_from_u64(42))
    }

    fn fragment(lane: Speaker, index: u64, samples: &[i16]) -> PipelineEvent {
        AudioFragment::new(lane, samples.to_vec())
            .segment(index)
            .sample_rate(1000)
            .into()
    }

    fn complete(lane: Speaker, index: Option<u64>) -> PipelineEvent {
        SegmentCompletion {
            lane,
            segment_index: index,
        }
        .into()
    }

    fn dispatched(effects: &[Effect]) -> Vec<u64> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Synthesize(r) => Some(r.segment_index),
                _ => None,
            })
            .collect()
    }

    fn appended(effects: &[Effect]) -> Vec<u64> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Appended { segment_index, .. } => Some(*segment_index),
                _ => None,
            })
            .collect()
    }

    fn timeline_shape(state: &PipelineState) -> Vec<String> {
        state
            .stitcher()
            .timeline()
            .iter()
            .map(|b| match b {
                TimelineBlock::Speech { index, .. } => format!("s{index}"),
                TimelineBlock::Silence { .. } => "-".to_string(),
            })
            .collect()
    }

    #[test]
    fn out_of_order_completion_keeps_script_order() {
        let mut state = pipeline(vec![
            seg(0, Speaker::A, "Hi"),
            seg(1, Speaker::B, "Hello there"),
            seg(2, Speaker::A, "Bye"),
        ]);

        let effects = state.start();
        assert_eq!(dispatched(&effects), vec![0, 1]);

        state.handle(fragment(Speaker::B, 1, &[2, 2]));
        let effects = state.handle(complete(Speaker::B, Some(1)));
        assert!(appended(&effects).is_empty());
        assert!(state.stitcher().timeline().is_empty());

        state.handle(fragment(Speaker::A, 0, &[1]));
        let effects = state.handle(complete(Speaker::A, Some(0)));
        assert_eq!(dispatched(&effects), vec![2]);
        assert_eq!(appended(&effects), vec![0, 1]);
        assert_eq!(timeline_shape(&state), vec!["s0", "-", "s1"]);

        state.handle(fragment(Speaker::A, 2, &[3]));
        let effects = state.handle(complete(Speaker::A, Some(2)));
        assert_eq!(appended(&effects), vec![2]);
        assert_eq!(
            effects.last(),
            Some(&Effect::ScriptComplete { total_segments: 3 })
        );
        assert_eq!(timeline_shape(&state), vec!["s0", "-", "s1", "-", "s2"]);
        assert!(state.is_script_complete());

        let (finished, _) = state.finish().unwrap();
        assert_eq!(finished.segments_appended, 3);
        assert_eq!(finished.silences_inserted, 2);
        assert_eq!(finished.audio.sample_rate, 1000);
    }

    #[test]
    fn fragment_without_index_goes_to_active_segment() {
        let mut state = pipeline(vec![seg(0, Speaker::A, "one")]);
        state.start();

        state.handle(AudioFragment::new(Speaker::A, vec![4i16, 4]).into());
        let effects = state.handle(complete(Speaker::A, None));

        assert_eq!(appended(&effects), vec![0]);
    }

    #[tracing_test::traced_test]
    #[test]
    fn completion_without_index_is_logged_as_degraded() {
        let mut state = pipeline(vec![seg(0, Speaker::A, "one")]);
        state.start();

        state.handle(fragment(Speaker::A, 0, &[1]));
        let effects = state.handle(SegmentCompletion::new(Speaker::A).into());

        assert_eq!(appended(&effects), vec![0]);
        assert!(logs_contain("completion_index_resolved_heuristically"));
    }

    #[test]
    fn fragment_on_idle_lane_without_index_is_dropped() {
        let mut state = pipeline(vec![seg(0, Speaker::A, "one")]);
        state.start();

        state.handle(AudioFragment::new(Speaker::B, vec![9i16]).into());
        state.handle(fragment(Speaker::A, 0, &[1]));
        state.handle(complete(Speaker::A, Some(0)));

        let (finished, _) = state.finish().unwrap();
        assert_eq!(finished.audio.samples, vec![1]);
    }

    #[test]
    fn completion_without_audio_is_skipped_without_blocking() {
        let mut state = pipeline(vec![seg(0, Speaker::A, "silent"), seg(1, Speaker::B, "spoken")]);
        state.start();

        state.handle(fragment(Speaker::B, 1, &[5]));
        state.handle(complete(Speaker::B, Some(1)));
        let effects = state.handle(complete(Speaker::A, None));

        assert_eq!(
            effects,
            vec![
                Effect::Skipped { segment_index: 0 },
                Effect::Appended {
                    segment_index: 1,
                    lane: Speaker::B,
                    samples: 1,
                    silence_before_secs: None,
                },
                Effect::ScriptComplete { total_segments: 2 },
            ]
        );
    }

    #[test]
    fn missing_sample_rate_uses_output_rate() {
        let mut state = pipeline(vec![seg(0, Speaker::A, "a"), seg(1, Speaker::A, "b")]);
        state.start();

        state.handle(
            AudioFragment::new(Speaker::A, vec![1i16])
                .segment(0)
                .sample_rate(22050)
                .into(),
        );
        state.handle(complete(Speaker::A, Some(0)));
        state.handle(AudioFragment::new(Speaker::A, vec![2i16]).segment(1).into());
        state.handle(complete(Speaker::A, Some(1)));

        let (finished, _) = state.finish().unwrap();
        assert_eq!(finished.audio.sample_rate, 22050);
        assert_eq!(finished.audio.samples, vec![1, 2]);
    }

    #[test]
    fn empty_script_completes_on_start() {
        let mut state = pipeline(vec![]);
        assert_eq!(
            state.start(),
            vec![Effect::ScriptComplete { total_segments: 0 }]
        );
        assert!(matches!(state.finish(), Err(crate::Error::EmptyTimeline)));
    }

    #[test]
    fn events_after_stop_are_ignored() {
        let mut state = pipeline(vec![seg(0, Speaker::A, "a")]);
        state.start();
        state.handle(PipelineEvent::Stop);
        assert!(state.is_stopped());

        state.handle(fragment(Speaker::A, 0, &[1]));
        assert!(state.handle(complete(Speaker::A, Some(0))).is_empty());
        assert!(state.stitcher().timeline().is_empty());
    }

    #[test]
    fn mismatched_completion_index_does_not_deadlock() {
        let mut state = pipeline(vec![
            seg(0, Speaker::A, "a"),
            seg(1, Speaker::A, "b"),
        ]);
        state.start();

        state.handle(fragment(Speaker::A, 0, &[1]));
        let effects = state.handle(complete(Speaker::A, Some(0)));
        assert_eq!(dispatched(&effects), vec![1]);

        state.handle(fragment(Speaker::A, 1, &[2]));
        let effects = state.handle(complete(Speaker::A, Some(9)));
        assert!(appended(&effects).is_empty());
        assert!(effects.contains(&Effect::ScriptComplete { total_segments: 2 }));
    }
}
