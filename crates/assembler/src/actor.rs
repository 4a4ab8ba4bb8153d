use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use duet_audio_utils::write_wav_mono_i16;
use duet_script::Segment;
use ractor::concurrency::JoinHandle;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::oneshot;
use tracing::Instrument;

use crate::config::AssemblyConfig;
use crate::events::{AssemblerEvent, AssemblyReport, PipelineEvent};
use crate::runtime::AssemblerRuntime;
use crate::state::{Effect, Finished, PipelineState};
use crate::{Error, Result};

const MIN_WATCHDOG_PERIOD: Duration = Duration::from_millis(50);

pub enum AssemblerMsg {
    Event(PipelineEvent),
    Tick,
}

impl From<PipelineEvent> for AssemblerMsg {
    fn from(event: PipelineEvent) -> Self {
        AssemblerMsg::Event(event)
    }
}

pub struct AssemblyParams {
    pub runtime: Arc<dyn AssemblerRuntime>,
    pub session_id: String,
    pub segments: Vec<Segment>,
    pub config: AssemblyConfig,
    pub output_path: PathBuf,
    /// Seeds the silence generator; `None` draws from the OS.
    pub seed: Option<u64>,
}

pub struct AssemblerArgs {
    params: AssemblyParams,
    done: oneshot::Sender<Result<AssemblyReport>>,
}

pub struct AssemblerState {
    runtime: Arc<dyn AssemblerRuntime>,
    session_id: String,
    output_path: PathBuf,
    pipeline: Option<PipelineState>,
    done: Option<oneshot::Sender<Result<AssemblyReport>>>,
    stall_timeout: Option<Duration>,
    last_event: Instant,
    watchdog: Option<JoinHandle<()>>,
}

impl AssemblerState {
    fn emit(&self, event: AssemblerEvent) {
        self.runtime.emit(event);
    }

    /// Forward effects to the runtime. Returns `true` on script completion.
    fn apply(&self, effects: Vec<Effect>) -> bool {
        let mut script_complete = false;

        for effect in effects {
            match effect {
                Effect::Synthesize(request) => {
                    self.emit(AssemblerEvent::SegmentDispatched {
                        session_id: self.session_id.clone(),
                        segment_index: request.segment_index,
                        lane: request.lane,
                    });
                    self.runtime.synthesize(request);
                }
                Effect::Appended {
                    segment_index,
                    lane,
                    samples,
                    silence_before_secs,
                } => self.emit(AssemblerEvent::SegmentAppended {
                    session_id: self.session_id.clone(),
                    segment_index,
                    lane,
                    samples,
                    silence_before_secs,
                }),
                Effect::Skipped { segment_index } => self.emit(AssemblerEvent::SegmentSkipped {
                    session_id: self.session_id.clone(),
                    segment_index,
                }),
                Effect::ScriptComplete { total_segments } => {
                    script_complete = true;
                    self.emit(AssemblerEvent::ScriptComplete {
                        session_id: self.session_id.clone(),
                        total_segments,
                    });
                }
            }
        }

        script_complete
    }

    fn deliver(&mut self, result: Result<AssemblyReport>) {
        match &result {
            Ok(report) => self.emit(AssemblerEvent::Finished {
                session_id: self.session_id.clone(),
                report: report.clone(),
            }),
            Err(error) => {
                tracing::error!(%error, "assembly_failed");
                self.emit(AssemblerEvent::Failed {
                    session_id: self.session_id.clone(),
                    error: error.to_string(),
                });
            }
        }

        if let Some(done) = self.done.take() {
            let _ = done.send(result);
        }
    }

    async fn finish(&mut self) -> Result<AssemblyReport> {
        let pipeline = self.pipeline.take().ok_or(Error::Aborted)?;
        let (finished, effects) = pipeline.finish()?;
        self.apply(effects);

        let Finished {
            audio,
            segments_appended,
            segments_skipped,
            silences_inserted,
        } = finished;
        let sample_rate = audio.sample_rate;
        let duration_secs = audio.duration_secs();

        tokio::task::spawn_blocking({
            let path = self.output_path.clone();
            move || write_wav_mono_i16(&path, audio.sample_rate, &audio.samples)
        })
        .await??;

        tracing::info!(
            path = %self.output_path.display(),
            sample_rate,
            duration_secs,
            segments_appended,
            segments_skipped,
            "audio_written"
        );

        Ok(AssemblyReport {
            output_path: self.output_path.clone(),
            sample_rate,
            duration_secs,
            segments_appended,
            segments_skipped,
            silences_inserted,
        })
    }

    async fn complete(&mut self, myself: &ActorRef<AssemblerMsg>) {
        let result = self.finish().await;
        self.deliver(result);
        myself.stop(None);
    }

    fn abort(&mut self, myself: &ActorRef<AssemblerMsg>, error: Error) {
        self.pipeline = None;
        self.deliver(Err(error));
        myself.stop(None);
    }
}

fn assembly_span(session_id: &str) -> tracing::Span {
    tracing::info_span!("assembly", session_id = %session_id)
}

/// Owns the pipeline state and processes inbound events one at a time.
pub struct AssemblerActor;

#[ractor::async_trait]
impl Actor for AssemblerActor {
    type Msg = AssemblerMsg;
    type State = AssemblerState;
    type Arguments = AssemblerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> std::result::Result<Self::State, ActorProcessingErr> {
        let AssemblerArgs { params, done } = args;
        let span = assembly_span(&params.session_id);

        async move {
            let rng = match params.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let stall_timeout = params.config.stall_timeout();
            let mut pipeline = PipelineState::with_rng(params.segments, &params.config, rng);
            let effects = pipeline.start();

            let watchdog = stall_timeout.map(|timeout| {
                let period = (timeout / 4).max(MIN_WATCHDOG_PERIOD);
                myself.send_interval(period, || AssemblerMsg::Tick)
            });

            let mut state = AssemblerState {
                runtime: params.runtime,
                session_id: params.session_id,
                output_path: params.output_path,
                pipeline: Some(pipeline),
                done: Some(done),
                stall_timeout,
                last_event: Instant::now(),
                watchdog,
            };

            tracing::info!(?stall_timeout, "assembly_started");
            if state.apply(effects) {
                state.complete(&myself).await;
            }

            Ok(state)
        }
        .instrument(span)
        .await
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> std::result::Result<(), ActorProcessingErr> {
        if let Some(watchdog) = state.watchdog.take() {
            watchdog.abort();
        }
        if state.done.is_some() {
            let _guard = assembly_span(&state.session_id).entered();
            state.deliver(Err(Error::Cancelled));
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> std::result::Result<(), ActorProcessingErr> {
        let span = assembly_span(&state.session_id);

        async {
            match message {
                AssemblerMsg::Event(PipelineEvent::Stop) => {
                    if let Some(pipeline) = state.pipeline.as_mut() {
                        pipeline.handle(PipelineEvent::Stop);
                        state.abort(&myself, Error::Cancelled);
                    }
                }
                AssemblerMsg::Event(event) => {
                    state.last_event = Instant::now();
                    let Some(pipeline) = state.pipeline.as_mut() else {
                        tracing::debug!("event_after_finish_ignored");
                        return;
                    };

                    let effects = pipeline.handle(event);
                    if state.apply(effects) {
                        state.complete(&myself).await;
                    }
                }
                AssemblerMsg::Tick => {
                    let idle_for = state.last_event.elapsed();
                    if let Some(timeout) = state.stall_timeout
                        && idle_for >= timeout
                        && let Some(pipeline) = state.pipeline.as_ref()
                    {
                        let active = pipeline.active_segments();
                        tracing::error!(?idle_for, ?active, "pipeline_stalled");
                        state.abort(&myself, Error::Stalled { idle_for, active });
                    }
                }
            }
        }
        .instrument(span)
        .await;

        Ok(())
    }
}

/// Cloneable sender for producers feeding the assembler.
#[derive(Clone)]
pub struct AssemblerHandle {
    actor: ActorRef<AssemblerMsg>,
}

impl AssemblerHandle {
    pub fn send(&self, event: impl Into<PipelineEvent>) {
        if self.actor.cast(AssemblerMsg::Event(event.into())).is_err() {
            tracing::debug!("event_after_assembler_stopped");
        }
    }

    pub fn stop(&self) {
        self.send(PipelineEvent::Stop);
    }
}

pub struct Assembly {
    handle: AssemblerHandle,
    done: oneshot::Receiver<Result<AssemblyReport>>,
}

impl Assembly {
    pub fn handle(&self) -> AssemblerHandle {
        self.handle.clone()
    }

    /// Resolves once the assembler finishes, fails, or is stopped.
    pub async fn wait(self) -> Result<AssemblyReport> {
        self.done.await.unwrap_or(Err(Error::Aborted))
    }
}

pub async fn spawn_assembler(params: AssemblyParams) -> Result<Assembly> {
    params.config.validate()?;

    let (done_tx, done_rx) = oneshot::channel();
    let args = AssemblerArgs {
        params,
        done: done_tx,
    };

    let (actor, _) = Actor::spawn(None, AssemblerActor, args)
        .await
        .map_err(|e| Error::Spawn(e.to_string()))?;

    Ok(Assembly {
        handle: AssemblerHandle { actor },
        done: done_rx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AudioFragment, SegmentCompletion, SynthesisRequest};
    use duet_audio_utils::{Samples, read_wav_mono};
    use duet_script::Speaker;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct TestRuntime {
        requests: mpsc::UnboundedSender<SynthesisRequest>,
        events: Mutex<Vec<AssemblerEvent>>,
    }

    impl AssemblerRuntime for TestRuntime {
        fn synthesize(&self, request: SynthesisRequest) {
            let _ = self.requests.send(request);
        }

        fn emit(&self, event: AssemblerEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn runtime() -> (Arc<TestRuntime>, mpsc::UnboundedReceiver<SynthesisRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = Arc::new(TestRuntime {
            requests: tx,
            events: Mutex::new(Vec::new()),
        });
        (runtime, rx)
    }

    fn seg(index: u64, speaker: Speaker, text: &str) -> Segment {
        Segment {
            index,
            speaker,
            text: text.to_string(),
        }
    }

    fn params(
        runtime: Arc<TestRuntime>,
        segments: Vec<Segment>,
        output_path: PathBuf,
        stall_timeout_secs: Option<u64>,
    ) -> AssemblyParams {
        AssemblyParams {
            runtime,
            session_id: "test-session".to_string(),
            segments,
            config: AssemblyConfig {
                silence_min_secs: 0.001,
                silence_max_secs: 0.001,
                default_sample_rate: 1000,
                stall_timeout_secs,
                ..Default::default()
            },
            output_path,
            seed: Some(1),
        }
    }

    fn speak(handle: &AssemblerHandle, request: &SynthesisRequest, value: i16) {
        handle.send(
            AudioFragment::new(request.lane, vec![value])
                .segment(request.segment_index)
                .sample_rate(1000),
        );
        handle.send(SegmentCompletion::new(request.lane).segment(request.segment_index));
    }

    #[tokio::test]
    async fn assembles_out_of_order_lanes_in_script_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("podcast.wav");
        let (runtime, mut requests) = runtime();

        let assembly = spawn_assembler(params(
            runtime.clone(),
            vec![
                seg(0, Speaker::A, "Hi"),
                seg(1, Speaker::B, "Hello there"),
                seg(2, Speaker::A, "Bye"),
            ],
            path.clone(),
            None,
        ))
        .await
        .unwrap();
        let handle = assembly.handle();

        let first = requests.recv().await.unwrap();
        let second = requests.recv().await.unwrap();
        assert_eq!((first.segment_index, second.segment_index), (0, 1));

        speak(&handle, &second, 2);
        speak(&handle, &first, 1);

        let third = requests.recv().await.unwrap();
        assert_eq!(third.segment_index, 2);
        assert_eq!(third.text, "Bye");
        speak(&handle, &third, 3);

        let report = assembly.wait().await.unwrap();
        assert_eq!(report.segments_appended, 3);
        assert_eq!(report.silences_inserted, 2);
        assert_eq!(report.sample_rate, 1000);

        let (metadata, samples) = read_wav_mono(&path).unwrap();
        assert_eq!(metadata.sample_rate, 1000);
        assert_eq!(samples, Samples::I16(vec![1, 0, 2, 0, 3]));

        let events = runtime.events.lock().unwrap();
        assert!(matches!(
            events.last(),
            Some(AssemblerEvent::Finished { .. })
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            AssemblerEvent::ScriptComplete {
                total_segments: 3,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn stop_cancels_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podcast.wav");
        let (runtime, mut requests) = runtime();

        let assembly = spawn_assembler(params(
            runtime.clone(),
            vec![seg(0, Speaker::A, "Hi"), seg(1, Speaker::B, "Hey")],
            path.clone(),
            None,
        ))
        .await
        .unwrap();
        let handle = assembly.handle();

        let first = requests.recv().await.unwrap();
        handle.send(AudioFragment::new(first.lane, vec![1i16]).segment(first.segment_index));
        handle.stop();

        assert!(matches!(assembly.wait().await, Err(Error::Cancelled)));
        assert!(!path.exists());
        assert!(matches!(
            runtime.events.lock().unwrap().last(),
            Some(AssemblerEvent::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn empty_script_reports_empty_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podcast.wav");
        let (runtime, _requests) = runtime();

        let assembly = spawn_assembler(params(runtime, vec![], path.clone(), None))
            .await
            .unwrap();

        assert!(matches!(assembly.wait().await, Err(Error::EmptyTimeline)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let (runtime, mut requests) = runtime();

        let mut invalid = params(
            runtime,
            vec![seg(0, Speaker::A, "Hi"), seg(1, Speaker::B, "Hey")],
            dir.path().join("podcast.wav"),
            None,
        );
        invalid.config.silence_min_secs = f64::NAN;

        assert!(matches!(
            spawn_assembler(invalid).await,
            Err(Error::InvalidConfig(_))
        ));
        assert!(requests.try_recv().is_err());
    }

    #[tokio::test]
    async fn watchdog_fails_a_stalled_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let (runtime, _requests) = runtime();

        let assembly = spawn_assembler(params(
            runtime,
            vec![seg(0, Speaker::A, "Hi"), seg(1, Speaker::B, "Hey")],
            dir.path().join("podcast.wav"),
            Some(1),
        ))
        .await
        .unwrap();

        match assembly.wait().await {
            Err(Error::Stalled { idle_for, active }) => {
                assert!(idle_for >= Duration::from_secs(1));
                assert_eq!(active, vec![0, 1]);
            }
            other => panic!("expected stall, got {other:?}"),
        }
    }
}
