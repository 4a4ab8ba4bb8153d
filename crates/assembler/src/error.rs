use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no audio was produced, nothing to write")]
    EmptyTimeline,
    #[error("pipeline stalled: no event for {idle_for:?} while segments {active:?} were in flight")]
    Stalled {
        idle_for: Duration,
        active: Vec<u64>,
    },
    #[error("assembly cancelled by stop signal")]
    Cancelled,
    #[error("failed to persist audio: {0}")]
    Persist(#[from] duet_audio_utils::Error),
    #[error("failed to spawn assembler: {0}")]
    Spawn(String),
    #[error("assembler exited without reporting a result")]
    Aborted,
    #[error(transparent)]
    Task(#[from] tokio::task::JoinError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
