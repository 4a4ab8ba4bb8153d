#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Wav(#[from] hound::Error),
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    #[error("unsupported channel count: {count}")]
    UnsupportedChannelCount { count: u16 },
    #[error("refusing to write an empty audio buffer")]
    EmptyBuffer,
}

pub type Result<T> = std::result::Result<T, Error>;
