#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("script contains no tagged utterances")]
    NoUtterances,
    #[error("invalid speaker tag: {0:?}")]
    InvalidTag(String),
}

pub type Result<T> = std::result::Result<T, Error>;
