use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load script {}: {source}", .path.display())]
    Script {
        path: PathBuf,
        source: duet_script::Error,
    },
    #[error(transparent)]
    Tags(#[from] duet_script::Error),
    #[error(transparent)]
    Assembly(#[from] duet_assembler::Error),
    #[error("--synth clips requires --clips-dir")]
    MissingClipsDir,
    #[error("clips directory {} does not exist", .0.display())]
    ClipsDirNotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
