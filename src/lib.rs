use std::path::PathBuf;

pub mod detect;
pub mod util;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("frame vector data not found at: {0:?}")]
    FrameVectorDataNotFound(PathBuf),
    #[error("no paths provided to detector")]
    DetectorMissingPaths,
    #[error("need at least 2 episodes to cross-match, but found {0}")]
    TooFewEpisodes(usize),
    #[error("episode contains no sampled frames: {0:?}")]
    EmptyEpisode(PathBuf),
    #[error("malformed frame vector data in {0:?}")]
    MalformedFrameVectorData(PathBuf),
    #[error("vector dimension mismatch in {path:?}: expected {expected}, found {found}")]
    DimensionMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },
    #[error("bincode error: {0}")]
    BincodeError(#[from] bincode::Error),
    #[error("serde_json error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
