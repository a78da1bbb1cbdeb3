use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Per-frame feature vectors for a single video file.
///
/// This is the artifact produced by the feature extraction collaborator: one
/// fixed-size `f32` vector for every `framejump`-th source frame, stored row-major
/// in a flat buffer. The struct also records the source framerate and the sampling
/// stride, which together relate a sampled frame index to wall-clock time:
/// `seconds = index / (framerate / framejump)`.
#[derive(Debug, Deserialize, Serialize)]
pub struct FrameVectors {
    pub(crate) dimension: u32,
    pub(crate) framerate: f32,
    pub(crate) framejump: u32,
    pub(crate) data: Vec<f32>,
}

impl FrameVectors {
    /// Constructs a [FrameVectors] from a flat row-major buffer.
    ///
    /// The buffer length must be a multiple of `dimension`.
    pub fn new(dimension: u32, framerate: f32, framejump: u32, data: Vec<f32>) -> Self {
        assert!(dimension > 0, "dimension must be non-zero");
        assert!(
            data.len() % dimension as usize == 0,
            "data length must be a multiple of the vector dimension"
        );
        Self {
            dimension,
            framerate,
            framejump,
            data,
        }
    }

    /// Number of sampled frames in this artifact.
    pub fn num_frames(&self) -> usize {
        self.data.len() / self.dimension as usize
    }

    /// Dimensionality of each frame vector.
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Framerate of the source video, in frames per second.
    pub fn framerate(&self) -> f32 {
        self.framerate
    }

    /// Sampling stride: one vector was extracted per this many source frames.
    pub fn framejump(&self) -> u32 {
        self.framejump
    }

    /// Number of sampled frames per second of video.
    pub fn samples_per_second(&self) -> f32 {
        self.framerate / self.framejump as f32
    }

    /// Wall-clock duration covered by the sampled frames.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f32(self.num_frames() as f32 / self.samples_per_second())
    }

    /// Load frame vectors from an artifact path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FrameVectorDataNotFound(path.to_owned()));
        }
        let f = std::fs::File::open(path)?;
        let vectors: Self = bincode::deserialize_from(&f)?;
        if vectors.dimension == 0
            || vectors.framerate <= 0.0
            || vectors.framejump == 0
            || vectors.data.len() % vectors.dimension as usize != 0
        {
            return Err(Error::MalformedFrameVectorData(path.to_owned()));
        }
        Ok(vectors)
    }

    /// Load frame vectors using a video path.
    ///
    /// The artifact is expected alongside the video, with the video extension
    /// replaced by the artifact extension.
    pub fn from_video(video: impl AsRef<Path>) -> Result<Self> {
        let path = Self::artifact_path(video);
        Self::from_path(path)
    }

    /// Write this artifact alongside the given video path.
    pub fn save(&self, video: impl AsRef<Path>) -> Result<()> {
        let path = Self::artifact_path(video);
        let mut f = std::fs::File::create(path)?;
        Ok(bincode::serialize_into(&mut f, self)?)
    }

    pub(crate) fn artifact_path(video: impl AsRef<Path>) -> std::path::PathBuf {
        video
            .as_ref()
            .to_owned()
            .with_extension(super::FRAME_VECTOR_DATA_FILE_EXT)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frame_metadata() {
        // 4 frames of dimension 2, sampled every 3rd frame of a 30 fps video.
        let vectors = FrameVectors::new(2, 30.0, 3, vec![0.0; 8]);
        assert_eq!(vectors.num_frames(), 4);
        assert_eq!(vectors.dimension(), 2);
        assert_eq!(vectors.framerate(), 30.0);
        assert_eq!(vectors.framejump(), 3);
        assert_eq!(vectors.samples_per_second(), 10.0);
        assert_eq!(vectors.duration(), Duration::from_secs_f32(0.4));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("ep1.mkv");

        let vectors = FrameVectors::new(3, 24.0, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        vectors.save(&video).unwrap();

        let loaded = FrameVectors::from_video(&video).unwrap();
        assert_eq!(loaded.dimension(), 3);
        assert_eq!(loaded.num_frames(), 2);
        assert_eq!(loaded.data, vectors.data);
    }

    #[test]
    fn test_malformed_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ep1.refrain.bin");

        // Same field layout as FrameVectors, but with a zero dimension.
        let bytes = bincode::serialize(&(0u32, 30.0f32, 3u32, vec![0.0f32])).unwrap();
        std::fs::write(&path, bytes).unwrap();

        let err = FrameVectors::from_path(&path).unwrap_err();
        assert!(matches!(err, crate::Error::MalformedFrameVectorData(_)));
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("ep1.mkv");
        let err = FrameVectors::from_video(&video).unwrap_err();
        assert!(matches!(err, crate::Error::FrameVectorDataNotFound(_)));
    }
}
