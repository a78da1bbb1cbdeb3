mod data;
mod detector;
mod evaluation;
mod mask;
mod search;

pub use data::FrameVectors;
pub use detector::{Detection, DetectionKind, Detector};
pub use evaluation::{EvaluationTotals, GroundTruth};
pub use search::{BruteForceSearch, VectorSearch, VectorSlab};

/// Default distance percentile used to separate recurring frames from the rest.
///
/// For each episode, the threshold is the value at this percentile of the episode's
/// best-match distances. A higher percentile improves recall at the cost of precision.
pub const DEFAULT_PERCENTILE: f32 = 10.0;

/// Default start-of-video threshold (percent).
///
/// A matching run only counts as a recap or opening if it ends within this leading
/// percentage of the episode.
pub const DEFAULT_VIDEO_START_THRESHOLD_PERCENTILE: f32 = 20.0;

/// Default end-of-video threshold (seconds).
///
/// A matching run only counts as an ending if it finishes within this many seconds
/// of the end of the episode.
pub const DEFAULT_VIDEO_END_THRESHOLD_SECS: f32 = 15.0;

/// Default minimum detection size (seconds).
///
/// Matching runs shorter than this are discarded. Recaps, credits and previews
/// rarely last only a few seconds, so small runs are treated as noise.
pub const DEFAULT_MIN_DETECTION_SIZE_SECS: f32 = 15.0;

/// Default gap tolerance (seconds).
///
/// Two matching runs separated by a non-matching gap of at most this long are
/// merged into a single detection.
pub const DEFAULT_GAP_TOLERANCE_SECS: f32 = 10.0;

pub(crate) static FRAME_VECTOR_DATA_FILE_EXT: &str = "refrain.bin";
static DETECTION_FILE_EXT: &str = "refrain.detect.json";
