#[cfg(feature = "rayon")]
extern crate rayon;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::util;
use crate::{Error, Result};

use super::mask;
use super::{BruteForceSearch, FrameVectors, VectorSearch, VectorSlab};

/// Classifies where in the episode a detection sits.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    /// Recap or opening credits at the start of the episode.
    Opening,
    /// Closing credits or preview at the end of the episode.
    Ending,
}

/// A single recurring segment detected in a video file. This is output by [Detector::run].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Detection {
    start: Duration,
    end: Duration,
    kind: DetectionKind,
}

impl Detection {
    pub fn new(start: Duration, end: Duration, kind: DetectionKind) -> Self {
        debug_assert!(start <= end);
        Self { start, end, kind }
    }

    pub fn start(&self) -> Duration {
        self.start
    }

    pub fn end(&self) -> Duration {
        self.end
    }

    pub fn kind(&self) -> DetectionKind {
        self.kind
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[derive(serde::Deserialize, serde::Serialize)]
struct DetectionRecord {
    start: f32,
    end: f32,
    kind: DetectionKind,
}

impl From<&Detection> for DetectionRecord {
    fn from(detection: &Detection) -> Self {
        Self {
            start: detection.start.as_secs_f32(),
            end: detection.end.as_secs_f32(),
            kind: detection.kind,
        }
    }
}

impl From<&DetectionRecord> for Detection {
    fn from(record: &DetectionRecord) -> Self {
        Self {
            start: Duration::from_secs_f32(record.start),
            end: Duration::from_secs_f32(record.end),
            kind: record.kind,
        }
    }
}

#[derive(serde::Deserialize, serde::Serialize)]
struct DetectionFile {
    detections: Vec<DetectionRecord>,
    md5: String,
}

/// Finds recurring segments across two or more episodes of a series using
/// per-frame feature vector artifacts produced by a feature extraction step.
///
/// For each episode, every frame vector is queried against the combined vectors
/// of all *other* episodes, and frames whose best match is unusually close are
/// kept as candidates. Candidate runs are merged across short gaps, converted to
/// timestamps, and kept only when they sit at the start or end of the episode.
pub struct Detector<P: AsRef<Path>> {
    videos: Vec<P>,
    percent: f32,
    video_start_threshold_percentile: f32,
    video_end_threshold_seconds: f32,
    min_detection_size_seconds: f32,
    gap_tolerance_seconds: f32,
    search: Box<dyn VectorSearch + Send + Sync>,
}

impl<P: AsRef<Path>> Default for Detector<P> {
    fn default() -> Self {
        Self {
            videos: Vec::new(),
            percent: super::DEFAULT_PERCENTILE,
            video_start_threshold_percentile: super::DEFAULT_VIDEO_START_THRESHOLD_PERCENTILE,
            video_end_threshold_seconds: super::DEFAULT_VIDEO_END_THRESHOLD_SECS,
            min_detection_size_seconds: super::DEFAULT_MIN_DETECTION_SIZE_SECS,
            gap_tolerance_seconds: super::DEFAULT_GAP_TOLERANCE_SECS,
            search: Box::new(BruteForceSearch),
        }
    }
}

impl<P: AsRef<Path>> Detector<P> {
    /// Constructs a [Detector] from a list of paths.
    ///
    /// Paths may point either at video files (the vector artifact is looked up
    /// alongside them) or directly at vector artifacts. The list is ordered with
    /// a natural, case-insensitive sort so that the episode order is stable
    /// across runs regardless of how the paths were discovered.
    pub fn from_files(videos: impl Into<Vec<P>>) -> Self {
        let mut detector = Self::default();
        detector.videos = videos.into();
        detector.videos.sort_by(|a, b| {
            natord::compare_ignore_case(
                &a.as_ref().to_string_lossy(),
                &b.as_ref().to_string_lossy(),
            )
        });
        detector
    }

    /// Returns the video paths used by this detector.
    pub fn videos(&self) -> &[P] {
        &self.videos
    }

    /// Returns a new [Detector] with the provided threshold percentile.
    pub fn with_percent(mut self, percent: f32) -> Self {
        self.percent = percent;
        self
    }

    /// Returns a new [Detector] with the provided `video_start_threshold_percentile`.
    pub fn with_video_start_threshold_percentile(mut self, percentile: f32) -> Self {
        self.video_start_threshold_percentile = percentile;
        self
    }

    /// Returns a new [Detector] with the provided `video_end_threshold_seconds`.
    pub fn with_video_end_threshold_seconds(mut self, seconds: f32) -> Self {
        self.video_end_threshold_seconds = seconds;
        self
    }

    /// Returns a new [Detector] with the provided `min_detection_size_seconds`.
    pub fn with_min_detection_size_seconds(mut self, seconds: f32) -> Self {
        self.min_detection_size_seconds = seconds;
        self
    }

    /// Returns a new [Detector] with the provided `gap_tolerance_seconds`.
    pub fn with_gap_tolerance_seconds(mut self, seconds: f32) -> Self {
        self.gap_tolerance_seconds = seconds;
        self
    }

    /// Returns a new [Detector] using the provided nearest-neighbor search
    /// implementation instead of the default exact brute-force search.
    pub fn with_search(mut self, search: impl VectorSearch + Send + Sync + 'static) -> Self {
        self.search = Box::new(search);
        self
    }

    fn artifact_path(video: &Path) -> PathBuf {
        if util::is_vector_artifact(video) {
            video.to_owned()
        } else {
            FrameVectors::artifact_path(video)
        }
    }

    fn detection_file_path(video: &Path) -> PathBuf {
        let name = video.to_string_lossy();
        let suffix = format!(".{}", super::FRAME_VECTOR_DATA_FILE_EXT);
        let base = match name.strip_suffix(&suffix) {
            Some(stripped) => PathBuf::from(stripped.to_owned()),
            None => video.to_owned(),
        };
        base.with_extension(super::DETECTION_FILE_EXT)
    }

    fn load_episodes(&self) -> Result<Vec<FrameVectors>> {
        let mut episodes = Vec::with_capacity(self.videos.len());
        let mut dimension: Option<u32> = None;

        for video in &self.videos {
            let path = video.as_ref();
            let vectors = FrameVectors::from_path(Self::artifact_path(path))?;
            if vectors.num_frames() == 0 {
                return Err(Error::EmptyEpisode(path.to_owned()));
            }
            match dimension {
                None => dimension = Some(vectors.dimension()),
                Some(expected) if expected != vectors.dimension() => {
                    return Err(Error::DimensionMismatch {
                        path: path.to_owned(),
                        expected,
                        found: vectors.dimension(),
                    });
                }
                Some(_) => (),
            }
            episodes.push(vectors);
        }

        Ok(episodes)
    }

    /// Computes the best-match distance sequence for one episode.
    ///
    /// The corpus is the concatenation of every *other* episode's vectors; the
    /// episode's own vectors are the queries (leave-one-out search).
    fn episode_distances(&self, episodes: &[FrameVectors], index: usize) -> Vec<f32> {
        let _g = tracing::span!(tracing::Level::TRACE, "episode_distances", index);

        let target = &episodes[index];
        let dimension = target.dimension() as usize;

        let corpus_len: usize = episodes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, e)| e.data.len())
            .sum();
        let mut corpus = Vec::with_capacity(corpus_len);
        for (i, episode) in episodes.iter().enumerate() {
            if i != index {
                corpus.extend_from_slice(&episode.data);
            }
        }

        self.search.nearest_distances(
            VectorSlab::new(&corpus, dimension),
            VectorSlab::new(&target.data, dimension),
        )
    }

    /// Converts one episode's distance sequence into its final detections.
    fn detect_in_episode(&self, distances: &[f32], episode: &FrameVectors) -> Vec<Detection> {
        let samples_per_second = episode.samples_per_second();

        let threshold = mask::percentile(distances, self.percent);
        let candidates = mask::below_threshold(distances, threshold);
        let lookahead = (samples_per_second * self.gap_tolerance_seconds) as usize;
        let filled = mask::fill_gaps(&candidates, lookahead);
        let runs = mask::contiguous_runs(&filled);

        tracing::debug!(
            threshold,
            num_runs = runs.len(),
            "thresholded and gap-filled distance sequence"
        );

        let total_frames = filled.len() as f32;
        let min_frames = self.min_detection_size_seconds * samples_per_second;
        let start_limit = total_frames * (self.video_start_threshold_percentile / 100.0);
        let end_limit = total_frames - self.video_end_threshold_seconds * samples_per_second;

        let mut openings = Vec::new();
        let mut endings = Vec::new();

        for (start, end) in runs {
            let occurs_at_beginning = (end as f32) < start_limit;
            let ends_at_the_end = (end as f32) > end_limit;

            // Runs in the middle of the episode are noise (e.g. repeated static
            // shots), as are runs shorter than the minimum detection size.
            if (end - start) as f32 <= min_frames || !(occurs_at_beginning || ends_at_the_end) {
                continue;
            }

            let detection_start = Duration::from_secs_f32(start as f32 / samples_per_second);
            let detection_end = Duration::from_secs_f32(end as f32 / samples_per_second);

            // For a very short episode a run can satisfy both classifications;
            // the beginning takes precedence.
            if occurs_at_beginning {
                openings.push(Detection::new(
                    detection_start,
                    detection_end,
                    DetectionKind::Opening,
                ));
            } else {
                endings.push(Detection::new(
                    detection_start,
                    detection_end,
                    DetectionKind::Ending,
                ));
            }
        }

        // An episode has at most two recurring segments at its start (recap and
        // opening credits); every qualifying ending is kept.
        let mut detections = two_longest(openings);
        detections.extend(endings);
        detections
    }

    /// Reads the detections stored on disk for a video, if they are still valid.
    ///
    /// Returns [None] when no detection file exists or when the stored md5 no
    /// longer matches the artifact header (i.e. the artifact was regenerated).
    fn read_detection_file(video: impl AsRef<Path>) -> Result<Option<Vec<Detection>>> {
        let detection_file = Self::detection_file_path(video.as_ref());
        if !detection_file.exists() {
            return Ok(None);
        }

        // Compare against the current artifact header to catch stale files.
        let md5 = util::compute_header_md5sum(Self::artifact_path(video.as_ref()))?;

        let f = std::fs::File::open(&detection_file)?;
        let detection_file: DetectionFile = serde_json::from_reader(&f)?;
        if detection_file.md5 != md5 {
            return Ok(None);
        }

        Ok(Some(
            detection_file.detections.iter().map(Detection::from).collect(),
        ))
    }

    fn create_detection_file(&self, video: impl AsRef<Path>, detections: &[Detection]) -> Result<()> {
        if detections.is_empty() {
            return Ok(());
        }

        let md5 = util::compute_header_md5sum(Self::artifact_path(video.as_ref()))?;
        let path = Self::detection_file_path(video.as_ref());
        let mut f = std::fs::File::create(path)?;
        let data = DetectionFile {
            detections: detections.iter().map(DetectionRecord::from).collect(),
            md5,
        };
        serde_json::to_writer(&mut f, &data)?;

        Ok(())
    }

    fn display_detections(detections: &[Detection]) {
        if detections.is_empty() {
            println!("No recurring content found.");
            return;
        }
        for detection in detections {
            let label = match detection.kind {
                DetectionKind::Opening => "Opening",
                DetectionKind::Ending => "Ending",
            };
            println!(
                "* {} - {} - {}",
                label,
                util::format_time(detection.start),
                util::format_time(detection.end)
            );
        }
    }
}

impl<P: AsRef<Path> + Sync> Detector<P> {
    /// Runs the detector.
    ///
    /// * If `display` is set, the final results will be printed to stdout.
    /// * If `use_detection_files` is set, a video whose on-disk detection file still matches
    /// its artifact is skipped during this run. If `write_detection_files` is set, a detection
    /// file is written to disk for each video with at least one detection.
    /// * If `threading` is set, episodes are matched in parallel.
    pub fn run(
        &self,
        display: bool,
        use_detection_files: bool,
        write_detection_files: bool,
        threading: bool,
    ) -> Result<BTreeMap<PathBuf, Vec<Detection>>> {
        if self.videos.is_empty() {
            return Err(Error::DetectorMissingPaths);
        }
        if self.videos.len() < 2 {
            return Err(Error::TooFewEpisodes(self.videos.len()));
        }

        let episodes = self.load_episodes()?;

        tracing::debug!(num_episodes = episodes.len(), "starting cross-episode search");

        // Each episode's leave-one-out query is independent of the others'
        // results, so the searches can run in parallel over read-only vectors.
        let indices: Vec<usize> = (0..episodes.len()).collect();
        let distance_sequences: Vec<Vec<f32>>;

        if cfg!(feature = "rayon") && threading {
            #[cfg(feature = "rayon")]
            {
                distance_sequences = indices
                    .par_iter()
                    .map(|&index| self.episode_distances(&episodes, index))
                    .collect();
            }
            #[cfg(not(feature = "rayon"))]
            {
                unreachable!();
            }
        } else {
            distance_sequences = indices
                .iter()
                .map(|&index| self.episode_distances(&episodes, index))
                .collect();
        }

        tracing::debug!("finished cross-episode search");

        let mut detections_map = BTreeMap::new();

        for (index, distances) in distance_sequences.iter().enumerate() {
            let path = self.videos[index].as_ref().to_owned();
            if display {
                println!("\n{}\n", path.display());
            }

            // Reuse the results of a previous run if the video has an up-to-date
            // detection file on disk. Only the search is skipped; the stored
            // detections still count toward this run's results and evaluation.
            if use_detection_files {
                if let Some(stored) = Self::read_detection_file(&path)? {
                    if display {
                        println!("Skipping search due to existing detection file...");
                        Self::display_detections(&stored);
                    }
                    detections_map.insert(path, stored);
                    continue;
                }
            }

            let detections = self.detect_in_episode(distances, &episodes[index]);
            if display {
                Self::display_detections(&detections);
            }
            if write_detection_files {
                self.create_detection_file(&path, &detections)?;
            }
            detections_map.insert(path, detections);
        }

        Ok(detections_map)
    }
}

/// Keeps the (up to) two longest openings, ordered by duration descending.
///
/// Ties are broken by the original order, i.e. by start time, since the sort is
/// stable.
fn two_longest(mut openings: Vec<Detection>) -> Vec<Detection> {
    if openings.len() <= 2 {
        return openings;
    }
    openings.sort_by(|a, b| b.duration().cmp(&a.duration()));
    openings.truncate(2);
    openings
}
