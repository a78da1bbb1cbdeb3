use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::Result;

use super::Detection;

/// Ground-truth annotations for a run, keyed by video file name.
///
/// The on-disk format is a JSON object mapping each video file name to a list
/// of `[start_seconds, end_seconds]` pairs:
///
/// ```json
/// { "ep1.mkv": [[0.0, 90.0], [1290.0, 1320.0]], "ep2.mkv": [[0.0, 85.5]] }
/// ```
///
/// Videos are matched against detection results by file stem, so annotations
/// keyed by the original video name line up with runs driven by vector
/// artifacts.
#[derive(Debug, Default)]
pub struct GroundTruth {
    intervals: HashMap<String, Vec<(f32, f32)>>,
}

impl GroundTruth {
    /// Loads annotations from a JSON file.
    ///
    /// Intervals with `start > end` are reported and excluded rather than
    /// failing the whole evaluation.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        let raw: HashMap<String, Vec<(f32, f32)>> = serde_json::from_reader(&f)?;

        let mut intervals = HashMap::new();
        for (video, entries) in raw {
            let (valid, malformed): (Vec<_>, Vec<_>) =
                entries.into_iter().partition(|(start, end)| start <= end);
            for (start, end) in malformed {
                tracing::warn!(
                    video = video.as_str(),
                    start,
                    end,
                    "ignoring malformed ground truth interval (start > end)"
                );
            }
            intervals.insert(video_key(Path::new(&video)), valid);
        }

        Ok(Self { intervals })
    }

    /// Evaluates a run's detections against these annotations.
    ///
    /// Every detection contributes to the detected total; annotated intervals
    /// contribute to the relevant total only when their video took part in the
    /// run. Annotations referencing unknown videos are reported and excluded.
    pub fn evaluate(&self, detections: &BTreeMap<PathBuf, Vec<Detection>>) -> EvaluationTotals {
        let keys: HashMap<String, &Vec<Detection>> = detections
            .iter()
            .map(|(path, found)| (video_key(path), found))
            .collect();

        let mut totals = EvaluationTotals::default();

        for found in detections.values() {
            totals.detected_seconds += found
                .iter()
                .map(|d| d.duration().as_secs_f32())
                .sum::<f32>();
        }

        for (video, truths) in &self.intervals {
            let found = match keys.get(video) {
                Some(found) => *found,
                None => {
                    tracing::warn!(
                        video = video.as_str(),
                        "ground truth references a video that is not part of this run"
                    );
                    continue;
                }
            };

            for &(truth_start, truth_end) in truths {
                totals.relevant_seconds += truth_end - truth_start;
                for detection in found {
                    totals.overlap_seconds += overlap(
                        (detection.start().as_secs_f32(), detection.end().as_secs_f32()),
                        (truth_start, truth_end),
                    );
                }
            }
        }

        totals
    }
}

/// Seconds of overlap between two intervals.
fn overlap((a_start, a_end): (f32, f32), (b_start, b_end): (f32, f32)) -> f32 {
    (a_end.min(b_end) - a_start.max(b_start)).max(0.0)
}

/// File name with any artifact or container extension stripped, used to line up
/// annotation keys with run paths.
fn video_key(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = format!(".{}", super::FRAME_VECTOR_DATA_FILE_EXT);
    let base = name.strip_suffix(&suffix).unwrap_or(&name);
    Path::new(base)
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| base.to_owned())
}

/// Running totals for aggregate precision/recall across all videos in a run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EvaluationTotals {
    /// Total seconds of ground truth intervals.
    pub relevant_seconds: f32,
    /// Total seconds of detected intervals.
    pub detected_seconds: f32,
    /// Total seconds of overlap between detections and ground truth.
    pub overlap_seconds: f32,
}

impl EvaluationTotals {
    /// Merges another set of totals into this one.
    pub fn merge(&mut self, other: EvaluationTotals) {
        self.relevant_seconds += other.relevant_seconds;
        self.detected_seconds += other.detected_seconds;
        self.overlap_seconds += other.overlap_seconds;
    }

    /// Fraction of detected seconds that were relevant, or [None] if nothing
    /// was detected.
    pub fn precision(&self) -> Option<f32> {
        if self.detected_seconds == 0.0 {
            None
        } else {
            Some(self.overlap_seconds / self.detected_seconds)
        }
    }

    /// Fraction of relevant seconds that were detected, or [None] if there is
    /// no ground truth.
    pub fn recall(&self) -> Option<f32> {
        if self.relevant_seconds == 0.0 {
            None
        } else {
            Some(self.overlap_seconds / self.relevant_seconds)
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::super::DetectionKind;
    use super::*;

    fn detection(start: f32, end: f32, kind: DetectionKind) -> Detection {
        Detection::new(
            Duration::from_secs_f32(start),
            Duration::from_secs_f32(end),
            kind,
        )
    }

    fn truth_from_json(json: &str) -> GroundTruth {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.json");
        std::fs::write(&path, json).unwrap();
        GroundTruth::from_path(&path).unwrap()
    }

    #[test]
    fn test_overlap() {
        assert_eq!(overlap((0.0, 10.0), (5.0, 20.0)), 5.0);
        assert_eq!(overlap((5.0, 20.0), (0.0, 10.0)), 5.0);
        assert_eq!(overlap((0.0, 10.0), (10.0, 20.0)), 0.0);
        assert_eq!(overlap((0.0, 10.0), (20.0, 30.0)), 0.0);
        assert_eq!(overlap((0.0, 30.0), (10.0, 20.0)), 10.0);
    }

    #[test]
    fn test_video_key_strips_extensions() {
        assert_eq!(video_key(Path::new("/series/ep1.mkv")), "ep1");
        assert_eq!(video_key(Path::new("ep1.refrain.bin")), "ep1");
        assert_eq!(video_key(Path::new("ep1")), "ep1");
    }

    #[test]
    fn test_precision_recall() {
        let truth = truth_from_json(r#"{ "ep1.mkv": [[0.0, 100.0]], "ep2.mkv": [[0.0, 50.0]] }"#);

        let mut detections = BTreeMap::new();
        detections.insert(
            PathBuf::from("ep1.mkv"),
            vec![
                detection(0.0, 80.0, DetectionKind::Opening),
                detection(200.0, 220.0, DetectionKind::Ending),
            ],
        );
        detections.insert(PathBuf::from("ep2.mkv"), vec![]);

        let totals = truth.evaluate(&detections);
        assert_eq!(totals.relevant_seconds, 150.0);
        assert_eq!(totals.detected_seconds, 100.0);
        assert_eq!(totals.overlap_seconds, 80.0);
        assert_eq!(totals.precision(), Some(0.8));
        assert_eq!(totals.recall(), Some(80.0 / 150.0));
    }

    #[test]
    fn test_precision_recall_bounds() {
        let truth = truth_from_json(r#"{ "ep1.mkv": [[10.0, 40.0]] }"#);
        let mut detections = BTreeMap::new();
        detections.insert(
            PathBuf::from("ep1.mkv"),
            vec![detection(0.0, 60.0, DetectionKind::Opening)],
        );

        let totals = truth.evaluate(&detections);
        let precision = totals.precision().unwrap();
        let recall = totals.recall().unwrap();
        assert!((0.0..=1.0).contains(&precision));
        assert!((0.0..=1.0).contains(&recall));
        assert_eq!(recall, 1.0);
    }

    #[test]
    fn test_undefined_ratios() {
        // No detections and no ground truth: both ratios are undefined.
        let totals = EvaluationTotals::default();
        assert_eq!(totals.precision(), None);
        assert_eq!(totals.recall(), None);

        // Ground truth but no detections: precision undefined, recall zero.
        let truth = truth_from_json(r#"{ "ep1.mkv": [[0.0, 100.0]] }"#);
        let mut detections = BTreeMap::new();
        detections.insert(PathBuf::from("ep1.mkv"), vec![]);
        let totals = truth.evaluate(&detections);
        assert_eq!(totals.precision(), None);
        assert_eq!(totals.recall(), Some(0.0));
    }

    #[test]
    fn test_malformed_and_unknown_entries_excluded() {
        // The reversed interval and the unknown video are both dropped.
        let truth = truth_from_json(
            r#"{ "ep1.mkv": [[0.0, 100.0], [50.0, 20.0]], "missing.mkv": [[0.0, 30.0]] }"#,
        );

        let mut detections = BTreeMap::new();
        detections.insert(
            PathBuf::from("ep1.mkv"),
            vec![detection(0.0, 100.0, DetectionKind::Opening)],
        );

        let totals = truth.evaluate(&detections);
        assert_eq!(totals.relevant_seconds, 100.0);
        assert_eq!(totals.overlap_seconds, 100.0);
        assert_eq!(totals.precision(), Some(1.0));
        assert_eq!(totals.recall(), Some(1.0));
    }

    #[test]
    fn test_merge() {
        let mut a = EvaluationTotals {
            relevant_seconds: 10.0,
            detected_seconds: 20.0,
            overlap_seconds: 5.0,
        };
        a.merge(EvaluationTotals {
            relevant_seconds: 1.0,
            detected_seconds: 2.0,
            overlap_seconds: 3.0,
        });
        assert_eq!(
            a,
            EvaluationTotals {
                relevant_seconds: 11.0,
                detected_seconds: 22.0,
                overlap_seconds: 8.0,
            }
        );
    }
}
