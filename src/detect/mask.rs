//! Mask-level primitives for the detector: percentile thresholding,
//! gap filling and contiguous run extraction.

/// Returns the `percent`-th percentile of `values` using linear interpolation
/// between the two nearest ranks.
///
/// `values` must be non-empty and `percent` must lie in `[0, 100]`.
pub(crate) fn percentile(values: &[f32], percent: f32) -> f32 {
    assert!(!values.is_empty(), "cannot take percentile of empty data");
    assert!(
        (0.0..=100.0).contains(&percent),
        "percentile must be in [0, 100]"
    );

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (percent / 100.0) * (sorted.len() - 1) as f32;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    if low == high {
        return sorted[low];
    }
    let weight = rank - low as f32;
    sorted[low] * (1.0 - weight) + sorted[high] * weight
}

/// Marks every frame whose best-match distance lies strictly below `threshold`.
pub(crate) fn below_threshold(distances: &[f32], threshold: f32) -> Vec<bool> {
    distances.iter().map(|&d| d < threshold).collect()
}

/// Fills gaps between nearby positive frames in a binary mask.
///
/// Two `true` frames separated by a run of at most `lookahead` `false` frames
/// are merged by flipping the frames in between to `true`. Larger gaps are left
/// untouched, as are leading and trailing `false` runs.
///
/// Example: `[0,0,1,0,0,0,0,1,0,0]` with lookahead 6 becomes
/// `[0,0,1,1,1,1,1,1,0,0]`; with lookahead 3 the gap of 4 is too large and the
/// input is returned unchanged.
pub(crate) fn fill_gaps(mask: &[bool], lookahead: usize) -> Vec<bool> {
    let mut filled = mask.to_vec();
    let mut last_true: Option<usize> = None;

    for index in 0..filled.len() {
        if !filled[index] {
            continue;
        }
        if let Some(previous) = last_true {
            let gap = index - previous - 1;
            if gap > 0 && gap <= lookahead {
                for frame in &mut filled[previous + 1..index] {
                    *frame = true;
                }
            }
        }
        last_true = Some(index);
    }

    filled
}

/// Partitions a mask into maximal contiguous runs of `true` values.
///
/// Returns inclusive `(start, end)` frame index pairs in ascending order.
pub(crate) fn contiguous_runs(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;

    for (index, &value) in mask.iter().enumerate() {
        match (value, start) {
            (true, None) => start = Some(index),
            (false, Some(s)) => {
                runs.push((s, index - 1));
                start = None;
            }
            _ => (),
        }
    }
    if let Some(s) = start {
        runs.push((s, mask.len() - 1));
    }

    runs
}

#[cfg(test)]
mod test {
    use super::*;

    fn mask(bits: &[u8]) -> Vec<bool> {
        bits.iter().map(|&b| b != 0).collect()
    }

    #[test]
    fn test_fill_gaps_example() {
        let input = mask(&[0, 0, 1, 0, 0, 0, 0, 1, 0, 0]);
        assert_eq!(
            fill_gaps(&input, 6),
            mask(&[0, 0, 1, 1, 1, 1, 1, 1, 0, 0])
        );
        // A gap of 4 exceeds a lookahead of 3, so nothing is filled.
        assert_eq!(fill_gaps(&input, 3), input);
    }

    #[test]
    fn test_fill_gaps_multiple_gaps() {
        let input = mask(&[1, 0, 1, 0, 0, 0, 1, 0]);
        assert_eq!(fill_gaps(&input, 1), mask(&[1, 1, 1, 0, 0, 0, 1, 0]));
        assert_eq!(fill_gaps(&input, 3), mask(&[1, 1, 1, 1, 1, 1, 1, 0]));
    }

    #[test]
    fn test_fill_gaps_never_clears_and_is_idempotent() {
        let inputs = [
            mask(&[0, 1, 0, 0, 1, 0, 1, 0, 0, 0, 1]),
            mask(&[1, 0, 0, 0, 0, 1]),
            mask(&[0, 0, 0]),
            mask(&[1, 1, 1]),
            mask(&[]),
        ];
        for input in inputs {
            for lookahead in 0..6 {
                let once = fill_gaps(&input, lookahead);
                for (before, after) in input.iter().zip(once.iter()) {
                    assert!(*after >= *before, "filling must never remove a positive");
                }
                assert_eq!(fill_gaps(&once, lookahead), once, "fill_gaps must be idempotent");
            }
        }
    }

    #[test]
    fn test_contiguous_runs() {
        assert_eq!(
            contiguous_runs(&mask(&[0, 1, 1, 0, 1, 0, 0, 1])),
            vec![(1, 2), (4, 4), (7, 7)]
        );
        assert_eq!(contiguous_runs(&mask(&[1, 1])), vec![(0, 1)]);
        assert_eq!(contiguous_runs(&mask(&[0, 0])), vec![]);
        assert_eq!(contiguous_runs(&[]), vec![]);
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert_eq!(percentile(&values, 50.0), 2.5);
        assert_eq!(percentile(&values, 25.0), 1.75);
    }

    #[test]
    fn test_threshold_monotonic_in_percentile() {
        let distances = [5.0, 1.0, 3.0, 9.0, 2.0, 8.0, 0.5, 4.0];
        let mut last_count = 0;
        for percent in [0.0, 10.0, 25.0, 50.0, 75.0, 90.0, 100.0] {
            let threshold = percentile(&distances, percent);
            let count = below_threshold(&distances, threshold)
                .iter()
                .filter(|&&b| b)
                .count();
            assert!(
                count >= last_count,
                "raising the percentile must never shrink the candidate set"
            );
            last_count = count;
        }
    }
}
