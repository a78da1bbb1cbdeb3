#[cfg(feature = "rayon")]
extern crate rayon;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// A borrowed view over a flat, row-major buffer of fixed-dimension vectors.
#[derive(Clone, Copy, Debug)]
pub struct VectorSlab<'a> {
    data: &'a [f32],
    dimension: usize,
}

impl<'a> VectorSlab<'a> {
    pub fn new(data: &'a [f32], dimension: usize) -> Self {
        assert!(dimension > 0, "dimension must be non-zero");
        assert!(
            data.len() % dimension == 0,
            "data length must be a multiple of the vector dimension"
        );
        Self { data, dimension }
    }

    /// Number of vectors in the slab.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the `i`-th vector.
    pub fn row(&self, i: usize) -> &'a [f32] {
        &self.data[i * self.dimension..(i + 1) * self.dimension]
    }

    fn rows(&self) -> impl Iterator<Item = &'a [f32]> {
        self.data.chunks_exact(self.dimension)
    }
}

/// Nearest-neighbor search over a corpus of fixed-dimension vectors.
///
/// Implementations build whatever index they need over `corpus` and return, for
/// each vector in `queries`, the distance to its single nearest corpus vector.
/// This is the only seam between the cross-episode matcher and the search
/// implementation, so an approximate index can be swapped in without touching
/// the detection logic.
pub trait VectorSearch {
    /// Returns one nearest-neighbor distance per query vector.
    ///
    /// Both slabs must have the same dimension, and `corpus` must be non-empty.
    fn nearest_distances(&self, corpus: VectorSlab<'_>, queries: VectorSlab<'_>) -> Vec<f32>;
}

/// Exact brute-force nearest-neighbor search using squared L2 distance.
///
/// Distances are squared (no final square root), matching the convention of flat
/// L2 indexes. Squaring preserves order, so percentile-based thresholding
/// downstream is unaffected.
#[derive(Clone, Copy, Debug, Default)]
pub struct BruteForceSearch;

impl BruteForceSearch {
    #[inline]
    fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }

    fn nearest(corpus: &VectorSlab<'_>, query: &[f32]) -> f32 {
        corpus
            .rows()
            .map(|row| Self::squared_l2(row, query))
            .fold(f32::INFINITY, f32::min)
    }
}

impl VectorSearch for BruteForceSearch {
    fn nearest_distances(&self, corpus: VectorSlab<'_>, queries: VectorSlab<'_>) -> Vec<f32> {
        assert!(!corpus.is_empty(), "corpus must contain at least one vector");
        assert_eq!(
            corpus.dimension(),
            queries.dimension(),
            "corpus and query dimensions must match"
        );

        #[cfg(feature = "rayon")]
        {
            (0..queries.len())
                .into_par_iter()
                .map(|i| Self::nearest(&corpus, queries.row(i)))
                .collect()
        }
        #[cfg(not(feature = "rayon"))]
        {
            (0..queries.len())
                .map(|i| Self::nearest(&corpus, queries.row(i)))
                .collect()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_slab_rows() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let slab = VectorSlab::new(&data, 3);
        assert_eq!(slab.len(), 2);
        assert_eq!(slab.row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(slab.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_brute_force_exact_match() {
        let corpus = [0.0, 0.0, 1.0, 1.0, 5.0, 5.0];
        let queries = [1.0, 1.0];
        let distances = BruteForceSearch.nearest_distances(
            VectorSlab::new(&corpus, 2),
            VectorSlab::new(&queries, 2),
        );
        assert_eq!(distances, vec![0.0]);
    }

    #[test]
    fn test_brute_force_squared_l2() {
        let corpus = [0.0, 0.0];
        let queries = [3.0, 4.0];
        let distances = BruteForceSearch.nearest_distances(
            VectorSlab::new(&corpus, 2),
            VectorSlab::new(&queries, 2),
        );
        // Squared distance: 3^2 + 4^2.
        assert_eq!(distances, vec![25.0]);
    }

    #[test]
    fn test_brute_force_picks_nearest() {
        let corpus = [0.0, 10.0, 100.0];
        let queries = [12.0, 98.0];
        let distances = BruteForceSearch.nearest_distances(
            VectorSlab::new(&corpus, 1),
            VectorSlab::new(&queries, 1),
        );
        assert_eq!(distances, vec![4.0, 4.0]);
    }
}
