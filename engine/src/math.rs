//! Vector primitives shared by every clustering engine.

use rand::Rng;

use crate::error::{ClusterError, Result};

/// Cosine similarity between two vectors.
///
/// Uses f64 intermediate precision. Returns 0 when either vector has zero
/// magnitude, so a zero vector is dissimilar to everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(ClusterError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    Ok(cosine_unchecked(a, b))
}

/// Cosine similarity for vectors already known to share a dimension.
pub(crate) fn cosine_unchecked(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot: f64 = 0.0;
    let mut na: f64 = 0.0;
    let mut nb: f64 = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = x as f64;
        let y = y as f64;
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0) as f32
}

/// Euclidean distance. Callers guarantee `a.len() == b.len()`.
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean(a, b).sqrt()
}

#[inline]
pub(crate) fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Componentwise mean. Empty input yields an empty vector.
pub fn centroid<V: AsRef<[f32]>>(vectors: &[V]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let dim = first.as_ref().len();
    let mut sum = vec![0.0f64; dim];
    for v in vectors {
        for (s, &x) in sum.iter_mut().zip(v.as_ref().iter()) {
            *s += x as f64;
        }
    }
    let n = vectors.len() as f64;
    sum.into_iter().map(|s| (s / n) as f32).collect()
}

/// Mean cosine similarity over all unordered pairs.
///
/// Inputs with fewer than two vectors return 1.0.
pub fn average_pairwise_similarity<V: AsRef<[f32]>>(vectors: &[V]) -> f32 {
    let n = vectors.len();
    if n < 2 {
        return 1.0;
    }
    let mut total: f64 = 0.0;
    let mut pairs: u64 = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            total += cosine_unchecked(vectors[i].as_ref(), vectors[j].as_ref()) as f64;
            pairs += 1;
        }
    }
    (total / pairs as f64) as f32
}

/// Samples an index with probability proportional to its weight.
///
/// Weights need not be normalized. If rounding leaves the cumulative sum
/// short of the draw, the last index is returned. Returns `None` only for
/// empty input.
pub fn weighted_random_choice<R: Rng>(probabilities: &[f64], rng: &mut R) -> Option<usize> {
    if probabilities.is_empty() {
        return None;
    }
    let total: f64 = probabilities.iter().sum();
    let draw = rng.gen_range(0.0..1.0) * total;
    let mut cumulative = 0.0;
    for (i, &p) in probabilities.iter().enumerate() {
        cumulative += p;
        if draw < cumulative {
            return Some(i);
        }
    }
    Some(probabilities.len() - 1)
}

/// Returns the shared dimension of `vectors`, or the first mismatch.
pub fn check_dimensions<V: AsRef<[f32]>>(vectors: &[V]) -> Result<usize> {
    let Some(first) = vectors.first() else {
        return Ok(0);
    };
    let dim = first.as_ref().len();
    for v in vectors.iter().skip(1) {
        let got = v.as_ref().len();
        if got != dim {
            return Err(ClusterError::DimensionMismatch { expected: dim, got });
        }
    }
    Ok(dim)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn cosine_identical() {
        let sim = cosine_similarity(&[3.0, 4.0], &[3.0, 4.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6, "got {sim}");
    }

    #[test]
    fn cosine_symmetric() {
        let a = [0.3, -1.2, 4.0];
        let b = [2.0, 0.5, -0.7];
        assert_eq!(
            cosine_similarity(&a, &b).unwrap(),
            cosine_similarity(&b, &a).unwrap()
        );
    }

    #[test]
    fn cosine_orthogonal_and_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 1e-6);
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero_not_nan() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert_eq!(sim, 0.0);
        let sim = cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn cosine_dimension_mismatch() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            ClusterError::DimensionMismatch {
                expected: 2,
                got: 3
            }
        ));
    }

    #[test]
    fn euclidean_basic() {
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert_eq!(euclidean_distance(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn centroid_of_single_is_identity() {
        let v = vec![0.25f32, -3.0, 7.5];
        assert_eq!(centroid(&[v.clone()]), v);
    }

    #[test]
    fn centroid_mean_and_empty() {
        let c = centroid(&[vec![0.0f32, 2.0], vec![2.0, 4.0]]);
        assert_eq!(c, vec![1.0, 3.0]);
        let empty: Vec<Vec<f32>> = Vec::new();
        assert!(centroid(&empty).is_empty());
    }

    #[test]
    fn average_pairwise_singleton_is_one() {
        assert_eq!(average_pairwise_similarity(&[vec![1.0f32, 2.0]]), 1.0);
    }

    #[test]
    fn average_pairwise_mixed() {
        // pairs: (a,b)=1, (a,c)=0, (b,c)=0
        let vs = [vec![1.0f32, 0.0], vec![2.0, 0.0], vec![0.0, 1.0]];
        let avg = average_pairwise_similarity(&vs);
        assert!((avg - 1.0 / 3.0).abs() < 1e-6, "got {avg}");
    }

    #[test]
    fn weighted_choice_respects_zero_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let i = weighted_random_choice(&[0.0, 1.0, 0.0], &mut rng).unwrap();
            assert_eq!(i, 1);
        }
    }

    #[test]
    fn weighted_choice_all_zero_falls_back_to_last() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(weighted_random_choice(&[0.0, 0.0, 0.0], &mut rng), Some(2));
        assert_eq!(weighted_random_choice(&[], &mut rng), None);
    }

    #[test]
    fn check_dimensions_reports_mismatch() {
        assert_eq!(check_dimensions(&[vec![1.0f32, 2.0], vec![3.0, 4.0]]).unwrap(), 2);
        let err = check_dimensions(&[vec![1.0f32, 2.0], vec![3.0]]).unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
