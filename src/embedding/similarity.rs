//! Cosine similarity between embedding vectors
use ndarray::ArrayView1;

/// Cosine similarity of two vectors.
///
/// Returns the raw cosine (callers apply their own thresholds), clamped only to
/// [-1, 1] to absorb floating-point overshoot. Returns 0.0 when either vector
/// has zero norm, when lengths differ, or when either is empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (a.dot(&b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Cosine similarity where either side may be absent; absent yields 0.0
pub fn cosine_similarity_opt(a: Option<&[f32]>, b: Option<&[f32]>) -> f32 {
    match (a, b) {
        (Some(a), Some(b)) => cosine_similarity(a, b),
        _ => 0.0,
    }
}

/// Candidates at or above `threshold`, most similar first
///
/// Candidates without an embedding are skipped.
pub fn find_similar<Id, I>(target: &[f32], candidates: I, threshold: f32) -> Vec<(Id, f32)>
where
    I: IntoIterator<Item = (Id, Option<Vec<f32>>)>,
{
    let mut similar: Vec<(Id, f32)> = candidates
        .into_iter()
        .filter_map(|(id, embedding)| {
            let similarity = cosine_similarity(target, &embedding?);
            (similarity >= threshold).then_some((id, similarity))
        })
        .collect();

    similar.sort_by(|a, b| b.1.total_cmp(&a.1));
    similar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors() {
        let v = vec![0.3, -1.2, 4.0, 0.01];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector() {
        let v = vec![1.0, 2.0, 3.0];
        let zero = vec![0.0; 3];
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_absent_input() {
        let v = vec![1.0, 2.0];
        assert_eq!(cosine_similarity_opt(None, Some(&v)), 0.0);
        assert_eq!(cosine_similarity_opt(Some(&v), None), 0.0);
        assert!((cosine_similarity_opt(Some(&v), Some(&v)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_symmetry() {
        let a = vec![0.2, 0.7, -0.1, 0.4];
        let b = vec![0.9, -0.3, 0.5, 0.0];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_negative_cosine_is_returned_raw() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), -1.0);
    }

    #[test]
    fn test_exact_three_quarters() {
        let a = vec![1.0, 1.0, 1.0, 1.0, 0.0];
        let b = vec![1.0, 1.0, 1.0, 0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.75);
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_find_similar_sorted_and_filtered() {
        let target = vec![1.0, 0.0];
        let candidates = vec![
            (1, Some(vec![0.0, 1.0])),
            (2, Some(vec![1.0, 0.1])),
            (3, None),
            (4, Some(vec![1.0, 0.5])),
        ];

        let similar = find_similar(&target, candidates, 0.75);
        let ids: Vec<i32> = similar.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 4]);
    }
}
