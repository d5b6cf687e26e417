//! Vector similarity and maximal marginal relevance selection.

/// Cosine similarity of two vectors; `0.0` when either is all zeros or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Pick up to `k` candidates balancing relevance to `query` against
/// redundancy with what was already picked.
///
/// Each step selects the candidate maximizing
/// `lambda * sim(query, c) - (1 - lambda) * max(sim(c, picked))`.
/// `lambda = 1.0` is plain relevance ranking. Ties go to the earlier
/// candidate. Returns indices into `candidates`, in selection order.
pub fn mmr_select(query: &[f32], candidates: &[&[f32]], k: usize, lambda: f32) -> Vec<usize> {
    let lambda = lambda.clamp(0.0, 1.0);
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, c))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));
    // Highest similarity to anything selected so far, per candidate.
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (pos, &idx) in remaining.iter().enumerate() {
            let penalty = if selected.is_empty() { 0.0 } else { redundancy[idx] };
            let score = lambda * relevance[idx] - (1.0 - lambda) * penalty;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        let chosen = remaining.remove(best_pos);
        selected.push(chosen);
        for &idx in &remaining {
            let sim = cosine_similarity(candidates[idx], candidates[chosen]);
            if sim > redundancy[idx] {
                redundancy[idx] = sim;
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_basic() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_mmr_prefers_diverse_second_pick() {
        let query = [1.0, 0.2];
        let a = [1.0, 0.0];
        let a_dup = [0.99, -0.01];
        let b = [0.6, 0.8];
        let candidates: Vec<&[f32]> = vec![&a, &a_dup, &b];

        let pure = mmr_select(&query, &candidates, 2, 1.0);
        assert_eq!(pure, vec![0, 1]);

        let diverse = mmr_select(&query, &candidates, 2, 0.5);
        assert_eq!(diverse, vec![0, 2]);
    }

    #[test]
    fn test_mmr_k_larger_than_candidates() {
        let a = [1.0, 0.0];
        let candidates: Vec<&[f32]> = vec![&a];
        assert_eq!(mmr_select(&[1.0, 0.0], &candidates, 5, 0.5), vec![0]);
        assert!(mmr_select(&[1.0, 0.0], &[], 5, 0.5).is_empty());
    }

    #[test]
    fn test_mmr_ties_keep_insertion_order() {
        let a = [1.0, 0.0];
        let candidates: Vec<&[f32]> = vec![&a, &a, &a];
        assert_eq!(mmr_select(&[1.0, 0.0], &candidates, 3, 1.0), vec![0, 1, 2]);
    }
}
