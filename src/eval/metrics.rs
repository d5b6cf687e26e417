//! Answer-quality metrics: exact match, token F1, hallucination ratio.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static RE_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Lower-case, strip punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = RE_PUNCTUATION.replace_all(&lowered, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized strings are equal.
pub fn exact_match(predicted: &str, expected: &str) -> bool {
    normalize(predicted) == normalize(expected)
}

/// Harmonic mean of token-set precision and recall.
///
/// `0.0` when the prediction has no tokens or shares none with the expectation.
pub fn f1_score(predicted: &str, expected: &str) -> f64 {
    let predicted = normalize(predicted);
    let expected = normalize(expected);
    let pred_tokens: HashSet<&str> = predicted.split_whitespace().collect();
    let true_tokens: HashSet<&str> = expected.split_whitespace().collect();

    let common = pred_tokens.intersection(&true_tokens).count();
    if pred_tokens.is_empty() || common == 0 {
        return 0.0;
    }
    let precision = common as f64 / pred_tokens.len() as f64;
    let recall = common as f64 / true_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Split text into sentences on `.`, `!` or `?` followed by whitespace, and on line breaks.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let end = match c {
            '\n' => Some(i),
            '.' | '!' | '?' => match chars.peek() {
                None => Some(i + c.len_utf8()),
                Some((_, next)) if next.is_whitespace() => Some(i + c.len_utf8()),
                _ => None,
            },
            _ => None,
        };
        if let Some(end) = end {
            sentences.push(&text[start..end]);
            start = end;
        }
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Fraction of answer sentences found verbatim (case-insensitive) in `context`.
///
/// An answer with no sentences scores `1.0`.
pub fn hallucination_score(answer: &str, context: &str) -> f64 {
    let sentences = split_sentences(answer);
    if sentences.is_empty() {
        return 1.0;
    }
    let context = context.to_lowercase();
    let found = sentences
        .iter()
        .filter(|s| context.contains(&s.to_lowercase()))
        .count();
    found as f64 / sentences.len() as f64
}

/// Whether the whole trimmed answer is absent from the context (case-insensitive).
pub fn contains_hallucination(answer: &str, context: &str) -> bool {
    !context
        .to_lowercase()
        .contains(&answer.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Alice,   Bob!\nQA-Team "), "alice bob qateam");
    }

    #[test]
    fn test_exact_match_ignores_case_and_punctuation() {
        assert!(exact_match("Alice, Bob", "alice, bob!"));
        assert!(!exact_match("Alice", "Bob"));
    }

    #[test]
    fn test_f1_partial_overlap() {
        let f1 = f1_score("Alice Bob QA", "Alice Bob DevOps QA");
        assert!((f1 - 0.857).abs() < 1e-3);
    }

    #[test]
    fn test_f1_uses_token_sets() {
        assert!((f1_score("alice alice bob", "alice bob") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_f1_degenerate() {
        assert_eq!(f1_score("", "alice"), 0.0);
        assert_eq!(f1_score("carol", "alice"), 0.0);
        assert_eq!(f1_score("!!!", "alice"), 0.0);
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("Kickoff is Tuesday. Room 4.5 is booked!\nBring laptops"),
            vec!["Kickoff is Tuesday.", "Room 4.5 is booked!", "Bring laptops"]
        );
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_hallucination_all_found() {
        let context = "The kickoff is on Tuesday. It starts at 2 PM in room 4.";
        assert_eq!(hallucination_score("The kickoff is on Tuesday. It starts at 2 PM", context), 1.0);
    }

    #[test]
    fn test_hallucination_none_found() {
        assert_eq!(hallucination_score("Sales will attend. Lunch is free.", "Alice and Bob attend."), 0.0);
    }

    #[test]
    fn test_hallucination_partial_and_empty() {
        assert_eq!(hallucination_score("Alice attends. Sales attends.", "alice attends."), 0.5);
        assert_eq!(hallucination_score("", "anything"), 1.0);
    }

    #[test]
    fn test_contains_hallucination() {
        let context = "Attendees: Alice, Bob, DevOps Team, QA Team";
        assert!(!contains_hallucination(" alice, bob ", context));
        assert!(contains_hallucination("Alice, Bob, QA Team, and Sales Team", context));
    }
}
