//! Quote-trail reordering.
//!
//! A trail body holds several messages separated by a literal marker
//! (`\n---\n` by default). Reordering reverses the segments so that, for a
//! trail stored oldest-first, the latest reply comes first.
//!
//! Reordering is purely positional: it never looks at dates or quote depth.
//! It assumes every trail upstream is stored in one consistent direction
//! (oldest-first). Nothing verifies that assumption; a trail that is already
//! newest-first comes out oldest-first. Callers that cannot guarantee the
//! direction should index with reordering disabled.

/// Default marker separating quoted messages inside a body.
pub const DEFAULT_MARKER: &str = "\n---\n";

/// A body split on its trail marker, held in reversed (emitted) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderedTrail {
    /// Segments, last-written first.
    pub segments: Vec<String>,
    marker: String,
}

impl ReorderedTrail {
    /// Split `body` on `marker` and reverse the segment order.
    ///
    /// An empty marker never splits.
    pub fn new(body: &str, marker: &str) -> Self {
        let mut segments: Vec<String> = if marker.is_empty() {
            vec![body.to_string()]
        } else {
            body.split(marker).map(str::to_string).collect()
        };
        segments.reverse();
        Self {
            segments,
            marker: marker.to_string(),
        }
    }

    /// Number of segments in the trail.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the trail has no segments (never true for a parsed body).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Join the reversed segments with the original marker, trimmed.
    pub fn render(&self) -> String {
        self.segments.join(&self.marker).trim().to_string()
    }
}

/// Reverse the segments of a trail body and rejoin them with the same marker.
///
/// A body without the marker comes back trimmed and otherwise unchanged.
pub fn reorder(body: &str, marker: &str) -> String {
    ReorderedTrail::new(body, marker).render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_reverses_segments() {
        let body = "first\n---\nsecond\n---\nthird";
        assert_eq!(reorder(body, DEFAULT_MARKER), "third\n---\nsecond\n---\nfirst");
    }

    #[test]
    fn test_reorder_without_marker_is_trimmed_body() {
        let body = "  only one message\nwith two lines \n";
        assert_eq!(reorder(body, DEFAULT_MARKER), body.trim());
    }

    #[test]
    fn test_reorder_twice_restores_segmentation() {
        let body = "a1\na2\n---\nb\n---\nc";
        let once = reorder(body, DEFAULT_MARKER);
        let twice = reorder(&once, DEFAULT_MARKER);
        assert_eq!(twice, body);
    }

    #[test]
    fn test_resplit_yields_exact_reverse() {
        let body = "one\n---\ntwo\n---\nthree\n---\nfour";
        let original: Vec<&str> = body.split(DEFAULT_MARKER).collect();
        let reordered = reorder(body, DEFAULT_MARKER);
        let mut resplit: Vec<&str> = reordered.split(DEFAULT_MARKER).collect();
        resplit.reverse();
        assert_eq!(resplit, original);
    }

    #[test]
    fn test_trail_segments_in_emitted_order() {
        let trail = ReorderedTrail::new("old\n---\nnew", DEFAULT_MARKER);
        assert_eq!(trail.len(), 2);
        assert_eq!(trail.segments, vec!["new".to_string(), "old".to_string()]);
    }

    #[test]
    fn test_custom_marker() {
        assert_eq!(reorder("a||b||c", "||"), "c||b||a");
    }

    #[test]
    fn test_empty_marker_never_splits() {
        assert_eq!(reorder(" abc ", ""), "abc");
    }
}
