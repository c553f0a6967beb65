//! Ignore patterns for pruning manifest subtrees

use super::path::{PathSegment, TreePath};

/// Matches a single [`PathSegment`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SegmentMatcher {
    /// Matches one map key exactly.
    Exact(String),
    /// Matches any sequence index.
    AnyIndex,
    /// Matches any map key.
    AnyKey,
}

impl SegmentMatcher {
    /// Returns true if this matcher accepts the given segment.
    #[must_use]
    pub fn matches(&self, segment: &PathSegment) -> bool {
        match (self, segment) {
            (Self::Exact(expected), PathSegment::Key(key)) => expected == key,
            (Self::AnyIndex, PathSegment::Index(_)) | (Self::AnyKey, PathSegment::Key(_)) => true,
            _ => false,
        }
    }
}

/// An ordered sequence of segment matchers.
///
/// A path is ignored when some prefix of it is matched completely by the
/// pattern, so a pattern prunes the whole subtree below the position it names.
///
/// ```
/// use manifold_domain::tree::{IgnorePattern, TreePath};
///
/// let pattern = IgnorePattern::new().key("instance_groups").any_index().key("env");
/// let path = TreePath::root()
///     .child("instance_groups")
///     .child(3_usize)
///     .child("env")
///     .child("password");
///
/// assert!(pattern.matches_prefix_of(&path));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct IgnorePattern {
    matchers: Vec<SegmentMatcher>,
}

impl IgnorePattern {
    /// Creates an empty pattern. An empty pattern never matches.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// Appends an exact key matcher.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.matchers.push(SegmentMatcher::Exact(key.into()));
        self
    }

    /// Appends a matcher accepting any sequence index.
    #[must_use]
    pub fn any_index(mut self) -> Self {
        self.matchers.push(SegmentMatcher::AnyIndex);
        self
    }

    /// Appends a matcher accepting any map key.
    #[must_use]
    pub fn any_key(mut self) -> Self {
        self.matchers.push(SegmentMatcher::AnyKey);
        self
    }

    /// Returns true if this pattern fully matches a prefix of `path`.
    #[must_use]
    pub fn matches_prefix_of(&self, path: &TreePath) -> bool {
        let segments = path.segments();
        !self.matchers.is_empty()
            && segments.len() >= self.matchers.len()
            && self
                .matchers
                .iter()
                .zip(segments)
                .all(|(matcher, segment)| matcher.matches(segment))
    }
}

impl FromIterator<SegmentMatcher> for IgnorePattern {
    fn from_iter<I: IntoIterator<Item = SegmentMatcher>>(iter: I) -> Self {
        Self {
            matchers: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern_matches_prefix() {
        let pattern = IgnorePattern::new().key("properties");
        let path = TreePath::root().child("properties").child("a").child(2_usize);
        assert!(pattern.matches_prefix_of(&path));
    }

    #[test]
    fn test_pattern_longer_than_path_does_not_match() {
        let pattern = IgnorePattern::new().key("jobs").any_index().key("properties");
        let path = TreePath::root().child("jobs").child(0_usize);
        assert!(!pattern.matches_prefix_of(&path));
    }

    #[test]
    fn test_any_index_rejects_keys() {
        let pattern = IgnorePattern::new().key("jobs").any_index();
        let path = TreePath::root().child("jobs").child("mysql");
        assert!(!pattern.matches_prefix_of(&path));
    }

    #[test]
    fn test_any_key_rejects_indices() {
        let pattern = IgnorePattern::new().key("consumes").any_key();
        assert!(pattern.matches_prefix_of(&TreePath::root().child("consumes").child("db")));
        assert!(!pattern.matches_prefix_of(&TreePath::root().child("consumes").child(0_usize)));
    }

    #[test]
    fn test_empty_pattern_never_matches() {
        let pattern = IgnorePattern::new();
        assert!(!pattern.matches_prefix_of(&TreePath::root()));
        assert!(!pattern.matches_prefix_of(&TreePath::root().child("a")));
    }

    #[test]
    fn test_from_iter() {
        let pattern: IgnorePattern = [SegmentMatcher::Exact("a".into()), SegmentMatcher::AnyKey]
            .into_iter()
            .collect();
        assert_eq!(pattern, IgnorePattern::new().key("a").any_key());
    }
}
