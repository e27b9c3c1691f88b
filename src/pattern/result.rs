//! Match results: the ordered capture groups produced by a successful
//! `get_match`.

use serde::Serialize;

/// An ordered sequence of captured text groups.
///
/// A predicate with nothing to report yields the empty result (zero
/// groups); string predicates yield the regex groups; combinators
/// concatenate their children's groups, the second child's indices shifted
/// past the first's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    groups: Vec<String>,
}

impl MatchResult {
    /// A successful match with no text to report.
    pub fn empty() -> MatchResult {
        MatchResult::default()
    }

    /// A single capture group.
    pub fn unitary(group: impl Into<String>) -> MatchResult {
        MatchResult {
            groups: vec![group.into()],
        }
    }

    /// Concatenate two results; `second`'s group indices come after
    /// `first`'s.
    pub fn pair(first: MatchResult, second: MatchResult) -> MatchResult {
        let mut groups = first.groups;
        groups.extend(second.groups);
        MatchResult { groups }
    }

    pub fn from_groups(groups: Vec<String>) -> MatchResult {
        MatchResult { groups }
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, n: usize) -> Option<&str> {
        self.groups.get(n).map(String::as_str)
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_has_no_groups() {
        assert_eq!(MatchResult::empty().num_groups(), 0);
        assert_eq!(MatchResult::empty().group(0), None);
    }

    #[test]
    fn test_unitary() {
        let r = MatchResult::unitary("admin");
        assert_eq!(r.num_groups(), 1);
        assert_eq!(r.group(0), Some("admin"));
    }

    #[test]
    fn test_pair_shifts_indices() {
        let a = MatchResult::from_groups(vec!["x".into(), "y".into()]);
        let b = MatchResult::unitary("z");
        let r = MatchResult::pair(a, b);
        assert_eq!(r.num_groups(), 3);
        assert_eq!(r.group(0), Some("x"));
        assert_eq!(r.group(2), Some("z"));
    }

    #[test]
    fn test_pair_with_empty_is_identity() {
        let a = MatchResult::unitary("x");
        assert_eq!(
            MatchResult::pair(a.clone(), MatchResult::empty()),
            MatchResult::pair(MatchResult::empty(), a)
        );
    }
}
