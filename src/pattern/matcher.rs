//! The matcher tree: one node per pattern construct.
//!
//! Every node is a closed, immutable value once built. The tree is both
//! the parse result and the executable form; evaluation walks it directly
//! (`pattern::eval`). `Display` renders a canonical function-style text
//! whose re-parse yields a structurally equal tree.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::catalog::{DepType, PkgId, Priority};
use crate::pattern::result::MatchResult;

/// Most capture groups a string predicate will report, group 0 included.
const MAX_GROUPS: usize = 30;

/// A string predicate's compiled form plus its source text.
///
/// Compilation is case-insensitive and happens once, at node construction;
/// a failure there is a compile error, never an evaluation error. The
/// empty pattern is rewritten to `.*` so that an argument-less string
/// predicate (`~m` in a grouping policy) matches everything.
#[derive(Debug, Clone)]
pub struct StrMatcher {
    source: String,
    regex: Regex,
}

impl StrMatcher {
    pub fn new(pattern: &str) -> Result<StrMatcher, regex::Error> {
        let effective = if pattern.is_empty() { ".*" } else { pattern };
        let regex = RegexBuilder::new(effective)
            .case_insensitive(true)
            .build()?;
        Ok(StrMatcher {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern text as written, before the empty-pattern rewrite.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }

    /// Capture groups for `s`: group 0, then each parenthesized subgroup up
    /// to the first unpopulated one, at most [`MAX_GROUPS`] in total.
    pub fn capture(&self, s: &str) -> Option<MatchResult> {
        let caps = self.regex.captures(s)?;
        let groups: Vec<String> = caps
            .iter()
            .take(MAX_GROUPS)
            .take_while(|g| g.is_some())
            .map(|g| g.unwrap().as_str().to_string())
            .collect();
        Some(MatchResult::from_groups(groups))
    }
}

// Structural equality is source-text equality; the compiled regex is a
// function of the source.
impl PartialEq for StrMatcher {
    fn eq(&self, other: &StrMatcher) -> bool {
        self.source == other.source
    }
}

impl Eq for StrMatcher {}

/// The action selected by `?action(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Install,
    Upgrade,
    Downgrade,
    Remove,
    Reinstall,
    Hold,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Install => "install",
            ActionKind::Upgrade => "upgrade",
            ActionKind::Downgrade => "downgrade",
            ActionKind::Remove => "remove",
            ActionKind::Reinstall => "reinstall",
            ActionKind::Hold => "hold",
        }
    }
}

/// A matcher node. Children are owned; the tree never aliases the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    // String predicates.
    Name(StrMatcher),
    Description(StrMatcher),
    Maintainer(StrMatcher),
    Section(StrMatcher),
    Version(StrMatcher),
    Archive(StrMatcher),
    Origin(StrMatcher),
    SourcePackage(StrMatcher),
    SourceVersion(StrMatcher),
    Task(StrMatcher),
    Tag(StrMatcher),
    UserTag(StrMatcher),

    // Distinguished versions.
    CurrentVersion,
    CandidateVersion,
    TargetVersion,

    // Flag and state predicates.
    Priority(Priority),
    Automatic,
    Broken,
    BrokenDep(DepType),
    Action {
        kind: ActionKind,
        require_purge: bool,
    },
    Keep,
    Installed,
    Virtual,
    Essential,
    ConfigFiles,
    New,
    Upgradable,
    Obsolete,
    Garbage,
    True,
    False,
    /// Pins a search to one package; built by `make_const_matcher`, never
    /// by the parser.
    Const(PkgId),

    // Structural combinators.
    And(Box<Matcher>, Box<Matcher>),
    Or(Box<Matcher>, Box<Matcher>),
    Not(Box<Matcher>),
    Depends {
        dep_type: DepType,
        pattern: Box<Matcher>,
        broken_only: bool,
    },
    RevDepends {
        dep_type: DepType,
        pattern: Box<Matcher>,
        broken_only: bool,
    },
    Provides(Box<Matcher>),
    ReverseProvides(Box<Matcher>),
    Widen(Box<Matcher>),
    Narrow {
        filter: Box<Matcher>,
        pattern: Box<Matcher>,
    },
    AllVersions(Box<Matcher>),
    AnyVersion(Box<Matcher>),

    // Lambda forms.
    Explicit(Box<Matcher>),
    Bind {
        pattern: Box<Matcher>,
        variable: usize,
    },
    Equal(usize),
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

impl Matcher {
    /// Render at binder depth `depth`; `?for` extends the depth, so bound
    /// variables print as `x0`, `x1`, ... by their De-Bruijn index.
    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Matcher::Name(p) => write!(f, "?name({})", string_arg(p.source())),
            Matcher::Description(p) => write!(f, "?description({})", string_arg(p.source())),
            Matcher::Maintainer(p) => write!(f, "?maintainer({})", string_arg(p.source())),
            Matcher::Section(p) => write!(f, "?section({})", string_arg(p.source())),
            Matcher::Version(p) => write!(f, "?version({})", string_arg(p.source())),
            Matcher::Archive(p) => write!(f, "?archive({})", string_arg(p.source())),
            Matcher::Origin(p) => write!(f, "?origin({})", string_arg(p.source())),
            Matcher::SourcePackage(p) => write!(f, "?source-package({})", string_arg(p.source())),
            Matcher::SourceVersion(p) => write!(f, "?source-version({})", string_arg(p.source())),
            Matcher::Task(p) => write!(f, "?task({})", string_arg(p.source())),
            Matcher::Tag(p) => write!(f, "?tag({})", string_arg(p.source())),
            Matcher::UserTag(p) => write!(f, "?user-tag({})", string_arg(p.source())),

            Matcher::CurrentVersion => f.write_str("?version(CURRENT)"),
            Matcher::CandidateVersion => f.write_str("?version(CANDIDATE)"),
            Matcher::TargetVersion => f.write_str("?version(TARGET)"),

            Matcher::Priority(p) => write!(f, "?priority({p})"),
            Matcher::Automatic => f.write_str("?automatic"),
            Matcher::Broken => f.write_str("?broken"),
            Matcher::BrokenDep(t) => write!(f, "?broken-{}", t.surface_name()),
            Matcher::Action {
                kind,
                require_purge,
            } => {
                if *require_purge {
                    f.write_str("?action(purge)")
                } else {
                    write!(f, "?action({})", kind.as_str())
                }
            }
            Matcher::Keep => f.write_str("?action(keep)"),
            Matcher::Installed => f.write_str("?installed"),
            Matcher::Virtual => f.write_str("?virtual"),
            Matcher::Essential => f.write_str("?essential"),
            Matcher::ConfigFiles => f.write_str("?config-files"),
            Matcher::New => f.write_str("?new"),
            Matcher::Upgradable => f.write_str("?upgradable"),
            Matcher::Obsolete => f.write_str("?obsolete"),
            Matcher::Garbage => f.write_str("?garbage"),
            Matcher::True => f.write_str("?true"),
            Matcher::False => f.write_str("?false"),
            Matcher::Const(pkg) => write!(f, "?const(#{})", pkg.0),

            Matcher::And(a, b) => {
                f.write_str("?and(")?;
                a.fmt_at(f, depth)?;
                f.write_str(", ")?;
                b.fmt_at(f, depth)?;
                f.write_str(")")
            }
            Matcher::Or(a, b) => {
                f.write_str("?or(")?;
                a.fmt_at(f, depth)?;
                f.write_str(", ")?;
                b.fmt_at(f, depth)?;
                f.write_str(")")
            }
            Matcher::Not(inner) => {
                f.write_str("?not(")?;
                inner.fmt_at(f, depth)?;
                f.write_str(")")
            }
            Matcher::Depends {
                dep_type,
                pattern,
                broken_only,
            } => {
                let broken = if *broken_only { "broken-" } else { "" };
                write!(f, "?{broken}{}(", dep_type.surface_name())?;
                pattern.fmt_at(f, depth)?;
                f.write_str(")")
            }
            Matcher::RevDepends {
                dep_type,
                pattern,
                broken_only,
            } => {
                let broken = if *broken_only { "broken-" } else { "" };
                write!(f, "?{broken}reverse-{}(", dep_type.surface_name())?;
                pattern.fmt_at(f, depth)?;
                f.write_str(")")
            }
            Matcher::Provides(inner) => {
                f.write_str("?provides(")?;
                inner.fmt_at(f, depth)?;
                f.write_str(")")
            }
            Matcher::ReverseProvides(inner) => {
                f.write_str("?reverse-provides(")?;
                inner.fmt_at(f, depth)?;
                f.write_str(")")
            }
            Matcher::Widen(inner) => {
                f.write_str("?widen(")?;
                inner.fmt_at(f, depth)?;
                f.write_str(")")
            }
            Matcher::Narrow { filter, pattern } => {
                f.write_str("?narrow(")?;
                filter.fmt_at(f, depth)?;
                f.write_str(", ")?;
                pattern.fmt_at(f, depth)?;
                f.write_str(")")
            }
            Matcher::AllVersions(inner) => {
                f.write_str("?all-versions(")?;
                inner.fmt_at(f, depth)?;
                f.write_str(")")
            }
            Matcher::AnyVersion(inner) => {
                f.write_str("?any-version(")?;
                inner.fmt_at(f, depth)?;
                f.write_str(")")
            }

            Matcher::Explicit(inner) => {
                write!(f, "?for x{depth}: ")?;
                inner.fmt_at(f, depth + 1)
            }
            Matcher::Bind { pattern, variable } => {
                write!(f, "?bind(x{variable}, ")?;
                pattern.fmt_at(f, depth)?;
                f.write_str(")")
            }
            Matcher::Equal(variable) => write!(f, "?=x{variable}"),
        }
    }
}

/// Quote a string argument when the bare form would not re-lex to the same
/// text: metacharacters anywhere, whitespace at either end, or emptiness.
fn string_arg(s: &str) -> String {
    let needs_quoting = s.is_empty()
        || s.chars().any(|c| matches!(c, '(' | ')' | '!' | '~' | '|' | '"'))
        || s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace);
    if !needs_quoting {
        return s.to_string();
    }
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_matcher_case_insensitive() {
        let m = StrMatcher::new("^APT").unwrap();
        assert!(m.matches("apt-utils"));
        assert!(m.matches("Apt-Utils"));
        assert!(!m.matches("libapt"));
    }

    #[test]
    fn test_str_matcher_empty_matches_anything() {
        let m = StrMatcher::new("").unwrap();
        assert!(m.matches(""));
        assert!(m.matches("anything at all"));
        assert_eq!(m.source(), "");
    }

    #[test]
    fn test_str_matcher_bad_regex() {
        assert!(StrMatcher::new("(unclosed").is_err());
    }

    #[test]
    fn test_capture_groups() {
        let m = StrMatcher::new("^lib(.*)-dev$").unwrap();
        let r = m.capture("libfoo-dev").unwrap();
        assert_eq!(r.groups(), &["libfoo-dev".to_string(), "foo".to_string()]);
        assert!(m.capture("foo").is_none());
    }

    #[test]
    fn test_capture_stops_at_unpopulated_group() {
        let m = StrMatcher::new("(a)|(b)").unwrap();
        let r = m.capture("b").unwrap();
        // Group 1 does not participate, so reporting stops after group 0.
        assert_eq!(r.num_groups(), 1);
        assert_eq!(r.group(0), Some("b"));
    }

    #[test]
    fn test_structural_equality_ignores_compilation() {
        let a = StrMatcher::new("foo").unwrap();
        let b = StrMatcher::new("foo").unwrap();
        let c = StrMatcher::new("bar").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_display_leaves() {
        assert_eq!(Matcher::True.to_string(), "?true");
        assert_eq!(Matcher::Virtual.to_string(), "?virtual");
        assert_eq!(Matcher::Keep.to_string(), "?action(keep)");
        assert_eq!(Matcher::CurrentVersion.to_string(), "?version(CURRENT)");
        assert_eq!(
            Matcher::BrokenDep(DepType::Recommends).to_string(),
            "?broken-recommends"
        );
    }

    #[test]
    fn test_display_quotes_metacharacters() {
        let m = Matcher::Name(StrMatcher::new("a|b").unwrap());
        assert_eq!(m.to_string(), "?name(\"a|b\")");
        let plain = Matcher::Name(StrMatcher::new("^apt$").unwrap());
        assert_eq!(plain.to_string(), "?name(^apt$)");
    }

    #[test]
    fn test_display_lambda_uses_de_bruijn_names() {
        let m = Matcher::Explicit(Box::new(Matcher::Depends {
            dep_type: DepType::Depends,
            pattern: Box::new(Matcher::Equal(0)),
            broken_only: false,
        }));
        assert_eq!(m.to_string(), "?for x0: ?depends(?=x0)");
    }

    #[test]
    fn test_display_nested_binders() {
        let m = Matcher::Explicit(Box::new(Matcher::Explicit(Box::new(Matcher::And(
            Box::new(Matcher::Equal(0)),
            Box::new(Matcher::Equal(1)),
        )))));
        assert_eq!(m.to_string(), "?for x0: ?for x1: ?and(?=x0, ?=x1)");
    }
}
