//! A search-pattern language for package databases.
//!
//! A pattern string such as `~i ?section(libs) | ?provides(?name(mail-agent))`
//! compiles into a [`Matcher`] tree, which is then evaluated against
//! `(package, version)` pairs drawn from a [`Catalog`]. Evaluation yields
//! either a boolean verdict ([`apply_matcher`]) or a [`MatchResult`] — the
//! ordered capture groups that grouping policies and display templates
//! consume ([`get_match`]).
//!
//! The language has two surface forms: function-style matchers
//! (`?name(apt)`, `?for x: ?depends(?=x)`) and the legacy single-letter
//! short forms (`~napt`, `~i`). A small De-Bruijn-indexed lambda lets a
//! pattern bind the package under consideration and refer back to it from
//! inside dependency traversals; lambdas range only over package/version
//! values, so every search terminates.
//!
//! ```
//! use pkgmatch::{apply_matcher, get_match, parse_pattern, ParseOptions};
//! use pkgmatch::catalog::MemCatalog;
//!
//! let mut cat = MemCatalog::new();
//! let apt = cat.add_package("apt");
//! let v = cat.add_version(apt, "1.0");
//! cat.set_section(v, "admin");
//!
//! let matcher = parse_pattern("?section(admin)", &ParseOptions::new())
//!     .unwrap()
//!     .unwrap();
//! assert!(apply_matcher(&matcher, apt, &cat));
//! let result = get_match(&matcher, apt, &cat).unwrap();
//! assert_eq!(result.group(0), Some("admin"));
//! ```

pub mod catalog;
pub mod pattern;

pub use catalog::{Catalog, PkgId, VerId};
pub use pattern::{parse_pattern, CompileError, ErrorKind, MatchResult, Matcher, ParseOptions};

use pattern::eval::Evaluator;

/// Whether `matcher` accepts the package in package mode: any version
/// matches, or — for a package with no versions — the absent-version view.
pub fn apply_matcher(matcher: &Matcher, pkg: PkgId, catalog: &dyn Catalog) -> bool {
    Evaluator::new(catalog).matches_package(matcher, pkg)
}

/// Whether `matcher` accepts one specific version of a package. `None` is
/// the absent-version view (virtual packages, pending removals).
pub fn apply_matcher_to_version(
    matcher: &Matcher,
    pkg: PkgId,
    ver: Option<VerId>,
    catalog: &dyn Catalog,
) -> bool {
    Evaluator::new(catalog).matches(matcher, pkg, ver)
}

/// The capture groups for the first version of `pkg` that matches, or
/// `None` if no version does.
pub fn get_match(matcher: &Matcher, pkg: PkgId, catalog: &dyn Catalog) -> Option<MatchResult> {
    Evaluator::new(catalog).get_match_package(matcher, pkg)
}

/// The capture groups for one specific version, or `None` on no match.
pub fn get_match_for_version(
    matcher: &Matcher,
    pkg: PkgId,
    ver: Option<VerId>,
    catalog: &dyn Catalog,
) -> Option<MatchResult> {
    Evaluator::new(catalog).get_match(matcher, pkg, ver)
}

/// A matcher that accepts exactly one package; used to pin a search.
pub fn make_const_matcher(pkg: PkgId) -> Matcher {
    Matcher::Const(pkg)
}
