//! Read-only access to the package database.
//!
//! The matcher engine never sees how packages are stored; everything it
//! needs flows through the [`Catalog`] trait. Handles (`PkgId`, `VerId`,
//! `UserTagId`) are opaque ids minted by the catalog, and a version handle
//! may be absent (`Option<VerId>`) — that is the "no version" view used for
//! virtual packages and for the removed action-view of a real package.

use std::fmt;

use serde::Serialize;

pub mod memory;

pub use memory::MemCatalog;

/// Opaque handle naming a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PkgId(pub u32);

/// Opaque handle naming one version of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VerId(pub u32);

/// Opaque handle naming a user-defined tag string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UserTagId(pub u32);

/// The kind of a dependency declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DepType {
    Depends,
    PreDepends,
    Recommends,
    Suggests,
    Conflicts,
    Breaks,
    Replaces,
}

impl DepType {
    /// Parse a surface-syntax dependency type name (case-insensitive).
    pub fn parse(s: &str) -> Option<DepType> {
        if s.eq_ignore_ascii_case("depends") {
            Some(DepType::Depends)
        } else if s.eq_ignore_ascii_case("predepends") {
            Some(DepType::PreDepends)
        } else if s.eq_ignore_ascii_case("recommends") {
            Some(DepType::Recommends)
        } else if s.eq_ignore_ascii_case("suggests") {
            Some(DepType::Suggests)
        } else if s.eq_ignore_ascii_case("conflicts") {
            Some(DepType::Conflicts)
        } else if s.eq_ignore_ascii_case("breaks") {
            Some(DepType::Breaks)
        } else if s.eq_ignore_ascii_case("replaces") {
            Some(DepType::Replaces)
        } else {
            None
        }
    }

    /// The lower-case name used in pattern syntax (`?broken-depends`, ...).
    pub fn surface_name(&self) -> &'static str {
        match self {
            DepType::Depends => "depends",
            DepType::PreDepends => "predepends",
            DepType::Recommends => "recommends",
            DepType::Suggests => "suggests",
            DepType::Conflicts => "conflicts",
            DepType::Breaks => "breaks",
            DepType::Replaces => "replaces",
        }
    }

    /// Whether a declaration of type `declared` is selected when searching
    /// for dependencies of type `self`. PreDepends counts as Depends.
    pub fn selects(&self, declared: DepType) -> bool {
        declared == *self || (*self == DepType::Depends && declared == DepType::PreDepends)
    }
}

impl fmt::Display for DepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DepType::Depends => "Depends",
            DepType::PreDepends => "PreDepends",
            DepType::Recommends => "Recommends",
            DepType::Suggests => "Suggests",
            DepType::Conflicts => "Conflicts",
            DepType::Breaks => "Breaks",
            DepType::Replaces => "Replaces",
        };
        f.write_str(name)
    }
}

/// Comparison operator in a version constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VersionOp {
    Less,
    LessEq,
    Equal,
    GreaterEq,
    Greater,
}

impl fmt::Display for VersionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionOp::Less => "<<",
            VersionOp::LessEq => "<=",
            VersionOp::Equal => "=",
            VersionOp::GreaterEq => ">=",
            VersionOp::Greater => ">>",
        };
        f.write_str(s)
    }
}

/// A version restriction attached to a dependency target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionConstraint {
    pub op: VersionOp,
    pub version: String,
}

/// One member of a dependency or-group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepTarget {
    pub target: PkgId,
    pub constraint: Option<VersionConstraint>,
}

/// A dependency declaration: one or-group of targets.
///
/// `install_satisfied` is the rolled-up state of the whole group — whether
/// some member of the group will be satisfied once the currently planned
/// actions are carried out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepGroup {
    pub dep_type: DepType,
    /// Package declaring this dependency.
    pub parent: PkgId,
    /// Version declaring this dependency.
    pub parent_ver: Option<VerId>,
    /// The or-group members, in declaration order. Never empty.
    pub targets: Vec<DepTarget>,
    pub install_satisfied: bool,
}

/// A reverse-dependency edge: the surrounding or-group plus which member of
/// it targets the package that was queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevDep {
    pub group: DepGroup,
    pub index: usize,
}

impl RevDep {
    /// The group member pointing at the queried package.
    pub fn target(&self) -> &DepTarget {
        &self.group.targets[self.index]
    }
}

/// A provides edge: `owner`'s version `owner_ver` provides the virtual
/// package name `package`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Provide {
    pub package: PkgId,
    pub owner: PkgId,
    pub owner_ver: VerId,
}

/// Archive metadata for one file a version is available from.
///
/// Empty fields mean the record does not carry that datum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub archive: String,
    pub origin: String,
    pub source_package: String,
    pub source_version: String,
}

/// Version priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Priority {
    Important,
    Required,
    Standard,
    Optional,
    Extra,
}

impl Priority {
    /// Parse the canonical English name, case-insensitively.
    pub fn parse(s: &str) -> Option<Priority> {
        if s.eq_ignore_ascii_case("important") {
            Some(Priority::Important)
        } else if s.eq_ignore_ascii_case("required") {
            Some(Priority::Required)
        } else if s.eq_ignore_ascii_case("standard") {
            Some(Priority::Standard)
        } else if s.eq_ignore_ascii_case("optional") {
            Some(Priority::Optional)
        } else if s.eq_ignore_ascii_case("extra") {
            Some(Priority::Extra)
        } else {
            None
        }
    }

    pub const ALL: [Priority; 5] = [
        Priority::Important,
        Priority::Required,
        Priority::Standard,
        Priority::Optional,
        Priority::Extra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Important => "important",
            Priority::Required => "required",
            Priority::Standard => "standard",
            Priority::Optional => "optional",
            Priority::Extra => "extra",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The action the cache has computed for a package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Action {
    #[default]
    Unchanged,
    Install,
    AutoInstall,
    Upgrade,
    Downgrade,
    Remove,
    AutoRemove,
    UnusedRemove,
    Hold,
    AutoHold,
    Keep,
    Reinstall,
    Broken,
}

/// Per-package cache state flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PkgState {
    pub action: Action,
    pub keep: bool,
    pub install: bool,
    pub hold: bool,
    pub purge: bool,
    pub auto: bool,
    pub garbage: bool,
    pub new_package: bool,
    pub now_broken: bool,
    pub inst_broken: bool,
    pub upgradable: bool,
    pub config_files: bool,
}

/// Read-only accessors over the package database.
///
/// All list accessors return data in a stable order; the engine's results
/// (which version matched first, which dependency rendered) follow that
/// order. Implementations must not mutate while an evaluation is running.
pub trait Catalog {
    fn packages(&self) -> Vec<PkgId>;
    fn name(&self, pkg: PkgId) -> &str;
    fn versions(&self, pkg: PkgId) -> &[VerId];
    fn current_version(&self, pkg: PkgId) -> Option<VerId>;
    fn candidate_version(&self, pkg: PkgId) -> Option<VerId>;
    /// The version that will be installed once planned actions run.
    fn target_version(&self, pkg: PkgId) -> Option<VerId>;

    fn version_string(&self, ver: VerId) -> &str;
    fn section(&self, ver: VerId) -> Option<&str>;
    fn priority(&self, ver: VerId) -> Priority;
    fn maintainer(&self, ver: VerId) -> Option<&str>;
    fn long_description(&self, ver: VerId) -> Option<&str>;
    fn files(&self, ver: VerId) -> &[FileRecord];

    fn deps(&self, ver: VerId) -> &[DepGroup];
    fn rev_deps(&self, pkg: PkgId) -> Vec<RevDep>;
    /// Virtual package names this version provides.
    fn provides(&self, ver: VerId) -> &[Provide];
    /// Who provides this (virtual) package.
    fn providers(&self, pkg: PkgId) -> &[Provide];

    fn state(&self, pkg: PkgId) -> PkgState;
    /// Essential or Important flag.
    fn essential(&self, pkg: PkgId) -> bool;
    fn obsolete(&self, pkg: PkgId) -> bool;

    fn tasks(&self, pkg: PkgId) -> &[String];
    fn debtags(&self, pkg: PkgId) -> &[String];
    fn user_tags(&self, pkg: PkgId) -> &[UserTagId];
    fn user_tag_name(&self, tag: UserTagId) -> &str;

    /// Compare two version strings under the catalog's version ordering.
    fn version_check(&self, lhs: &str, op: VersionOp, rhs: &str) -> bool;
    /// The (possibly localized) display name for a priority level.
    fn priority_name(&self, priority: Priority) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deptype_parse_case_insensitive() {
        assert_eq!(DepType::parse("Depends"), Some(DepType::Depends));
        assert_eq!(DepType::parse("PREDEPENDS"), Some(DepType::PreDepends));
        assert_eq!(DepType::parse("breaks"), Some(DepType::Breaks));
        assert_eq!(DepType::parse("provides"), None);
        assert_eq!(DepType::parse(""), None);
    }

    #[test]
    fn test_deptype_selects_folds_predepends() {
        assert!(DepType::Depends.selects(DepType::Depends));
        assert!(DepType::Depends.selects(DepType::PreDepends));
        assert!(!DepType::PreDepends.selects(DepType::Depends));
        assert!(!DepType::Recommends.selects(DepType::Depends));
        assert!(DepType::Conflicts.selects(DepType::Conflicts));
    }

    #[test]
    fn test_version_op_display() {
        assert_eq!(VersionOp::Less.to_string(), "<<");
        assert_eq!(VersionOp::GreaterEq.to_string(), ">=");
        assert_eq!(VersionOp::Equal.to_string(), "=");
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::parse("Important"), Some(Priority::Important));
        assert_eq!(Priority::parse("extra"), Some(Priority::Extra));
        assert_eq!(Priority::parse("urgent"), None);
    }
}
