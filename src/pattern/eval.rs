//! Tree-walking evaluation of matchers against catalog values.
//!
//! An [`Evaluator`] borrows the catalog and owns the variable stack plus
//! the per-call user-tag memo; one is created per façade call. There are
//! two evaluation modes for every node:
//!
//! - **version mode** — against a `(package, Option<version>)` pair;
//! - **package mode** — against a bare package, which by default means
//!   "any version matches", falling back to the absent-version sentinel
//!   when the package has no versions at all (virtual packages).
//!
//! Combinators that distribute over the disjunction (`and`, `or`, `not`,
//! the lambda forms, `widen`, the version quantifiers) handle package mode
//! themselves instead of taking the default.

use std::collections::HashMap;

use crate::catalog::{
    Action, Catalog, DepGroup, DepTarget, DepType, FileRecord, PkgId, UserTagId, VerId,
    VersionConstraint,
};
use crate::pattern::matcher::{ActionKind, Matcher, StrMatcher};
use crate::pattern::result::MatchResult;

/// A value bound to a lambda variable.
///
/// The is-match-for relation is reflexive and symmetric but not
/// transitive: a package matches itself and any of its versions; a version
/// matches itself and its package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StackValue {
    Package(PkgId),
    Version(PkgId, Option<VerId>),
}

impl StackValue {
    pub(crate) fn is_match_for(&self, other: StackValue) -> bool {
        match (*self, other) {
            (StackValue::Package(p), StackValue::Package(q)) => p == q,
            (StackValue::Package(p), StackValue::Version(q, _)) => p == q,
            (StackValue::Version(p, _), StackValue::Package(q)) => p == q,
            (StackValue::Version(p, v), StackValue::Version(q, w)) => p == q && v == w,
        }
    }
}

pub(crate) struct Evaluator<'a> {
    catalog: &'a dyn Catalog,
    stack: Vec<StackValue>,
    user_tag_memo: HashMap<(String, UserTagId), Option<MatchResult>>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(catalog: &'a dyn Catalog) -> Evaluator<'a> {
        Evaluator {
            catalog,
            stack: Vec::new(),
            user_tag_memo: HashMap::new(),
        }
    }

    fn stack_at(&self, index: usize) -> StackValue {
        assert!(
            index < self.stack.len(),
            "variable index {index} out of range for stack depth {}",
            self.stack.len()
        );
        self.stack[index]
    }

    // ---------- Version mode ----------

    pub(crate) fn matches(&mut self, m: &Matcher, pkg: PkgId, ver: Option<VerId>) -> bool {
        let cat = self.catalog;
        match m {
            Matcher::Name(p) => p.matches(cat.name(pkg)),
            Matcher::Description(p) => ver
                .and_then(|v| cat.long_description(v))
                .is_some_and(|d| p.matches(d)),
            Matcher::Maintainer(p) => ver
                .and_then(|v| cat.maintainer(v))
                .is_some_and(|s| p.matches(s)),
            Matcher::Section(p) => ver
                .and_then(|v| cat.section(v))
                .is_some_and(|s| p.matches(s)),
            Matcher::Version(p) => ver.is_some_and(|v| p.matches(cat.version_string(v))),
            Matcher::Archive(p) => ver.is_some_and(|v| {
                cat.files(v)
                    .iter()
                    .any(|f| !f.archive.is_empty() && p.matches(&f.archive))
            }),
            Matcher::Origin(p) => ver.is_some_and(|v| {
                cat.files(v)
                    .iter()
                    .any(|f| !f.origin.is_empty() && p.matches(&f.origin))
            }),
            Matcher::SourcePackage(p) => {
                ver.is_some_and(|v| self.source_field_match(p, v, |f| &f.source_package, cat.name(pkg)).is_some())
            }
            Matcher::SourceVersion(p) => ver.is_some_and(|v| {
                self.source_field_match(p, v, |f| &f.source_version, cat.version_string(v))
                    .is_some()
            }),
            Matcher::Task(p) => cat.tasks(pkg).iter().any(|t| p.matches(t)),
            Matcher::Tag(p) => cat.debtags(pkg).iter().any(|t| p.matches(t)),
            Matcher::UserTag(p) => self.user_tag_match(p, pkg).is_some(),

            Matcher::CurrentVersion | Matcher::Installed => {
                matches!(ver, Some(v) if Some(v) == cat.current_version(pkg))
            }
            Matcher::CandidateVersion => {
                matches!(ver, Some(v) if Some(v) == cat.candidate_version(pkg))
            }
            Matcher::TargetVersion => {
                matches!(ver, Some(v) if Some(v) == cat.target_version(pkg))
            }

            Matcher::Priority(level) => ver.is_some_and(|v| cat.priority(v) == *level),
            Matcher::Automatic => {
                let state = cat.state(pkg);
                (cat.current_version(pkg).is_some() || state.install) && state.auto
            }
            Matcher::Broken => {
                ver.is_some() && {
                    let state = cat.state(pkg);
                    state.now_broken || state.inst_broken
                }
            }
            Matcher::BrokenDep(dep_type) => ver.is_some_and(|v| {
                cat.deps(v)
                    .iter()
                    .any(|g| dep_type.selects(g.dep_type) && !g.install_satisfied)
            }),
            Matcher::Action {
                kind,
                require_purge,
            } => {
                let state = cat.state(pkg);
                if *require_purge && !state.purge {
                    return false;
                }
                match kind {
                    ActionKind::Install => {
                        matches!(state.action, Action::Install | Action::AutoInstall)
                    }
                    ActionKind::Remove => matches!(
                        state.action,
                        Action::Remove | Action::AutoRemove | Action::UnusedRemove
                    ),
                    ActionKind::Hold => cat.current_version(pkg).is_some() && state.hold,
                    ActionKind::Upgrade => state.action == Action::Upgrade,
                    ActionKind::Downgrade => state.action == Action::Downgrade,
                    ActionKind::Reinstall => state.action == Action::Reinstall,
                }
            }
            Matcher::Keep => cat.state(pkg).keep,
            Matcher::Virtual => ver.is_none(),
            Matcher::Essential => cat.essential(pkg),
            Matcher::ConfigFiles => cat.state(pkg).config_files,
            Matcher::New => cat.state(pkg).new_package && !cat.versions(pkg).is_empty(),
            Matcher::Upgradable => {
                cat.current_version(pkg).is_some() && cat.state(pkg).upgradable
            }
            Matcher::Obsolete => cat.obsolete(pkg),
            Matcher::Garbage => ver.is_some() && cat.state(pkg).garbage,
            Matcher::True => true,
            Matcher::False => false,
            Matcher::Const(pinned) => pkg == *pinned,

            Matcher::And(a, b) => self.matches(a, pkg, ver) && self.matches(b, pkg, ver),
            Matcher::Or(a, b) => self.matches(a, pkg, ver) || self.matches(b, pkg, ver),
            Matcher::Not(inner) => !self.matches(inner, pkg, ver),
            Matcher::Depends {
                dep_type,
                pattern,
                broken_only,
            } => self.dep_matches(*dep_type, pattern, *broken_only, ver),
            Matcher::RevDepends {
                dep_type,
                pattern,
                broken_only,
            } => self.revdep_matches(*dep_type, pattern, *broken_only, pkg, ver),
            Matcher::Provides(inner) => ver.is_some_and(|v| {
                cat.provides(v)
                    .iter()
                    .any(|prv| self.matches_package(inner, prv.package))
            }),
            Matcher::ReverseProvides(inner) => cat
                .providers(pkg)
                .iter()
                .any(|prv| self.matches(inner, prv.owner, Some(prv.owner_ver))),
            Matcher::Widen(inner) => self.matches_package(inner, pkg),
            Matcher::Narrow { filter, pattern } => {
                self.matches(filter, pkg, ver) && self.matches(pattern, pkg, ver)
            }
            // Quantifiers only change package-mode behavior.
            Matcher::AllVersions(inner) | Matcher::AnyVersion(inner) => {
                self.matches(inner, pkg, ver)
            }

            Matcher::Explicit(inner) => {
                self.stack.push(StackValue::Version(pkg, ver));
                let matched = self.matches(inner, pkg, ver);
                self.stack.pop();
                matched
            }
            Matcher::Bind { pattern, variable } => match self.stack_at(*variable) {
                StackValue::Package(p) => self.matches_package(pattern, p),
                StackValue::Version(p, v) => self.matches(pattern, p, v),
            },
            Matcher::Equal(variable) => self
                .stack_at(*variable)
                .is_match_for(StackValue::Version(pkg, ver)),
        }
    }

    pub(crate) fn get_match(
        &mut self,
        m: &Matcher,
        pkg: PkgId,
        ver: Option<VerId>,
    ) -> Option<MatchResult> {
        let cat = self.catalog;
        match m {
            Matcher::Name(p) => p.capture(cat.name(pkg)),
            Matcher::Description(p) => ver
                .and_then(|v| cat.long_description(v))
                .and_then(|d| p.capture(d)),
            Matcher::Maintainer(p) => {
                ver.and_then(|v| cat.maintainer(v)).and_then(|s| p.capture(s))
            }
            Matcher::Section(p) => ver.and_then(|v| cat.section(v)).and_then(|s| p.capture(s)),
            Matcher::Version(p) => ver.and_then(|v| p.capture(cat.version_string(v))),
            Matcher::Archive(p) => ver.and_then(|v| {
                cat.files(v)
                    .iter()
                    .filter(|f| !f.archive.is_empty())
                    .find_map(|f| p.capture(&f.archive))
            }),
            Matcher::Origin(p) => ver.and_then(|v| {
                cat.files(v)
                    .iter()
                    .filter(|f| !f.origin.is_empty())
                    .find_map(|f| p.capture(&f.origin))
            }),
            Matcher::SourcePackage(p) => {
                ver.and_then(|v| self.source_field_match(p, v, |f| &f.source_package, cat.name(pkg)))
            }
            Matcher::SourceVersion(p) => ver.and_then(|v| {
                self.source_field_match(p, v, |f| &f.source_version, cat.version_string(v))
            }),
            Matcher::Task(p) => cat.tasks(pkg).iter().find_map(|t| p.capture(t)),
            Matcher::Tag(p) => cat.debtags(pkg).iter().find_map(|t| p.capture(t)),
            Matcher::UserTag(p) => self.user_tag_match(p, pkg),

            Matcher::CurrentVersion | Matcher::CandidateVersion | Matcher::TargetVersion => {
                if self.matches(m, pkg, ver) {
                    Some(MatchResult::unitary(cat.version_string(ver?)))
                } else {
                    None
                }
            }
            Matcher::Installed => self
                .matches(m, pkg, ver)
                .then(|| MatchResult::unitary("Installed")),

            Matcher::Priority(_) => {
                if self.matches(m, pkg, ver) {
                    let v = ver?;
                    Some(MatchResult::unitary(cat.priority_name(cat.priority(v))))
                } else {
                    None
                }
            }
            Matcher::Automatic => self
                .matches(m, pkg, ver)
                .then(|| MatchResult::unitary("Automatically Installed")),
            Matcher::Broken => self
                .matches(m, pkg, ver)
                .then(|| MatchResult::unitary("Broken")),
            Matcher::BrokenDep(dep_type) => {
                let v = ver?;
                cat.deps(v)
                    .iter()
                    .find(|g| dep_type.selects(g.dep_type) && !g.install_satisfied)
                    .map(|g| self.dep_render(g))
            }
            Matcher::Action { kind, .. } => {
                if !self.matches(m, pkg, ver) {
                    return None;
                }
                Some(MatchResult::unitary(match kind {
                    ActionKind::Install => "Install",
                    ActionKind::Upgrade => "Upgrade",
                    ActionKind::Downgrade => "Downgrade",
                    ActionKind::Remove => "Remove",
                    ActionKind::Reinstall => "Reinstall",
                    ActionKind::Hold => "Hold",
                }))
            }
            Matcher::Keep => self
                .matches(m, pkg, ver)
                .then(|| MatchResult::unitary("Keep")),
            Matcher::Virtual => ver
                .is_none()
                .then(|| MatchResult::unitary("Virtual")),
            Matcher::Essential => self
                .matches(m, pkg, ver)
                .then(|| MatchResult::unitary("Essential")),
            Matcher::ConfigFiles => self
                .matches(m, pkg, ver)
                .then(|| MatchResult::unitary("Config Files Remain")),
            Matcher::New => self
                .matches(m, pkg, ver)
                .then(|| MatchResult::unitary("New Package")),
            Matcher::Upgradable => self
                .matches(m, pkg, ver)
                .then(|| MatchResult::unitary("Upgradable")),
            Matcher::Obsolete => self
                .matches(m, pkg, ver)
                .then(|| MatchResult::unitary("Obsolete")),
            Matcher::Garbage => self
                .matches(m, pkg, ver)
                .then(|| MatchResult::unitary("Garbage")),
            Matcher::True => Some(MatchResult::empty()),
            Matcher::False => None,
            Matcher::Const(pinned) => {
                (pkg == *pinned).then(|| MatchResult::unitary(cat.name(pkg)))
            }

            Matcher::And(a, b) => {
                let first = self.get_match(a, pkg, ver)?;
                let second = self.get_match(b, pkg, ver)?;
                Some(MatchResult::pair(first, second))
            }
            Matcher::Or(a, b) => self
                .get_match(a, pkg, ver)
                .or_else(|| self.get_match(b, pkg, ver)),
            // Negating a failed match has no natural capture, so a
            // successful `?not` reports the empty result.
            Matcher::Not(inner) => match self.get_match(inner, pkg, ver) {
                Some(_) => None,
                None => Some(MatchResult::empty()),
            },
            Matcher::Depends {
                dep_type,
                pattern,
                broken_only,
            } => self.dep_get_match(*dep_type, pattern, *broken_only, ver),
            Matcher::RevDepends {
                dep_type,
                pattern,
                broken_only,
            } => self.revdep_get_match(*dep_type, pattern, *broken_only, pkg, ver),
            Matcher::Provides(inner) => {
                let v = ver?;
                for prv in cat.provides(v) {
                    if let Some(r) = self.get_match(inner, prv.package, None) {
                        return Some(MatchResult::pair(r, MatchResult::unitary("Provides")));
                    }
                }
                None
            }
            Matcher::ReverseProvides(inner) => {
                for prv in cat.providers(pkg) {
                    if let Some(r) = self.get_match(inner, prv.owner, Some(prv.owner_ver)) {
                        return Some(MatchResult::pair(r, MatchResult::unitary("Provided by")));
                    }
                }
                None
            }
            Matcher::Widen(inner) => self.get_match_package(inner, pkg),
            Matcher::Narrow { filter, pattern } => {
                if self.matches(filter, pkg, ver) {
                    self.get_match(pattern, pkg, ver)
                } else {
                    None
                }
            }
            Matcher::AllVersions(inner) | Matcher::AnyVersion(inner) => {
                self.get_match(inner, pkg, ver)
            }

            Matcher::Explicit(inner) => {
                self.stack.push(StackValue::Version(pkg, ver));
                let result = self.get_match(inner, pkg, ver);
                self.stack.pop();
                result
            }
            Matcher::Bind { pattern, variable } => match self.stack_at(*variable) {
                StackValue::Package(p) => self.get_match_package(pattern, p),
                StackValue::Version(p, v) => self.get_match(pattern, p, v),
            },
            Matcher::Equal(variable) => self
                .stack_at(*variable)
                .is_match_for(StackValue::Version(pkg, ver))
                .then(MatchResult::empty),
        }
    }

    // ---------- Package mode ----------

    pub(crate) fn matches_package(&mut self, m: &Matcher, pkg: PkgId) -> bool {
        match m {
            Matcher::And(a, b) => self.matches_package(a, pkg) && self.matches_package(b, pkg),
            Matcher::Or(a, b) => self.matches_package(a, pkg) || self.matches_package(b, pkg),
            Matcher::Not(inner) => !self.matches_package(inner, pkg),
            Matcher::Widen(inner) => self.matches_package(inner, pkg),
            Matcher::Explicit(inner) => {
                self.stack.push(StackValue::Package(pkg));
                let matched = self.matches_package(inner, pkg);
                self.stack.pop();
                matched
            }
            Matcher::Bind { pattern, variable } => match self.stack_at(*variable) {
                StackValue::Package(p) => self.matches_package(pattern, p),
                StackValue::Version(p, v) => self.matches(pattern, p, v),
            },
            Matcher::AllVersions(inner) => {
                let versions = self.catalog.versions(pkg);
                versions.iter().all(|&v| self.matches(inner, pkg, Some(v)))
            }
            Matcher::AnyVersion(inner) => {
                let versions = self.catalog.versions(pkg);
                versions.iter().any(|&v| self.matches(inner, pkg, Some(v)))
            }
            _ => {
                let versions = self.catalog.versions(pkg);
                for &v in versions {
                    if self.matches(m, pkg, Some(v)) {
                        return true;
                    }
                }
                versions.is_empty() && self.matches(m, pkg, None)
            }
        }
    }

    pub(crate) fn get_match_package(&mut self, m: &Matcher, pkg: PkgId) -> Option<MatchResult> {
        match m {
            Matcher::And(a, b) => {
                let first = self.get_match_package(a, pkg)?;
                let second = self.get_match_package(b, pkg)?;
                Some(MatchResult::pair(first, second))
            }
            Matcher::Or(a, b) => self
                .get_match_package(a, pkg)
                .or_else(|| self.get_match_package(b, pkg)),
            Matcher::Not(inner) => match self.get_match_package(inner, pkg) {
                Some(_) => None,
                None => Some(MatchResult::empty()),
            },
            Matcher::Widen(inner) => self.get_match_package(inner, pkg),
            Matcher::Explicit(inner) => {
                self.stack.push(StackValue::Package(pkg));
                let result = self.get_match_package(inner, pkg);
                self.stack.pop();
                result
            }
            Matcher::Bind { pattern, variable } => match self.stack_at(*variable) {
                StackValue::Package(p) => self.get_match_package(pattern, p),
                StackValue::Version(p, v) => self.get_match(pattern, p, v),
            },
            // Reports the result of the last version so that a later part
            // of the search expression can still select a string. A
            // version-less package satisfies the quantifier vacuously.
            Matcher::AllVersions(inner) => {
                let mut last = Some(MatchResult::empty());
                let versions = self.catalog.versions(pkg);
                for &v in versions {
                    last = self.get_match(inner, pkg, Some(v));
                    last.as_ref()?;
                }
                last
            }
            Matcher::AnyVersion(inner) => {
                let versions = self.catalog.versions(pkg);
                versions
                    .iter()
                    .find_map(|&v| self.get_match(inner, pkg, Some(v)))
            }
            _ => {
                let versions = self.catalog.versions(pkg);
                for &v in versions {
                    if let Some(r) = self.get_match(m, pkg, Some(v)) {
                        return Some(r);
                    }
                }
                if versions.is_empty() {
                    self.get_match(m, pkg, None)
                } else {
                    None
                }
            }
        }
    }

    // ---------- Shared predicate plumbing ----------

    /// Source-package / source-version lookup across file records. Records
    /// with an empty field fall back to `fallback` (the binary package
    /// name or version), checked at most once; the scan continues past
    /// non-matching records.
    fn source_field_match(
        &self,
        p: &StrMatcher,
        ver: VerId,
        field: impl Fn(&FileRecord) -> &str,
        fallback: &str,
    ) -> Option<MatchResult> {
        let mut checked_fallback = false;
        for record in self.catalog.files(ver) {
            let value = field(record);
            if value.is_empty() {
                if !checked_fallback {
                    checked_fallback = true;
                    if let Some(r) = p.capture(fallback) {
                        return Some(r);
                    }
                }
            } else if let Some(r) = p.capture(value) {
                return Some(r);
            }
        }
        None
    }

    /// User-tag lookup with the per-call memo: the capture for a given
    /// (pattern, tag) pair is computed once per evaluator.
    fn user_tag_match(&mut self, p: &StrMatcher, pkg: PkgId) -> Option<MatchResult> {
        let cat = self.catalog;
        for &tag in cat.user_tags(pkg) {
            let key = (p.source().to_string(), tag);
            if let Some(cached) = self.user_tag_memo.get(&key) {
                if cached.is_some() {
                    return cached.clone();
                }
                continue;
            }
            let result = p.capture(cat.user_tag_name(tag));
            self.user_tag_memo.insert(key, result.clone());
            if result.is_some() {
                return result;
            }
        }
        None
    }

    fn dep_matches(
        &mut self,
        dep_type: DepType,
        pattern: &Matcher,
        broken_only: bool,
        ver: Option<VerId>,
    ) -> bool {
        let cat = self.catalog;
        let Some(v) = ver else { return false };
        for group in cat.deps(v) {
            if !dep_type.selects(group.dep_type) {
                continue;
            }
            if broken_only && group.install_satisfied {
                continue;
            }
            for target in &group.targets {
                if self.dep_target_matches(pattern, target) {
                    return true;
                }
            }
        }
        false
    }

    /// Try `pattern` against a dependency target: against the bare package
    /// when it has no versions, otherwise against each version satisfying
    /// the constraint.
    fn dep_target_matches(&mut self, pattern: &Matcher, target: &DepTarget) -> bool {
        let versions = self.catalog.versions(target.target);
        if versions.is_empty() {
            return self.matches(pattern, target.target, None);
        }
        for &tv in versions {
            if self.constraint_admits(tv, target) && self.matches(pattern, target.target, Some(tv))
            {
                return true;
            }
        }
        false
    }

    fn dep_get_match(
        &mut self,
        dep_type: DepType,
        pattern: &Matcher,
        broken_only: bool,
        ver: Option<VerId>,
    ) -> Option<MatchResult> {
        let cat = self.catalog;
        let v = ver?;
        for group in cat.deps(v) {
            if !dep_type.selects(group.dep_type) {
                continue;
            }
            if broken_only && group.install_satisfied {
                continue;
            }
            for target in &group.targets {
                if let Some(r) = self.dep_target_get_match(pattern, target) {
                    return Some(MatchResult::pair(r, self.dep_render(group)));
                }
            }
        }
        None
    }

    fn dep_target_get_match(
        &mut self,
        pattern: &Matcher,
        target: &DepTarget,
    ) -> Option<MatchResult> {
        let versions = self.catalog.versions(target.target);
        if versions.is_empty() {
            return self.get_match(pattern, target.target, None);
        }
        for &tv in versions {
            if self.constraint_admits(tv, target) {
                if let Some(r) = self.get_match(pattern, target.target, Some(tv)) {
                    return Some(r);
                }
            }
        }
        None
    }

    fn revdep_matches(
        &mut self,
        dep_type: DepType,
        pattern: &Matcher,
        broken_only: bool,
        pkg: PkgId,
        ver: Option<VerId>,
    ) -> bool {
        let cat = self.catalog;
        for rd in cat.rev_deps(pkg) {
            if broken_only && rd.group.install_satisfied {
                continue;
            }
            if !dep_type.selects(rd.group.dep_type) {
                continue;
            }
            if self.revdep_constraint_admits(&rd.target().constraint, ver)
                && self.matches(pattern, rd.group.parent, rd.group.parent_ver)
            {
                return true;
            }
        }

        // Dependencies reaching this version through a virtual name it
        // provides; only unversioned dependencies can match there.
        if let Some(v) = ver {
            for prv in cat.provides(v) {
                for rd in cat.rev_deps(prv.package) {
                    if broken_only && rd.group.install_satisfied {
                        continue;
                    }
                    if rd.group.dep_type == dep_type
                        && rd.target().constraint.is_none()
                        && self.matches(pattern, rd.group.parent, rd.group.parent_ver)
                    {
                        return true;
                    }
                }
            }
        }

        false
    }

    fn revdep_get_match(
        &mut self,
        dep_type: DepType,
        pattern: &Matcher,
        broken_only: bool,
        pkg: PkgId,
        ver: Option<VerId>,
    ) -> Option<MatchResult> {
        let cat = self.catalog;
        for rd in cat.rev_deps(pkg) {
            if broken_only && rd.group.install_satisfied {
                continue;
            }
            if !dep_type.selects(rd.group.dep_type) {
                continue;
            }
            if self.revdep_constraint_admits(&rd.target().constraint, ver) {
                if let Some(r) = self.matches_parent(pattern, &rd.group) {
                    return Some(MatchResult::pair(r, self.dep_render(&rd.group)));
                }
            }
        }

        if let Some(v) = ver {
            for prv in cat.provides(v) {
                for rd in cat.rev_deps(prv.package) {
                    if broken_only && rd.group.install_satisfied {
                        continue;
                    }
                    if rd.group.dep_type == dep_type && rd.target().constraint.is_none() {
                        if let Some(r) = self.matches_parent(pattern, &rd.group) {
                            return Some(MatchResult::pair(r, self.dep_render(&rd.group)));
                        }
                    }
                }
            }
        }

        None
    }

    fn matches_parent(&mut self, pattern: &Matcher, group: &DepGroup) -> Option<MatchResult> {
        self.get_match(pattern, group.parent, group.parent_ver)
    }

    fn constraint_admits(&self, tv: VerId, target: &DepTarget) -> bool {
        match &target.constraint {
            None => true,
            Some(c) => {
                self.catalog
                    .version_check(self.catalog.version_string(tv), c.op, &c.version)
            }
        }
    }

    fn revdep_constraint_admits(
        &self,
        constraint: &Option<VersionConstraint>,
        ver: Option<VerId>,
    ) -> bool {
        match constraint {
            None => true,
            Some(c) => ver.is_some_and(|v| {
                self.catalog
                    .version_check(self.catalog.version_string(v), c.op, &c.version)
            }),
        }
    }

    /// Render a dependency group the way search results show it:
    /// `(DepType, "pkg (op ver) | alt ...")`.
    fn dep_render(&self, group: &DepGroup) -> MatchResult {
        let mut realization = String::new();
        for (i, target) in group.targets.iter().enumerate() {
            if i > 0 {
                realization.push_str(" | ");
            }
            realization.push_str(self.catalog.name(target.target));
            if let Some(c) = &target.constraint {
                realization.push_str(&format!(" ({} {})", c.op, c.version));
            }
        }
        MatchResult::pair(
            MatchResult::unitary(group.dep_type.to_string()),
            MatchResult::unitary(realization),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DepType, MemCatalog, Priority, VersionConstraint, VersionOp};
    use crate::pattern::parse::{parse_pattern, ParseOptions};

    fn compile(input: &str) -> Matcher {
        parse_pattern(input, &ParseOptions::new())
            .unwrap()
            .expect("blank pattern")
    }

    /// apt 1.0 (installed, admin) depends on libapt; libapt 1.0 (libs)
    /// provides ghost; ghost is purely virtual.
    fn fixture() -> (MemCatalog, PkgId, PkgId, PkgId) {
        let mut cat = MemCatalog::new();
        let apt = cat.add_package("apt");
        let apt1 = cat.add_version(apt, "1.0");
        cat.set_section(apt1, "admin");
        cat.set_current(apt, apt1);

        let libapt = cat.add_package("libapt");
        let libapt1 = cat.add_version(libapt, "1.0");
        cat.set_section(libapt1, "libs");

        let ghost = cat.add_package("ghost");
        cat.add_provide(libapt1, ghost);
        cat.add_dep(apt1, DepType::Depends, &[(libapt, None)]);

        (cat, apt, libapt, ghost)
    }

    fn matches(cat: &MemCatalog, m: &Matcher, pkg: PkgId) -> bool {
        Evaluator::new(cat).matches_package(m, pkg)
    }

    #[test]
    fn test_stack_value_relation() {
        let p0 = PkgId(0);
        let p1 = PkgId(1);
        let v0 = VerId(0);
        let v1 = VerId(1);

        let pkg = StackValue::Package(p0);
        let ver = StackValue::Version(p0, Some(v0));
        let other_ver = StackValue::Version(p0, Some(v1));

        // Reflexive and symmetric.
        assert!(pkg.is_match_for(pkg));
        assert!(ver.is_match_for(ver));
        assert!(pkg.is_match_for(ver) && ver.is_match_for(pkg));
        // Not transitive: both versions match the package, not each other.
        assert!(pkg.is_match_for(other_ver));
        assert!(!ver.is_match_for(other_ver));
        assert!(!pkg.is_match_for(StackValue::Package(p1)));
    }

    #[test]
    fn test_name_matches_regardless_of_version() {
        let (cat, apt, libapt, ghost) = fixture();
        let m = compile("~napt");
        assert!(matches(&cat, &m, apt));
        assert!(matches(&cat, &m, libapt));
        assert!(!matches(&cat, &m, ghost));
        // Anchored form only hits apt itself.
        let anchored = compile("?name(^apt$)");
        assert!(matches(&cat, &anchored, apt));
        assert!(!matches(&cat, &anchored, libapt));
    }

    #[test]
    fn test_section_and_installed() {
        let (cat, apt, libapt, _) = fixture();
        assert!(matches(&cat, &compile("?section(libs)"), libapt));
        assert!(!matches(&cat, &compile("?section(libs)"), apt));
        assert!(matches(&cat, &compile("~i"), apt));
        assert!(!matches(&cat, &compile("~i"), libapt));
    }

    #[test]
    fn test_virtual_matches_versionless_package() {
        let (cat, apt, _, ghost) = fixture();
        assert!(matches(&cat, &compile("~v"), ghost));
        assert!(!matches(&cat, &compile("~v"), apt));
        // The removed action-view of a real package is also "virtual".
        let mut eval = Evaluator::new(&cat);
        assert!(eval.matches(&compile("~v"), apt, None));
    }

    #[test]
    fn test_description_fails_without_version() {
        let (mut cat, _, _, _) = fixture();
        let pkg = cat.add_package("docd");
        let ver = cat.add_version(pkg, "2.0");
        cat.set_description(ver, "A daemon that serves documentation");
        assert!(matches(&cat, &compile("~ddaemon"), pkg));

        let ghost = cat.add_package("ghost2");
        assert!(!matches(&cat, &compile("~d.*"), ghost));
    }

    #[test]
    fn test_provides_and_reverse_provides() {
        let (cat, apt, libapt, ghost) = fixture();
        let provides = compile("?provides(?name(ghost))");
        assert!(matches(&cat, &provides, libapt));
        assert!(!matches(&cat, &provides, apt));

        let provided_by = compile("?reverse-provides(?name(libapt))");
        assert!(matches(&cat, &provided_by, ghost));
        assert!(!matches(&cat, &provided_by, apt));
    }

    #[test]
    fn test_depends_matcher() {
        let (cat, apt, libapt, _) = fixture();
        let m = compile("?depends(?name(libapt))");
        assert!(matches(&cat, &m, apt));
        assert!(!matches(&cat, &m, libapt));
        // Wrong dependency type does not match.
        assert!(!matches(&cat, &compile("?suggests(?name(libapt))"), apt));
    }

    #[test]
    fn test_depends_respects_version_constraints() {
        let mut cat = MemCatalog::new();
        let app = cat.add_package("app");
        let appv = cat.add_version(app, "1.0");
        let lib = cat.add_package("lib");
        let _old = cat.add_version(lib, "1.0");
        let new = cat.add_version(lib, "2.0");
        cat.set_current(lib, new);
        cat.add_dep(
            appv,
            DepType::Depends,
            &[(
                lib,
                Some(VersionConstraint {
                    op: VersionOp::GreaterEq,
                    version: "2.0".to_string(),
                }),
            )],
        );

        // Only lib 2.0 satisfies the constraint; ~i selects the installed
        // version, which is 2.0, so the dependency matches.
        assert!(matches(&cat, &compile("?depends(~i)"), app));
        // A version pattern that only the excluded version satisfies.
        assert!(!matches(&cat, &compile("?depends(?version(^1\\.0$))"), app));
        assert!(matches(&cat, &compile("?depends(?version(^2\\.0$))"), app));
    }

    #[test]
    fn test_reverse_depends_through_provides() {
        let mut cat = MemCatalog::new();
        let app = cat.add_package("app");
        let appv = cat.add_version(app, "1.0");
        let lib = cat.add_package("lib");
        let libv = cat.add_version(lib, "1.0");
        let virt = cat.add_package("virt");
        cat.add_provide(libv, virt);
        cat.add_dep(appv, DepType::Depends, &[(virt, None)]);

        // app depends on virt, which lib provides; lib therefore has a
        // reverse dependency from app.
        let m = compile("?reverse-depends(?name(app))");
        assert!(matches(&cat, &m, lib));
        assert!(matches(&cat, &m, virt));
    }

    #[test]
    fn test_broken_dep_selection() {
        let mut cat = MemCatalog::new();
        let app = cat.add_package("app");
        let appv = cat.add_version(app, "1.0");
        let gone = cat.add_package("gone");
        cat.add_broken_dep(appv, DepType::PreDepends, &[(gone, None)]);
        cat.state_mut(app).inst_broken = true;

        // PreDepends folds into Depends.
        assert!(matches(&cat, &compile("~Bdepends"), app));
        assert!(!matches(&cat, &compile("~Brecommends"), app));
        assert!(matches(&cat, &compile("~b"), app));
        // The broken-only dep matcher sees it, the satisfied filter hides
        // a satisfied group.
        assert!(matches(&cat, &compile("?broken-depends(?name(gone))"), app));
    }

    #[test]
    fn test_explicit_and_equal() {
        let mut cat = MemCatalog::new();
        let selfish = cat.add_package("selfish");
        let sv = cat.add_version(selfish, "1.0");
        cat.add_dep(sv, DepType::Depends, &[(selfish, None)]);

        let other = cat.add_package("other");
        let ov = cat.add_version(other, "1.0");
        let dep = cat.add_package("dep");
        let _dv = cat.add_version(dep, "1.0");
        cat.add_dep(ov, DepType::Depends, &[(dep, None)]);

        // Matches packages that depend on themselves.
        let m = compile("?for x: ?depends(?=x)");
        assert!(matches(&cat, &m, selfish));
        assert!(!matches(&cat, &m, other));
        assert!(!matches(&cat, &m, dep));
    }

    #[test]
    fn test_stack_is_popped_after_explicit() {
        let (cat, apt, _, _) = fixture();
        let m = compile("?for x: ?=x");
        let mut eval = Evaluator::new(&cat);
        assert!(eval.matches_package(&m, apt));
        assert!(eval.stack.is_empty());
    }

    #[test]
    fn test_bind_redirects_the_input() {
        let mut cat = MemCatalog::new();
        let outer = cat.add_package("outer");
        let ov = cat.add_version(outer, "1.0");
        cat.set_section(ov, "admin");
        let inner = cat.add_package("inner");
        let iv = cat.add_version(inner, "1.0");
        cat.set_section(iv, "libs");
        cat.add_dep(ov, DepType::Depends, &[(inner, None)]);

        // Inside the dep target, ?x:section re-applies to the outer
        // package, not the target.
        let m = compile("?for x: ?depends(?x:section(admin))");
        assert!(matches(&cat, &m, outer));
        let wrong = compile("?for x: ?depends(?x:section(libs))");
        assert!(!matches(&cat, &wrong, outer));
    }

    #[test]
    fn test_widen_and_narrow() {
        let mut cat = MemCatalog::new();
        let pkg = cat.add_package("dual");
        let v1 = cat.add_version(pkg, "1.0");
        let v2 = cat.add_version(pkg, "2.0");
        cat.set_section(v1, "admin");
        cat.set_section(v2, "libs");
        cat.set_current(pkg, v1);

        let mut eval = Evaluator::new(&cat);
        // Version mode pinned to v2: section admin fails...
        assert!(!eval.matches(&compile("?section(admin)"), pkg, Some(v2)));
        // ...but widen escapes to any-version.
        assert!(eval.matches(&compile("?widen(?section(admin))"), pkg, Some(v2)));
        // Narrow restricts which versions the inner pattern may hit.
        assert!(eval.matches_package(&compile("?narrow(~i, ?section(admin))"), pkg));
        assert!(!eval.matches_package(&compile("?narrow(~i, ?section(libs))"), pkg));
    }

    #[test]
    fn test_all_and_any_version_quantifiers() {
        let mut cat = MemCatalog::new();
        let pkg = cat.add_package("dual");
        let v1 = cat.add_version(pkg, "1.0");
        let _v2 = cat.add_version(pkg, "2.0");
        cat.set_current(pkg, v1);

        assert!(matches(&cat, &compile("?any-version(~i)"), pkg));
        assert!(!matches(&cat, &compile("?all-versions(~i)"), pkg));
        assert!(matches(&cat, &compile("?all-versions(?version(.*))"), pkg));
    }

    #[test]
    fn test_action_and_state_flags() {
        let mut cat = MemCatalog::new();
        let pkg = cat.add_package("pending");
        let _v = cat.add_version(pkg, "1.0");
        cat.set_action(pkg, Action::AutoInstall);
        cat.state_mut(pkg).install = true;
        cat.state_mut(pkg).auto = true;

        // An install request covers auto-install.
        assert!(matches(&cat, &compile("?action(install)"), pkg));
        assert!(!matches(&cat, &compile("?action(remove)"), pkg));
        assert!(matches(&cat, &compile("~M"), pkg));

        cat.set_action(pkg, Action::Remove);
        cat.state_mut(pkg).auto = false;
        assert!(matches(&cat, &compile("?action(remove)"), pkg));
        // Purge requires the purge flag on top of the remove action.
        assert!(!matches(&cat, &compile("?action(purge)"), pkg));
        cat.state_mut(pkg).purge = true;
        assert!(matches(&cat, &compile("?action(purge)"), pkg));

        cat.state_mut(pkg).garbage = true;
        assert!(matches(&cat, &compile("~g"), pkg));
    }

    #[test]
    fn test_priority_and_tags() {
        let mut cat = MemCatalog::new();
        let pkg = cat.add_package("core");
        let v = cat.add_version(pkg, "1.0");
        cat.set_priority(v, Priority::Required);
        cat.add_task(pkg, "minimal");
        cat.add_debtag(pkg, "role::program");
        cat.add_user_tag(pkg, "pinned");

        assert!(matches(&cat, &compile("?priority(required)"), pkg));
        assert!(!matches(&cat, &compile("?priority(extra)"), pkg));
        assert!(matches(&cat, &compile("~tminimal"), pkg));
        assert!(matches(&cat, &compile("~Grole::"), pkg));
        assert!(matches(&cat, &compile("?user-tag(pin)"), pkg));
        assert!(!matches(&cat, &compile("?user-tag(^other$)"), pkg));
    }

    #[test]
    fn test_source_package_falls_back_to_name_once() {
        let mut cat = MemCatalog::new();
        let pkg = cat.add_package("binpkg");
        let v = cat.add_version(pkg, "1.0");
        cat.add_file(
            v,
            FileRecord {
                archive: "stable".to_string(),
                ..Default::default()
            },
        );
        cat.add_file(
            v,
            FileRecord {
                archive: "unstable".to_string(),
                source_package: "srcpkg".to_string(),
                source_version: "1.0-src".to_string(),
                ..Default::default()
            },
        );

        // The first record has no source package, so the binary name is
        // tried; the second record still gets its chance afterwards.
        assert!(matches(&cat, &compile("?source-package(^binpkg$)"), pkg));
        assert!(matches(&cat, &compile("?source-package(^srcpkg$)"), pkg));
        assert!(matches(&cat, &compile("?source-version(1\\.0-src)"), pkg));
        assert!(matches(&cat, &compile("~Astable"), pkg));
        assert!(matches(&cat, &compile("~Aunstable"), pkg));
    }

    #[test]
    fn test_get_match_results() {
        let (cat, apt, libapt, _) = fixture();
        let mut eval = Evaluator::new(&cat);

        let name = compile("~napt");
        let r = eval.get_match_package(&name, apt).unwrap();
        assert_eq!(r.groups(), &["apt".to_string()]);

        let section = compile("?section(libs)");
        let r = eval.get_match_package(&section, libapt).unwrap();
        assert_eq!(r.groups(), &["libs".to_string()]);

        let provides = compile("?provides(?name(ghost))");
        let r = eval.get_match_package(&provides, libapt).unwrap();
        assert_eq!(r.groups(), &["ghost".to_string(), "Provides".to_string()]);

        let dep = compile("?depends(?name(libapt))");
        let r = eval.get_match_package(&dep, apt).unwrap();
        assert_eq!(
            r.groups(),
            &[
                "libapt".to_string(),
                "Depends".to_string(),
                "libapt".to_string()
            ]
        );
    }

    #[test]
    fn test_dep_render_includes_constraint_and_alternatives() {
        let mut cat = MemCatalog::new();
        let app = cat.add_package("app");
        let appv = cat.add_version(app, "1.0");
        let liba = cat.add_package("liba");
        let _la = cat.add_version(liba, "2.0");
        let libb = cat.add_package("libb");
        let _lb = cat.add_version(libb, "1.0");
        cat.add_dep(
            appv,
            DepType::Depends,
            &[
                (
                    liba,
                    Some(VersionConstraint {
                        op: VersionOp::GreaterEq,
                        version: "2.0".to_string(),
                    }),
                ),
                (libb, None),
            ],
        );

        let mut eval = Evaluator::new(&cat);
        let m = compile("?depends(?name(liba))");
        let r = eval.get_match_package(&m, app).unwrap();
        assert_eq!(r.group(1), Some("Depends"));
        assert_eq!(r.group(2), Some("liba (>= 2.0) | libb"));
    }

    #[test]
    fn test_not_reports_empty_result_on_success() {
        let (cat, apt, _, _) = fixture();
        let mut eval = Evaluator::new(&cat);
        let m = compile("?not(?section(libs))");
        let r = eval.get_match_package(&m, apt).unwrap();
        assert_eq!(r.num_groups(), 0);
        assert!(eval.get_match_package(&compile("?not(~napt)"), apt).is_none());
    }

    #[test]
    fn test_true_matches_with_empty_result() {
        let (cat, _, _, ghost) = fixture();
        let mut eval = Evaluator::new(&cat);
        assert!(eval.matches_package(&compile("~T"), ghost));
        let r = eval.get_match_package(&compile("~T"), ghost).unwrap();
        assert_eq!(r.num_groups(), 0);
        assert!(eval.get_match_package(&compile("~F"), ghost).is_none());
    }

    #[test]
    fn test_const_matcher_pins_one_package() {
        let (cat, apt, libapt, _) = fixture();
        let m = Matcher::Const(apt);
        assert!(matches(&cat, &m, apt));
        assert!(!matches(&cat, &m, libapt));
        let mut eval = Evaluator::new(&cat);
        let r = eval.get_match_package(&m, apt).unwrap();
        assert_eq!(r.groups(), &["apt".to_string()]);
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let (cat, apt, _, ghost) = fixture();
        // `~m` with no argument: by convention an empty pattern matches
        // anything, so maintainer-less grouping still works.
        let m = compile("?version(.*)");
        assert!(matches(&cat, &m, apt));
        assert!(!matches(&cat, &m, ghost));
    }

    #[test]
    #[should_panic(expected = "variable index")]
    fn test_dangling_variable_index_is_an_invariant_violation() {
        let (cat, apt, _, _) = fixture();
        let mut eval = Evaluator::new(&cat);
        eval.matches(&Matcher::Equal(0), apt, None);
    }
}
