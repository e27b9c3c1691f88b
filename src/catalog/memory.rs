//! In-memory [`Catalog`] implementation.
//!
//! Backs the test suite and any embedder that assembles a catalog by hand.
//! Packages and versions are appended through the builder methods; the
//! reverse indices (providers, reverse dependencies) are maintained as the
//! forward edges are added.

use std::collections::HashMap;

use super::{
    Action, Catalog, DepGroup, DepTarget, DepType, FileRecord, PkgId, PkgState, Priority, Provide,
    RevDep, UserTagId, VerId, VersionConstraint, VersionOp,
};

#[derive(Debug, Default)]
struct PkgEntry {
    name: String,
    versions: Vec<VerId>,
    current: Option<VerId>,
    candidate: Option<VerId>,
    target: Option<VerId>,
    state: PkgState,
    essential: bool,
    obsolete: bool,
    tasks: Vec<String>,
    debtags: Vec<String>,
    user_tags: Vec<UserTagId>,
}

#[derive(Debug)]
struct VerEntry {
    package: PkgId,
    version: String,
    section: Option<String>,
    priority: Priority,
    maintainer: Option<String>,
    description: Option<String>,
    files: Vec<FileRecord>,
    deps: Vec<DepGroup>,
    provides: Vec<Provide>,
}

/// A package database held entirely in memory.
#[derive(Debug, Default)]
pub struct MemCatalog {
    packages: Vec<PkgEntry>,
    versions: Vec<VerEntry>,
    user_tag_names: Vec<String>,
    providers_of: HashMap<PkgId, Vec<Provide>>,
}

impl MemCatalog {
    pub fn new() -> MemCatalog {
        MemCatalog::default()
    }

    /// Register a package. Names are not deduplicated; callers hold the id.
    pub fn add_package(&mut self, name: &str) -> PkgId {
        let id = PkgId(self.packages.len() as u32);
        self.packages.push(PkgEntry {
            name: name.to_string(),
            ..PkgEntry::default()
        });
        id
    }

    /// Register a version of `pkg`, appended after any existing versions.
    pub fn add_version(&mut self, pkg: PkgId, version: &str) -> VerId {
        let id = VerId(self.versions.len() as u32);
        self.versions.push(VerEntry {
            package: pkg,
            version: version.to_string(),
            section: None,
            priority: Priority::Optional,
            maintainer: None,
            description: None,
            files: Vec::new(),
            deps: Vec::new(),
            provides: Vec::new(),
        });
        self.pkg_mut(pkg).versions.push(id);
        id
    }

    pub fn set_current(&mut self, pkg: PkgId, ver: VerId) {
        self.pkg_mut(pkg).current = Some(ver);
    }

    pub fn set_candidate(&mut self, pkg: PkgId, ver: VerId) {
        self.pkg_mut(pkg).candidate = Some(ver);
    }

    pub fn set_target(&mut self, pkg: PkgId, ver: VerId) {
        self.pkg_mut(pkg).target = Some(ver);
    }

    pub fn set_section(&mut self, ver: VerId, section: &str) {
        self.ver_mut(ver).section = Some(section.to_string());
    }

    pub fn set_priority(&mut self, ver: VerId, priority: Priority) {
        self.ver_mut(ver).priority = priority;
    }

    pub fn set_maintainer(&mut self, ver: VerId, maintainer: &str) {
        self.ver_mut(ver).maintainer = Some(maintainer.to_string());
    }

    pub fn set_description(&mut self, ver: VerId, description: &str) {
        self.ver_mut(ver).description = Some(description.to_string());
    }

    pub fn add_file(&mut self, ver: VerId, record: FileRecord) {
        self.ver_mut(ver).files.push(record);
    }

    /// Declare a dependency or-group on `ver`, satisfied at install time.
    pub fn add_dep(
        &mut self,
        ver: VerId,
        dep_type: DepType,
        targets: &[(PkgId, Option<VersionConstraint>)],
    ) {
        self.add_dep_group(ver, dep_type, targets, true);
    }

    /// Declare a dependency or-group that the planned actions leave broken.
    pub fn add_broken_dep(
        &mut self,
        ver: VerId,
        dep_type: DepType,
        targets: &[(PkgId, Option<VersionConstraint>)],
    ) {
        self.add_dep_group(ver, dep_type, targets, false);
    }

    fn add_dep_group(
        &mut self,
        ver: VerId,
        dep_type: DepType,
        targets: &[(PkgId, Option<VersionConstraint>)],
        install_satisfied: bool,
    ) {
        let parent = self.versions[ver.0 as usize].package;
        let group = DepGroup {
            dep_type,
            parent,
            parent_ver: Some(ver),
            targets: targets
                .iter()
                .map(|(target, constraint)| DepTarget {
                    target: *target,
                    constraint: constraint.clone(),
                })
                .collect(),
            install_satisfied,
        };
        self.ver_mut(ver).deps.push(group);
    }

    /// Record that `ver` provides the (virtual) package `virtual_pkg`.
    pub fn add_provide(&mut self, ver: VerId, virtual_pkg: PkgId) {
        let owner = self.versions[ver.0 as usize].package;
        let edge = Provide {
            package: virtual_pkg,
            owner,
            owner_ver: ver,
        };
        self.ver_mut(ver).provides.push(edge);
        self.providers_of.entry(virtual_pkg).or_default().push(edge);
    }

    pub fn state_mut(&mut self, pkg: PkgId) -> &mut PkgState {
        &mut self.pkg_mut(pkg).state
    }

    pub fn set_action(&mut self, pkg: PkgId, action: Action) {
        self.pkg_mut(pkg).state.action = action;
    }

    pub fn set_essential(&mut self, pkg: PkgId) {
        self.pkg_mut(pkg).essential = true;
    }

    pub fn set_obsolete(&mut self, pkg: PkgId) {
        self.pkg_mut(pkg).obsolete = true;
    }

    pub fn add_task(&mut self, pkg: PkgId, task: &str) {
        self.pkg_mut(pkg).tasks.push(task.to_string());
    }

    pub fn add_debtag(&mut self, pkg: PkgId, tag: &str) {
        self.pkg_mut(pkg).debtags.push(tag.to_string());
    }

    /// Attach a user tag, interning the name if it is new.
    pub fn add_user_tag(&mut self, pkg: PkgId, tag: &str) {
        let id = match self.user_tag_names.iter().position(|t| t == tag) {
            Some(i) => UserTagId(i as u32),
            None => {
                self.user_tag_names.push(tag.to_string());
                UserTagId((self.user_tag_names.len() - 1) as u32)
            }
        };
        self.pkg_mut(pkg).user_tags.push(id);
    }

    fn pkg_mut(&mut self, pkg: PkgId) -> &mut PkgEntry {
        &mut self.packages[pkg.0 as usize]
    }

    fn ver_mut(&mut self, ver: VerId) -> &mut VerEntry {
        &mut self.versions[ver.0 as usize]
    }

    fn pkg(&self, pkg: PkgId) -> &PkgEntry {
        &self.packages[pkg.0 as usize]
    }

    fn ver(&self, ver: VerId) -> &VerEntry {
        &self.versions[ver.0 as usize]
    }
}

impl Catalog for MemCatalog {
    fn packages(&self) -> Vec<PkgId> {
        (0..self.packages.len() as u32).map(PkgId).collect()
    }

    fn name(&self, pkg: PkgId) -> &str {
        &self.pkg(pkg).name
    }

    fn versions(&self, pkg: PkgId) -> &[VerId] {
        &self.pkg(pkg).versions
    }

    fn current_version(&self, pkg: PkgId) -> Option<VerId> {
        self.pkg(pkg).current
    }

    fn candidate_version(&self, pkg: PkgId) -> Option<VerId> {
        self.pkg(pkg).candidate
    }

    fn target_version(&self, pkg: PkgId) -> Option<VerId> {
        self.pkg(pkg).target
    }

    fn version_string(&self, ver: VerId) -> &str {
        &self.ver(ver).version
    }

    fn section(&self, ver: VerId) -> Option<&str> {
        self.ver(ver).section.as_deref()
    }

    fn priority(&self, ver: VerId) -> Priority {
        self.ver(ver).priority
    }

    fn maintainer(&self, ver: VerId) -> Option<&str> {
        self.ver(ver).maintainer.as_deref()
    }

    fn long_description(&self, ver: VerId) -> Option<&str> {
        self.ver(ver).description.as_deref()
    }

    fn files(&self, ver: VerId) -> &[FileRecord] {
        &self.ver(ver).files
    }

    fn deps(&self, ver: VerId) -> &[DepGroup] {
        &self.ver(ver).deps
    }

    fn rev_deps(&self, pkg: PkgId) -> Vec<RevDep> {
        let mut edges = Vec::new();
        for entry in &self.versions {
            for group in &entry.deps {
                for (index, target) in group.targets.iter().enumerate() {
                    if target.target == pkg {
                        edges.push(RevDep {
                            group: group.clone(),
                            index,
                        });
                    }
                }
            }
        }
        edges
    }

    fn provides(&self, ver: VerId) -> &[Provide] {
        &self.ver(ver).provides
    }

    fn providers(&self, pkg: PkgId) -> &[Provide] {
        self.providers_of.get(&pkg).map_or(&[], |v| v.as_slice())
    }

    fn state(&self, pkg: PkgId) -> PkgState {
        self.pkg(pkg).state
    }

    fn essential(&self, pkg: PkgId) -> bool {
        self.pkg(pkg).essential
    }

    fn obsolete(&self, pkg: PkgId) -> bool {
        self.pkg(pkg).obsolete
    }

    fn tasks(&self, pkg: PkgId) -> &[String] {
        &self.pkg(pkg).tasks
    }

    fn debtags(&self, pkg: PkgId) -> &[String] {
        &self.pkg(pkg).debtags
    }

    fn user_tags(&self, pkg: PkgId) -> &[UserTagId] {
        &self.pkg(pkg).user_tags
    }

    fn user_tag_name(&self, tag: UserTagId) -> &str {
        &self.user_tag_names[tag.0 as usize]
    }

    fn version_check(&self, lhs: &str, op: VersionOp, rhs: &str) -> bool {
        use std::cmp::Ordering;
        let ord = compare_versions(lhs, rhs);
        match op {
            VersionOp::Less => ord == Ordering::Less,
            VersionOp::LessEq => ord != Ordering::Greater,
            VersionOp::Equal => ord == Ordering::Equal,
            VersionOp::GreaterEq => ord != Ordering::Less,
            VersionOp::Greater => ord == Ordering::Greater,
        }
    }

    fn priority_name(&self, priority: Priority) -> &str {
        priority.as_str()
    }
}

/// Debian-flavored version comparison.
///
/// Alternates between non-digit and digit runs: non-digit runs compare
/// bytewise with `~` sorting before everything (including end-of-string),
/// digit runs compare numerically. No epoch handling; test catalogs do not
/// use epochs.
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0, 0);

    loop {
        // Non-digit run.
        loop {
            let ca = a.get(i).copied().filter(|c| !c.is_ascii_digit());
            let cb = b.get(j).copied().filter(|c| !c.is_ascii_digit());
            match (ca, cb) {
                (None, None) => break,
                (Some(b'~'), Some(b'~')) => {}
                (Some(b'~'), _) => return Ordering::Less,
                (_, Some(b'~')) => return Ordering::Greater,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(x), Some(y)) => match x.cmp(&y) {
                    Ordering::Equal => {}
                    other => return other,
                },
            }
            if ca.is_some() {
                i += 1;
            }
            if cb.is_some() {
                j += 1;
            }
        }

        if i >= a.len() && j >= b.len() {
            return Ordering::Equal;
        }

        // Digit run: skip leading zeros, compare by length then bytewise.
        let na_start = i;
        while i < a.len() && a[i].is_ascii_digit() {
            i += 1;
        }
        let nb_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        let na = trim_zeros(&a[na_start..i]);
        let nb = trim_zeros(&b[nb_start..j]);
        match na.len().cmp(&nb.len()).then_with(|| na.cmp(nb)) {
            Ordering::Equal => {}
            other => return other,
        }
    }
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let start = digits.iter().take_while(|&&d| d == b'0').count();
    &digits[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_compare_versions_numeric() {
        assert_eq!(compare_versions("1.0", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.2", "1.10"), Ordering::Less);
        assert_eq!(compare_versions("2.0", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.01", "1.1"), Ordering::Equal);
    }

    #[test]
    fn test_compare_versions_tilde_sorts_first() {
        assert_eq!(compare_versions("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0", "1.0~rc1"), Ordering::Greater);
        assert_eq!(compare_versions("1.0~a", "1.0~b"), Ordering::Less);
    }

    #[test]
    fn test_compare_versions_suffix() {
        assert_eq!(compare_versions("1.0", "1.0a"), Ordering::Less);
        assert_eq!(compare_versions("1.0-1", "1.0-2"), Ordering::Less);
    }

    #[test]
    fn test_version_check_ops() {
        let cat = MemCatalog::new();
        assert!(cat.version_check("1.0", VersionOp::Less, "2.0"));
        assert!(cat.version_check("1.0", VersionOp::LessEq, "1.0"));
        assert!(cat.version_check("1.0", VersionOp::Equal, "1.0"));
        assert!(!cat.version_check("1.0", VersionOp::Greater, "1.0"));
        assert!(cat.version_check("2.0", VersionOp::GreaterEq, "1.5"));
    }

    #[test]
    fn test_builder_round_trip() {
        let mut cat = MemCatalog::new();
        let apt = cat.add_package("apt");
        let v1 = cat.add_version(apt, "1.0");
        cat.set_section(v1, "admin");
        cat.set_current(apt, v1);
        cat.add_task(apt, "minimal");
        cat.add_user_tag(apt, "pinned");

        assert_eq!(cat.name(apt), "apt");
        assert_eq!(cat.versions(apt), &[v1]);
        assert_eq!(cat.current_version(apt), Some(v1));
        assert_eq!(cat.section(v1), Some("admin"));
        assert_eq!(cat.tasks(apt), &["minimal".to_string()]);
        let tags = cat.user_tags(apt);
        assert_eq!(tags.len(), 1);
        assert_eq!(cat.user_tag_name(tags[0]), "pinned");
    }

    #[test]
    fn test_user_tags_interned() {
        let mut cat = MemCatalog::new();
        let a = cat.add_package("a");
        let b = cat.add_package("b");
        cat.add_user_tag(a, "shared");
        cat.add_user_tag(b, "shared");
        assert_eq!(cat.user_tags(a), cat.user_tags(b));
    }

    #[test]
    fn test_provides_reverse_index() {
        let mut cat = MemCatalog::new();
        let lib = cat.add_package("libapt");
        let v1 = cat.add_version(lib, "1.0");
        let ghost = cat.add_package("ghost");
        cat.add_provide(v1, ghost);

        assert_eq!(cat.provides(v1).len(), 1);
        assert_eq!(cat.provides(v1)[0].package, ghost);
        let providers = cat.providers(ghost);
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].owner, lib);
        assert_eq!(providers[0].owner_ver, v1);
        assert!(cat.providers(lib).is_empty());
    }

    #[test]
    fn test_rev_deps() {
        let mut cat = MemCatalog::new();
        let apt = cat.add_package("apt");
        let apt1 = cat.add_version(apt, "1.0");
        let lib = cat.add_package("libapt");
        let _lib1 = cat.add_version(lib, "1.0");
        cat.add_dep(apt1, DepType::Depends, &[(lib, None)]);

        let rdeps = cat.rev_deps(lib);
        assert_eq!(rdeps.len(), 1);
        assert_eq!(rdeps[0].group.parent, apt);
        assert_eq!(rdeps[0].group.parent_ver, Some(apt1));
        assert_eq!(rdeps[0].target().target, lib);
        assert!(cat.rev_deps(apt).is_empty());
    }
}
