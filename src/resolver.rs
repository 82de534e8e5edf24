//! Dependency resolution classification (spec §4.1, §4.4).
//!
//! `solver.move` rewrites are applied earlier, at recipe-parse time (see
//! `crate::recipe::config`) — by the time a [`Package`] reaches this
//! module its `build_deps` already reflect any reassignment. This module
//! only applies `ignores` regex-full-match exclusion and looks the
//! remainder up in the provider index.
use std::collections::HashMap;

use regex::Regex;

use crate::model::Package;

/// True iff `dep` fully matches one of `pkg.ignores` (spec §4.1: "the
/// *full* match equals one of these"). An invalid regex in `ignores` never
/// matches rather than panicking — `autobuild.yml` validation is the
/// loader's job, not this hot path's.
pub fn is_ignored(pkg: &Package, dep: &str) -> bool {
    pkg.ignores.iter().any(|pattern| {
        Regex::new(&format!("^(?:{pattern})$"))
            .map(|re| re.is_match(dep))
            .unwrap_or(false)
    })
}

/// A package is resolved iff every non-ignored `build_deps` entry is
/// present in `provider_index` (spec §3.1, §8 "Resolver completeness").
pub fn is_resolved(pkg: &Package, provider_index: &HashMap<String, usize>) -> bool {
    pkg.build_deps
        .iter()
        .filter(|dep| !is_ignored(pkg, dep))
        .all(|dep| provider_index.contains_key(dep))
}

/// The subset of `pkg.build_deps` that is neither ignored nor resolvable
/// against `provider_index`, sorted for stable reporting (spec §4.4:
/// unresolved dependencies are reported, never silently dropped).
pub fn unresolved_deps(pkg: &Package, provider_index: &HashMap<String, usize>) -> Vec<String> {
    let mut unresolved: Vec<String> = pkg
        .build_deps
        .iter()
        .filter(|dep| !is_ignored(pkg, dep) && !provider_index.contains_key(dep.as_str()))
        .cloned()
        .collect();
    unresolved.sort();
    unresolved
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use rstest::rstest;

    use super::*;

    fn package(build_deps: &[&str], ignores: &[&str]) -> Package {
        Package {
            source: "pkg".into(),
            names: vec!["pkg".into()],
            version: "1.0".into(),
            release: 1,
            provides: vec!["name(pkg)".into()],
            build_deps: build_deps.iter().map(|s| s.to_string()).collect(),
            ignores: ignores.iter().map(|s| s.to_string()).collect(),
            path: Utf8PathBuf::from("pkg"),
            root: Utf8PathBuf::from("."),
            resolved: false,
        }
    }

    #[rstest]
    #[case(&["q"], &["^q$"], true)]
    #[case(&["q"], &[], false)]
    #[case(&["qq"], &["^q$"], false)]
    fn ignore_pattern_must_fully_match(
        #[case] build_deps: &[&str],
        #[case] ignores: &[&str],
        #[case] expect_ignored: bool,
    ) {
        let pkg = package(build_deps, ignores);
        assert_eq!(is_ignored(&pkg, build_deps[0]), expect_ignored);
    }

    #[test]
    fn resolved_iff_every_non_ignored_dep_is_provided() {
        let pkg = package(&["name(a)", "name(b)"], &["^name\\(b\\)$"]);
        let mut providers = HashMap::new();
        providers.insert("name(a)".to_string(), 0);
        assert!(is_resolved(&pkg, &providers));
        assert!(unresolved_deps(&pkg, &providers).is_empty());
    }

    #[test]
    fn unresolved_deps_reported_sorted() {
        let pkg = package(&["name(z)", "name(a)"], &[]);
        let providers = HashMap::new();
        assert_eq!(unresolved_deps(&pkg, &providers), vec!["name(a)", "name(z)"]);
        assert!(!is_resolved(&pkg, &providers));
    }
}
