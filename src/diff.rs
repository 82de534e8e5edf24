//! `StateDiff` (spec §4.9).
//!
//! Grounded on `original_source/state/{state,diff}.go`'s `Changed`/`Diff`
//! (`IsSame`, `IsNewRel`, `IsDowngrade`), generalized from the original's
//! new/changed split into the five classifiers spec §3.4 requires.
use crate::model::{Diff, State};

/// Diff every source present in `new` against its counterpart (if any) in
/// `old`, keyed by the *representative* subpackage (the first in
/// `source_index` order) — spec §4.9 assumes, without validating, that
/// subpackages sharing a source also share release/version.
pub fn diff(old: &State, new: &State) -> Vec<Diff> {
    let mut sources: Vec<&String> = new.source_index.keys().collect();
    sources.sort();

    sources
        .into_iter()
        .map(|source| {
            let new_idx = new.packages_by_source(source)[0];
            let new_pkg = &new.packages[new_idx];

            let old_idx = old.packages_by_source(source).first().copied();
            let old_pkg = old_idx.map(|idx| &old.packages[idx]);

            Diff {
                source: source.clone(),
                new_idx,
                old_idx,
                new_version: new_pkg.version.clone(),
                old_version: old_pkg.map(|p| p.version.clone()),
                new_release: new_pkg.release,
                old_release: old_pkg.map(|p| p.release),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;
    use crate::model::{Origin, Package};

    fn package(source: &str, version: &str, release: u64) -> Package {
        let mut pkg = Package {
            source: source.to_string(),
            names: vec![source.to_string()],
            version: version.to_string(),
            release,
            provides: Vec::new(),
            build_deps: Vec::new(),
            ignores: Vec::new(),
            path: Utf8PathBuf::from(source),
            root: Utf8PathBuf::from("."),
            resolved: false,
        };
        pkg.normalize();
        pkg
    }

    fn state(packages: Vec<Package>) -> State {
        State::from_sorted_packages(packages, Origin::SourceTree).0
    }

    #[test]
    fn classifies_rebuild_and_new() {
        let old = state(vec![package("foo", "1.0", 1)]);
        let new = state(vec![package("foo", "1.1", 2), package("bar", "2.0", 1)]);

        let diffs = diff(&old, &new);
        assert_eq!(diffs.len(), 2);

        let foo = diffs.iter().find(|d| d.source == "foo").unwrap();
        assert!(foo.is_rebuild());
        assert!(!foo.is_new());

        let bar = diffs.iter().find(|d| d.source == "bar").unwrap();
        assert!(bar.is_new());
    }

    #[test]
    fn classifies_downgrade_and_conflict() {
        let old = state(vec![package("foo", "1.1", 2), package("baz", "1.0", 1)]);
        let new = state(vec![package("foo", "1.0", 1), package("baz", "1.1", 1)]);

        let diffs = diff(&old, &new);
        let foo = diffs.iter().find(|d| d.source == "foo").unwrap();
        assert!(foo.is_downgrade());

        let baz = diffs.iter().find(|d| d.source == "baz").unwrap();
        assert!(baz.is_conflict());
    }

    #[test]
    fn same_release_and_version_is_unchanged() {
        let old = state(vec![package("foo", "1.0", 1)]);
        let new = state(vec![package("foo", "1.0", 1)]);
        let diffs = diff(&old, &new);
        assert!(diffs[0].is_same());
    }

    #[test]
    fn diff_symmetry_rebuild_becomes_downgrade() {
        let old = state(vec![package("foo", "1.0", 1)]);
        let new = state(vec![package("foo", "1.1", 2)]);

        let forward = diff(&old, &new);
        let backward = diff(&new, &old);

        assert!(forward[0].is_rebuild());
        assert!(backward[0].is_downgrade());
        assert_eq!(
            forward[0].new_release - forward[0].old_release.unwrap(),
            backward[0].old_release.unwrap() - backward[0].new_release
        );
    }
}
