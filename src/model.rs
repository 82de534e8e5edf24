//! The core data model: [`Package`], [`State`], and [`Diff`] (spec §3).
use std::collections::HashMap;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::{ConsistencyError, InternalError};
use crate::graph::Graph;

/// Where a [`State`] was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    SourceTree,
    LocalBinaryIndex,
    RemoteRepo,
}

/// A single recipe's build metadata, normalized per spec §3.1.
///
/// `names` is non-empty with the primary subpackage first. `provides`
/// always contains `name(n)` for every `n` in `names`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub source: String,
    pub names: Vec<String>,
    pub version: String,
    pub release: u64,
    pub provides: Vec<String>,
    pub build_deps: Vec<String>,
    pub ignores: Vec<String>,
    pub path: Utf8PathBuf,
    pub root: Utf8PathBuf,
    /// Set once, during [`crate::loader::Loader`] finalization — see
    /// spec.md §9's "mutable resolved flag" redesign note.
    pub resolved: bool,
}

impl Package {
    /// Sort and dedup `build_deps`, `provides`, and `ignores`, and ensure
    /// `provides` contains `name(n)` for every subpackage name. Call once
    /// per package right after parsing (spec §4.1 "Normalization").
    pub fn normalize(&mut self) {
        for name in &self.names {
            let symbol = format!("name({name})");
            if !self.provides.contains(&symbol) {
                self.provides.push(symbol);
            }
        }
        self.build_deps.sort();
        self.build_deps.dedup();
        self.provides.sort();
        self.provides.dedup();
        self.ignores.sort();
        self.ignores.dedup();
    }

    /// Validate the invariants spec §3.1 requires of every package.
    pub fn check_invariants(&self) -> Result<(), InternalError> {
        if self.names.is_empty() {
            return Err(InternalError::EmptyNames(self.source.clone()));
        }
        if self.release == 0 {
            return Err(InternalError::ZeroRelease(self.source.clone()));
        }
        Ok(())
    }

    pub fn primary_name(&self) -> &str {
        &self.names[0]
    }
}

/// An immutable snapshot of loaded package metadata (spec §3.2).
pub struct State {
    pub packages: Vec<Package>,
    pub provider_index: HashMap<String, usize>,
    pub source_index: HashMap<String, Vec<usize>>,
    pub dep_graph: Graph,
    pub origin: Origin,
}

impl State {
    /// Build a `State` from an already-sorted, already-normalized package
    /// list. Sorting by `(source, names[0])` is the caller's
    /// responsibility (the [`crate::loader::Loader`] does this before
    /// indices are assigned, per spec §4.3).
    ///
    /// Duplicate providers are reported but the later insertion (by sort
    /// order) is discarded — first occurrence wins (spec §3.2).
    pub fn from_sorted_packages(
        packages: Vec<Package>,
        origin: Origin,
    ) -> (Self, Vec<ConsistencyError>) {
        let mut provider_index = HashMap::new();
        let mut source_index: HashMap<String, Vec<usize>> = HashMap::new();
        let mut duplicates = Vec::new();

        for (idx, pkg) in packages.iter().enumerate() {
            source_index.entry(pkg.source.clone()).or_default().push(idx);

            for provider in &pkg.provides {
                match provider_index.get(provider) {
                    None => {
                        provider_index.insert(provider.clone(), idx);
                    }
                    Some(&incumbent_idx) => {
                        duplicates.push(ConsistencyError::DuplicateProvider {
                            symbol: provider.clone(),
                            incumbent: packages[incumbent_idx].source.clone(),
                            challenger: pkg.source.clone(),
                        });
                    }
                }
            }
        }

        let dep_graph = crate::graph::build_dep_graph(&packages, &provider_index);

        let mut state = State {
            packages,
            provider_index,
            source_index,
            dep_graph,
            origin,
        };
        state.recompute_resolved();

        (state, duplicates)
    }

    /// Compute `resolved` for every package against the finished provider
    /// index (spec §4.3 "finally, every package's resolved flag").
    fn recompute_resolved(&mut self) {
        let provider_index = self.provider_index.clone();
        for pkg in &mut self.packages {
            pkg.resolved = crate::resolver::is_resolved(pkg, &provider_index);
        }
    }

    pub fn package_by_provider(&self, symbol: &str) -> Option<&Package> {
        self.provider_index.get(symbol).map(|&idx| &self.packages[idx])
    }

    pub fn packages_by_source(&self, source: &str) -> &[usize] {
        self.source_index
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Per-source differences between two loaded states (spec §3.4).
#[derive(Debug, Clone)]
pub struct Diff {
    pub source: String,
    pub new_idx: usize,
    pub old_idx: Option<usize>,
    pub new_version: String,
    pub old_version: Option<String>,
    pub new_release: u64,
    pub old_release: Option<u64>,
}

impl Diff {
    pub fn is_new(&self) -> bool {
        self.old_idx.is_none()
    }

    pub fn is_same(&self) -> bool {
        self.old_release == Some(self.new_release) && self.old_version.as_deref() == Some(self.new_version.as_str())
    }

    pub fn is_rebuild(&self) -> bool {
        self.old_release.is_some_and(|old| self.new_release > old)
    }

    pub fn is_downgrade(&self) -> bool {
        self.old_release.is_some_and(|old| self.new_release < old)
    }

    pub fn is_conflict(&self) -> bool {
        self.old_release == Some(self.new_release)
            && self.old_version.as_deref() != Some(self.new_version.as_str())
    }
}
