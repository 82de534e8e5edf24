//! Parallel recipe-tree traversal (spec §4.3).
//!
//! Grounded on `original_source/common/read.go`'s `ReadSrcPkgs` (hard
//! deny-list, `filepath.SkipDir`-style pruning once a recipe is found)
//! and the teacher's `git.rs::clone_or_fetch_repositories` concurrency
//! idiom (`tokio::task::JoinSet` with a bounded fan-out over
//! `spawn_blocking` workers, since directory/file I/O is blocking).
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use tokio::task::JoinSet;

use crate::error::{ConsistencyError, ParseError};
use crate::model::{Origin, Package, State};

/// Known-broken recipes to skip outright (`original_source/common/read.go`'s
/// `badPackages`).
const DENY_LIST: &[&str] = &["haskell-http-client-tls"];

/// Bounds concurrent in-flight subtree walks, mirroring the teacher's
/// `JoinSet` fan-out cap in `git.rs`.
const MAX_CONCURRENT_WALKS: usize = 50;

/// Walks `root` and every source-tree recipe beneath it, returning an
/// already-sorted, already-normalized `State`. Any single worker's
/// `ParseError` aborts the whole walk; partial results are discarded
/// (spec §4.3 "error from any worker aborts the walk").
pub async fn load(root: &Path) -> Result<(State, Vec<ConsistencyError>), ParseError> {
    let packages = Arc::new(Mutex::new(Vec::new()));
    let mut pending = vec![root.to_path_buf()];
    let mut join_set: JoinSet<Result<Vec<PathBuf>, ParseError>> = JoinSet::new();

    while !pending.is_empty() || !join_set.is_empty() {
        while !pending.is_empty() && join_set.len() < MAX_CONCURRENT_WALKS {
            let dir = pending.pop().expect("checked non-empty above");
            let packages = Arc::clone(&packages);
            join_set.spawn_blocking(move || walk_one(&dir, &packages));
        }

        if let Some(outcome) = join_set.join_next().await {
            match outcome {
                Ok(Ok(children)) => pending.extend(children),
                Ok(Err(err)) => return Err(err),
                Err(join_err) => {
                    return Err(ParseError::Io {
                        path: Utf8PathBuf::from(root.to_string_lossy().into_owned()),
                        source: std::io::Error::other(join_err),
                    });
                }
            }
        }
    }

    let mut packages = Arc::try_unwrap(packages)
        .expect("all workers have completed")
        .into_inner()
        .expect("mutex is never poisoned: workers never panic while holding it");

    packages.sort_by(|a: &Package, b: &Package| {
        (a.source.clone(), a.primary_name().to_string()).cmp(&(b.source.clone(), b.primary_name().to_string()))
    });

    let (state, duplicates) = State::from_sorted_packages(packages, Origin::SourceTree);
    Ok((state, duplicates))
}

/// Process one directory: deny-list short-circuit, `autobuild.yml`
/// `ignore: true` pruning, recipe dispatch. Returns the child directories
/// still needing a visit (empty once a recipe is found, since recipes
/// don't nest).
fn walk_one(dir: &Path, packages: &Mutex<Vec<Package>>) -> Result<Vec<PathBuf>, ParseError> {
    if let Some(name) = dir.file_name().and_then(|n| n.to_str()) {
        if DENY_LIST.contains(&name) {
            tracing::debug!(dir = %dir.display(), "skipping deny-listed recipe");
            return Ok(Vec::new());
        }
    }

    if let Some(cfg) = crate::recipe::config::load(dir)? {
        if cfg.ignore {
            tracing::debug!(dir = %dir.display(), "pruning subtree: ignore: true");
            return Ok(Vec::new());
        }
    }

    if let Some(mut found) = crate::recipe::parse(dir)? {
        tracing::debug!(dir = %dir.display(), count = found.len(), "parsed recipe");
        let mut guard = packages.lock().expect("mutex is never poisoned");
        guard.append(&mut found);
        return Ok(Vec::new());
    }

    let mut children = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|source| ParseError::Io {
        path: Utf8PathBuf::from(dir.to_string_lossy().into_owned()),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ParseError::Io {
            path: Utf8PathBuf::from(dir.to_string_lossy().into_owned()),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            children.push(path);
        }
    }

    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_nested_recipe_tree() {
        let root = tempfile::tempdir().unwrap();
        let pkg_dir = root.path().join("group").join("zlib");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(
            pkg_dir.join("package.yml"),
            "name: zlib\nversion: \"1.3\"\nrelease: 1\n",
        )
        .unwrap();

        let (state, duplicates) = load(root.path()).await.unwrap();
        assert_eq!(state.packages.len(), 1);
        assert!(duplicates.is_empty());
        assert_eq!(state.packages[0].source, "zlib");
    }

    #[tokio::test]
    async fn ignored_subtree_is_pruned() {
        let root = tempfile::tempdir().unwrap();
        let pkg_dir = root.path().join("broken");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(root.path().join("autobuild.yml"), "ignore: true\n").unwrap();
        std::fs::write(
            pkg_dir.join("package.yml"),
            "name: broken\nversion: \"1\"\nrelease: 1\n",
        )
        .unwrap();

        let (state, _) = load(root.path()).await.unwrap();
        assert!(state.packages.is_empty());
    }

    #[tokio::test]
    async fn deny_listed_directory_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let pkg_dir = root.path().join("haskell-http-client-tls");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(
            pkg_dir.join("package.yml"),
            "name: haskell-http-client-tls\nversion: \"1\"\nrelease: 1\n",
        )
        .unwrap();

        let (state, _) = load(root.path()).await.unwrap();
        assert!(state.packages.is_empty());
    }
}
