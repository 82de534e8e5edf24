//! `stone.yaml` fallback, used when a recipe has no binary manifest yet
//! (spec §4.1; grounded on `original_source/stone/{yml,parse}.go`).
use std::collections::BTreeSet;
use std::path::Path;

use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::error::ParseError;
use crate::model::Package;

#[derive(Debug, Clone, Deserialize)]
pub struct SubPackage {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rundeps: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
}

fn default_toolchain() -> String {
    "clang".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoneYml {
    pub name: String,
    pub version: String,
    pub release: u64,
    #[serde(default)]
    pub rundeps: Vec<String>,
    #[serde(default)]
    pub builddeps: Vec<String>,
    #[serde(default)]
    pub checkdeps: Vec<String>,
    #[serde(default = "default_toolchain")]
    pub toolchain: String,
    #[serde(default, rename = "packages")]
    pub sub_packages: Vec<std::collections::BTreeMap<String, SubPackage>>,
}

impl StoneYml {
    /// The union of the top-level `rundeps` and every subpackage's
    /// `rundeps`, deduplicated (`original_source/stone/yml.go`'s
    /// `CollectRunDeps`).
    pub fn collect_run_deps(&self) -> Vec<String> {
        let mut set: BTreeSet<String> = self.rundeps.iter().cloned().collect();
        for group in &self.sub_packages {
            for subpkg in group.values() {
                set.extend(subpkg.rundeps.iter().cloned());
            }
        }
        set.into_iter().collect()
    }
}

/// The implicit build-dep a toolchain name injects
/// (`original_source/stone/parse.go`): `clang` pulls in
/// `llvm-clang-devel`, `gnu` pulls in `gcc-devel`. Unknown toolchain
/// names inject nothing.
fn toolchain_dep(toolchain: &str) -> Option<&'static str> {
    match toolchain {
        "clang" => Some("llvm-clang-devel"),
        "gnu" => Some("gcc-devel"),
        _ => None,
    }
}

/// Parse `stone.yaml` in `dir`, if present. This is the pre-build
/// fallback: once a package has been built once, `manifest.x86_64.bin`
/// supersedes it as the authoritative source (spec §4.1 dispatch order).
pub fn parse(dir: &Path) -> Result<Option<Vec<Package>>, ParseError> {
    let stone_path = dir.join("stone.yaml");
    if !stone_path.exists() {
        return Ok(None);
    }

    let utf8_dir = Utf8PathBuf::from_path_buf(dir.to_path_buf())
        .map_err(|_| ParseError::RecipeMissing(Utf8PathBuf::from(dir.to_string_lossy().into_owned())))?;
    let utf8_stone_path = utf8_dir.join("stone.yaml");

    let raw = std::fs::read_to_string(&stone_path).map_err(|source| ParseError::Io {
        path: utf8_stone_path.clone(),
        source,
    })?;
    let spkg: StoneYml = serde_yaml::from_str(&raw).map_err(|source| ParseError::Yaml {
        path: utf8_stone_path.clone(),
        source,
    })?;

    let mut build_deps = spkg.builddeps.clone();
    build_deps.extend(spkg.checkdeps.clone());
    build_deps.extend(spkg.collect_run_deps());
    if let Some(dep) = toolchain_dep(&spkg.toolchain) {
        build_deps.push(dep.to_string());
    }

    let mut pkg = Package {
        source: spkg.name.clone(),
        names: vec![spkg.name],
        version: spkg.version,
        release: spkg.release,
        provides: Vec::new(),
        build_deps,
        ignores: Vec::new(),
        path: utf8_stone_path,
        root: utf8_dir,
        resolved: false,
    };
    pkg.normalize();

    Ok(Some(vec![pkg]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clang_toolchain_injects_llvm_dep() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("stone.yaml"),
            "name: foo\nversion: \"1.0\"\nrelease: 1\nbuilddeps: [make]\n",
        )
        .unwrap();
        let packages = parse(dir.path()).unwrap().unwrap();
        assert!(packages[0].build_deps.contains(&"llvm-clang-devel".to_string()));
    }

    #[test]
    fn gnu_toolchain_injects_gcc_dep() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("stone.yaml"),
            "name: foo\nversion: \"1.0\"\nrelease: 1\ntoolchain: gnu\n",
        )
        .unwrap();
        let packages = parse(dir.path()).unwrap().unwrap();
        assert!(packages[0].build_deps.contains(&"gcc-devel".to_string()));
    }

    #[test]
    fn collect_run_deps_unions_subpackages() {
        let yaml = r#"
name: foo
version: "1.0"
release: 1
rundeps: [glibc]
packages:
  - foo-devel:
      rundeps: [foo]
  - foo-doc:
      rundeps: [glibc]
"#;
        let spkg: StoneYml = serde_yaml::from_str(yaml).unwrap();
        let mut deps = spkg.collect_run_deps();
        deps.sort();
        assert_eq!(deps, vec!["foo", "glibc"]);
    }

    #[test]
    fn missing_stone_yaml_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(parse(dir.path()).unwrap().is_none());
    }
}
