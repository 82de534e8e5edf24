//! `package.yml` + `pspec_x86_64.xml` recipes (spec §4.1).
use std::path::Path;

use camino::Utf8PathBuf;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::error::ParseError;
use crate::model::Package;

static PKGCONFIG_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/usr/(lib|lib64|lib32|share)/.+\.pc$").unwrap());

/// `rundeps` may be a flat list shared by every subpackage, or a mapping
/// from subpackage name to its own list (spec §9 polymorphic `rundeps`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RunDeps {
    Flat(Vec<String>),
    PerSubpackage(std::collections::BTreeMap<String, Vec<String>>),
}

impl RunDeps {
    fn flatten(&self) -> Vec<String> {
        match self {
            RunDeps::Flat(deps) => deps.clone(),
            RunDeps::PerSubpackage(map) => map.values().flatten().cloned().collect(),
        }
    }
}

impl Default for RunDeps {
    fn default() -> Self {
        RunDeps::Flat(Vec::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageYml {
    pub name: String,
    pub version: String,
    pub release: u64,
    #[serde(default)]
    pub rundeps: RunDeps,
    #[serde(default)]
    pub builddeps: Vec<String>,
    #[serde(default)]
    pub checkdeps: Vec<String>,
    #[serde(default)]
    pub clang: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct PspecPackage {
    name: String,
    #[serde(rename = "Files", default)]
    files: Option<PspecFiles>,
}

#[derive(Debug, Clone, Deserialize)]
struct PspecFiles {
    #[serde(rename = "Path", default)]
    paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "PISI")]
struct Pspec {
    #[serde(rename = "Package", default)]
    packages: Vec<PspecPackage>,
}

/// Provider symbols derived from a pkgconfig `.pc` file's install path
/// (spec §4.1): matches only under `/usr/{lib,lib64,lib32,share}`, no
/// deeper than 5 path segments; `lib32` provides the 32-bit symbol only,
/// `share` (arch-independent) provides both, everything else provides the
/// 64-bit symbol. Grounded on
/// `original_source/common/package.go`'s `getPcProvides`, generalized to
/// match anywhere under the libdir rather than only its `pkgconfig/`
/// subdirectory, per spec's broader regex.
fn pc_provides(path: &str) -> Vec<String> {
    if path.split('/').count() > 5 {
        return Vec::new();
    }
    if !PKGCONFIG_PATH.is_match(path) {
        return Vec::new();
    }

    let Some(file_name) = Path::new(path).file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };
    let segments: Vec<&str> = path.split('/').collect();

    if segments.contains(&"lib32") {
        vec![format!("pkgconfig32({file_name})")]
    } else if segments.contains(&"share") {
        vec![format!("pkgconfig({file_name})"), format!("pkgconfig32({file_name})")]
    } else {
        vec![format!("pkgconfig({file_name})")]
    }
}

/// Parse `package.yml` plus, if present, `pspec_x86_64.xml` in `dir`.
pub fn parse(dir: &Path) -> Result<Option<Vec<Package>>, ParseError> {
    let package_yml_path = dir.join("package.yml");
    if !package_yml_path.exists() {
        return Ok(None);
    }

    let utf8_dir = Utf8PathBuf::from_path_buf(dir.to_path_buf())
        .map_err(|_| ParseError::RecipeMissing(Utf8PathBuf::from(dir.to_string_lossy().into_owned())))?;
    let utf8_package_yml = utf8_dir.join("package.yml");

    let raw = std::fs::read_to_string(&package_yml_path).map_err(|source| ParseError::Io {
        path: utf8_package_yml.clone(),
        source,
    })?;
    let ypkg: PackageYml = serde_yaml::from_str(&raw).map_err(|source| ParseError::Yaml {
        path: utf8_package_yml,
        source,
    })?;

    let mut build_deps = ypkg.builddeps.clone();
    build_deps.extend(ypkg.checkdeps.clone());
    build_deps.extend(ypkg.rundeps.flatten());
    if ypkg.clang {
        build_deps.push("llvm-clang-devel".to_string());
    }

    let mut provides = Vec::new();
    let pspec_path = dir.join("pspec_x86_64.xml");
    if pspec_path.exists() {
        let utf8_pspec = utf8_dir.join("pspec_x86_64.xml");
        let raw = std::fs::read_to_string(&pspec_path).map_err(|source| ParseError::Io {
            path: utf8_pspec.clone(),
            source,
        })?;
        let pspec: Pspec = quick_xml::de::from_str(&raw)
            .map_err(|source| ParseError::Xml { path: utf8_pspec, source })?;

        for subpkg in &pspec.packages {
            provides.push(format!("name({})", subpkg.name));
            if let Some(files) = &subpkg.files {
                for path in &files.paths {
                    provides.extend(pc_provides(path));
                }
            }
        }
    }

    let mut pkg = Package {
        source: ypkg.name.clone(),
        names: vec![ypkg.name],
        version: ypkg.version,
        release: ypkg.release,
        provides,
        build_deps,
        ignores: Vec::new(),
        path: utf8_package_yml,
        root: utf8_dir,
        resolved: false,
    };
    pkg.normalize();

    Ok(Some(vec![pkg]))
}
