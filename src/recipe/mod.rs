//! Recipe format dispatch (spec §4.1).
//!
//! Grounded on `original_source/stone/parse.go`'s `ParsePackage`: prefer
//! the binary manifest (it reflects the last successful build precisely),
//! fall back to the text recipe, then the legacy `stone.yaml`. A
//! directory with none of the three is not an error — the Loader treats
//! it as an interior directory and recurses into its children.
pub mod config;
pub mod legacy;
pub mod manifest;
pub mod text;

use std::path::Path;

use crate::error::ParseError;
use crate::model::Package;

/// Parse whichever recipe format is present at `dir`. `Ok(None)` means
/// "no recipe here" — the Loader should recurse into subdirectories.
pub fn parse(dir: &Path) -> Result<Option<Vec<Package>>, ParseError> {
    let cfg = config::load(dir)?;

    let manifest_path = dir.join("manifest.x86_64.bin");
    if manifest_path.exists() {
        let mut packages = manifest::parse(&manifest_path, dir, cfg.as_ref())?;
        for pkg in &mut packages {
            pkg.normalize();
        }
        return Ok(Some(packages));
    }

    if let Some(mut packages) = text::parse(dir)? {
        apply_config(&mut packages, cfg.as_ref());
        return Ok(Some(packages));
    }

    if let Some(mut packages) = legacy::parse(dir)? {
        apply_config(&mut packages, cfg.as_ref());
        return Ok(Some(packages));
    }

    Ok(None)
}

fn apply_config(packages: &mut [Package], cfg: Option<&config::AutobuildConfig>) {
    let Some(cfg) = cfg else {
        return;
    };
    for pkg in packages {
        pkg.ignores.extend(cfg.solver.ignore.iter().cloned());
        pkg.normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_text_recipe_when_no_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.yml"),
            "name: zlib\nversion: \"1.3\"\nrelease: 1\n",
        )
        .unwrap();
        let packages = parse(dir.path()).unwrap().unwrap();
        assert_eq!(packages[0].source, "zlib");
    }

    #[test]
    fn no_recipe_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(parse(dir.path()).unwrap().is_none());
    }

    #[test]
    fn autobuild_config_ignores_propagate_to_every_package() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("autobuild.yml"),
            "solver:\n  ignore:\n    - \"^pkgconf$\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("package.yml"),
            "name: zlib\nversion: \"1.3\"\nrelease: 1\nbuilddeps: [pkgconf]\n",
        )
        .unwrap();
        let packages = parse(dir.path()).unwrap().unwrap();
        assert!(packages[0].ignores.contains(&"^pkgconf$".to_string()));
    }
}
