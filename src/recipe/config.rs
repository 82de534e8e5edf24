//! Per-directory `autobuild.yml`/`.yaml` (spec §4.1, §4.3).
use std::collections::HashMap;
use std::path::Path;

use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::error::ParseError;

/// `solver.{ignore,split,move}` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub split: Vec<String>,
    #[serde(default)]
    pub r#move: HashMap<String, Vec<String>>,
}

/// A loaded `autobuild.yml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutobuildConfig {
    #[serde(default)]
    pub ignore: bool,
    #[serde(default)]
    pub solver: SolverConfig,
}

/// Load `autobuild.yml` or `autobuild.yaml` from `dir`, if either exists.
/// `None` means "no config present" — distinct from a present-but-empty
/// file, which yields `AutobuildConfig::default()`.
pub fn load(dir: &Path) -> Result<Option<AutobuildConfig>, ParseError> {
    for candidate in ["autobuild.yml", "autobuild.yaml"] {
        let path = dir.join(candidate);
        if !path.exists() {
            continue;
        }
        let utf8_path = Utf8PathBuf::from_path_buf(path.clone())
            .map_err(|_| ParseError::ConfigInvalid(Utf8PathBuf::from(candidate)))?;
        let raw = std::fs::read_to_string(&path).map_err(|source| ParseError::Io {
            path: utf8_path.clone(),
            source,
        })?;
        let cfg = serde_yaml::from_str(&raw).map_err(|source| ParseError::Yaml {
            path: utf8_path,
            source,
        })?;
        return Ok(Some(cfg));
    }
    Ok(None)
}
