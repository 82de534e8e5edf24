//! `tpath` syntax: `{src|bin|repo}:<loc>` (spec §6.2), selecting which
//! kind of state source a query/diff/push operand names.
use std::str::FromStr;

use camino::Utf8PathBuf;

use crate::error::InputError;
use crate::model::Origin;

/// A parsed `tpath` operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TPath {
    /// `src:<path>` — a source tree to walk with the [`crate::loader::Loader`].
    Src(Utf8PathBuf),
    /// `bin:<path>` — a local binary index file or directory.
    Bin(Utf8PathBuf),
    /// `repo:<url-or-name>` — a remote binary index.
    Repo(String),
}

impl TPath {
    pub fn origin(&self) -> Origin {
        match self {
            TPath::Src(_) => Origin::SourceTree,
            TPath::Bin(_) => Origin::LocalBinaryIndex,
            TPath::Repo(_) => Origin::RemoteRepo,
        }
    }
}

impl FromStr for TPath {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, loc) = s
            .split_once(':')
            .ok_or_else(|| InputError::InvalidTPath(s.to_string()))?;

        if loc.is_empty() {
            return Err(InputError::InvalidTPath(s.to_string()));
        }

        match kind {
            "src" => Ok(TPath::Src(Utf8PathBuf::from(loc))),
            "bin" => Ok(TPath::Bin(Utf8PathBuf::from(loc))),
            "repo" => Ok(TPath::Repo(loc.to_string())),
            _ => Err(InputError::InvalidTPath(s.to_string())),
        }
    }
}
