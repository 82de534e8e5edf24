use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while turning CLI input into a query (tpath syntax, unknown
/// package/provider names, malformed CLI shapes).
#[derive(Error, Debug)]
pub enum InputError {
    #[error("invalid tpath {0:?}: expected `src:`, `bin:`, or `repo:` prefix")]
    InvalidTPath(String),
    #[error("unknown symbol {0:?}: not a source name or provider in the active state")]
    UnknownSymbol(String),
}

/// Errors raised while decoding a single recipe, manifest, or index entry.
/// Always carries the offending path.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no recognizable recipe found at {0}")]
    RecipeMissing(Utf8PathBuf),
    #[error("malformed field `{field}` in {path}")]
    MalformedField { path: Utf8PathBuf, field: String },
    #[error("unknown compression kind {kind} in payload of {path}")]
    UnknownCompression { path: Utf8PathBuf, kind: u32 },
    #[error("payload in {path} truncated: expected {expected} bytes, found {found}")]
    PayloadTruncated {
        path: Utf8PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("invalid autobuild config at {0}")]
    ConfigInvalid(Utf8PathBuf),
    #[error("{path}: {source}")]
    Yaml {
        path: Utf8PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{path}: {source}")]
    Xml {
        path: Utf8PathBuf,
        #[source]
        source: quick_xml::de::DeError,
    },
    #[error("{path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reflecting an inconsistent but non-corrupt state: duplicate
/// providers, unresolved dependencies, version regressions.
#[derive(Error, Debug)]
pub enum ConsistencyError {
    #[error("provider {symbol:?} is exported by both {incumbent} and {challenger}")]
    DuplicateProvider {
        symbol: String,
        incumbent: String,
        challenger: String,
    },
    #[error("{0} has unresolved build dependencies and --force was not passed")]
    UnresolvedDependency(String),
    #[error("{0} is a downgrade relative to the prior state")]
    Downgrade(String),
    #[error("{0} has the same release but a different version than the prior state")]
    Conflict(String),
}

/// A single detected cycle among chosen vertices, with a human-readable
/// witness chain (spec.md §4.8).
#[derive(Debug, Clone)]
pub struct Cycle {
    pub members: Vec<String>,
    pub witness_chain: Vec<String>,
}

/// Errors raised by graph queries: cycles in the lifted graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("the lifted graph contains {} cycle(s)", .0.len())]
    CyclesDetected(Vec<Cycle>),
}

/// Errors from collaborators outside this crate's control: network,
/// decompression, SSH, git.
#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decompress {path}: {source}")]
    Decompress {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
    #[error("remote command failed: {0}")]
    RemoteCommand(String),
}

/// Invariant violations that indicate a bug in this crate, never a
/// recoverable user-facing condition.
#[derive(Error, Debug)]
pub enum InternalError {
    #[error("package with empty `names` produced for source {0:?}")]
    EmptyNames(String),
    #[error("package {0:?} has release 0, which violates release >= 1")]
    ZeroRelease(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    External(#[from] ExternalError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

pub type Result<T> = std::result::Result<T, Error>;
