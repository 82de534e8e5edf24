//! `eopkg-index.xml[.xz]` binary index parsing (spec §4.2).
//!
//! Grounded in `original_source/state/binary_state.go`'s `LoadBinary`,
//! which delegates to `github.com/getsolus/libeopkg/index`; that Go
//! library's schema is reimplemented directly here against `quick-xml`
//! since no equivalent crate exists in the corpus.
use std::io::Read;
use std::path::Path;

use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::error::{ExternalError, ParseError};
use crate::model::{Origin, Package, State};

#[derive(Debug, Clone, Deserialize)]
struct HistoryEntry {
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Release")]
    release: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct SourceRef {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct IndexPackage {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Source")]
    source: SourceRef,
    #[serde(rename = "History")]
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "PISI")]
struct IndexDocument {
    #[serde(rename = "Package", default)]
    packages: Vec<IndexPackage>,
}

fn packages_from_xml(xml: &str) -> Result<Vec<Package>, ParseError> {
    let doc: IndexDocument = quick_xml::de::from_str(xml).map_err(|source| ParseError::Xml {
        path: Utf8PathBuf::from("<index>"),
        source,
    })?;

    let mut packages = Vec::with_capacity(doc.packages.len());
    for entry in doc.packages {
        let Some(first) = entry.history.first() else {
            continue;
        };
        let mut pkg = Package {
            source: entry.source.name.clone(),
            names: vec![entry.name.clone()],
            version: first.version.clone(),
            release: first.release,
            provides: vec![format!("name({})", entry.name)],
            build_deps: Vec::new(),
            ignores: Vec::new(),
            path: Utf8PathBuf::from(entry.source.name.clone()),
            root: Utf8PathBuf::from(entry.source.name),
            resolved: true,
        };
        pkg.normalize();
        packages.push(pkg);
    }
    Ok(packages)
}

/// Load a local `eopkg-index.xml` or `eopkg-index.xml.xz`.
pub fn load_local(path: &Path) -> Result<(State, Vec<crate::error::ConsistencyError>), ParseError> {
    let utf8_path = Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|_| ParseError::RecipeMissing(Utf8PathBuf::from(path.to_string_lossy().into_owned())))?;

    let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
        path: utf8_path.clone(),
        source,
    })?;

    let xml = if path.extension().and_then(|e| e.to_str()) == Some("xz") {
        decompress_xz(&bytes, &utf8_path)?
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };

    let mut packages = packages_from_xml(&xml)?;
    packages.sort_by(|a, b| (a.source.clone(), a.primary_name().to_string()).cmp(&(b.source.clone(), b.primary_name().to_string())));

    let (state, duplicates) = State::from_sorted_packages(packages, Origin::LocalBinaryIndex);
    Ok((state, duplicates))
}

fn decompress_xz(bytes: &[u8], path: &Utf8PathBuf) -> Result<String, ParseError> {
    let mut decoder = xz2::read::XzDecoder::new(bytes);
    let mut out = String::new();
    decoder.read_to_string(&mut out).map_err(|source| ParseError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(out)
}

/// Fetch `https://<host>/<name>/eopkg-index.xml.xz` and parse it (spec §4.2).
pub fn load_remote(host: &str, name: &str) -> Result<(State, Vec<crate::error::ConsistencyError>), crate::error::Error> {
    let url = format!("https://{host}/{name}/eopkg-index.xml.xz");
    tracing::info!(%url, "fetching remote index");

    let response = reqwest::blocking::get(&url).map_err(ExternalError::Http)?;
    let bytes = response.bytes().map_err(ExternalError::Http)?;

    let utf8_path = Utf8PathBuf::from(format!("{host}/{name}/eopkg-index.xml.xz"));
    let xml = decompress_xz(&bytes, &utf8_path)?;

    let mut packages = packages_from_xml(&xml)?;
    packages.sort_by(|a, b| (a.source.clone(), a.primary_name().to_string()).cmp(&(b.source.clone(), b.primary_name().to_string())));

    let (state, duplicates) = State::from_sorted_packages(packages, Origin::RemoteRepo);
    Ok((state, duplicates))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<PISI>
  <Package>
    <Name>zlib</Name>
    <Source><Name>zlib</Name></Source>
    <History><Version>1.3</Version><Release>2</Release></History>
  </Package>
  <Package>
    <Name>zlib-devel</Name>
    <Source><Name>zlib</Name></Source>
    <History><Version>1.3</Version><Release>2</Release></History>
  </Package>
</PISI>"#;

    #[test]
    fn parses_packages_and_aggregates_source_index() {
        let packages = packages_from_xml(SAMPLE).unwrap();
        assert_eq!(packages.len(), 2);
        assert!(packages.iter().all(|p| p.source == "zlib"));
        assert!(packages.iter().all(|p| p.build_deps.is_empty()));
    }

    #[test]
    fn duplicate_provider_across_entries_is_reported() {
        let xml = r#"<PISI>
  <Package><Name>x</Name><Source><Name>x</Name></Source><History><Version>1</Version><Release>1</Release></History></Package>
  <Package><Name>x</Name><Source><Name>y</Name></Source><History><Version>1</Version><Release>1</Release></History></Package>
</PISI>"#;
        let packages = packages_from_xml(xml).unwrap();
        let (_, duplicates) = State::from_sorted_packages(packages, Origin::LocalBinaryIndex);
        assert_eq!(duplicates.len(), 1);
    }
}
