//! `manifest.x86_64.bin` binary wire format (spec §4.1, §6.4).
//!
//! Grounded directly in the commented-out byte-level fallback parser in
//! `original_source/stone/manifest.go` (the `libstone-go`-backed reader
//! above it has no Rust port in the corpus, so this module reimplements
//! the format from that fallback rather than wrapping a higher-level
//! library call).
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use camino::Utf8PathBuf;

use crate::error::ParseError;
use crate::model::Package;
use crate::recipe::config::AutobuildConfig;

const PRELUDE_LEN: usize = 32;
const PAYLOAD_HEADER_LEN: usize = 32;

const KIND_META: u8 = 1;
const COMPRESSION_NONE: u8 = 0;
const COMPRESSION_ZSTD: u8 = 1;

const TAG_NAME: u16 = 1;
const TAG_SOURCE_ID: u16 = 2;
const TAG_DEPENDS: u16 = 3;
const TAG_PROVIDES: u16 = 4;
const TAG_RELEASE: u16 = 5;
const TAG_VERSION: u16 = 6;

const RECORD_TYPE_UINT8: u16 = 0;
const RECORD_TYPE_UINT16: u16 = 1;
const RECORD_TYPE_UINT32: u16 = 2;
const RECORD_TYPE_UINT64: u16 = 3;
const RECORD_TYPE_STRING: u16 = 4;

struct PayloadHeader {
    kind: u8,
    compression: u8,
    stored_size: u64,
    num_records: u32,
}

fn read_payload_header(buf: &[u8], path: &Utf8PathBuf) -> Result<PayloadHeader, ParseError> {
    if buf.len() < PAYLOAD_HEADER_LEN {
        return Err(ParseError::PayloadTruncated {
            path: path.clone(),
            expected: PAYLOAD_HEADER_LEN,
            found: buf.len(),
        });
    }
    let mut cursor = buf;
    let kind = cursor.read_u8().expect("len checked above");
    let compression = cursor.read_u8().expect("len checked above");
    let _reserved = cursor.read_u16::<BigEndian>().expect("len checked above");
    let stored_size = cursor.read_u64::<BigEndian>().expect("len checked above");
    let num_records = cursor.read_u32::<BigEndian>().expect("len checked above");
    Ok(PayloadHeader {
        kind,
        compression,
        stored_size,
        num_records,
    })
}

/// One emitted builder value, accumulated while scanning `Meta` records.
/// A `SourceID`/`Name` pair opens a fresh subpackage in the output
/// sequence (spec §6.4: "`Name` records open a new subpackage").
#[derive(Default)]
struct PackageBuilder {
    name: Option<String>,
    source: Option<String>,
    version: Option<String>,
    release: Option<u64>,
    depends: Vec<String>,
    provides: Vec<String>,
}

fn strip_trailing_nul(s: &str) -> &str {
    s.trim_end_matches('\0')
}

fn decompress_payload(raw: &[u8], header: &PayloadHeader, path: &Utf8PathBuf) -> Result<Vec<u8>, ParseError> {
    match header.compression {
        COMPRESSION_NONE => Ok(raw.to_vec()),
        COMPRESSION_ZSTD => zstd::stream::decode_all(raw).map_err(|source| ParseError::Io {
            path: path.clone(),
            source,
        }),
        other => Err(ParseError::UnknownCompression {
            path: path.clone(),
            kind: other as u32,
        }),
    }
}

fn read_record_value(cursor: &mut &[u8], record_type: u16, length: u32) -> Option<String> {
    match record_type {
        RECORD_TYPE_UINT8 => cursor.read_u8().ok().map(|v| v.to_string()),
        RECORD_TYPE_UINT16 => cursor.read_u16::<BigEndian>().ok().map(|v| v.to_string()),
        RECORD_TYPE_UINT32 => cursor.read_u32::<BigEndian>().ok().map(|v| v.to_string()),
        RECORD_TYPE_UINT64 => cursor.read_u64::<BigEndian>().ok().map(|v| v.to_string()),
        RECORD_TYPE_STRING => {
            let mut buf = vec![0u8; length as usize];
            cursor.read_exact(&mut buf).ok()?;
            Some(strip_trailing_nul(&String::from_utf8_lossy(&buf)).to_string())
        }
        _ => None,
    }
}

/// Parse the record stream of one decompressed `Meta` payload into zero or
/// more subpackage builders.
fn parse_meta_payload(mut data: &[u8], num_records: u32) -> Vec<PackageBuilder> {
    let mut builders = Vec::new();
    let mut current = PackageBuilder::default();
    let mut any_field = false;

    for _ in 0..num_records {
        let Ok(tag) = data.read_u16::<BigEndian>() else {
            break;
        };
        let Ok(record_type) = data.read_u16::<BigEndian>() else {
            break;
        };
        let Ok(length) = data.read_u32::<BigEndian>() else {
            break;
        };
        let Some(value) = read_record_value(&mut data, record_type, length) else {
            break;
        };

        if tag == TAG_NAME && any_field {
            builders.push(std::mem::take(&mut current));
        }
        any_field = true;

        match tag {
            TAG_NAME => {
                current.provides.push(format!("name({value})"));
                if !value.ends_with("-dbginfo") {
                    current.provides.push(format!("name({value}-dbginfo)"));
                }
                current.name = Some(value);
            }
            TAG_SOURCE_ID => current.source = Some(value),
            TAG_VERSION => current.version = Some(value),
            TAG_RELEASE => current.release = value.parse().ok(),
            TAG_DEPENDS => current.depends.push(value),
            TAG_PROVIDES => current.provides.push(value),
            _ => {}
        }
    }

    if any_field {
        builders.push(current);
    }

    builders
}

/// Parse `manifest.x86_64.bin` at `path`, applying `solver.split`/`solver.move`
/// from `config` (spec §4.1: "a per-recipe config may specify `split` names
/// that pre-allocate named output packages, and `move` rewrites").
pub fn parse(path: &Path, root: &Path, config: Option<&AutobuildConfig>) -> Result<Vec<Package>, ParseError> {
    let utf8_path = Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|_| ParseError::RecipeMissing(Utf8PathBuf::from(path.to_string_lossy().into_owned())))?;
    let utf8_root = Utf8PathBuf::from_path_buf(root.to_path_buf())
        .map_err(|_| ParseError::RecipeMissing(utf8_path.clone()))?;

    let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
        path: utf8_path.clone(),
        source,
    })?;

    if bytes.len() < PRELUDE_LEN {
        return Err(ParseError::PayloadTruncated {
            path: utf8_path,
            expected: PRELUDE_LEN,
            found: bytes.len(),
        });
    }

    let mut prelude_cursor = &bytes[0..PRELUDE_LEN];
    let _magic = prelude_cursor.read_u32::<BigEndian>().expect("len checked above");
    let _version = prelude_cursor.read_u32::<BigEndian>().expect("len checked above");
    let payload_count = prelude_cursor.read_u32::<BigEndian>().expect("len checked above");

    let mut offset = PRELUDE_LEN;
    let mut builders = Vec::new();

    for _ in 0..payload_count {
        let header_bytes = bytes.get(offset..offset + PAYLOAD_HEADER_LEN).ok_or_else(|| {
            ParseError::PayloadTruncated {
                path: utf8_path.clone(),
                expected: PAYLOAD_HEADER_LEN,
                found: bytes.len().saturating_sub(offset),
            }
        })?;
        let header = read_payload_header(header_bytes, &utf8_path)?;
        offset += PAYLOAD_HEADER_LEN;

        let stored = bytes
            .get(offset..offset + header.stored_size as usize)
            .ok_or_else(|| ParseError::PayloadTruncated {
                path: utf8_path.clone(),
                expected: header.stored_size as usize,
                found: bytes.len().saturating_sub(offset),
            })?;
        offset += header.stored_size as usize;

        if header.kind != KIND_META {
            continue;
        }

        let decompressed = decompress_payload(stored, &header, &utf8_path)?;
        builders.extend(parse_meta_payload(&decompressed, header.num_records));
    }

    let mut named: BTreeMap<String, PackageBuilder> = BTreeMap::new();
    if let Some(cfg) = config {
        for split_name in &cfg.solver.split {
            named.entry(split_name.clone()).or_insert_with(|| PackageBuilder {
                name: Some(split_name.clone()),
                ..Default::default()
            });
        }
    }

    let mut source_name = None;
    for builder in builders {
        if source_name.is_none() {
            source_name = builder.source.clone();
        }
        let key = builder.name.clone().unwrap_or_default();
        named.insert(key, builder);
    }

    let source = source_name.unwrap_or_default();

    if let Some(cfg) = config {
        apply_move_rewrites(&mut named, &cfg.solver.r#move);
    }

    let mut packages: Vec<Package> = named
        .into_values()
        .filter(|b| b.name.is_some() || !b.depends.is_empty() || !b.provides.is_empty())
        .map(|b| {
            let mut pkg = Package {
                source: source.clone(),
                names: vec![b.name.clone().unwrap_or_else(|| source.clone())],
                version: b.version.clone().unwrap_or_default(),
                release: b.release.unwrap_or(1),
                provides: b.provides,
                build_deps: b.depends,
                ignores: Vec::new(),
                path: utf8_path.clone(),
                root: utf8_root.clone(),
                resolved: false,
            };
            pkg.normalize();
            pkg
        })
        .collect();

    if let Some(cfg) = config {
        for pkg in &mut packages {
            pkg.ignores = cfg.solver.ignore.clone();
        }
    }

    Ok(packages)
}

/// Redirect each `Depends` symbol named as a `solver.move` key from its
/// owning subpackage exclusively into the named target subpackages (spec
/// §9 Open Question decision: reassign exclusively, never duplicate onto
/// the source).
fn apply_move_rewrites(named: &mut BTreeMap<String, PackageBuilder>, moves: &BTreeMap<String, Vec<String>>) {
    for (symbol, targets) in moves {
        let mut moved = false;
        for builder in named.values_mut() {
            if let Some(pos) = builder.depends.iter().position(|d| d == symbol) {
                builder.depends.remove(pos);
                moved = true;
            }
        }
        if moved {
            for target in targets {
                let builder = named.entry(target.clone()).or_insert_with(|| PackageBuilder {
                    name: Some(target.clone()),
                    ..Default::default()
                });
                builder.depends.push(symbol.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    fn write_record(buf: &mut Vec<u8>, tag: u16, record_type: u16, value: &str) {
        let bytes = value.as_bytes();
        buf.write_u16::<BigEndian>(tag).unwrap();
        buf.write_u16::<BigEndian>(record_type).unwrap();
        buf.write_u32::<BigEndian>(bytes.len() as u32).unwrap();
        buf.write_all(bytes).unwrap();
    }

    fn write_uint_record(buf: &mut Vec<u8>, tag: u16, value: u64) {
        buf.write_u16::<BigEndian>(tag).unwrap();
        buf.write_u16::<BigEndian>(RECORD_TYPE_UINT64).unwrap();
        buf.write_u32::<BigEndian>(8).unwrap();
        buf.write_u64::<BigEndian>(value).unwrap();
    }

    fn build_manifest(records: &[u8], num_records: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(0x5354_4f4e).unwrap();
        out.write_u32::<BigEndian>(1).unwrap();
        out.write_u32::<BigEndian>(1).unwrap();
        out.extend_from_slice(&[0u8; 20]);

        out.write_u8(KIND_META).unwrap();
        out.write_u8(COMPRESSION_NONE).unwrap();
        out.write_u16::<BigEndian>(0).unwrap();
        out.write_u64::<BigEndian>(records.len() as u64).unwrap();
        out.write_u32::<BigEndian>(num_records).unwrap();
        out.extend_from_slice(&[0u8; 16]);

        out.extend_from_slice(records);
        out
    }

    #[test]
    fn parses_single_subpackage_manifest() {
        let mut records = Vec::new();
        write_record(&mut records, TAG_SOURCE_ID, RECORD_TYPE_STRING, "zlib");
        write_record(&mut records, TAG_NAME, RECORD_TYPE_STRING, "zlib");
        write_record(&mut records, TAG_VERSION, RECORD_TYPE_STRING, "1.3\0");
        write_uint_record(&mut records, TAG_RELEASE, 2);
        write_record(&mut records, TAG_DEPENDS, RECORD_TYPE_STRING, "glibc");

        let manifest = build_manifest(&records, 5);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.x86_64.bin");
        std::fs::write(&path, manifest).unwrap();

        let packages = parse(&path, dir.path(), None).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].names, vec!["zlib"]);
        assert_eq!(packages[0].version, "1.3");
        assert_eq!(packages[0].release, 2);
        assert!(packages[0].build_deps.contains(&"glibc".to_string()));
        assert!(packages[0].provides.contains(&"name(zlib)".to_string()));
        assert!(packages[0].provides.contains(&"name(zlib-dbginfo)".to_string()));
    }

    #[test]
    fn multiple_name_records_open_separate_subpackages() {
        let mut records = Vec::new();
        write_record(&mut records, TAG_SOURCE_ID, RECORD_TYPE_STRING, "zlib");
        write_record(&mut records, TAG_NAME, RECORD_TYPE_STRING, "zlib");
        write_uint_record(&mut records, TAG_RELEASE, 1);
        write_record(&mut records, TAG_NAME, RECORD_TYPE_STRING, "zlib-devel");
        write_uint_record(&mut records, TAG_RELEASE, 1);
        write_record(&mut records, TAG_DEPENDS, RECORD_TYPE_STRING, "name(zlib)");

        let manifest = build_manifest(&records, 5);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.x86_64.bin");
        std::fs::write(&path, manifest).unwrap();

        let packages = parse(&path, dir.path(), None).unwrap();
        assert_eq!(packages.len(), 2);
    }

    #[test]
    fn move_rewrite_reassigns_exclusively() {
        let mut records = Vec::new();
        write_record(&mut records, TAG_SOURCE_ID, RECORD_TYPE_STRING, "zlib");
        write_record(&mut records, TAG_NAME, RECORD_TYPE_STRING, "zlib");
        write_record(&mut records, TAG_DEPENDS, RECORD_TYPE_STRING, "cmake");
        write_record(&mut records, TAG_NAME, RECORD_TYPE_STRING, "zlib-devel");

        let manifest = build_manifest(&records, 4);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.x86_64.bin");
        std::fs::write(&path, manifest).unwrap();

        let mut config = AutobuildConfig::default();
        config.solver.r#move.insert("cmake".to_string(), vec!["zlib-devel".to_string()]);

        let packages = parse(&path, dir.path(), Some(&config)).unwrap();
        let zlib = packages.iter().find(|p| p.names == vec!["zlib"]).unwrap();
        let devel = packages.iter().find(|p| p.names == vec!["zlib-devel"]).unwrap();
        assert!(!zlib.build_deps.contains(&"cmake".to_string()));
        assert!(devel.build_deps.contains(&"cmake".to_string()));
    }

    #[test]
    fn move_into_absent_target_creates_it_under_the_target_name() {
        let mut records = Vec::new();
        write_record(&mut records, TAG_SOURCE_ID, RECORD_TYPE_STRING, "zlib");
        write_record(&mut records, TAG_NAME, RECORD_TYPE_STRING, "zlib");
        write_record(&mut records, TAG_DEPENDS, RECORD_TYPE_STRING, "cmake");

        let manifest = build_manifest(&records, 4);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.x86_64.bin");
        std::fs::write(&path, manifest).unwrap();

        let mut config = AutobuildConfig::default();
        config
            .solver
            .r#move
            .insert("cmake".to_string(), vec!["zlib-devel".to_string()]);

        let packages = parse(&path, dir.path(), Some(&config)).unwrap();
        assert_eq!(packages.len(), 2);
        let zlib = packages.iter().find(|p| p.names == vec!["zlib"]).unwrap();
        let devel = packages
            .iter()
            .find(|p| p.names == vec!["zlib-devel"])
            .unwrap();
        assert!(!zlib.build_deps.contains(&"cmake".to_string()));
        assert!(devel.build_deps.contains(&"cmake".to_string()));
    }

    #[test]
    fn truncated_prelude_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.x86_64.bin");
        std::fs::write(&path, [0u8; 4]).unwrap();
        assert!(matches!(
            parse(&path, dir.path(), None),
            Err(ParseError::PayloadTruncated { .. })
        ));
    }
}
