use bytes::Bytes;
use serde::Deserialize;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::bundle::header::{AppHeader, HEADER_LEN};
use crate::bundle::{BundleError, BundleReader};
use crate::core::model::{AppMetadata, PartKind};

const MANIFEST: &str = "manifest.json";
// Upper bound on buffer reservation from a declared entry size.
const MAX_PREALLOC: u64 = 1 << 20;

#[derive(Debug, Deserialize)]
struct Manifest {
    application: Option<ManifestEntry>,
    resources: Option<ManifestEntry>,
    worker: Option<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: String,
}

#[derive(Debug, Clone)]
struct PartEntry {
    kind: PartKind,
    path: String,
    size: u64,
}

/// A `.pbw` app bundle: a zip with a `manifest.json` naming the binary,
/// resource pack and worker, optionally nested per hardware platform.
pub struct PbwBundle<R = File> {
    archive: ZipArchive<R>,
    prefix: String,
    is_app: bool,
    parts: Vec<PartEntry>,
}

impl PbwBundle<File> {
    pub fn open(path: &Path, platform: Option<&str>) -> Result<Self, BundleError> {
        let file = File::open(path)?;
        Self::from_reader(file, platform)
    }
}

impl<R: Read + Seek> PbwBundle<R> {
    pub fn from_reader(reader: R, platform: Option<&str>) -> Result<Self, BundleError> {
        let mut archive = ZipArchive::new(reader)?;

        let prefix = match platform {
            Some(p) => {
                let candidate = format!("{p}/{MANIFEST}");
                if archive.file_names().any(|n| n == candidate) {
                    format!("{p}/")
                } else {
                    String::new()
                }
            }
            None => String::new(),
        };

        let manifest_path = format!("{prefix}{MANIFEST}");
        let manifest: Manifest = {
            let entry = archive.by_name(&manifest_path).map_err(|e| missing(e, &manifest_path))?;
            serde_json::from_reader(entry)?
        };

        let named = [
            (PartKind::Binary, &manifest.application),
            (PartKind::Resources, &manifest.resources),
            (PartKind::Worker, &manifest.worker),
        ];
        let mut parts = Vec::new();
        for (kind, entry) in named {
            let Some(entry) = entry else { continue };
            let path = format!("{prefix}{}", entry.name);
            let size = archive.by_name(&path).map_err(|e| missing(e, &path))?.size();
            parts.push(PartEntry { kind, path, size });
        }

        Ok(Self {
            archive,
            prefix,
            is_app: manifest.application.is_some(),
            parts,
        })
    }

    /// Directory inside the archive the bundle was read from ("" for root).
    pub fn platform_dir(&self) -> &str {
        self.prefix.trim_end_matches('/')
    }

    fn entry(&self, kind: PartKind) -> Result<&PartEntry, BundleError> {
        self.parts
            .iter()
            .find(|p| p.kind == kind)
            .ok_or(BundleError::MissingPart(kind))
    }
}

impl<R: Read + Seek + Send> BundleReader for PbwBundle<R> {
    fn is_app_bundle(&self) -> bool {
        self.is_app
    }

    fn metadata(&mut self) -> Result<AppMetadata, BundleError> {
        let path = self.entry(PartKind::Binary)?.path.clone();
        let entry = self.archive.by_name(&path).map_err(|e| missing(e, &path))?;
        let mut head = Vec::with_capacity(HEADER_LEN);
        entry.take(HEADER_LEN as u64).read_to_end(&mut head)?;
        Ok(AppHeader::parse(&head)?.metadata())
    }

    fn has_part(&self, kind: PartKind) -> bool {
        kind.is_mandatory() || self.parts.iter().any(|p| p.kind == kind)
    }

    fn part_size(&self, kind: PartKind) -> Result<u64, BundleError> {
        Ok(self.entry(kind)?.size)
    }

    fn part_bytes(&mut self, kind: PartKind) -> Result<Bytes, BundleError> {
        let PartEntry { path, size, .. } = self.entry(kind)?.clone();
        let mut entry = self.archive.by_name(&path).map_err(|e| missing(e, &path))?;
        let mut data = Vec::with_capacity(prealloc_len(size));
        entry.read_to_end(&mut data)?;
        Ok(Bytes::from(data))
    }
}

fn prealloc_len(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

fn missing(e: ZipError, path: &str) -> BundleError {
    match e {
        ZipError::FileNotFound => BundleError::MissingEntry(path.to_string()),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::testing::{app_binary, manifest, zip_bytes};
    use std::io::Cursor;
    use uuid::Uuid;

    fn bundle(files: &[(&str, &[u8])], platform: Option<&str>) -> PbwBundle<Cursor<Vec<u8>>> {
        PbwBundle::from_reader(Cursor::new(zip_bytes(files)), platform).unwrap()
    }

    #[test]
    fn reads_parts_and_sizes() {
        let uuid = Uuid::from_u128(42);
        let bin = app_binary(uuid, "Stopwatch", 200);
        let m = manifest(true, false);
        let mut b = bundle(
            &[
                ("manifest.json", m.as_bytes()),
                ("pebble-app.bin", &bin),
                ("app_resources.pbpack", &[1u8; 300]),
            ],
            None,
        );

        assert!(b.is_app_bundle());
        assert!(b.has_part(PartKind::Binary));
        assert!(b.has_part(PartKind::Resources));
        assert!(!b.has_part(PartKind::Worker));
        assert_eq!(b.part_size(PartKind::Binary).unwrap(), bin.len() as u64);
        assert_eq!(b.part_size(PartKind::Resources).unwrap(), 300);
        assert!(matches!(b.part_size(PartKind::Worker), Err(BundleError::MissingPart(PartKind::Worker))));

        let meta = b.metadata().unwrap();
        assert_eq!(meta.uuid, uuid);
        assert_eq!(meta.app_name, "Stopwatch");

        assert_eq!(b.part_bytes(PartKind::Binary).unwrap().as_ref(), &bin[..]);
        assert_eq!(b.part_bytes(PartKind::Resources).unwrap().len(), 300);
    }

    #[test]
    fn manifest_without_application_is_not_an_app() {
        let m = r#"{"manifestVersion":2,"type":"firmware","firmware":{"name":"tintin_fw.bin"}}"#;
        let b = bundle(&[("manifest.json", m.as_bytes())], None);
        assert!(!b.is_app_bundle());
    }

    #[test]
    fn platform_directory_is_preferred_when_present() {
        let root_bin = app_binary(Uuid::from_u128(1), "Root", 10);
        let basalt_bin = app_binary(Uuid::from_u128(1), "Basalt", 50);
        let m = manifest(false, true);
        let files: Vec<(&str, &[u8])> = vec![
            ("manifest.json", m.as_bytes()),
            ("pebble-app.bin", &root_bin),
            ("pebble-worker.bin", &[0u8; 4]),
            ("basalt/manifest.json", m.as_bytes()),
            ("basalt/pebble-app.bin", &basalt_bin),
            ("basalt/pebble-worker.bin", &[0u8; 8]),
        ];

        let mut b = bundle(&files, Some("basalt"));
        assert_eq!(b.platform_dir(), "basalt");
        assert_eq!(b.metadata().unwrap().app_name, "Basalt");
        assert_eq!(b.part_size(PartKind::Worker).unwrap(), 8);

        let mut b = bundle(&files, Some("chalk"));
        assert_eq!(b.platform_dir(), "");
        assert_eq!(b.metadata().unwrap().app_name, "Root");
        assert_eq!(b.part_size(PartKind::Worker).unwrap(), 4);
    }

    #[test]
    fn missing_referenced_entry_fails_open() {
        let m = manifest(true, false);
        let bin = app_binary(Uuid::nil(), "x", 0);
        let r = PbwBundle::from_reader(
            Cursor::new(zip_bytes(&[("manifest.json", m.as_bytes()), ("pebble-app.bin", &bin)])),
            None,
        );
        assert!(matches!(r, Err(BundleError::MissingEntry(p)) if p == "app_resources.pbpack"));
    }

    #[test]
    fn opens_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.pbw");
        let m = manifest(false, false);
        let bin = app_binary(Uuid::from_u128(5), "Disk", 16);
        std::fs::write(&path, zip_bytes(&[("manifest.json", m.as_bytes()), ("pebble-app.bin", &bin)])).unwrap();

        let mut b = PbwBundle::open(&path, None).unwrap();
        assert_eq!(b.metadata().unwrap().uuid, Uuid::from_u128(5));
    }

    #[test]
    fn declared_size_does_not_drive_huge_reservations() {
        assert_eq!(prealloc_len(300), 300);
        assert_eq!(prealloc_len(u64::MAX), MAX_PREALLOC as usize);
    }
}
