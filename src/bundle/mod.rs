//! Read-only access to an application bundle.

pub mod header;
pub mod pbw;

#[cfg(test)]
pub(crate) mod testing;

use bytes::Bytes;

use crate::core::model::{AppMetadata, PartKind};

pub use pbw::PbwBundle;

#[derive(thiserror::Error, Debug)]
pub enum BundleError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("manifest.json: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("bundle has no entry {0}")]
    MissingEntry(String),

    #[error("bundle has no {0} part")]
    MissingPart(PartKind),

    #[error("bad app header: {0}")]
    BadHeader(String),

    #[error("part sizes overflow a 64-bit total")]
    SizeOverflow,
}

pub trait BundleReader: Send {
    fn is_app_bundle(&self) -> bool;

    fn metadata(&mut self) -> Result<AppMetadata, BundleError>;

    /// The binary part is always reported present.
    fn has_part(&self, kind: PartKind) -> bool;

    fn part_size(&self, kind: PartKind) -> Result<u64, BundleError>;

    fn part_bytes(&mut self, kind: PartKind) -> Result<Bytes, BundleError>;
}
