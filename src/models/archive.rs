//! Transient types produced while decomposing an uploaded ZIP archive.

use bytes::Bytes;

/// A single file inside an uploaded archive.
///
/// Exists only during decomposition; never persisted.
#[derive(Clone, Debug)]
pub struct ArchiveEntry {
    /// Relative path of the entry within the archive.
    pub name: String,

    /// Uncompressed size in bytes.
    pub size_bytes: i64,

    /// Whether the entry is a directory.
    pub is_directory: bool,
}

/// A font file pulled out of an archive entry.
///
/// Consumed by the uploader and discarded once its bytes have landed in the
/// previews bucket.
#[derive(Clone, Debug)]
pub struct ExtractedFont {
    /// Base file name of the font (path components stripped).
    pub file_name: String,

    /// Style label inferred from the file name, defaulting to "Regular".
    pub style: String,

    /// Uncompressed font bytes.
    pub raw_bytes: Bytes,
}

/// Everything pulled out of one archive: the full entry listing plus the
/// subset of entries usable as browser previews.
#[derive(Clone, Debug)]
pub struct DecomposedArchive {
    pub entries: Vec<ArchiveEntry>,
    pub fonts: Vec<ExtractedFont>,
}
