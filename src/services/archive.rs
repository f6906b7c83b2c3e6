//! Archive decomposition: open an uploaded ZIP fully in memory, enumerate
//! its entries, and pull out the OpenType fonts usable as browser previews.
//!
//! Only `.otf` entries become previews. Other formats inside the archive
//! (`.ttf`, `.woff`, license files, ...) stay untouched in the downloadable
//! archive the uploader stores verbatim.

use crate::models::archive::{ArchiveEntry, DecomposedArchive, ExtractedFont};
use crate::services::style::infer_style;
use bytes::Bytes;
use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive is not a valid ZIP: {0}")]
    InvalidArchive(#[from] ZipError),
    #[error("archive contains no .otf font files")]
    NoFontsFound,
}

/// Decompose an archive into its entry listing and extracted font buffers.
///
/// Fails with `InvalidArchive` when the bytes cannot be parsed as a ZIP and
/// with `NoFontsFound` when no `.otf` entry survives filtering — the latter
/// is terminal for the whole ingestion, since a bundle without previews is
/// considered incomplete. Performs no storage writes.
pub fn decompose(archive_bytes: &[u8]) -> Result<DecomposedArchive, ArchiveError> {
    let mut zip = ZipArchive::new(Cursor::new(archive_bytes))?;

    let mut entries = Vec::with_capacity(zip.len());
    let mut fonts = Vec::new();
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        entries.push(ArchiveEntry {
            name: entry.name().to_string(),
            size_bytes: entry.size() as i64,
            is_directory: entry.is_dir(),
        });
        if entry.is_dir() {
            continue;
        }
        let Some(file_name) = sanitize_entry_name(entry.name()) else {
            continue;
        };
        if !is_otf(&file_name) {
            continue;
        }
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf).map_err(ZipError::Io)?;
        fonts.push(ExtractedFont {
            style: infer_style(&file_name).to_string(),
            file_name,
            raw_bytes: Bytes::from(buf),
        });
    }

    if fonts.is_empty() {
        return Err(ArchiveError::NoFontsFound);
    }

    debug!(
        "decomposed archive: {} entries, {} preview-able fonts",
        entries.len(),
        fonts.len()
    );
    Ok(DecomposedArchive { entries, fonts })
}

/// Reduce an archive entry name to a safe base file name.
///
/// Strips path components (prevents `../` traversal into the previews
/// bucket) and rejects macOS resource-fork artifacts (`._*`).
fn sanitize_entry_name(entry_name: &str) -> Option<String> {
    Path::new(entry_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .filter(|name| !name.starts_with("._"))
        .map(|name| name.to_string())
}

fn is_otf(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("otf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::CompressionMethod;
    use zip::write::{FileOptions, ZipWriter};

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options =
                FileOptions::default().compression_method(CompressionMethod::Deflated);
            for (name, data) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer
    }

    #[test]
    fn extracts_only_otf_entries() {
        let bytes = build_zip(&[
            ("Aurora-Regular.otf", b"font-a"),
            ("Aurora-Bold.otf", b"font-b"),
            ("Aurora.ttf", b"truetype"),
            ("readme.txt", b"hello"),
        ]);

        let decomposed = decompose(&bytes).unwrap();
        assert_eq!(decomposed.entries.len(), 4);
        assert_eq!(decomposed.fonts.len(), 2);

        let names: Vec<&str> = decomposed
            .fonts
            .iter()
            .map(|f| f.file_name.as_str())
            .collect();
        assert_eq!(names, ["Aurora-Regular.otf", "Aurora-Bold.otf"]);
        assert_eq!(decomposed.fonts[0].style, "Regular");
        assert_eq!(decomposed.fonts[1].style, "Bold");
        assert_eq!(decomposed.fonts[1].raw_bytes.as_ref(), b"font-b");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let bytes = build_zip(&[("Aurora-Black.OTF", b"font")]);
        let decomposed = decompose(&bytes).unwrap();
        assert_eq!(decomposed.fonts.len(), 1);
        assert_eq!(decomposed.fonts[0].style, "Black");
    }

    #[test]
    fn nested_entries_lose_their_directories() {
        let bytes = build_zip(&[("fonts/desktop/Aurora-Thin.otf", b"font")]);
        let decomposed = decompose(&bytes).unwrap();
        assert_eq!(decomposed.fonts[0].file_name, "Aurora-Thin.otf");
    }

    #[test]
    fn skips_macos_resource_forks() {
        let bytes = build_zip(&[
            ("__MACOSX/._Aurora-Bold.otf", b"junk"),
            ("Aurora-Bold.otf", b"font"),
        ]);
        let decomposed = decompose(&bytes).unwrap();
        assert_eq!(decomposed.fonts.len(), 1);
        assert_eq!(decomposed.fonts[0].raw_bytes.as_ref(), b"font");
    }

    #[test]
    fn archive_without_fonts_is_rejected() {
        let bytes = build_zip(&[("image.png", b"png"), ("readme.txt", b"hi")]);
        assert!(matches!(
            decompose(&bytes),
            Err(ArchiveError::NoFontsFound)
        ));
    }

    #[test]
    fn garbage_bytes_are_an_invalid_archive() {
        assert!(matches!(
            decompose(b"definitely not a zip"),
            Err(ArchiveError::InvalidArchive(_))
        ));
    }
}
