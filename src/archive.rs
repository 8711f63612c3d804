use std::fs;
use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::download::Downloader;
use crate::error::PpidataError;
use crate::hash::ExpectedHash;

pub const MARKER_FILENAME: &str = ".ppidata-extracted.json";

/// Sentinel written inside an extraction directory after every archive
/// entry has been unpacked. Its presence, not "directory is non-empty",
/// marks the extraction as complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionMarker {
    pub source_url: String,
    pub extracted_at: String,
    pub tool: String,
}

pub fn is_extracted(dir: &Utf8Path) -> bool {
    dir.join(MARKER_FILENAME).as_std_path().is_file()
}

/// Ensure the contents of the ZIP at `url` exist under
/// `base_dir/extract_folder`.
///
/// The archive is downloaded to `temp_<folder>.zip` under `base_dir`
/// (any stale temp file is removed first, so archive transfers never
/// resume), extracted, and the temp file deleted. A corrupt archive
/// leaves the temp file on disk for inspection.
pub fn download_zip(
    downloader: &Downloader,
    url: &str,
    extract_folder: &str,
    base_dir: &Utf8Path,
    expected: Option<&ExpectedHash>,
) -> Result<Utf8PathBuf, PpidataError> {
    let extract_path = base_dir.join(extract_folder);

    if is_extracted(&extract_path) {
        tracing::info!("{extract_folder} already extracted: {extract_path}");
        return Ok(extract_path);
    }

    let temp_name = format!("temp_{extract_folder}.zip");
    let temp_path = base_dir.join(&temp_name);
    if temp_path.as_std_path().exists() {
        fs::remove_file(temp_path.as_std_path())
            .map_err(|err| PpidataError::Filesystem(err.to_string()))?;
    }

    downloader.download_file(url, &temp_name, base_dir, expected)?;

    tracing::info!("extracting to {extract_path}");
    fs::create_dir_all(extract_path.as_std_path())
        .map_err(|err| PpidataError::Filesystem(err.to_string()))?;
    if let Err(err) = extract_zip(temp_path.as_std_path(), extract_path.as_std_path()) {
        tracing::warn!("extraction failed, archive kept at {temp_path}");
        return Err(err);
    }

    write_marker(&extract_path, url)?;
    fs::remove_file(temp_path.as_std_path())
        .map_err(|err| PpidataError::Filesystem(err.to_string()))?;

    tracing::info!("{extract_folder} extracted: {extract_path}");
    Ok(extract_path)
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), PpidataError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| PpidataError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|err| PpidataError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| PpidataError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(PpidataError::Archive(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| PpidataError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| PpidataError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| PpidataError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| PpidataError::Filesystem(err.to_string()))?;
    }
    Ok(())
}

fn write_marker(extract_path: &Utf8Path, url: &str) -> Result<(), PpidataError> {
    let marker = ExtractionMarker {
        source_url: url.to_string(),
        extracted_at: chrono::Utc::now().to_rfc3339(),
        tool: format!("ppidata/{}", env!("CARGO_PKG_VERSION")),
    };
    let content = serde_json::to_vec_pretty(&marker)
        .map_err(|err| PpidataError::Filesystem(err.to_string()))?;
    fs::write(extract_path.join(MARKER_FILENAME).as_std_path(), content)
        .map_err(|err| PpidataError::Filesystem(err.to_string()))
}
