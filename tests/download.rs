use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use ppidata::download::{Downloader, Transport};
use ppidata::error::PpidataError;
use ppidata::hash::{ExpectedHash, HashAlgorithm, file_digest};

/// Serves a fixed byte buffer, honoring resume offsets, and records every
/// offset it was asked for.
struct MockTransport {
    data: Vec<u8>,
    offsets: Arc<Mutex<Vec<u64>>>,
}

impl Transport for MockTransport {
    fn fetch(&self, _url: &str, offset: u64) -> Result<Box<dyn Read>, PpidataError> {
        self.offsets.lock().unwrap().push(offset);
        let tail = self.data[offset as usize..].to_vec();
        Ok(Box::new(io::Cursor::new(tail)))
    }
}

fn downloader_for(data: Vec<u8>) -> (Downloader, Arc<Mutex<Vec<u64>>>) {
    let offsets = Arc::new(Mutex::new(Vec::new()));
    let transport = MockTransport {
        data,
        offsets: Arc::clone(&offsets),
    };
    (Downloader::with_transport(Box::new(transport)), offsets)
}

fn utf8_dir(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}

fn payload() -> Vec<u8> {
    (0..1000u32).map(|i| (i % 251) as u8).collect()
}

#[test]
fn verified_file_skips_the_network() {
    let temp = tempfile::tempdir().unwrap();
    let base = utf8_dir(&temp);
    let existing = base.join("data.txt");
    std::fs::write(existing.as_std_path(), payload()).unwrap();
    let digest = file_digest(existing.as_std_path(), HashAlgorithm::Sha256).unwrap();
    let expected = ExpectedHash::new(HashAlgorithm::Sha256, digest);

    let (downloader, offsets) = downloader_for(payload());
    let path = downloader
        .download_file("http://example.org/data.txt", "data.txt", &base, Some(&expected))
        .unwrap();

    assert_eq!(path, existing);
    assert!(offsets.lock().unwrap().is_empty());
}

#[test]
fn existing_file_without_expected_hash_skips_the_network() {
    let temp = tempfile::tempdir().unwrap();
    let base = utf8_dir(&temp);
    std::fs::write(base.join("data.txt").as_std_path(), b"whatever").unwrap();

    let (downloader, offsets) = downloader_for(payload());
    downloader
        .download_file("http://example.org/data.txt", "data.txt", &base, None)
        .unwrap();

    assert!(offsets.lock().unwrap().is_empty());
}

#[test]
fn fresh_download_starts_at_offset_zero() {
    let temp = tempfile::tempdir().unwrap();
    let base = utf8_dir(&temp);

    let (downloader, offsets) = downloader_for(payload());
    let path = downloader
        .download_file("http://example.org/data.txt", "data.txt", &base, None)
        .unwrap();

    assert_eq!(offsets.lock().unwrap().as_slice(), &[0]);
    assert_eq!(std::fs::read(path.as_std_path()).unwrap(), payload());
}

#[test]
fn partial_file_resumes_and_completes() {
    let temp = tempfile::tempdir().unwrap();
    let base = utf8_dir(&temp);
    let full = payload();
    std::fs::write(base.join("data.txt").as_std_path(), &full[..400]).unwrap();

    let reference = base.join("reference.bin");
    std::fs::write(reference.as_std_path(), &full).unwrap();
    let digest = file_digest(reference.as_std_path(), HashAlgorithm::Sha256).unwrap();
    let expected = ExpectedHash::new(HashAlgorithm::Sha256, digest);

    let (downloader, offsets) = downloader_for(full.clone());
    let path = downloader
        .download_file("http://example.org/data.txt", "data.txt", &base, Some(&expected))
        .unwrap();

    assert_eq!(offsets.lock().unwrap().as_slice(), &[400]);
    let on_disk = std::fs::read(path.as_std_path()).unwrap();
    assert_eq!(on_disk.len(), 1000);
    assert_eq!(on_disk, full);
}

#[test]
fn hash_mismatch_keeps_the_file_on_disk() {
    let temp = tempfile::tempdir().unwrap();
    let base = utf8_dir(&temp);
    let expected = ExpectedHash::new(HashAlgorithm::Sha256, "0".repeat(64));

    let (downloader, _offsets) = downloader_for(payload());
    let err = downloader
        .download_file("http://example.org/data.txt", "data.txt", &base, Some(&expected))
        .unwrap_err();

    assert_matches!(err, PpidataError::HashMismatch { .. });
    let kept = base.join("data.txt");
    assert_eq!(std::fs::read(kept.as_std_path()).unwrap(), payload());
}

#[test]
fn parent_directories_are_created() {
    let temp = tempfile::tempdir().unwrap();
    let base = utf8_dir(&temp).join("nested").join("deep");

    let (downloader, _offsets) = downloader_for(payload());
    let path = downloader
        .download_file("http://example.org/data.txt", "data.txt", &base, None)
        .unwrap();

    assert!(path.as_std_path().is_file());
}
