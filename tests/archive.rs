use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use ppidata::archive::{MARKER_FILENAME, download_zip, is_extracted};
use ppidata::download::{Downloader, Transport};
use ppidata::error::PpidataError;

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

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn download_extracts_marks_and_cleans_up() {
    let temp = tempfile::tempdir().unwrap();
    let base = utf8_dir(&temp);
    let archive = zip_bytes(&[
        ("inner/table.txt", b"a\tb\n".as_slice()),
        ("readme.txt", b"hello".as_slice()),
    ]);

    let (downloader, _offsets) = downloader_for(archive);
    let extracted = download_zip(&downloader, "http://example.org/a.zip", "biogrid", &base, None)
        .unwrap();

    assert_eq!(extracted, base.join("biogrid"));
    assert!(extracted.join("inner").join("table.txt").as_std_path().is_file());
    assert!(extracted.join("readme.txt").as_std_path().is_file());
    assert!(extracted.join(MARKER_FILENAME).as_std_path().is_file());
    assert!(is_extracted(&extracted));
    assert!(!base.join("temp_biogrid.zip").as_std_path().exists());
}

#[test]
fn completion_marker_short_circuits() {
    let temp = tempfile::tempdir().unwrap();
    let base = utf8_dir(&temp);
    let dir = base.join("biogrid");
    std::fs::create_dir_all(dir.as_std_path()).unwrap();
    std::fs::write(dir.join(MARKER_FILENAME).as_std_path(), "{}").unwrap();

    let (downloader, offsets) = downloader_for(Vec::new());
    let extracted = download_zip(&downloader, "http://example.org/a.zip", "biogrid", &base, None)
        .unwrap();

    assert_eq!(extracted, dir);
    assert!(offsets.lock().unwrap().is_empty());
}

#[test]
fn non_empty_directory_without_marker_is_not_done() {
    // A half-extracted directory must not pass for complete.
    let temp = tempfile::tempdir().unwrap();
    let base = utf8_dir(&temp);
    let dir = base.join("biogrid");
    std::fs::create_dir_all(dir.as_std_path()).unwrap();
    std::fs::write(dir.join("partial.txt").as_std_path(), "truncated").unwrap();

    let archive = zip_bytes(&[("full.txt", b"complete".as_slice())]);
    let (downloader, offsets) = downloader_for(archive);
    let extracted = download_zip(&downloader, "http://example.org/a.zip", "biogrid", &base, None)
        .unwrap();

    assert_eq!(offsets.lock().unwrap().len(), 1);
    assert!(extracted.join("full.txt").as_std_path().is_file());
    assert!(is_extracted(&extracted));
}

#[test]
fn corrupt_archive_is_kept_for_inspection() {
    let temp = tempfile::tempdir().unwrap();
    let base = utf8_dir(&temp);

    let (downloader, _offsets) = downloader_for(b"this is not a zip file".to_vec());
    let err = download_zip(&downloader, "http://example.org/a.zip", "biogrid", &base, None)
        .unwrap_err();

    assert_matches!(err, PpidataError::Archive(_));
    assert!(base.join("temp_biogrid.zip").as_std_path().is_file());
    assert!(!is_extracted(&base.join("biogrid")));
}

#[test]
fn stale_temp_archive_is_replaced() {
    let temp = tempfile::tempdir().unwrap();
    let base = utf8_dir(&temp);
    std::fs::write(base.join("temp_biogrid.zip").as_std_path(), b"stale garbage").unwrap();

    let archive = zip_bytes(&[("data.txt", b"fresh".as_slice())]);
    let (downloader, offsets) = downloader_for(archive);
    let extracted = download_zip(&downloader, "http://example.org/a.zip", "biogrid", &base, None)
        .unwrap();

    // The stale file was removed, so the transfer started from scratch.
    assert_eq!(offsets.lock().unwrap().as_slice(), &[0]);
    assert!(extracted.join("data.txt").as_std_path().is_file());
}
