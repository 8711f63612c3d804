use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, RANGE, USER_AGENT};

use crate::error::PpidataError;
use crate::hash::{ExpectedHash, file_digest, verify_file};

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Byte-stream access to a remote resource. `offset` > 0 requests the tail
/// of the resource starting at that byte, for resuming partial downloads.
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &str, offset: u64) -> Result<Box<dyn Read>, PpidataError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, PpidataError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ppidata/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PpidataError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .build()
            .map_err(|err| PpidataError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn send_with_retries(
        &self,
        url: &str,
        offset: u64,
    ) -> Result<reqwest::blocking::Response, PpidataError> {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let mut request = self.client.get(url);
            if offset > 0 {
                request = request.header(RANGE, format!("bytes={offset}-"));
            }
            match request.send() {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(PpidataError::Http(err.to_string()));
                }
            }
        }
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str, offset: u64) -> Result<Box<dyn Read>, PpidataError> {
        let response = self.send_with_retries(url, offset)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "request failed".to_string());
            return Err(PpidataError::HttpStatus { status, message });
        }
        Ok(Box::new(response))
    }
}

pub struct Downloader {
    transport: Box<dyn Transport>,
    chunk_size: usize,
}

impl Downloader {
    pub fn new() -> Result<Self, PpidataError> {
        Ok(Self::with_transport(Box::new(HttpTransport::new()?)))
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Fetch `url` into `base_dir/filename`, resuming a partial file and
    /// skipping the transfer entirely when the destination already exists
    /// and matches the expected hash (or no hash is expected).
    ///
    /// On a hash mismatch the partially-written file stays on disk for
    /// inspection; re-running resumes or re-verifies it.
    pub fn download_file(
        &self,
        url: &str,
        filename: &str,
        base_dir: &Utf8Path,
        expected: Option<&ExpectedHash>,
    ) -> Result<Utf8PathBuf, PpidataError> {
        let path = base_dir.join(filename);

        if path.as_std_path().exists() {
            let verified = match expected {
                Some(expected) => verify_file(path.as_std_path(), expected)?,
                None => true,
            };
            if verified {
                tracing::info!("{filename} already verified: {path}");
                return Ok(path);
            }
        }

        let offset = fs::metadata(path.as_std_path()).map(|meta| meta.len()).unwrap_or(0);
        tracing::info!(
            "downloading {filename} ({})",
            if offset > 0 { "resuming" } else { "starting" }
        );

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| PpidataError::Filesystem(err.to_string()))?;
        }

        let mut body = self.transport.fetch(url, offset)?;
        let mut file = if offset > 0 {
            OpenOptions::new().append(true).open(path.as_std_path())
        } else {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path.as_std_path())
        }
        .map_err(|err| PpidataError::Filesystem(format!("open {path}: {err}")))?;

        let bar = transfer_bar(filename);
        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let read = body
                .read(&mut buffer)
                .map_err(|err| PpidataError::Http(err.to_string()))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .map_err(|err| PpidataError::Filesystem(err.to_string()))?;
            bar.inc(read as u64);
        }
        bar.finish_and_clear();

        if let Some(expected) = expected {
            let actual = file_digest(path.as_std_path(), expected.algorithm)?;
            if actual != expected.digest {
                return Err(PpidataError::HashMismatch {
                    filename: filename.to_string(),
                    expected: expected.digest.clone(),
                    actual,
                });
            }
        }

        tracing::info!("{filename} ready: {path}");
        Ok(path)
    }
}

fn transfer_bar(filename: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.blue} {prefix:.cyan} {bytes} ({bytes_per_sec})")
    {
        bar.set_style(style);
    }
    bar.set_prefix(filename.to_string());
    bar
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
