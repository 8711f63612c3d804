use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use sha2::{Digest, Sha256, Sha512};

use crate::error::PpidataError;

const BLOCK_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Md5,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::Sha512 => write!(f, "sha512"),
            HashAlgorithm::Md5 => write!(f, "md5"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = PpidataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            "md5" => Ok(HashAlgorithm::Md5),
            other => Err(PpidataError::UnsupportedHashAlgorithm(other.to_string())),
        }
    }
}

/// An expected digest as written in config files: either a bare sha256 hex
/// string or `<algorithm>:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedHash {
    pub algorithm: HashAlgorithm,
    pub digest: String,
}

impl ExpectedHash {
    pub fn new(algorithm: HashAlgorithm, digest: impl Into<String>) -> Self {
        Self {
            algorithm,
            digest: digest.into(),
        }
    }
}

impl FromStr for ExpectedHash {
    type Err = PpidataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.split_once(':') {
            Some((algorithm, digest)) => Ok(Self {
                algorithm: algorithm.parse()?,
                digest: digest.to_string(),
            }),
            None => Ok(Self {
                algorithm: HashAlgorithm::Sha256,
                digest: trimmed.to_string(),
            }),
        }
    }
}

pub fn file_digest(path: &Path, algorithm: HashAlgorithm) -> Result<String, PpidataError> {
    let file = File::open(path)
        .map_err(|err| PpidataError::Filesystem(format!("open {}: {err}", path.display())))?;
    let digest = match algorithm {
        HashAlgorithm::Sha256 => digest_reader::<Sha256>(file),
        HashAlgorithm::Sha512 => digest_reader::<Sha512>(file),
        HashAlgorithm::Md5 => digest_reader::<Md5>(file),
    };
    digest.map_err(|err| PpidataError::Filesystem(format!("read {}: {err}", path.display())))
}

/// Case-sensitive comparison of the streamed digest against the expected
/// hex string.
pub fn verify_file(path: &Path, expected: &ExpectedHash) -> Result<bool, PpidataError> {
    Ok(file_digest(path, expected.algorithm)? == expected.digest)
}

fn digest_reader<D: Digest>(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = [0u8; BLOCK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_algorithm_names() {
        assert_eq!(
            "SHA256".parse::<HashAlgorithm>().unwrap(),
            HashAlgorithm::Sha256
        );
        let err = "crc32".parse::<HashAlgorithm>().unwrap_err();
        assert_matches!(err, PpidataError::UnsupportedHashAlgorithm(_));
    }

    #[test]
    fn parse_expected_hash_forms() {
        let bare: ExpectedHash = "abc123".parse().unwrap();
        assert_eq!(bare.algorithm, HashAlgorithm::Sha256);
        assert_eq!(bare.digest, "abc123");

        let tagged: ExpectedHash = "md5:deadbeef".parse().unwrap();
        assert_eq!(tagged.algorithm, HashAlgorithm::Md5);
        assert_eq!(tagged.digest, "deadbeef");
    }

    #[test]
    fn digest_known_value() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        // sha256 of "hello"
        let digest = file_digest(&path, HashAlgorithm::Sha256).unwrap();
        assert_eq!(
            digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );

        let expected = ExpectedHash::new(HashAlgorithm::Sha256, digest);
        assert!(verify_file(&path, &expected).unwrap());

        let wrong = ExpectedHash::new(HashAlgorithm::Sha256, "00");
        assert!(!verify_file(&path, &wrong).unwrap());
    }

    #[test]
    fn digest_missing_file() {
        let err = file_digest(Path::new("/nonexistent/x"), HashAlgorithm::Sha256).unwrap_err();
        assert_matches!(err, PpidataError::Filesystem(_));
    }
}
