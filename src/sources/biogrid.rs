use std::path::Path;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::archive::download_zip;
use crate::config::{GlobalConfig, ModuleConfig, resolve_module_config};
use crate::download::Downloader;
use crate::error::PpidataError;
use crate::hash::ExpectedHash;
use crate::sources::{Source, field};

pub const MODULE_KEY: &str = "biogrid";

const URL: &str = "https://downloads.thebiogrid.org/Download/BioGRID/Release-Archive/BIOGRID-5.0.252/BIOGRID-ORGANISM-5.0.252.mitab.zip";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiogridSettings {
    pub folder_name: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Default for BiogridSettings {
    fn default() -> Self {
        Self {
            folder_name: "biogrid".to_string(),
            file: "BIOGRID-ORGANISM-Homo_sapiens-5.0.252.mitab.txt".to_string(),
            hash: None,
        }
    }
}

/// One PSI-MITAB 2.5 row from the BioGRID human subset. All columns kept
/// as text; MITAB packs lists and key:value pairs into the fields.
#[derive(Debug, Clone, PartialEq)]
pub struct BiogridInteraction {
    pub id_a: String,
    pub id_b: String,
    pub alt_id_a: String,
    pub alt_id_b: String,
    pub aliases_a: String,
    pub aliases_b: String,
    pub detection_methods: String,
    pub first_authors: String,
    pub publication_ids: String,
    pub taxonomy_id_a: String,
    pub taxonomy_id_b: String,
    pub interaction_types: String,
    pub source_databases: String,
    pub interaction_ids: String,
    pub confidence_scores: String,
}

fn resolve(config: Option<&GlobalConfig>) -> Result<ModuleConfig<BiogridSettings>, PpidataError> {
    resolve_module_config(config, MODULE_KEY, &BiogridSettings::default())
}

pub fn file_path(config: Option<&GlobalConfig>) -> Result<Utf8PathBuf, PpidataError> {
    let cfg = resolve(config)?;
    Ok(cfg
        .data_dir
        .join(&cfg.settings.folder_name)
        .join(&cfg.settings.file))
}

pub fn is_ready(config: Option<&GlobalConfig>) -> Result<bool, PpidataError> {
    Ok(file_path(config)?.as_std_path().is_file())
}

/// Download and extract the BioGRID organism archive.
pub fn download(
    config: Option<&GlobalConfig>,
    downloader: &Downloader,
) -> Result<(), PpidataError> {
    let cfg = resolve(config)?;
    let expected = cfg
        .settings
        .hash
        .as_deref()
        .map(ExpectedHash::from_str)
        .transpose()?;
    download_zip(
        downloader,
        URL,
        &cfg.settings.folder_name,
        &cfg.data_dir,
        expected.as_ref(),
    )?;
    Ok(())
}

/// Load the human MITAB table, downloading and extracting the archive
/// first if necessary.
pub fn get(
    config: Option<&GlobalConfig>,
    downloader: &Downloader,
) -> Result<Vec<BiogridInteraction>, PpidataError> {
    if !is_ready(config)? {
        download(config, downloader)?;
    }
    let path = file_path(config)?;
    tracing::info!("loading BioGRID human data from {path}");
    load(path.as_std_path())
}

/// Read the raw MITAB TSV: no header row, `#` comment lines skipped.
pub fn load(path: &Path) -> Result<Vec<BiogridInteraction>, PpidataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_path(path)
        .map_err(|err| PpidataError::Table(format!("{}: {err}", path.display())))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| PpidataError::Table(err.to_string()))?;
        rows.push(BiogridInteraction {
            id_a: field(&record, 0),
            id_b: field(&record, 1),
            alt_id_a: field(&record, 2),
            alt_id_b: field(&record, 3),
            aliases_a: field(&record, 4),
            aliases_b: field(&record, 5),
            detection_methods: field(&record, 6),
            first_authors: field(&record, 7),
            publication_ids: field(&record, 8),
            taxonomy_id_a: field(&record, 9),
            taxonomy_id_b: field(&record, 10),
            interaction_types: field(&record, 11),
            source_databases: field(&record, 12),
            interaction_ids: field(&record, 13),
            confidence_scores: field(&record, 14),
        });
    }
    Ok(rows)
}

pub struct Biogrid;

impl Source for Biogrid {
    fn name(&self) -> &'static str {
        "biogrid"
    }

    fn is_ready(&self, config: Option<&GlobalConfig>) -> Result<bool, PpidataError> {
        is_ready(config)
    }

    fn download(
        &self,
        config: Option<&GlobalConfig>,
        downloader: &Downloader,
    ) -> Result<(), PpidataError> {
        download(config, downloader)
    }
}
