use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use camino::Utf8PathBuf;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::config::{GlobalConfig, ModuleConfig, resolve_module_config};
use crate::download::Downloader;
use crate::error::PpidataError;
use crate::hash::ExpectedHash;
use crate::sources::{EdgeKind, Source, field, lenient_float, lenient_int};

pub const MODULE_KEY: &str = "stringdb";

/// STRING v12 human (9606) downloads.
const PPI_URL: &str = "https://stringdb-downloads.org/download/protein.links.full.v12.0/9606.protein.links.full.v12.0.txt.gz";
const PROTEIN_URL: &str = "https://stringdb-downloads.org/download/protein.info.v12.0/9606.protein.info.v12.0.txt.gz";

pub const EDGE_SOURCE: &str = "string_ppi";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSettings {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringDbSettings {
    #[serde(default = "default_ppi_resource")]
    pub ppi: ResourceSettings,
    #[serde(default = "default_protein_resource")]
    pub protein: ResourceSettings,
}

fn default_ppi_resource() -> ResourceSettings {
    ResourceSettings {
        filename: "string_ppi.txt.gz".to_string(),
        hash: None,
    }
}

fn default_protein_resource() -> ResourceSettings {
    ResourceSettings {
        filename: "string_protein.txt.gz".to_string(),
        hash: None,
    }
}

impl Default for StringDbSettings {
    fn default() -> Self {
        Self {
            ppi: default_ppi_resource(),
            protein: default_protein_resource(),
        }
    }
}

/// The STRING links table. Score columns are kept by header name so edge
/// queries can select among them (`combined_score`, `experiments`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringPpi {
    pub score_columns: Vec<String>,
    pub interactions: Vec<StringInteraction>,
}

/// One row of the links table; `scores` is aligned with
/// [`StringPpi::score_columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct StringInteraction {
    pub protein1: String,
    pub protein2: String,
    pub scores: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringProtein {
    pub string_protein_id: String,
    pub preferred_name: String,
    pub protein_size: Option<i64>,
    pub annotation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringEdge {
    pub node1: String,
    pub node2: String,
    pub scores: Vec<Option<f64>>,
    pub edge_type: Option<EdgeKind>,
    pub edge_source: &'static str,
}

/// Edge-query output: the selected score column names plus the rows, with
/// each row's `scores` aligned to `score_columns`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringEdgeList {
    pub score_columns: Vec<String>,
    pub edges: Vec<StringEdge>,
}

fn resolve(config: Option<&GlobalConfig>) -> Result<ModuleConfig<StringDbSettings>, PpidataError> {
    resolve_module_config(config, MODULE_KEY, &StringDbSettings::default())
}

pub fn ppi_path(config: Option<&GlobalConfig>) -> Result<Utf8PathBuf, PpidataError> {
    let cfg = resolve(config)?;
    Ok(cfg.data_dir.join(&cfg.settings.ppi.filename))
}

pub fn protein_path(config: Option<&GlobalConfig>) -> Result<Utf8PathBuf, PpidataError> {
    let cfg = resolve(config)?;
    Ok(cfg.data_dir.join(&cfg.settings.protein.filename))
}

/// Both the links and the protein-info file must be present.
pub fn is_ready(config: Option<&GlobalConfig>) -> Result<bool, PpidataError> {
    Ok(ppi_path(config)?.as_std_path().is_file()
        && protein_path(config)?.as_std_path().is_file())
}

/// Download both STRING files.
pub fn download(
    config: Option<&GlobalConfig>,
    downloader: &Downloader,
) -> Result<(), PpidataError> {
    let cfg = resolve(config)?;
    let ppi_hash = cfg
        .settings
        .ppi
        .hash
        .as_deref()
        .map(ExpectedHash::from_str)
        .transpose()?;
    let protein_hash = cfg
        .settings
        .protein
        .hash
        .as_deref()
        .map(ExpectedHash::from_str)
        .transpose()?;

    downloader.download_file(
        PPI_URL,
        &cfg.settings.ppi.filename,
        &cfg.data_dir,
        ppi_hash.as_ref(),
    )?;
    downloader.download_file(
        PROTEIN_URL,
        &cfg.settings.protein.filename,
        &cfg.data_dir,
        protein_hash.as_ref(),
    )?;
    Ok(())
}

/// Load the links table, downloading STRING first if necessary.
pub fn get(
    config: Option<&GlobalConfig>,
    downloader: &Downloader,
) -> Result<StringPpi, PpidataError> {
    if !is_ready(config)? {
        download(config, downloader)?;
    }
    let path = ppi_path(config)?;
    tracing::info!("loading STRING PPI from {path}");
    load_ppi(path.as_std_path())
}

/// Load the protein-info table, downloading STRING first if necessary.
pub fn get_protein_info(
    config: Option<&GlobalConfig>,
    downloader: &Downloader,
) -> Result<Vec<StringProtein>, PpidataError> {
    if !protein_path(config)?.as_std_path().is_file() {
        download(config, downloader)?;
    }
    let path = protein_path(config)?;
    tracing::info!("loading STRING protein info from {path}");
    load_protein_info(path.as_std_path())
}

/// Read the gzipped, space-delimited links file. The header names the two
/// protein columns followed by the score columns.
pub fn load_ppi(path: &Path) -> Result<StringPpi, PpidataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(true)
        .flexible(true)
        .from_reader(gz_reader(path)?);

    let headers = reader
        .headers()
        .map_err(|err| PpidataError::Table(err.to_string()))?;
    let score_columns: Vec<String> = headers.iter().skip(2).map(|name| name.to_string()).collect();

    let mut interactions = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| PpidataError::Table(err.to_string()))?;
        let scores = (2..2 + score_columns.len())
            .map(|index| lenient_float(record.get(index)))
            .collect();
        interactions.push(StringInteraction {
            protein1: field(&record, 0),
            protein2: field(&record, 1),
            scores,
        });
    }
    Ok(StringPpi {
        score_columns,
        interactions,
    })
}

/// Read the gzipped, tab-delimited protein-info file (header row present).
pub fn load_protein_info(path: &Path) -> Result<Vec<StringProtein>, PpidataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(gz_reader(path)?);

    let mut proteins = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| PpidataError::Table(err.to_string()))?;
        proteins.push(StringProtein {
            string_protein_id: field(&record, 0),
            preferred_name: field(&record, 1),
            protein_size: lenient_int(record.get(2)),
            annotation: field(&record, 3),
        });
    }
    Ok(proteins)
}

/// Subset the links table to edges between `sources` (and optionally from
/// sources to `target`), with gene symbols translated to STRING protein
/// IDs through the protein-info table and back for the output nodes.
///
/// `score_columns` picks which link scores each edge carries; an unknown
/// name is an error rather than a silently empty column.
pub fn get_edges(
    db: &StringPpi,
    info: &[StringProtein],
    sources: &[String],
    target: Option<&str>,
    include_type: bool,
    score_columns: &[&str],
) -> Result<StringEdgeList, PpidataError> {
    let mut indices = Vec::with_capacity(score_columns.len());
    for name in score_columns {
        let index = db
            .score_columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| PpidataError::MissingScoreColumn(name.to_string()))?;
        indices.push(index);
    }
    let selected: Vec<String> = score_columns.iter().map(|name| name.to_string()).collect();

    let mut symbol_to_protein = HashMap::new();
    let mut protein_to_symbol = HashMap::new();
    for protein in info {
        symbol_to_protein.insert(protein.preferred_name.clone(), protein.string_protein_id.clone());
        protein_to_symbol.insert(protein.string_protein_id.clone(), protein.preferred_name.clone());
    }

    let mut source_proteins = Vec::new();
    for gene in sources {
        match symbol_to_protein.get(gene.as_str()) {
            Some(id) => source_proteins.push(id.clone()),
            None => tracing::warn!("could not find STRING protein ID for gene '{gene}'"),
        }
    }
    let target_protein = target.and_then(|gene| {
        let id = symbol_to_protein.get(gene).cloned();
        if id.is_none() {
            tracing::warn!("could not find STRING protein ID for target '{gene}'");
        }
        id
    });

    if source_proteins.is_empty() {
        return Ok(StringEdgeList {
            score_columns: selected,
            edges: Vec::new(),
        });
    }
    let source_set: HashSet<&str> = source_proteins.iter().map(String::as_str).collect();

    let symbol_for = |protein: &str| {
        protein_to_symbol
            .get(protein)
            .cloned()
            .unwrap_or_else(|| protein.to_string())
    };

    let mut edges = Vec::new();
    for row in &db.interactions {
        let a = row.protein1.as_str();
        let b = row.protein2.as_str();
        let kind = if source_set.contains(a) && source_set.contains(b) {
            EdgeKind::WithinCluster
        } else if target_protein.as_deref().is_some_and(|t| {
            (source_set.contains(a) && b == t) || (a == t && source_set.contains(b))
        }) {
            EdgeKind::ToTarget
        } else {
            continue;
        };
        edges.push(StringEdge {
            node1: symbol_for(a),
            node2: symbol_for(b),
            scores: indices.iter().map(|&index| row.scores.get(index).copied().flatten()).collect(),
            edge_type: include_type.then_some(kind),
            edge_source: EDGE_SOURCE,
        });
    }
    Ok(StringEdgeList {
        score_columns: selected,
        edges,
    })
}

fn gz_reader(path: &Path) -> Result<GzDecoder<File>, PpidataError> {
    let file = File::open(path)
        .map_err(|err| PpidataError::Filesystem(format!("open {}: {err}", path.display())))?;
    Ok(GzDecoder::new(file))
}

pub struct StringDb;

impl Source for StringDb {
    fn name(&self) -> &'static str {
        "stringdb"
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
