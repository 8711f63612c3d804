use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::config::{GlobalConfig, ModuleConfig, resolve_module_config};
use crate::download::Downloader;
use crate::error::PpidataError;
use crate::hash::ExpectedHash;
use crate::sources::biomart::GeneMapping;
use crate::sources::{EdgeKind, Source, field, lenient_float, lenient_int};

pub const MODULE_KEY: &str = "hippie";

const URL: &str = "https://cbdm-01.zdv.uni-mainz.de/~mschaefer/hippie/hippie_current.txt";

pub const EDGE_SOURCE: &str = "hippie_ppi";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HippieSettings {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Default for HippieSettings {
    fn default() -> Self {
        Self {
            filename: "hippie_ppi.txt".to_string(),
            hash: None,
        }
    }
}

/// One scored interaction from the HIPPIE table. Entrez columns are
/// nullable: rows with unparseable IDs load, they just never match an
/// edge query.
#[derive(Debug, Clone, PartialEq)]
pub struct HippieInteraction {
    pub uniprot_id_1: String,
    pub entrez_id_1: Option<i64>,
    pub uniprot_id_2: String,
    pub entrez_id_2: Option<i64>,
    pub score: Option<f64>,
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HippieEdge {
    pub node1: String,
    pub node2: String,
    pub score: Option<f64>,
    pub comments: String,
    pub edge_type: Option<EdgeKind>,
    pub edge_source: &'static str,
}

fn resolve(config: Option<&GlobalConfig>) -> Result<ModuleConfig<HippieSettings>, PpidataError> {
    resolve_module_config(config, MODULE_KEY, &HippieSettings::default())
}

pub fn file_path(config: Option<&GlobalConfig>) -> Result<Utf8PathBuf, PpidataError> {
    let cfg = resolve(config)?;
    Ok(cfg.data_dir.join(&cfg.settings.filename))
}

pub fn is_ready(config: Option<&GlobalConfig>) -> Result<bool, PpidataError> {
    Ok(file_path(config)?.as_std_path().is_file())
}

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
    downloader.download_file(URL, &cfg.settings.filename, &cfg.data_dir, expected.as_ref())?;
    Ok(())
}

/// Load the HIPPIE interaction table, downloading it first if necessary.
pub fn get(
    config: Option<&GlobalConfig>,
    downloader: &Downloader,
) -> Result<Vec<HippieInteraction>, PpidataError> {
    if !is_ready(config)? {
        download(config, downloader)?;
    }
    let path = file_path(config)?;
    tracing::info!("loading HIPPIE data from {path}");
    load(path.as_std_path())
}

/// Read the raw HIPPIE TSV (no header row, six columns).
pub fn load(path: &Path) -> Result<Vec<HippieInteraction>, PpidataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|err| PpidataError::Table(format!("{}: {err}", path.display())))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| PpidataError::Table(err.to_string()))?;
        rows.push(HippieInteraction {
            uniprot_id_1: field(&record, 0),
            entrez_id_1: lenient_int(record.get(1)),
            uniprot_id_2: field(&record, 2),
            entrez_id_2: lenient_int(record.get(3)),
            score: lenient_float(record.get(4)),
            comments: field(&record, 5),
        });
    }
    Ok(rows)
}

/// Subset the interaction table to edges between `sources` (and optionally
/// from sources to `target`), with gene symbols translated to Entrez IDs
/// through the BioMart mapping and back again for the output nodes.
///
/// Symbols missing from the mapping are logged and skipped, never fatal.
/// Nodes whose Entrez ID has no symbol fall back to the numeric ID as text.
pub fn get_edges(
    db: &[HippieInteraction],
    mapping: &GeneMapping,
    sources: &[String],
    target: Option<&str>,
    include_type: bool,
) -> Vec<HippieEdge> {
    let symbol_to_entrez = mapping.symbol_to_entrez();

    let mut source_ids = Vec::new();
    for gene in sources {
        match symbol_to_entrez.get(gene.as_str()) {
            Some(id) => source_ids.push(*id),
            None => tracing::warn!("could not find Entrez ID for gene '{gene}'"),
        }
    }
    let target_id = target.and_then(|gene| {
        let id = symbol_to_entrez.get(gene).copied();
        if id.is_none() {
            tracing::warn!("could not find Entrez ID for target gene '{gene}'");
        }
        id
    });

    if source_ids.is_empty() {
        tracing::warn!("no valid Entrez IDs found for source genes");
        return Vec::new();
    }
    let source_set: HashSet<i64> = source_ids.into_iter().collect();

    let entrez_to_symbol = mapping.entrez_to_symbol();
    let symbol_for = |entrez: i64| {
        entrez_to_symbol
            .get(&entrez)
            .cloned()
            .unwrap_or_else(|| entrez.to_string())
    };

    let mut edges = Vec::new();
    for row in db {
        let (Some(a), Some(b)) = (row.entrez_id_1, row.entrez_id_2) else {
            continue;
        };
        let kind = if source_set.contains(&a) && source_set.contains(&b) {
            EdgeKind::WithinCluster
        } else if target_id.is_some_and(|t| {
            (source_set.contains(&a) && b == t) || (a == t && source_set.contains(&b))
        }) {
            EdgeKind::ToTarget
        } else {
            continue;
        };
        edges.push(HippieEdge {
            node1: symbol_for(a),
            node2: symbol_for(b),
            score: row.score,
            comments: row.comments.clone(),
            edge_type: include_type.then_some(kind),
            edge_source: EDGE_SOURCE,
        });
    }
    edges
}

pub struct Hippie;

impl Source for Hippie {
    fn name(&self) -> &'static str {
        "hippie"
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
