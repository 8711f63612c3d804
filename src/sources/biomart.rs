use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::config::{GlobalConfig, ModuleConfig, resolve_module_config};
use crate::download::Downloader;
use crate::error::PpidataError;
use crate::hash::ExpectedHash;
use crate::sources::{Source, field, lenient_int};

pub const MODULE_KEY: &str = "biomart";

/// BioMart REST query for human gene ID cross-references: Ensembl gene ID,
/// HGNC symbol, Entrez ID, UniProt/Swiss-Prot ID, RefSeq mRNA accession,
/// description.
const URL: &str = "http://www.ensembl.org/biomart/martservice?query=<?xml version='1.0' encoding='UTF-8'?><!DOCTYPE Query><Query virtualSchemaName='default' formatter='TSV' header='1' uniqueRows='1' datasetConfigVersion='0.6'><Dataset name='hsapiens_gene_ensembl' interface='default'><Attribute name='ensembl_gene_id'/><Attribute name='external_gene_name'/><Attribute name='entrezgene_id'/><Attribute name='uniprotswissprot'/><Attribute name='refseq_mrna'/><Attribute name='description'/></Dataset></Query>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomartSettings {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Default for BiomartSettings {
    fn default() -> Self {
        Self {
            filename: "biomart_gene_mapping.txt".to_string(),
            hash: None,
        }
    }
}

/// The identifier namespaces the mapping can convert between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneIdKind {
    Symbol,
    EnsemblGeneId,
    EntrezId,
    UniprotId,
    RefseqId,
}

impl FromStr for GeneIdKind {
    type Err = PpidataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "symbol" => Ok(GeneIdKind::Symbol),
            "ensembl_gene_id" => Ok(GeneIdKind::EnsemblGeneId),
            "entrez_id" => Ok(GeneIdKind::EntrezId),
            "uniprot_id" => Ok(GeneIdKind::UniprotId),
            "refseq_id" => Ok(GeneIdKind::RefseqId),
            other => Err(PpidataError::UnknownIdKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneRecord {
    pub ensembl_gene_id: String,
    pub symbol: String,
    pub entrez_id: Option<i64>,
    pub uniprot_id: String,
    pub refseq_id: String,
    pub description: String,
}

impl GeneRecord {
    pub fn value_of(&self, kind: GeneIdKind) -> Option<String> {
        let value = match kind {
            GeneIdKind::Symbol => &self.symbol,
            GeneIdKind::EnsemblGeneId => &self.ensembl_gene_id,
            GeneIdKind::EntrezId => return self.entrez_id.map(|id| id.to_string()),
            GeneIdKind::UniprotId => &self.uniprot_id,
            GeneIdKind::RefseqId => &self.refseq_id,
        };
        (!value.is_empty()).then(|| value.clone())
    }
}

/// The loaded BioMart gene-identifier mapping table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneMapping {
    pub records: Vec<GeneRecord>,
}

impl GeneMapping {
    /// Read the raw BioMart TSV (header row present). Ensembl gene IDs are
    /// prefixed with the human taxon (`9606.`) so they line up with STRING
    /// protein identifiers.
    pub fn load(path: &Path) -> Result<Self, PpidataError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|err| PpidataError::Table(format!("{}: {err}", path.display())))?;

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| PpidataError::Table(err.to_string()))?;
            records.push(GeneRecord {
                ensembl_gene_id: format!("9606.{}", field(&record, 0)),
                symbol: field(&record, 1),
                entrez_id: lenient_int(record.get(2)),
                uniprot_id: field(&record, 3),
                refseq_id: field(&record, 4),
                description: field(&record, 5),
            });
        }
        Ok(Self { records })
    }

    /// Symbol to Entrez lookup; on duplicate symbols the last row wins.
    pub fn symbol_to_entrez(&self) -> HashMap<String, i64> {
        let mut map = HashMap::new();
        for record in &self.records {
            if let Some(entrez) = record.entrez_id {
                if !record.symbol.is_empty() {
                    map.insert(record.symbol.clone(), entrez);
                }
            }
        }
        map
    }

    pub fn entrez_to_symbol(&self) -> HashMap<i64, String> {
        let mut map = HashMap::new();
        for record in &self.records {
            if let Some(entrez) = record.entrez_id {
                if !record.symbol.is_empty() {
                    map.insert(entrez, record.symbol.clone());
                }
            }
        }
        map
    }
}

fn resolve(config: Option<&GlobalConfig>) -> Result<ModuleConfig<BiomartSettings>, PpidataError> {
    resolve_module_config(config, MODULE_KEY, &BiomartSettings::default())
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

/// Load the gene mapping, downloading it first if necessary.
pub fn get(
    config: Option<&GlobalConfig>,
    downloader: &Downloader,
) -> Result<GeneMapping, PpidataError> {
    if !is_ready(config)? {
        download(config, downloader)?;
    }
    let path = file_path(config)?;
    tracing::info!("loading BioMart data from {path}");
    GeneMapping::load(path.as_std_path())
}

/// Convert gene identifiers between namespaces using the mapping table.
/// The first matching row wins; identifiers with no match (or an empty
/// target field) map to None.
pub fn convert_genes(
    data: &GeneMapping,
    input: &[String],
    input_type: GeneIdKind,
    output_type: GeneIdKind,
) -> BTreeMap<String, Option<String>> {
    let mut results = BTreeMap::new();
    for gene_id in input {
        let converted = data
            .records
            .iter()
            .find(|record| record.value_of(input_type).as_deref() == Some(gene_id.as_str()))
            .and_then(|record| record.value_of(output_type));
        results.insert(gene_id.clone(), converted);
    }
    results
}

pub struct Biomart;

impl Source for Biomart {
    fn name(&self) -> &'static str {
        "biomart"
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
