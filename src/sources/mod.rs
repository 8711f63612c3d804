use std::fmt;

use crate::config::GlobalConfig;
use crate::download::Downloader;
use crate::error::PpidataError;

pub mod biogrid;
pub mod biomart;
pub mod hippie;
pub mod stringdb;

/// Why an edge was selected when subsetting an interaction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    WithinCluster,
    ToTarget,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::WithinCluster => "within_cluster",
            EdgeKind::ToTarget => "to_target",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A downloadable data source, registered with [`all_sources`] so `setup`
/// can iterate over every declared dataset.
pub trait Source: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_ready(&self, config: Option<&GlobalConfig>) -> Result<bool, PpidataError>;
    fn download(
        &self,
        config: Option<&GlobalConfig>,
        downloader: &Downloader,
    ) -> Result<(), PpidataError>;
}

pub fn all_sources() -> Vec<Box<dyn Source>> {
    vec![
        Box::new(hippie::Hippie),
        Box::new(biomart::Biomart),
        Box::new(stringdb::StringDb),
        Box::new(biogrid::Biogrid),
    ]
}

/// Download every source that is not already present locally.
pub fn ensure_all_data(
    config: Option<&GlobalConfig>,
    downloader: &Downloader,
) -> Result<(), PpidataError> {
    let mut missing = Vec::new();
    for source in all_sources() {
        if !source.is_ready(config)? {
            missing.push(source);
        }
    }

    if !missing.is_empty() {
        tracing::info!("downloading {} missing sources", missing.len());
        for source in &missing {
            tracing::info!("fetching {}", source.name());
            source.download(config, downloader)?;
        }
    }

    tracing::info!("all data ready");
    Ok(())
}

/// Numeric coercion for identifier columns: unparseable values become None
/// instead of failing the load. Integral floats ("7157.0") are accepted.
pub(crate) fn lenient_int(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == "-" {
        return None;
    }
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.fract() == 0.0 && value.abs() < i64::MAX as f64).then_some(value as i64)
}

pub(crate) fn lenient_float(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse().ok()
}

pub(crate) fn field(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_int_coercions() {
        assert_eq!(lenient_int(Some("7157")), Some(7157));
        assert_eq!(lenient_int(Some("7157.0")), Some(7157));
        assert_eq!(lenient_int(Some("7157.5")), None);
        assert_eq!(lenient_int(Some("-")), None);
        assert_eq!(lenient_int(Some("")), None);
        assert_eq!(lenient_int(Some("N/A")), None);
        assert_eq!(lenient_int(None), None);
    }
}
