use std::collections::BTreeMap;
use std::fs;

use camino::Utf8PathBuf;
use directories::{BaseDirs, ProjectDirs};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PpidataError;

/// Global configuration as written by the user: an optional data directory
/// plus one free-form JSON object per data-source key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,
    #[serde(flatten)]
    pub modules: BTreeMap<String, Value>,
}

/// A module's fully resolved view of the configuration: a data directory
/// that exists on disk and the module's settings with user overrides
/// applied key-by-key over the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleConfig<S> {
    pub data_dir: Utf8PathBuf,
    pub settings: S,
}

pub fn load_config_file(path: &str) -> Result<GlobalConfig, PpidataError> {
    let config_path = expand_path(path);
    let content = fs::read_to_string(config_path.as_std_path())
        .map_err(|_| PpidataError::ConfigRead(config_path.clone()))?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|err| PpidataError::ConfigParse(err.to_string()))?;
    if !value.is_object() {
        return Err(PpidataError::ConfigParse(
            "top-level config must be a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|err| PpidataError::ConfigParse(err.to_string()))
}

/// Merge a module's defaults with the user's section for `module_key` and
/// resolve the data directory, creating it if absent.
///
/// User-supplied keys win key-by-key, recursing into nested objects; keys
/// absent from the user section keep their defaults. The defaults are
/// plain values owned by the caller, so concurrent resolutions share no
/// state.
pub fn resolve_module_config<S>(
    user_config: Option<&GlobalConfig>,
    module_key: &str,
    defaults: &S,
) -> Result<ModuleConfig<S>, PpidataError>
where
    S: Serialize + DeserializeOwned,
{
    let data_dir = match user_config.and_then(|cfg| cfg.data_path.as_deref()) {
        Some(raw) if !raw.trim().is_empty() => expand_path(raw),
        _ => default_data_dir()?,
    };
    fs::create_dir_all(data_dir.as_std_path()).map_err(|err| {
        PpidataError::Filesystem(format!("create data directory {data_dir}: {err}"))
    })?;

    let mut merged = match serde_json::to_value(defaults) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(PpidataError::ConfigParse(format!(
                "`{module_key}` defaults must serialize to an object"
            )));
        }
        Err(err) => return Err(PpidataError::ConfigParse(err.to_string())),
    };
    if let Some(section) = user_config
        .and_then(|cfg| cfg.modules.get(module_key))
        .and_then(Value::as_object)
    {
        merge_json(&mut merged, section);
    }
    let settings = serde_json::from_value(Value::Object(merged))
        .map_err(|err| PpidataError::ConfigParse(format!("invalid `{module_key}` settings: {err}")))?;

    Ok(ModuleConfig { data_dir, settings })
}

/// Expand environment variables and a leading `~` in a path string.
/// Unknown variables are left in place.
pub fn expand_path(raw: &str) -> Utf8PathBuf {
    let expanded = expand_env_vars(raw);
    if expanded == "~" || expanded.starts_with("~/") {
        let home = BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.home_dir().to_path_buf()).ok());
        if let Some(home) = home {
            if expanded == "~" {
                return home;
            }
            return home.join(&expanded[2..]);
        }
    }
    Utf8PathBuf::from(expanded)
}

pub fn default_data_dir() -> Result<Utf8PathBuf, PpidataError> {
    let dirs = ProjectDirs::from("", "svj", "ppidata").ok_or_else(|| {
        PpidataError::Filesystem("unable to resolve application data directory".to_string())
    })?;
    Utf8PathBuf::from_path_buf(dirs.data_dir().to_path_buf())
        .map_err(|_| PpidataError::Filesystem("non-utf8 data directory".to_string()))
}

pub fn default_config_path() -> Result<Utf8PathBuf, PpidataError> {
    let dirs = ProjectDirs::from("", "svj", "ppidata").ok_or_else(|| {
        PpidataError::Filesystem("unable to resolve config directory".to_string())
    })?;
    let dir = Utf8PathBuf::from_path_buf(dirs.config_dir().to_path_buf())
        .map_err(|_| PpidataError::Filesystem("non-utf8 config directory".to_string()))?;
    Ok(dir.join("config.json"))
}

pub fn blank_config() -> Result<GlobalConfig, PpidataError> {
    Ok(GlobalConfig {
        data_path: Some(default_data_dir()?.to_string()),
        modules: BTreeMap::new(),
    })
}

/// Write a blank config template for the user to edit. With no explicit
/// path, the template lands under the platform config directory.
pub fn save_blank_config(path: Option<&str>) -> Result<Utf8PathBuf, PpidataError> {
    let config_path = match path {
        Some(raw) => expand_path(raw),
        None => default_config_path()?,
    };
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| PpidataError::Filesystem(err.to_string()))?;
    }
    let content = serde_json::to_string_pretty(&blank_config()?)
        .map_err(|err| PpidataError::ConfigParse(err.to_string()))?;
    fs::write(config_path.as_std_path(), content)
        .map_err(|err| PpidataError::Filesystem(err.to_string()))?;
    Ok(config_path)
}

fn merge_json(base: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_json(existing, incoming);
            }
            (_, value) => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];
        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let name = &braced[..end];
                match std::env::var(name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &braced[end + 1..];
                continue;
            }
            out.push('$');
            rest = after;
            continue;
        }
        let end = after
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
            .unwrap_or(after.len());
        if end == 0 {
            out.push('$');
            rest = after;
            continue;
        }
        let name = &after[..end];
        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = &after[end..];
    }
    out.push_str(rest);
    out
}
