use assert_matches::assert_matches;

use ppidata::config::{GlobalConfig, load_config_file, resolve_module_config, save_blank_config};
use ppidata::error::PpidataError;
use ppidata::sources::hippie::HippieSettings;
use ppidata::sources::stringdb::StringDbSettings;

fn config_from(json: &str) -> GlobalConfig {
    serde_json::from_str(json).unwrap()
}

#[test]
fn hippie_filename_override_keeps_other_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let data_path = temp.path().join("x");
    let config = config_from(&format!(
        r#"{{"data_path": "{}", "hippie": {{"filename": "custom.txt"}}}}"#,
        data_path.display()
    ));

    let resolved =
        resolve_module_config(Some(&config), "hippie", &HippieSettings::default()).unwrap();

    assert_eq!(resolved.data_dir.as_std_path(), data_path);
    assert!(data_path.is_dir());
    assert_eq!(resolved.settings.filename, "custom.txt");
    assert_eq!(resolved.settings.hash, None);
}

#[test]
fn nested_stringdb_override_merges_per_resource() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_from(&format!(
        r#"{{"data_path": "{}", "stringdb": {{"ppi": {{"filename": "links.gz"}}}}}}"#,
        temp.path().display()
    ));

    let resolved =
        resolve_module_config(Some(&config), "stringdb", &StringDbSettings::default()).unwrap();

    assert_eq!(resolved.settings.ppi.filename, "links.gz");
    assert_eq!(resolved.settings.protein.filename, "string_protein.txt.gz");
}

#[test]
fn nested_override_keeps_sibling_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_from(&format!(
        r#"{{"data_path": "{}", "stringdb": {{"ppi": {{"hash": "sha256:ab"}}}}}}"#,
        temp.path().display()
    ));

    let resolved =
        resolve_module_config(Some(&config), "stringdb", &StringDbSettings::default()).unwrap();

    assert_eq!(resolved.settings.ppi.filename, "string_ppi.txt.gz");
    assert_eq!(resolved.settings.ppi.hash.as_deref(), Some("sha256:ab"));
}

#[test]
fn unconfigured_module_gets_full_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_from(&format!(
        r#"{{"data_path": "{}"}}"#,
        temp.path().display()
    ));

    let resolved =
        resolve_module_config(Some(&config), "hippie", &HippieSettings::default()).unwrap();
    assert_eq!(resolved.settings, HippieSettings::default());
}

#[test]
fn resolution_is_idempotent() {
    let temp = tempfile::tempdir().unwrap();
    let config = config_from(&format!(
        r#"{{"data_path": "{}", "hippie": {{"filename": "a.txt"}}}}"#,
        temp.path().display()
    ));

    let first = resolve_module_config(Some(&config), "hippie", &HippieSettings::default()).unwrap();
    let second =
        resolve_module_config(Some(&config), "hippie", &HippieSettings::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("broken.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = load_config_file(path.to_str().unwrap()).unwrap_err();
    assert_matches!(err, PpidataError::ConfigParse(_));
}

#[test]
fn non_object_top_level_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("list.json");
    std::fs::write(&path, "[1, 2, 3]").unwrap();

    let err = load_config_file(path.to_str().unwrap()).unwrap_err();
    assert_matches!(err, PpidataError::ConfigParse(_));
}

#[test]
fn missing_file_is_a_read_error() {
    let err = load_config_file("/nonexistent/ppidata.json").unwrap_err();
    assert_matches!(err, PpidataError::ConfigRead(_));
}

#[test]
fn unknown_module_sections_are_preserved() {
    let config = config_from(r#"{"data_path": "/tmp/d", "hippie": {"filename": "h.txt"}}"#);
    assert_eq!(config.data_path.as_deref(), Some("/tmp/d"));
    assert!(config.modules.contains_key("hippie"));
}

#[test]
fn blank_config_template_round_trips() {
    let temp = tempfile::tempdir().unwrap();
    let target = temp.path().join("conf").join("config.json");

    let written = save_blank_config(Some(target.to_str().unwrap())).unwrap();
    assert_eq!(written.as_std_path(), target);

    let loaded = load_config_file(target.to_str().unwrap()).unwrap();
    assert!(loaded.data_path.is_some());
    assert!(loaded.modules.is_empty());
}
