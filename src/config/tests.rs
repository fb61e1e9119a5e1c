//! Configuration tests
//!
//! Round-trip tests guard the hand-written TOML template: when a field is
//! added to `Config`, these fail until `to_toml` writes it back out.

use super::*;
use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn parse(toml_str: &str) -> FileConfig {
    match toml::from_str(toml_str) {
        Ok(file) => file,
        Err(e) => panic!("TOML should parse.\nTOML:\n{toml_str}\nError: {e}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Round-trip tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_roundtrip_default() {
    let config = Config::default();
    let file = parse(&config.to_toml());
    let restored = Config::resolve(file, env(&[])).unwrap();
    assert_eq!(restored, config);
}

#[test]
fn test_config_roundtrip_customized() {
    let mut config = Config::default();
    config.bind_addr = "0.0.0.0:8088".parse().unwrap();
    config.origin = "https://sheets.example.org".to_string();
    config.components_dir = PathBuf::from("/srv/components");
    config.search_limit = 7;
    config.widgets.search_debounce_ms = 400;
    config.widgets.no_result_text = "No \"hits\"".to_string();
    config.widgets.results_text = "{count} results.".to_string();
    config.widgets.row_height = 28.5;
    config.logging.level = "debug".to_string();
    config.logging.format = LogFormat::Json;
    config.logging.file_enabled = true;
    config.logging.file_rotation = LogRotation::Hourly;

    let file = parse(&config.to_toml());
    let restored = Config::resolve(file, env(&[])).unwrap();
    assert_eq!(restored, config);
}

#[test]
fn test_config_roundtrip_awkward_strings() {
    let mut config = Config::default();
    config.components_dir = PathBuf::from(r"C:\sheets\components");
    config.widgets.no_result_text = "Ingen\r\nresultater\t\u{7}'\"\"\"".to_string();
    config.widgets.results_text = "{count} \u{1b}[1mresultater\u{1b}[0m".to_string();
    config.logging.file_prefix = "speaker'sheet".to_string();

    let file = parse(&config.to_toml());
    let restored = Config::resolve(file, env(&[])).unwrap();
    assert_eq!(restored, config);
}

#[test]
fn test_template_marks_embedder_keys() {
    let toml = Config::default().to_toml();
    assert!(toml.contains("Runtime::from_config"));
    assert!(toml.contains("Combobox::from_config"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Precedence
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_env_overrides_file() {
    let file = parse(
        r#"
        bind_addr = "127.0.0.1:4000"
        origin = "http://file.example"
        "#,
    );
    let config = Config::resolve(
        file,
        env(&[
            ("SPEAKERSHEET_BIND", "127.0.0.1:5000"),
            ("SPEAKERSHEET_ORIGIN", "http://env.example"),
        ]),
    )
    .unwrap();
    assert_eq!(config.bind_addr.port(), 5000);
    assert_eq!(config.origin, "http://env.example");
}

#[test]
fn test_port_binds_all_interfaces() {
    let config = Config::resolve(FileConfig::default(), env(&[("PORT", "8123")])).unwrap();
    assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8123");
    // Derived origin must be reachable, not 0.0.0.0
    assert_eq!(config.origin, "http://127.0.0.1:8123");
}

#[test]
fn test_invalid_bind_address_is_an_error() {
    let result = Config::resolve(
        FileConfig::default(),
        env(&[("SPEAKERSHEET_BIND", "not-an-address")]),
    );
    assert!(matches!(result, Err(ConfigError::BindAddr { .. })));
}

#[test]
fn test_partial_sections_fall_back_to_defaults() {
    let file = parse(
        r#"
        [widgets]
        min_chars = 0
        page_step = 10

        [logging]
        file_rotation = "weekly"
        "#,
    );
    let config = Config::resolve(file, env(&[])).unwrap();
    assert_eq!(config.widgets.min_chars, 0);
    assert_eq!(config.widgets.page_step, 10);
    assert_eq!(config.widgets.search_debounce_ms, 250);
    assert_eq!(config.widgets.no_result_text, "Ingen resultater");
    assert_eq!(config.logging.file_rotation, LogRotation::Daily);
}

#[test]
fn test_results_announcement() {
    let widgets = WidgetsConfig::default();
    assert_eq!(widgets.results_announcement(3), "3 resultater.");
}
