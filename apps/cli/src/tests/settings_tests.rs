use super::*;
use std::{
    fs,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> Environment {
    let vars: config::Map<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    environment().source(Some(vars))
}

fn temp_config(contents: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("inventory-settings-{nanos}.toml"));
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = build_settings(None, env_from(&[])).expect("settings");
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.search_debounce(), Duration::from_millis(500));
}

#[test]
fn file_values_override_defaults() {
    let path = temp_config(
        "api_base_url = \"https://inventario.example.com/api\"\npage_size = 25\n",
    );
    let settings = build_settings(Some(&path), env_from(&[])).expect("settings");
    assert_eq!(settings.api_base_url, "https://inventario.example.com/api");
    assert_eq!(settings.page_size, 25);
    assert_eq!(settings.request_timeout_secs, 15);
    let _ = fs::remove_file(path);
}

#[test]
fn environment_overrides_file() {
    let path = temp_config("page_size = 25\n");
    let settings = build_settings(
        Some(&path),
        env_from(&[
            ("INVENTORY__PAGE_SIZE", "50"),
            ("INVENTORY__SEARCH_DEBOUNCE_MS", "250"),
        ]),
    )
    .expect("settings");
    assert_eq!(settings.page_size, 50);
    assert_eq!(settings.search_debounce(), Duration::from_millis(250));
    let _ = fs::remove_file(path);
}

#[test]
fn explicit_missing_file_is_an_error() {
    let missing = std::env::temp_dir().join("inventory-settings-does-not-exist.toml");
    assert!(build_settings(Some(&missing), env_from(&[])).is_err());
}

#[test]
fn zero_page_size_is_rejected() {
    let err = build_settings(None, env_from(&[("INVENTORY__PAGE_SIZE", "0")]))
        .expect_err("zero page size");
    assert!(err.to_string().contains("page_size"));
}
