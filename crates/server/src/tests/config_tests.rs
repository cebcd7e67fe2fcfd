use super::{load_settings_with, normalize_database_url, prepare_database_url, Settings};

use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn empty_database_url_falls_back_to_default() {
    assert_eq!(
        normalize_database_url("   "),
        Settings::default().database_url
    );
}

#[test]
fn creates_parent_dir_for_sqlite_url() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("data").join("test.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.path().join("data").exists());
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = load_settings_with(None, env_from(&[]));
    assert_eq!(settings.server_bind, "127.0.0.1:3000");
    assert!(settings.signing_secret.is_none());
    assert_eq!(settings.signature_tolerance_seconds, 300);
}

#[test]
fn file_values_are_overridden_by_env() {
    let file = r#"
bind_addr = "0.0.0.0:9000"
database_url = "sqlite://./from-file.db"
signing_secret = "whsec_ZmlsZQ=="
signature_tolerance_seconds = "60"
"#;
    let settings = load_settings_with(
        Some(file),
        env_from(&[
            ("SIGNING_SECRET", "whsec_YmFyZQ=="),
            ("APP__SIGNING_SECRET", "whsec_YXBw"),
            ("DATABASE_URL", "sqlite://./from-env.db"),
        ]),
    );

    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.database_url, "sqlite://./from-env.db");
    assert_eq!(settings.signing_secret.as_deref(), Some("whsec_YXBw"));
    assert_eq!(settings.signature_tolerance_seconds, 60);
}

#[test]
fn invalid_tolerance_override_is_ignored() {
    let settings = load_settings_with(
        None,
        env_from(&[("APP__SIGNATURE_TOLERANCE_SECONDS", "soon")]),
    );
    assert_eq!(settings.signature_tolerance_seconds, 300);
}
