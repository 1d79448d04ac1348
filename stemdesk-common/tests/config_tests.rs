//! Configuration resolution and graceful degradation tests
//!
//! Tests that manipulate STEMDESK_ROOT_FOLDER or STEMDESK_ROOT are marked with #[serial]
//! so they never race each other on the process environment.

use serial_test::serial;
use stemdesk_common::config::{
    load_toml_config, write_toml_config, CompiledDefaults, DiarizationBackendConfig,
    ModelCommand, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_root_env() {
    env::remove_var("STEMDESK_ROOT_FOLDER");
    env::remove_var("STEMDESK_ROOT");
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert_eq!(defaults.port, 5790);
    assert!(defaults.root_folder.to_string_lossy().contains("stemdesk"));
}

#[test]
#[serial]
fn test_cli_argument_wins_over_environment() {
    env::set_var("STEMDESK_ROOT_FOLDER", "/tmp/from-env");

    let root = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/from-cli")))
        .resolve();

    assert_eq!(root, PathBuf::from("/tmp/from-cli"));
    clear_root_env();
}

#[test]
#[serial]
fn test_resolver_env_var_root_folder() {
    clear_root_env();
    env::set_var("STEMDESK_ROOT_FOLDER", "/tmp/stemdesk-test-root");

    let root = RootFolderResolver::new("test-module").resolve();

    assert_eq!(root, PathBuf::from("/tmp/stemdesk-test-root"));
    clear_root_env();
}

#[test]
#[serial]
fn test_root_folder_var_takes_precedence_over_root() {
    clear_root_env();
    env::set_var("STEMDESK_ROOT", "/tmp/secondary");
    env::set_var("STEMDESK_ROOT_FOLDER", "/tmp/primary");

    let root = RootFolderResolver::new("test-module").resolve();

    assert_eq!(root, PathBuf::from("/tmp/primary"));
    clear_root_env();
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    clear_root_env();

    let root = RootFolderResolver::new("nonexistent-test-module-12345").resolve();

    assert!(!root.as_os_str().is_empty());
}

#[test]
fn test_module_name_in_config_path() {
    let resolver = RootFolderResolver::new("stemdesk-sp");
    let path = resolver.config_file_path();

    assert!(path.to_string_lossy().ends_with("stemdesk-sp.toml"));
}

#[test]
#[serial]
fn test_explicit_config_path_supplies_root_folder() {
    clear_root_env();
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("custom.toml");
    std::fs::write(&config_path, "root_folder = \"/tmp/from-toml\"\n").unwrap();

    let resolver = RootFolderResolver::new("stemdesk-sp").with_config_path(Some(config_path.clone()));

    assert_eq!(resolver.config_file_path(), config_path);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/from-toml"));
}

#[test]
fn test_initializer_creates_workspace_idempotently() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("nested").join("root");
    let initializer = RootFolderInitializer::new(root.clone());

    initializer.ensure_directory_exists().unwrap();
    initializer.ensure_directory_exists().unwrap();

    assert!(root.join("uploads").is_dir());
    assert_eq!(initializer.workspace_path(), root.join("uploads"));
}

#[test]
fn test_missing_toml_yields_defaults() {
    let temp = TempDir::new().unwrap();

    let config = load_toml_config(&temp.path().join("absent.toml")).unwrap();

    assert!(config.root_folder.is_none());
    assert_eq!(config.pipeline.segment_seconds, 10.0);
    assert_eq!(config.retention.max_age_hours, 24);
}

#[test]
fn test_invalid_toml_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.toml");
    std::fs::write(&path, "[pipeline\nsample_rate = ").unwrap();

    assert!(load_toml_config(&path).is_err());
}

#[test]
fn test_partial_toml_keeps_other_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("partial.toml");
    std::fs::write(
        &path,
        r#"
        [pipeline]
        segment_seconds = 5.0

        [models.separation]
        program = "/opt/separate"
        args = ["--model", "four-stem"]
        "#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();

    assert_eq!(config.pipeline.segment_seconds, 5.0);
    assert_eq!(config.pipeline.sample_rate, 44_100);
    assert_eq!(config.server.max_upload_mb, 512);
    assert_eq!(
        config.models.separation,
        Some(ModelCommand {
            program: PathBuf::from("/opt/separate"),
            args: vec!["--model".to_string(), "four-stem".to_string()],
        })
    );
}

#[test]
fn test_toml_roundtrip_with_models_and_token() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config").join("stemdesk-sp.toml");

    let mut config = TomlConfig::default();
    config.root_folder = Some(PathBuf::from("/srv/stemdesk"));
    config.diarization_token = Some("hf_abcdefghijklmnop".to_string());
    config.models.diarization = Some(DiarizationBackendConfig::Command(ModelCommand {
        program: PathBuf::from("/opt/diarize"),
        args: vec![],
    }));

    write_toml_config(&config, &path).unwrap();
    let parsed = load_toml_config(&path).unwrap();

    assert_eq!(parsed.root_folder, Some(PathBuf::from("/srv/stemdesk")));
    assert_eq!(parsed.diarization_token.as_deref(), Some("hf_abcdefghijklmnop"));
    assert_eq!(parsed.models.diarization, config.models.diarization);
    assert!(!path.with_extension("toml.tmp").exists());
}
