//! # Core Layer Tests: DataChannelConfig
//!
//! Validates defaults, TOML loading (inline and from disk) and range checks.

use datachan_core::packet_id::DEFAULT_WRAP_MARGIN;
use datachan_core::{DataChannelConfig, DcError, PacketIdForm, ReplayMode};
use std::io::Write;
use std::time::Instant;

#[test]
fn test_config_defaults() {
    let config = DataChannelConfig::default();

    assert_eq!(config.cipher, "AES-256-GCM");
    assert_eq!(config.digest, "NONE");
    assert_eq!(config.pid_form, PacketIdForm::Short);
    assert_eq!(config.replay_mode, ReplayMode::Enforce);
    assert_eq!(config.seq_backtrack, 64);
    assert_eq!(config.time_backtrack, 15);
    assert_eq!(config.wrap_margin, DEFAULT_WRAP_MARGIN);
    assert!(config.validate().is_ok(), "Defaults must validate");
}

#[test]
fn test_config_from_toml_partial() {
    let t = Instant::now();

    let config = DataChannelConfig::from_toml_str(
        r#"
        cipher = "AES-128-CBC"
        digest = "SHA256"
        pid_form = "long"
        replay_mode = "track-only"
        seq_backtrack = 512
        "#,
    )
    .expect("valid config");

    assert_eq!(config.cipher, "AES-128-CBC");
    assert_eq!(config.digest, "SHA256");
    assert_eq!(config.pid_form, PacketIdForm::Long);
    assert_eq!(config.replay_mode, ReplayMode::TrackOnly);
    assert_eq!(config.seq_backtrack, 512);
    assert_eq!(config.time_backtrack, 15, "Unset keys keep their defaults");

    println!("test_config_from_toml_partial: Testing Overhead = {:?}", t.elapsed());
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "cipher = \"CHACHA20-POLY1305\"").expect("write");
    writeln!(file, "time_backtrack = 30").expect("write");

    let config = DataChannelConfig::from_file(file.path()).expect("loads from disk");
    assert_eq!(config.cipher, "CHACHA20-POLY1305");
    assert_eq!(config.time_backtrack, 30);
}

#[test]
fn test_config_missing_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = DataChannelConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, DcError::Config(_)));
}

#[test]
fn test_config_rejects_out_of_range() {
    let err = DataChannelConfig::from_toml_str("seq_backtrack = 65537").unwrap_err();
    assert!(matches!(err, DcError::Config(_)), "seq_backtrack above 65536: {}", err);

    let err = DataChannelConfig::from_toml_str("time_backtrack = 601").unwrap_err();
    assert!(matches!(err, DcError::Config(_)));

    let err = DataChannelConfig::from_toml_str("reap_interval = 0").unwrap_err();
    assert!(matches!(err, DcError::Config(_)));

    assert!(DataChannelConfig::from_toml_str("seq_backtrack = 65536").is_ok(), "Upper bound is inclusive");
}

#[test]
fn test_config_rejects_unknown_and_malformed() {
    let err = DataChannelConfig::from_toml_str("ciphr = \"AES-256-GCM\"").unwrap_err();
    assert!(matches!(err, DcError::Config(_)), "Unknown keys are refused");

    let err = DataChannelConfig::from_toml_str("pid_form = \"medium\"").unwrap_err();
    assert!(matches!(err, DcError::Config(_)));
}
