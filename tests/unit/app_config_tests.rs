/*!
 * Tests for application configuration functionality
 */

use zotcite::app_config::{Config, LogLevel, PickerFormat, MAX_RETRY_COUNT};
use zotcite::citation::KeyCharset;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.server_url, "http://localhost:23119");
    assert_eq!(config.bibliography_style, "http://www.zotero.org/styles/apa");
    assert_eq!(config.latex_bib_style, "Better BibLaTeX");
    assert_eq!(config.default_bib_name, "ref.bib");
    assert!(!config.minimize_picker);
    assert_eq!(config.picker_format, PickerFormat::Pandoc);
    assert_eq!(config.window_radius, 50);
    assert_eq!(config.key_charset(), KeyCharset::Word);
    assert_eq!(config.timeout_secs, 30);
    assert_eq!(config.picker_timeout_secs, 600);
    assert_eq!(config.retry_count, 2);
    assert_eq!(config.retry_backoff_ms, 500);
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.validate().is_ok());
}

/// Missing fields fall back to their defaults
#[test]
fn test_config_deserialize_withPartialJson_shouldFillDefaults() {
    let json = r#"{ "server_url": "http://127.0.0.1:24119", "picker_format": "json", "extended_key_chars": true }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.server_url, "http://127.0.0.1:24119");
    assert_eq!(config.picker_format, PickerFormat::Json);
    assert_eq!(config.key_charset(), KeyCharset::Extended);
    assert_eq!(config.default_bib_name, "ref.bib");
    assert_eq!(config.window_radius, 50);
}

#[test]
fn test_config_roundTrip_shouldSerializeLowercaseEnums() {
    let config = Config {
        log_level: LogLevel::Debug,
        ..Config::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains(r#""log_level":"debug""#));
    assert!(json.contains(r#""picker_format":"pandoc""#));
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();

    config.server_url = "not a url".to_string();
    assert!(config.validate().is_err());
    config.server_url = "ftp://localhost:23119".to_string();
    assert!(config.validate().is_err());
    config.server_url = "https://zotero.local".to_string();
    assert!(config.validate().is_ok());

    config.window_radius = 0;
    assert!(config.validate().is_err());
    config.window_radius = 10;

    config.latex_bib_style = "  ".to_string();
    assert!(config.validate().is_err());
    config.latex_bib_style = "Better BibTeX".to_string();

    config.default_bib_name = "refs.txt".to_string();
    assert!(config.validate().is_err());
    config.default_bib_name = "${fileBasenameNoExtension}.bib".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_withHugeRetryCount_shouldFail() {
    let mut config = Config::default();
    config.retry_count = MAX_RETRY_COUNT;
    assert!(config.validate().is_ok());

    config.retry_count = 64;
    let error = config.validate().unwrap_err();
    assert!(error.to_string().contains("retry_count"));
}

#[test]
fn test_pickerFormat_fromStr_shouldIgnoreCase() {
    assert_eq!("JSON".parse::<PickerFormat>().unwrap(), PickerFormat::Json);
    assert_eq!(PickerFormat::Pandoc.to_string(), "pandoc");
    assert!("csl".parse::<PickerFormat>().is_err());
}

#[test]
fn test_logLevel_toLevelFilter_shouldMapEachLevel() {
    assert_eq!(LogLevel::Error.to_level_filter(), log::LevelFilter::Error);
    assert_eq!(LogLevel::Trace.to_level_filter(), log::LevelFilter::Trace);
}
