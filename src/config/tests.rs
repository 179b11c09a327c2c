use std::io::Write;

use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_use_memory_store_and_enabled_cache() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.store.backend, StoreBackend::Memory);
    assert!(settings.store.base_url.is_none());
    assert_eq!(settings.store.timeout, Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS));
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.post_limit, DEFAULT_CACHE_POST_LIMIT);
    assert_eq!(settings.validation, ValidationPolicy::default());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn rest_backend_requires_base_url() {
    let mut raw = RawSettings::default();
    raw.store.backend = Some("rest".to_string());

    let err = Settings::from_raw(raw).expect_err("missing base url");
    assert!(matches!(err, LoadError::Invalid { key: "store.base_url", .. }));
}

#[test]
fn unknown_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.store.backend = Some("postgres".to_string());

    let err = Settings::from_raw(raw).expect_err("unknown backend");
    assert!(matches!(err, LoadError::Invalid { key: "store.backend", .. }));
}

#[test]
fn zero_cache_limit_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.post_limit = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero limit");
    assert!(matches!(err, LoadError::Invalid { key: "cache.post_limit", .. }));
}

#[test]
fn inverted_title_bounds_are_rejected() {
    let mut raw = RawSettings::default();
    raw.validation.post_title_min = Some(50);
    raw.validation.post_title_max = Some(10);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn cache_can_be_disabled_via_cli() {
    let args = CliArgs::parse_from(["folio", "serve", "--cache-enabled", "false"]);
    let Some(Command::Serve(serve)) = args.command else {
        panic!("serve command expected");
    };

    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&serve.overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!settings.cache.enabled);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["folio"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(ServeArgs::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn load_reads_explicit_config_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        r#"
[server]
port = 4100

[store]
backend = "rest"
base_url = "http://127.0.0.1:9000/api/"
timeout_ms = 2500

[cache]
comment_list_limit = 16

[validation]
post_content_min = 20
"#
    )
    .expect("write config");

    let args = CliArgs::parse_from([
        "folio",
        "--config-file",
        file.path().to_str().expect("utf-8 path"),
    ]);
    let settings = load(&args).expect("settings");

    assert_eq!(settings.server.addr.port(), 4100);
    assert_eq!(settings.store.backend, StoreBackend::Rest);
    assert_eq!(
        settings.store.base_url.as_ref().map(Url::as_str),
        Some("http://127.0.0.1:9000/api/")
    );
    assert_eq!(settings.store.timeout, Duration::from_millis(2500));
    assert_eq!(settings.cache.comment_list_limit, 16);
    assert_eq!(settings.validation.post_content_min, 20);
    assert_eq!(settings.validation.post_title_min, 3);
}

#[test]
fn missing_explicit_config_file_fails() {
    let args = CliArgs::parse_from(["folio", "--config-file", "/nonexistent/folio.toml"]);
    assert!(matches!(load(&args), Err(LoadError::Build(_))));
}
