use avalon_common::observability::LogFormat;
use avalon_config::{AvalonConfigError, AvalonConfigLoader};
use avalon_social::facebook::AuthState;
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a file in a temp dir and return its path.
fn write_file(tmp: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, contents).expect("write file");
    p
}

#[test]
#[serial]
fn loads_file_and_expands_placeholders() {
    let tmp = TempDir::new().unwrap();
    let yaml = r#"
account:
  email: "${AVALON_TEST_EMAIL}"
  password: "${AVALON_TEST_PASSWORD}"
site:
  base_url: "http://127.0.0.1:9000/"
  cookie_root: "http://127.0.0.1:9000/"
user_agent: "fixed-agent/2.0"
logging:
  dir: "/tmp/avalon-logs"
  format: json
  stderr: true
  filter: "avalon_http=debug"
"#;
    let p = write_file(&tmp, "avalon.yaml", yaml.as_bytes());

    let config = temp_env::with_vars(
        [
            ("AVALON_TEST_EMAIL", Some("me@example.com")),
            ("AVALON_TEST_PASSWORD", Some("s3cret")),
        ],
        || AvalonConfigLoader::new().with_file(&p).load(),
    )
    .expect("load config");

    assert_eq!(config.account.email, "me@example.com");
    assert_eq!(config.account.password, "s3cret");
    assert_eq!(config.site.session_cookie, "c_user");
    assert_eq!(config.user_agent.as_deref(), Some("fixed-agent/2.0"));

    let site = config.site().expect("site");
    assert_eq!(site.groups().as_str(), "http://127.0.0.1:9000/groups/?seemore");

    let log = config.log_config();
    assert_eq!(log.format, LogFormat::Json);
    assert!(log.emit_stderr);
    assert_eq!(log.default_filter, "avalon_http=debug");
    assert_eq!(log.log_dir, Some(PathBuf::from("/tmp/avalon-logs")));
    assert_eq!(log.app_name, "avalon");
}

#[test]
#[serial]
fn environment_overrides_string_settings() {
    let config = temp_env::with_var("AVALON_ACCOUNT__EMAIL", Some("env@example.com"), || {
        AvalonConfigLoader::new()
            .with_yaml_str("account: { email: file@example.com, password: pw }")
            .load()
    })
    .expect("load config");

    assert_eq!(config.account.email, "env@example.com");
    assert_eq!(config.account.password, "pw");
}

#[test]
#[serial]
fn missing_sections_fall_back_to_defaults() {
    let config = AvalonConfigLoader::new()
        .with_yaml_str("account: { email: a@example.com, password: pw }")
        .load()
        .expect("load config");

    assert_eq!(config.site.base_url, "https://mbasic.facebook.com/");
    assert_eq!(config.site.cookie_root, "https://facebook.com/");

    let transport = config.transport_options().expect("transport");
    assert!(!transport.accept_invalid_certs);
    assert!(transport.proxy.is_none());
    assert!(transport.root_certificate.is_none());
    assert!(transport.client_identity.is_none());
    assert!(transport.timeout.is_none());

    assert_eq!(config.log_config().format, LogFormat::Text);
}

#[test]
#[serial]
fn missing_account_is_rejected() {
    let err = AvalonConfigLoader::new()
        .with_yaml_str("user_agent: x")
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("account"), "{err}");
}

#[test]
#[serial]
fn certificate_files_are_read_into_transport_options() {
    let tmp = TempDir::new().unwrap();
    let root = write_file(&tmp, "root.der", &[0x30, 0x82, 0x01, 0x0a]);
    let identity = write_file(&tmp, "client.p12", b"pkcs12-bytes");

    let yaml = format!(
        r#"
account: {{ email: a@example.com, password: pw }}
transport:
  proxy: "http://127.0.0.1:8080"
  root_certificate: "{}"
  client_identity:
    path: "{}"
    password: "p12-pass"
  connect_timeout_secs: 5
  verbose: true
"#,
        root.display(),
        identity.display()
    );

    let config = AvalonConfigLoader::new()
        .with_yaml_str(&yaml)
        .load()
        .expect("load config");
    let transport = config.transport_options().expect("transport");

    assert_eq!(transport.proxy.as_deref(), Some("http://127.0.0.1:8080"));
    assert_eq!(transport.root_certificate, Some(vec![0x30, 0x82, 0x01, 0x0a]));
    let id = transport.client_identity.expect("identity");
    assert_eq!(id.pkcs12, b"pkcs12-bytes");
    assert_eq!(id.password, "p12-pass");
    assert_eq!(transport.connect_timeout.map(|d| d.as_secs()), Some(5));
    assert!(transport.verbose);
}

#[test]
#[serial]
fn unreadable_certificate_path_is_an_io_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.pem");
    let yaml = format!(
        "account: {{ email: a@example.com, password: pw }}\ntransport: {{ root_certificate: \"{}\" }}\n",
        missing.display()
    );

    let config = AvalonConfigLoader::new()
        .with_yaml_str(&yaml)
        .load()
        .expect("load config");

    match config.transport_options() {
        Err(AvalonConfigError::Io { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
#[serial]
fn gateway_uses_configured_identity() {
    let config = AvalonConfigLoader::new()
        .with_yaml_str(
            r#"
account: { email: gw@example.com, password: pw }
user_agent: "fixed-agent/2.0"
"#,
        )
        .load()
        .expect("load config");

    let gateway = config.gateway().expect("gateway");
    assert_eq!(gateway.mail_address(), "gw@example.com");
    assert_eq!(gateway.user_agent(), "fixed-agent/2.0");
    assert_eq!(gateway.state(), AuthState::NoSession);
}

#[test]
#[serial]
fn gateway_without_user_agent_draws_from_pool() {
    let config = AvalonConfigLoader::new()
        .with_yaml_str("account: { email: a@example.com, password: pw }")
        .load()
        .expect("load config");

    let gateway = config.gateway().expect("gateway");
    assert!(avalon_http::USER_AGENTS.contains(&gateway.user_agent()));
}

#[test]
#[serial]
fn invalid_site_url_surfaces_as_gateway_error() {
    let config = AvalonConfigLoader::new()
        .with_yaml_str(
            "account: { email: a@example.com, password: pw }\nsite: { base_url: \"not a url\" }\n",
        )
        .load()
        .expect("load config");

    assert!(matches!(
        config.gateway(),
        Err(AvalonConfigError::Gateway(_))
    ));
}

#[test]
#[serial]
fn environment_beats_every_file_source() {
    let tmp = TempDir::new().unwrap();
    let p = write_file(
        &tmp,
        "avalon.yaml",
        b"account: { email: file@example.com, password: pw }\nuser_agent: file-agent\n",
    );

    let config = temp_env::with_vars(
        [
            ("AVALON_ACCOUNT__PASSWORD", Some("from-env")),
            ("AVALON_USER_AGENT", Some("env-agent")),
        ],
        || {
            AvalonConfigLoader::new()
                .with_file(&p)
                .with_yaml_str("user_agent: inline-agent")
                .load()
        },
    )
    .expect("load config");

    assert_eq!(config.account.email, "file@example.com");
    assert_eq!(config.account.password, "from-env");
    assert_eq!(config.user_agent.as_deref(), Some("env-agent"));
}

#[test]
#[serial]
fn literal_dollar_in_password_is_kept() {
    let config = temp_env::with_var("HOME", Some("/home/avalon"), || {
        AvalonConfigLoader::new()
            .with_yaml_str("account: { email: a@example.com, password: 'ab$HOME' }")
            .load()
    })
    .expect("load config");

    assert_eq!(config.account.password, "ab$HOME");
}
