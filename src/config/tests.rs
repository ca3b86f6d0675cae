//! Config module tests

use pretty_assertions::assert_eq;

use super::*;

const VALID_CONFIG: &str = r#"
listen = "udp://127.0.0.1:9000"
send_to = "udp://127.0.0.1:9001"
log_data = true
max_msg_size = 2048

[mqtt]
broker = "tcp://broker.example.com:1883"

[mqtt.connect_packet]
username = "device"
password = "secret"
client_id = "mqfwd-test"
clean_session = true
keepalive = 30

[mqtt.sub]
topic = "t2"
qos = 1

[mqtt.pub]
topic = "t1"
qos = 0
"#;

#[test]
fn test_parse_full_config() {
    let config = Config::parse(VALID_CONFIG).unwrap();

    assert_eq!(config.listen, "udp://127.0.0.1:9000");
    assert_eq!(config.send_to, "udp://127.0.0.1:9001");
    assert!(config.log_data);
    assert_eq!(config.max_msg_size, 2048);
    assert_eq!(config.mqtt.broker, "tcp://broker.example.com:1883");
    assert_eq!(config.mqtt.sub.topic, "t2");
    assert_eq!(config.mqtt.sub.qos, 1);
    assert_eq!(config.mqtt.publish.topic, "t1");
    assert_eq!(config.mqtt.publish.qos, 0);

    let connect = config.mqtt.connect_packet.as_ref().unwrap();
    assert_eq!(connect.username, "device");
    assert_eq!(connect.client_id, "mqfwd-test");
    assert_eq!(connect.keepalive, 30);
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.listen, "udp://localhost:1234");
    assert_eq!(config.send_to, "");
    assert!(!config.log_data);
    assert_eq!(config.max_msg_size, 1500);
    assert_eq!(config.log.level, "info");
    assert!(config.mqtt.connect_packet.is_none());
    assert!(config.mqtt.tls.is_none());
}

#[test]
fn test_validate_rejects_missing_send_to() {
    let err = Config::parse(
        r#"
listen = "udp://127.0.0.1:9000"

[mqtt]
broker = "tcp://localhost:1883"
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("send_to"));
}

#[test]
fn test_validate_rejects_invalid_sub_qos() {
    let content = VALID_CONFIG.replace("qos = 1", "qos = 5");
    let err = Config::parse(&content).unwrap_err();
    assert!(err.to_string().contains("mqtt.sub.qos"));
}

#[test]
fn test_validate_rejects_invalid_pub_qos() {
    let content = VALID_CONFIG.replace("qos = 0", "qos = 3");
    let err = Config::parse(&content).unwrap_err();
    assert!(err.to_string().contains("mqtt.pub.qos"));
}

#[test]
fn test_validate_rejects_unsupported_scheme() {
    let content = VALID_CONFIG.replace("udp://127.0.0.1:9001", "tcp://127.0.0.1:9001");
    let err = Config::parse(&content).unwrap_err();
    assert!(err.to_string().contains("send_to"));
}

#[test]
fn test_validate_rejects_unpaired_tls_material() {
    let content = format!(
        "{}\n[mqtt.tls]\ncert_file = \"/tmp/client.pem\"\n",
        VALID_CONFIG
    );
    let err = Config::parse(&content).unwrap_err();
    assert!(err.to_string().contains("cert_file"));
}

#[test]
fn test_negative_max_msg_size_resets_to_default() {
    let content = VALID_CONFIG.replace("max_msg_size = 2048", "max_msg_size = -5");
    let config = Config::parse(&content).unwrap();
    assert_eq!(config.max_msg_size, -5);
    assert_eq!(config.effective_max_msg_size(), 1500);
}

#[test]
fn test_zero_max_msg_size_resets_to_default() {
    let content = VALID_CONFIG.replace("max_msg_size = 2048", "max_msg_size = 0");
    let config = Config::parse(&content).unwrap();
    assert_eq!(config.effective_max_msg_size(), 1500);
}

#[test]
fn test_unixgram_addresses_accepted() {
    let content = VALID_CONFIG
        .replace("udp://127.0.0.1:9000", "unixgram:///tmp/mqfwd-in.sock")
        .replace("udp://127.0.0.1:9001", "unixgram:///tmp/mqfwd-out.sock");
    let config = Config::parse(&content).unwrap();
    assert_eq!(config.listen, "unixgram:///tmp/mqfwd-in.sock");
}

#[test]
fn test_substitute_env_vars_simple() {
    std::env::set_var("MQFWD_TEST_VAR_SIMPLE", "hello");
    let result = substitute_env_vars("value = \"${MQFWD_TEST_VAR_SIMPLE}\"");
    assert_eq!(result, "value = \"hello\"");
    std::env::remove_var("MQFWD_TEST_VAR_SIMPLE");
}

#[test]
fn test_substitute_env_vars_with_default() {
    std::env::remove_var("MQFWD_TEST_VAR_UNSET");
    let result = substitute_env_vars("value = \"${MQFWD_TEST_VAR_UNSET:-fallback}\"");
    assert_eq!(result, "value = \"fallback\"");
}

#[test]
fn test_load_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mqfwd.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.listen, "udp://127.0.0.1:9000");
    assert_eq!(config.mqtt.sub.topic, "t2");
}

#[test]
fn test_load_config_with_env_substitution() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mqfwd.toml");

    std::env::set_var("MQFWD_TEST_PORT", "9007");
    std::fs::write(
        &path,
        r#"
listen = "udp://127.0.0.1:${MQFWD_TEST_PORT}"
send_to = "udp://127.0.0.1:9001"

[mqtt]
broker = "tcp://localhost:1883"
"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.listen, "udp://127.0.0.1:9007");

    std::env::remove_var("MQFWD_TEST_PORT");
}

#[test]
fn test_load_missing_file_is_an_error() {
    let err = Config::load("/nonexistent/mqfwd.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
