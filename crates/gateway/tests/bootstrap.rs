use std::path::PathBuf;
use std::sync::Arc;

use pb_catalog::DeviceCatalog;
use pb_domain::config::ProtocolConfig;
use pb_domain::LinkState;
use pb_gateway::bootstrap;
use pb_gateway::cli::load_config_from;
use pb_gateway::runtime::register_device;
use pb_protocol::Timeouts;

fn repo_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").join(name)
}

#[test]
fn shipped_config_is_valid() {
    let config = load_config_from(repo_file("config.toml").to_str().unwrap()).unwrap();
    assert_eq!(config.polling.interval_sec, 10);
    assert!(config.validate().iter().all(|issue| issue.field != "polling.interval_sec"));
}

#[tokio::test]
async fn shipped_address_space_registers_demo_devices() {
    let protocol = ProtocolConfig {
        address_space: repo_file("address_space.toml"),
        ..ProtocolConfig::default()
    };
    let client = bootstrap::build_protocol_client(&protocol).unwrap();
    let catalog = Arc::new(DeviceCatalog::open_in_memory().unwrap());
    let timeouts = Timeouts::from_config(&protocol);

    let plc3 = register_device(&catalog, client.as_ref(), timeouts, 3, "opc.tcp://10.0.0.3:4840")
        .await
        .unwrap();
    assert_eq!(plc3.points_registered, 2);
    assert_eq!(plc3.liveness_status, LinkState::Connected);

    let plc4 = register_device(&catalog, client.as_ref(), timeouts, 4, "opc.tcp://10.0.0.4:4840")
        .await
        .unwrap();
    assert_eq!(plc4.points_registered, 2);
    assert_eq!(plc4.link_status, LinkState::Connected);
    assert_eq!(plc4.liveness_status, LinkState::Disconnected);

    let refused = register_device(&catalog, client.as_ref(), timeouts, 5, "opc.tcp://10.0.0.5:4840").await;
    assert!(matches!(refused, Err(pb_domain::Error::Connection(_))));
    assert_eq!(catalog.count_devices().unwrap(), 2);
}

#[test]
fn missing_fixture_yields_an_empty_backend() {
    let protocol = ProtocolConfig {
        address_space: PathBuf::from("/nonexistent/address_space.toml"),
        ..ProtocolConfig::default()
    };
    assert!(bootstrap::build_protocol_client(&protocol).is_ok());
}

#[test]
fn invalid_config_refuses_to_boot() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = pb_domain::config::Config::default();
    config.catalog.path = dir.path().join("c.db");
    config.polling.interval_sec = 0;
    let err = bootstrap::build_app_state(Arc::new(config)).err().unwrap();
    assert!(err.to_string().contains("config validation failed"));
}
