use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use pb_catalog::DeviceCatalog;
use pb_domain::config::Config;
use pb_domain::{LinkState, StatusPair};
use pb_gateway::runtime::PollingScheduler;
use pb_gateway::state::AppState;
use pb_gateway::{api, bootstrap};
use pb_protocol::{AddressSpace, PointValue, SimNode, SimServer, SimulatedClient, Timeouts};

const PLC3: &str = "opc.tcp://10.0.0.3:4840";
const PLC5: &str = "opc.tcp://10.0.0.5:4840";
const PLC7: &str = "opc.tcp://10.0.0.7:4840";
const HUNG: &str = "opc.tcp://10.0.0.8:4840";

struct Harness {
    state: AppState,
    client: Arc<SimulatedClient>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(DeviceCatalog::open(&dir.path().join("catalog.db")).unwrap());
        let client = Arc::new(SimulatedClient::new(AddressSpace {
            servers: vec![
                SimServer::new(
                    PLC3,
                    vec![SimNode::folder(
                        "Line3",
                        vec![
                            SimNode::variable("P3_running", PointValue::Bool(true)),
                            SimNode::variable("P3_temp", PointValue::Float(21.5)),
                            SimNode::variable("P4_speed", PointValue::Int(900)),
                            SimNode::variable("Temperature", PointValue::Float(19.0)),
                        ],
                    )],
                ),
                SimServer::new(PLC5, vec![]).refusing(),
                SimServer::new(
                    PLC7,
                    vec![SimNode::variable("P7_running", PointValue::Bool(true))],
                ),
                SimServer::new(HUNG, vec![]).hanging(),
            ],
        }));
        let timeouts = Timeouts {
            connect: Duration::from_millis(200),
            browse: Duration::from_millis(200),
            read: Duration::from_millis(200),
        };
        let state = bootstrap::with_parts(
            Arc::new(Config::default()),
            catalog,
            client.clone(),
            timeouts,
        );
        Self {
            state,
            client,
            _dir: dir,
        }
    }

    fn app(&self) -> Router {
        api::router().with_state(self.state.clone())
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.map(|b| b.to_string()).unwrap_or_default()))
            .unwrap();
        let response = self.app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register(&self, device_no: u32, address: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/v1/devices/register",
            Some(json!({ "device_no": device_no, "address": address })),
        )
        .await
    }
}

#[tokio::test]
async fn registering_device_3_catalogues_its_points() {
    let h = Harness::new();

    let (status, body) = h.register(3, PLC3).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "connected");
    assert_eq!(body["points_registered"], 2);
    assert_eq!(body["heartbeat_point"], "P3_running");
    assert_eq!(body["link_status"], "connected");
    assert_eq!(body["liveness_status"], "connected");

    let device = h.state.catalog.get_device(3).unwrap();
    assert_eq!(device.point_count, 2);
    assert_eq!(device.heartbeat_point_name, "P3_running");
    assert_eq!(device.heartbeat_point_id, "ns=2;s=Line3.P3_running");
    assert_eq!(device.last_checked_at, None);

    let (status, body) = h.call(Method::GET, "/v1/devices/3/points", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["points"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["P3_running", "P3_temp"]);

    let (status, body) = h.call(Method::GET, "/v1/devices/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["devices"][0]["combined_connected"], true);
    assert!(body["devices"][0]["last_checked_at"].is_null());
    assert_eq!(body["devices"][0]["message"], "PLC 3 not checked yet");

    assert_eq!(h.client.open_sessions(), 0);
}

#[tokio::test]
async fn refused_registration_writes_nothing() {
    let h = Harness::new();

    let (status, body) = h.register(5, PLC5).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("refused"));

    assert_eq!(h.state.catalog.count_devices().unwrap(), 0);
    assert!(h.state.catalog.list_points(5).unwrap().is_empty());
    let (status, _) = h.call(Method::GET, "/v1/devices/5", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hanging_endpoint_times_out_instead_of_blocking() {
    let h = Harness::new();

    let (status, body) = tokio::time::timeout(Duration::from_secs(5), h.register(8, HUNG))
        .await
        .expect("registration blocked on a hanging endpoint");
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("timed out"));
    assert_eq!(h.state.catalog.count_devices().unwrap(), 0);
}

#[tokio::test]
async fn sweep_tracks_stopped_and_unreachable_devices() {
    let h = Harness::new();
    assert_eq!(h.register(3, PLC3).await.0, StatusCode::OK);
    assert_eq!(h.register(7, PLC7).await.0, StatusCode::OK);

    // Device 3 stops running; device 7 drops off the network.
    h.client
        .set_value(PLC3, "ns=2;s=Line3.P3_running", PointValue::Bool(false));
    h.client.set_refuse(PLC7, true);
    for device_no in [3, 7] {
        assert_eq!(h.state.catalog.get_device(device_no).unwrap().last_checked_at, None);
    }
    let before = chrono::Utc::now();

    let scheduler = PollingScheduler::new(
        h.state.catalog.clone(),
        h.state.reconciler(),
        Duration::from_secs(10),
        h.state.scheduler.clone(),
    );
    let summary = scheduler.sweep(&CancellationToken::new()).await;
    assert_eq!(summary.devices, 2);
    assert_eq!(summary.reconciled, 2);

    let up = LinkState::Connected;
    let down = LinkState::Disconnected;
    let three = h.state.catalog.get_device(3).unwrap();
    assert_eq!(three.status(), StatusPair::new(up, down));
    let seven = h.state.catalog.get_device(7).unwrap();
    assert_eq!(seven.status(), StatusPair::new(down, down));
    for device in [&three, &seven] {
        let checked = device.last_checked_at.expect("sweep records a check time");
        assert!(checked >= before);
    }

    // Points are untouched by reconciliation.
    assert_eq!(h.state.catalog.list_points(3).unwrap().len(), 2);

    let (_, body) = h.call(Method::GET, "/v1/devices/status", None).await;
    let messages: Vec<&str> = body["devices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["message"].as_str().unwrap())
        .collect();
    assert_eq!(
        messages,
        [
            "PLC 3 reachable but not running (10.0.0.3)",
            "PLC 7 unreachable (10.0.0.7)",
        ]
    );
    assert_eq!(h.client.open_sessions(), 0);
}

#[tokio::test]
async fn point_read_reports_values_and_errors() {
    let h = Harness::new();
    assert_eq!(h.register(3, PLC3).await.0, StatusCode::OK);

    let (status, body) = h
        .call(
            Method::POST,
            "/v1/points/read",
            Some(json!({ "device_no": 3, "point_names": ["P3_temp", "P3_unknown"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["P3_temp"], 21.5);
    assert!(body["data"]["P3_unknown"].as_str().unwrap().starts_with("error:"));

    let (status, _) = h
        .call(
            Method::POST,
            "/v1/points/read",
            Some(json!({ "device_no": 3, "point_names": ["P3_unknown"] })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    h.client.set_refuse(PLC3, true);
    let (status, _) = h
        .call(
            Method::POST,
            "/v1/points/read",
            Some(json!({ "device_no": 3, "point_names": ["P3_temp"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn removal_is_isolated_and_not_found_on_repeat() {
    let h = Harness::new();
    assert_eq!(h.register(3, PLC3).await.0, StatusCode::OK);
    assert_eq!(h.register(7, PLC7).await.0, StatusCode::OK);

    let (status, body) = h.call(Method::DELETE, "/v1/devices/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devices_removed"], 1);
    assert_eq!(body["points_removed"], 2);

    assert_eq!(h.state.catalog.get_device(7).unwrap().point_count, 1);
    assert_eq!(h.state.catalog.list_points(7).unwrap().len(), 1);

    let (status, body) = h.call(Method::DELETE, "/v1/devices/3", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn health_reports_scheduler_and_device_count() {
    let h = Harness::new();
    assert_eq!(h.register(7, PLC7).await.0, StatusCode::OK);

    let (status, body) = h.call(Method::GET, "/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["scheduler"], "idle");
    assert_eq!(body["devices"], 1);
}

#[tokio::test]
async fn background_scheduler_stops_on_shutdown() {
    let h = Harness::new();
    let background = bootstrap::spawn_background_tasks(&h.state);
    tokio::task::yield_now().await;

    tokio::time::timeout(Duration::from_secs(2), background.shutdown())
        .await
        .expect("scheduler did not stop promptly");
    assert_eq!(h.state.scheduler.get(), pb_gateway::runtime::SchedulerState::Stopped);
}
