use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use pb_catalog::DeviceCatalog;
use pb_domain::Error;
use pb_protocol::{open_session, PointValue, ProtocolClient, Timeouts};

/// A point value, or the reason it could not be read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PointReading {
    Value(PointValue),
    Error(String),
}

impl PointReading {
    fn error(reason: impl std::fmt::Display) -> Self {
        Self::Error(format!("error: {reason}"))
    }
}

/// Read the current values of catalogued points over one session.
///
/// Unknown devices and requests naming no catalogued point are `NotFound`;
/// an unreachable device is a connection error. Individual read faults and
/// unknown names are reported per point.
pub async fn read_points(
    catalog: &Arc<DeviceCatalog>,
    client: &dyn ProtocolClient,
    timeouts: Timeouts,
    device_no: u32,
    names: &[String],
) -> pb_domain::Result<BTreeMap<String, PointReading>> {
    let wanted = names.to_vec();
    let (device, points) = pb_catalog::blocking(catalog, move |c| {
        let device = c.get_device(device_no)?;
        let points = c.get_points(device_no, &wanted)?;
        Ok((device, points))
    })
    .await?;
    let known: HashMap<String, String> = points
        .into_iter()
        .map(|p| (p.name, p.identifier))
        .collect();
    if known.is_empty() {
        return Err(Error::NotFound(format!(
            "none of the requested points are catalogued for device {device_no}"
        )));
    }

    let session = open_session(client, &device.address, timeouts).await?;
    let mut data = BTreeMap::new();
    for name in names {
        let reading = match known.get(name) {
            Some(identifier) => match session.read_value(identifier).await {
                Ok(value) => PointReading::Value(value),
                Err(fault) => {
                    tracing::debug!(device_no, point = %name, error = %fault, "point read failed");
                    PointReading::error(fault)
                }
            },
            None => PointReading::error("point not catalogued"),
        };
        data.insert(name.clone(), reading);
    }
    session.close().await;

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pb_protocol::{AddressSpace, SimNode, SimServer, SimulatedClient};

    const PLC: &str = "opc.tcp://10.0.0.3:4840";

    async fn setup() -> (Arc<DeviceCatalog>, SimulatedClient) {
        let catalog = Arc::new(DeviceCatalog::open_in_memory().unwrap());
        let client = SimulatedClient::new(AddressSpace {
            servers: vec![SimServer::new(
                PLC,
                vec![
                    SimNode::variable("P3_running", PointValue::Bool(true)),
                    SimNode::variable("P3_temp", PointValue::Float(21.5)),
                    SimNode::variable("P3_bad", PointValue::Int(0)).failing_read(),
                ],
            )],
        });
        crate::runtime::registration::register_device(&catalog, &client, Timeouts::default(), 3, PLC)
            .await
            .unwrap();
        (catalog, client)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn reads_values_and_reports_per_point_errors() {
        let (catalog, client) = setup().await;
        let data = read_points(
            &catalog,
            &client,
            Timeouts::default(),
            3,
            &names(&["P3_temp", "P3_bad", "P3_missing"]),
        )
        .await
        .unwrap();

        assert_eq!(data["P3_temp"], PointReading::Value(PointValue::Float(21.5)));
        assert!(matches!(&data["P3_bad"], PointReading::Error(e) if e.starts_with("error: ")));
        assert!(matches!(&data["P3_missing"], PointReading::Error(_)));
        assert_eq!(client.open_sessions(), 0);
    }

    #[tokio::test]
    async fn unknown_device_or_points_are_not_found() {
        let (catalog, client) = setup().await;
        let err = read_points(&catalog, &client, Timeouts::default(), 9, &names(&["P9_x"]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = read_points(&catalog, &client, Timeouts::default(), 3, &names(&["P3_nope"]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(client.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn unreachable_device_is_a_connection_error() {
        let (catalog, client) = setup().await;
        client.set_refuse(PLC, true);
        let err = read_points(&catalog, &client, Timeouts::default(), 3, &names(&["P3_temp"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[test]
    fn readings_serialize_as_plain_values() {
        let mut data = BTreeMap::new();
        data.insert("a".to_string(), PointReading::Value(PointValue::Int(3)));
        data.insert("b".to_string(), PointReading::error("timed out"));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json, serde_json::json!({"a": 3, "b": "error: timed out"}));
    }
}
