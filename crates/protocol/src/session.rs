//! Scoped, time-bounded protocol sessions.
//!
//! A [`SessionGuard`] owns one session for one unit of work. Every
//! operation on it is bounded by the configured [`Timeouts`]. Callers close
//! it explicitly with [`SessionGuard::close`]; a guard dropped without
//! being closed (early return, panic, task cancellation) schedules the
//! disconnect on the tokio runtime instead.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pb_domain::config::ProtocolConfig;

use crate::client::{ConnectionFault, NodeClass, NodeHandle, PointValue, ProtocolClient, ProtocolFault, Session};

/// Upper bounds for each kind of protocol operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub browse: Duration,
    pub read: Duration,
}

impl Timeouts {
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self {
            connect: config.connect_timeout(),
            browse: config.browse_timeout(),
            read: config.read_timeout(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from_config(&ProtocolConfig::default())
    }
}

/// Open a session to `address`, bounded by `timeouts.connect`.
pub async fn open_session(
    client: &dyn ProtocolClient,
    address: &str,
    timeouts: Timeouts,
) -> Result<SessionGuard, ConnectionFault> {
    match tokio::time::timeout(timeouts.connect, client.connect(address)).await {
        Ok(Ok(session)) => {
            tracing::debug!(address = %address, "protocol session opened");
            Ok(SessionGuard {
                session: Some(Arc::from(session)),
                address: address.to_owned(),
                timeouts,
            })
        }
        Ok(Err(fault)) => Err(fault),
        Err(_) => Err(ConnectionFault::Timeout {
            address: address.to_owned(),
            after_ms: timeouts.connect.as_millis() as u64,
        }),
    }
}

/// Exclusive owner of one open session.
pub struct SessionGuard {
    session: Option<Arc<dyn Session>>,
    address: String,
    timeouts: Timeouts,
}

impl SessionGuard {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn root_node(&self) -> NodeHandle {
        match &self.session {
            Some(session) => session.root_node(),
            None => NodeHandle::new(""),
        }
    }

    pub async fn children(&self, node: &NodeHandle) -> Result<Vec<NodeHandle>, ProtocolFault> {
        let session = self.live()?;
        bounded(
            self.timeouts.browse,
            || format!("browsing {node}"),
            session.children(node),
        )
        .await
    }

    pub async fn classify(&self, node: &NodeHandle) -> Result<NodeClass, ProtocolFault> {
        let session = self.live()?;
        bounded(
            self.timeouts.browse,
            || format!("classifying {node}"),
            session.classify(node),
        )
        .await
    }

    pub async fn name(&self, node: &NodeHandle) -> Result<String, ProtocolFault> {
        let session = self.live()?;
        bounded(
            self.timeouts.browse,
            || format!("reading name of {node}"),
            session.name(node),
        )
        .await
    }

    pub async fn read_value(&self, identifier: &str) -> Result<PointValue, ProtocolFault> {
        let session = self.live()?;
        bounded(
            self.timeouts.read,
            || format!("reading {identifier}"),
            session.read_value(identifier),
        )
        .await
    }

    /// Disconnect and consume the guard.
    pub async fn close(mut self) {
        if let Some(session) = self.session.take() {
            session.disconnect().await;
            tracing::debug!(address = %self.address, "protocol session closed");
        }
    }

    fn live(&self) -> Result<&Arc<dyn Session>, ProtocolFault> {
        self.session.as_ref().ok_or_else(|| ProtocolFault::Read {
            identifier: self.address.clone(),
            reason: "session already closed".into(),
        })
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(
                    address = %self.address,
                    "session guard dropped while open, disconnecting in background"
                );
                handle.spawn(async move { session.disconnect().await });
            }
            Err(_) => {
                tracing::warn!(
                    address = %self.address,
                    "session guard dropped outside a runtime, session leaked"
                );
            }
        }
    }
}

async fn bounded<T, F>(
    limit: Duration,
    operation: impl FnOnce() -> String,
    fut: F,
) -> Result<T, ProtocolFault>
where
    F: Future<Output = Result<T, ProtocolFault>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolFault::Timeout {
            operation: operation(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{AddressSpace, SimNode, SimServer, SimulatedClient};

    const PLC: &str = "opc.tcp://10.0.0.3:4840";

    fn client(server: SimServer) -> SimulatedClient {
        SimulatedClient::new(AddressSpace {
            servers: vec![server],
        })
    }

    fn short() -> Timeouts {
        Timeouts {
            connect: Duration::from_millis(50),
            browse: Duration::from_millis(50),
            read: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn close_releases_the_session() {
        let sim = client(SimServer::new(
            PLC,
            vec![SimNode::variable("P3_running", PointValue::Bool(true))],
        ));
        let guard = open_session(&sim, PLC, short()).await.unwrap();
        assert_eq!(sim.open_sessions(), 1);
        assert_eq!(
            guard.read_value("ns=2;s=P3_running").await.unwrap(),
            PointValue::Bool(true)
        );
        guard.close().await;
        assert_eq!(sim.open_sessions(), 0);
    }

    #[tokio::test]
    async fn dropped_guard_disconnects_in_background() {
        let sim = client(SimServer::new(PLC, vec![]));
        {
            let _guard = open_session(&sim, PLC, short()).await.unwrap();
            assert_eq!(sim.open_sessions(), 1);
        }
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(sim.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_timeout_is_a_connection_fault() {
        let sim = client(SimServer::new(PLC, vec![]).hanging());
        let err = open_session(&sim, PLC, short()).await.err().unwrap();
        assert!(matches!(err, ConnectionFault::Timeout { after_ms: 50, .. }));
        assert_eq!(sim.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_operations_time_out_as_protocol_faults() {
        let sim = client(
            SimServer::new(PLC, vec![SimNode::variable("P3_running", PointValue::Bool(true))])
                .with_op_delay(Duration::from_secs(1)),
        );
        let guard = open_session(&sim, PLC, short()).await.unwrap();

        let browse = guard.children(&guard.root_node()).await.unwrap_err();
        assert!(matches!(browse, ProtocolFault::Timeout { .. }));
        let read = guard.read_value("ns=2;s=P3_running").await.unwrap_err();
        assert!(matches!(read, ProtocolFault::Timeout { after_ms: 50, .. }));

        guard.close().await;
        assert_eq!(sim.open_sessions(), 0);
    }
}
