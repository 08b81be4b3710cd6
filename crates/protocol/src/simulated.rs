//! In-process protocol backend driven by a TOML address-space fixture.
//!
//! ```toml
//! [[servers]]
//! address = "opc.tcp://10.0.0.3:4840"
//!
//! [[servers.nodes]]
//! name = "Line3"
//!
//! [[servers.nodes.children]]
//! name = "P3_running"
//! value = true
//! ```
//!
//! Node identifiers default to `ns=2;s=<dotted path of names>`. Faults can
//! be injected per server (`refuse`, `hang`, `op_delay_ms`) and per node
//! (`fail_browse`, `fail_attributes`, `fail_read`).

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::client::{
    ConnectionFault, NodeClass, NodeHandle, PointValue, ProtocolClient, ProtocolFault, Session,
};
use crate::endpoint::Endpoint;

/// Identifier of the synthetic root ("Objects") node.
pub const ROOT_ID: &str = "i=85";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fixture model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Whole simulated network: one entry per reachable server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressSpace {
    #[serde(default)]
    pub servers: Vec<SimServer>,
}

impl AddressSpace {
    pub fn from_toml_str(raw: &str) -> pb_domain::Result<Self> {
        toml::from_str(raw)
            .map_err(|e| pb_domain::Error::Config(format!("invalid address space: {e}")))
    }

    pub fn load(path: &Path) -> pb_domain::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimServer {
    pub address: String,
    /// Reject every connection attempt.
    #[serde(default)]
    pub refuse: bool,
    /// Never complete a connection attempt.
    #[serde(default)]
    pub hang: bool,
    /// Artificial latency added to every session operation.
    #[serde(default)]
    pub op_delay_ms: u64,
    #[serde(default)]
    pub nodes: Vec<SimNode>,
}

impl SimServer {
    pub fn new(address: impl Into<String>, nodes: Vec<SimNode>) -> Self {
        Self {
            address: address.into(),
            refuse: false,
            hang: false,
            op_delay_ms: 0,
            nodes,
        }
    }

    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay_ms = delay.as_millis() as u64;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimNode {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Defaults to value-bearing when `value` is set, structural otherwise.
    #[serde(default)]
    pub class: Option<NodeClass>,
    #[serde(default)]
    pub value: Option<PointValue>,
    #[serde(default)]
    pub fail_browse: bool,
    #[serde(default)]
    pub fail_attributes: bool,
    #[serde(default)]
    pub fail_read: bool,
    #[serde(default)]
    pub children: Vec<SimNode>,
}

impl SimNode {
    pub fn folder(name: impl Into<String>, children: Vec<SimNode>) -> Self {
        Self {
            name: name.into(),
            id: None,
            class: None,
            value: None,
            fail_browse: false,
            fail_attributes: false,
            fail_read: false,
            children,
        }
    }

    pub fn variable(name: impl Into<String>, value: PointValue) -> Self {
        Self {
            value: Some(value),
            ..Self::folder(name, Vec::new())
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_children(mut self, children: Vec<SimNode>) -> Self {
        self.children = children;
        self
    }

    pub fn failing_browse(mut self) -> Self {
        self.fail_browse = true;
        self
    }

    pub fn failing_attributes(mut self) -> Self {
        self.fail_attributes = true;
        self
    }

    pub fn failing_read(mut self) -> Self {
        self.fail_read = true;
        self
    }

    fn effective_class(&self) -> NodeClass {
        match self.class {
            Some(class) => class,
            None if self.value.is_some() => NodeClass::ValueBearing,
            None => NodeClass::Structural,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Flattened server state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
struct IndexedNode {
    name: String,
    class: NodeClass,
    fail_browse: bool,
    fail_attributes: bool,
    fail_read: bool,
    children: Vec<String>,
}

#[derive(Debug, Default)]
struct NodeIndex {
    nodes: HashMap<String, IndexedNode>,
}

impl NodeIndex {
    fn build(roots: &[SimNode], values: &mut HashMap<String, PointValue>) -> Self {
        let mut index = NodeIndex::default();
        let top = roots
            .iter()
            .map(|node| index.insert(node, "", values))
            .collect();
        index.nodes.insert(
            ROOT_ID.to_owned(),
            IndexedNode {
                name: "Objects".to_owned(),
                class: NodeClass::Structural,
                fail_browse: false,
                fail_attributes: false,
                fail_read: false,
                children: top,
            },
        );
        index
    }

    fn insert(
        &mut self,
        node: &SimNode,
        parent_path: &str,
        values: &mut HashMap<String, PointValue>,
    ) -> String {
        let path = if parent_path.is_empty() {
            node.name.clone()
        } else {
            format!("{parent_path}.{}", node.name)
        };
        let id = node.id.clone().unwrap_or_else(|| format!("ns=2;s={path}"));
        let children = node
            .children
            .iter()
            .map(|child| self.insert(child, &path, values))
            .collect();
        if let Some(value) = &node.value {
            values.insert(id.clone(), value.clone());
        }
        self.nodes.insert(
            id.clone(),
            IndexedNode {
                name: node.name.clone(),
                class: node.effective_class(),
                fail_browse: node.fail_browse,
                fail_attributes: node.fail_attributes,
                fail_read: node.fail_read,
                children,
            },
        );
        id
    }
}

struct ServerState {
    refuse: bool,
    hang: bool,
    op_delay: Duration,
    index: Arc<NodeIndex>,
    values: Arc<Mutex<HashMap<String, PointValue>>>,
}

impl ServerState {
    fn from_fixture(server: &SimServer) -> Self {
        let mut values = HashMap::new();
        let index = NodeIndex::build(&server.nodes, &mut values);
        Self {
            refuse: server.refuse,
            hang: server.hang,
            op_delay: Duration::from_millis(server.op_delay_ms),
            index: Arc::new(index),
            values: Arc::new(Mutex::new(values)),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// [`ProtocolClient`] backed by an [`AddressSpace`].
///
/// Keeps a count of sessions that are open right now so callers can
/// assert that every unit of work released its session.
pub struct SimulatedClient {
    servers: RwLock<HashMap<String, ServerState>>,
    open_sessions: Arc<AtomicUsize>,
    connect_attempts: AtomicUsize,
}

impl SimulatedClient {
    pub fn new(space: AddressSpace) -> Self {
        let servers = space
            .servers
            .iter()
            .map(|s| (s.address.trim().to_owned(), ServerState::from_fixture(s)))
            .collect();
        Self {
            servers: RwLock::new(servers),
            open_sessions: Arc::new(AtomicUsize::new(0)),
            connect_attempts: AtomicUsize::new(0),
        }
    }

    pub fn insert_server(&self, server: SimServer) {
        self.servers.write().insert(
            server.address.trim().to_owned(),
            ServerState::from_fixture(&server),
        );
    }

    /// Change the live value of a node. Returns false when the server is
    /// unknown.
    pub fn set_value(&self, address: &str, identifier: &str, value: PointValue) -> bool {
        match self.servers.read().get(address.trim()) {
            Some(state) => {
                state.values.lock().insert(identifier.to_owned(), value);
                true
            }
            None => false,
        }
    }

    pub fn set_refuse(&self, address: &str, refuse: bool) -> bool {
        match self.servers.write().get_mut(address.trim()) {
            Some(state) => {
                state.refuse = refuse;
                true
            }
            None => false,
        }
    }

    /// Sessions opened and not yet disconnected.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolClient for SimulatedClient {
    async fn connect(&self, address: &str) -> Result<Box<dyn Session>, ConnectionFault> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        Endpoint::parse(address)?;

        let outcome = {
            let servers = self.servers.read();
            match servers.get(address.trim()) {
                None => Err(ConnectionFault::Unresolvable(address.to_owned())),
                Some(state) if state.refuse => Err(ConnectionFault::Refused(address.to_owned())),
                Some(state) if state.hang => Ok(None),
                Some(state) => Ok(Some(SimSession {
                    index: state.index.clone(),
                    values: state.values.clone(),
                    op_delay: state.op_delay,
                    open_sessions: self.open_sessions.clone(),
                    closed: AtomicBool::new(false),
                })),
            }
        };

        match outcome? {
            Some(session) => {
                self.open_sessions.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(session))
            }
            None => {
                std::future::pending::<()>().await;
                Err(ConnectionFault::Timeout {
                    address: address.to_owned(),
                    after_ms: u64::MAX,
                })
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct SimSession {
    index: Arc<NodeIndex>,
    values: Arc<Mutex<HashMap<String, PointValue>>>,
    op_delay: Duration,
    open_sessions: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl SimSession {
    async fn enter(&self, node: &str) -> Result<&IndexedNode, String> {
        if !self.op_delay.is_zero() {
            tokio::time::sleep(self.op_delay).await;
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err("session closed".into());
        }
        self.index
            .nodes
            .get(node)
            .ok_or_else(|| format!("unknown node {node}"))
    }
}

#[async_trait]
impl Session for SimSession {
    fn root_node(&self) -> NodeHandle {
        NodeHandle::new(ROOT_ID)
    }

    async fn children(&self, node: &NodeHandle) -> Result<Vec<NodeHandle>, ProtocolFault> {
        let browse = |reason: String| ProtocolFault::Browse {
            node: node.to_string(),
            reason,
        };
        let entry = self.enter(node.identifier()).await.map_err(browse)?;
        if entry.fail_browse {
            return Err(browse("browse rejected by server".into()));
        }
        Ok(entry.children.iter().map(NodeHandle::new).collect())
    }

    async fn classify(&self, node: &NodeHandle) -> Result<NodeClass, ProtocolFault> {
        let attribute = |reason: String| ProtocolFault::Attribute {
            node: node.to_string(),
            reason,
        };
        let entry = self.enter(node.identifier()).await.map_err(attribute)?;
        if entry.fail_attributes {
            return Err(attribute("node class unavailable".into()));
        }
        Ok(entry.class)
    }

    async fn name(&self, node: &NodeHandle) -> Result<String, ProtocolFault> {
        let attribute = |reason: String| ProtocolFault::Attribute {
            node: node.to_string(),
            reason,
        };
        let entry = self.enter(node.identifier()).await.map_err(attribute)?;
        if entry.fail_attributes {
            return Err(attribute("browse name unavailable".into()));
        }
        Ok(entry.name.clone())
    }

    async fn read_value(&self, identifier: &str) -> Result<PointValue, ProtocolFault> {
        let read = |reason: String| ProtocolFault::Read {
            identifier: identifier.to_owned(),
            reason,
        };
        let entry = self.enter(identifier).await.map_err(read)?;
        if entry.fail_read {
            return Err(read("bad status from server".into()));
        }
        self.values
            .lock()
            .get(identifier)
            .cloned()
            .ok_or_else(|| read("node has no value".into()))
    }

    async fn disconnect(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
