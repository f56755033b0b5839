//! One simulated node: its container, ports, RPC client and shared directory.

mod boot;
mod context;
mod queries;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use bcx_harness_common::mutex_lock_or_recover;
use serde_json::Value;
use tracing::debug;
use tracing::info;

pub use boot::BootPolicy;
pub use context::HarnessContext;

use crate::config::HarnessConfig;
use crate::config::PeerLink;
use crate::config::PeerLinks;
use crate::config::SHARED_MOUNT;
use crate::config::WORKING_DIR;
use crate::engine::CreateSpec;
use crate::engine::NET_ADMIN;
use crate::engine::StartSpec;
use crate::error::HarnessError;
use crate::error::Result;
use crate::ports::Channel;
use crate::ports::PORT_RESOLVE_INTERVAL;
use crate::ports::PORT_RESOLVE_RETRIES;
use crate::ports::PortMap;
use crate::ports::resolve_ports;
use crate::rpc::RpcClient;
use crate::rpc::RpcEndpoints;
use crate::rpc::Unit;
use crate::shared;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Running,
    Stopped,
    Removed,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Created => "created",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Removed => "removed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client slot shared with the shutdown teardown hook, so the hook always
/// sees the ports of the latest restart.
type ClientSlot = Arc<Mutex<Option<RpcClient>>>;

pub struct NodeHarness {
    context: HarnessContext,
    config: HarnessConfig,
    id: String,
    name: String,
    state: LifecycleState,
    ports: Option<PortMap>,
    client: ClientSlot,
}

impl fmt::Debug for NodeHarness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHarness")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("ports", &self.ports)
            .finish_non_exhaustive()
    }
}

impl NodeHarness {
    /// Creates the container. Nothing runs until [`Self::start`].
    pub fn create(context: &HarnessContext, config: HarnessConfig) -> Result<Self> {
        let spec = CreateSpec {
            image: config.image().to_string(),
            working_dir: WORKING_DIR.to_string(),
            tty: true,
            cmd: config.daemon_command().argv(),
            exposed_ports: Channel::ALL.iter().map(|c| c.port_key()).collect(),
        };
        let id = context
            .engine()
            .create(&spec)
            .map_err(|err| err.into_harness("create container"))?;
        info!(container = %id, image = %spec.image, "Node container created");
        Ok(Self {
            context: context.clone(),
            config,
            name: id.clone(),
            id,
            state: LifecycleState::Created,
            ports: None,
            client: Arc::new(Mutex::new(None)),
        })
    }

    /// [`Self::create`] followed by [`Self::start`].
    pub fn launch(context: &HarnessContext, config: HarnessConfig) -> Result<Self> {
        let mut node = Self::create(context, config)?;
        node.start()?;
        Ok(node)
    }

    pub fn start(&mut self) -> Result<()> {
        self.require("start", "created", &[LifecycleState::Created])?;

        let mut binds = Vec::new();
        if self.config.bind_code() {
            let source = self.context.settings().source_dir().ok_or_else(|| {
                HarnessError::configuration("bind_code is set but no source directory is known")
            })?;
            binds.push(format!("{}:{WORKING_DIR}", source.display()));
        }
        let shared_dir = self.shared_dir()?;
        binds.push(format!("{}:{SHARED_MOUNT}", shared_dir.display()));

        let spec = StartSpec {
            port_bindings: Channel::ALL.iter().map(|c| c.port_key()).collect(),
            binds,
            links: self.config.links().engine_specs(),
            cap_add: if self.config.netadmin() {
                vec![NET_ADMIN.to_string()]
            } else {
                Vec::new()
            },
        };
        self.context
            .engine()
            .start(&self.id, &spec)
            .map_err(|err| err.into_harness("start container"))?;
        self.state = LifecycleState::Running;
        self.register_exit_hooks();
        info!(container = %self.id, links = spec.links.len(), "Node container started");

        self.resolve_ports()
    }

    fn register_exit_hooks(&self) {
        let teardown = self.context.teardown();
        if self.config.delete_at_exit() {
            let engine = Arc::clone(self.context.engine());
            let id = self.id.clone();
            teardown.register(format!("delete container {id}"), move || {
                engine.remove(&id, true)?;
                Ok(())
            });
        }
        // Registered last so it runs before the deletion above.
        if self.config.shutdown_at_exit() {
            let slot = Arc::clone(&self.client);
            let id = self.id.clone();
            teardown.register(format!("shutdown node {id}"), move || {
                let client = mutex_lock_or_recover(&slot).clone();
                if let Some(client) = client
                    && let Err(err) = client.rpc("shutdown", &[])
                {
                    debug!(container = %id, error = %err, "Shutdown at exit ignored failure");
                }
                Ok(())
            });
        }
    }

    /// Ports from an earlier start or restart are dropped first, so a failed
    /// resolution never leaves stale endpoints behind.
    fn resolve_ports(&mut self) -> Result<()> {
        self.ports = None;
        *mutex_lock_or_recover(&self.client) = None;
        let resolved = resolve_ports(
            self.context.engine().as_ref(),
            &self.id,
            PORT_RESOLVE_RETRIES,
            PORT_RESOLVE_INTERVAL,
        )?;
        let endpoints = RpcEndpoints::from_ports(self.context.settings().rpc_host(), &resolved.ports);
        *mutex_lock_or_recover(&self.client) = Some(RpcClient::new(
            endpoints,
            Arc::clone(self.context.transport()),
        ));
        info!(
            container = %resolved.name,
            p2p = resolved.ports.p2p,
            rpc_shares = resolved.ports.rpc_shares,
            rpc_credits = resolved.ports.rpc_credits,
            "Node ports resolved"
        );
        self.name = resolved.name;
        self.ports = Some(resolved.ports);
        Ok(())
    }

    fn require(
        &self,
        operation: &'static str,
        expected: &'static str,
        allowed: &[LifecycleState],
    ) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(HarnessError::State {
            container: self.name.clone(),
            operation,
            expected,
            actual: self.state,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Engine-assigned name (leading `/` included once started).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn ports(&self) -> Result<PortMap> {
        self.require("read ports", "running", &[LifecycleState::Running])?;
        self.ports
            .ok_or_else(|| HarnessError::PortsUnavailable {
                container: self.name.clone(),
            })
    }

    /// Host port forwarded to the node's P2P port.
    pub fn port(&self) -> Result<u16> {
        Ok(self.ports()?.get(Channel::P2p))
    }

    pub fn rpc_port(&self, unit: Unit) -> Result<u16> {
        Ok(self.ports()?.get(unit.channel()))
    }

    pub fn client(&self) -> Result<RpcClient> {
        self.require("call RPC", "running", &[LifecycleState::Running])?;
        mutex_lock_or_recover(&self.client)
            .clone()
            .ok_or_else(|| HarnessError::PortsUnavailable {
                container: self.name.clone(),
            })
    }

    pub fn rpc(&self, method: &str, params: &[Value]) -> Result<Value> {
        self.client()?.rpc(method, params)
    }

    pub fn unit_rpc(&self, unit: Unit, method: &str, params: &[Value]) -> Result<Value> {
        self.client()?.unit_rpc(unit, method, params)
    }

    pub fn raw_rpc(&self, unit: Unit, body: &str) -> Result<Value> {
        self.client()?.raw_rpc(unit, body)
    }

    /// Restarts the container and picks up its new port bindings.
    pub fn restart(&mut self) -> Result<()> {
        self.require("restart", "running", &[LifecycleState::Running])?;
        self.context
            .engine()
            .restart(&self.id)
            .map_err(|err| err.into_harness("restart container"))?;
        info!(container = %self.name, "Node container restarted");
        self.resolve_ports()
    }

    /// Asks the daemon to stop. The container exits shortly after.
    pub fn shutdown(&self) -> Result<Value> {
        self.rpc("shutdown", &[])
    }

    /// Blocks until the container process exits; returns its exit code.
    pub fn wait_for_shutdown(&mut self) -> Result<i64> {
        self.require(
            "wait for shutdown",
            "running or stopped",
            &[LifecycleState::Running, LifecycleState::Stopped],
        )?;
        let code = self
            .context
            .engine()
            .wait(&self.id)
            .map_err(|err| err.into_harness("wait for container"))?;
        self.state = LifecycleState::Stopped;
        *mutex_lock_or_recover(&self.client) = None;
        info!(container = %self.name, exit_code = code, "Node container stopped");
        Ok(code)
    }

    pub fn stop(&mut self) -> Result<i64> {
        self.shutdown()?;
        self.wait_for_shutdown()
    }

    /// Forced removal. Valid from any state but [`LifecycleState::Removed`].
    pub fn delete(&mut self) -> Result<()> {
        self.require(
            "delete",
            "created, running or stopped",
            &[
                LifecycleState::Created,
                LifecycleState::Running,
                LifecycleState::Stopped,
            ],
        )?;
        self.context
            .engine()
            .remove(&self.id, true)
            .map_err(|err| err.into_harness("remove container"))?;
        self.state = LifecycleState::Removed;
        self.ports = None;
        *mutex_lock_or_recover(&self.client) = None;
        info!(container = %self.name, "Node container removed");
        Ok(())
    }

    /// Snapshots the container as image `repo`.
    pub fn commit(&self, repo: &str) -> Result<()> {
        self.require(
            "commit",
            "running or stopped",
            &[LifecycleState::Running, LifecycleState::Stopped],
        )?;
        self.context
            .engine()
            .commit(&self.id, repo)
            .map_err(|err| err.into_harness("commit container"))?;
        info!(container = %self.name, repo, "Node container committed");
        Ok(())
    }

    /// Host directory mounted at `/shared`.
    pub fn shared_dir(&self) -> Result<PathBuf> {
        self.context
            .volumes()
            .dir_for(&self.id, self.context.teardown())
    }

    pub fn shared_path(&self, filename: &str) -> Result<PathBuf> {
        Ok(self.shared_dir()?.join(filename))
    }

    pub fn shared_path_in_container(&self, filename: &str) -> String {
        shared::path_in_container(filename)
    }

    /// Link to this node for a peer's configuration.
    pub fn link(&self) -> PeerLink {
        PeerLink::from_name(self.name.clone())
    }
}

/// Links to already running nodes, aliased by their names.
pub fn links_to(nodes: &[&NodeHarness]) -> PeerLinks {
    PeerLinks::names(nodes.iter().map(|node| node.name().to_string()))
}
