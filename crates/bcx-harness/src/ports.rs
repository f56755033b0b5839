//! Fixed container ports and their host-side mapping.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::engine::ContainerEngine;
use crate::error::HarnessError;
use crate::error::Result;

/// Extra inspects after the first, absorbing the delay between start and
/// the engine publishing bindings.
pub const PORT_RESOLVE_RETRIES: u32 = 3;
pub const PORT_RESOLVE_INTERVAL: Duration = Duration::from_millis(100);

/// One of the three ports every node container exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    P2p,
    RpcShares,
    RpcCredits,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::P2p, Channel::RpcShares, Channel::RpcCredits];

    pub fn container_port(self) -> u16 {
        match self {
            Channel::P2p => 12239,
            Channel::RpcShares => 12240,
            Channel::RpcCredits => 12241,
        }
    }

    /// Key used by the engine for exposed ports and bindings.
    pub fn port_key(self) -> String {
        format!("{}/tcp", self.container_port())
    }
}

/// Host port bound to one container port, as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostBinding {
    pub host_ip: Option<String>,
    pub host_port: Option<String>,
}

/// Host ports for a running container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMap {
    pub p2p: u16,
    pub rpc_shares: u16,
    pub rpc_credits: u16,
}

impl PortMap {
    pub fn get(&self, channel: Channel) -> u16 {
        match channel {
            Channel::P2p => self.p2p,
            Channel::RpcShares => self.rpc_shares,
            Channel::RpcCredits => self.rpc_credits,
        }
    }

    /// Extracts the first host port of each channel. `None` when any channel
    /// is not bound yet.
    pub fn from_bindings(bindings: &HashMap<String, Vec<HostBinding>>) -> Option<Self> {
        let host_port = |channel: Channel| -> Option<u16> {
            bindings
                .get(&channel.port_key())?
                .first()?
                .host_port
                .as_deref()?
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
        };
        Some(Self {
            p2p: host_port(Channel::P2p)?,
            rpc_shares: host_port(Channel::RpcShares)?,
            rpc_credits: host_port(Channel::RpcCredits)?,
        })
    }
}

/// A started container's assigned name and host ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPorts {
    pub name: String,
    pub ports: PortMap,
}

/// Inspects `id` until all three channels are bound, up to `retries` extra
/// attempts `interval` apart. Engine failures are not retried.
pub fn resolve_ports(
    engine: &dyn ContainerEngine,
    id: &str,
    retries: u32,
    interval: Duration,
) -> Result<ResolvedPorts> {
    let mut name = id.to_string();
    for attempt in 0..=retries {
        if attempt > 0 {
            std::thread::sleep(interval);
        }
        let info = engine
            .inspect(id)
            .map_err(|err| err.into_harness("inspect container"))?;
        name = info.name;
        if let Some(ports) = info.ports.as_ref().and_then(PortMap::from_bindings) {
            debug!(container = %name, attempt, ?ports, "Ports resolved");
            return Ok(ResolvedPorts { name, ports });
        }
        debug!(container = %name, attempt, "Ports not bound yet");
    }
    Err(HarnessError::PortsUnavailable { container: name })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(port: &str) -> Vec<HostBinding> {
        vec![HostBinding {
            host_ip: Some("0.0.0.0".to_string()),
            host_port: Some(port.to_string()),
        }]
    }

    #[test]
    fn test_channel_ports() {
        assert_eq!(Channel::P2p.port_key(), "12239/tcp");
        assert_eq!(Channel::RpcShares.port_key(), "12240/tcp");
        assert_eq!(Channel::RpcCredits.port_key(), "12241/tcp");
    }

    #[test]
    fn test_port_map_from_bindings() {
        let bindings = HashMap::from([
            ("12239/tcp".to_string(), binding("49001")),
            ("12240/tcp".to_string(), binding("49002")),
            ("12241/tcp".to_string(), binding("49003")),
        ]);
        let ports = PortMap::from_bindings(&bindings).unwrap();
        assert_eq!(ports.get(Channel::P2p), 49001);
        assert_eq!(ports.get(Channel::RpcShares), 49002);
        assert_eq!(ports.get(Channel::RpcCredits), 49003);
    }

    #[test]
    fn test_port_map_incomplete_bindings() {
        let mut bindings = HashMap::from([
            ("12239/tcp".to_string(), binding("49001")),
            ("12240/tcp".to_string(), binding("49002")),
        ]);
        assert!(PortMap::from_bindings(&bindings).is_none());

        bindings.insert("12241/tcp".to_string(), Vec::new());
        assert!(PortMap::from_bindings(&bindings).is_none());

        bindings.insert("12241/tcp".to_string(), binding("not-a-port"));
        assert!(PortMap::from_bindings(&bindings).is_none());
    }

    #[test]
    fn test_resolve_after_hidden_inspects() {
        use crate::engine::mock::MockEngine;
        use crate::engine::ContainerEngine;
        use crate::engine::CreateSpec;
        use crate::engine::StartSpec;

        let engine = MockEngine::new().with_hidden_ports(2);
        let id = engine.create(&CreateSpec::default()).unwrap();
        engine.start(&id, &StartSpec::default()).unwrap();

        let resolved = resolve_ports(&engine, &id, 3, Duration::from_millis(1)).unwrap();

        assert_eq!(resolved.name, format!("/{id}"));
        assert_eq!(resolved.ports.get(Channel::RpcShares), 40002);
        assert_eq!(engine.count("inspect"), 3);
    }

    #[test]
    fn test_resolve_exhausted_names_container() {
        use crate::engine::mock::MockEngine;
        use crate::engine::ContainerEngine;
        use crate::engine::CreateSpec;
        use crate::engine::StartSpec;

        let engine = MockEngine::new().with_hidden_ports(10);
        let id = engine.create(&CreateSpec::default()).unwrap();
        engine.start(&id, &StartSpec::default()).unwrap();

        let err = resolve_ports(&engine, &id, 3, Duration::from_millis(1)).unwrap_err();

        match err {
            HarnessError::PortsUnavailable { container } => assert_eq!(container, format!("/{id}")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(engine.count("inspect"), 4);
    }
}
