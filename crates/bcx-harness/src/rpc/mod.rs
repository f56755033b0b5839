//! JSON-RPC access to a node's two RPC servers.

mod client;
pub mod transport;
mod unit;

pub use client::RpcClient;
pub use transport::HttpTransport;
pub use transport::RpcTransport;
pub use unit::Unit;

use crate::ports::PortMap;

/// Credentials baked into the test image's daemon config.
pub const RPC_USER: &str = "user";
pub const RPC_PASSWORD: &str = "pass";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoint {
    host: String,
    port: u16,
    user: String,
    password: String,
}

impl RpcEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            user: RPC_USER.to_string(),
            password: RPC_PASSWORD.to_string(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

/// One endpoint per unit, derived from a resolved port map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoints {
    shares: RpcEndpoint,
    credits: RpcEndpoint,
}

impl RpcEndpoints {
    pub fn new(shares: RpcEndpoint, credits: RpcEndpoint) -> Self {
        Self { shares, credits }
    }

    pub fn from_ports(host: &str, ports: &PortMap) -> Self {
        Self {
            shares: RpcEndpoint::new(host, ports.get(Unit::Shares.channel())),
            credits: RpcEndpoint::new(host, ports.get(Unit::Credits.channel())),
        }
    }

    pub fn for_unit(&self, unit: Unit) -> &RpcEndpoint {
        match unit {
            Unit::Shares => &self.shares,
            Unit::Credits => &self.credits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_from_ports() {
        let ports = PortMap {
            p2p: 40001,
            rpc_shares: 40002,
            rpc_credits: 40003,
        };
        let endpoints = RpcEndpoints::from_ports("localhost", &ports);
        assert_eq!(
            endpoints.for_unit(Unit::Shares).url(),
            "http://localhost:40002/"
        );
        assert_eq!(
            endpoints.for_unit(Unit::Credits).url(),
            "http://localhost:40003/"
        );
        assert_eq!(endpoints.for_unit(Unit::Credits).user(), "user");
        assert_eq!(endpoints.for_unit(Unit::Credits).password(), "pass");
    }
}
