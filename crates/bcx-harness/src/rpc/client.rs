//! JSON-RPC client.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::trace;

use crate::error::HarnessError;
use crate::error::Result;
use crate::rpc::RpcEndpoints;
use crate::rpc::RpcTransport;
use crate::rpc::Unit;

const REQUEST_ID: &str = "jsonrpc";

#[derive(Debug, Serialize)]
struct Request<'a> {
    method: &'a str,
    params: &'a [Value],
    id: &'static str,
}

/// Issues requests against a node's resolved endpoints. Performs no retries;
/// see [`crate::node::NodeHarness::wait_for_boot`] for the startup race.
#[derive(Clone)]
pub struct RpcClient {
    endpoints: RpcEndpoints,
    transport: Arc<dyn RpcTransport>,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    pub fn new(endpoints: RpcEndpoints, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            endpoints,
            transport,
        }
    }

    pub fn endpoints(&self) -> &RpcEndpoints {
        &self.endpoints
    }

    /// Calls `method` on the shares server.
    pub fn rpc(&self, method: &str, params: &[Value]) -> Result<Value> {
        self.unit_rpc(Unit::Shares, method, params)
    }

    /// Returns `result` when `error` is null; otherwise fails with the
    /// daemon's `error` payload untouched.
    pub fn unit_rpc(&self, unit: Unit, method: &str, params: &[Value]) -> Result<Value> {
        let started = Instant::now();
        let body = serde_json::to_string(&Request {
            method,
            params,
            id: REQUEST_ID,
        })?;
        trace!(unit = %unit, method, bytes = body.len(), "RPC request serialized");

        let mut response = self.raw_rpc(unit, &body)?;
        let error = response.get_mut("error").map(Value::take).unwrap_or_default();
        let outcome = if error.is_null() {
            Ok(response
                .get_mut("result")
                .map(Value::take)
                .unwrap_or_default())
        } else {
            Err(HarnessError::Rpc { error })
        };
        debug!(
            unit = %unit,
            method,
            ok = outcome.is_ok(),
            elapsed_ms = started.elapsed().as_millis(),
            "RPC call finished"
        );
        outcome
    }

    /// Posts `body` verbatim and returns the parsed response object.
    pub fn raw_rpc(&self, unit: Unit, body: &str) -> Result<Value> {
        let endpoint = self.endpoints.for_unit(unit);
        let text = self.transport.post(endpoint, body)?;
        Ok(serde_json::from_str(&text)?)
    }
}
