//! Daemon calls scenarios use on every other step.

use serde_json::Value;
use serde_json::json;

use super::NodeHarness;
use crate::error::HarnessError;
use crate::error::Result;
use crate::rpc::Unit;

impl NodeHarness {
    pub fn block_count(&self) -> Result<u64> {
        as_count("getblockcount", self.rpc("getblockcount", &[])?)
    }

    /// Stakes a block on top of `parent`, or on the current tip.
    pub fn generate_stake(&self, parent: Option<&str>) -> Result<Value> {
        let params: Vec<Value> = parent.map(|hash| json!(hash)).into_iter().collect();
        self.rpc("generatestake", &params)
    }

    pub fn top_hash(&self) -> Result<String> {
        let count = self.rpc("getblockcount", &[])?;
        let hash = self.rpc("getblockhash", &[count])?;
        hash.as_str()
            .map(String::from)
            .ok_or_else(|| unexpected("getblockhash", &hash))
    }

    pub fn top_block(&self) -> Result<Value> {
        let hash = self.top_hash()?;
        self.rpc("getblock", &[json!(hash)])
    }

    pub fn connection_count(&self) -> Result<u64> {
        as_count("getconnectioncount", self.rpc("getconnectioncount", &[])?)
    }

    pub fn info(&self) -> Result<Value> {
        self.rpc("getinfo", &[])
    }

    pub fn new_address(&self, account: &str) -> Result<String> {
        let address = self.rpc("getnewaddress", &[json!(account)])?;
        address
            .as_str()
            .map(String::from)
            .ok_or_else(|| unexpected("getnewaddress", &address))
    }

    /// `moneysupply` reported by `getinfo` on the unit's RPC server.
    pub fn money_supply(&self, unit: Unit) -> Result<f64> {
        let info = self.unit_rpc(unit, "getinfo", &[])?;
        info.get("moneysupply")
            .and_then(Value::as_f64)
            .ok_or_else(|| unexpected("getinfo", &info))
    }
}

/// Counts come back as numbers, but a numeric string is accepted too.
fn as_count(method: &str, value: Value) -> Result<u64> {
    match &value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| unexpected(method, &value))
}

fn unexpected(method: &str, value: &Value) -> HarnessError {
    HarnessError::expectation(format!("{method} returned unexpected result: {value}"))
}
