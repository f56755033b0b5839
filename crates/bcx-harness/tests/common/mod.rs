#![expect(dead_code, reason = "Test harness helpers are used selectively.")]
#![expect(unused_imports, reason = "Test harness re-exports vary by test.")]

//! Shared fixtures for integration tests.

pub mod rpc_stub;

pub use rpc_stub::RpcStub;
pub use rpc_stub::StubReply;
pub use rpc_stub::free_port;
pub use rpc_stub::getinfo_handler;

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use assert_cmd::Command;
use bcx_harness::HarnessContext;
use bcx_harness::HarnessSettings;
use bcx_harness::TeardownRegistry;
use bcx_harness::engine::mock::MockEngine;
use bcx_harness::rpc::RpcTransport;

pub const SOURCE_DIR: &str = "/src/bcexchange";

pub fn bcx_node_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("bcx-node"))
}

pub fn settings(shared_root: &Path) -> HarnessSettings {
    HarnessSettings::from_env()
        .with_shared_root(shared_root)
        .with_source_dir(Some(PathBuf::from(SOURCE_DIR)))
        .with_rpc_host("127.0.0.1")
}

/// Context over a mock engine, a private teardown registry and `transport`.
pub fn mock_context(
    shared_root: &Path,
    engine: Arc<MockEngine>,
    transport: Arc<dyn RpcTransport>,
) -> (HarnessContext, Arc<TeardownRegistry>) {
    let teardown = Arc::new(TeardownRegistry::new());
    let context = HarnessContext::new(
        settings(shared_root),
        engine,
        transport,
        Arc::clone(&teardown),
    );
    (context, teardown)
}
