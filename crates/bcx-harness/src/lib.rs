#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Harness for driving containerized `bcexchanged` nodes from integration
//! scenarios.
//!
//! A [`NodeHarness`] provisions one node container from a [`HarnessConfig`],
//! resolves its host ports, and talks to the daemon over JSON-RPC. Cleanup is
//! registered with a [`TeardownRegistry`] that the scenario runner drains at
//! shutdown.

mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod node;
pub mod polling;
pub mod ports;
pub mod rpc;
pub mod settings;
pub mod shared;
pub mod signals;
pub mod teardown;

pub use app::Application;
pub use config::HarnessConfig;
pub use error::HarnessError;
pub use error::Result;
pub use node::BootPolicy;
pub use node::HarnessContext;
pub use node::LifecycleState;
pub use node::NodeHarness;
pub use node::links_to;
pub use polling::PollPolicy;
pub use polling::wait_for;
pub use polling::wait_until;
pub use rpc::Unit;
pub use settings::HarnessSettings;
pub use signals::TeardownOnSignal;
pub use teardown::TeardownRegistry;
