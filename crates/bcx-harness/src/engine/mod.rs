//! Container engine seam.
//!
//! The harness talks to the engine only through [`ContainerEngine`]. The
//! production implementation is [`DockerEngine`]; tests use
//! [`mock::MockEngine`].

mod docker;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;

use std::collections::HashMap;

use thiserror::Error;

pub use docker::DockerEngine;

use crate::error::HarnessError;
use crate::ports::HostBinding;

pub const NET_ADMIN: &str = "NET_ADMIN";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Failed to start engine runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("No such container: {id}")]
    NotFound { id: String },

    #[error("{message}")]
    Rejected { message: String },
}

impl EngineError {
    pub fn into_harness(self, operation: &'static str) -> HarnessError {
        HarnessError::environment(operation, self)
    }
}

/// Arguments of the create call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateSpec {
    pub image: String,
    pub working_dir: String,
    pub tty: bool,
    pub cmd: Vec<String>,
    /// Port keys such as `12239/tcp`.
    pub exposed_ports: Vec<String>,
}

/// Arguments of the start call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartSpec {
    /// Port keys to bind to ephemeral host ports.
    pub port_bindings: Vec<String>,
    /// `host:container` volume bindings.
    pub binds: Vec<String>,
    /// `name:alias` links to running containers.
    pub links: Vec<String>,
    pub cap_add: Vec<String>,
}

/// Live description of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    /// Assigned name, with the engine's leading `/`.
    pub name: String,
    pub running: bool,
    /// `None` until the engine reports network settings.
    pub ports: Option<HashMap<String, Vec<HostBinding>>>,
}

pub trait ContainerEngine: Send + Sync {
    /// Returns the handle id.
    fn create(&self, spec: &CreateSpec) -> Result<String, EngineError>;

    fn start(&self, id: &str, spec: &StartSpec) -> Result<(), EngineError>;

    fn inspect(&self, id: &str) -> Result<ContainerInfo, EngineError>;

    fn restart(&self, id: &str) -> Result<(), EngineError>;

    /// Blocks until the container exits and returns its exit code.
    fn wait(&self, id: &str) -> Result<i64, EngineError>;

    fn remove(&self, id: &str, force: bool) -> Result<(), EngineError>;

    /// Snapshots the container into an image tagged `repo`, replacing any
    /// existing tag.
    fn commit(&self, id: &str, repo: &str) -> Result<(), EngineError>;
}
