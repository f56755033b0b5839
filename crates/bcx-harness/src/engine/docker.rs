//! Docker Engine API adapter.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use bcx_harness_common::mutex_lock_or_recover;
use bollard::API_DEFAULT_VERSION;
use bollard::Docker;
use bollard::container::Config;
use bollard::container::CreateContainerOptions;
use bollard::container::InspectContainerOptions;
use bollard::container::RemoveContainerOptions;
use bollard::container::RestartContainerOptions;
use bollard::container::StartContainerOptions;
use bollard::container::WaitContainerOptions;
use bollard::image::CommitContainerOptions;
use bollard::models::HostConfig;
use bollard::models::PortBinding;
use futures_util::StreamExt;
use tokio::runtime::Runtime;
use tracing::debug;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use super::ContainerEngine;
use super::ContainerInfo;
use super::CreateSpec;
use super::EngineError;
use super::StartSpec;
use crate::ports::HostBinding;

const CONNECT_TIMEOUT_SECS: u64 = 120;
// Link variables are derived from the name, so it stays a shell identifier.
const NAME_PREFIX: &str = "bcx_node_";

/// Blocking [`ContainerEngine`] over the Docker Engine API.
///
/// Docker only accepts host configuration (port bindings, binds, links,
/// capabilities) at create time, while the harness supplies it at start. So
/// `create` reserves a unique container name and keeps the spec; `start`
/// performs the actual create followed by start. The name is the handle id.
/// A failed `start` leaves the container staged so it can be retried.
pub struct DockerEngine {
    docker: Docker,
    runtime: Runtime,
    staged: Mutex<HashMap<String, CreateSpec>>,
}

impl std::fmt::Debug for DockerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerEngine")
            .field("staged", &mutex_lock_or_recover(&self.staged).len())
            .finish_non_exhaustive()
    }
}

impl DockerEngine {
    /// Connects using `DOCKER_HOST` or the platform's default socket.
    pub fn connect() -> Result<Self, EngineError> {
        Self::connect_to(None)
    }

    /// Connects to `host` (`unix://...`, `tcp://...` or `http://...`), or to
    /// the local defaults when `None`.
    pub fn connect_to(host: Option<&str>) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("bcx-docker")
            .enable_all()
            .build()
            .map_err(EngineError::Runtime)?;
        let docker = {
            let _guard = runtime.enter();
            match host {
                None => Docker::connect_with_local_defaults()?,
                Some(host) => {
                    let parsed = Url::parse(host).map_err(|err| EngineError::Rejected {
                        message: format!("invalid Docker host {host:?}: {err}"),
                    })?;
                    match parsed.scheme() {
                        "unix" => Docker::connect_with_unix(
                            host,
                            CONNECT_TIMEOUT_SECS,
                            API_DEFAULT_VERSION,
                        )?,
                        "tcp" | "http" => Docker::connect_with_http(
                            host,
                            CONNECT_TIMEOUT_SECS,
                            API_DEFAULT_VERSION,
                        )?,
                        scheme => {
                            return Err(EngineError::Rejected {
                                message: format!("unsupported Docker host scheme {scheme:?}"),
                            });
                        }
                    }
                }
            }
        };
        debug!(host = host.unwrap_or("local defaults"), "Connected to Docker");
        Ok(Self {
            docker,
            runtime,
            staged: Mutex::new(HashMap::new()),
        })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

fn container_name() -> String {
    format!("{NAME_PREFIX}{}", Uuid::new_v4().simple())
}

fn container_config(spec: CreateSpec, start: &StartSpec) -> Config<String> {
    let exposed_ports = spec
        .exposed_ports
        .into_iter()
        .map(|key| (key, HashMap::new()))
        .collect();
    // An empty binding asks the engine for an ephemeral host port.
    let port_bindings = start
        .port_bindings
        .iter()
        .map(|key| {
            (
                key.clone(),
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: None,
                }]),
            )
        })
        .collect();
    let host_config = HostConfig {
        port_bindings: Some(port_bindings),
        binds: Some(start.binds.clone()),
        links: Some(start.links.clone()),
        cap_add: (!start.cap_add.is_empty()).then(|| start.cap_add.clone()),
        ..Default::default()
    };
    Config {
        image: Some(spec.image),
        working_dir: Some(spec.working_dir),
        tty: Some(spec.tty),
        open_stdin: Some(spec.tty),
        cmd: Some(spec.cmd),
        exposed_ports: Some(exposed_ports),
        host_config: Some(host_config),
        ..Default::default()
    }
}

impl ContainerEngine for DockerEngine {
    fn create(&self, spec: &CreateSpec) -> Result<String, EngineError> {
        let name = container_name();
        debug!(container = %name, image = %spec.image, "Container staged");
        mutex_lock_or_recover(&self.staged).insert(name.clone(), spec.clone());
        Ok(name)
    }

    fn start(&self, id: &str, spec: &StartSpec) -> Result<(), EngineError> {
        let staged = mutex_lock_or_recover(&self.staged)
            .remove(id)
            .ok_or_else(|| EngineError::NotFound { id: id.to_string() })?;
        let config = container_config(staged.clone(), spec);
        let options = CreateContainerOptions {
            name: id.to_string(),
            platform: None,
        };
        let outcome = self.block_on(async {
            let created = self.docker.create_container(Some(options), config).await?;
            debug!(container = %id, engine_id = %created.id, "Container created");
            if let Err(err) = self
                .docker
                .start_container(id, None::<StartContainerOptions<String>>)
                .await
            {
                let remove = RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                };
                if let Err(cleanup) = self.docker.remove_container(id, Some(remove)).await {
                    warn!(
                        container = %id,
                        error = %cleanup,
                        "Failed to remove unstarted container"
                    );
                }
                return Err(err);
            }
            Ok(())
        });
        if let Err(err) = outcome {
            mutex_lock_or_recover(&self.staged).insert(id.to_string(), staged);
            return Err(err.into());
        }
        debug!(container = %id, "Container started");
        Ok(())
    }

    fn inspect(&self, id: &str) -> Result<ContainerInfo, EngineError> {
        let inspect = self.block_on(
            self.docker
                .inspect_container(id, None::<InspectContainerOptions>),
        )?;
        let ports = inspect
            .network_settings
            .and_then(|settings| settings.ports)
            .map(|ports| {
                ports
                    .into_iter()
                    .map(|(key, bindings)| {
                        let bindings = bindings
                            .unwrap_or_default()
                            .into_iter()
                            .map(|binding| HostBinding {
                                host_ip: binding.host_ip,
                                host_port: binding.host_port,
                            })
                            .collect();
                        (key, bindings)
                    })
                    .collect()
            });
        Ok(ContainerInfo {
            id: inspect.id.unwrap_or_else(|| id.to_string()),
            name: inspect.name.unwrap_or_else(|| format!("/{id}")),
            running: inspect
                .state
                .and_then(|state| state.running)
                .unwrap_or(false),
            ports,
        })
    }

    fn restart(&self, id: &str) -> Result<(), EngineError> {
        self.block_on(
            self.docker
                .restart_container(id, None::<RestartContainerOptions>),
        )?;
        debug!(container = %id, "Container restarted");
        Ok(())
    }

    fn wait(&self, id: &str) -> Result<i64, EngineError> {
        let outcome = self.block_on(async {
            let mut stream = self
                .docker
                .wait_container(id, None::<WaitContainerOptions<String>>);
            stream.next().await
        });
        match outcome {
            Some(Ok(response)) => Ok(response.status_code),
            // Non-zero exits arrive as an error carrying the code.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(err)) => Err(err.into()),
            None => Err(EngineError::Rejected {
                message: format!("wait stream for {id} ended without a status"),
            }),
        }
    }

    fn remove(&self, id: &str, force: bool) -> Result<(), EngineError> {
        if mutex_lock_or_recover(&self.staged).remove(id).is_some() {
            debug!(container = %id, "Staged container discarded");
            return Ok(());
        }
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.block_on(self.docker.remove_container(id, Some(options)))?;
        debug!(container = %id, force, "Container removed");
        Ok(())
    }

    fn commit(&self, id: &str, repo: &str) -> Result<(), EngineError> {
        let options = CommitContainerOptions {
            container: id.to_string(),
            repo: repo.to_string(),
            ..Default::default()
        };
        self.block_on(
            self.docker
                .commit_container(options, Config::<String>::default()),
        )?;
        debug!(container = %id, repo, "Container committed");
        Ok(())
    }
}
