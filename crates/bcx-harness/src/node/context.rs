use std::sync::Arc;

use crate::engine::ContainerEngine;
use crate::engine::DockerEngine;
use crate::error::Result;
use crate::rpc::HttpTransport;
use crate::rpc::RpcTransport;
use crate::settings::HarnessSettings;
use crate::shared::SharedVolumes;
use crate::teardown::TeardownRegistry;

/// Collaborators shared by every harness in a run. Cheap to clone.
#[derive(Clone)]
pub struct HarnessContext {
    settings: HarnessSettings,
    engine: Arc<dyn ContainerEngine>,
    transport: Arc<dyn RpcTransport>,
    teardown: Arc<TeardownRegistry>,
    volumes: Arc<SharedVolumes>,
}

impl std::fmt::Debug for HarnessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessContext")
            .field("settings", &self.settings)
            .field("volumes", &self.volumes)
            .finish_non_exhaustive()
    }
}

impl HarnessContext {
    pub fn new(
        settings: HarnessSettings,
        engine: Arc<dyn ContainerEngine>,
        transport: Arc<dyn RpcTransport>,
        teardown: Arc<TeardownRegistry>,
    ) -> Self {
        let volumes = Arc::new(SharedVolumes::new(settings.shared_root().clone()));
        Self {
            settings,
            engine,
            transport,
            teardown,
            volumes,
        }
    }

    /// Docker engine, HTTP transport and the process-wide teardown registry.
    pub fn docker(settings: HarnessSettings) -> Result<Self> {
        let engine = DockerEngine::connect_to(settings.docker_host())
            .map_err(|err| err.into_harness("connect to Docker"))?;
        let transport = HttpTransport::new()?;
        Ok(Self::new(
            settings,
            Arc::new(engine),
            Arc::new(transport),
            TeardownRegistry::global(),
        ))
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    pub fn engine(&self) -> &Arc<dyn ContainerEngine> {
        &self.engine
    }

    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.transport
    }

    pub fn teardown(&self) -> &Arc<TeardownRegistry> {
        &self.teardown
    }

    pub fn volumes(&self) -> &SharedVolumes {
        &self.volumes
    }
}
