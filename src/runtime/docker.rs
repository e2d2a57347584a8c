// Docker container listing via bollard

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::ContainerSummary;
use bollard::query_parameters::ListContainersOptions;
use tracing::instrument;

use super::{ContainerRuntime, RuntimeContainer};
use crate::models::{ContainerState, UNKNOWN_IMAGE};

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?;
        Ok(Self { docker })
    }

    /// Map a list_containers entry. Exposed for unit tests.
    pub(crate) fn from_summary(c: &ContainerSummary) -> RuntimeContainer {
        let id = c.id.as_ref().cloned().unwrap_or_default();
        let name = c
            .names
            .as_ref()
            .and_then(|n| n.first())
            .cloned()
            .unwrap_or_else(|| id.clone());
        let name = name.trim_start_matches('/').to_string();
        let image = c
            .image
            .as_ref()
            .filter(|i| !i.is_empty())
            .cloned()
            .unwrap_or_else(|| UNKNOWN_IMAGE.to_string());
        let state = c
            .state
            .as_ref()
            .map(|s| ContainerState::from_docker(&s.to_string()))
            .unwrap_or(ContainerState::Unknown);
        RuntimeContainer {
            id,
            name,
            image,
            state,
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    #[instrument(skip(self), fields(repo = "docker", operation = "list_all"))]
    async fn list_all(&self) -> anyhow::Result<Vec<RuntimeContainer>> {
        let options = ListContainersOptions {
            all: true,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers.iter().map(Self::from_summary).collect())
    }
}
