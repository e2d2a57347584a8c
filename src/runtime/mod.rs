// Container runtime the collector polls.

mod docker;

pub use docker::DockerRuntime;

use async_trait::async_trait;

/// One container as reported by the runtime, before it is stamped with a poll time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: crate::models::ContainerState,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// All containers, running and stopped.
    async fn list_all(&self) -> anyhow::Result<Vec<RuntimeContainer>>;
}
