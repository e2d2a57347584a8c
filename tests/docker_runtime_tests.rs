// Optional DockerRuntime tests when a Docker daemon is available

use dockwatch::runtime::{ContainerRuntime, DockerRuntime};

#[tokio::test]
async fn docker_runtime_lists_all_containers() {
    let runtime = match DockerRuntime::connect() {
        Ok(r) => r,
        Err(_) => return, // Skip when Docker is not available (e.g. CI without Docker)
    };
    let containers = match runtime.list_all().await {
        Ok(c) => c,
        Err(_) => return, // Socket present but daemon not answering
    };
    for c in &containers {
        assert!(!c.name.is_empty());
        assert!(!c.name.starts_with('/'));
        assert!(!c.image.is_empty());
    }
}
