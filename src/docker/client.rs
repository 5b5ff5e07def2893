use anyhow::{Context, Result};
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::CreateExecOptions;
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, ContainerStateStatusEnum};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::stream::StreamExt;
use std::default::Default;
use tracing::{debug, error, info};

pub struct DockerClient {
    pub(super) docker: Docker,
}

impl DockerClient {
    pub async fn new(socket_path: Option<&str>) -> Result<Self> {
        let docker = if let Some(socket) = socket_path {
            Docker::connect_with_socket(socket, 120, API_DEFAULT_VERSION)?
        } else {
            Docker::connect_with_socket_defaults()?
        };

        let version = docker
            .version()
            .await
            .context("Failed to connect to Docker daemon")?;

        info!(
            "Connected to Docker daemon version: {}",
            version.version.unwrap_or_default()
        );

        Ok(Self { docker })
    }

    pub async fn image_exists(&self, image: &str) -> bool {
        self.docker.inspect_image(image).await.is_ok()
    }

    pub async fn pull_image(&self, image: &str) -> Result<()> {
        info!("Pulling image: {}", image);

        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(progress) = stream.next().await {
            match progress {
                Ok(progress) => {
                    if let Some(status) = progress.status {
                        debug!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    error!("Error pulling image {}: {}", image, e);
                    return Err(anyhow::anyhow!("Failed to pull image {}: {}", image, e));
                }
            }
        }

        info!("Successfully pulled image: {}", image);
        Ok(())
    }

    pub async fn create_container(&self, name: &str, config: Config<String>) -> Result<String> {
        let options = CreateContainerOptions {
            name,
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .context("Failed to create container")?;

        info!("Created container {} with ID: {}", name, response.id);
        Ok(response.id)
    }

    pub async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start container")?;

        info!("Started container: {}", id);
        Ok(())
    }

    pub async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.docker
            .remove_container(id, Some(options))
            .await
            .context("Failed to remove container")?;

        info!("Removed container: {}", id);
        Ok(())
    }

    pub async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse> {
        self.docker
            .inspect_container(id, None)
            .await
            .context("Failed to inspect container")
    }

    pub async fn container_exists(&self, id: &str) -> bool {
        self.inspect_container(id).await.is_ok()
    }

    pub async fn is_container_running(&self, id: &str) -> Result<bool> {
        let info = self.inspect_container(id).await?;

        Ok(info
            .state
            .and_then(|s| s.status)
            .map(|s| s == ContainerStateStatusEnum::RUNNING)
            .unwrap_or(false))
    }

    /// Best-effort SIGKILL of any process in the container whose command line
    /// matches `pattern`. Used to reclaim PIDs after a timeout or an output
    /// overflow; failures are logged and swallowed.
    pub async fn kill_matching(&self, container: &str, pattern: &str) {
        let exec_config = CreateExecOptions {
            cmd: Some(vec![
                "pkill".to_string(),
                "-9".to_string(),
                "-f".to_string(),
                pattern.to_string(),
            ]),
            attach_stdout: Some(false),
            attach_stderr: Some(false),
            ..Default::default()
        };

        match self.docker.create_exec(container, exec_config).await {
            Ok(exec) => {
                if let Err(e) = self.docker.start_exec(&exec.id, None).await {
                    debug!("kill_matching start failed in {}: {}", container, e);
                }
            }
            Err(e) => debug!("kill_matching create failed in {}: {}", container, e),
        }
    }
}
