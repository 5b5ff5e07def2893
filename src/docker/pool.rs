//! Fixed-size pool of long-lived sandbox containers. Each slot is a hardened
//! container (no network, capped CPU/memory/PIDs, dropped capabilities,
//! tmpfs workspace) whose entry process idles so it can serve many short
//! exec calls. Slots are handed out in round-robin order.

use anyhow::{Context, Result};
use bollard::container::Config;
use bollard::models::HostConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::JudgeConfig;
use super::DockerClient;

const IMAGE_PULL_TIMEOUT: Duration = Duration::from_secs(300);

pub struct ContainerPool {
    client: Arc<DockerClient>,
    config: JudgeConfig,
    slots: Vec<String>,
    next: AtomicUsize,
    provisioned: Mutex<bool>,
}

impl ContainerPool {
    pub fn new(client: Arc<DockerClient>, config: JudgeConfig) -> Self {
        let slots = slot_names(&config.container_prefix, config.pool_size);
        Self {
            client,
            config,
            slots,
            next: AtomicUsize::new(0),
            provisioned: Mutex::new(false),
        }
    }

    /// Return the name of the next slot in round-robin order, provisioning
    /// the whole pool on first use.
    pub async fn next_container(&self) -> Result<String> {
        self.ensure_provisioned().await?;
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        Ok(self.slots[index].clone())
    }

    async fn ensure_provisioned(&self) -> Result<()> {
        let mut provisioned = self.provisioned.lock().await;
        if *provisioned {
            return Ok(());
        }

        if !self.client.image_exists(&self.config.image).await {
            tokio::time::timeout(IMAGE_PULL_TIMEOUT, self.client.pull_image(&self.config.image))
                .await
                .context("Timed out pulling sandbox image")??;
        }

        for name in &self.slots {
            self.provision_slot(name).await?;
        }

        *provisioned = true;
        info!("Sandbox pool of {} containers is ready", self.slots.len());
        Ok(())
    }

    async fn provision_slot(&self, name: &str) -> Result<()> {
        if self.client.container_exists(name).await {
            if self.client.is_container_running(name).await.unwrap_or(false) {
                info!("Reusing running sandbox container {}", name);
                return Ok(());
            }
            warn!("Removing stale sandbox container {}", name);
            self.client.remove_container(name, true).await?;
        }

        self.client
            .create_container(name, self.container_config(name))
            .await?;
        self.client.start_container(name).await?;
        Ok(())
    }

    fn container_config(&self, name: &str) -> Config<String> {
        let mut labels = HashMap::new();
        labels.insert("cjudge.managed".to_string(), "true".to_string());
        labels.insert("cjudge.slot".to_string(), name.to_string());

        let mut tmpfs = HashMap::new();
        tmpfs.insert(
            "/sandbox".to_string(),
            format!("rw,size={},mode=1777", self.config.workspace_tmpfs_bytes),
        );

        let host_config = HostConfig {
            memory: Some(self.config.container_memory_bytes),
            // Swap equals memory so no swap is usable.
            memory_swap: Some(self.config.container_memory_bytes),
            cpu_quota: Some((self.config.container_cpus * 100000.0) as i64),
            cpu_period: Some(100000),
            pids_limit: Some(self.config.container_pids_limit),
            network_mode: Some("none".to_string()),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges:true".to_string()]),
            tmpfs: Some(tmpfs),
            auto_remove: Some(false),
            ..Default::default()
        };

        Config {
            image: Some(self.config.image.clone()),
            hostname: Some(name.to_string()),
            labels: Some(labels),
            host_config: Some(host_config),
            working_dir: Some("/sandbox".to_string()),
            cmd: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "sleep infinity".to_string(),
            ]),
            ..Default::default()
        }
    }

    /// Force-remove every pool container and reset state; the next
    /// `next_container` call re-provisions from scratch.
    pub async fn teardown(&self) {
        let mut provisioned = self.provisioned.lock().await;
        for name in &self.slots {
            if self.client.container_exists(name).await {
                if let Err(e) = self.client.remove_container(name, true).await {
                    warn!("Failed to remove sandbox container {}: {}", name, e);
                }
            }
        }
        self.next.store(0, Ordering::Relaxed);
        *provisioned = false;
        info!("Sandbox pool torn down");
    }
}

fn slot_names(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}-{i}")).collect()
}
