//! Tracking and reclaiming sandbox containers

use super::OwnerId;
use crate::error::SandboxResult;
use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, RemoveContainerOptions};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Label put on every container this crate creates
pub const MANAGED_LABEL: &str = "runbox.managed";

/// Label carrying the run identifier
pub const RUN_ID_LABEL: &str = "runbox.run_id";

#[derive(Debug, Clone, Copy)]
struct LiveContainer {
    owner: OwnerId,
    registered_at: DateTime<Utc>,
}

/// Containers currently owned by an in-flight execution
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    live: Mutex<HashMap<String, LiveContainer>>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: &str, owner: OwnerId) {
        let entry = LiveContainer {
            owner,
            registered_at: Utc::now(),
        };
        self.live.lock().insert(id.to_string(), entry);
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.live.lock().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.live.lock().contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.live.lock().keys().cloned().collect()
    }

    /// Containers registered by `owner`, oldest first
    pub fn owned_by(&self, owner: OwnerId) -> Vec<String> {
        let live = self.live.lock();
        let mut owned: Vec<(&String, &LiveContainer)> =
            live.iter().filter(|(_, c)| c.owner == owner).collect();
        owned.sort_by_key(|(id, c)| (c.registered_at, *id));
        owned.into_iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }
}

/// Force-removal of managed containers
#[derive(Clone)]
pub struct ContainerCleanup {
    docker: Docker,
    registry: Arc<ContainerRegistry>,
}

impl ContainerCleanup {
    pub fn new(docker: Docker, registry: Arc<ContainerRegistry>) -> Self {
        Self { docker, registry }
    }

    /// Connect to the local Docker daemon with default settings
    pub fn connect_local(registry: Arc<ContainerRegistry>) -> SandboxResult<Self> {
        Ok(Self::new(Docker::connect_with_local_defaults()?, registry))
    }

    /// Force-remove one container (and its anonymous volumes)
    pub async fn remove(&self, id: &str) -> SandboxResult<()> {
        let result = self
            .docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await;
        self.registry.unregister(id);

        match result {
            Ok(()) => {
                tracing::debug!("Removed container {}", id);
                Ok(())
            }
            // Already gone
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => {
                tracing::warn!("Failed to remove container {}: {}", id, e);
                Err(e.into())
            }
        }
    }

    /// Remove every live container registered by `owner`
    pub async fn remove_owned(&self, owner: OwnerId) -> usize {
        let mut removed = 0;
        for id in self.registry.owned_by(owner) {
            if self.remove(&id).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }

    /// Remove managed containers older than `max_age` that no execution owns
    pub async fn sweep_orphans(&self, max_age: Duration) -> SandboxResult<usize> {
        let filters = HashMap::from([(
            "label".to_string(),
            vec![format!("{}=true", MANAGED_LABEL)],
        )]);
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters: Some(filters),
                ..Default::default()
            }))
            .await?;

        let cutoff = Utc::now().timestamp() - max_age.as_secs() as i64;
        let mut removed = 0;
        for summary in containers {
            let Some(id) = summary.id else { continue };
            let created = summary.created.unwrap_or(0);
            if created > cutoff || self.registry.contains(&id) {
                continue;
            }
            if self.remove(&id).await.is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!("Swept {} orphaned containers", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry() {
        let registry = ContainerRegistry::new();
        let owner = OwnerId::new();
        assert!(registry.is_empty());
        registry.register("abc", owner);
        registry.register("def", owner);
        assert!(registry.contains("abc"));
        assert_eq!(registry.len(), 2);
        assert!(registry.unregister("abc"));
        assert!(!registry.unregister("abc"));
        assert_eq!(registry.ids(), vec!["def".to_string()]);
    }

    #[test]
    fn test_registry_concurrent() {
        let registry = Arc::new(ContainerRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let id = format!("c{}", i);
                    registry.register(&id, OwnerId::new());
                    if i % 2 == 0 {
                        registry.unregister(&id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_owned_by_filters_owner() {
        let registry = ContainerRegistry::new();
        let (a, b) = (OwnerId::new(), OwnerId::new());
        registry.register("a1", a);
        registry.register("b1", b);
        registry.register("a2", a);

        assert_eq!(registry.owned_by(a), vec!["a1".to_string(), "a2".to_string()]);
        assert_eq!(registry.owned_by(b), vec!["b1".to_string()]);
        assert!(registry.owned_by(OwnerId::new()).is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a running Docker daemon"]
    async fn test_sweep_against_daemon() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let cleanup = ContainerCleanup::new(docker, Arc::new(ContainerRegistry::new()));
        assert!(cleanup.sweep_orphans(Duration::from_secs(24 * 3600)).await.is_ok());
    }
}
