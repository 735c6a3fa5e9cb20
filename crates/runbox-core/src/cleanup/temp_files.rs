//! Per-run workspaces on the host filesystem

use super::OwnerId;
use crate::error::SandboxResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

const WORKSPACE_PREFIX: &str = "run-";

/// Registry of live workspaces under one root directory.
///
/// Shared by every concurrent execution; registration and release are
/// serialized by the internal mutex. Each workspace records the sandbox that
/// created it.
#[derive(Debug)]
pub struct TempFileManager {
    root: PathBuf,
    live: Mutex<HashMap<PathBuf, OwnerId>>,
}

impl TempFileManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            live: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create and register a fresh workspace for `owner`; it is removed when
    /// the guard drops
    pub fn create_workspace(self: &Arc<Self>, owner: OwnerId) -> SandboxResult<Workspace> {
        fs::create_dir_all(&self.root)?;
        let path = self
            .root
            .join(format!("{}{}", WORKSPACE_PREFIX, Uuid::new_v4().simple()));
        fs::create_dir(&path)?;
        self.live.lock().insert(path.clone(), owner);
        tracing::debug!(%owner, "Created workspace {}", path.display());
        Ok(Workspace {
            path,
            manager: Arc::clone(self),
        })
    }

    /// Delete a workspace and forget it
    pub fn release(&self, path: &Path) {
        if let Err(e) = fs::remove_dir_all(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove workspace {}: {}", path.display(), e);
            }
        }
        self.live.lock().remove(path);
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Live workspaces created by `owner`
    pub fn owned_count(&self, owner: OwnerId) -> usize {
        self.live.lock().values().filter(|o| **o == owner).count()
    }

    pub fn is_live(&self, path: &Path) -> bool {
        self.live.lock().contains_key(path)
    }

    /// Remove unregistered workspaces older than `max_age`; returns how many
    pub fn sweep_stale(&self, max_age: Duration) -> usize {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            let is_workspace = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(WORKSPACE_PREFIX));
            if !is_workspace || !path.is_dir() || self.is_live(&path) {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }
            match fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to sweep {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            tracing::info!("Swept {} stale workspaces", removed);
        }
        removed
    }

    /// Remove every workspace registered by `owner`, leaving other owners' alone
    pub fn release_owned(&self, owner: OwnerId) -> usize {
        let mut paths = Vec::new();
        self.live.lock().retain(|path, o| {
            if *o == owner {
                paths.push(path.clone());
            }
            *o != owner
        });
        for path in &paths {
            if let Err(e) = fs::remove_dir_all(path) {
                tracing::warn!("Failed to remove workspace {}: {}", path.display(), e);
            }
        }
        paths.len()
    }
}

/// RAII handle on one workspace directory
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    manager: Arc<TempFileManager>,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `contents` to `name` inside the workspace
    pub fn write_file(&self, name: &str, contents: &str) -> SandboxResult<PathBuf> {
        let path = self.path.join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Directory 0755 and files 0644, so an unprivileged container user can read them
    #[cfg(unix)]
    pub fn make_world_readable(&self) -> SandboxResult<()> {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(&self.path, fs::Permissions::from_mode(0o755))?;
        for entry in fs::read_dir(&self.path)?.flatten() {
            fs::set_permissions(entry.path(), fs::Permissions::from_mode(0o644))?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn make_world_readable(&self) -> SandboxResult<()> {
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.manager.release(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, Arc<TempFileManager>) {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(TempFileManager::new(dir.path().join("runbox")));
        (dir, manager)
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let (_dir, manager) = manager();
        let workspace = manager.create_workspace(OwnerId::new()).unwrap();
        let file = workspace.write_file("main.py", "print(1)").unwrap();
        let path = workspace.path().to_path_buf();
        assert!(file.exists());
        assert_eq!(manager.live_count(), 1);

        drop(workspace);
        assert!(!path.exists());
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn test_workspaces_are_distinct() {
        let (_dir, manager) = manager();
        let a = manager.create_workspace(OwnerId::new()).unwrap();
        let b = manager.create_workspace(OwnerId::new()).unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(manager.live_count(), 2);
    }

    #[test]
    fn test_sweep_skips_live_and_fresh() {
        let (_dir, manager) = manager();
        let live = manager.create_workspace(OwnerId::new()).unwrap();
        let orphan = manager.root().join("run-orphan");
        fs::create_dir_all(&orphan).unwrap();
        let unrelated = manager.root().join("keep-me");
        fs::create_dir_all(&unrelated).unwrap();

        assert_eq!(manager.sweep_stale(Duration::from_secs(3600)), 0);
        assert_eq!(manager.sweep_stale(Duration::ZERO), 1);
        assert!(!orphan.exists());
        assert!(unrelated.exists());
        assert!(live.path().exists());
    }

    #[test]
    fn test_release_owned_spares_other_owners() {
        let (_dir, manager) = manager();
        let (a, b) = (OwnerId::new(), OwnerId::new());
        let mine = manager.create_workspace(a).unwrap();
        let theirs = manager.create_workspace(b).unwrap();
        let mine_path = mine.path().to_path_buf();

        assert_eq!(manager.release_owned(a), 1);
        assert!(!mine_path.exists());
        assert!(theirs.path().exists());
        assert_eq!(manager.owned_count(a), 0);
        assert_eq!(manager.owned_count(b), 1);
        // Dropping afterwards is harmless
        drop(mine);
        assert_eq!(manager.live_count(), 1);
    }

    #[test]
    fn test_concurrent_registration() {
        let (_dir, manager) = manager();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    let workspace = manager.create_workspace(OwnerId::new()).unwrap();
                    workspace.write_file("main.py", "x = 1").unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(manager.live_count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_make_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, manager) = manager();
        let workspace = manager.create_workspace(OwnerId::new()).unwrap();
        let file = workspace.write_file("main.py", "x = 1").unwrap();
        workspace.make_world_readable().unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }
}
