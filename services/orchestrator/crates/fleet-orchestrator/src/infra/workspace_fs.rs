//! Filesystem workspaces: one directory per agent under the agents root.
//!
//! Writes go through `spawn_blocking` and land atomically (temp file then
//! rename), so a retried provisioning call never leaves a half-written file
//! for the agent to read.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fleet_common::WorkspaceConfig;
use fleet_common::contract::{BEHAVIOR_SPEC_FILE, CONFIG_SNAPSHOT_FILE};

use crate::application::ports::WorkspaceStore;
use crate::domain::WorkspaceError;

#[derive(Debug, Clone)]
pub struct FsWorkspaces {
    root: PathBuf,
}

impl FsWorkspaces {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn path_for(&self, agent_id: &str) -> PathBuf {
        self.root.join(agent_id)
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> WorkspaceError {
    WorkspaceError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), WorkspaceError> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    std::fs::write(&temp_path, content).map_err(|e| io_error(&temp_path, &e))?;
    std::fs::rename(&temp_path, path).map_err(|e| io_error(path, &e))
}

fn materialize_sync(
    dir: &Path,
    behavior_spec: &str,
    config: &WorkspaceConfig,
) -> Result<(), WorkspaceError> {
    std::fs::create_dir_all(dir).map_err(|e| io_error(dir, &e))?;
    let snapshot =
        serde_json::to_vec_pretty(config).map_err(|e| WorkspaceError::Encode(e.to_string()))?;
    write_atomic(&dir.join(BEHAVIOR_SPEC_FILE), behavior_spec.as_bytes())?;
    write_atomic(&dir.join(CONFIG_SNAPSHOT_FILE), &snapshot)
}

#[async_trait]
impl WorkspaceStore for FsWorkspaces {
    async fn materialize(
        &self,
        agent_id: &str,
        behavior_spec: &str,
        config: &WorkspaceConfig,
    ) -> Result<PathBuf, WorkspaceError> {
        let dir = self.path_for(agent_id);
        let task_dir = dir.clone();
        let behavior_spec = behavior_spec.to_string();
        let config = config.clone();

        tokio::task::spawn_blocking(move || materialize_sync(&task_dir, &behavior_spec, &config))
            .await
            .map_err(|e| WorkspaceError::Io {
                path: dir.display().to_string(),
                message: format!("workspace task failed: {e}"),
            })??;

        tracing::debug!(%agent_id, path = %dir.display(), "workspace materialized");
        Ok(dir)
    }
}
