//! Scratch-directory sandboxes.
//!
//! Each task execution gets a private temporary directory that is removed
//! on teardown. If a dispatch is dropped mid-flight, `TempDir`'s drop still
//! removes the directory once the last handle goes away, so cleanup holds
//! on every exit path.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::SandboxError;
use crate::domain::ports::{Sandbox, SandboxFactory};

/// A sandbox backed by a temporary directory.
pub struct ScratchSandbox {
    id: Uuid,
    workdir: PathBuf,
    dir: Mutex<Option<TempDir>>,
}

#[async_trait]
impl Sandbox for ScratchSandbox {
    fn id(&self) -> Uuid {
        self.id
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn teardown(&self) -> Result<(), SandboxError> {
        let dir = self
            .dir
            .lock()
            .map_err(|e| SandboxError::Teardown(e.to_string()))?
            .take();
        if let Some(dir) = dir {
            dir.close()
                .map_err(|e| SandboxError::Teardown(e.to_string()))?;
            debug!(sandbox_id = %self.id, "sandbox torn down");
        }
        Ok(())
    }
}

/// Allocates one scratch directory per task execution.
#[derive(Debug, Default)]
pub struct ScratchSandboxFactory;

impl ScratchSandboxFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SandboxFactory for ScratchSandboxFactory {
    async fn create(&self, task_id: Uuid) -> Result<Arc<dyn Sandbox>, SandboxError> {
        let dir = tempfile::Builder::new()
            .prefix("forager-task-")
            .tempdir()
            .map_err(|e| SandboxError::Allocation(e.to_string()))?;
        let id = Uuid::new_v4();
        debug!(
            sandbox_id = %id,
            task_id = %task_id,
            path = %dir.path().display(),
            "sandbox allocated"
        );
        Ok(Arc::new(ScratchSandbox {
            id,
            workdir: dir.path().to_path_buf(),
            dir: Mutex::new(Some(dir)),
        }))
    }
}
