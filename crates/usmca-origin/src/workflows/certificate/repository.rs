use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::session::{SessionId, WorkflowSession};

/// File name of an archived session inside its session directory.
pub const ARCHIVE_FILE_NAME: &str = "usmca_workflow_data.json";

/// Live sessions for the duration of a workflow.
pub trait SessionRepository: Send + Sync {
    fn insert(&self, session: WorkflowSession) -> Result<WorkflowSession, RepositoryError>;
    /// Stores `session` only if the stored copy is still at `expected_revision`.
    fn update(
        &self,
        session: WorkflowSession,
        expected_revision: u64,
    ) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &SessionId) -> Result<Option<WorkflowSession>, RepositoryError>;
    fn remove(&self, id: &SessionId) -> Result<Option<WorkflowSession>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("session was modified concurrently")]
    Conflict,
    #[error("session not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Durable copy written only on a consented save.
#[async_trait]
pub trait SessionArchive: Send + Sync {
    async fn archive(&self, session: &WorkflowSession) -> Result<PathBuf, ArchiveError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to serialize session {session_id}: {source}")]
    Serialize {
        session_id: SessionId,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} already holds the archive of another session")]
    Collision { path: PathBuf },
}

/// Writes `<root>/<session_id>/usmca_workflow_data.json`.
#[derive(Debug, Clone)]
pub struct JsonFileArchive {
    root: PathBuf,
}

impl JsonFileArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &SessionId) -> PathBuf {
        self.root.join(&id.0).join(ARCHIVE_FILE_NAME)
    }
}

#[async_trait]
impl SessionArchive for JsonFileArchive {
    async fn archive(&self, session: &WorkflowSession) -> Result<PathBuf, ArchiveError> {
        let path = self.path_for(&session.session_id);
        let payload =
            serde_json::to_vec_pretty(session).map_err(|source| ArchiveError::Serialize {
                session_id: session.session_id.clone(),
                source,
            })?;

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ArchiveError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }
        claim(&path, session).await?;
        tokio::fs::write(&path, payload)
            .await
            .map_err(|source| ArchiveError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(session_id = %session.session_id, path = %path.display(), "session archived");
        Ok(path)
    }
}

/// Fields that tie an archive file to the session that wrote it.
#[derive(Deserialize)]
struct ArchiveOwner {
    session_id: SessionId,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Creates the archive file, or checks that an existing one belongs to `session`.
async fn claim(path: &Path, session: &WorkflowSession) -> Result<(), ArchiveError> {
    let io_error = |source: std::io::Error| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    };
    match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(_) => return Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(err) => return Err(io_error(err)),
    }

    let existing = tokio::fs::read(path).await.map_err(io_error)?;
    let owned = serde_json::from_slice::<ArchiveOwner>(&existing).is_ok_and(|owner| {
        owner.session_id == session.session_id && owner.created_at == Some(session.created_at)
    });
    if !owned {
        warn!(session_id = %session.session_id, path = %path.display(), "refusing to overwrite another session's archive");
        return Err(ArchiveError::Collision {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
