//! Uploaded media on local disk.  Files are named by a random UUID; the
//! UUID is the only handle clients ever see.

use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    max_size: usize,
    public_base_url: String,
}

impl MediaStore {
    pub async fn new(
        base_path: PathBuf,
        max_size: usize,
        public_base_url: String,
    ) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::MediaStorage(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            max_size,
            public_base_url,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub async fn store(&self, data: &[u8]) -> Result<Uuid, ServerError> {
        if data.is_empty() {
            return Err(ServerError::Validation("empty_upload"));
        }
        if data.len() > self.max_size {
            return Err(ServerError::UploadTooLarge { max: self.max_size });
        }

        let id = Uuid::new_v4();
        fs::write(self.path_of(id), data)
            .await
            .map_err(|e| ServerError::MediaStorage(format!("Failed to write media {id}: {e}")))?;

        debug!(id = %id, size = data.len(), "Stored media");
        Ok(id)
    }

    pub async fn load(&self, id: Uuid) -> Result<Vec<u8>, ServerError> {
        match fs::read(self.path_of(id)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ServerError::NotFound),
            Err(e) => Err(ServerError::MediaStorage(format!(
                "Failed to read media {id}: {e}"
            ))),
        }
    }

    /// The reference handed back to clients for use in `photoUrl`,
    /// `avatarUrl` and friends.
    pub fn reference(&self, id: Uuid) -> String {
        format!("{}/uploads/{}", self.public_base_url, id)
    }

    // A parsed Uuid renders as plain hex and dashes, so the joined path
    // cannot leave `base_path`.
    fn path_of(&self, id: Uuid) -> PathBuf {
        self.base_path.join(id.to_string())
    }
}
