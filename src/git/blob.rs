use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::Result;
use crate::git::object_id::ObjectId;
use crate::git::repository::Repository;

/// Preview length for `get_blob_content`.
pub const BLOB_PREVIEW_LEN: usize = 1024;

pub struct Blob {
    id: ObjectId,
    name: String,
    repo: Repository,
    size: OnceLock<u64>,
}

impl Blob {
    pub(crate) fn new(repo: Repository, id: ObjectId, name: String) -> Self {
        Blob {
            id,
            name,
            repo,
            size: OnceLock::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> Result<u64> {
        if let Some(size) = self.size.get() {
            return Ok(*size);
        }
        let size = self.repo.backend().object_size(self.repo.ctx(), &self.id)?;
        Ok(*self.size.get_or_init(|| size))
    }

    pub fn data(&self) -> Result<Vec<u8>> {
        self.repo.backend().read_blob(self.repo.ctx(), &self.id)
    }

    /// First kilobyte as text.
    pub fn get_blob_content(&self) -> Result<String> {
        let data = self.data()?;
        let end = data.len().min(BLOB_PREVIEW_LEN);
        Ok(String::from_utf8_lossy(&data[..end]).into_owned())
    }

    /// Whole content, standard base64 with padding.
    pub fn get_blob_content_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.data()?))
    }

    /// One more than the number of newlines.
    pub fn get_blob_line_count(&self) -> Result<usize> {
        let data = self.data()?;
        Ok(1 + data.iter().filter(|b| **b == b'\n').count())
    }
}
