use std::sync::Arc;

use super::client::{FileGetError, CLIENT};
use crate::cache::Digest;

/// Sandbox file handler.
///
/// Wraps FileHandleInner to implement atomic counting.
/// As such it has a *cheap* `Clone` implementation.
///
/// If the last handler instance of a file is dropped, the file will be deleted in the sandbox.
#[derive(Debug, Clone)]
pub struct FileHandle {
  inner: Arc<FileHandleInner>,
}

#[derive(Debug)]
struct FileHandleInner {
  /// File id.
  id: String,
  /// Content digest, known from upload; used to key the Dependency Cache
  /// without a round trip back to the sandbox. A handle built via
  /// `from_id` (a wire reply) has no local content to hash, so it carries
  /// the id's own digest instead — never reused as a cache *input*, only
  /// ever as a cache *output*.
  digest: Digest,
}

impl Drop for FileHandleInner {
  fn drop(&mut self) {
    log::debug!("dropped file {}", &self.id);
    let id = self.id.clone();
    tokio::spawn(async move { CLIENT.get().await.file_delete(&id).await });
  }
}

impl FileHandle {
  /// Upload a file to sandbox and return it's file hander.
  pub async fn upload(content: &[u8]) -> Self {
    let id = CLIENT.get().await.file_add(content).await;
    Self {
      inner: Arc::new(FileHandleInner {
        id,
        digest: Digest::of(content),
      }),
    }
  }

  /// Create a file handler with file id.
  pub(super) fn from_id(id: String) -> Self {
    let digest = Digest::of(id.as_bytes());
    Self {
      inner: Arc::new(FileHandleInner { id, digest }),
    }
  }

  /// Get the id of the file corresponding to the FileHandle.
  pub(super) fn id(&self) -> &String {
    &self.inner.id
  }

  /// Content digest for Dependency Cache fingerprinting (§4.2).
  pub(crate) fn digest(&self) -> &Digest {
    &self.inner.digest
  }

  /// Get content of file as Vec<u8>.
  pub async fn context(&self) -> Result<Vec<u8>, FileGetError> {
    CLIENT.get().await.file_get(&self.id()).await
  }
}
