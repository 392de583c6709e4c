use std::{collections::HashMap, sync::Arc};

use sha2::{Digest as _, Sha256};
use tokio::sync::Mutex;

use crate::sandbox::{FileHandle, RunLog};

/// Content identifier for an immutable blob (§3 Digest). Two digests
/// compare equal iff the underlying bytes are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
  pub fn of(bytes: &[u8]) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Self(format!("{:x}", hasher.finalize()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for Digest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Cache key: a fingerprint over the normalized command, sorted input
/// digests/sandbox paths, sorted output sandbox paths, the limits tuple
/// and an adapter version (§4.2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

pub struct FingerprintInput<'a> {
  pub command: &'a [String],
  pub inputs: &'a [(&'a str, &'a Digest)],
  pub outputs: &'a [&'a str],
  pub limits: (u64, u64),
  pub adapter_version: &'a str,
}

impl Fingerprint {
  pub fn compute(input: FingerprintInput) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(input.command.join("\x1f").as_bytes());
    hasher.update([0]);

    let mut inputs: Vec<_> = input.inputs.to_vec();
    inputs.sort_by_key(|(path, _)| *path);
    for (path, digest) in inputs {
      hasher.update(path.as_bytes());
      hasher.update([0]);
      hasher.update(digest.as_str().as_bytes());
      hasher.update([0]);
    }

    let mut outputs: Vec<_> = input.outputs.to_vec();
    outputs.sort_unstable();
    for path in outputs {
      hasher.update(path.as_bytes());
      hasher.update([0]);
    }

    hasher.update(input.limits.0.to_le_bytes());
    hasher.update(input.limits.1.to_le_bytes());
    hasher.update(input.adapter_version.as_bytes());

    Self(format!("{:x}", hasher.finalize()))
  }
}

/// Process-scoped cache mode override (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
  Full,
  NoCache,
  NoWriteOnlyRead,
}

#[derive(Clone)]
pub struct CacheEntry {
  /// Output sandbox paths mapped to the already-materialized file in the
  /// sandbox's content-addressed store (the Store of §4.2).
  pub outputs: HashMap<String, Arc<FileHandle>>,
  pub run_log: RunLog,
}

/// Maps a fingerprint to a set of output digests, gating re-execution of
/// deterministic commands (§4.2). Safe under concurrent lookup/insert.
#[derive(Default)]
pub struct DependencyCache {
  index: Arc<Mutex<HashMap<Fingerprint, CacheEntry>>>,
}

impl DependencyCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn lookup(&self, fingerprint: &Fingerprint, mode: CacheMode) -> Option<CacheEntry> {
    if mode == CacheMode::NoCache {
      return None;
    }
    self.index.lock().await.get(fingerprint).cloned()
  }

  /// Record a successful run under `fingerprint`. A no-op under
  /// `NoCache`/`NoWriteOnlyRead`, and the cache never stores a run that
  /// ended in `SandboxError` (§4.2 invariant).
  pub async fn insert(&self, fingerprint: Fingerprint, entry: CacheEntry, mode: CacheMode) {
    if mode != CacheMode::Full {
      return;
    }
    if entry.run_log.exitstatus == crate::sandbox::ExitStatus::SandboxError {
      return;
    }
    self.index.lock().await.insert(fingerprint, entry);
  }
}
