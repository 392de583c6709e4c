use std::collections::HashMap;

use crate::{
  cache::{CacheEntry, CacheMode, DependencyCache, Digest, Fingerprint, FingerprintInput},
  sandbox::{ExitStatus, RunLog, RunLogMetadata},
};

fn fingerprint_of(command: &[String], outputs: &[&str], limits: (u64, u64)) -> Fingerprint {
  Fingerprint::compute(FingerprintInput {
    command,
    inputs: &[],
    outputs,
    limits,
    adapter_version: "1",
  })
}

fn run_log(exitstatus: ExitStatus) -> RunLog {
  RunLog {
    exitcode: 0,
    exitstatus,
    time_seconds: Some(0.1),
    wall_time_seconds: Some(0.1),
    memory_bytes: Some(1024),
    stderr_digest: None,
    sanitizer_warnings: false,
    metadata: RunLogMetadata::default(),
    files: HashMap::new(),
  }
}

#[test]
fn digest_is_deterministic_and_content_sensitive() {
  assert_eq!(Digest::of(b"hello"), Digest::of(b"hello"));
  assert_ne!(Digest::of(b"hello"), Digest::of(b"world"));
}

#[test]
fn fingerprint_is_stable_regardless_of_input_order() {
  let a = Digest::of(b"a");
  let b = Digest::of(b"b");

  let command = vec!["gcc".to_string(), "foo.c".to_string()];
  let f1 = Fingerprint::compute(FingerprintInput {
    command: &command,
    inputs: &[("foo.c", &a), ("bar.h", &b)],
    outputs: &["foo"],
    limits: (1000, 2048),
    adapter_version: "1",
  });
  let f2 = Fingerprint::compute(FingerprintInput {
    command: &command,
    inputs: &[("bar.h", &b), ("foo.c", &a)],
    outputs: &["foo"],
    limits: (1000, 2048),
    adapter_version: "1",
  });
  assert_eq!(f1, f2);
}

#[test]
fn fingerprint_changes_with_limits() {
  let command = vec!["gcc".to_string()];
  let f1 = fingerprint_of(&command, &["foo"], (1000, 2048));
  let f2 = fingerprint_of(&command, &["foo"], (2000, 2048));
  assert_ne!(f1, f2);
}

#[tokio::test]
async fn lookup_misses_under_no_cache() {
  let cache = DependencyCache::new();
  let command = vec!["gcc".to_string()];
  let fp = fingerprint_of(&command, &["foo"], (1000, 2048));

  cache
    .insert(
      fp.clone(),
      CacheEntry {
        outputs: HashMap::new(),
        run_log: run_log(ExitStatus::Ok),
      },
      CacheMode::Full,
    )
    .await;

  assert!(cache.lookup(&fp, CacheMode::NoCache).await.is_none());
  assert!(cache.lookup(&fp, CacheMode::Full).await.is_some());
}

#[tokio::test]
async fn insert_is_a_noop_for_sandbox_errors() {
  let cache = DependencyCache::new();
  let command = vec!["gcc".to_string()];
  let fp = fingerprint_of(&command, &["foo"], (1000, 2048));

  cache
    .insert(
      fp.clone(),
      CacheEntry {
        outputs: HashMap::new(),
        run_log: run_log(ExitStatus::SandboxError),
      },
      CacheMode::Full,
    )
    .await;

  assert!(cache.lookup(&fp, CacheMode::Full).await.is_none());
}

#[tokio::test]
async fn insert_is_a_noop_outside_full_mode() {
  let cache = DependencyCache::new();
  let command = vec!["gcc".to_string()];
  let fp = fingerprint_of(&command, &["foo"], (1000, 2048));

  cache
    .insert(
      fp.clone(),
      CacheEntry {
        outputs: HashMap::new(),
        run_log: run_log(ExitStatus::Ok),
      },
      CacheMode::NoWriteOnlyRead,
    )
    .await;

  assert!(cache.lookup(&fp, CacheMode::Full).await.is_none());
}
