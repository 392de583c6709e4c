use std::{collections::HashMap, time};

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use super::{proto, FileHandle};

/// Outcome of running one `Cmd` in the sandbox: the execution result plus
/// any files named in `copy_out`.
#[derive(Debug, Clone)]
pub struct RunLog {
  pub exitcode: i32,

  pub exitstatus: ExitStatus,

  pub time_seconds: Option<f64>,

  pub wall_time_seconds: Option<f64>,

  pub memory_bytes: Option<u64>,

  pub stderr_digest: Option<String>,

  /// Set when the run was built with sanitizer instrumentation and the
  /// stderr stream matched one of the sanitizer diagnostic patterns.
  pub sanitizer_warnings: bool,

  pub metadata: RunLogMetadata,

  pub files: HashMap<String, FileHandle>,
}

/// Bookkeeping attached to a `RunLog` that does not come from the sandbox
/// wire reply but is known by whoever issued the `Cmd`.
#[derive(Debug, Clone, Default)]
pub struct RunLogMetadata {
  pub language: Option<String>,

  pub is_sanitized: bool,

  pub time_limit_ms: Option<u64>,

  pub memory_limit_mib: Option<u64>,

  pub retry_index: u32,
}

/// Closed set of outcomes a single run can end in.
#[derive(Debug, PartialEq, Eq, Clone, Copy, strum::EnumString, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ExitStatus {
  Ok,
  NonZero,
  Signal,
  Timeout,
  WallTimeout,
  MemoryExceeded,
  OutputExceeded,
  SandboxError,
  /// Run never reached the sandbox: a sibling command in the same request
  /// already failed, or the job was cancelled. Never produced from a wire
  /// reply.
  Terminated,
}

#[derive(Debug, Clone, Error)]
#[error("sandbox error: {message}")]
pub struct SandboxError {
  pub message: String,
}

impl RunLog {
  /// Build a `RunLog` from a wire `Response.Result`, given the limits that
  /// were requested for the `Cmd` that produced it. Needed to tell a CPU
  /// timeout from a wall-clock one: the executor reports both as
  /// `TIME_LIMIT_EXCEEDED`.
  pub fn from_proto(
    res: proto::response::Result,
    metadata: RunLogMetadata,
    cpu_time_limit: time::Duration,
  ) -> Self {
    let time = time::Duration::from_nanos(res.time);
    let run_time = time::Duration::from_nanos(res.run_time);

    let exitstatus = match res.status() {
      proto::response::result::StatusType::Accepted if res.exit_status == 0 => ExitStatus::Ok,
      proto::response::result::StatusType::Accepted => ExitStatus::NonZero,
      proto::response::result::StatusType::NonzeroExitStatus => ExitStatus::NonZero,
      proto::response::result::StatusType::Signalled => ExitStatus::Signal,
      proto::response::result::StatusType::TimeLimitExceeded => {
        if run_time > cpu_time_limit {
          ExitStatus::WallTimeout
        } else {
          ExitStatus::Timeout
        }
      }
      proto::response::result::StatusType::MemoryLimitExceeded => ExitStatus::MemoryExceeded,
      proto::response::result::StatusType::OutputLimitExceeded => ExitStatus::OutputExceeded,
      proto::response::result::StatusType::FileError
      | proto::response::result::StatusType::DangerousSyscall
      | proto::response::result::StatusType::InternalError
      | proto::response::result::StatusType::Invalid => ExitStatus::SandboxError,
    };

    Self {
      exitcode: res.exit_status,
      exitstatus,
      time_seconds: Some(time.as_secs_f64()),
      wall_time_seconds: Some(run_time.as_secs_f64()),
      memory_bytes: Some(res.memory),
      stderr_digest: None,
      sanitizer_warnings: false,
      metadata,
      files: res
        .file_ids
        .into_iter()
        .map(|(name, id)| (name, FileHandle::from_id(id)))
        .collect(),
    }
  }

  /// Build a `RunLog` for a `Cmd` that was never sent to the sandbox
  /// because a sibling in the same request already failed.
  pub fn terminated(metadata: RunLogMetadata) -> Self {
    Self {
      exitcode: -1,
      exitstatus: ExitStatus::Terminated,
      time_seconds: None,
      wall_time_seconds: None,
      memory_bytes: None,
      stderr_digest: None,
      sanitizer_warnings: false,
      metadata,
      files: HashMap::new(),
    }
  }
}
