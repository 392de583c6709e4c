use thiserror::Error;

use crate::sandbox;

/// A command exited without reaching `ExitStatus::Ok`.
#[derive(Debug, Error, Clone)]
#[error(
  "task executed failed (status: {:?}, time: {:?}s, memory: {:?} bytes, exit code: {})",
  log.exitstatus, log.time_seconds, log.memory_bytes, log.exitcode
)]
pub struct RuntimeError {
  pub log: sandbox::RunLog,
}

impl From<sandbox::RunLog> for RuntimeError {
  fn from(log: sandbox::RunLog) -> Self {
    Self { log }
  }
}

/// A program failed to compile.
#[derive(Debug, Error, Clone)]
#[error(
  "compile failed (status: {:?}, time: {:?}s, memory: {:?} bytes, exit code: {}): {message}",
  log.exitstatus, log.time_seconds, log.memory_bytes, log.exitcode
)]
pub struct CompileError {
  pub log: sandbox::RunLog,

  /// Compile message, usually the error output of the toolchain.
  pub message: String,
}

/// Top-level error type, threaded through the build/judge pipeline.
#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Runtime(#[from] RuntimeError),

  #[error(transparent)]
  Compile(#[from] CompileError),

  #[error(transparent)]
  Sandbox(#[from] sandbox::SandboxError),

  #[error(transparent)]
  InvalidLang(#[from] crate::etc::InvalidLangError),

  #[error("invalid package: {0}")]
  Package(String),

  #[error("invalid generator script: {0}")]
  GenScript(String),

  #[error("invalid testcase pattern: {0}")]
  TestcasePattern(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Yaml(#[from] serde_yaml::Error),
}
