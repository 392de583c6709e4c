use std::{collections::HashMap, sync::Arc};

use crate::{
  cache::{CacheMode, DependencyCache},
  error::{self, Error},
  package::{Outcome, ValidatorOutcome},
  sandbox::{ExitStatus, FileHandle, RunLog},
  steps::{self, Executable},
};

/// `go-judge`'s reported exit code for a process killed by SIGPIPE: the
/// raw signal number, negated.
const SIGPIPE_EXITCODE: i32 = -13;

/// The literal testlib message for an interactor that read past the end of
/// the solution's output. Used to decide whether a broken pipe on the
/// solution side was the interactor's fault (§4.7 step 2).
const TESTLIB_EOF_MESSAGE: &str = "Unexpected end of file";

/// Result of checking one testcase.
#[derive(Debug, Clone)]
pub struct Verdict {
  pub outcome: Outcome,
  pub message: String,
  pub sanitizer_warnings: bool,
}

async fn read_stderr(log: &RunLog) -> Option<String> {
  let handle = log.files.get("stderr")?;
  let bytes = handle.context().await.ok()?;
  Some(String::from_utf8_lossy(&bytes).to_string())
}

/// Map a solution's raw run log to a provisional outcome, independent of
/// checker/interactor output (§4.7 `check_with_no_output`).
pub fn check_with_no_output(run_log: Option<&RunLog>, time_limit_ms: u64) -> Outcome {
  let Some(log) = run_log else {
    return Outcome::InternalError;
  };
  match log.exitstatus {
    ExitStatus::Signal | ExitStatus::NonZero => Outcome::RuntimeError,
    ExitStatus::Timeout => Outcome::TimeLimitExceeded,
    ExitStatus::WallTimeout => Outcome::IdlenessLimitExceeded,
    ExitStatus::MemoryExceeded => Outcome::MemoryLimitExceeded,
    ExitStatus::OutputExceeded => Outcome::OutputLimitExceeded,
    ExitStatus::SandboxError | ExitStatus::Terminated => Outcome::InternalError,
    ExitStatus::Ok => {
      let time_ms = log.time_seconds.map(|t| (t * 1000.0) as u64).unwrap_or(0);
      if time_limit_ms > 0 && !log.metadata.is_sanitized && time_ms > time_limit_ms {
        Outcome::TimeLimitExceeded
      } else {
        Outcome::Accepted
      }
    }
  }
}

/// Whether the run's CPU time stayed within twice the budget, for the
/// "soft TLE" annotation (§4.8, §9 open question: `>=` here, `>` above).
pub fn within_double_tl(run_log: &RunLog, time_limit_ms: u64) -> bool {
  if time_limit_ms == 0 {
    return true;
  }
  let time_ms = run_log.time_seconds.map(|t| (t * 1000.0) as u64).unwrap_or(u64::MAX);
  time_ms < time_limit_ms * 2
}

/// testlib checker/interactor exit code convention: `0/1/2/3`.
fn checker_exit_outcome(exitcode: i32) -> Outcome {
  match exitcode {
    0 => Outcome::Accepted,
    1 | 2 => Outcome::WrongAnswer,
    3 => Outcome::JudgeFailed,
    _ => Outcome::JudgeFailed,
  }
}

/// Map a checker/interactor-as-checker's run log to its outcome,
/// independent of `run_checker`'s own sandbox invocation. Drives
/// `Package.unit_tests.checker` fixtures (§3.1 `CheckerTest`) against a
/// run log already on hand, rather than re-running the checker.
pub fn checker_test_outcome(run_log: &RunLog) -> Outcome {
  match run_log.exitstatus {
    ExitStatus::Ok => Outcome::Accepted,
    ExitStatus::NonZero => checker_exit_outcome(run_log.exitcode),
    _ => Outcome::JudgeFailed,
  }
}

/// Map a validator's run log to its pass/fail verdict. Drives
/// `Package.unit_tests.validator` fixtures (§3.1 `ValidatorTest`).
pub fn validator_test_outcome(run_log: &RunLog) -> ValidatorOutcome {
  match run_log.exitstatus {
    ExitStatus::Ok => ValidatorOutcome::Valid,
    _ => ValidatorOutcome::Invalid,
  }
}

/// Run a compiled checker/interactor-as-checker over the staged
/// `input`/`output`/`expected` triple, returning its outcome and captured
/// stderr message.
async fn run_checker(
  checker: &Executable,
  extra_args: Vec<String>,
  input: Arc<FileHandle>,
  output: Arc<FileHandle>,
  expected: Arc<FileHandle>,
  cache: &DependencyCache,
  mode: CacheMode,
) -> Result<(Outcome, String), Error> {
  let judge_cfg = crate::CONFIG.read().unwrap().judge.clone();

  let mut files = HashMap::new();
  files.insert("inf.txt".to_string(), input);
  files.insert("ouf.txt".to_string(), output);
  files.insert("ans.txt".to_string(), expected);

  let args = [
    vec!["inf.txt".to_string(), "ouf.txt".to_string(), "ans.txt".to_string()],
    extra_args,
  ]
  .concat();

  let log = steps::run(
    checker,
    args,
    None,
    files,
    judge_cfg.time_limit.as_millis() as u64,
    judge_cfg.memory_limit / (1024 * 1024),
    0,
    cache,
    mode,
  )
  .await;

  let message = read_stderr(&log).await.unwrap_or_default();
  match log.exitstatus {
    ExitStatus::Ok => Ok((Outcome::Accepted, message)),
    ExitStatus::NonZero => Ok((checker_exit_outcome(log.exitcode), message)),
    _ => Err(Error::Runtime(error::RuntimeError::from(log))),
  }
}

/// Batch check (§4.7): run `check_with_no_output` first, enforce the
/// per-problem output limit, then dispatch to the checker.
pub async fn check_batch(
  checker: &Executable,
  checker_args: Vec<String>,
  solution_log: &RunLog,
  input: Arc<FileHandle>,
  output: Arc<FileHandle>,
  output_len: u64,
  expected: Arc<FileHandle>,
  time_limit_ms: u64,
  output_limit_bytes: u64,
  cache: &DependencyCache,
  mode: CacheMode,
) -> Result<Verdict, Error> {
  let sanitizer_warnings = solution_log.sanitizer_warnings;

  let outcome = check_with_no_output(Some(solution_log), time_limit_ms);
  if outcome != Outcome::Accepted {
    return Ok(Verdict {
      outcome,
      message: format!("solution {}", outcome),
      sanitizer_warnings,
    });
  }

  if output_len > output_limit_bytes {
    return Ok(Verdict {
      outcome: Outcome::OutputLimitExceeded,
      message: format!("output is {} bytes, limit is {}", output_len, output_limit_bytes),
      sanitizer_warnings,
    });
  }

  let (outcome, message) = run_checker(checker, checker_args, input, output, expected, cache, mode).await?;
  Ok(Verdict {
    outcome,
    message,
    sanitizer_warnings,
  })
}

/// Communication check (§4.7): the five-phase state machine over a
/// (solution, interactor) run-log pair.
pub async fn check_communication(
  solution_log: &RunLog,
  interactor_log: &RunLog,
  time_limit_ms: u64,
  legacy_checker: Option<&Executable>,
  legacy_checker_args: Vec<String>,
  input: Arc<FileHandle>,
  output: Option<Arc<FileHandle>>,
  expected: Arc<FileHandle>,
  cache: &DependencyCache,
  mode: CacheMode,
) -> Result<Verdict, Error> {
  let sanitizer_warnings = solution_log.sanitizer_warnings;
  let interactor_stderr = read_stderr(interactor_log).await;

  let verdict = |outcome: Outcome, message: String| Verdict {
    outcome,
    message,
    sanitizer_warnings,
  };

  // Phase 1: sandbox-level failure of either side.
  if solution_log.exitstatus == ExitStatus::SandboxError || interactor_log.exitstatus == ExitStatus::SandboxError {
    return Ok(verdict(Outcome::InternalError, "sandbox failure".to_string()));
  }

  let interactor_verdict = || interactor_exit_verdict(interactor_log, &interactor_stderr);

  // Phase 2: interactor priority on a broken pipe that isn't its own EOF
  // complaint (§4.7 step 2: solution received SIGPIPE, was sibling-
  // terminated, or exited non-zero with a non-EOF interactor stderr).
  let solution_broke_pipe = (solution_log.exitstatus == ExitStatus::Signal
    && solution_log.exitcode == SIGPIPE_EXITCODE)
    || solution_log.exitstatus == ExitStatus::Terminated
    || solution_log.exitstatus == ExitStatus::NonZero;
  let interactor_blamed_eof = interactor_stderr
    .as_deref()
    .is_some_and(|s| s.contains(TESTLIB_EOF_MESSAGE));
  if solution_broke_pipe && !interactor_blamed_eof {
    let (outcome, message) = interactor_verdict();
    if outcome != Outcome::Accepted {
      return Ok(verdict(outcome, message));
    }
  }

  // Phase 3: solution's own outcome, output-independent.
  let outcome = check_with_no_output(Some(solution_log), time_limit_ms);
  if outcome != Outcome::Accepted {
    return Ok(verdict(outcome, format!("solution {}", outcome)));
  }

  // Phase 4: interactor's verdict.
  let (outcome, message) = interactor_verdict();
  if outcome != Outcome::Accepted {
    return Ok(verdict(outcome, message));
  }

  // Phase 5: legacy mode also consults a checker over the solution's
  // captured output.
  if let (Some(checker), Some(output)) = (legacy_checker, output) {
    let (outcome, message) =
      run_checker(checker, legacy_checker_args, input, output, expected, cache, mode).await?;
    return Ok(verdict(outcome, message));
  }

  Ok(verdict(Outcome::Accepted, message))
}

/// Map the interactor's own run log to an outcome, per §4.7 step 4: exit
/// codes 1/2/3 follow the checker convention; any crash (signal, or a
/// sibling-terminated run) is `JudgeFailed` since an interactor is not
/// expected to crash under normal use; any other non-exit-code failure
/// (timeout, memory, sandbox-level) is reported via its own outcome.
fn interactor_exit_verdict(interactor_log: &RunLog, stderr: &Option<String>) -> (Outcome, String) {
  let message = stderr.clone().unwrap_or_default();
  match interactor_log.exitstatus {
    ExitStatus::Ok => (Outcome::Accepted, message),
    ExitStatus::NonZero => match interactor_log.exitcode {
      1 | 2 => (Outcome::WrongAnswer, message),
      3 => (Outcome::JudgeFailed, message),
      _ => (Outcome::JudgeFailed, message),
    },
    ExitStatus::Signal | ExitStatus::Terminated => (Outcome::JudgeFailed, message),
    _ => (check_with_no_output(Some(interactor_log), 0), message),
  }
}
