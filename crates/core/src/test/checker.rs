use std::collections::HashMap;

use crate::{
  checker::{check_with_no_output, within_double_tl},
  package::Outcome,
  sandbox::{ExitStatus, RunLog, RunLogMetadata},
};

fn run_log(exitstatus: ExitStatus, time_seconds: Option<f64>, is_sanitized: bool) -> RunLog {
  RunLog {
    exitcode: 0,
    exitstatus,
    time_seconds,
    wall_time_seconds: time_seconds,
    memory_bytes: Some(1024),
    stderr_digest: None,
    sanitizer_warnings: false,
    metadata: RunLogMetadata {
      is_sanitized,
      ..RunLogMetadata::default()
    },
    files: HashMap::new(),
  }
}

#[test]
fn no_run_log_is_internal_error() {
  assert_eq!(check_with_no_output(None, 1000), Outcome::InternalError);
}

#[test]
fn maps_exitstatus_table_without_a_checker() {
  let cases = [
    (ExitStatus::Signal, Outcome::RuntimeError),
    (ExitStatus::NonZero, Outcome::RuntimeError),
    (ExitStatus::Timeout, Outcome::TimeLimitExceeded),
    (ExitStatus::WallTimeout, Outcome::IdlenessLimitExceeded),
    (ExitStatus::MemoryExceeded, Outcome::MemoryLimitExceeded),
    (ExitStatus::OutputExceeded, Outcome::OutputLimitExceeded),
    (ExitStatus::SandboxError, Outcome::InternalError),
    (ExitStatus::Terminated, Outcome::InternalError),
  ];
  for (exitstatus, expected) in cases {
    let log = run_log(exitstatus, Some(0.1), false);
    assert_eq!(check_with_no_output(Some(&log), 1000), expected, "{:?}", exitstatus);
  }
}

#[test]
fn ok_within_limit_is_accepted() {
  let log = run_log(ExitStatus::Ok, Some(0.5), false);
  assert_eq!(check_with_no_output(Some(&log), 1000), Outcome::Accepted);
}

#[test]
fn ok_strictly_over_limit_is_tle() {
  let log = run_log(ExitStatus::Ok, Some(1.001), false);
  assert_eq!(check_with_no_output(Some(&log), 1000), Outcome::TimeLimitExceeded);
}

#[test]
fn ok_exactly_at_limit_is_accepted() {
  let log = run_log(ExitStatus::Ok, Some(1.0), false);
  assert_eq!(check_with_no_output(Some(&log), 1000), Outcome::Accepted);
}

#[test]
fn sanitized_runs_are_never_time_limited() {
  let log = run_log(ExitStatus::Ok, Some(5.0), true);
  assert_eq!(check_with_no_output(Some(&log), 1000), Outcome::Accepted);
}

#[test]
fn zero_time_limit_never_triggers_tle() {
  let log = run_log(ExitStatus::Ok, Some(1_000_000.0), false);
  assert_eq!(check_with_no_output(Some(&log), 0), Outcome::Accepted);
}

#[test]
fn within_double_tl_boundary() {
  let just_under = run_log(ExitStatus::Timeout, Some(1.999), false);
  assert!(within_double_tl(&just_under, 1000));

  let at_double = run_log(ExitStatus::Timeout, Some(2.0), false);
  assert!(!within_double_tl(&at_double, 1000));

  let over_double = run_log(ExitStatus::Timeout, Some(2.5), false);
  assert!(!within_double_tl(&over_double, 1000));
}

#[test]
fn within_double_tl_is_vacuously_true_with_no_limit() {
  let log = run_log(ExitStatus::Ok, Some(1000.0), false);
  assert!(within_double_tl(&log, 0));
}
