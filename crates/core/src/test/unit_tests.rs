use std::collections::HashMap;

use crate::{
  checker::{checker_test_outcome, validator_test_outcome},
  package::{CheckerTest, ExpectedOutcome, Outcome, UnitTests, ValidatorOutcome, ValidatorTest},
  sandbox::{ExitStatus, RunLog, RunLogMetadata},
};

fn run_log(exitstatus: ExitStatus, exitcode: i32) -> RunLog {
  RunLog {
    exitcode,
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

/// A package declaring `unitTests` fixtures against its validator/checker,
/// each paired with the run log that fixture's input would produce (§3.1
/// `UnitTests`).
fn fixtures() -> (UnitTests, HashMap<&'static str, RunLog>) {
  let unit_tests = UnitTests {
    validator: vec![
      ValidatorTest {
        glob: "tests/unit/valid_*.in".to_string(),
        outcome: ValidatorOutcome::Valid,
        validator: None,
      },
      ValidatorTest {
        glob: "tests/unit/invalid_*.in".to_string(),
        outcome: ValidatorOutcome::Invalid,
        validator: None,
      },
    ],
    checker: vec![
      CheckerTest {
        glob: "tests/unit/ac_*".to_string(),
        outcome: ExpectedOutcome::Accepted,
      },
      CheckerTest {
        glob: "tests/unit/wa_*".to_string(),
        outcome: ExpectedOutcome::WrongAnswer,
      },
    ],
  };

  let mut logs = HashMap::new();
  logs.insert("tests/unit/valid_*.in", run_log(ExitStatus::Ok, 0));
  logs.insert("tests/unit/invalid_*.in", run_log(ExitStatus::NonZero, 1));
  logs.insert("tests/unit/ac_*", run_log(ExitStatus::Ok, 0));
  logs.insert("tests/unit/wa_*", run_log(ExitStatus::NonZero, 1));

  (unit_tests, logs)
}

#[test]
fn validator_fixtures_match_their_declared_outcome() {
  let (unit_tests, logs) = fixtures();
  for test in &unit_tests.validator {
    let log = &logs[test.glob.as_str()];
    assert_eq!(validator_test_outcome(log), test.outcome, "fixture `{}`", test.glob);
  }
}

#[test]
fn checker_fixtures_match_their_declared_outcome() {
  let (unit_tests, logs) = fixtures();
  for test in &unit_tests.checker {
    let log = &logs[test.glob.as_str()];
    let outcome = checker_test_outcome(log);
    let expected = match test.outcome {
      ExpectedOutcome::Accepted => Outcome::Accepted,
      ExpectedOutcome::WrongAnswer => Outcome::WrongAnswer,
      other => panic!("fixture uses an outcome this test doesn't model: {:?}", other),
    };
    assert_eq!(outcome, expected, "fixture `{}`", test.glob);
  }
}

#[test]
fn a_validator_fixture_catches_a_regression() {
  let regressed = run_log(ExitStatus::NonZero, 1);
  assert_eq!(validator_test_outcome(&regressed), ValidatorOutcome::Invalid);
  assert_ne!(validator_test_outcome(&regressed), ValidatorOutcome::Valid);
}
