use crate::{
  matcher::{match_solution, ReportStatus},
  package::{ExpectedOutcome, Outcome, Package},
  testcase::TestcaseEntry,
};

fn scored_package() -> Package {
  serde_yaml::from_str(
    r#"
name: box1
timeLimit: 1000
memoryLimit: 256
testcases:
  - name: samples
    weight: null
  - name: group1
    weight: 40
  - name: group2
    weight: 60
"#,
  )
  .expect("fixture package parses")
}

#[test]
fn all_accepted_matches_and_scores_full() {
  let package = scored_package();
  let results = vec![
    (TestcaseEntry::new("samples", 0), Outcome::Accepted),
    (TestcaseEntry::new("group1", 0), Outcome::Accepted),
    (TestcaseEntry::new("group1", 1), Outcome::Accepted),
    (TestcaseEntry::new("group2", 0), Outcome::Accepted),
  ];

  let report = match_solution(&package, ExpectedOutcome::Accepted, Some(100.0), &results);
  assert_eq!(report.status, ReportStatus::Ok);
  assert_eq!(report.score, Some(100.0));
  assert!(report.group_scores.contains(&("group1".to_string(), 40.0)));
  assert!(report.group_scores.contains(&("group2".to_string(), 60.0)));
}

#[test]
fn unweighted_group_never_contributes_to_score() {
  let package = scored_package();
  let results = vec![(TestcaseEntry::new("samples", 0), Outcome::Accepted)];

  let report = match_solution(&package, ExpectedOutcome::Accepted, None, &results);
  assert_eq!(report.status, ReportStatus::Ok);
  // "samples" carries no weight, so it never shows up in group_scores.
  assert!(report.group_scores.is_empty());
}

#[test]
fn mismatched_outcome_is_reported_with_deduped_sorted_outcomes() {
  let package = scored_package();
  let results = vec![
    (TestcaseEntry::new("group1", 0), Outcome::Accepted),
    (TestcaseEntry::new("group1", 1), Outcome::WrongAnswer),
    (TestcaseEntry::new("group2", 0), Outcome::WrongAnswer),
  ];

  let report = match_solution(&package, ExpectedOutcome::Accepted, Some(40.0), &results);
  match report.status {
    ReportStatus::UnexpectedVerdicts { got } => assert_eq!(got, vec![Outcome::WrongAnswer]),
    other => panic!("expected UnexpectedVerdicts, got {:?}", other),
  }
}

#[test]
fn partial_group_failure_scores_zero_for_that_group() {
  let package = scored_package();
  let results = vec![
    (TestcaseEntry::new("group1", 0), Outcome::Accepted),
    (TestcaseEntry::new("group2", 0), Outcome::Accepted),
    (TestcaseEntry::new("group2", 1), Outcome::WrongAnswer),
  ];

  // `Any` accepts every verdict, so the mismatch shows up as a score
  // discrepancy instead of an unexpected verdict.
  let report = match_solution(&package, ExpectedOutcome::Any, Some(100.0), &results);
  match report.status {
    ReportStatus::UnexpectedScore { got, expected } => {
      assert_eq!(got, 40.0);
      assert_eq!(expected, 100.0);
    }
    other => panic!("expected UnexpectedScore, got {:?}", other),
  }
}
