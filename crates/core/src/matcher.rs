use std::collections::HashMap;

use crate::{
  package::{ExpectedOutcome, Outcome, Package},
  testcase::TestcaseEntry,
};

/// A solution's report status (§4.9).
#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
  Ok,

  /// At least one testcase's outcome did not match the declared
  /// `ExpectedOutcome`. Carries every distinct outcome observed that
  /// failed to match, in `Outcome::all()` order.
  UnexpectedVerdicts { got: Vec<Outcome> },

  /// Every testcase matched, but the aggregated score diverged from the
  /// solution's declared expected score.
  UnexpectedScore { got: f32, expected: f32 },
}

#[derive(Debug, Clone)]
pub struct SolutionReport {
  pub status: ReportStatus,

  /// `None` for unscored problems (no group in the manifest carries a
  /// weight).
  pub score: Option<f32>,

  pub group_scores: Vec<(String, f32)>,
}

impl SolutionReport {
  pub fn is_ok(&self) -> bool {
    self.status == ReportStatus::Ok
  }
}

/// Per-group score (§4.9). A test group with no declared score-bearing
/// tests observed scores 0; the manifest schema carries a single
/// per-test pass/fail outcome rather than a continuous testlib-style
/// partial score, so "min-aggregate" and "all testcases must pass"
/// collapse to the same rule here: a group scores its full weight when
/// every observed testcase in it is `Accepted`, else zero.
fn score_groups(package: &Package, results: &[(TestcaseEntry, Outcome)]) -> Vec<(String, f32)> {
  let mut per_group: HashMap<&str, Vec<Outcome>> = HashMap::new();
  for (entry, outcome) in results {
    per_group.entry(entry.group.as_str()).or_default().push(*outcome);
  }

  package
    .testcases
    .iter()
    .filter_map(|group| {
      let weight = group.weight?;
      let name = group.name().as_str();
      let outcomes = per_group.get(name).cloned().unwrap_or_default();
      let all_accepted = !outcomes.is_empty() && outcomes.iter().all(|o| *o == Outcome::Accepted);
      Some((name.to_string(), if all_accepted { weight } else { 0.0 }))
    })
    .collect()
}

/// Match one solution's observed per-testcase outcomes against its
/// declared expectation and, for scored problems, its declared score
/// (§4.9).
pub fn match_solution(
  package: &Package,
  expected: ExpectedOutcome,
  expected_score: Option<f32>,
  results: &[(TestcaseEntry, Outcome)],
) -> SolutionReport {
  let unmatched: Vec<Outcome> = results
    .iter()
    .map(|(_, outcome)| *outcome)
    .filter(|outcome| !expected.r#match(*outcome))
    .collect();

  let is_scored = package.testcases.iter().any(|g| g.weight.is_some());
  let group_scores = score_groups(package, results);
  let total_score: f32 = group_scores.iter().map(|(_, s)| s).sum();

  let status = if !unmatched.is_empty() {
    let got = Outcome::all().into_iter().filter(|o| unmatched.contains(o)).collect();
    ReportStatus::UnexpectedVerdicts { got }
  } else if let (true, Some(expected_score)) = (is_scored, expected_score) {
    if (expected_score - total_score).abs() >= 1e-6 {
      ReportStatus::UnexpectedScore {
        got: total_score,
        expected: expected_score,
      }
    } else {
      ReportStatus::Ok
    }
  } else {
    ReportStatus::Ok
  };

  SolutionReport {
    status,
    score: is_scored.then_some(total_score),
    group_scores,
  }
}
