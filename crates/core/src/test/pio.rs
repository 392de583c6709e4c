use crate::pio::{self, Side};

#[test]
fn merge_interleaves_round_by_round() {
  let pin = b"ask 1\nask 2\n";
  let pout = b"answer 1\nanswer 2\n";

  let merged = pio::merge(pin, pout);
  let text = String::from_utf8(merged).unwrap();
  let mut lines = text.lines();

  assert_eq!(lines.next(), Some(pio::INTERACTOR_PREFIX));
  assert_eq!(lines.next(), Some(pio::SOLUTION_PREFIX));
  assert_eq!(lines.next(), Some(">ask 1"));
  assert_eq!(lines.next(), Some("<answer 1"));
  assert_eq!(lines.next(), Some(">ask 2"));
  assert_eq!(lines.next(), Some("<answer 2"));
  assert_eq!(lines.next(), None);
}

#[test]
fn merge_handles_unequal_line_counts() {
  let pin = b"ask 1\nask 2\nask 3\n";
  let pout = b"answer 1\n";

  let merged = pio::merge(pin, pout);
  let text = String::from_utf8(merged).unwrap();
  let lines: Vec<&str> = text.lines().skip(2).collect();

  assert_eq!(lines, vec![">ask 1", "<answer 1", ">ask 2", ">ask 3"]);
}

#[test]
fn parse_round_trips_a_merged_transcript() {
  let merged = pio::merge(b"ask 1\n", b"answer 1\n");
  let transcript = pio::parse(&merged).unwrap();

  assert_eq!(transcript.interactor_prefix, pio::INTERACTOR_PREFIX);
  assert_eq!(transcript.solution_prefix, pio::SOLUTION_PREFIX);
  assert_eq!(transcript.lines, vec![(Side::Interactor, "ask 1".to_string()), (Side::Solution, "answer 1".to_string())]);
}

#[test]
fn parse_rejects_a_line_with_neither_prefix() {
  let bad = b">\n<\n>ok\nstray line\n";
  let err = pio::parse(bad).unwrap_err();
  assert!(err.to_string().contains("stray line"));
}
