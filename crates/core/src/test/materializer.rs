use std::collections::HashMap;

use crate::{
  materializer::{normalize_newlines, split_args, vars_to_flags, BoundAggregator},
  package::Primitive,
};

#[test]
fn normalize_newlines_collapses_crlf_and_lone_cr() {
  assert_eq!(normalize_newlines(b"a\r\nb\rc\n"), b"a\nb\nc\n".to_vec());
}

#[test]
fn split_args_is_whitespace_only_with_no_quoting() {
  assert_eq!(split_args("  --n=10   --seed=7 "), vec!["--n=10", "--seed=7"]);
  assert_eq!(split_args("\"quoted text\""), vec!["\"quoted", "text\""]);
}

#[test]
fn vars_to_flags_is_sorted_and_dash_prefixed() {
  let mut vars = HashMap::new();
  vars.insert("n".to_string(), Primitive::Int(10));
  vars.insert("a".to_string(), Primitive::Str("x".to_string()));
  assert_eq!(vars_to_flags(&vars), vec!["--a=x".to_string(), "--n=10".to_string()]);
}

#[test]
fn bound_aggregator_ignores_samples_and_tracks_min_max_per_group() {
  let mut agg = BoundAggregator::default();
  agg.record("samples", "n: min-value-hit");
  agg.record("group1", "n: min-value-hit\nm: max-value-hit, min-value-hit");
  agg.record("group1", "n: max-value-hit");

  assert!(agg.hits("samples", "n").is_none());

  let n = agg.hits("group1", "n").unwrap();
  assert!(n.min_hit);
  assert!(n.max_hit);

  let m = agg.hits("group1", "m").unwrap();
  assert!(m.min_hit);
  assert!(m.max_hit);
}

#[test]
fn bound_aggregator_ignores_malformed_lines() {
  let mut agg = BoundAggregator::default();
  agg.record("group1", "not a bound line\nn: min-value-hit");
  assert!(agg.hits("group1", "n").is_some());
}
