use std::{path::PathBuf, str::FromStr};

use crate::{
  package::CodeItem,
  testcase::{TestcaseEntry, TestcasePattern},
  walker::{dedup_by_path, expand_codeitem_globs},
};

fn code_item(path: &str) -> CodeItem {
  CodeItem {
    path: PathBuf::from(path),
    language: None,
    compilation_files: vec![],
    compilation_fingerprint: None,
  }
}

#[test]
fn dedup_by_path_keeps_first_occurrence_order() {
  let items = vec![code_item("a.cpp"), code_item("b.cpp"), code_item("a.cpp")];
  let deduped = dedup_by_path(items);
  let paths: Vec<_> = deduped.iter().map(|c| c.path.to_str().unwrap()).collect();
  assert_eq!(paths, vec!["a.cpp", "b.cpp"]);
}

#[test]
fn expand_codeitem_globs_passes_through_plain_paths() {
  let dir = tempfile::tempdir().unwrap();
  let items = vec![code_item("gen.cpp")];
  let expanded = expand_codeitem_globs(dir.path(), &items).unwrap();
  assert_eq!(expanded.len(), 1);
  assert_eq!(expanded[0].path, PathBuf::from("gen.cpp"));
}

#[test]
fn expand_codeitem_globs_expands_and_sorts_matches() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("gen2.cpp"), "").unwrap();
  std::fs::write(dir.path().join("gen1.cpp"), "").unwrap();
  std::fs::write(dir.path().join("notes.txt"), "").unwrap();

  let items = vec![code_item("gen*.cpp")];
  let expanded = expand_codeitem_globs(dir.path(), &items).unwrap();
  let names: Vec<_> = expanded
    .iter()
    .map(|c| c.path.file_name().unwrap().to_str().unwrap().to_string())
    .collect();
  assert_eq!(names, vec!["gen1.cpp", "gen2.cpp"]);
}

#[test]
fn testcase_entry_round_trips_through_display_and_from_str() {
  let entry = TestcaseEntry::new("group1", 3);
  let printed = entry.to_string();
  let parsed: TestcaseEntry = printed.parse().expect("entry prints in a parseable form");
  assert_eq!(parsed, entry);
}

#[test]
fn testcase_pattern_round_trips_through_display_and_from_str() {
  for text in ["group1", "group1/5"] {
    let pattern = TestcasePattern::from_str(text).expect("valid pattern");
    let reparsed: TestcasePattern = pattern.to_string().parse().expect("printed form re-parses");
    assert_eq!(reparsed, pattern);
  }
}

#[test]
fn testcase_pattern_intersects_its_own_group() {
  let pattern = TestcasePattern::from_str("group1").unwrap();
  assert!(pattern.intersecting_group("group1"));
  assert!(!pattern.intersecting_group("group2"));
}
