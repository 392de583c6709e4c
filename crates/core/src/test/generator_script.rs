use crate::genscript::{parse, parse_box, parse_rbx, ScriptFormat};

#[test]
fn rbx_parses_calls_copies_and_comments() {
  let script = "\
# a comment
gen1 --n=10
@copy manual/001.in
// another comment
gen2 --n=20 --seed=7
";
  let entries = parse_rbx(script).expect("valid script");
  assert_eq!(entries.len(), 3);

  assert_eq!(entries[0].generator_name.as_deref(), Some("gen1"));
  assert_eq!(entries[0].args, "--n=10");
  assert_eq!(entries[0].group_override, None);

  assert_eq!(entries[1].copied_from.as_deref().unwrap().to_str(), Some("manual/001.in"));
  assert!(entries[1].generator_name.is_none());

  assert_eq!(entries[2].generator_name.as_deref(), Some("gen2"));
  assert_eq!(entries[2].args, "--n=20 --seed=7");
}

#[test]
fn rbx_testgroup_blocks_nest_and_tag_their_entries() {
  let script = "\
@testgroup outer {
  gen1
  @testgroup inner {
    gen2
  }
  gen3
}
";
  let entries = parse_rbx(script).expect("valid script");
  assert_eq!(entries.len(), 3);
  assert_eq!(entries[0].group_override.as_deref(), Some("outer"));
  assert_eq!(entries[1].group_override.as_deref(), Some("inner"));
  assert_eq!(entries[2].group_override.as_deref(), Some("outer"));
}

#[test]
fn rbx_rejects_unterminated_testgroup() {
  let script = "@testgroup outer {\ngen1\n";
  assert!(parse_rbx(script).is_err());
}

#[test]
fn rbx_rejects_unknown_directive() {
  assert!(parse_rbx("@bogus\n").is_err());
}

#[test]
fn box_parses_group_numbers_and_normalizes_copy_and_exe() {
  let script = "\
1 ; gen.exe --n=5
2 ; copy manual/sample.in
";
  let entries = parse_box(script).expect("valid script");
  assert_eq!(entries.len(), 2);

  assert_eq!(entries[0].generator_name.as_deref(), Some("gen"));
  assert_eq!(entries[0].args, "--n=5");
  assert_eq!(entries[0].group_override.as_deref(), Some("1"));

  assert!(entries[1].generator_name.is_none());
  assert_eq!(entries[1].copied_from.as_deref().unwrap().to_str(), Some("manual/sample.in"));
  assert_eq!(entries[1].group_override.as_deref(), Some("2"));
}

#[test]
fn box_rejects_missing_semicolon() {
  assert!(parse_box("gen.exe --n=5\n").is_err());
}

#[test]
fn dispatch_picks_the_grammar_for_the_format() {
  let rbx = parse(ScriptFormat::Rbx, "gen1\n").unwrap();
  assert_eq!(rbx[0].generator_name.as_deref(), Some("gen1"));

  let boxed = parse(ScriptFormat::Box, "1 ; gen1\n").unwrap();
  assert_eq!(boxed[0].generator_name.as_deref(), Some("gen1"));
}
