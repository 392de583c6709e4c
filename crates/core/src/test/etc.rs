use crate::etc::{Cfg, LangCfg};

#[test]
fn default_cfg_declares_c_and_cpp() {
  let cfg = Cfg::default();
  let cpp = cfg.lang.get("cpp").expect("default config declares cpp");
  assert!(cpp.is_c_family());
  assert!(!cpp.sanitizer_flags.is_empty());

  let c = cfg.lang.get("c").expect("default config declares c");
  assert!(c.is_c_family());
}

#[test]
fn judge_defaults_are_positive() {
  let cfg = Cfg::default();
  assert!(cfg.judge.time_limit.as_secs() > 0);
  assert!(cfg.judge.memory_limit > 0);
  assert!(cfg.judge.retry_limit > 0);
}

#[test]
fn lang_cfg_round_trips_through_display_and_from_str() {
  let cfg = Cfg::default();
  let cpp = cfg.lang.get("cpp").unwrap().clone();
  let parsed: LangCfg = cpp.name.parse().expect("name round-trips through the config's lang set");
  assert_eq!(parsed.name, "cpp");
}

#[test]
fn unknown_lang_name_is_rejected() {
  let result = "brainfuck".parse::<LangCfg>();
  assert!(result.is_err());
}
