use serde::{Deserialize, Serialize};
use std::{
  borrow::Borrow,
  collections::HashSet,
  fmt::Display,
  hash::{Hash, Hasher},
  str::FromStr,
  sync::RwLock,
  time,
};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
/// Engine configuration: toolchains, judging defaults and the sandbox
/// executor connection.
pub struct Cfg {
  pub lang: HashSet<LangCfg>,

  pub judge: JudgeCfg,

  pub sandbox: SandboxCfg,
}

impl Default for Cfg {
  // Set default values for config
  fn default() -> Self {
    return Self {
      lang: HashSet::from([
        LangCfg {
          name: "c".to_string(),
          compile_cmd: [
            "/usr/bin/gcc",
            "foo.c",
            "-o",
            "foo",
            "-O2",
            "-w",
            "-fmax-errors=3",
            "-DONLINE_JUDGE",
          ]
          .iter()
          .map(|&s| s.into())
          .collect(),
          run_cmd: vec!["foo".to_string()],
          source: "foo.c".to_string(),
          exec: "foo".to_string(),
          sanitizer_flags: vec![],
        },
        LangCfg {
          name: "cpp".to_string(),
          compile_cmd: [
            "/usr/bin/g++",
            "foo.cpp",
            "-o",
            "foo",
            "-O2",
            "-w",
            "-fmax-errors=3",
            "-DONLINE_JUDGE",
          ]
          .iter()
          .map(|&s| s.into())
          .collect(),
          run_cmd: vec!["foo".to_string()],
          source: "foo.cpp".to_string(),
          exec: "foo".to_string(),
          sanitizer_flags: [
            "-fsanitize=address,undefined",
            "-fno-sanitize-recover=all",
          ]
          .iter()
          .map(|&s| s.into())
          .collect(),
        },
      ]),
      judge: JudgeCfg {
        env: vec![
          "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".to_string(),
          "HOME=/w".to_string(),
          "ONLINE_JUDGE=judge-core".to_string(),
        ],
        time_limit: time::Duration::from_secs(10),
        memory_limit: 1024 * 1024 * 1024, // 1 GB
        process_limit: 16,                // 16 processes
        stdout_limit: 512 * 1024 * 1024,  // 512 MB
        stderr_limit: 16 * 1024,          // 16 kB
        retry_limit: 2,
        capture_communication_io: false,
      },
      sandbox: SandboxCfg {
        host: "http://[::1]:5051".to_string(),
        max_job: 2,
      },
    };
  }
}

/// Programming language toolchain config.
#[derive(Debug, Serialize, Deserialize, Clone, Eq)]
pub struct LangCfg {
  pub name: String,

  pub compile_cmd: Vec<String>,

  pub run_cmd: Vec<String>,

  /// Name of source file
  pub source: String,

  /// Name of executable file
  pub exec: String,

  /// Extra flags appended when compiling with sanitizer instrumentation
  /// (§4.3). Empty for languages that are not C/C++-family.
  pub sanitizer_flags: Vec<String>,
}

impl LangCfg {
  pub fn is_c_family(&self) -> bool {
    self.name == "c" || self.name == "cpp"
  }
}

impl PartialEq for LangCfg {
  fn eq(&self, other: &LangCfg) -> bool {
    self.name == other.name
  }
}

impl Hash for LangCfg {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.name.hash(state);
  }
}

impl Borrow<str> for LangCfg {
  fn borrow(&self) -> &str {
    &self.name
  }
}

/// Error when parsing a language name which not in global settings.
#[derive(Error, Debug, Clone)]
#[error("invalid lang: {lang}")]
pub struct InvalidLangError {
  pub lang: String,
}

impl FromStr for LangCfg {
  type Err = InvalidLangError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match CONFIG.read().unwrap().lang.get(s) {
      Some(x) => Ok(x.clone()),
      None => Err(Self::Err {
        lang: s.to_string(),
      }),
    }
  }
}

impl Display for LangCfg {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", &self.name)
  }
}

/// Judge config.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JudgeCfg {
  /// Environment variables.
  pub env: Vec<String>,

  /// CPU time limits for compiling and running non-solution programs
  /// such as checkers, validators, generators, etc.
  pub time_limit: time::Duration,

  /// Memory limit for compiling and running non-solution programs in bytes.
  pub memory_limit: u64,

  /// Default process count limit.
  pub process_limit: u64,

  /// Default stdout limit, in bytes.
  pub stdout_limit: i64,

  /// Default stderr limit, in bytes.
  pub stderr_limit: i64,

  /// Bound on Solution Runner retries (§4.8).
  pub retry_limit: u32,

  /// Whether to capture Communication-task pipe traffic into `.pin`,
  /// `.pout` and `.pio` sidecars (§6). Off by default since these are
  /// debugging artifacts, not needed for judging itself.
  pub capture_communication_io: bool,
}

/// Sandbox config.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SandboxCfg {
  /// Sandbox gRPC server host address.
  pub host: String,

  /// Max job count running in the same time.
  pub max_job: usize,
}

impl Cfg {
  /// Create and load the config.
  pub fn load(search_paths: &[String]) -> Self {
    let mut builder = config::Config::builder()
      .add_source(config::File::with_name("/etc/judge-core/config").required(false));

    for p in search_paths {
      builder = builder.add_source(config::File::with_name(p.as_str()).required(false));
    }

    builder = builder.add_source(config::Environment::with_prefix("JUDGE_CORE"));

    return builder.build().unwrap().try_deserialize::<Self>().unwrap();
  }
}

lazy_static! {
  /// Global config. Holds defaults until `load_config` runs.
  pub static ref CONFIG: RwLock<Cfg> = RwLock::new(Cfg::default());
}

/// Load the global config. Should be called on the top of `main`.
pub fn load_config(search_paths: &[String]) {
  *CONFIG.write().unwrap() = Cfg::load(search_paths);
}
