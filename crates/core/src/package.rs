use std::{collections::HashMap, fmt, path::PathBuf, str::FromStr};

use regex::Regex;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

use crate::error::Error;

lazy_static! {
  static ref NAME_RE: Regex = Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$").unwrap();
}

/// A name used as a package, group, generator or solution identifier.
/// 3 to 32 characters, starting with an alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NameField(String);

impl NameField {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for NameField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl FromStr for NameField {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.len() < 3 || s.len() > 32 {
      return Err(format!("name `{}` must be between 3 and 32 characters", s));
    }
    if !NAME_RE.is_match(s) {
      return Err(format!(
        "name `{}` must match {}",
        s,
        NAME_RE.as_str()
      ));
    }
    Ok(Self(s.to_string()))
  }
}

impl<'de> Deserialize<'de> for NameField {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(D::Error::custom)
  }
}

/// A literal value a package var can hold once flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Primitive {
  Int(i64),
  Float(f64),
  Bool(bool),
  Str(String),
}

impl fmt::Display for Primitive {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Primitive::Int(v) => write!(f, "{}", v),
      Primitive::Float(v) => write!(f, "{}", v),
      Primitive::Bool(v) => write!(f, "{}", v),
      Primitive::Str(v) => write!(f, "{}", v),
    }
  }
}

/// Flat, dotted-key view of `RecVars`, as passed to the validator and
/// statement renderer.
pub type Vars = HashMap<String, Primitive>;

/// Tree of vars as declared in the manifest; nested maps are flattened to
/// dotted keys by `expand_vars`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecVars {
  #[default]
  Empty,
  Leaf(Primitive),
  Node(HashMap<String, RecVars>),
}

fn expand_var(value: &Primitive) -> Primitive {
  // A leading backslash escapes what would otherwise be treated as a
  // directive; everything else passes through unchanged. Unlike the
  // system this package schema is modeled on, no embedded-expression
  // evaluation is supported here: vars are literal values only.
  if let Primitive::Str(s) = value {
    if let Some(rest) = s.strip_prefix('\\') {
      return Primitive::Str(rest.to_string());
    }
  }
  value.clone()
}

/// Flatten a `RecVars` tree into dotted-key `Vars`.
pub fn expand_vars(recvars: &HashMap<String, RecVars>) -> Vars {
  let mut vars = Vars::new();
  fn solve(node: &HashMap<String, RecVars>, prefix: &str, vars: &mut Vars) {
    for (k, v) in node {
      let key = if prefix.is_empty() {
        k.clone()
      } else {
        format!("{}.{}", prefix, k)
      };
      match v {
        RecVars::Node(child) => solve(child, &key, vars),
        RecVars::Leaf(p) => {
          vars.insert(key, expand_var(p));
        }
        RecVars::Empty => {}
      }
    }
  }
  solve(recvars, "", &mut vars);
  vars
}

/// A source artifact (§3 CodeItem).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeItem {
  pub path: PathBuf,

  #[serde(default)]
  pub language: Option<String>,

  #[serde(default, rename = "compilationFiles")]
  pub compilation_files: Vec<String>,

  #[serde(skip)]
  pub compilation_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interactor {
  #[serde(flatten)]
  pub code: CodeItem,

  #[serde(default)]
  pub legacy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Testcase {
  #[serde(rename = "inputPath")]
  pub input_path: PathBuf,

  #[serde(default, rename = "outputPath")]
  pub output_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorCall {
  pub name: String,

  #[serde(default)]
  pub args: Option<String>,
}

impl fmt::Display for GeneratorCall {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.name, self.args.as_deref().unwrap_or(""))
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestcaseSubgroup {
  pub name: NameField,

  #[serde(default)]
  pub testcases: Vec<Testcase>,

  #[serde(default, rename = "testcaseGlob")]
  pub testcase_glob: Option<String>,

  #[serde(default)]
  pub generators: Vec<GeneratorCall>,

  #[serde(default, rename = "generatorScript")]
  pub generator_script: Option<CodeItem>,

  #[serde(default, rename = "generatorScriptFormat")]
  pub generator_script_format: crate::genscript::ScriptFormat,

  #[serde(default, rename = "extraValidators")]
  pub extra_validators: Vec<CodeItem>,
}

impl TestcaseSubgroup {
  /// Invariant: at most one of testcases/glob/generators/generator_script
  /// is set (§3 TestGroup).
  pub fn check_oneof(&self) -> Result<(), Error> {
    let set = [
      !self.testcases.is_empty(),
      self.testcase_glob.is_some(),
      !self.generators.is_empty(),
      self.generator_script.is_some(),
    ]
    .into_iter()
    .filter(|b| *b)
    .count();
    if set > 1 {
      return Err(Error::Package(format!(
        "subgroup `{}` specifies more than one of testcases/glob/generators/generatorScript",
        self.name
      )));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestGroup {
  #[serde(flatten)]
  pub base: TestcaseSubgroup,

  #[serde(default)]
  pub subgroups: Vec<TestcaseSubgroup>,

  #[serde(default)]
  pub validator: Option<CodeItem>,

  #[serde(default = "default_weight")]
  pub weight: Option<f32>,

  #[serde(default, rename = "modelSolution")]
  pub model_solution: Option<CodeItem>,
}

fn default_weight() -> Option<f32> {
  Some(1.0)
}

impl TestGroup {
  pub fn name(&self) -> &NameField {
    &self.base.name
  }

  pub fn check(&self) -> Result<(), Error> {
    self.base.check_oneof()?;
    for sub in &self.subgroups {
      sub.check_oneof()?;
    }
    if self.model_solution.is_some() && self.base.name.as_str() != "samples" {
      return Err(Error::Package(
        "modelSolution can only be set for the \"samples\" testgroup".to_string(),
      ));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
  #[serde(flatten)]
  pub code: CodeItem,

  pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
  #[serde(flatten)]
  pub code: CodeItem,

  pub outcome: ExpectedOutcome,

  #[serde(default)]
  pub score: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stress {
  pub name: NameField,
  pub generator: GeneratorCall,
  pub finder: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitModifiers {
  #[serde(default, rename = "timeMultiplier")]
  pub time_multiplier: Option<f64>,

  #[serde(default)]
  pub time: Option<u64>,

  #[serde(default)]
  pub memory: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, strum::EnumString, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ValidatorOutcome {
  Valid,
  Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorTest {
  pub glob: String,

  #[serde(default = "default_validator_outcome")]
  pub outcome: ValidatorOutcome,

  #[serde(default)]
  pub validator: Option<CodeItem>,
}

fn default_validator_outcome() -> ValidatorOutcome {
  ValidatorOutcome::Valid
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckerTest {
  pub glob: String,

  #[serde(default = "default_checker_outcome")]
  pub outcome: ExpectedOutcome,
}

fn default_checker_outcome() -> ExpectedOutcome {
  ExpectedOutcome::Accepted
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitTests {
  #[serde(default)]
  pub validator: Vec<ValidatorTest>,

  #[serde(default)]
  pub checker: Vec<CheckerTest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum TaskType {
  Batch,
  Communication,
}

impl Default for TaskType {
  fn default() -> Self {
    TaskType::Batch
  }
}

/// Closed set of verdicts the judging pipeline can derive (§3 Outcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
  Accepted,
  WrongAnswer,
  RuntimeError,
  TimeLimitExceeded,
  IdlenessLimitExceeded,
  MemoryLimitExceeded,
  OutputLimitExceeded,
  JudgeFailed,
  InternalError,
}

impl Outcome {
  pub fn is_slow(&self) -> bool {
    matches!(self, Outcome::TimeLimitExceeded | Outcome::IdlenessLimitExceeded)
  }

  pub fn all() -> [Outcome; 9] {
    [
      Outcome::Accepted,
      Outcome::WrongAnswer,
      Outcome::RuntimeError,
      Outcome::TimeLimitExceeded,
      Outcome::IdlenessLimitExceeded,
      Outcome::MemoryLimitExceeded,
      Outcome::OutputLimitExceeded,
      Outcome::JudgeFailed,
      Outcome::InternalError,
    ]
  }
}

/// Declarative class of acceptable outcomes attached to a solution (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ExpectedOutcome {
  Any,
  Accepted,
  AcceptedOrTle,
  WrongAnswer,
  Incorrect,
  RuntimeError,
  TimeLimitExceeded,
  MemoryLimitExceeded,
  OutputLimitExceeded,
  TleOrRte,
  JudgeFailed,
}

impl ExpectedOutcome {
  pub fn is_slow(&self) -> bool {
    matches!(self, ExpectedOutcome::TimeLimitExceeded | ExpectedOutcome::TleOrRte)
  }

  pub fn r#match(&self, outcome: Outcome) -> bool {
    match self {
      ExpectedOutcome::Any => true,
      ExpectedOutcome::Accepted => outcome == Outcome::Accepted,
      ExpectedOutcome::AcceptedOrTle => outcome == Outcome::Accepted || outcome.is_slow(),
      ExpectedOutcome::WrongAnswer => outcome == Outcome::WrongAnswer,
      ExpectedOutcome::Incorrect => {
        matches!(
          outcome,
          Outcome::WrongAnswer
            | Outcome::RuntimeError
            | Outcome::MemoryLimitExceeded
            | Outcome::OutputLimitExceeded
        ) || outcome.is_slow()
      }
      ExpectedOutcome::RuntimeError => outcome == Outcome::RuntimeError,
      ExpectedOutcome::TimeLimitExceeded => outcome.is_slow(),
      ExpectedOutcome::MemoryLimitExceeded => outcome == Outcome::MemoryLimitExceeded,
      ExpectedOutcome::OutputLimitExceeded => outcome == Outcome::OutputLimitExceeded,
      ExpectedOutcome::TleOrRte => outcome == Outcome::RuntimeError || outcome.is_slow(),
      ExpectedOutcome::JudgeFailed => outcome == Outcome::JudgeFailed,
    }
  }

  pub fn matches(&self) -> Vec<Outcome> {
    Outcome::all().into_iter().filter(|o| self.r#match(*o)).collect()
  }

  pub fn intersect(&self, other: &ExpectedOutcome) -> bool {
    self.matches().iter().any(|o| other.r#match(*o))
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Package {
  pub name: NameField,

  #[serde(default)]
  pub titles: HashMap<String, String>,

  #[serde(default, rename = "type")]
  pub task_type: TaskType,

  #[serde(rename = "timeLimit")]
  pub time_limit_ms: u64,

  #[serde(rename = "memoryLimit")]
  pub memory_limit_mib: u64,

  #[serde(default = "default_output_limit", rename = "outputLimit")]
  pub output_limit_kib: u64,

  #[serde(default)]
  pub modifiers: HashMap<String, LimitModifiers>,

  #[serde(default)]
  pub checker: Option<CodeItem>,

  #[serde(default)]
  pub interactor: Option<Interactor>,

  #[serde(default)]
  pub validator: Option<CodeItem>,

  #[serde(default)]
  pub generators: Vec<Generator>,

  #[serde(default)]
  pub solutions: Vec<Solution>,

  #[serde(default)]
  pub testcases: Vec<TestGroup>,

  #[serde(default)]
  pub stresses: Vec<Stress>,

  #[serde(default)]
  pub vars: HashMap<String, RecVars>,

  #[serde(default, rename = "unitTests")]
  pub unit_tests: UnitTests,

  /// Value of `RBX_TIME_MULTIPLIER` at load time (§4.8). Read once here,
  /// not on every limit lookup, so a build is internally consistent even
  /// if the environment changes mid-run.
  #[serde(skip, default = "default_time_multiplier")]
  pub time_multiplier: f64,
}

fn default_output_limit() -> u64 {
  4 * 1024
}

fn default_time_multiplier() -> f64 {
  std::env::var("RBX_TIME_MULTIPLIER")
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(1.0)
}

impl Package {
  pub fn load(path: &std::path::Path) -> Result<Self, Error> {
    let text = std::fs::read_to_string(path)?;
    let pkg: Package = serde_yaml::from_str(&text)?;
    pkg.validate()?;
    Ok(pkg)
  }

  pub fn expanded_vars(&self) -> Vars {
    expand_vars(&self.vars)
  }

  fn validate(&self) -> Result<(), Error> {
    for group in &self.testcases {
      group.check()?;
    }
    if let Some(first) = self.testcases.iter().position(|g| g.name().as_str() == "samples") {
      if first != 0 {
        return Err(Error::Package(
          "the \"samples\" testgroup must be the first group, if present".to_string(),
        ));
      }
    }
    if self.solutions.iter().any(|s| s.outcome == ExpectedOutcome::Accepted)
      && self.solutions.first().map(|s| s.outcome) != Some(ExpectedOutcome::Accepted)
    {
      return Err(Error::Package(
        "the first solution must have the \"accepted\" outcome if any solution does".to_string(),
      ));
    }
    Ok(())
  }

  /// Effective CPU time limit for a language, applying modifiers and the
  /// `RBX_TIME_MULTIPLIER` environment override captured at load (§4.8).
  pub fn time_limit_for(&self, language: Option<&str>) -> u64 {
    let mut res = self.time_limit_ms as f64;
    if let Some(lang) = language {
      if let Some(modifier) = self.modifiers.get(lang) {
        if let Some(time) = modifier.time {
          res = time as f64;
        }
        if let Some(mult) = modifier.time_multiplier {
          res *= mult;
        }
      }
    }
    (res * self.time_multiplier) as u64
  }

  pub fn memory_limit_for(&self, language: Option<&str>) -> u64 {
    let Some(lang) = language else {
      return self.memory_limit_mib;
    };
    match self.modifiers.get(lang).and_then(|m| m.memory) {
      Some(mib) => mib,
      None => self.memory_limit_mib,
    }
  }
}
