use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A stable coordinate within the built tree (§3 TestcaseEntry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestcaseEntry {
  pub group: String,
  pub index: usize,
}

impl TestcaseEntry {
  pub fn new(group: impl Into<String>, index: usize) -> Self {
    Self {
      group: group.into(),
      index,
    }
  }

  pub fn key(&self) -> (&str, usize) {
    (&self.group, self.index)
  }
}

impl fmt::Display for TestcaseEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.group, self.index)
  }
}

impl FromStr for TestcaseEntry {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (group, index) = s
      .rsplit_once('/')
      .ok_or_else(|| Error::TestcasePattern(format!("invalid testcase entry `{}`", s)))?;
    let index: usize = index
      .parse()
      .map_err(|_| Error::TestcasePattern(format!("invalid testcase entry `{}`", s)))?;
    Ok(Self::new(group.trim(), index))
  }
}

/// A group/subgroup path optionally pinned to one index, as accepted on
/// the command line to scope a build or judge run (§4.4 visitor scoping).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestcasePattern {
  pub group_prefix: Vec<String>,
  pub index: Option<usize>,
}

impl TestcasePattern {
  pub fn group(&self) -> String {
    self.group_prefix.join("/")
  }

  pub fn matches(&self, entry: &TestcaseEntry) -> bool {
    let entry_parts: Vec<&str> = entry.group.split('/').collect();
    if let Some(index) = self.index {
      if index != entry.index {
        return false;
      }
      return self.group_prefix == entry_parts;
    }
    if self.group_prefix.len() > entry_parts.len() {
      return false;
    }
    self.group_prefix[..] == entry_parts[..self.group_prefix.len()]
  }

  pub fn with_no_index(&self) -> Self {
    Self {
      group_prefix: self.group_prefix.clone(),
      index: None,
    }
  }

  /// Whether `group` lies inside this pattern, or this pattern's group
  /// lies inside `group` — either direction counts as "intersecting" when
  /// deciding whether a group needs to be visited at all.
  pub fn intersecting_group(&self, group: &str) -> bool {
    let probe = TestcaseEntry::new(group, 0);
    if self.with_no_index().matches(&probe) {
      return true;
    }
    if let Ok(other) = group.parse::<TestcasePattern>() {
      let self_probe = TestcaseEntry::new(self.group(), 0);
      if other.matches(&self_probe) {
        return true;
      }
    }
    false
  }
}

impl fmt::Display for TestcasePattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let prefix = self.group_prefix.join("/");
    match self.index {
      Some(index) => write!(f, "{}/{}", prefix, index),
      None => write!(f, "{}/", prefix),
    }
  }
}

impl FromStr for TestcasePattern {
  type Err = Error;

  fn from_str(spec: &str) -> Result<Self, Self::Err> {
    let parts: Vec<&str> = spec.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
      return Err(Error::TestcasePattern(format!("invalid testcase pattern `{}`", spec)));
    }
    if parts.len() == 1 {
      return Ok(Self {
        group_prefix: parts.into_iter().map(String::from).collect(),
        index: None,
      });
    }
    if let Ok(index) = parts[parts.len() - 1].parse::<usize>() {
      return Ok(Self {
        group_prefix: parts[..parts.len() - 1].iter().map(|s| s.to_string()).collect(),
        index: Some(index),
      });
    }
    Ok(Self {
      group_prefix: parts.into_iter().map(String::from).collect(),
      index: None,
    })
  }
}

/// A built testcase on disk.
#[derive(Debug, Clone)]
pub struct BuiltTestcase {
  pub input_path: PathBuf,
  pub output_path: Option<PathBuf>,
}

/// Destination stem for the `i`-th testcase of a group/subgroup, per the
/// naming rule in §4.4: `{s-}{N-}{iii}`, zero-padded to 3 digits, with the
/// subgroup segments elided when there is no subgroup.
pub fn destination_stem(subgroup_index: Option<usize>, subgroup_name: Option<&str>, i: usize) -> String {
  let mut stem = String::new();
  if let Some(s) = subgroup_index {
    stem.push_str(&s.to_string());
    stem.push('-');
  }
  if let Some(name) = subgroup_name {
    stem.push_str(name);
    stem.push('-');
  }
  stem.push_str(&format!("{:03}", i));
  stem
}

pub fn destination_dir(root: &std::path::Path, group: &str) -> PathBuf {
  root.join("build").join("tests").join(group)
}

/// Delete and recreate `build/tests` (§5 cancellation: the next build
/// always begins with a full clear).
pub fn clear_built_testcases(root: &std::path::Path) -> std::io::Result<()> {
  let tests_dir = root.join("build").join("tests");
  if tests_dir.exists() {
    std::fs::remove_dir_all(&tests_dir)?;
  }
  Ok(())
}
