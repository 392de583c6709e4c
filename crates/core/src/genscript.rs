use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One normalized record produced by either generator-script grammar
/// (§4.5). Exactly one of `generator_name` / `copied_from` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptEntry {
  pub generator_name: Option<String>,
  pub args: String,
  pub source_line: usize,
  pub group_override: Option<String>,
  pub copied_from: Option<PathBuf>,
}

impl ScriptEntry {
  fn call(name: &str, args: &str, line: usize) -> Self {
    Self {
      generator_name: Some(name.to_string()),
      args: args.to_string(),
      source_line: line,
      group_override: None,
      copied_from: None,
    }
  }

  fn copy(path: &str, line: usize) -> Self {
    Self {
      generator_name: None,
      args: String::new(),
      source_line: line,
      group_override: None,
      copied_from: Some(PathBuf::from(path)),
    }
  }
}

/// Parse the `rbx` line-oriented grammar (§4.5):
///
/// ```text
/// start      := (statement | NEWLINE)*
/// statement  := COMMENT | copy | testgroup | call
/// comment    := ('#' | '//') to_end_of_line
/// copy       := '@copy' WS filepath
/// testgroup  := '@testgroup' WS name '{' statement* '}'
/// call       := FILEPATH (WS REST_OF_LINE)?
/// ```
///
/// `@testgroup` blocks nest; the innermost enclosing group wins; statements
/// outside any block carry `group_override = None`.
pub fn parse_rbx(script: &str) -> Result<Vec<ScriptEntry>, Error> {
  let mut parser = RbxParser {
    lines: script.lines().collect(),
    pos: 0,
    group_stack: Vec::new(),
  };
  parser.parse_block(false)
}

struct RbxParser<'a> {
  lines: Vec<&'a str>,
  pos: usize,
  group_stack: Vec<String>,
}

impl<'a> RbxParser<'a> {
  fn parse_block(&mut self, nested: bool) -> Result<Vec<ScriptEntry>, Error> {
    let mut out = Vec::new();
    while self.pos < self.lines.len() {
      let line_no = self.pos + 1;
      let raw = self.lines[self.pos];
      let line = raw.trim();
      self.pos += 1;

      if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
        continue;
      }

      if let Some(rest) = line.strip_prefix("@testgroup") {
        let rest = rest.trim_start();
        let (name, brace_rest) = split_name(rest);
        if brace_rest.trim_start().starts_with('{') {
          // single-line opening; nothing else on this line after `{`.
        } else {
          return Err(Error::GenScript(format!(
            "line {}: expected `{{` after @testgroup name",
            line_no
          )));
        }
        self.group_stack.push(name.to_string());
        let mut inner = self.parse_block(true)?;
        self.group_stack.pop();
        for entry in &mut inner {
          if entry.group_override.is_none() {
            entry.group_override = Some(name.to_string());
          }
        }
        out.extend(inner);
        continue;
      }

      if line == "}" {
        if !nested {
          return Err(Error::GenScript(format!("line {}: unexpected `}}`", line_no)));
        }
        return Ok(out);
      }

      if let Some(rest) = line.strip_prefix("@copy") {
        let path = rest.trim();
        if path.is_empty() {
          return Err(Error::GenScript(format!("line {}: @copy requires a path", line_no)));
        }
        out.push(ScriptEntry::copy(path, line_no));
        continue;
      }

      if let Some(name) = line.strip_prefix('@') {
        return Err(Error::GenScript(format!(
          "line {}: unknown directive `@{}`",
          line_no,
          name.split_whitespace().next().unwrap_or(name)
        )));
      }

      let (name, args) = match line.split_once(char::is_whitespace) {
        Some((n, a)) => (n, a.trim()),
        None => (line, ""),
      };
      out.push(ScriptEntry::call(name, args, line_no));
    }

    if nested {
      return Err(Error::GenScript("unterminated @testgroup block".to_string()));
    }
    Ok(out)
  }
}

fn split_name(rest: &str) -> (&str, &str) {
  match rest.find(|c: char| c.is_whitespace() || c == '{') {
    Some(idx) => (&rest[..idx], &rest[idx..]),
    None => (rest, ""),
  }
}

/// Parse the `box` grammar (§4.5): each non-comment line is
/// `N ; CMD ARGS...`, `N` a 1-based group number. `copy` normalizes to
/// `@copy`; a trailing `.exe` on CMD is stripped.
pub fn parse_box(script: &str) -> Result<Vec<ScriptEntry>, Error> {
  let mut out = Vec::new();
  for (i, raw) in script.lines().enumerate() {
    let line_no = i + 1;
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }

    let (group_part, rest) = line
      .split_once(';')
      .ok_or_else(|| Error::GenScript(format!("line {}: expected `N ; CMD ...`", line_no)))?;
    let group: u32 = group_part
      .trim()
      .parse()
      .map_err(|_| Error::GenScript(format!("line {}: invalid group number", line_no)))?;
    let rest = rest.trim();
    if rest.is_empty() {
      return Err(Error::GenScript(format!("line {}: missing command", line_no)));
    }

    let (cmd, args) = match rest.split_once(char::is_whitespace) {
      Some((c, a)) => (c, a.trim()),
      None => (rest, ""),
    };

    let mut cmd = cmd.to_string();
    if cmd == "copy" {
      cmd = "@copy".to_string();
    }
    if let Some(stripped) = cmd.strip_suffix(".exe") {
      cmd = stripped.to_string();
    }

    let mut entry = if cmd == "@copy" {
      ScriptEntry::copy(args, line_no)
    } else {
      ScriptEntry::call(&cmd, args, line_no)
    };
    entry.group_override = Some(group.to_string());
    out.push(entry);
  }
  Ok(out)
}

/// Dispatch on the script file's format. Per §6, a `.txt` extension is a
/// pre-assembled `rbx`-form script; any other extension names a program
/// whose stdout, once run, is itself an `rbx`-form script. This function
/// only implements the grammar choice between `rbx` and `box`; the caller
/// (the Materializer) is responsible for compiling/running non-`.txt`
/// scripts before calling here.
pub fn parse(format: ScriptFormat, script: &str) -> Result<Vec<ScriptEntry>, Error> {
  match format {
    ScriptFormat::Rbx => parse_rbx(script),
    ScriptFormat::Box => parse_box(script),
  }
}

/// Which grammar a `generatorScript` file is written in (§4.5). Declared
/// per-subgroup in the manifest; defaults to `rbx` when omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScriptFormat {
  Rbx,
  Box,
}

impl Default for ScriptFormat {
  fn default() -> Self {
    ScriptFormat::Rbx
  }
}
