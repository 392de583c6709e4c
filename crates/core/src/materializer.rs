use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Arc,
};

use crate::{
  cache::{CacheMode, DependencyCache},
  diagnostics::{self, Issue},
  error::Error,
  package::{CodeItem, Package, TaskType, Vars},
  pio,
  sandbox::FileHandle,
  steps::{self, Executable, Sanitized},
  testcase::{self, BuiltTestcase, TestcaseEntry},
  walker::{self, Visitor},
  CONFIG,
};

/// Normalize CRLF and lone CR line endings to LF (§4.6).
pub(crate) fn normalize_newlines(bytes: &[u8]) -> Vec<u8> {
  let text = String::from_utf8_lossy(bytes);
  text.replace("\r\n", "\n").replace('\r', "\n").into_bytes()
}

async fn read_normalized(path: &Path) -> Result<Vec<u8>, Error> {
  let bytes = tokio::fs::read(path).await?;
  Ok(normalize_newlines(&bytes))
}

/// One group's accumulated validator bound hits (§4.6), OR-combined across
/// every testcase in the group except `samples`.
#[derive(Debug, Default, Clone)]
pub(crate) struct BoundHits {
  pub(crate) min_hit: bool,
  pub(crate) max_hit: bool,
}

#[derive(Default)]
pub(crate) struct BoundAggregator {
  per_group: HashMap<String, HashMap<String, BoundHits>>,
}

impl BoundAggregator {
  pub(crate) fn record(&mut self, group: &str, log: &str) {
    if group == "samples" {
      return;
    }
    let vars = self.per_group.entry(group.to_string()).or_default();
    for line in log.lines() {
      let Some((name, flags)) = line.split_once(':') else {
        continue;
      };
      let name = name.trim();
      if name.is_empty() {
        continue;
      }
      let entry = vars.entry(name.to_string()).or_default();
      for flag in flags.split(|c: char| c == ',' || c.is_whitespace()) {
        match flag.trim() {
          "min-value-hit" => entry.min_hit = true,
          "max-value-hit" => entry.max_hit = true,
          _ => {}
        }
      }
    }
  }

  #[cfg(test)]
  pub(crate) fn hits(&self, group: &str, name: &str) -> Option<&BoundHits> {
    self.per_group.get(group)?.get(name)
  }

  fn report(&self) {
    for (group, vars) in &self.per_group {
      for (name, hit) in vars {
        if !hit.min_hit {
          diagnostics::add_issue(Issue::new(
            format!("{}: {} never hit its minimum bound", group, name),
            format!(
              "variable `{}` in test group `{}` never reached its declared minimum across any generated test",
              name, group
            ),
          ));
        }
        if !hit.max_hit {
          diagnostics::add_issue(Issue::new(
            format!("{}: {} never hit its maximum bound", group, name),
            format!(
              "variable `{}` in test group `{}` never reached its declared maximum across any generated test",
              name, group
            ),
          ));
        }
      }
    }
  }
}

/// Compiles and caches `CodeItem`s by source path, so a validator shared by
/// every group (or a generator invoked many times) is only ever compiled
/// once per build.
struct CodeItemCache<'a> {
  root: &'a Path,
  cache: &'a DependencyCache,
  mode: CacheMode,
  compiled: HashMap<PathBuf, Executable>,
}

impl<'a> CodeItemCache<'a> {
  fn new(root: &'a Path, cache: &'a DependencyCache, mode: CacheMode) -> Self {
    Self {
      root,
      cache,
      mode,
      compiled: HashMap::new(),
    }
  }

  async fn get(&mut self, code: &CodeItem, sanitized: Sanitized) -> Result<Executable, Error> {
    if let Some(exe) = self.compiled.get(&code.path) {
      return Ok(exe.clone());
    }
    let source = tokio::fs::read(self.root.join(&code.path)).await?;
    let mut extra_files = HashMap::new();
    for rel in &code.compilation_files {
      let bytes = tokio::fs::read(self.root.join(rel)).await?;
      let name = Path::new(rel).file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| rel.clone());
      extra_files.insert(name, Arc::new(FileHandle::upload(&bytes).await));
    }
    let exe = steps::compile(code, &source, sanitized, extra_files, self.cache, self.mode).await?;
    self.compiled.insert(code.path.clone(), exe.clone());
    Ok(exe)
  }
}

pub(crate) fn vars_to_flags(vars: &Vars) -> Vec<String> {
  let mut keys: Vec<_> = vars.keys().collect();
  keys.sort();
  keys.into_iter().map(|k| format!("--{}={}", k, vars[k])).collect()
}

/// Read the stdout produced by compiling and running a generator-script
/// program (every extension other than `.txt`), or the raw text of a
/// pre-assembled `.txt` script (§6).
async fn resolve_script_texts(
  package: &Package,
  root: &Path,
  codes: &mut CodeItemCache<'_>,
) -> Result<HashMap<PathBuf, String>, Error> {
  let mut scripts: HashMap<PathBuf, CodeItem> = HashMap::new();
  for group in &package.testcases {
    if let Some(s) = &group.base.generator_script {
      scripts.insert(s.path.clone(), s.clone());
    }
    for sub in &group.subgroups {
      if let Some(s) = &sub.generator_script {
        scripts.insert(s.path.clone(), s.clone());
      }
    }
  }

  let judge_cfg = CONFIG.read().unwrap().judge.clone();
  let mut out = HashMap::new();
  for code in scripts.into_values() {
    if code.path.extension().and_then(|e| e.to_str()) == Some("txt") {
      let text = tokio::fs::read_to_string(root.join(&code.path)).await?;
      out.insert(code.path.clone(), text);
      continue;
    }
    let exe = codes.get(&code, Sanitized::None).await?;
    let log = steps::run(
      &exe,
      vec![],
      None,
      HashMap::new(),
      judge_cfg.time_limit.as_millis() as u64,
      judge_cfg.memory_limit / (1024 * 1024),
      0,
      codes.cache,
      codes.mode,
    )
    .await;
    if log.exitstatus != crate::sandbox::ExitStatus::Ok {
      return Err(Error::Package(format!(
        "generator script `{}` exited with status {:?}",
        code.path.display(),
        log.exitstatus
      )));
    }
    let stdout = log
      .files
      .get("stdout")
      .ok_or_else(|| Error::Package(format!("generator script `{}` produced no stdout", code.path.display())))?
      .context()
      .await
      .map_err(|e| Error::Package(e.to_string()))?;
    out.insert(code.path.clone(), String::from_utf8_lossy(&stdout).to_string());
  }
  Ok(out)
}

/// Write `bytes` to `path`, creating parent directories as needed.
pub(crate) async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), Error> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }
  tokio::fs::write(path, bytes).await?;
  Ok(())
}

/// Split a generator call's free-form argument string into an argv vector.
/// Whitespace-separated; no quoting support.
pub(crate) fn split_args(args: &str) -> Vec<String> {
  args.split_whitespace().map(str::to_string).collect()
}

/// Build every testcase named by `entries` into `build/tests` (§4.6).
/// Returns the built input/output path pair for each entry, in traversal
/// order.
pub async fn materialize(
  package: &Package,
  root: &Path,
  visitor: &mut dyn Visitor,
  cache: &DependencyCache,
  mode: CacheMode,
) -> Result<Vec<(TestcaseEntry, BuiltTestcase)>, Error> {
  let mut codes = CodeItemCache::new(root, cache, mode);
  let scripts = resolve_script_texts(package, root, &mut codes).await?;
  let entries = walker::walk(package, root, visitor, &scripts)?;

  testcase::clear_built_testcases(root)?;

  let mut generators: HashMap<String, Executable> = HashMap::new();
  for entry in &entries {
    if let Some(call) = &entry.metadata.generator_call {
      if !generators.contains_key(&call.name) {
        let generator = package
          .generators
          .iter()
          .find(|g| g.name == call.name)
          .ok_or_else(|| Error::Package(format!("unknown generator `{}`", call.name)))?;
        let exe = codes.get(&generator.code, Sanitized::Prefer).await?;
        generators.insert(call.name.clone(), exe);
      }
    }
  }

  let judge_cfg = CONFIG.read().unwrap().judge.clone();
  let vars = package.expanded_vars();
  let var_flags = vars_to_flags(&vars);

  let mut bounds = BoundAggregator::default();
  let mut built = Vec::new();

  for entry in &entries {
    let input_path = entry.metadata.copied_to.with_extension("in");
    let output_path = entry.metadata.copied_to.with_extension("out");

    let mut has_output = false;

    if let Some(src) = &entry.metadata.copied_from {
      let input_bytes = read_normalized(&root.join(src)).await?;
      write_file(&input_path, &input_bytes).await?;

      let explicit_output = entry.metadata.manual_output.as_ref().map(|p| root.join(p));
      let sibling_out = src.with_extension("out");
      let sibling_ans = src.with_extension("ans");
      let found = if let Some(p) = explicit_output {
        Some(p)
      } else if root.join(&sibling_out).exists() {
        Some(root.join(&sibling_out))
      } else if root.join(&sibling_ans).exists() {
        Some(root.join(&sibling_ans))
      } else {
        None
      };
      if let Some(p) = found {
        let output_bytes = read_normalized(&p).await?;
        write_file(&output_path, &output_bytes).await?;
        has_output = true;
      }
    } else if let Some(call) = &entry.metadata.generator_call {
      let exe = generators
        .get(&call.name)
        .ok_or_else(|| Error::Package(format!("generator `{}` was not compiled", call.name)))?;
      let args = call.args.as_deref().map(split_args).unwrap_or_default();
      let log = steps::run(
        exe,
        args,
        None,
        HashMap::new(),
        judge_cfg.time_limit.as_millis() as u64,
        judge_cfg.memory_limit / (1024 * 1024),
        0,
        cache,
        mode,
      )
      .await;
      if log.exitstatus != crate::sandbox::ExitStatus::Ok {
        let stderr = match log.files.get("stderr") {
          Some(f) => String::from_utf8_lossy(&f.context().await.unwrap_or_default()).to_string(),
          None => String::new(),
        };
        return Err(Error::Package(format!(
          "generator `{}` failed for `{}`: {}",
          call.name,
          entry.entry,
          stderr
        )));
      }
      let stdout = log
        .files
        .get("stdout")
        .ok_or_else(|| Error::Package(format!("generator `{}` produced no stdout", call.name)))?
        .context()
        .await
        .map_err(|e| Error::Package(e.to_string()))?;
      write_file(&input_path, &normalize_newlines(&stdout)).await?;
    } else {
      return Err(Error::Package(format!("testcase `{}` has no input source", entry.entry)));
    }

    if let Some(validator) = &entry.validator {
      let exe = codes.get(validator, Sanitized::None).await?;
      let input_handle = Arc::new(FileHandle::upload(&tokio::fs::read(&input_path).await?).await);
      let log = steps::run_with_outputs(
        &exe,
        var_flags.clone(),
        Some(input_handle),
        HashMap::new(),
        vec!["validator.log?".to_string()],
        judge_cfg.time_limit.as_millis() as u64,
        judge_cfg.memory_limit / (1024 * 1024),
        0,
        cache,
        mode,
      )
      .await;
      if log.exitstatus != crate::sandbox::ExitStatus::Ok {
        let stderr = match log.files.get("stderr") {
          Some(f) => String::from_utf8_lossy(&f.context().await.unwrap_or_default()).to_string(),
          None => String::new(),
        };
        return Err(Error::Package(format!(
          "validator rejected `{}`: {}",
          entry.entry, stderr
        )));
      }
      if let Some(f) = log.files.get("validator.log") {
        if let Ok(bytes) = f.context().await {
          bounds.record(&entry.entry.group, &String::from_utf8_lossy(&bytes));
        }
      }
    }

    for extra in &entry.extra_validators {
      let exe = codes.get(extra, Sanitized::None).await?;
      let input_handle = Arc::new(FileHandle::upload(&tokio::fs::read(&input_path).await?).await);
      let log = steps::run(
        &exe,
        var_flags.clone(),
        Some(input_handle),
        HashMap::new(),
        judge_cfg.time_limit.as_millis() as u64,
        judge_cfg.memory_limit / (1024 * 1024),
        0,
        cache,
        mode,
      )
      .await;
      if log.exitstatus != crate::sandbox::ExitStatus::Ok {
        let stderr = match log.files.get("stderr") {
          Some(f) => String::from_utf8_lossy(&f.context().await.unwrap_or_default()).to_string(),
          None => String::new(),
        };
        return Err(Error::Package(format!(
          "extra validator `{}` rejected `{}`: {}",
          extra.path.display(),
          entry.entry,
          stderr
        )));
      }
    }

    if !has_output {
      let reference = if entry.entry.group == "samples" {
        package
          .testcases
          .iter()
          .find(|g| g.name().as_str() == "samples")
          .and_then(|g| g.model_solution.as_ref())
      } else {
        None
      };
      let reference_code = match reference {
        Some(code) => code,
        None => &package
          .solutions
          .first()
          .ok_or_else(|| Error::Package("no main solution to generate reference output".to_string()))?
          .code,
      };
      let exe = codes.get(reference_code, Sanitized::None).await?;
      let input_handle = Arc::new(FileHandle::upload(&tokio::fs::read(&input_path).await?).await);

      let output_bytes = match package.task_type {
        TaskType::Batch => {
          let log = steps::run(
            &exe,
            vec![],
            Some(input_handle),
            HashMap::new(),
            package.time_limit_for(exe.language.as_deref()),
            package.memory_limit_for(exe.language.as_deref()),
            0,
            cache,
            mode,
          )
          .await;
          if log.exitstatus != crate::sandbox::ExitStatus::Ok {
            return Err(Error::Package(format!(
              "main solution failed producing the reference output for `{}`",
              entry.entry
            )));
          }
          log
            .files
            .get("stdout")
            .ok_or_else(|| Error::Package("main solution produced no stdout".to_string()))?
            .context()
            .await
            .map_err(|e| Error::Package(e.to_string()))?
        }
        TaskType::Communication => {
          let interactor = package
            .interactor
            .as_ref()
            .ok_or_else(|| Error::Package("communication task has no interactor".to_string()))?;
          let interactor_exe = codes.get(&interactor.code, Sanitized::None).await?;
          let (output, capture) =
            run_communication_reference(&interactor_exe, &exe, &input_handle, &judge_cfg).await?;
          if let Some(capture) = capture {
            write_file(&output_path.with_extension("pin"), &capture.pin).await?;
            write_file(&output_path.with_extension("pout"), &capture.pout).await?;
            write_file(&output_path.with_extension("pio"), &capture.pio).await?;
          }
          output
        }
      };
      write_file(&output_path, &normalize_newlines(&output_bytes)).await?;
    }

    built.push((
      entry.entry.clone(),
      BuiltTestcase {
        input_path,
        output_path: Some(output_path),
      },
    ));
  }

  bounds.report();

  Ok(built)
}

/// Run the interactor and the main solution joined by pipes, for reference
/// output generation on Communication tasks (§4.6, §4.7). When
/// `judge_cfg.capture_communication_io` is set, also returns the `.pin`/
/// `.pout`/`.pio` sidecar payloads (§6).
async fn run_communication_reference(
  interactor: &Executable,
  solution: &Executable,
  input: &Arc<FileHandle>,
  judge_cfg: &crate::etc::JudgeCfg,
) -> Result<(Vec<u8>, Option<pio::Capture>), Error> {
  use crate::sandbox::{Cmd, PipeCapture, Request};

  let interactor_lang = interactor.language.as_ref().and_then(|l| l.parse::<crate::etc::LangCfg>().ok());
  let mut interactor_args = interactor_lang.as_ref().map(|l| l.run_cmd.clone()).unwrap_or_default();
  interactor_args.push("input.txt".to_string());
  let mut interactor_copy_in: HashMap<String, Arc<FileHandle>> = HashMap::new();
  interactor_copy_in.insert("input.txt".to_string(), input.clone());
  if let Some(lang) = &interactor_lang {
    interactor_copy_in.insert(lang.exec.clone(), interactor.file.clone());
  }

  let solution_lang = solution.language.as_ref().and_then(|l| l.parse::<crate::etc::LangCfg>().ok());
  let solution_args = solution_lang.as_ref().map(|l| l.run_cmd.clone()).unwrap_or_default();
  let mut solution_copy_in: HashMap<String, Arc<FileHandle>> = HashMap::new();
  if let Some(lang) = &solution_lang {
    solution_copy_in.insert(lang.exec.clone(), solution.file.clone());
  }

  let cmds = [
    Cmd {
      args: interactor_args,
      copy_in: interactor_copy_in,
      copy_out: vec!["stderr".to_string()],
      time_limit: judge_cfg.time_limit,
      ..Default::default()
    },
    Cmd {
      args: solution_args,
      copy_in: solution_copy_in,
      copy_out: vec!["stdout".to_string(), "stderr".to_string()],
      time_limit: judge_cfg.time_limit,
      ..Default::default()
    },
  ];

  let capture = judge_cfg.capture_communication_io.then(|| PipeCapture {
    first_to_second: "pin".to_string(),
    second_to_first: "pout".to_string(),
  });

  let mut results = Request::RunPiped(cmds, capture.clone()).exec().await;
  let solution_log = results.pop().expect("RunPiped yields two RunLogs");
  let interactor_log = results.pop().expect("RunPiped yields two RunLogs");

  if interactor_log.exitstatus != crate::sandbox::ExitStatus::Ok {
    return Err(Error::Package("interactor failed while generating the reference output".to_string()));
  }

  let output_bytes = match solution_log.files.get("stdout") {
    Some(f) => f.context().await.map_err(|e| Error::Package(e.to_string()))?,
    None => Vec::new(),
  };

  let capture_result = if capture.is_some() {
    let pin = match interactor_log.files.get("pin") {
      Some(f) => f.context().await.unwrap_or_default(),
      None => Vec::new(),
    };
    let pout = match solution_log.files.get("pout") {
      Some(f) => f.context().await.unwrap_or_default(),
      None => Vec::new(),
    };
    let merged = pio::merge(&pin, &pout);
    Some(pio::Capture { pin, pout, pio: merged })
  } else {
    None
  };

  Ok((output_bytes, capture_result))
}
