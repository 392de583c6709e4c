use std::{collections::HashMap, path::Path, sync::Arc};

use crate::{
  cache::{CacheMode, DependencyCache},
  diagnostics,
  etc::{JudgeCfg, LangCfg},
  package::Package,
  pio,
  sandbox::{Cmd, ExitStatus, FileHandle, PipeCapture, Request, RunLog},
  steps::{self, Executable},
  CONFIG,
};

/// Whether a run is worth a fresh attempt: an adapter-side failure, or a
/// wall-clock timeout that may really have been a CPU timeout seen through
/// scheduling jitter (§4.8).
fn is_transient(log: &RunLog) -> bool {
  matches!(log.exitstatus, ExitStatus::SandboxError | ExitStatus::WallTimeout)
}

/// If `executable` carries the sanitizer side-marker and produced stderr,
/// mark the run log and push the stderr onto the process-wide warning
/// stack, keyed by `source_path` (§4.8).
async fn propagate_sanitizer_warnings(log: &mut RunLog, is_sanitized: bool, source_path: &Path) {
  if !is_sanitized {
    return;
  }
  let Some(stderr) = log.files.get("stderr") else {
    return;
  };
  let Ok(bytes) = stderr.context().await else {
    return;
  };
  if bytes.is_empty() {
    return;
  }
  log.sanitizer_warnings = true;
  diagnostics::get_warning_stack()
    .add_sanitizer_warning(source_path, String::from_utf8_lossy(&bytes).to_string());
}

/// Run a Batch solution against one testcase, deriving effective limits
/// from the package/language/environment multipliers and applying bounded
/// retries on transient sandbox failure (§4.8). Retries are disabled in
/// stress-testing mode.
pub async fn run_batch(
  package: &Package,
  executable: &Executable,
  source_path: &Path,
  input: Arc<FileHandle>,
  stress_mode: bool,
  cache: &DependencyCache,
  mode: CacheMode,
) -> RunLog {
  let time_limit_ms = package.time_limit_for(executable.language.as_deref());
  let memory_limit_mib = package.memory_limit_for(executable.language.as_deref());
  let retry_limit = if stress_mode { 0 } else { CONFIG.read().unwrap().judge.retry_limit };

  let mut retry_index = 0;
  let mut log = steps::run(
    executable,
    vec![],
    Some(input.clone()),
    HashMap::new(),
    time_limit_ms,
    memory_limit_mib,
    retry_index,
    cache,
    mode,
  )
  .await;
  while is_transient(&log) && retry_index < retry_limit {
    retry_index += 1;
    log = steps::run(
      executable,
      vec![],
      Some(input.clone()),
      HashMap::new(),
      time_limit_ms,
      memory_limit_mib,
      retry_index,
      cache,
      mode,
    )
    .await;
  }

  propagate_sanitizer_warnings(&mut log, executable.is_sanitized, source_path).await;
  log
}

/// Join the interactor and the solution through a pair of pipes for one
/// attempt (§4.7 communication runs, §5 ordering guarantees). When
/// `capture` is set, also tees each direction's traffic back so the
/// caller can build `.pin`/`.pout`/`.pio` sidecars (§6).
async fn run_pair(
  interactor: &Executable,
  solution: &Executable,
  input: &Arc<FileHandle>,
  solution_time_limit_ms: u64,
  solution_memory_limit_mib: u64,
  judge_cfg: &JudgeCfg,
  retry_index: u32,
  capture: Option<PipeCapture>,
) -> (RunLog, RunLog, Option<pio::Capture>) {
  let interactor_lang = interactor.language.as_ref().and_then(|l| l.parse::<LangCfg>().ok());
  let mut interactor_args = interactor_lang.as_ref().map(|l| l.run_cmd.clone()).unwrap_or_default();
  interactor_args.push("input.txt".to_string());
  let mut interactor_copy_in: HashMap<String, Arc<FileHandle>> = HashMap::new();
  interactor_copy_in.insert("input.txt".to_string(), input.clone());
  if let Some(lang) = &interactor_lang {
    interactor_copy_in.insert(lang.exec.clone(), interactor.file.clone());
  }

  let solution_lang = solution.language.as_ref().and_then(|l| l.parse::<LangCfg>().ok());
  let solution_args = solution_lang.as_ref().map(|l| l.run_cmd.clone()).unwrap_or_default();
  let mut solution_copy_in: HashMap<String, Arc<FileHandle>> = HashMap::new();
  if let Some(lang) = &solution_lang {
    solution_copy_in.insert(lang.exec.clone(), solution.file.clone());
  }

  let mut solution_time_limit = std::time::Duration::from_millis(solution_time_limit_ms);
  let mut solution_memory_limit = solution_memory_limit_mib * 1024 * 1024;
  let mut solution_wall = Some(solution_time_limit * 2);
  if solution.is_sanitized {
    solution_time_limit *= 4;
    solution_wall = Some(solution_time_limit * 2);
    solution_memory_limit = 0;
  }

  let cmds = [
    Cmd {
      args: interactor_args,
      copy_in: interactor_copy_in,
      copy_out: vec!["stderr".to_string()],
      time_limit: judge_cfg.time_limit,
      retry_index,
      ..Default::default()
    },
    Cmd {
      args: solution_args,
      copy_in: solution_copy_in,
      copy_out: vec!["stdout".to_string(), "stderr".to_string()],
      time_limit: solution_time_limit,
      wall_time_limit: solution_wall,
      memory_limit: solution_memory_limit,
      language: solution.language.clone(),
      is_sanitized: solution.is_sanitized,
      retry_index,
      ..Default::default()
    },
  ];

  let mut results = Request::RunPiped(cmds, capture.clone()).exec().await;
  let solution_log = results.pop().expect("RunPiped yields two RunLogs");
  let interactor_log = results.pop().expect("RunPiped yields two RunLogs");

  let pio_capture = if capture.is_some() {
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

  (solution_log, interactor_log, pio_capture)
}

/// Run a Communication solution against one testcase, paired with the
/// interactor (§4.7, §4.8). Retries the pair together, since a transient
/// sandbox failure on either side invalidates the joint run. When
/// `judge_cfg.capture_communication_io` is set, also returns the `.pin`/
/// `.pout`/`.pio` sidecar payloads from the last attempt (§6).
pub async fn run_communication(
  package: &Package,
  interactor: &Executable,
  solution: &Executable,
  solution_source: &Path,
  input: Arc<FileHandle>,
  stress_mode: bool,
) -> (RunLog, RunLog, Option<pio::Capture>) {
  let judge_cfg = CONFIG.read().unwrap().judge.clone();
  let time_limit_ms = package.time_limit_for(solution.language.as_deref());
  let memory_limit_mib = package.memory_limit_for(solution.language.as_deref());
  let retry_limit = if stress_mode { 0 } else { judge_cfg.retry_limit };
  let capture = judge_cfg.capture_communication_io.then(|| PipeCapture {
    first_to_second: "pin".to_string(),
    second_to_first: "pout".to_string(),
  });

  let mut retry_index = 0;
  let (mut solution_log, mut interactor_log, mut capture_result) = run_pair(
    interactor,
    solution,
    &input,
    time_limit_ms,
    memory_limit_mib,
    &judge_cfg,
    retry_index,
    capture.clone(),
  )
  .await;
  while (is_transient(&solution_log) || is_transient(&interactor_log)) && retry_index < retry_limit {
    retry_index += 1;
    (solution_log, interactor_log, capture_result) = run_pair(
      interactor,
      solution,
      &input,
      time_limit_ms,
      memory_limit_mib,
      &judge_cfg,
      retry_index,
      capture.clone(),
    )
    .await;
  }

  propagate_sanitizer_warnings(&mut solution_log, solution.is_sanitized, solution_source).await;
  (solution_log, interactor_log, capture_result)
}
