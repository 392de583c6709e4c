use std::{
  collections::HashMap,
  path::Path,
  sync::Arc,
  time::{Duration, Instant},
};

use crate::{
  cache::{CacheMode, DependencyCache},
  checker,
  error::Error,
  materializer::split_args,
  package::{ExpectedOutcome, Outcome, Package, Stress},
  sandbox::{ExitStatus, FileHandle},
  steps::{self, Sanitized},
  CONFIG,
};

/// One discovered counterexample (§3.1 Stress).
#[derive(Debug, Clone)]
pub struct StressFinding {
  pub generator_args: String,
  pub outcome: Outcome,
  pub input: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct StressReport {
  pub findings: Vec<StressFinding>,
  pub executed: u32,
}

async fn read_stdout(log: &crate::sandbox::RunLog) -> Result<Vec<u8>, Error> {
  let handle = log.files.get("stdout").ok_or_else(|| Error::Package("run produced no stdout".to_string()))?;
  handle.context().await.map_err(|e| Error::Package(e.to_string()))
}

/// Fuzz `stress.finder`'s solution against the package's first
/// `Accepted`-declared solution (taken as the reference) on inputs
/// produced by `stress.generator`, for up to `max_iterations` attempts or
/// until `findings_limit` counterexamples are found or `timeout` elapses,
/// whichever comes first (§3.1). Unsupported for Communication tasks,
/// matching the original's restriction.
pub async fn run_stress(
  package: &Package,
  root: &Path,
  stress: &Stress,
  max_iterations: u32,
  findings_limit: usize,
  timeout: Duration,
  cache: &DependencyCache,
  mode: CacheMode,
) -> Result<StressReport, Error> {
  if package.task_type == crate::package::TaskType::Communication {
    return Err(Error::Package("communication problems do not support stress testing".to_string()));
  }

  let generator = package
    .generators
    .iter()
    .find(|g| g.name == stress.generator.name)
    .ok_or_else(|| Error::Package(format!("stress `{}`: unknown generator `{}`", stress.name, stress.generator.name)))?;
  let generator_source = tokio::fs::read(root.join(&generator.code.path)).await?;
  let generator_exe =
    steps::compile(&generator.code, &generator_source, Sanitized::Prefer, HashMap::new(), cache, mode).await?;

  let reference = package
    .solutions
    .iter()
    .find(|s| s.outcome == ExpectedOutcome::Accepted)
    .ok_or_else(|| Error::Package(format!("stress `{}`: package has no accepted solution to use as reference", stress.name)))?;
  let reference_source = tokio::fs::read(root.join(&reference.code.path)).await?;
  let reference_exe =
    steps::compile(&reference.code, &reference_source, Sanitized::None, HashMap::new(), cache, mode).await?;

  let candidate = package
    .solutions
    .iter()
    .find(|s| s.code.path.to_string_lossy() == stress.finder)
    .ok_or_else(|| {
      Error::Package(format!("stress `{}`: finder `{}` does not name a declared solution", stress.name, stress.finder))
    })?;
  let candidate_source = tokio::fs::read(root.join(&candidate.code.path)).await?;
  let candidate_exe =
    steps::compile(&candidate.code, &candidate_source, Sanitized::Prefer, HashMap::new(), cache, mode).await?;

  let checker_exe = match &package.checker {
    Some(code) => {
      let source = tokio::fs::read(root.join(&code.path)).await?;
      Some(steps::compile(code, &source, Sanitized::None, HashMap::new(), cache, mode).await?)
    }
    None => None,
  };

  let judge_cfg = CONFIG.read().unwrap().judge.clone();
  let time_limit_ms = package.time_limit_for(candidate_exe.language.as_deref());
  let memory_limit_mib = package.memory_limit_for(candidate_exe.language.as_deref());
  let output_limit_bytes = package.output_limit_kib * 1024;
  let generator_args = stress.generator.args.as_deref().map(split_args).unwrap_or_default();

  let started = Instant::now();
  let mut report = StressReport::default();

  while report.executed < max_iterations && report.findings.len() < findings_limit && started.elapsed() < timeout {
    report.executed += 1;

    let input_log = steps::run(
      &generator_exe,
      generator_args.clone(),
      None,
      HashMap::new(),
      judge_cfg.time_limit.as_millis() as u64,
      judge_cfg.memory_limit / (1024 * 1024),
      report.executed,
      cache,
      mode,
    )
    .await;
    if input_log.exitstatus != ExitStatus::Ok {
      continue;
    }
    let input_bytes = read_stdout(&input_log).await?;
    let input_handle = Arc::new(FileHandle::upload(&input_bytes).await);

    let reference_log =
      steps::run(&reference_exe, vec![], Some(input_handle.clone()), HashMap::new(), time_limit_ms, memory_limit_mib, 0, cache, mode)
        .await;
    if checker::check_with_no_output(Some(&reference_log), 0) != Outcome::Accepted {
      continue;
    }

    let candidate_log =
      steps::run(&candidate_exe, vec![], Some(input_handle.clone()), HashMap::new(), time_limit_ms, memory_limit_mib, 0, cache, mode)
        .await;

    let outcome = match &checker_exe {
      Some(checker_exe) => {
        let output_bytes = read_stdout(&candidate_log).await.unwrap_or_default();
        let output_len = output_bytes.len() as u64;
        let output_handle = Arc::new(FileHandle::upload(&output_bytes).await);
        let reference_bytes = read_stdout(&reference_log).await?;
        let expected_handle = Arc::new(FileHandle::upload(&reference_bytes).await);
        checker::check_batch(
          checker_exe,
          vec![],
          &candidate_log,
          input_handle.clone(),
          output_handle,
          output_len,
          expected_handle,
          time_limit_ms,
          output_limit_bytes,
          cache,
          mode,
        )
        .await?
        .outcome
      }
      None => checker::check_with_no_output(Some(&candidate_log), time_limit_ms),
    };

    if outcome != Outcome::Accepted {
      report.findings.push(StressFinding {
        generator_args: stress.generator.to_string(),
        outcome,
        input: input_bytes,
      });
    }
  }

  Ok(report)
}
