use std::{
  collections::HashMap,
  fmt,
  path::{Path, PathBuf},
  str::FromStr,
  sync::Arc,
};

use crate::{
  builtin,
  cache::{CacheMode, DependencyCache},
  checker,
  diagnostics::{self, Issue},
  error::Error,
  matcher::{self, ReportStatus},
  materializer,
  package::{CodeItem, Outcome, Package, TaskType},
  runner,
  sandbox::FileHandle,
  steps::{self, Executable, Sanitized},
  testcase::TestcasePattern,
  walker,
};

/// Filename of the package manifest at the root of a problem package,
/// matching the on-disk convention of the ecosystem this engine judges
/// for.
const MANIFEST_FILE: &str = "problem.rbx.yml";

/// One solution's judged result against every built testcase (§4.9).
#[derive(Debug, Clone)]
pub struct SolutionResult {
  pub path: PathBuf,
  pub report: matcher::SolutionReport,
}

/// Top-level outcome of a build-and-judge run.
#[derive(Debug, Clone)]
pub struct Report {
  pub build_only: bool,
  pub solutions: Vec<SolutionResult>,
}

impl Report {
  pub fn is_ok(&self) -> bool {
    self.solutions.iter().all(|s| s.report.is_ok())
  }
}

impl fmt::Display for Report {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.build_only {
      return writeln!(f, "build OK");
    }
    for solution in &self.solutions {
      match &solution.report.status {
        ReportStatus::Ok => {
          let score = solution.report.score.map(|v| format!(" (score {:.2})", v)).unwrap_or_default();
          writeln!(f, "{}: OK{}", solution.path.display(), score)?;
        }
        ReportStatus::UnexpectedVerdicts { got } => {
          let got: Vec<String> = got.iter().map(Outcome::to_string).collect();
          writeln!(f, "{}: unexpected verdicts [{}]", solution.path.display(), got.join(", "))?;
        }
        ReportStatus::UnexpectedScore { got, expected } => {
          writeln!(f, "{}: unexpected score {} (expected {})", solution.path.display(), got, expected)?;
        }
      }
    }
    Ok(())
  }
}

async fn compile_from_root(
  root: &Path,
  code: &CodeItem,
  sanitized: Sanitized,
  cache: &DependencyCache,
  mode: CacheMode,
) -> Result<Executable, Error> {
  let source = tokio::fs::read(root.join(&code.path)).await?;
  let mut extra_files = HashMap::new();
  for rel in &code.compilation_files {
    let bytes = tokio::fs::read(root.join(rel)).await?;
    let name = Path::new(rel).file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| rel.clone());
    extra_files.insert(name, Arc::new(FileHandle::upload(&bytes).await));
  }
  steps::compile(code, &source, sanitized, extra_files, cache, mode).await
}

/// Compile the embedded `wcmp` checker, for packages that declare no
/// checker of their own (§6 builtin checkers).
async fn compile_builtin_checker(cache: &DependencyCache, mode: CacheMode) -> Result<Executable, Error> {
  let checker_file = builtin::File::from_str("checker:wcmp.cpp").map_err(|e| Error::Package(e.to_string()))?;
  let testlib_file = builtin::File::from_str("testlib:testlib.h").map_err(|e| Error::Package(e.to_string()))?;

  let mut extra_files = HashMap::new();
  extra_files.insert("testlib.h".to_string(), Arc::new(FileHandle::upload(&testlib_file.content).await));

  let code = CodeItem {
    path: PathBuf::from("wcmp.cpp"),
    language: Some("cpp".to_string()),
    compilation_files: vec![],
    compilation_fingerprint: None,
  };
  steps::compile(&code, &checker_file.content, Sanitized::None, extra_files, cache, mode).await
}

/// Build (and, unless `build_only`, judge) the package rooted at
/// `package_path`, optionally scoped to `pattern`.
pub async fn run(package_path: &str, pattern: Option<TestcasePattern>, build_only: bool) -> Result<Report, Error> {
  let root = Path::new(package_path).to_path_buf();
  let package = Package::load(&root.join(MANIFEST_FILE))?;
  diagnostics::reset_warning_stack(&root);

  diagnostics::with_issue_scope(move || async move {
    let root = root.as_path();
    let cache = DependencyCache::new();
    let mode = CacheMode::Full;

    let mut visitor: Box<dyn walker::Visitor> = match &pattern {
      Some(p) => Box::new(walker::VisitPattern(p)),
      None => Box::new(walker::VisitAll),
    };

    let built = materializer::materialize(&package, root, visitor.as_mut(), &cache, mode).await?;
    diagnostics::print_current_report();

    if build_only {
      return Ok(Report {
        build_only: true,
        solutions: vec![],
      });
    }

    let checker_exe = match &package.checker {
      Some(code) => Some(compile_from_root(root, code, Sanitized::None, &cache, mode).await?),
      None if package.task_type == TaskType::Batch => Some(compile_builtin_checker(&cache, mode).await?),
      None => None,
    };

    let interactor_exe = match &package.interactor {
      Some(interactor) => Some(compile_from_root(root, &interactor.code, Sanitized::None, &cache, mode).await?),
      None => None,
    };
    let interactor_is_legacy = package.interactor.as_ref().map(|i| i.legacy).unwrap_or(false);

    let output_limit_bytes = package.output_limit_kib * 1024;
    let stress_mode = false;

    let mut solutions = Vec::new();
    for solution in &package.solutions {
      let exe = compile_from_root(root, &solution.code, Sanitized::Prefer, &cache, mode).await?;
      let time_limit_ms = package.time_limit_for(exe.language.as_deref());

      let mut results = Vec::with_capacity(built.len());
      for (entry, files) in &built {
        let input_bytes = tokio::fs::read(&files.input_path).await?;
        let input_handle = Arc::new(FileHandle::upload(&input_bytes).await);

        let expected_path = files
          .output_path
          .as_ref()
          .ok_or_else(|| Error::Package(format!("testcase `{}` has no reference output", entry)))?;
        let expected_bytes = tokio::fs::read(expected_path).await?;
        let expected_handle = Arc::new(FileHandle::upload(&expected_bytes).await);

        let verdict = match package.task_type {
          TaskType::Batch => {
            let log =
              runner::run_batch(&package, &exe, &solution.code.path, input_handle.clone(), stress_mode, &cache, mode)
                .await;
            let output_bytes = match log.files.get("stdout") {
              Some(f) => f.context().await.unwrap_or_default(),
              None => Vec::new(),
            };
            let output_len = output_bytes.len() as u64;
            let output_handle = Arc::new(FileHandle::upload(&output_bytes).await);
            let checker_exe = checker_exe.as_ref().expect("a batch task always resolves a checker");

            let verdict = checker::check_batch(
              checker_exe,
              vec![],
              &log,
              input_handle.clone(),
              output_handle.clone(),
              output_len,
              expected_handle.clone(),
              time_limit_ms,
              output_limit_bytes,
              &cache,
              mode,
            )
            .await?;

            if verdict.outcome == Outcome::TimeLimitExceeded && checker::within_double_tl(&log, time_limit_ms) {
              let unbounded = checker::check_batch(
                checker_exe,
                vec![],
                &log,
                input_handle,
                output_handle,
                output_len,
                expected_handle,
                0,
                output_limit_bytes,
                &cache,
                mode,
              )
              .await?;
              diagnostics::add_issue(Issue::new(
                format!("{}: {} passes under double the time limit", solution.code.path.display(), entry),
                format!(
                  "solution `{}` exceeded the time limit on `{}` but would have scored `{}` ignoring time",
                  solution.code.path.display(),
                  entry,
                  unbounded.outcome
                ),
              ));
            }

            verdict
          }
          TaskType::Communication => {
            let interactor_exe = interactor_exe
              .as_ref()
              .ok_or_else(|| Error::Package("communication task has no interactor".to_string()))?;
            let (solution_log, interactor_log, capture) = runner::run_communication(
              &package,
              interactor_exe,
              &exe,
              &solution.code.path,
              input_handle.clone(),
              stress_mode,
            )
            .await;

            if let Some(capture) = capture {
              materializer::write_file(&expected_path.with_extension("pin"), &capture.pin).await?;
              materializer::write_file(&expected_path.with_extension("pout"), &capture.pout).await?;
              materializer::write_file(&expected_path.with_extension("pio"), &capture.pio).await?;
            }

            let output_handle = solution_log.files.get("stdout").cloned().map(Arc::new);
            let legacy_checker = interactor_is_legacy.then(|| checker_exe.as_ref()).flatten();

            checker::check_communication(
              &solution_log,
              &interactor_log,
              time_limit_ms,
              legacy_checker,
              vec![],
              input_handle,
              output_handle,
              expected_handle,
              &cache,
              mode,
            )
            .await?
          }
        };

        results.push((entry.clone(), verdict.outcome));
      }

      let report = matcher::match_solution(&package, solution.outcome, solution.score, &results);
      solutions.push(SolutionResult {
        path: solution.code.path.clone(),
        report,
      });
    }

    diagnostics::print_current_report();

    Ok(Report {
      build_only: false,
      solutions,
    })
  })
  .await
}
