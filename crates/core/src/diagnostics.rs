use std::{
  collections::BTreeSet,
  path::{Path, PathBuf},
  sync::Mutex,
};

/// A single non-fatal diagnostic (§5, §7). Carries both a short overview
/// line and the fuller detailed message; the reporter picks which to show.
#[derive(Debug, Clone)]
pub struct Issue {
  pub overview: String,
  pub detail: String,
}

impl Issue {
  pub fn new(overview: impl Into<String>, detail: impl Into<String>) -> Self {
    Self {
      overview: overview.into(),
      detail: detail.into(),
    }
  }
}

/// One frame of accumulated issues.
#[derive(Debug, Default, Clone)]
pub struct IssueAccumulator {
  issues: Vec<Issue>,
}

impl IssueAccumulator {
  pub fn add(&mut self, issue: Issue) {
    self.issues.push(issue);
  }

  pub fn issues(&self) -> &[Issue] {
    &self.issues
  }

  pub fn print_overview_report(&self) {
    if self.issues.is_empty() {
      return;
    }
    log::warn!("{} issue(s):", self.issues.len());
    for issue in &self.issues {
      log::warn!("  {}", issue.overview);
    }
  }

  pub fn print_detailed_report(&self) {
    if self.issues.is_empty() {
      return;
    }
    log::warn!("{} issue(s):", self.issues.len());
    for issue in &self.issues {
      log::warn!("  {}", issue.detail);
    }
  }
}

tokio::task_local! {
  /// Stack of accumulators for the current task. Pushing a frame makes
  /// subsequent `add_issue` calls visible to the new frame and every
  /// ancestor frame (§5); `print_current_report` only looks at the top.
  static ISSUE_STACK: Mutex<Vec<IssueAccumulator>>;
}

/// Run `f` inside a freshly pushed issue-accumulator frame. Used to scope
/// a per-problem build inside a contest build so a failure in one problem
/// does not hide issues in another (§7).
pub async fn with_issue_scope<F, Fut, T>(f: F) -> T
where
  F: FnOnce() -> Fut,
  Fut: std::future::Future<Output = T>,
{
  ISSUE_STACK
    .scope(Mutex::new(vec![IssueAccumulator::default()]), async move { f().await })
    .await
}

pub fn add_issue(issue: Issue) {
  let _ = ISSUE_STACK.try_with(|stack| {
    let mut stack = stack.lock().unwrap();
    for acc in stack.iter_mut() {
      acc.add(issue.clone());
    }
  });
}

pub fn print_current_report() {
  let _ = ISSUE_STACK.try_with(|stack| {
    if let Some(top) = stack.lock().unwrap().last() {
      top.print_detailed_report();
    }
  });
}

/// Process-wide accumulator of compiler and sanitizer warnings (§4.8,
/// §5). Unlike the issue stack, warnings are not task-scoped: any code
/// anywhere in the process can flag a path as warned.
#[derive(Debug, Default)]
pub struct WarningStack {
  root: PathBuf,
  compile_warnings: BTreeSet<PathBuf>,
  sanitizer_warnings: std::collections::BTreeMap<PathBuf, String>,
}

impl WarningStack {
  fn new(root: PathBuf) -> Self {
    Self {
      root,
      compile_warnings: BTreeSet::new(),
      sanitizer_warnings: Default::default(),
    }
  }

  pub fn add_compile_warning(&mut self, path: impl Into<PathBuf>) {
    self.compile_warnings.insert(path.into());
  }

  /// Record a sanitizer warning for `path`, deduplicated: the first
  /// captured stderr wins.
  pub fn add_sanitizer_warning(&mut self, path: impl Into<PathBuf>, stderr: String) {
    self.sanitizer_warnings.entry(path.into()).or_insert(stderr);
  }

  pub fn is_empty(&self) -> bool {
    self.compile_warnings.is_empty() && self.sanitizer_warnings.is_empty()
  }

  pub fn clear(&mut self) {
    self.compile_warnings.clear();
    self.sanitizer_warnings.clear();
  }

  pub fn print_report(&self) {
    if self.is_empty() {
      return;
    }
    log::warn!("there were warnings within the code that ran at {}", self.root.display());
    if !self.compile_warnings.is_empty() {
      log::warn!("{} compilation warning(s)", self.compile_warnings.len());
      for path in &self.compile_warnings {
        log::warn!("  - {}", path.display());
      }
    }
    if !self.sanitizer_warnings.is_empty() {
      log::warn!("{} sanitizer warning(s)", self.sanitizer_warnings.len());
      for (path, _) in &self.sanitizer_warnings {
        log::warn!("  - {}", path.display());
      }
    }
  }
}

lazy_static! {
  static ref WARNING_STACK: Mutex<WarningStack> = Mutex::new(WarningStack::new(PathBuf::from(".")));
}

pub fn get_warning_stack() -> std::sync::MutexGuard<'static, WarningStack> {
  WARNING_STACK.lock().unwrap()
}

pub fn reset_warning_stack(root: &Path) {
  *WARNING_STACK.lock().unwrap() = WarningStack::new(root.to_path_buf());
}
