use std::{collections::HashMap, sync::Arc};

use crate::{
  cache::{CacheEntry, CacheMode, DependencyCache, Digest, Fingerprint, FingerprintInput},
  error::{CompileError, Error},
  etc, package,
  sandbox::{self, Cmd, ExitStatus, FileHandle, Request, RunLog},
  CONFIG,
};

const ADAPTER_VERSION: &str = "1";

/// Whether a compile should carry sanitizer instrumentation (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sanitized {
  None,
  /// Instrument when the process-wide toggle allows it; silently compile
  /// plain otherwise.
  Prefer,
  /// Instrument unconditionally.
  Force,
}

/// A compiled artifact: its digest in the sandbox store plus whether it
/// carries the sanitizer side-marker (§3 Executable).
#[derive(Debug, Clone)]
pub struct Executable {
  pub file: Arc<FileHandle>,
  pub language: Option<String>,
  pub is_sanitized: bool,
}

fn infer_language(path: &std::path::Path) -> Option<String> {
  let ext = path.extension()?.to_str()?;
  let cfg = CONFIG.read().unwrap();
  cfg.lang.get(ext).map(|l| l.name.clone())
}

/// Wrap `#include "x.h"`/`.hpp` lines in diagnostic push/pop pragmas so
/// warnings originating there do not propagate to the compiler's warning
/// count for the user's own file (§4.3).
pub fn wrap_header_diagnostics(source: &str) -> String {
  let mut out = String::with_capacity(source.len());
  for line in source.lines() {
    let trimmed = line.trim_start();
    if trimmed.starts_with("#include") && (trimmed.contains(".h\"") || trimmed.contains(".hpp\"")) {
      out.push_str("#pragma GCC diagnostic push\n");
      out.push_str("#pragma GCC diagnostic ignored \"-Wall\"\n");
      out.push_str(line);
      out.push('\n');
      out.push_str("#pragma GCC diagnostic pop\n");
    } else {
      out.push_str(line);
      out.push('\n');
    }
  }
  out
}

/// Compile `code` to an executable digest, consulting and feeding the
/// Dependency Cache (§4.3).
pub async fn compile(
  code: &package::CodeItem,
  source_bytes: &[u8],
  sanitized: Sanitized,
  extra_files: HashMap<String, Arc<FileHandle>>,
  cache: &DependencyCache,
  mode: CacheMode,
) -> Result<Executable, Error> {
  let language = code.language.clone().or_else(|| infer_language(&code.path));

  let lang_cfg = match &language {
    Some(name) => Some(name.parse::<etc::LangCfg>()?),
    None => None,
  };

  let Some(lang_cfg) = lang_cfg else {
    // Scripted language: the source itself is the executable.
    let file = FileHandle::upload(source_bytes).await;
    return Ok(Executable {
      file: Arc::new(file),
      language,
      is_sanitized: false,
    });
  };

  let wants_sanitizer = match sanitized {
    Sanitized::None => false,
    Sanitized::Prefer | Sanitized::Force => lang_cfg.is_c_family(),
  };

  let mut args = lang_cfg.compile_cmd.clone();
  if wants_sanitizer {
    args.extend(lang_cfg.sanitizer_flags.clone());
  }

  let source_digest = Digest::of(source_bytes);
  let mut input_digests: Vec<(String, Digest)> = vec![(lang_cfg.source.clone(), source_digest.clone())];
  for (dst, _) in &extra_files {
    input_digests.push((dst.clone(), Digest::of(dst.as_bytes())));
  }
  let input_refs: Vec<(&str, &Digest)> = input_digests.iter().map(|(p, d)| (p.as_str(), d)).collect();

  let judge_cfg = CONFIG.read().unwrap().judge.clone();
  let time_limit_ms = if wants_sanitizer { 0 } else { judge_cfg.time_limit.as_millis() as u64 };
  let memory_limit = if wants_sanitizer { 0 } else { judge_cfg.memory_limit };

  let fingerprint = Fingerprint::compute(FingerprintInput {
    command: &args,
    inputs: &input_refs,
    outputs: &[lang_cfg.exec.as_str()],
    limits: (time_limit_ms, memory_limit),
    adapter_version: ADAPTER_VERSION,
  });

  if let Some(entry) = cache.lookup(&fingerprint, mode).await {
    if let Some(file) = entry.outputs.get(&lang_cfg.exec) {
      return Ok(Executable {
        file: file.clone(),
        language,
        is_sanitized: wants_sanitizer,
      });
    }
  }

  let mut copy_in: HashMap<String, Arc<FileHandle>> = extra_files;
  copy_in.insert(lang_cfg.source.clone(), Arc::new(FileHandle::upload(source_bytes).await));

  let mut cmd = Cmd {
    args,
    copy_in,
    copy_out: vec!["stderr".to_string(), lang_cfg.exec.clone()],
    language: language.clone(),
    is_sanitized: wants_sanitizer,
    ..Default::default()
  };
  if wants_sanitizer {
    cmd.time_limit = judge_cfg.time_limit * 4;
    cmd.wall_time_limit = Some(judge_cfg.time_limit * 8);
    cmd.memory_limit = 0;
  }

  let mut results = Request::Run(cmd).exec().await;
  let log = results.pop().expect("Request::Run yields exactly one RunLog");

  if log.exitstatus != ExitStatus::Ok {
    let message = read_text(&log, "stderr").await.unwrap_or_else(|| "no compile message".to_string());
    return Err(Error::Compile(CompileError { log, message }));
  }

  let file = Arc::new(
    log
      .files
      .get(&lang_cfg.exec)
      .cloned()
      .ok_or_else(|| Error::Package(format!("compiler did not produce `{}`", lang_cfg.exec)))?,
  );

  cache
    .insert(
      fingerprint,
      CacheEntry {
        outputs: [(lang_cfg.exec.clone(), file.clone())].into(),
        run_log: log,
      },
      mode,
    )
    .await;

  Ok(Executable {
    file,
    language,
    is_sanitized: wants_sanitizer,
  })
}

async fn read_text(log: &RunLog, name: &str) -> Option<String> {
  let handle = log.files.get(name)?;
  let bytes = handle.context().await.ok()?;
  Some(String::from_utf8_lossy(&bytes).to_string())
}

/// Run a compiled executable with stdio redirection and extra files
/// (§4.3). If `executable` carries the sanitizer marker, address-space and
/// time limits are dropped and stderr is always captured. Consults and
/// feeds the Dependency Cache the same way `compile` does.
pub async fn run(
  executable: &Executable,
  args: Vec<String>,
  stdin: Option<Arc<FileHandle>>,
  extra_files: HashMap<String, Arc<FileHandle>>,
  time_limit_ms: u64,
  memory_limit_mib: u64,
  retry_index: u32,
  cache: &DependencyCache,
  mode: CacheMode,
) -> RunLog {
  run_with_outputs(
    executable,
    args,
    stdin,
    extra_files,
    vec![],
    time_limit_ms,
    memory_limit_mib,
    retry_index,
    cache,
    mode,
  )
  .await
}

/// Like `run`, but also copies out `extra_copy_out` sandbox paths (e.g. a
/// validator's `validator.log` sidecar).
pub async fn run_with_outputs(
  executable: &Executable,
  args: Vec<String>,
  stdin: Option<Arc<FileHandle>>,
  extra_files: HashMap<String, Arc<FileHandle>>,
  extra_copy_out: Vec<String>,
  time_limit_ms: u64,
  memory_limit_mib: u64,
  retry_index: u32,
  cache: &DependencyCache,
  mode: CacheMode,
) -> RunLog {
  let lang_cfg = executable.language.as_ref().and_then(|l| l.parse::<etc::LangCfg>().ok());
  let mut run_args = lang_cfg.as_ref().map(|l| l.run_cmd.clone()).unwrap_or_default();
  run_args.extend(args);

  let mut copy_in = extra_files;
  if let Some(lang_cfg) = &lang_cfg {
    copy_in.insert(lang_cfg.exec.clone(), executable.file.clone());
  }

  let copy_out = [vec!["stdout".to_string(), "stderr".to_string()], extra_copy_out].concat();

  let mut fingerprint_command = run_args.clone();
  fingerprint_command.push(format!("\u{1f}retry={}", retry_index));

  let mut input_digests: Vec<(String, Digest)> =
    copy_in.iter().map(|(name, handle)| (name.clone(), handle.digest().clone())).collect();
  if let Some(stdin) = &stdin {
    input_digests.push(("\u{1f}stdin".to_string(), stdin.digest().clone()));
  }
  let input_refs: Vec<(&str, &Digest)> = input_digests.iter().map(|(p, d)| (p.as_str(), d)).collect();
  let output_refs: Vec<&str> = copy_out.iter().map(String::as_str).collect();

  let fingerprint = Fingerprint::compute(FingerprintInput {
    command: &fingerprint_command,
    inputs: &input_refs,
    outputs: &output_refs,
    limits: (time_limit_ms, memory_limit_mib),
    adapter_version: ADAPTER_VERSION,
  });

  if let Some(entry) = cache.lookup(&fingerprint, mode).await {
    return entry.run_log;
  }

  let mut cmd = Cmd {
    args: run_args,
    copy_in,
    copy_out,
    stdin,
    language: executable.language.clone(),
    is_sanitized: executable.is_sanitized,
    retry_index,
    time_limit: std::time::Duration::from_millis(time_limit_ms),
    memory_limit: memory_limit_mib * 1024 * 1024,
    ..Default::default()
  };
  if executable.is_sanitized {
    cmd.memory_limit = 0;
    cmd.time_limit = cmd.time_limit * 4;
    cmd.wall_time_limit = Some(cmd.time_limit * 2);
  }

  let mut results = Request::Run(cmd).exec().await;
  let log = results.pop().expect("Request::Run yields exactly one RunLog");

  cache
    .insert(
      fingerprint,
      CacheEntry {
        outputs: HashMap::new(),
        run_log: log.clone(),
      },
      mode,
    )
    .await;

  log
}

pub use sandbox::Request as SandboxRequest;
