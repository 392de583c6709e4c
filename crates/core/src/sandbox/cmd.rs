use core::time;
use std::{collections::HashMap, sync::Arc};

use crate::CONFIG;

use super::{
  client,
  file::FileHandle,
  proto,
  response::{RunLog, RunLogMetadata},
};

/// A sandbox judge request: one or more commands to run in the sandbox in
/// a single call.
#[derive(Debug, Clone)]
pub enum Request {
  /// Run a single command.
  Run(Cmd),

  /// Run two commands with stdout/stdin joined by a pipe, for the
  /// communication protocol (§4.7). The optional `PipeCapture` asks the
  /// executor to tee each direction's traffic back as a named output
  /// (§6 `.pin`/`.pout` sidecars).
  RunPiped([Cmd; 2], Option<PipeCapture>),
}

/// Capture names for a `RunPiped` request's two pipe directions, fed to
/// the executor's pipe-proxy (`PipeMap.proxy`/`PipeMap.name`).
#[derive(Debug, Clone)]
pub struct PipeCapture {
  /// Name under which the first command's stdout (piped into the
  /// second's stdin) is copied out, attached to the first command's
  /// result.
  pub first_to_second: String,

  /// Name under which the second command's stdout (piped into the
  /// first's stdin) is copied out, attached to the second command's
  /// result.
  pub second_to_first: String,
}

impl Request {
  fn cmds(&self) -> Vec<&Cmd> {
    match self {
      Request::Run(cmd) => vec![cmd],
      Request::RunPiped(cmds, _) => cmds.iter().collect(),
    }
  }

  fn to_cmd_type(cmd: &Cmd) -> proto::request::CmdType {
    let cfg = CONFIG.read().unwrap();
    let c = &cfg.judge;
    proto::request::CmdType {
      args: cmd.args.clone(),
      env: [c.env.clone(), cmd.env.clone()].concat(),
      files: vec![
        match &cmd.stdin {
          Some(f) => proto::request::File {
            file: Some(proto::request::file::File::Cached(
              proto::request::CachedFile {
                file_id: f.id().clone(),
              },
            )),
          },
          None => proto::request::File {
            file: Some(proto::request::file::File::Memory(
              proto::request::MemoryFile {
                content: "".as_bytes().to_vec(),
              },
            )),
          },
        },
        proto::request::File {
          file: Some(proto::request::file::File::Pipe(
            proto::request::PipeCollector {
              name: "stdout".to_string(),
              max: c.stdout_limit,
              pipe: false,
            },
          )),
        },
        proto::request::File {
          file: Some(proto::request::file::File::Pipe(
            proto::request::PipeCollector {
              name: "stderr".to_string(),
              max: c.stderr_limit,
              pipe: false,
            },
          )),
        },
      ],
      tty: false,
      cpu_time_limit: cmd.time_limit.as_nanos().try_into().unwrap(),
      clock_time_limit: cmd
        .wall_time_limit
        .unwrap_or(cmd.time_limit * 2)
        .as_nanos()
        .try_into()
        .unwrap(),
      memory_limit: cmd.memory_limit,
      stack_limit: cmd.memory_limit,
      proc_limit: c.process_limit,
      strict_memory_limit: false,
      copy_in: cmd
        .copy_in
        .iter()
        .map(|(dst, f)| {
          (
            dst.clone(),
            proto::request::File {
              file: Some(proto::request::file::File::Cached(
                proto::request::CachedFile { file_id: f.id().clone() },
              )),
            },
          )
        })
        .collect(),
      copy_out: vec![],
      copy_out_cached: cmd
        .copy_out
        .iter()
        .map(|f| match f.strip_suffix('?') {
          Some(name) => proto::request::CmdCopyOutFile {
            name: name.to_string(),
            optional: true,
          },
          None => proto::request::CmdCopyOutFile {
            name: f.to_string(),
            optional: false,
          },
        })
        .collect(),
      ..Default::default()
    }
  }

  /// Convert a wrapped request to sandbox proto request.
  fn to_proto_request(&self) -> proto::Request {
    match self {
      Request::Run(cmd) => proto::Request {
        cmd: vec![Self::to_cmd_type(cmd)],
        pipe_mapping: vec![],
      },
      Request::RunPiped([first, second], capture) => {
        let (proxy_0_1, name_0_1, proxy_1_0, name_1_0) = match capture {
          Some(c) => (true, c.first_to_second.clone(), true, c.second_to_first.clone()),
          None => (false, String::new(), false, String::new()),
        };
        proto::Request {
          cmd: vec![Self::to_cmd_type(first), Self::to_cmd_type(second)],
          pipe_mapping: vec![
            // first's stdout (fd 1) feeds second's stdin (fd 0); proxy
            // capture, if any, is attached to the first command's result.
            proto::PipeMap {
              r#in: Some(proto::pipe_map::Target { index: 0, fd: 1 }),
              out: Some(proto::pipe_map::Target { index: 1, fd: 0 }),
              proxy: proxy_0_1,
              name: name_0_1,
              max: 0,
            },
            // second's stdout feeds first's stdin; capture attached to
            // the second command's result.
            proto::PipeMap {
              r#in: Some(proto::pipe_map::Target { index: 1, fd: 1 }),
              out: Some(proto::pipe_map::Target { index: 0, fd: 0 }),
              proxy: proxy_1_0,
              name: name_1_0,
              max: 0,
            },
          ],
        }
      }
    }
  }

  fn metadata_for(cmd: &Cmd) -> RunLogMetadata {
    RunLogMetadata {
      language: cmd.language.clone(),
      is_sanitized: cmd.is_sanitized,
      time_limit_ms: Some(cmd.time_limit.as_millis() as u64),
      memory_limit_mib: Some(cmd.memory_limit / (1024 * 1024)),
      retry_index: cmd.retry_index,
    }
  }

  /// Run the request and return one `RunLog` per `Cmd`, in the order they
  /// were given.
  pub async fn exec(&self) -> Vec<RunLog> {
    let resp = client::CLIENT.get().await.exec(self.to_proto_request()).await;
    if !resp.error.is_empty() {
      return self
        .cmds()
        .into_iter()
        .map(|cmd| RunLog {
          exitcode: -1,
          exitstatus: super::ExitStatus::SandboxError,
          time_seconds: None,
          wall_time_seconds: None,
          memory_bytes: None,
          stderr_digest: None,
          sanitizer_warnings: false,
          metadata: Self::metadata_for(cmd),
          files: HashMap::new(),
        })
        .collect();
    }
    self
      .cmds()
      .into_iter()
      .zip(resp.results.into_iter())
      .map(|(cmd, res)| RunLog::from_proto(res, Self::metadata_for(cmd), cmd.time_limit))
      .collect()
  }
}

/// A command to judge in sandbox.
#[derive(Debug, Clone)]
pub struct Cmd {
  /// Command line argument.
  pub args: Vec<String>,

  /// Environment variables.
  pub env: Vec<String>,

  /// CPU time limit to run this command.
  pub time_limit: time::Duration,

  /// Wall-clock time limit. Defaults to twice `time_limit` when unset
  /// (§4.8's soft-timeout doubling).
  pub wall_time_limit: Option<time::Duration>,

  /// Memory limit in bytes.
  pub memory_limit: u64,

  /// Stdin of the command.
  ///
  /// Leave as `None` for a `Request::RunPiped` member: its stdin comes
  /// from the pipe mapping instead. For `Request::Run`, `None` means an
  /// empty file.
  pub stdin: Option<Arc<FileHandle>>,

  /// Files to copy into the sandboxed container before running, keyed by
  /// destination path.
  pub copy_in: HashMap<String, Arc<FileHandle>>,

  /// Names of files to copy out of the container after running. A
  /// trailing `?` marks the file optional, suppressing a `FileError` when
  /// it is missing.
  pub copy_out: Vec<String>,

  /// Language id this command belongs to, recorded into `RunLogMetadata`.
  pub language: Option<String>,

  /// Whether this command was compiled with sanitizer instrumentation.
  pub is_sanitized: bool,

  /// Which retry attempt this run is (§4.8).
  pub retry_index: u32,
}

impl Default for Cmd {
  fn default() -> Self {
    let cfg = CONFIG.read().unwrap();
    let c = &cfg.judge;
    Self {
      args: vec![],
      env: vec![],
      time_limit: c.time_limit,
      wall_time_limit: None,
      memory_limit: c.memory_limit,
      stdin: None,
      copy_in: [].into(),
      copy_out: vec![],
      language: None,
      is_sanitized: false,
      retry_index: 0,
    }
  }
}
