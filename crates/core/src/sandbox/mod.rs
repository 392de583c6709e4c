mod client;
mod cmd;
mod file;
mod response;

mod proto {
  tonic::include_proto!("pb");
}

pub use {
  client::Client,
  cmd::{Cmd, PipeCapture, Request},
  file::FileHandle,
  response::{ExitStatus, RunLog, RunLogMetadata, SandboxError},
};
