pub mod args;

use std::process::ExitCode;

use clap::Parser;

use judge_core::{diagnostics, driver, etc, testcase::TestcasePattern};

extern crate pretty_env_logger;
#[macro_use]
extern crate lazy_static;
extern crate log;

#[tokio::main]
async fn main() -> ExitCode {
  pretty_env_logger::init();

  let args = args::Args::parse();
  etc::load_config(&args.config_search_path);

  let pattern = match args.pattern.as_deref().map(str::parse::<TestcasePattern>) {
    Some(Ok(p)) => Some(p),
    Some(Err(e)) => {
      log::error!("invalid pattern: {}", e);
      return ExitCode::FAILURE;
    }
    None => None,
  };

  let outcome = driver::run(&args.package_path, pattern, args.build_only).await;

  diagnostics::get_warning_stack().print_report();

  match outcome {
    Ok(report) => {
      println!("{}", report);
      if report.is_ok() {
        ExitCode::SUCCESS
      } else {
        ExitCode::FAILURE
      }
    }
    Err(e) => {
      log::error!("{}", e);
      ExitCode::FAILURE
    }
  }
}
