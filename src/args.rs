use clap::Parser;
use shadow_rs::shadow;

shadow!(build);

/// Command line args.
#[derive(Parser)]
#[clap(version = build::CLAP_LONG_VERSION)]
#[clap(about = "Build and judge a competitive-programming problem package.", long_about = None)]
pub struct Args {
  /// Path to the problem package directory.
  #[clap(value_parser, default_value = ".")]
  pub package_path: String,

  /// Extra config file search paths, checked after `/etc/judge-core/config`.
  #[clap(short, long, value_parser)]
  pub config_search_path: Vec<String>,

  /// Only (re)build and validate testcases; do not run solutions.
  #[clap(long)]
  pub build_only: bool,

  /// Restrict the build/run to testcases matching this pattern (e.g. `main/sub/3`).
  #[clap(short, long, value_parser)]
  pub pattern: Option<String>,
}
