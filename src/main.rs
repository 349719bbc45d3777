use clap::Parser;
use ksau::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
