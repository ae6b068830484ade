//! Benchmark history CLI entry point.

use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = bench_history_cli::Cli::parse();
    match bench_history_cli::run(cli).await {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
